pub mod auth;
pub mod friends;
pub mod location;
pub mod visibility;

use std::collections::HashMap;

use serde::Serialize;

use crate::constants::UNKNOWN_USER_NAME;
use crate::models::{UserId, UserProfile};

pub use auth::CurrentUser;
pub use friends::*;
pub use location::*;
pub use visibility::*;

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: &str) -> Self {
        Self {
            message: message.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserSummary {
    pub id: UserId,
    pub name: String,
    pub avatar_url: Option<String>,
}

impl UserSummary {
    /// Looks `id` up in a batch of profiles, falling back to a placeholder name.
    pub fn from_directory(id: UserId, profiles: &HashMap<UserId, UserProfile>) -> Self {
        match profiles.get(&id) {
            Some(profile) => Self {
                id,
                name: profile.name.clone(),
                avatar_url: profile.avatar_url.clone(),
            },
            None => Self {
                id,
                name: UNKNOWN_USER_NAME.to_string(),
                avatar_url: None,
            },
        }
    }
}
