use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::UserId;

/// Presentation data owned by the account service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct UserProfile {
    pub id: UserId,
    pub name: String,
    pub avatar_url: Option<String>,
}
