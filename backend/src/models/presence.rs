use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::UserId;

/// Latest location fix of a user. One row per user, no history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Presence {
    pub user_id: UserId,
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy_meters: Option<f64>,
    pub is_available: bool,
    pub is_online: bool,
    pub status: String,
    pub last_seen_at: DateTime<Utc>,
}

/// Mutable fields written by an owner's client on every location update.
#[derive(Debug, Clone, PartialEq)]
pub struct PresenceUpdate {
    pub user_id: UserId,
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy_meters: Option<f64>,
    pub is_available: bool,
    pub status: String,
}

/// Another user's presence as a given viewer is allowed to see it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VisibleUser {
    pub id: UserId,
    pub name: String,
    pub avatar_url: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub is_available: bool,
    pub last_seen: DateTime<Utc>,
    pub distance_km: f64,
    pub status: String,
}

/// Location update as sent by the owner's client.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LocationReport {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub accuracy: Option<f64>,
    #[serde(default)]
    pub is_available: Option<bool>,
    #[serde(default)]
    pub accuracy_level: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

impl LocationReport {
    pub fn at(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            accuracy: None,
            is_available: None,
            accuracy_level: None,
            status: None,
        }
    }

    /// Storage form; availability defaults to on, status to empty.
    pub fn into_update(self, user_id: UserId) -> PresenceUpdate {
        PresenceUpdate {
            user_id,
            latitude: self.latitude,
            longitude: self.longitude,
            accuracy_meters: self.accuracy,
            is_available: self.is_available.unwrap_or(true),
            status: self.status.unwrap_or_default(),
        }
    }
}
