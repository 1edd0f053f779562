use chrono::{DateTime, Utc};
use tracing::debug;

use crate::constants::{MAX_LATITUDE, MAX_LONGITUDE, MIN_LATITUDE, MIN_LONGITUDE};
use crate::db::SharedStore;
use crate::error::{LocatorError, LocatorResult};
use crate::models::{Presence, PresenceUpdate, UserId};

pub fn validate_coordinates(latitude: f64, longitude: f64) -> LocatorResult<()> {
    // NaN fails both range checks.
    let lat_ok = (MIN_LATITUDE..=MAX_LATITUDE).contains(&latitude);
    let lon_ok = (MIN_LONGITUDE..=MAX_LONGITUDE).contains(&longitude);
    if lat_ok && lon_ok {
        Ok(())
    } else {
        Err(LocatorError::InvalidCoordinate { latitude, longitude })
    }
}

pub fn validate_update(update: &PresenceUpdate) -> LocatorResult<()> {
    validate_coordinates(update.latitude, update.longitude)?;
    match update.accuracy_meters {
        Some(accuracy) if !accuracy.is_finite() || accuracy < 0.0 => Err(LocatorError::InvalidArgument(
            format!("accuracy must be a non-negative number of meters, got {}", accuracy),
        )),
        _ => Ok(()),
    }
}

/// Latest-fix-per-user record. Coordinates are stored exactly as reported.
#[derive(Clone)]
pub struct PresenceStore {
    store: SharedStore,
}

impl PresenceStore {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    pub async fn upsert(&self, update: &PresenceUpdate) -> LocatorResult<Presence> {
        self.upsert_at(update, Utc::now()).await
    }

    pub async fn upsert_at(&self, update: &PresenceUpdate, now: DateTime<Utc>) -> LocatorResult<Presence> {
        validate_update(update)?;

        let presence = self.store.upsert_presence(update, now).await?;
        debug!("Presence of {} updated", update.user_id);
        Ok(presence)
    }

    pub async fn get(&self, user_id: UserId) -> LocatorResult<Presence> {
        self.store
            .presence_of(user_id)
            .await?
            .ok_or(LocatorError::NotFound("presence"))
    }

    pub async fn find(&self, user_id: UserId) -> LocatorResult<Option<Presence>> {
        Ok(self.store.presence_of(user_id).await?)
    }

    pub async fn online_except(&self, viewer_id: UserId) -> LocatorResult<Vec<Presence>> {
        Ok(self.store.online_presences_except(viewer_id).await?)
    }

    pub async fn stale_online_ids(&self, cutoff: DateTime<Utc>) -> LocatorResult<Vec<UserId>> {
        Ok(self.store.stale_online_ids(cutoff).await?)
    }

    /// Flips the given users offline and unavailable. Returns rows touched.
    pub async fn mark_offline(&self, user_ids: &[UserId]) -> LocatorResult<u64> {
        if user_ids.is_empty() {
            return Ok(0);
        }
        Ok(self.store.mark_offline(user_ids).await?)
    }
}
