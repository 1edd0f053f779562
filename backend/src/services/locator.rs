//! Entry point for location updates and the "who can I see" query.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::constants::UNKNOWN_USER_NAME;
use crate::db::SharedStore;
use crate::error::{LocatorError, LocatorResult};
use crate::models::{
    AccuracyTier, Audience, LocationReport, Presence, UserId, UserProfile, VisibleUser,
};
use crate::services::presence::validate_update;
use crate::services::proximity::{degrade, reported_distance_km};
use crate::services::visibility::permits;
use crate::services::{FriendGraph, PresenceStore, VisibilityPolicy};

#[derive(Clone)]
pub struct LocatorService {
    store: SharedStore,
    friends: FriendGraph,
    policy: VisibilityPolicy,
    presences: PresenceStore,
}

impl LocatorService {
    pub fn new(store: SharedStore) -> Self {
        let friends = FriendGraph::new(store.clone());
        let policy = VisibilityPolicy::new(store.clone(), friends.clone());
        let presences = PresenceStore::new(store.clone());
        Self {
            store,
            friends,
            policy,
            presences,
        }
    }

    pub fn friends(&self) -> &FriendGraph {
        &self.friends
    }

    pub fn policy(&self) -> &VisibilityPolicy {
        &self.policy
    }

    pub fn presences(&self) -> &PresenceStore {
        &self.presences
    }

    /// Display data for the given users. Unknown ids are simply absent.
    pub async fn profiles(&self, user_ids: &[UserId]) -> LocatorResult<HashMap<UserId, UserProfile>> {
        if user_ids.is_empty() {
            return Ok(HashMap::new());
        }
        Ok(self.store.profiles(user_ids).await?)
    }

    pub async fn user_exists(&self, user_id: UserId) -> LocatorResult<bool> {
        Ok(self.store.user_exists(user_id).await?)
    }

    /// Stores the caller's latest fix. An `accuracy_level` in the report
    /// changes only the caller's accuracy tier.
    ///
    /// The tier is written before the fix, so a failed upsert leaves at most
    /// the new tier behind. Both writes are idempotent and a retry is safe.
    pub async fn update_location(&self, viewer_id: UserId, mut report: LocationReport) -> LocatorResult<Presence> {
        let accuracy_level = report.accuracy_level.take();
        let update = report.into_update(viewer_id);
        validate_update(&update)?;
        let tier = accuracy_level
            .as_deref()
            .map(str::parse::<AccuracyTier>)
            .transpose()?;

        if let Some(tier) = tier {
            self.policy.set_accuracy_tier(viewer_id, tier).await?;
        }
        self.presences.upsert(&update).await
    }

    /// Everyone online the viewer is allowed to see, with coordinates degraded
    /// to each owner's tier and distances from the viewer's own raw fix.
    ///
    /// Store round-trips are constant in the number of candidates. Result
    /// order is unspecified.
    pub async fn get_visible_users(
        &self,
        viewer_id: UserId,
        radius_km: Option<f64>,
    ) -> LocatorResult<Vec<VisibleUser>> {
        self.visible_from(viewer_id, radius_km, false).await
    }

    /// `get_visible_users` narrowed to the viewer's friends.
    pub async fn get_visible_friends(&self, viewer_id: UserId) -> LocatorResult<Vec<VisibleUser>> {
        self.visible_from(viewer_id, None, true).await
    }

    async fn visible_from(
        &self,
        viewer_id: UserId,
        radius_km: Option<f64>,
        friends_only: bool,
    ) -> LocatorResult<Vec<VisibleUser>> {
        if let Some(radius) = radius_km {
            if !radius.is_finite() || radius < 0.0 {
                return Err(LocatorError::InvalidArgument(format!(
                    "radius must be a non-negative number of kilometres, got {}",
                    radius
                )));
            }
        }

        // Without a fix of our own there is nothing to measure from.
        let Some(origin) = self.presences.find(viewer_id).await? else {
            return Ok(Vec::new());
        };

        let mut candidates = self.presences.online_except(viewer_id).await?;
        let friend_ids = if friends_only {
            let friend_ids = self.friends.friend_ids_of(viewer_id).await?;
            candidates.retain(|p| friend_ids.contains(&p.user_id));
            friend_ids
        } else {
            HashSet::new()
        };
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let candidate_ids: Vec<UserId> = candidates.iter().map(|p| p.user_id).collect();
        let settings = self.policy.settings_for_many(&candidate_ids).await?;

        let needs_friends = !friends_only
            && settings
                .values()
                .any(|s| matches!(s.audience, Audience::Friends | Audience::Custom(_)));
        let friend_ids = if needs_friends {
            self.friends.friend_ids_of(viewer_id).await?
        } else {
            friend_ids
        };

        let mut visible = Vec::new();
        for candidate in candidates {
            let Some(owner) = settings.get(&candidate.user_id) else {
                continue;
            };
            if !permits(owner, viewer_id, friend_ids.contains(&candidate.user_id)) {
                continue;
            }

            let (latitude, longitude) = degrade(candidate.latitude, candidate.longitude, owner.accuracy);
            let distance_km = reported_distance_km(origin.latitude, origin.longitude, latitude, longitude);
            if radius_km.is_some_and(|radius| distance_km > radius) {
                continue;
            }

            visible.push((candidate, latitude, longitude, distance_km));
        }

        let visible_ids: Vec<UserId> = visible.iter().map(|(p, ..)| p.user_id).collect();
        let mut profiles = self.profiles(&visible_ids).await?;

        debug!("Viewer {} sees {} users", viewer_id, visible.len());

        Ok(visible
            .into_iter()
            .map(|(presence, latitude, longitude, distance_km)| {
                let profile = profiles.remove(&presence.user_id);
                VisibleUser {
                    id: presence.user_id,
                    name: profile
                        .as_ref()
                        .map(|p| p.name.clone())
                        .unwrap_or_else(|| UNKNOWN_USER_NAME.to_string()),
                    avatar_url: profile.and_then(|p| p.avatar_url),
                    latitude,
                    longitude,
                    is_available: presence.is_available,
                    last_seen: presence.last_seen_at,
                    distance_km,
                    status: presence.status,
                }
            })
            .collect())
    }
}
