use std::collections::{HashMap, HashSet};

use chrono::Utc;
use tracing::{info, warn};

use crate::db::SharedStore;
use crate::error::{LocatorError, LocatorResult};
use crate::models::{
    AccuracyTier, Audience, StoredSettings, UserId, VisibilityMode, VisibilitySettings,
};
use crate::services::FriendGraph;

/// Turns a stored settings row into effective settings.
///
/// A row whose mode or tier does not parse is replaced by the defaults as a
/// whole, never by a partially parsed mix.
pub fn resolve_settings(
    user_id: UserId,
    stored: Option<&StoredSettings>,
    allow_list: Option<&HashSet<UserId>>,
) -> VisibilitySettings {
    let Some(row) = stored else {
        return VisibilitySettings::default_for(user_id);
    };

    let parsed = row
        .visibility_mode
        .parse::<VisibilityMode>()
        .and_then(|mode| row.accuracy_level.parse::<AccuracyTier>().map(|tier| (mode, tier)));

    match parsed {
        Ok((mode, accuracy)) => {
            let audience = match mode {
                VisibilityMode::All => Audience::All,
                VisibilityMode::Friends => Audience::Friends,
                VisibilityMode::Custom => Audience::Custom(allow_list.cloned().unwrap_or_default()),
                VisibilityMode::None => Audience::None,
            };
            VisibilitySettings { user_id, audience, accuracy }
        }
        Err(e) => {
            warn!("Malformed visibility settings for {}, using defaults: {}", user_id, e);
            VisibilitySettings::default_for(user_id)
        }
    }
}

/// Access decision for a viewer other than the owner.
///
/// Friendship is required for every audience except `All`; a custom audience
/// additionally requires the viewer to be on the allow-list.
pub fn permits(settings: &VisibilitySettings, viewer_id: UserId, are_friends: bool) -> bool {
    match &settings.audience {
        Audience::All => true,
        Audience::None => false,
        Audience::Friends => are_friends,
        Audience::Custom(allowed) => are_friends && allowed.contains(&viewer_id),
    }
}

#[derive(Clone)]
pub struct VisibilityPolicy {
    store: SharedStore,
    friends: FriendGraph,
}

impl VisibilityPolicy {
    pub fn new(store: SharedStore, friends: FriendGraph) -> Self {
        Self { store, friends }
    }

    /// Effective settings of one owner, defaults when none were saved.
    pub async fn settings_for(&self, user_id: UserId) -> LocatorResult<VisibilitySettings> {
        let stored = self.store.settings_for(user_id).await?;
        let wants_list = stored
            .as_ref()
            .is_some_and(|row| row.visibility_mode == VisibilityMode::Custom.as_str());
        let allow_list = if wants_list {
            Some(self.store.allow_list(user_id).await?)
        } else {
            None
        };
        Ok(resolve_settings(user_id, stored.as_ref(), allow_list.as_ref()))
    }

    /// Effective settings of many owners in two store round-trips.
    pub async fn settings_for_many(
        &self,
        user_ids: &[UserId],
    ) -> LocatorResult<HashMap<UserId, VisibilitySettings>> {
        let rows = self.store.settings_for_many(user_ids).await?;
        let rows: HashMap<UserId, StoredSettings> =
            rows.into_iter().map(|row| (row.user_id, row)).collect();

        let custom_owners: Vec<UserId> = rows
            .values()
            .filter(|row| row.visibility_mode == VisibilityMode::Custom.as_str())
            .map(|row| row.user_id)
            .collect();
        let allow_lists = if custom_owners.is_empty() {
            HashMap::new()
        } else {
            self.store.allow_lists_for(&custom_owners).await?
        };

        Ok(user_ids
            .iter()
            .map(|id| (*id, resolve_settings(*id, rows.get(id), allow_lists.get(id))))
            .collect())
    }

    pub async fn can_view(&self, owner_id: UserId, viewer_id: UserId) -> LocatorResult<bool> {
        if owner_id == viewer_id {
            return Ok(true);
        }

        let settings = self.settings_for(owner_id).await?;
        let are_friends = match settings.audience {
            // No friendship lookup needed to answer these two.
            Audience::All => return Ok(true),
            Audience::None => return Ok(false),
            _ => self.friends.are_friends(owner_id, viewer_id).await?,
        };
        Ok(permits(&settings, viewer_id, are_friends))
    }

    /// Validates and stores mode, tier and, for custom mode, the allow-list.
    /// Nothing is written when validation fails.
    pub async fn update_settings(
        &self,
        user_id: UserId,
        mode: &str,
        accuracy_level: &str,
        allowed_user_ids: &[UserId],
    ) -> LocatorResult<VisibilitySettings> {
        let mode: VisibilityMode = mode.parse()?;
        let accuracy: AccuracyTier = accuracy_level.parse()?;

        let allowed: HashSet<UserId> = allowed_user_ids
            .iter()
            .copied()
            .filter(|id| *id != user_id)
            .collect();

        let audience = match mode {
            VisibilityMode::Custom if allowed.is_empty() => {
                return Err(LocatorError::InvalidArgument(
                    "allowed_user_ids must not be empty for custom visibility".to_string(),
                ));
            }
            VisibilityMode::Custom => Audience::Custom(allowed),
            _ if !allowed.is_empty() => {
                return Err(LocatorError::InvalidArgument(format!(
                    "allowed_user_ids is only accepted for custom visibility, not '{}'",
                    mode
                )));
            }
            VisibilityMode::All => Audience::All,
            VisibilityMode::Friends => Audience::Friends,
            VisibilityMode::None => Audience::None,
        };

        self.store
            .save_settings(user_id, mode, accuracy, audience.allow_list(), Utc::now())
            .await?;

        info!("Visibility for {} set to {} / {}", user_id, mode, accuracy);
        Ok(VisibilitySettings { user_id, audience, accuracy })
    }

    /// Changes only the tier; mode and allow-list stay as they are.
    pub async fn set_accuracy_tier(&self, user_id: UserId, accuracy: AccuracyTier) -> LocatorResult<()> {
        self.store.save_accuracy(user_id, accuracy, Utc::now()).await?;
        Ok(())
    }

    /// Current allow-list, empty unless the owner is in custom mode.
    pub async fn allowed_viewers(&self, owner_id: UserId) -> LocatorResult<HashSet<UserId>> {
        let settings = self.settings_for(owner_id).await?;
        Ok(match settings.audience {
            Audience::Custom(allowed) => allowed,
            _ => HashSet::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{MemoryStore, VisibilityRepository};
    use std::sync::Arc;
    use uuid::Uuid;

    struct Fixture {
        store: MemoryStore,
        graph: FriendGraph,
        policy: VisibilityPolicy,
    }

    fn fixture() -> Fixture {
        let store = MemoryStore::new();
        let shared: SharedStore = Arc::new(store.clone());
        let graph = FriendGraph::new(shared.clone());
        let policy = VisibilityPolicy::new(shared, graph.clone());
        Fixture { store, graph, policy }
    }

    async fn befriend(graph: &FriendGraph, a: UserId, b: UserId) {
        let request = graph.send_request(a, b).await.unwrap();
        graph.accept_request(request.id, b).await.unwrap();
    }

    #[tokio::test]
    async fn test_defaults_are_friends_only() {
        let f = fixture();
        let (owner, friend, stranger) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        befriend(&f.graph, owner, friend).await;

        let settings = f.policy.settings_for(owner).await.unwrap();
        assert_eq!(settings, VisibilitySettings::default_for(owner));
        assert!(f.policy.can_view(owner, friend).await.unwrap());
        assert!(!f.policy.can_view(owner, stranger).await.unwrap());
        assert!(f.policy.can_view(owner, owner).await.unwrap());
    }

    #[tokio::test]
    async fn test_mode_none_hides_from_friends() {
        let f = fixture();
        let (owner, friend) = (Uuid::new_v4(), Uuid::new_v4());
        befriend(&f.graph, owner, friend).await;

        f.policy.update_settings(owner, "none", "precise", &[]).await.unwrap();
        assert!(!f.policy.can_view(owner, friend).await.unwrap());
        assert!(!f.policy.can_view(owner, Uuid::new_v4()).await.unwrap());
    }

    #[tokio::test]
    async fn test_mode_all_shows_strangers() {
        let f = fixture();
        let owner = Uuid::new_v4();
        f.policy.update_settings(owner, "all", "city", &[]).await.unwrap();
        assert!(f.policy.can_view(owner, Uuid::new_v4()).await.unwrap());
    }

    #[tokio::test]
    async fn test_custom_requires_friendship_and_membership() {
        let f = fixture();
        let owner = Uuid::new_v4();
        let (listed_friend, unlisted_friend, listed_stranger) =
            (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        befriend(&f.graph, owner, listed_friend).await;
        befriend(&f.graph, unlisted_friend, owner).await;

        f.policy
            .update_settings(owner, "custom", "approximate", &[listed_friend, listed_stranger])
            .await
            .unwrap();

        assert!(f.policy.can_view(owner, listed_friend).await.unwrap());
        assert!(!f.policy.can_view(owner, unlisted_friend).await.unwrap());
        // On the list but not a friend: still hidden.
        assert!(!f.policy.can_view(owner, listed_stranger).await.unwrap());
    }

    #[tokio::test]
    async fn test_custom_with_empty_list_is_rejected() {
        let f = fixture();
        let owner = Uuid::new_v4();

        let err = f.policy.update_settings(owner, "custom", "precise", &[]).await.unwrap_err();
        assert!(matches!(err, LocatorError::InvalidArgument(_)));

        // Only the owner on the list counts as empty too.
        let err = f.policy.update_settings(owner, "custom", "precise", &[owner]).await.unwrap_err();
        assert!(matches!(err, LocatorError::InvalidArgument(_)));

        assert!(f.store.settings_for(owner).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_invalid_enums_and_stray_list_are_rejected() {
        let f = fixture();
        let owner = Uuid::new_v4();

        for (mode, tier, list) in [
            ("everyone", "precise", vec![]),
            ("friends", "street", vec![]),
            ("friends", "precise", vec![Uuid::new_v4()]),
        ] {
            let err = f.policy.update_settings(owner, mode, tier, &list).await.unwrap_err();
            assert!(matches!(err, LocatorError::InvalidArgument(_)), "{} {}", mode, tier);
        }
        assert!(f.store.settings_for(owner).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_allow_list_ignored_outside_custom() {
        let f = fixture();
        let (owner, viewer) = (Uuid::new_v4(), Uuid::new_v4());
        befriend(&f.graph, owner, viewer).await;

        f.policy.update_settings(owner, "custom", "precise", &[viewer, viewer]).await.unwrap();
        assert_eq!(f.policy.allowed_viewers(owner).await.unwrap(), HashSet::from([viewer]));

        f.policy.update_settings(owner, "friends", "city", &[]).await.unwrap();
        assert!(f.policy.allowed_viewers(owner).await.unwrap().is_empty());
        assert_eq!(f.policy.settings_for(owner).await.unwrap().accuracy, AccuracyTier::City);
    }

    #[tokio::test]
    async fn test_malformed_row_falls_back_to_defaults() {
        let f = fixture();
        let (owner, stranger) = (Uuid::new_v4(), Uuid::new_v4());
        f.store
            .seed_settings_row(StoredSettings {
                user_id: owner,
                visibility_mode: "all".to_string(),
                accuracy_level: "blurry".to_string(),
                updated_at: Utc::now(),
            })
            .await;

        // Never fails open to `all`.
        assert_eq!(f.policy.settings_for(owner).await.unwrap(), VisibilitySettings::default_for(owner));
        assert!(!f.policy.can_view(owner, stranger).await.unwrap());

        let many = f.policy.settings_for_many(&[owner, stranger]).await.unwrap();
        assert_eq!(many[&owner], VisibilitySettings::default_for(owner));
        assert_eq!(many[&stranger], VisibilitySettings::default_for(stranger));
    }

    #[tokio::test]
    async fn test_accuracy_only_update_keeps_mode() {
        let f = fixture();
        let (owner, viewer) = (Uuid::new_v4(), Uuid::new_v4());
        f.policy.update_settings(owner, "custom", "precise", &[viewer]).await.unwrap();

        f.policy.set_accuracy_tier(owner, AccuracyTier::City).await.unwrap();
        let settings = f.policy.settings_for(owner).await.unwrap();
        assert_eq!(settings.audience, Audience::Custom(HashSet::from([viewer])));
        assert_eq!(settings.accuracy, AccuracyTier::City);

        let fresh = Uuid::new_v4();
        f.policy.set_accuracy_tier(fresh, AccuracyTier::Approximate).await.unwrap();
        let settings = f.policy.settings_for(fresh).await.unwrap();
        assert_eq!(settings.audience, Audience::Friends);
        assert_eq!(settings.accuracy, AccuracyTier::Approximate);
    }

    #[test]
    fn test_permits_table() {
        let owner = Uuid::new_v4();
        let viewer = Uuid::new_v4();
        let with = |audience| VisibilitySettings {
            user_id: owner,
            audience,
            accuracy: AccuracyTier::Precise,
        };

        assert!(permits(&with(Audience::All), viewer, false));
        assert!(!permits(&with(Audience::None), viewer, true));
        assert!(permits(&with(Audience::Friends), viewer, true));
        assert!(!permits(&with(Audience::Friends), viewer, false));
        let listed = with(Audience::Custom(HashSet::from([viewer])));
        assert!(permits(&listed, viewer, true));
        assert!(!permits(&listed, viewer, false));
        assert!(!permits(&with(Audience::Custom(HashSet::new())), viewer, true));
    }
}
