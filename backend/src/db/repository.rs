//! Storage traits the services are written against.
//!
//! Every method is a single store round-trip. Methods that touch more than one
//! row to keep an invariant (`accept_request`, `save_settings`) are atomic in
//! every implementation: a reader sees either the old rows or the new ones.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    AccuracyTier, FriendPair, FriendRequest, Friendship, Page, Presence, PresenceUpdate,
    StoredSettings, UserId, UserProfile, VisibilityMode,
};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),
    #[error("atomic update rolled back: {0}")]
    Consistency(String),
    #[error("corrupt row: {0}")]
    Corrupt(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait FriendRepository: Send + Sync {
    async fn friendship_exists(&self, pair: FriendPair) -> StoreResult<bool>;

    /// Returns whether a row was deleted.
    async fn delete_friendship(&self, pair: FriendPair) -> StoreResult<bool>;

    async fn friend_ids_of(&self, user_id: UserId) -> StoreResult<HashSet<UserId>>;

    /// Friendships touching `user_id`, newest first.
    async fn list_friendships(&self, user_id: UserId, page: Page) -> StoreResult<Vec<Friendship>>;

    /// The pending request between two users, whichever of them sent it.
    async fn pending_request_between(
        &self,
        first: UserId,
        second: UserId,
    ) -> StoreResult<Option<FriendRequest>>;

    /// Fails with `UniqueViolation` if a pending request already exists for the
    /// unordered pair.
    async fn insert_request(
        &self,
        sender_id: UserId,
        receiver_id: UserId,
        now: DateTime<Utc>,
    ) -> StoreResult<FriendRequest>;

    /// Flips a pending request addressed to `receiver_id` to accepted and
    /// inserts the friendship in the same transaction. An existing friendship
    /// for the pair is kept as is. `None` when no such pending request exists.
    /// If the friendship insert fails the status change is rolled back and
    /// `Consistency` is returned.
    async fn accept_request(
        &self,
        request_id: Uuid,
        receiver_id: UserId,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<FriendRequest>>;

    async fn reject_request(
        &self,
        request_id: Uuid,
        receiver_id: UserId,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<FriendRequest>>;

    async fn pending_received(&self, user_id: UserId, page: Page) -> StoreResult<Vec<FriendRequest>>;

    async fn pending_sent(&self, user_id: UserId, page: Page) -> StoreResult<Vec<FriendRequest>>;
}

#[async_trait]
pub trait VisibilityRepository: Send + Sync {
    async fn settings_for(&self, user_id: UserId) -> StoreResult<Option<StoredSettings>>;

    async fn settings_for_many(&self, user_ids: &[UserId]) -> StoreResult<Vec<StoredSettings>>;

    async fn allow_list(&self, owner_id: UserId) -> StoreResult<HashSet<UserId>>;

    async fn allow_lists_for(
        &self,
        owner_ids: &[UserId],
    ) -> StoreResult<HashMap<UserId, HashSet<UserId>>>;

    /// Upserts mode and tier. With `Some(list)` the stored allow-list is
    /// replaced (delete all, then insert) inside the same transaction.
    async fn save_settings(
        &self,
        user_id: UserId,
        mode: VisibilityMode,
        accuracy: AccuracyTier,
        allow_list: Option<&HashSet<UserId>>,
        now: DateTime<Utc>,
    ) -> StoreResult<()>;

    /// Changes only the accuracy tier, creating default settings if absent.
    async fn save_accuracy(
        &self,
        user_id: UserId,
        accuracy: AccuracyTier,
        now: DateTime<Utc>,
    ) -> StoreResult<()>;
}

#[async_trait]
pub trait PresenceRepository: Send + Sync {
    /// Create-or-replace keyed by user id; sets `is_online` and `last_seen_at = now`.
    async fn upsert_presence(&self, update: &PresenceUpdate, now: DateTime<Utc>) -> StoreResult<Presence>;

    async fn presence_of(&self, user_id: UserId) -> StoreResult<Option<Presence>>;

    async fn online_presences_except(&self, viewer_id: UserId) -> StoreResult<Vec<Presence>>;

    /// Ids of online presences whose `last_seen_at` is before `cutoff`.
    async fn stale_online_ids(&self, cutoff: DateTime<Utc>) -> StoreResult<Vec<UserId>>;

    /// Sets `is_online = false, is_available = false`; returns rows touched.
    async fn mark_offline(&self, user_ids: &[UserId]) -> StoreResult<u64>;
}

/// Lookup into the account service's user records.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn profiles(&self, user_ids: &[UserId]) -> StoreResult<HashMap<UserId, UserProfile>>;

    async fn user_exists(&self, user_id: UserId) -> StoreResult<bool>;
}

pub trait Store: FriendRepository + VisibilityRepository + PresenceRepository + UserDirectory {}

impl<T> Store for T where T: FriendRepository + VisibilityRepository + PresenceRepository + UserDirectory {}

pub type SharedStore = Arc<dyn Store>;
