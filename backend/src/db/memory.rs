//! In-process store used by the test-suite and for running without Postgres.
//!
//! All tables sit behind one `RwLock`; every trait method takes the lock once,
//! so multi-row transitions are a single critical section.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::repository::{
    FriendRepository, PresenceRepository, StoreError, StoreResult, UserDirectory,
    VisibilityRepository,
};
use crate::models::{
    AccuracyTier, FriendPair, FriendRequest, FriendRequestStatus, Friendship, Page, Presence,
    PresenceUpdate, StoredSettings, UserId, UserProfile, VisibilityMode,
};

#[derive(Debug, Default)]
struct Tables {
    users: HashMap<UserId, UserProfile>,
    presences: HashMap<UserId, Presence>,
    settings: HashMap<UserId, StoredSettings>,
    allowed: HashMap<UserId, HashSet<UserId>>,
    friendships: HashMap<FriendPair, Friendship>,
    // Insertion order doubles as the tie-breaker for equal timestamps.
    requests: Vec<FriendRequest>,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a user with the directory.
    pub async fn seed_user(&self, id: UserId, name: &str) {
        self.tables.write().await.users.insert(
            id,
            UserProfile {
                id,
                name: name.to_string(),
                avatar_url: None,
            },
        );
    }

    /// Writes a settings row verbatim, bypassing validation.
    pub async fn seed_settings_row(&self, row: StoredSettings) {
        self.tables.write().await.settings.insert(row.user_id, row);
    }
}

fn page_of<T: Clone>(items: Vec<&T>, page: Page) -> Vec<T> {
    items
        .into_iter()
        .skip(page.offset as usize)
        .take(page.limit as usize)
        .cloned()
        .collect()
}

impl Tables {
    /// Requests matching `filter`, newest first.
    fn requests_where(&self, filter: impl Fn(&FriendRequest) -> bool) -> Vec<&FriendRequest> {
        let mut matching: Vec<&FriendRequest> = self.requests.iter().rev().filter(|r| filter(r)).collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        matching
    }

    fn pending_mut(&mut self, request_id: Uuid, receiver_id: UserId) -> Option<&mut FriendRequest> {
        self.requests.iter_mut().find(|r| {
            r.id == request_id && r.receiver_id == receiver_id && r.status == FriendRequestStatus::Pending
        })
    }
}

#[async_trait]
impl FriendRepository for MemoryStore {
    async fn friendship_exists(&self, pair: FriendPair) -> StoreResult<bool> {
        Ok(self.tables.read().await.friendships.contains_key(&pair))
    }

    async fn delete_friendship(&self, pair: FriendPair) -> StoreResult<bool> {
        Ok(self.tables.write().await.friendships.remove(&pair).is_some())
    }

    async fn friend_ids_of(&self, user_id: UserId) -> StoreResult<HashSet<UserId>> {
        let tables = self.tables.read().await;
        Ok(tables.friendships.keys().filter_map(|pair| pair.other(user_id)).collect())
    }

    async fn list_friendships(&self, user_id: UserId, page: Page) -> StoreResult<Vec<Friendship>> {
        let tables = self.tables.read().await;
        let mut touching: Vec<&Friendship> = tables
            .friendships
            .iter()
            .filter(|(pair, _)| pair.contains(user_id))
            .map(|(_, friendship)| friendship)
            .collect();
        touching.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| (a.user_a, a.user_b).cmp(&(b.user_a, b.user_b)))
        });
        Ok(page_of(touching, page))
    }

    async fn pending_request_between(
        &self,
        first: UserId,
        second: UserId,
    ) -> StoreResult<Option<FriendRequest>> {
        let tables = self.tables.read().await;
        Ok(tables
            .requests
            .iter()
            .find(|r| {
                r.status == FriendRequestStatus::Pending
                    && ((r.sender_id == first && r.receiver_id == second)
                        || (r.sender_id == second && r.receiver_id == first))
            })
            .cloned())
    }

    async fn insert_request(
        &self,
        sender_id: UserId,
        receiver_id: UserId,
        now: DateTime<Utc>,
    ) -> StoreResult<FriendRequest> {
        let mut tables = self.tables.write().await;
        let duplicate = tables.requests.iter().any(|r| {
            r.status == FriendRequestStatus::Pending
                && FriendPair::new(r.sender_id, r.receiver_id) == FriendPair::new(sender_id, receiver_id)
        });
        if duplicate {
            return Err(StoreError::UniqueViolation(
                "pending friend request for this pair".to_string(),
            ));
        }

        let request = FriendRequest {
            id: Uuid::new_v4(),
            sender_id,
            receiver_id,
            status: FriendRequestStatus::Pending,
            created_at: now,
            updated_at: now,
        };
        tables.requests.push(request.clone());
        Ok(request)
    }

    async fn accept_request(
        &self,
        request_id: Uuid,
        receiver_id: UserId,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<FriendRequest>> {
        let mut tables = self.tables.write().await;
        let Some(request) = tables.pending_mut(request_id, receiver_id) else {
            return Ok(None);
        };
        let pair = FriendPair::new(request.sender_id, request.receiver_id).ok_or_else(|| {
            StoreError::Corrupt(format!("friend request {} addressed to its sender", request_id))
        })?;

        let request = match tables.pending_mut(request_id, receiver_id) {
            Some(request) => {
                request.status = FriendRequestStatus::Accepted;
                request.updated_at = now;
                request.clone()
            }
            None => return Ok(None),
        };
        tables.friendships.entry(pair).or_insert(Friendship {
            user_a: pair.user_a(),
            user_b: pair.user_b(),
            created_at: now,
        });
        Ok(Some(request))
    }

    async fn reject_request(
        &self,
        request_id: Uuid,
        receiver_id: UserId,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<FriendRequest>> {
        let mut tables = self.tables.write().await;
        Ok(tables.pending_mut(request_id, receiver_id).map(|request| {
            request.status = FriendRequestStatus::Rejected;
            request.updated_at = now;
            request.clone()
        }))
    }

    async fn pending_received(&self, user_id: UserId, page: Page) -> StoreResult<Vec<FriendRequest>> {
        let tables = self.tables.read().await;
        let matching = tables.requests_where(|r| {
            r.receiver_id == user_id && r.status == FriendRequestStatus::Pending
        });
        Ok(page_of(matching, page))
    }

    async fn pending_sent(&self, user_id: UserId, page: Page) -> StoreResult<Vec<FriendRequest>> {
        let tables = self.tables.read().await;
        let matching = tables.requests_where(|r| {
            r.sender_id == user_id && r.status == FriendRequestStatus::Pending
        });
        Ok(page_of(matching, page))
    }
}

#[async_trait]
impl VisibilityRepository for MemoryStore {
    async fn settings_for(&self, user_id: UserId) -> StoreResult<Option<StoredSettings>> {
        Ok(self.tables.read().await.settings.get(&user_id).cloned())
    }

    async fn settings_for_many(&self, user_ids: &[UserId]) -> StoreResult<Vec<StoredSettings>> {
        let tables = self.tables.read().await;
        Ok(user_ids
            .iter()
            .filter_map(|id| tables.settings.get(id).cloned())
            .collect())
    }

    async fn allow_list(&self, owner_id: UserId) -> StoreResult<HashSet<UserId>> {
        Ok(self
            .tables
            .read()
            .await
            .allowed
            .get(&owner_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn allow_lists_for(
        &self,
        owner_ids: &[UserId],
    ) -> StoreResult<HashMap<UserId, HashSet<UserId>>> {
        let tables = self.tables.read().await;
        Ok(owner_ids
            .iter()
            .filter_map(|id| tables.allowed.get(id).map(|list| (*id, list.clone())))
            .collect())
    }

    async fn save_settings(
        &self,
        user_id: UserId,
        mode: VisibilityMode,
        accuracy: AccuracyTier,
        allow_list: Option<&HashSet<UserId>>,
        now: DateTime<Utc>,
    ) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        tables.settings.insert(
            user_id,
            StoredSettings {
                user_id,
                visibility_mode: mode.as_str().to_string(),
                accuracy_level: accuracy.as_str().to_string(),
                updated_at: now,
            },
        );
        if let Some(allowed) = allow_list {
            tables.allowed.insert(user_id, allowed.clone());
        }
        Ok(())
    }

    async fn save_accuracy(
        &self,
        user_id: UserId,
        accuracy: AccuracyTier,
        now: DateTime<Utc>,
    ) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        let row = tables.settings.entry(user_id).or_insert_with(|| StoredSettings {
            user_id,
            visibility_mode: VisibilityMode::default().as_str().to_string(),
            accuracy_level: String::new(),
            updated_at: now,
        });
        row.accuracy_level = accuracy.as_str().to_string();
        row.updated_at = now;
        Ok(())
    }
}

#[async_trait]
impl PresenceRepository for MemoryStore {
    async fn upsert_presence(&self, update: &PresenceUpdate, now: DateTime<Utc>) -> StoreResult<Presence> {
        let presence = Presence {
            user_id: update.user_id,
            latitude: update.latitude,
            longitude: update.longitude,
            accuracy_meters: update.accuracy_meters,
            is_available: update.is_available,
            is_online: true,
            status: update.status.clone(),
            last_seen_at: now,
        };
        self.tables
            .write()
            .await
            .presences
            .insert(update.user_id, presence.clone());
        Ok(presence)
    }

    async fn presence_of(&self, user_id: UserId) -> StoreResult<Option<Presence>> {
        Ok(self.tables.read().await.presences.get(&user_id).cloned())
    }

    async fn online_presences_except(&self, viewer_id: UserId) -> StoreResult<Vec<Presence>> {
        let tables = self.tables.read().await;
        Ok(tables
            .presences
            .values()
            .filter(|p| p.is_online && p.user_id != viewer_id)
            .cloned()
            .collect())
    }

    async fn stale_online_ids(&self, cutoff: DateTime<Utc>) -> StoreResult<Vec<UserId>> {
        let tables = self.tables.read().await;
        Ok(tables
            .presences
            .values()
            .filter(|p| p.is_online && p.last_seen_at < cutoff)
            .map(|p| p.user_id)
            .collect())
    }

    async fn mark_offline(&self, user_ids: &[UserId]) -> StoreResult<u64> {
        let mut tables = self.tables.write().await;
        let mut touched = 0;
        for id in user_ids {
            if let Some(presence) = tables.presences.get_mut(id) {
                presence.is_online = false;
                presence.is_available = false;
                touched += 1;
            }
        }
        Ok(touched)
    }
}

#[async_trait]
impl UserDirectory for MemoryStore {
    async fn profiles(&self, user_ids: &[UserId]) -> StoreResult<HashMap<UserId, UserProfile>> {
        let tables = self.tables.read().await;
        Ok(user_ids
            .iter()
            .filter_map(|id| tables.users.get(id).map(|user| (*id, user.clone())))
            .collect())
    }

    async fn user_exists(&self, user_id: UserId) -> StoreResult<bool> {
        Ok(self.tables.read().await.users.contains_key(&user_id))
    }
}
