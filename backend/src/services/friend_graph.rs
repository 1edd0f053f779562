use std::collections::HashSet;

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use crate::db::{SharedStore, StoreError};
use crate::error::{LocatorError, LocatorResult};
use crate::models::{FriendPair, FriendRequest, FriendshipStatus, Page, UserId};

/// Symmetric friendship relation plus the request handshake that builds it.
#[derive(Clone)]
pub struct FriendGraph {
    store: SharedStore,
}

impl FriendGraph {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    pub async fn send_request(&self, sender_id: UserId, receiver_id: UserId) -> LocatorResult<FriendRequest> {
        let pair = FriendPair::new(sender_id, receiver_id).ok_or(LocatorError::SelfReference)?;

        if self.store.friendship_exists(pair).await? {
            return Err(LocatorError::AlreadyFriends);
        }
        if self.store.pending_request_between(sender_id, receiver_id).await?.is_some() {
            return Err(LocatorError::DuplicateRequest);
        }

        // A concurrent send for the same pair loses on the unique index.
        let request = match self.store.insert_request(sender_id, receiver_id, Utc::now()).await {
            Ok(request) => request,
            Err(StoreError::UniqueViolation(_)) => return Err(LocatorError::DuplicateRequest),
            Err(e) => return Err(e.into()),
        };

        info!("Friend request {} sent from {} to {}", request.id, sender_id, receiver_id);
        Ok(request)
    }

    /// Accepts a pending request addressed to `acting_user` and creates the
    /// friendship in the same transaction.
    pub async fn accept_request(&self, request_id: Uuid, acting_user: UserId) -> LocatorResult<FriendRequest> {
        let request = self
            .store
            .accept_request(request_id, acting_user, Utc::now())
            .await?
            .ok_or(LocatorError::NotFound("friend request"))?;

        info!(
            "Friend request {} accepted, {} and {} are now friends",
            request.id, request.sender_id, request.receiver_id
        );
        Ok(request)
    }

    pub async fn reject_request(&self, request_id: Uuid, acting_user: UserId) -> LocatorResult<FriendRequest> {
        let request = self
            .store
            .reject_request(request_id, acting_user, Utc::now())
            .await?
            .ok_or(LocatorError::NotFound("friend request"))?;

        info!("Friend request {} rejected by {}", request.id, acting_user);
        Ok(request)
    }

    pub async fn remove_friendship(&self, user_id: UserId, other_id: UserId) -> LocatorResult<()> {
        let pair = FriendPair::new(user_id, other_id).ok_or(LocatorError::NotFound("friendship"))?;

        if !self.store.delete_friendship(pair).await? {
            return Err(LocatorError::NotFound("friendship"));
        }

        info!("Friendship between {} and {} removed", user_id, other_id);
        Ok(())
    }

    pub async fn are_friends(&self, user_id: UserId, other_id: UserId) -> LocatorResult<bool> {
        match FriendPair::new(user_id, other_id) {
            Some(pair) => Ok(self.store.friendship_exists(pair).await?),
            None => Ok(false),
        }
    }

    pub async fn friend_ids_of(&self, user_id: UserId) -> LocatorResult<HashSet<UserId>> {
        Ok(self.store.friend_ids_of(user_id).await?)
    }

    /// One page of friend ids, most recent friendships first.
    pub async fn friends(&self, user_id: UserId, page: Page) -> LocatorResult<Vec<UserId>> {
        let friendships = self.store.list_friendships(user_id, page).await?;
        Ok(friendships
            .iter()
            .filter_map(|f| f.pair().and_then(|pair| pair.other(user_id)))
            .collect())
    }

    pub async fn pending_received(&self, user_id: UserId, page: Page) -> LocatorResult<Vec<FriendRequest>> {
        Ok(self.store.pending_received(user_id, page).await?)
    }

    pub async fn pending_sent(&self, user_id: UserId, page: Page) -> LocatorResult<Vec<FriendRequest>> {
        Ok(self.store.pending_sent(user_id, page).await?)
    }

    pub async fn friendship_status(&self, user_id: UserId, other_id: UserId) -> LocatorResult<FriendshipStatus> {
        let Some(pair) = FriendPair::new(user_id, other_id) else {
            return Ok(FriendshipStatus::default());
        };

        let is_friend = self.store.friendship_exists(pair).await?;
        let pending = self.store.pending_request_between(user_id, other_id).await?;

        let mut status = FriendshipStatus {
            is_friend,
            ..FriendshipStatus::default()
        };
        if let Some(request) = pending {
            if request.sender_id == user_id {
                status.has_pending_sent = true;
                status.sent_request_id = Some(request.id);
            } else {
                status.has_pending_received = true;
                status.received_request_id = Some(request.id);
            }
        }
        Ok(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{FriendRepository, MemoryStore};
    use crate::models::FriendRequestStatus;
    use std::sync::Arc;

    fn graph() -> FriendGraph {
        FriendGraph::new(Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn test_accepted_request_makes_symmetric_friendship() {
        let graph = graph();
        let (u1, u2) = (Uuid::new_v4(), Uuid::new_v4());

        let request = graph.send_request(u1, u2).await.unwrap();
        assert_eq!(request.status, FriendRequestStatus::Pending);
        assert!(!graph.are_friends(u1, u2).await.unwrap());

        let accepted = graph.accept_request(request.id, u2).await.unwrap();
        assert_eq!(accepted.status, FriendRequestStatus::Accepted);
        assert!(graph.are_friends(u1, u2).await.unwrap());
        assert!(graph.are_friends(u2, u1).await.unwrap());

        assert!(matches!(graph.send_request(u1, u2).await, Err(LocatorError::AlreadyFriends)));
        assert!(matches!(graph.send_request(u2, u1).await, Err(LocatorError::AlreadyFriends)));
    }

    #[tokio::test]
    async fn test_self_request_is_rejected() {
        let graph = graph();
        let u = Uuid::new_v4();
        assert!(matches!(graph.send_request(u, u).await, Err(LocatorError::SelfReference)));
    }

    #[tokio::test]
    async fn test_duplicate_pending_in_either_direction() {
        let graph = graph();
        let (u1, u2) = (Uuid::new_v4(), Uuid::new_v4());
        graph.send_request(u1, u2).await.unwrap();

        assert!(matches!(graph.send_request(u1, u2).await, Err(LocatorError::DuplicateRequest)));
        assert!(matches!(graph.send_request(u2, u1).await, Err(LocatorError::DuplicateRequest)));
    }

    #[tokio::test]
    async fn test_only_receiver_can_answer() {
        let graph = graph();
        let (sender, receiver) = (Uuid::new_v4(), Uuid::new_v4());
        let request = graph.send_request(sender, receiver).await.unwrap();

        assert!(matches!(
            graph.accept_request(request.id, sender).await,
            Err(LocatorError::NotFound(_))
        ));
        assert!(matches!(
            graph.reject_request(request.id, Uuid::new_v4()).await,
            Err(LocatorError::NotFound(_))
        ));
        assert!(matches!(
            graph.accept_request(Uuid::new_v4(), receiver).await,
            Err(LocatorError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_rejection_is_terminal() {
        let graph = graph();
        let (sender, receiver) = (Uuid::new_v4(), Uuid::new_v4());
        let request = graph.send_request(sender, receiver).await.unwrap();

        let rejected = graph.reject_request(request.id, receiver).await.unwrap();
        assert_eq!(rejected.status, FriendRequestStatus::Rejected);
        assert!(!graph.are_friends(sender, receiver).await.unwrap());

        // No longer pending, so it can be neither accepted nor rejected again.
        assert!(matches!(
            graph.accept_request(request.id, receiver).await,
            Err(LocatorError::NotFound(_))
        ));
        assert!(matches!(
            graph.reject_request(request.id, receiver).await,
            Err(LocatorError::NotFound(_))
        ));

        // A fresh request is allowed once the old one is closed.
        graph.send_request(receiver, sender).await.unwrap();
    }

    #[tokio::test]
    async fn test_remove_missing_friendship_is_not_found() {
        let graph = graph();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());

        assert!(matches!(graph.remove_friendship(a, b).await, Err(LocatorError::NotFound(_))));
        assert!(!graph.are_friends(a, b).await.unwrap());
        assert!(graph.friend_ids_of(a).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_remove_keeps_request_history() {
        let graph = graph();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let request = graph.send_request(a, b).await.unwrap();
        graph.accept_request(request.id, b).await.unwrap();

        graph.remove_friendship(b, a).await.unwrap();
        assert!(!graph.are_friends(a, b).await.unwrap());
        assert!(matches!(graph.remove_friendship(a, b).await, Err(LocatorError::NotFound(_))));

        // Accepted request stays accepted; a new handshake can start.
        let again = graph.send_request(a, b).await.unwrap();
        assert_ne!(again.id, request.id);
    }

    #[tokio::test]
    async fn test_friend_ids_cover_both_sides() {
        let graph = graph();
        let hub = Uuid::new_v4();
        let spokes: Vec<UserId> = (0..4).map(|_| Uuid::new_v4()).collect();
        for (i, spoke) in spokes.iter().enumerate() {
            // Alternate who sends so the hub lands on both sides of the pair.
            let (sender, receiver) = if i % 2 == 0 { (hub, *spoke) } else { (*spoke, hub) };
            let request = graph.send_request(sender, receiver).await.unwrap();
            graph.accept_request(request.id, receiver).await.unwrap();
        }

        let ids = graph.friend_ids_of(hub).await.unwrap();
        assert_eq!(ids, spokes.iter().copied().collect::<HashSet<_>>());
        assert_eq!(graph.friend_ids_of(spokes[0]).await.unwrap(), HashSet::from([hub]));

        let first_page = graph.friends(hub, Page { limit: 3, offset: 0 }).await.unwrap();
        let second_page = graph.friends(hub, Page { limit: 3, offset: 3 }).await.unwrap();
        assert_eq!(first_page.len(), 3);
        assert_eq!(second_page.len(), 1);
    }

    #[tokio::test]
    async fn test_friendship_status_directions() {
        let graph = graph();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let request = graph.send_request(a, b).await.unwrap();

        let from_a = graph.friendship_status(a, b).await.unwrap();
        assert!(from_a.has_pending_sent && !from_a.has_pending_received && !from_a.is_friend);
        assert_eq!(from_a.sent_request_id, Some(request.id));

        let from_b = graph.friendship_status(b, a).await.unwrap();
        assert!(from_b.has_pending_received && !from_b.has_pending_sent);
        assert_eq!(from_b.received_request_id, Some(request.id));

        assert_eq!(graph.friendship_status(a, a).await.unwrap(), FriendshipStatus::default());

        assert_eq!(graph.pending_sent(a, Page::default()).await.unwrap().len(), 1);
        assert_eq!(graph.pending_received(b, Page::default()).await.unwrap().len(), 1);
        assert!(graph.pending_received(a, Page::default()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_request_left_over_from_race_can_be_accepted() {
        let store = MemoryStore::new();
        let graph = FriendGraph::new(Arc::new(store.clone()));
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let request = graph.send_request(a, b).await.unwrap();
        graph.accept_request(request.id, b).await.unwrap();

        // A send from b that passed its friendship check before the accept committed.
        let stray = store.insert_request(b, a, Utc::now()).await.unwrap();

        let accepted = graph.accept_request(stray.id, a).await.unwrap();
        assert_eq!(accepted.status, FriendRequestStatus::Accepted);
        assert!(graph.are_friends(a, b).await.unwrap());
        assert_eq!(graph.friends(a, Page::default()).await.unwrap(), vec![b]);

        let status = graph.friendship_status(a, b).await.unwrap();
        assert!(status.is_friend);
        assert!(!status.has_pending_received && !status.has_pending_sent);
    }
}
