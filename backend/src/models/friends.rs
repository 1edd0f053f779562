use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::UserId;
use super::visibility::UnknownVariant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FriendRequestStatus {
    Pending,
    Accepted,
    Rejected,
}

impl FriendRequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FriendRequestStatus::Pending => "pending",
            FriendRequestStatus::Accepted => "accepted",
            FriendRequestStatus::Rejected => "rejected",
        }
    }
}

impl FromStr for FriendRequestStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(FriendRequestStatus::Pending),
            "accepted" => Ok(FriendRequestStatus::Accepted),
            "rejected" => Ok(FriendRequestStatus::Rejected),
            other => Err(UnknownVariant {
                kind: "friend_request_status",
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for FriendRequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Directed friendship handshake. Never deleted; kept for status lookups.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FriendRequest {
    pub id: Uuid,
    pub sender_id: UserId,
    pub receiver_id: UserId,
    pub status: FriendRequestStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Storage key of a friendship: the two ids ordered so that `user_a < user_b`.
/// `(A, B)` and `(B, A)` always produce the same pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FriendPair {
    user_a: UserId,
    user_b: UserId,
}

impl FriendPair {
    /// Returns `None` for a self-pair, which can never be a friendship.
    pub fn new(first: UserId, second: UserId) -> Option<Self> {
        match first.cmp(&second) {
            std::cmp::Ordering::Less => Some(Self { user_a: first, user_b: second }),
            std::cmp::Ordering::Greater => Some(Self { user_a: second, user_b: first }),
            std::cmp::Ordering::Equal => None,
        }
    }

    pub fn user_a(&self) -> UserId {
        self.user_a
    }

    pub fn user_b(&self) -> UserId {
        self.user_b
    }

    pub fn contains(&self, user_id: UserId) -> bool {
        self.user_a == user_id || self.user_b == user_id
    }

    /// The opposite side of the pair from `user_id`, if `user_id` is in it.
    pub fn other(&self, user_id: UserId) -> Option<UserId> {
        if self.user_a == user_id {
            Some(self.user_b)
        } else if self.user_b == user_id {
            Some(self.user_a)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Friendship {
    pub user_a: UserId,
    pub user_b: UserId,
    pub created_at: DateTime<Utc>,
}

impl Friendship {
    pub fn pair(&self) -> Option<FriendPair> {
        FriendPair::new(self.user_a, self.user_b)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FriendshipStatus {
    pub is_friend: bool,
    pub has_pending_sent: bool,
    pub has_pending_received: bool,
    pub sent_request_id: Option<Uuid>,
    pub received_request_id: Option<Uuid>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pair_is_order_independent() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let forward = FriendPair::new(a, b).unwrap();
        let backward = FriendPair::new(b, a).unwrap();
        assert_eq!(forward, backward);
        assert!(forward.user_a() < forward.user_b());
        assert_eq!(forward.other(a), Some(b));
        assert_eq!(forward.other(b), Some(a));
        assert_eq!(forward.other(Uuid::new_v4()), None);
    }

    #[test]
    fn test_self_pair_is_rejected() {
        let a = Uuid::new_v4();
        assert!(FriendPair::new(a, a).is_none());
    }
}
