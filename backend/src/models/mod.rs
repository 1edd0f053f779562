pub mod friends;
pub mod pagination;
pub mod presence;
pub mod users;
pub mod visibility;

/// Stable identifier supplied by the auth layer.
pub type UserId = uuid::Uuid;

pub use friends::{FriendPair, FriendRequest, FriendRequestStatus, Friendship, FriendshipStatus};
pub use pagination::{Page, PageQuery};
pub use presence::{LocationReport, Presence, PresenceUpdate, VisibleUser};
pub use users::UserProfile;
pub use visibility::{AccuracyTier, Audience, StoredSettings, UnknownVariant, VisibilityMode, VisibilitySettings};
