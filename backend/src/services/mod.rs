pub mod friend_graph;
pub mod locator;
pub mod presence;
pub mod proximity;
pub mod sweeper;
pub mod visibility;

pub use friend_graph::FriendGraph;
pub use locator::LocatorService;
pub use presence::PresenceStore;
pub use sweeper::{PresenceSweeper, SweepReport, SweeperHandle};
pub use visibility::VisibilityPolicy;
