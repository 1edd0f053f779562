pub mod connection;
pub mod friends;
pub mod memory;
pub mod migrations;
pub mod presence;
pub mod repository;
pub mod users;
pub mod visibility;

pub use connection::{get_db_pool, DatabaseConfig, PgStore};
pub use memory::MemoryStore;
pub use repository::{
    FriendRepository, PresenceRepository, SharedStore, Store, StoreError, StoreResult,
    UserDirectory, VisibilityRepository,
};
