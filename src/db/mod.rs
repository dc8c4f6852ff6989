pub mod connection;
pub mod snapshots;
pub mod store;

pub use connection::{init_db, Database};
pub use snapshots::SqliteStore;
pub use store::SnapshotStore;
