pub mod changes;
pub mod snapshot;

pub use changes::{diff, ChangeRecord, Classification, TrackedField};
pub use snapshot::Snapshot;
