//! The local, session-scoped contact cache.

pub mod store;

pub use store::{ContactStore, StoreError, StoreEvent, SyncStamp};
