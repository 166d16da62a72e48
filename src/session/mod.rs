//! Synchronization and edit-state control for the contact cache.

pub mod controller;

pub use controller::{
    Confirmation, ContactSession, Draft, DraftKind, SessionError, SessionEvent, SessionState,
};
