//! Data models for the remote contact book.
//!
//! - `Contact`: a persisted record as the API returns it
//! - `ContactFields`: the editable field set sent on create/update

pub mod contact;

pub use contact::{Contact, ContactFields};
