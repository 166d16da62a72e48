//! rolocache - a local cache and edit session for a remote contact book.
//!
//! This library keeps an in-memory contact list consistent with a remote
//! CRUD API while supporting local search and a create/edit draft
//! workflow:
//!
//! - [`ContactStore`]: the ordered local cache with change notifications
//! - [`ContactSession`]: the controller sequencing load, refresh,
//!   create/edit/save/cancel, confirmed delete and local filtering
//! - [`RemoteContactService`]: the abstract remote collaborator, with
//!   [`ApiClient`] as the bundled HTTP implementation
//!
//! The presentation layer drives a session with its command methods,
//! applies completed work via [`ContactSession::process_pending`] (or
//! [`ContactSession::next_event`]), and observes the store's change feed
//! for rendering.

pub mod api;
pub mod cache;
pub mod config;
pub mod models;
pub mod session;
pub mod utils;

pub use api::{ApiClient, ApiError, RemoteContactService};
pub use cache::{ContactStore, StoreError, StoreEvent, SyncStamp};
pub use config::Config;
pub use models::{Contact, ContactFields};
pub use session::{
    Confirmation, ContactSession, Draft, DraftKind, SessionError, SessionEvent, SessionState,
};
