//! The remote contact API: service abstraction and HTTP implementation.

pub mod client;
pub mod error;

pub use client::ApiClient;
pub use error::ApiError;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use crate::models::{Contact, ContactFields};

/// The remote CRUD service a session synchronizes against.
///
/// The transport is opaque to the rest of the crate: anything that can
/// list, create, update and delete contacts can back a session. The
/// bundled [`ApiClient`] talks to the REST backend; tests substitute a
/// mock.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait RemoteContactService: Send + Sync {
    /// Fetch contacts, optionally filtered server-side by a search string.
    async fn list(&self, query: Option<String>) -> Result<Vec<Contact>, ApiError>;

    /// Create a contact. The server assigns the id in the returned record.
    async fn create(&self, fields: ContactFields) -> Result<Contact, ApiError>;

    /// Persist new field values for an existing contact.
    async fn update(&self, id: i64, fields: ContactFields) -> Result<(), ApiError>;

    /// Delete the contact with the given id.
    async fn delete(&self, id: i64) -> Result<(), ApiError>;
}
