use serde::{Deserialize, Serialize};

use crate::utils::{contains_ignore_case, format_phone};

/// A contact record as the remote API represents it.
///
/// An `id` of `0` marks a record that has not been persisted yet; the
/// server assigns the real id on create. Cache lookups compare by id only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    #[serde(default)]
    pub id: i64,
    #[serde(rename = "firstName")]
    pub first_name: String,
    #[serde(rename = "lastName")]
    pub last_name: String,
    pub phone: String,
    pub email: String,
    pub address: Option<String>,
}

impl Contact {
    /// True once the server has assigned this record an id.
    pub fn is_persisted(&self) -> bool {
        self.id != 0
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// Phone number normalized for display.
    pub fn display_phone(&self) -> String {
        format_phone(&self.phone)
    }

    /// Snapshot the editable fields into a standalone payload.
    /// The copy shares nothing with this record.
    pub fn fields(&self) -> ContactFields {
        ContactFields {
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            phone: self.phone.clone(),
            email: self.email.clone(),
            address: self.address.clone(),
        }
    }

    /// Check if this contact matches a free-text search query.
    /// Matches are case-insensitive substrings over first name, last name,
    /// email, phone, and address when one is set.
    pub fn matches_query(&self, query: &str) -> bool {
        contains_ignore_case(&self.first_name, query)
            || contains_ignore_case(&self.last_name, query)
            || contains_ignore_case(&self.email, query)
            || contains_ignore_case(&self.phone, query)
            || self
                .address
                .as_ref()
                .map(|s| contains_ignore_case(s, query))
                .unwrap_or(false)
    }
}

/// The editable field set of a contact.
///
/// This is the request payload for both create and update calls, and the
/// working copy held by an open draft.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContactFields {
    #[serde(rename = "firstName")]
    pub first_name: String,
    #[serde(rename = "lastName")]
    pub last_name: String,
    pub phone: String,
    pub email: String,
    pub address: Option<String>,
}

impl ContactFields {
    /// Build a cache record from these fields and a server-assigned id.
    pub fn into_contact(self, id: i64) -> Contact {
        Contact {
            id,
            first_name: self.first_name,
            last_name: self.last_name,
            phone: self.phone,
            email: self.email,
            address: self.address,
        }
    }
}
