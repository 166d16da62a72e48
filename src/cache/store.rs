//! In-memory contact store.
//!
//! `ContactStore` holds the canonical, insertion-ordered set of contacts
//! for the session and provides the bulk/point mutations the session
//! controller applies after remote calls complete. Consumers that render
//! the list subscribe to its change feed instead of polling.

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{error, warn};

use crate::models::Contact;

/// Capacity of the change-notification channel.
/// 64 comfortably covers a burst of point mutations between render frames.
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Consider the cached list stale this long after the last successful sync.
const SYNC_STALE_MINUTES: i64 = 60;

/// Cache corruption signals. These indicate a bug in the mutation
/// sequence, not a user-recoverable condition.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("cache holds more than one contact with id {0}")]
    DuplicateId(i64),
}

/// Change notifications emitted by [`ContactStore`] mutations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreEvent {
    /// The entire cache was replaced (load, refresh).
    Reset,
    /// A contact was inserted or updated in place.
    Upserted(i64),
    /// The contact with this id was removed.
    Removed(i64),
}

/// Insertion-ordered cache of contact records, unique by non-zero id.
///
/// Records with id 0 are unsaved placeholders and may repeat; every
/// persisted record appears at most once.
pub struct ContactStore {
    entries: Vec<Contact>,
    events: broadcast::Sender<StoreEvent>,
}

impl ContactStore {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            entries: Vec::new(),
            events,
        }
    }

    /// Subscribe to change notifications. Receivers that lag or disappear
    /// never block or fail a mutation.
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: StoreEvent) {
        // No subscribers is fine; the send result only reports that.
        let _ = self.events.send(event);
    }

    /// Drop every held entry and append `items` in the given order.
    ///
    /// This is a full cache reset: entries that were never removed
    /// remotely are dropped too. Input records that would repeat an
    /// already-appended non-zero id are skipped, keeping the first
    /// occurrence.
    pub fn replace_all(&mut self, items: Vec<Contact>) {
        self.entries.clear();
        for item in items {
            if item.id != 0 && self.entries.iter().any(|c| c.id == item.id) {
                warn!(id = item.id, "Dropping duplicate contact id from replacement set");
                continue;
            }
            self.entries.push(item);
        }
        self.emit(StoreEvent::Reset);
    }

    /// Insert `item`, or replace the entry with the same non-zero id in
    /// place, preserving its position.
    ///
    /// Finding more than one existing entry with the id means the cache
    /// is already corrupt; the mutation is refused so the breach surfaces
    /// instead of compounding.
    pub fn upsert(&mut self, item: Contact) -> Result<(), StoreError> {
        if item.id != 0 {
            let mut matches = self
                .entries
                .iter()
                .enumerate()
                .filter(|(_, c)| c.id == item.id)
                .map(|(i, _)| i);

            if let Some(index) = matches.next() {
                if matches.next().is_some() {
                    error!(id = item.id, "Cache holds duplicate contact ids");
                    return Err(StoreError::DuplicateId(item.id));
                }
                let id = item.id;
                self.entries[index] = item;
                self.emit(StoreEvent::Upserted(id));
                return Ok(());
            }
        }

        let id = item.id;
        self.entries.push(item);
        self.emit(StoreEvent::Upserted(id));
        Ok(())
    }

    /// Remove the entry with the given id. Absent ids are a no-op, not an
    /// error; returns whether anything was removed.
    pub fn remove(&mut self, id: i64) -> bool {
        let before = self.entries.len();
        self.entries.retain(|c| c.id != id);
        let removed = self.entries.len() != before;
        if removed {
            self.emit(StoreEvent::Removed(id));
        }
        removed
    }

    pub fn find(&self, id: i64) -> Option<&Contact> {
        self.entries.iter().find(|c| c.id == id)
    }

    /// The current entries in insertion order.
    pub fn contacts(&self) -> &[Contact] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for ContactStore {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Sync age tracking
// ============================================================================

/// Timestamp of the last successful sync with the remote store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncStamp {
    pub synced_at: DateTime<Utc>,
}

impl SyncStamp {
    pub fn now() -> Self {
        Self {
            synced_at: Utc::now(),
        }
    }

    pub fn age_minutes(&self) -> i64 {
        let now = Utc::now();
        (now - self.synced_at).num_minutes()
    }

    pub fn age_display(&self) -> String {
        let minutes = self.age_minutes();
        if minutes < 1 {
            // Also covers clock skew producing negative ages
            "just now".to_string()
        } else if minutes < 60 {
            format!("{}m ago", minutes)
        } else if minutes < 1440 {
            let hours = minutes / 60;
            let remaining_mins = minutes % 60;
            if remaining_mins >= 30 {
                // Round up: 1h 30m+ becomes 2h
                format!("{}h ago", hours + 1)
            } else {
                format!("{}h ago", hours)
            }
        } else {
            let days = minutes / 1440;
            let remaining_hours = (minutes % 1440) / 60;
            if remaining_hours >= 12 {
                // Round up: 1d 12h+ becomes 2d
                format!("{}d ago", days + 1)
            } else {
                format!("{}d ago", days)
            }
        }
    }

    pub fn is_stale(&self) -> bool {
        self.age_minutes() > SYNC_STALE_MINUTES
    }
}

// ============================================================================
// Tests
// ============================================================================
