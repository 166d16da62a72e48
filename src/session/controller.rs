//! Session control for the contact cache.
//!
//! This module contains the core `ContactSession` struct that sequences
//! user-driven operations against the remote service and the local store:
//! load/refresh, the single-draft create/edit/save/cancel cycle, confirmed
//! deletes, and the local filter view.
//!
//! Remote calls run as spawned background tasks that report back through
//! an MPSC channel. Results are applied only when the session processes
//! them on its own side of the channel, so the store is never mutated
//! while a call is in flight, and a torn-down session simply drops late
//! results without touching the store.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::api::{ApiError, RemoteContactService};
use crate::cache::{ContactStore, StoreError, SyncStamp};
use crate::models::{Contact, ContactFields};

/// Buffer size for the background task outcome channel.
/// Operations are issued one or two at a time; 32 leaves ample headroom.
const CHANNEL_BUFFER_SIZE: usize = 32;

// ============================================================================
// Drafts
// ============================================================================

/// What kind of record an open draft describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DraftKind {
    Create,
    Edit,
}

/// The single editing slot: a working copy of contact fields.
///
/// A draft never aliases a record in the store; edits stay invisible to
/// the list until a save succeeds.
#[derive(Debug, Clone, PartialEq)]
pub enum Draft {
    /// A contact that does not exist remotely yet.
    Create(ContactFields),
    /// New field values for the existing contact with this id.
    Edit { id: i64, fields: ContactFields },
}

impl Draft {
    pub fn kind(&self) -> DraftKind {
        match self {
            Draft::Create(_) => DraftKind::Create,
            Draft::Edit { .. } => DraftKind::Edit,
        }
    }

    pub fn fields(&self) -> &ContactFields {
        match self {
            Draft::Create(fields) => fields,
            Draft::Edit { fields, .. } => fields,
        }
    }

    pub fn fields_mut(&mut self) -> &mut ContactFields {
        match self {
            Draft::Create(fields) => fields,
            Draft::Edit { fields, .. } => fields,
        }
    }
}

// ============================================================================
// Session state
// ============================================================================

/// Where the session currently is in its operation cycle.
///
/// Only one draft can be open at a time, and `Saving` is reachable only
/// from `Drafting`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    /// A full list fetch is in flight.
    Loading,
    /// A (possibly filtered) list fetch is in flight.
    Refreshing,
    /// A draft is open for editing.
    Drafting(DraftKind),
    /// The open draft is being persisted remotely.
    Saving(DraftKind),
}

/// Caller-supplied decision for a delete prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    Confirmed,
    Declined,
}

// ============================================================================
// Errors and events
// ============================================================================

/// Failures surfaced to the presentation layer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// The remote call failed; the message passes through for display.
    /// Always recoverable - the cache and any open draft are untouched.
    #[error("remote request failed: {0}")]
    Transport(String),

    /// The target record no longer exists remotely.
    #[error("contact {0} no longer exists")]
    NotFound(i64),

    /// The cache detected a duplicate non-zero id. This signals a bug,
    /// not a user-recoverable condition; reload to restore consistency.
    #[error("cache holds more than one contact with id {0}")]
    DuplicateId(i64),
}

impl SessionError {
    /// Map a remote failure for an operation that targeted a known id.
    fn for_target(id: i64, err: ApiError) -> Self {
        if err.is_not_found() {
            SessionError::NotFound(id)
        } else {
            SessionError::Transport(err.to_string())
        }
    }
}

impl From<StoreError> for SessionError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateId(id) => SessionError::DuplicateId(id),
        }
    }
}

/// Terminal outcome of an operation, delivered when the session processes
/// the corresponding task result.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Loaded { count: usize },
    Refreshed { count: usize },
    Saved { id: i64 },
    Deleted { id: i64 },
    Failed(SessionError),
}

// ============================================================================
// Background task outcomes
// ============================================================================

/// Results sent back from spawned remote calls.
///
/// Successful create/update outcomes carry the record data with them so
/// applying them never depends on state that might have moved on.
enum TaskOutcome {
    Loaded(Result<Vec<Contact>, ApiError>),
    Refreshed(Result<Vec<Contact>, ApiError>),
    Created(Result<Contact, ApiError>),
    Updated { id: i64, result: Result<ContactFields, ApiError> },
    Deleted { id: i64, result: Result<(), ApiError> },
}

// ============================================================================
// Session controller
// ============================================================================

/// Sequences user-driven operations against the remote service and the
/// local store, owning the single draft slot and the session state.
///
/// Command methods are synchronous and non-blocking: they validate state,
/// spawn the remote call, and return `true` if the command was accepted
/// or `false` for a refused no-op (guard rejection, stale id, wrong
/// state). Apply results with [`process_pending`](Self::process_pending)
/// or [`next_event`](Self::next_event).
pub struct ContactSession {
    service: Arc<dyn RemoteContactService>,
    store: ContactStore,
    state: SessionState,
    draft: Option<Draft>,
    last_sync: Option<SyncStamp>,
    last_error: Option<SessionError>,

    // Background task channel
    outcome_rx: mpsc::Receiver<TaskOutcome>,
    outcome_tx: mpsc::Sender<TaskOutcome>,
    in_flight: usize,
}

impl ContactSession {
    pub fn new(service: Arc<dyn RemoteContactService>) -> Self {
        let (tx, rx) = mpsc::channel(CHANNEL_BUFFER_SIZE);
        Self {
            service,
            store: ContactStore::new(),
            state: SessionState::Idle,
            draft: None,
            last_sync: None,
            last_error: None,
            outcome_rx: rx,
            outcome_tx: tx,
            in_flight: 0,
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// The local cache. Mutations go through session operations only.
    pub fn store(&self) -> &ContactStore {
        &self.store
    }

    pub fn draft(&self) -> Option<&Draft> {
        self.draft.as_ref()
    }

    /// Mutable access to the open draft for field editing.
    pub fn draft_mut(&mut self) -> Option<&mut Draft> {
        self.draft.as_mut()
    }

    /// The most recent failure, retained for status display until the
    /// next successful operation.
    pub fn last_error(&self) -> Option<&SessionError> {
        self.last_error.as_ref()
    }

    /// When the cache last synced with the remote store.
    pub fn last_sync(&self) -> Option<SyncStamp> {
        self.last_sync
    }

    /// True while any remote call is outstanding. Callers should disable
    /// save/delete triggers while this holds.
    pub fn has_pending_work(&self) -> bool {
        self.in_flight > 0
    }

    // =========================================================================
    // List synchronization
    // =========================================================================

    /// Fetch the full contact list and reset the cache with it.
    ///
    /// Refused while another list fetch is in flight: the second call is
    /// dropped, not queued, so a late response can never clobber a newer
    /// one. Also refused while a draft is open or saving.
    pub fn load(&mut self) -> bool {
        if self.state != SessionState::Idle {
            debug!(state = ?self.state, "Load refused");
            return false;
        }

        info!("Loading contacts");
        self.state = SessionState::Loading;
        self.spawn_list(None, TaskOutcome::Loaded);
        true
    }

    /// Fetch the list scoped to a server-side filter and reset the cache.
    /// Same single-flight and replace-all semantics as [`load`](Self::load).
    pub fn refresh(&mut self, query: Option<&str>) -> bool {
        if self.state != SessionState::Idle {
            debug!(state = ?self.state, "Refresh refused");
            return false;
        }

        info!(query = query.unwrap_or(""), "Refreshing contacts");
        self.state = SessionState::Refreshing;
        self.spawn_list(query.map(str::to_string), TaskOutcome::Refreshed);
        true
    }

    fn spawn_list(
        &mut self,
        query: Option<String>,
        wrap: fn(Result<Vec<Contact>, ApiError>) -> TaskOutcome,
    ) {
        let service = Arc::clone(&self.service);
        let tx = self.outcome_tx.clone();
        self.in_flight += 1;

        tokio::spawn(async move {
            let result = service.list(query).await;
            Self::send_outcome(&tx, wrap(result)).await;
        });
    }

    // =========================================================================
    // Draft lifecycle
    // =========================================================================

    /// Open a blank draft for a new contact. Refused unless idle.
    pub fn begin_create(&mut self) -> bool {
        if self.state != SessionState::Idle {
            debug!(state = ?self.state, "Create refused");
            return false;
        }

        self.draft = Some(Draft::Create(ContactFields::default()));
        self.state = SessionState::Drafting(DraftKind::Create);
        true
    }

    /// Open a draft with a deep copy of the cached contact's fields.
    /// Refused when the id is not in the cache (stale selection) or a
    /// draft is already open.
    pub fn begin_edit(&mut self, id: i64) -> bool {
        if self.state != SessionState::Idle {
            debug!(state = ?self.state, "Edit refused");
            return false;
        }

        let Some(contact) = self.store.find(id) else {
            warn!(id, "Edit refused: contact not in cache");
            return false;
        };

        self.draft = Some(Draft::Edit {
            id,
            fields: contact.fields(),
        });
        self.state = SessionState::Drafting(DraftKind::Edit);
        true
    }

    /// Discard the open draft without a remote call. Refused while a save
    /// is in flight - the pending result still resolves the draft.
    pub fn cancel_edit(&mut self) -> bool {
        match self.state {
            SessionState::Drafting(_) => {
                self.draft = None;
                self.state = SessionState::Idle;
                true
            }
            _ => {
                debug!(state = ?self.state, "Cancel refused");
                false
            }
        }
    }

    /// Persist the open draft remotely.
    ///
    /// A create draft posts the fields and commits the server-returned
    /// record - the id used downstream is the server-assigned one. An edit
    /// draft puts the fields and, on success, commits the locally held
    /// values. On failure the draft stays open for retry or cancel.
    pub fn save(&mut self) -> bool {
        let SessionState::Drafting(kind) = self.state else {
            debug!(state = ?self.state, "Save refused");
            return false;
        };
        let Some(draft) = self.draft.clone() else {
            error!("Drafting state without an open draft");
            return false;
        };

        self.state = SessionState::Saving(kind);
        let service = Arc::clone(&self.service);
        let tx = self.outcome_tx.clone();
        self.in_flight += 1;

        match draft {
            Draft::Create(fields) => {
                info!("Creating contact");
                tokio::spawn(async move {
                    let result = service.create(fields).await;
                    Self::send_outcome(&tx, TaskOutcome::Created(result)).await;
                });
            }
            Draft::Edit { id, fields } => {
                info!(id, "Updating contact");
                tokio::spawn(async move {
                    let result = service.update(id, fields.clone()).await.map(|()| fields);
                    Self::send_outcome(&tx, TaskOutcome::Updated { id, result }).await;
                });
            }
        }
        true
    }

    // =========================================================================
    // Delete
    // =========================================================================

    /// Delete a contact remotely, then drop it from the cache.
    ///
    /// The yes/no decision comes from the caller; a declined decision is
    /// a no-op with no remote call. Stale ids refuse locally for the same
    /// reason. Double-invocation is not state-guarded - callers should
    /// disable the trigger while [`has_pending_work`](Self::has_pending_work).
    pub fn delete(&mut self, id: i64, decision: Confirmation) -> bool {
        if self.state != SessionState::Idle {
            debug!(state = ?self.state, "Delete refused");
            return false;
        }
        if decision == Confirmation::Declined {
            debug!(id, "Delete declined");
            return false;
        }
        if self.store.find(id).is_none() {
            warn!(id, "Delete refused: contact not in cache");
            return false;
        }

        info!(id, "Deleting contact");
        let service = Arc::clone(&self.service);
        let tx = self.outcome_tx.clone();
        self.in_flight += 1;

        tokio::spawn(async move {
            let result = service.delete(id).await;
            Self::send_outcome(&tx, TaskOutcome::Deleted { id, result }).await;
        });
        true
    }

    // =========================================================================
    // Local filter view
    // =========================================================================

    /// Compute a filtered view of the cached contacts without touching
    /// the cache itself.
    ///
    /// Purely local and synchronous: case-insensitive substring match
    /// over name, email, phone and address, preserving cache order. An
    /// empty or whitespace query yields every entry, so clearing a filter
    /// is just filtering again - never a reload.
    pub fn apply_filter(&self, text: &str) -> Vec<&Contact> {
        let query = text.trim();
        self.store
            .contacts()
            .iter()
            .filter(|c| query.is_empty() || c.matches_query(query))
            .collect()
    }

    // =========================================================================
    // Outcome processing
    // =========================================================================

    /// Helper to send task outcomes; a closed channel means the session
    /// was torn down and the result is intentionally dropped.
    async fn send_outcome(tx: &mpsc::Sender<TaskOutcome>, outcome: TaskOutcome) {
        if tx.send(outcome).await.is_err() {
            debug!("Session gone before task completion; result dropped");
        }
    }

    /// Drain and apply every completed task without blocking. Call this
    /// from the UI tick loop.
    pub fn process_pending(&mut self) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        while let Ok(outcome) = self.outcome_rx.try_recv() {
            events.push(self.apply_outcome(outcome));
        }
        events
    }

    /// Await, apply and return the next completed task. Returns `None`
    /// immediately when nothing is in flight.
    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        if self.in_flight == 0 {
            return None;
        }
        let outcome = self.outcome_rx.recv().await?;
        Some(self.apply_outcome(outcome))
    }

    /// Apply a single task outcome: one synchronous store mutation plus
    /// the matching state transition. This is the only place the store
    /// changes after a remote call.
    fn apply_outcome(&mut self, outcome: TaskOutcome) -> SessionEvent {
        self.in_flight = self.in_flight.saturating_sub(1);

        match outcome {
            TaskOutcome::Loaded(Ok(contacts)) => {
                let count = contacts.len();
                self.store.replace_all(contacts);
                self.last_sync = Some(SyncStamp::now());
                self.last_error = None;
                self.state = SessionState::Idle;
                info!(count, "Contact list loaded");
                SessionEvent::Loaded { count }
            }
            TaskOutcome::Loaded(Err(err)) => {
                // Stale-but-consistent: the cache keeps what it had
                self.state = SessionState::Idle;
                self.fail(SessionError::Transport(err.to_string()))
            }
            TaskOutcome::Refreshed(Ok(contacts)) => {
                let count = contacts.len();
                self.store.replace_all(contacts);
                self.last_sync = Some(SyncStamp::now());
                self.last_error = None;
                self.state = SessionState::Idle;
                info!(count, "Contact list refreshed");
                SessionEvent::Refreshed { count }
            }
            TaskOutcome::Refreshed(Err(err)) => {
                self.state = SessionState::Idle;
                self.fail(SessionError::Transport(err.to_string()))
            }
            TaskOutcome::Created(Ok(contact)) => {
                // The server-assigned record is what enters the cache
                let id = contact.id;
                match self.store.upsert(contact) {
                    Ok(()) => {
                        self.draft = None;
                        self.last_error = None;
                        self.state = SessionState::Idle;
                        info!(id, "Contact created");
                        SessionEvent::Saved { id }
                    }
                    Err(err) => {
                        self.state = SessionState::Drafting(DraftKind::Create);
                        self.fail(err.into())
                    }
                }
            }
            TaskOutcome::Created(Err(err)) => {
                // Keep the draft so the user can retry or cancel
                self.state = SessionState::Drafting(DraftKind::Create);
                self.fail(SessionError::Transport(err.to_string()))
            }
            TaskOutcome::Updated { id, result: Ok(fields) } => {
                // The remote call's side effect is persistence; the cache
                // commits the fields that were sent
                match self.store.upsert(fields.into_contact(id)) {
                    Ok(()) => {
                        self.draft = None;
                        self.last_error = None;
                        self.state = SessionState::Idle;
                        info!(id, "Contact updated");
                        SessionEvent::Saved { id }
                    }
                    Err(err) => {
                        self.state = SessionState::Drafting(DraftKind::Edit);
                        self.fail(err.into())
                    }
                }
            }
            TaskOutcome::Updated { id, result: Err(err) } => {
                self.state = SessionState::Drafting(DraftKind::Edit);
                self.fail(SessionError::for_target(id, err))
            }
            TaskOutcome::Deleted { id, result: Ok(()) } => {
                self.store.remove(id);
                self.last_error = None;
                info!(id, "Contact deleted");
                SessionEvent::Deleted { id }
            }
            TaskOutcome::Deleted { id, result: Err(err) } => {
                self.fail(SessionError::for_target(id, err))
            }
        }
    }

    fn fail(&mut self, error: SessionError) -> SessionEvent {
        match &error {
            SessionError::DuplicateId(id) => error!(id = *id, "Cache invariant breached"),
            other => warn!(error = %other, "Operation failed"),
        }
        self.last_error = Some(error.clone());
        SessionEvent::Failed(error)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::MockRemoteContactService;
    use mockall::predicate::eq;
    use mockall::Sequence;

    fn contact(id: i64, first: &str, last: &str) -> Contact {
        Contact {
            id,
            first_name: first.to_string(),
            last_name: last.to_string(),
            phone: "5551234567".to_string(),
            email: format!("{}@example.com", first.to_lowercase()),
            address: None,
        }
    }

    /// Build a session whose cache was seeded through a normal load.
    async fn seeded_session(mut service: MockRemoteContactService, contacts: Vec<Contact>) -> ContactSession {
        service
            .expect_list()
            .times(1)
            .return_once(move |_| Ok(contacts));
        let mut session = ContactSession::new(Arc::new(service));
        assert!(session.load());
        let event = session.next_event().await.unwrap();
        assert!(matches!(event, SessionEvent::Loaded { .. }));
        session
    }

    #[tokio::test]
    async fn load_resets_cache_and_returns_to_idle() {
        let session = seeded_session(
            MockRemoteContactService::new(),
            vec![contact(1, "Ada", "Lovelace"), contact(2, "Alan", "Turing")],
        )
        .await;

        assert_eq!(session.state(), SessionState::Idle);
        assert_eq!(session.store().len(), 2);
        assert!(session.last_sync().is_some());
        assert!(session.last_error().is_none());
    }

    #[tokio::test]
    async fn load_failure_leaves_cache_unchanged() {
        let mut service = MockRemoteContactService::new();
        let mut seq = Sequence::new();
        service
            .expect_list()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(vec![contact(1, "Ada", "Lovelace")]));
        service
            .expect_list()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Err(ApiError::ServerError("backend down".to_string())));

        let mut session = ContactSession::new(Arc::new(service));
        assert!(session.load());
        session.next_event().await;

        assert!(session.load());
        let event = session.next_event().await.unwrap();

        assert!(matches!(event, SessionEvent::Failed(SessionError::Transport(_))));
        assert_eq!(session.state(), SessionState::Idle);
        // Stale-but-consistent: the earlier list is still visible
        assert_eq!(session.store().len(), 1);
        assert!(matches!(
            session.last_error(),
            Some(SessionError::Transport(_))
        ));
    }

    #[tokio::test]
    async fn refresh_in_flight_refuses_second_list_fetch() {
        let mut service = MockRemoteContactService::new();
        // Exactly one remote call despite three commands
        service.expect_list().times(1).returning(|_| Ok(Vec::new()));

        let mut session = ContactSession::new(Arc::new(service));
        assert!(session.refresh(Some("xyz")));
        assert_eq!(session.state(), SessionState::Refreshing);

        assert!(!session.refresh(Some("abc")));
        assert!(!session.load());
        assert_eq!(session.state(), SessionState::Refreshing);

        let event = session.next_event().await.unwrap();
        assert_eq!(event, SessionEvent::Refreshed { count: 0 });
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn refresh_with_unmatched_query_empties_cache_without_error() {
        let mut service = MockRemoteContactService::new();
        let mut seq = Sequence::new();
        service
            .expect_list()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(vec![contact(1, "Ada", "Lovelace")]));
        service
            .expect_list()
            .with(eq(Some("xyz".to_string())))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(Vec::new()));

        let mut session = ContactSession::new(Arc::new(service));
        assert!(session.load());
        session.next_event().await;

        assert!(session.refresh(Some("xyz")));
        let event = session.next_event().await.unwrap();

        assert_eq!(event, SessionEvent::Refreshed { count: 0 });
        assert!(session.store().is_empty());
        assert!(session.last_error().is_none());
    }

    #[tokio::test]
    async fn create_commits_server_assigned_record() {
        let mut service = MockRemoteContactService::new();
        service
            .expect_create()
            .withf(|fields| fields.first_name == "A" && fields.last_name == "B")
            .times(1)
            .returning(|fields| Ok(fields.into_contact(7)));

        let mut session = ContactSession::new(Arc::new(service));
        assert!(session.begin_create());
        assert_eq!(session.state(), SessionState::Drafting(DraftKind::Create));

        {
            let fields = session.draft_mut().unwrap().fields_mut();
            fields.first_name = "A".to_string();
            fields.last_name = "B".to_string();
            fields.phone = "1".to_string();
            fields.email = "a@b.c".to_string();
        }

        assert!(session.save());
        assert_eq!(session.state(), SessionState::Saving(DraftKind::Create));

        let event = session.next_event().await.unwrap();
        assert_eq!(event, SessionEvent::Saved { id: 7 });
        assert_eq!(session.state(), SessionState::Idle);
        assert!(session.draft().is_none());

        let stored = session.store().find(7).unwrap();
        assert_eq!(stored.first_name, "A");
        assert_eq!(stored.email, "a@b.c");
    }

    #[tokio::test]
    async fn update_failure_keeps_draft_open_and_cache_unchanged() {
        let mut service = MockRemoteContactService::new();
        service
            .expect_update()
            .times(1)
            .returning(|_, _| Err(ApiError::ServerError("backend down".to_string())));
        let mut session =
            seeded_session(service, vec![contact(1, "Ada", "Lovelace")]).await;

        assert!(session.begin_edit(1));
        session.draft_mut().unwrap().fields_mut().first_name = "Augusta".to_string();

        assert!(session.save());
        assert_eq!(session.state(), SessionState::Saving(DraftKind::Edit));

        let event = session.next_event().await.unwrap();
        assert!(matches!(event, SessionEvent::Failed(SessionError::Transport(_))));

        // Modal stays open with the same draft values; the cache is untouched
        assert_eq!(session.state(), SessionState::Drafting(DraftKind::Edit));
        assert_eq!(session.draft().unwrap().fields().first_name, "Augusta");
        assert_eq!(session.store().find(1).unwrap().first_name, "Ada");
    }

    #[tokio::test]
    async fn update_success_commits_locally_held_fields() {
        let mut service = MockRemoteContactService::new();
        service
            .expect_update()
            .with(eq(1), mockall::predicate::function(|f: &ContactFields| {
                f.first_name == "Augusta"
            }))
            .times(1)
            .returning(|_, _| Ok(()));
        let mut session =
            seeded_session(service, vec![contact(1, "Ada", "Lovelace")]).await;

        assert!(session.begin_edit(1));
        session.draft_mut().unwrap().fields_mut().first_name = "Augusta".to_string();
        assert!(session.save());

        let event = session.next_event().await.unwrap();
        assert_eq!(event, SessionEvent::Saved { id: 1 });
        assert_eq!(session.store().find(1).unwrap().first_name, "Augusta");
        assert!(session.draft().is_none());
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn update_not_found_is_reported_with_target_id() {
        let mut service = MockRemoteContactService::new();
        service
            .expect_update()
            .times(1)
            .returning(|_, _| Err(ApiError::NotFound("contact 1".to_string())));
        let mut session =
            seeded_session(service, vec![contact(1, "Ada", "Lovelace")]).await;

        assert!(session.begin_edit(1));
        assert!(session.save());
        let event = session.next_event().await.unwrap();

        assert_eq!(event, SessionEvent::Failed(SessionError::NotFound(1)));
        assert_eq!(session.state(), SessionState::Drafting(DraftKind::Edit));
    }

    #[tokio::test]
    async fn draft_is_isolated_from_the_cache() {
        let mut session = seeded_session(
            MockRemoteContactService::new(),
            vec![contact(1, "Ada", "Lovelace")],
        )
        .await;

        assert!(session.begin_edit(1));
        session.draft_mut().unwrap().fields_mut().first_name = "Augusta".to_string();

        // The in-progress edit is invisible to the list
        assert_eq!(session.store().find(1).unwrap().first_name, "Ada");

        assert!(session.cancel_edit());
        assert_eq!(session.state(), SessionState::Idle);
        assert!(session.draft().is_none());
        assert_eq!(session.store().find(1).unwrap().first_name, "Ada");
    }

    #[tokio::test]
    async fn begin_edit_refuses_stale_id() {
        let mut session = seeded_session(
            MockRemoteContactService::new(),
            vec![contact(1, "Ada", "Lovelace")],
        )
        .await;

        assert!(!session.begin_edit(42));
        assert_eq!(session.state(), SessionState::Idle);
        assert!(session.draft().is_none());
    }

    #[tokio::test]
    async fn only_one_draft_at_a_time() {
        let mut session = seeded_session(
            MockRemoteContactService::new(),
            vec![contact(1, "Ada", "Lovelace")],
        )
        .await;

        assert!(session.begin_create());
        assert!(!session.begin_create());
        assert!(!session.begin_edit(1));
        assert_eq!(session.state(), SessionState::Drafting(DraftKind::Create));
    }

    #[tokio::test]
    async fn confirmed_delete_removes_record() {
        let mut service = MockRemoteContactService::new();
        service
            .expect_delete()
            .with(eq(2))
            .times(1)
            .returning(|_| Ok(()));
        let mut session = seeded_session(
            service,
            vec![contact(1, "Ada", "Lovelace"), contact(2, "Alan", "Turing")],
        )
        .await;

        assert!(session.delete(2, Confirmation::Confirmed));
        let event = session.next_event().await.unwrap();

        assert_eq!(event, SessionEvent::Deleted { id: 2 });
        assert_eq!(session.state(), SessionState::Idle);
        let ids: Vec<i64> = session.store().contacts().iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![1]);
    }

    #[tokio::test]
    async fn declined_delete_makes_no_remote_call() {
        let mut service = MockRemoteContactService::new();
        service.expect_delete().times(0);
        let mut session =
            seeded_session(service, vec![contact(1, "Ada", "Lovelace")]).await;

        assert!(!session.delete(1, Confirmation::Declined));
        assert!(!session.has_pending_work());
        assert_eq!(session.store().len(), 1);
    }

    #[tokio::test]
    async fn delete_failure_keeps_record() {
        let mut service = MockRemoteContactService::new();
        service
            .expect_delete()
            .times(1)
            .returning(|_| Err(ApiError::ServerError("backend down".to_string())));
        let mut session =
            seeded_session(service, vec![contact(1, "Ada", "Lovelace")]).await;

        assert!(session.delete(1, Confirmation::Confirmed));
        let event = session.next_event().await.unwrap();

        assert!(matches!(event, SessionEvent::Failed(SessionError::Transport(_))));
        assert_eq!(session.store().len(), 1);
    }

    #[tokio::test]
    async fn filter_is_a_derived_view_over_the_full_cache() {
        let session = seeded_session(
            MockRemoteContactService::new(),
            vec![
                contact(1, "John", "Smith"),
                contact(2, "Alan", "Turing"),
                contact(3, "Jane", "Smith"),
                contact(4, "Grace", "Hopper"),
                contact(5, "Ada", "Lovelace"),
            ],
        )
        .await;

        let matched = session.apply_filter("smith");
        let ids: Vec<i64> = matched.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![1, 3]); // original relative order

        // Clearing the filter recovers the full set; the cache never shrank
        assert_eq!(session.apply_filter("").len(), 5);
        assert_eq!(session.apply_filter("   ").len(), 5);
        assert_eq!(session.store().len(), 5);
    }

    #[tokio::test]
    async fn next_event_returns_none_when_nothing_in_flight() {
        let session_service = MockRemoteContactService::new();
        let mut session = ContactSession::new(Arc::new(session_service));
        assert!(session.next_event().await.is_none());
        assert!(session.process_pending().is_empty());
    }
}
