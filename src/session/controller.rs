//! Async driver for a [`ScanSession`].
//!
//! The controller owns the session behind a mutex and talks to the library
//! service. Each operation takes the lock for one synchronous phase only;
//! the lock is never held across a network call.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use crate::api::LibraryApi;
use crate::book::{Book, PendingBook, ReadingStatus};
use crate::isbn;

use super::state::{
    DecodeOutcome, DecodeStep, ScanSession, SessionConfig, SessionError, SessionSnapshot,
    SubmitReport,
};

/// Drives the scan/confirm/batch/submit flow against a library service.
pub struct ScanController<A: ?Sized> {
    session: Mutex<ScanSession>,
    api: Arc<A>,
}

impl<A: LibraryApi + ?Sized> ScanController<A> {
    pub fn new(api: Arc<A>, config: SessionConfig) -> Self {
        Self {
            session: Mutex::new(ScanSession::new(config)),
            api,
        }
    }

    fn session(&self) -> MutexGuard<'_, ScanSession> {
        // A panic while holding the lock cannot leave the sets half-updated:
        // every transition completes before it returns.
        self.session.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Run one decoded code through the pipeline.
    ///
    /// Cheap rejections happen first under the lock. An admitted ISBN is
    /// then checked against the library (fetched fresh on every call) and,
    /// if not owned, looked up for metadata.
    pub async fn on_decoded(&self, raw: &str) -> DecodeOutcome {
        let step = self.session().begin_decode(raw, Instant::now());
        let ticket = match step {
            DecodeStep::Ignored => return DecodeOutcome::Ignored,
            DecodeStep::Noticed(kind) => return DecodeOutcome::Noticed(kind),
            DecodeStep::Lookup(ticket) => ticket,
        };
        log::debug!("Looking up {}", ticket.isbn());

        let owned = self
            .api
            .list_library()
            .await
            .map(|entries| {
                entries
                    .iter()
                    .any(|e| isbn::clean(&e.book.isbn) == ticket.isbn())
            })
            .map_err(|e| e.to_string());
        let early = self
            .session()
            .resolve_ownership(&ticket, owned, Instant::now());
        if let Some(outcome) = early {
            self.check_invariants();
            return outcome;
        }

        let found = self
            .api
            .lookup_book(ticket.isbn())
            .await
            .map_err(|e| e.to_string());
        let outcome = self
            .session()
            .resolve_lookup(ticket, found, Instant::now());
        self.check_invariants();
        outcome
    }

    pub fn confirm(&self, status: ReadingStatus) -> Result<PendingBook, SessionError> {
        let result = self.session().confirm(status);
        self.check_invariants();
        result
    }

    pub fn discard(&self) -> Result<Book, SessionError> {
        let result = self.session().discard();
        self.check_invariants();
        result
    }

    pub fn remove_from_batch(&self, isbn: &str) -> Result<Option<PendingBook>, SessionError> {
        let result = self.session().remove_from_batch(isbn);
        self.check_invariants();
        result
    }

    /// Send the whole batch to the library in one request.
    ///
    /// On success the session starts over; on failure the batch is kept
    /// intact so the operator can retry.
    pub async fn submit_batch(&self) -> Result<SubmitReport, SessionError> {
        let books = self.session().begin_submit()?;
        log::info!("Submitting {} books", books.len());

        let result = self
            .api
            .add_books(&books)
            .await
            .map(|response| SubmitReport {
                submitted: books.len(),
                added: response.added.len(),
                errors: response.errors.iter().map(describe_entry).collect(),
            })
            .map_err(|e| {
                log::warn!("Submission failed: {}", e);
                e.to_string()
            });

        let result = self.session().finish_submit(result, Instant::now());
        self.check_invariants();
        result
    }

    pub fn scanning_started(&self) {
        self.session().scanning_started();
    }

    pub fn camera_failed(&self, message: impl Into<String>) {
        self.session().camera_failed(message);
    }

    pub fn scanning_stopped(&self) {
        self.session().scanning_stopped();
    }

    pub fn scan_error(&self, message: &str) {
        self.session().scan_error(message, Instant::now());
    }

    /// Drop the notice if its time is up. Returns true if it was removed.
    pub fn expire_notice(&self) -> bool {
        self.session().expire_notice(Instant::now())
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.session().snapshot(Instant::now())
    }

    fn check_invariants(&self) {
        debug_assert!(
            self.session().invariants_hold(),
            "scan session invariants violated"
        );
    }
}

/// Render a per-book entry from the add-books response.
fn describe_entry(entry: &serde_json::Value) -> String {
    match entry {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Object(map) => match (map.get("isbn"), map.get("error")) {
            (Some(isbn), Some(error)) => format!(
                "{}: {}",
                isbn.as_str().unwrap_or_default(),
                error.as_str().unwrap_or_default()
            ),
            _ => entry.to_string(),
        },
        other => other.to_string(),
    }
}
