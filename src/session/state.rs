//! Scan session state machine.
//!
//! `ScanSession` holds every piece of scanning state and exposes one method
//! per transition. It performs no I/O: the network-bound stages of the
//! decode pipeline are split into a `begin_decode` step that hands out a
//! [`LookupTicket`] and `resolve_*` steps that apply the responses.

use std::collections::{BTreeSet, HashSet, VecDeque};
use std::time::{Duration, Instant};

use crate::api::BookStatusUpdate;
use crate::book::{Book, PendingBook, ReadingStatus};
use crate::isbn;

use super::notice::{Notice, NoticeKind, NoticeSlot, DEFAULT_NOTICE_TTL};

/// Where the scan screen is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanState {
    /// Scanner not started
    Idle,
    /// Scanner running, decodes are processed
    Scanning,
    /// Scanning paused while the operator accepts or rejects this book
    AwaitingConfirmation(Book),
    /// The device could not be acquired or stopped delivering frames
    CameraError(String),
}

impl ScanState {
    pub fn is_paused(&self) -> bool {
        matches!(self, ScanState::AwaitingConfirmation(_))
    }

    /// Book waiting for confirmation, if any.
    pub fn pending(&self) -> Option<&Book> {
        match self {
            ScanState::AwaitingConfirmation(book) => Some(book),
            _ => None,
        }
    }
}

/// Tunables for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    pub notice_ttl: Duration,
    /// Allow lookups of distinct ISBNs to overlap
    pub concurrent_lookups: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            notice_ttl: DEFAULT_NOTICE_TTL,
            concurrent_lookups: false,
        }
    }
}

/// Proof that `begin_decode` admitted an ISBN into the lookup stages.
#[derive(Debug, PartialEq, Eq)]
pub struct LookupTicket {
    isbn: String,
}

impl LookupTicket {
    pub fn isbn(&self) -> &str {
        &self.isbn
    }
}

/// Result of the synchronous part of the decode pipeline.
#[derive(Debug, PartialEq, Eq)]
pub enum DecodeStep {
    Ignored,
    Noticed(NoticeKind),
    Lookup(LookupTicket),
}

/// Final result of handling one decoded code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeOutcome {
    /// Dropped without any visible effect
    Ignored,
    /// Dropped with a notice
    Noticed(NoticeKind),
    /// Book found; confirmation is now showing
    Confirming(Book),
    /// Book found while another confirmation was showing; shown later
    Queued(String),
}

/// What a successful submission did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitReport {
    /// Books sent in the request
    pub submitted: usize,
    /// Books the service reported as added
    pub added: usize,
    /// Per-book errors the service reported
    pub errors: Vec<String>,
}

/// Errors returned by session operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("no book is waiting for confirmation")]
    NoPendingConfirmation,

    #[error("confirm or discard the current book first")]
    ConfirmationPending,

    #[error("the batch is empty")]
    EmptyBatch,

    #[error("a submission is already in progress")]
    SubmitInProgress,

    #[error("wait for the current lookup to finish")]
    LookupInProgress,

    #[error("submission failed: {0}")]
    SubmitFailed(String),
}

/// Read-only view of a session for rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub state: ScanState,
    /// Newest first
    pub batch: Vec<PendingBook>,
    pub in_flight: BTreeSet<String>,
    pub owned: BTreeSet<String>,
    pub notice: Option<Notice>,
    pub lookups_pending: usize,
    pub submitting: bool,
}

/// All mutable state of one scanning session.
#[derive(Debug)]
pub struct ScanSession {
    state: ScanState,
    in_flight: HashSet<String>,
    owned: HashSet<String>,
    batch: Vec<PendingBook>,
    /// Books found while a confirmation was already showing
    ready: VecDeque<Book>,
    lookups_pending: usize,
    submitting: bool,
    notice: NoticeSlot,
    concurrent_lookups: bool,
}

impl Default for ScanSession {
    fn default() -> Self {
        Self::new(SessionConfig::default())
    }
}

impl ScanSession {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            state: ScanState::Idle,
            in_flight: HashSet::new(),
            owned: HashSet::new(),
            batch: Vec::new(),
            ready: VecDeque::new(),
            lookups_pending: 0,
            submitting: false,
            notice: NoticeSlot::new(config.notice_ttl),
            concurrent_lookups: config.concurrent_lookups,
        }
    }

    pub fn state(&self) -> &ScanState {
        &self.state
    }

    pub fn is_paused(&self) -> bool {
        self.state.is_paused()
    }

    pub fn pending(&self) -> Option<&Book> {
        self.state.pending()
    }

    pub fn batch(&self) -> &[PendingBook] {
        &self.batch
    }

    pub fn is_in_flight(&self, isbn: &str) -> bool {
        self.in_flight.contains(isbn)
    }

    pub fn is_owned(&self, isbn: &str) -> bool {
        self.owned.contains(isbn)
    }

    pub fn notice(&self, now: Instant) -> Option<&Notice> {
        self.notice.current(now)
    }

    pub fn lookups_pending(&self) -> usize {
        self.lookups_pending
    }

    pub fn snapshot(&self, now: Instant) -> SessionSnapshot {
        SessionSnapshot {
            state: self.state.clone(),
            batch: self.batch.clone(),
            in_flight: self.in_flight.iter().cloned().collect(),
            owned: self.owned.iter().cloned().collect(),
            notice: self.notice.current(now).cloned(),
            lookups_pending: self.lookups_pending,
            submitting: self.submitting,
        }
    }

    // ---- device lifecycle ----

    /// The scanner is delivering frames.
    ///
    /// A book that was waiting for confirmation when the device went away is
    /// shown again.
    pub fn scanning_started(&mut self) {
        if self.state.is_paused() {
            return;
        }
        self.state = self.next_after_confirmation();
    }

    /// The device failed; scanning ends until an explicit retry.
    pub fn camera_failed(&mut self, message: impl Into<String>) {
        self.park_pending();
        self.state = ScanState::CameraError(message.into());
    }

    /// The scanner was stopped on purpose.
    pub fn scanning_stopped(&mut self) {
        self.park_pending();
        self.state = ScanState::Idle;
    }

    /// A per-frame decoder error: shown, never fatal.
    pub fn scan_error(&mut self, message: &str, now: Instant) {
        self.notice.raise_with(
            NoticeKind::ScanError,
            format!("{}: {}", NoticeKind::ScanError.message(), message),
            now,
        );
    }

    pub fn expire_notice(&mut self, now: Instant) -> bool {
        self.notice.expire(now)
    }

    // ---- decode pipeline ----

    /// Synchronous stages of the decode pipeline.
    ///
    /// Stages run in order and the first that applies decides:
    /// 1. paused, submitting, or (without concurrent lookups) any lookup in
    ///    progress: ignored
    /// 2. already owned: "already owned" notice
    /// 3. in flight or already in the batch: ignored silently
    /// 4. bad checksum: "invalid barcode" notice
    /// 5. otherwise the ISBN is marked in flight and a ticket is issued
    pub fn begin_decode(&mut self, raw: &str, now: Instant) -> DecodeStep {
        if self.state != ScanState::Scanning || self.submitting {
            return DecodeStep::Ignored;
        }
        if !self.concurrent_lookups && self.lookups_pending > 0 {
            return DecodeStep::Ignored;
        }

        let code = isbn::clean(raw);

        if self.owned.contains(&code) {
            self.notice.raise(NoticeKind::AlreadyOwned, now);
            return DecodeStep::Noticed(NoticeKind::AlreadyOwned);
        }
        if self.in_flight.contains(&code) || self.batch.iter().any(|p| p.isbn() == code) {
            log::debug!("Ignoring duplicate scan of {}", code);
            return DecodeStep::Ignored;
        }
        if !isbn::validate(&code) {
            self.notice.raise(NoticeKind::InvalidBarcode, now);
            return DecodeStep::Noticed(NoticeKind::InvalidBarcode);
        }

        self.in_flight.insert(code.clone());
        self.lookups_pending += 1;
        DecodeStep::Lookup(LookupTicket { isbn: code })
    }

    /// Apply the library ownership check.
    ///
    /// `Ok(true)` moves the ISBN to the owned set and ends the pipeline;
    /// `Ok(false)` returns `None` so the caller continues with the metadata
    /// lookup; an error ends the pipeline like a failed lookup.
    pub fn resolve_ownership(
        &mut self,
        ticket: &LookupTicket,
        owned: Result<bool, String>,
        now: Instant,
    ) -> Option<DecodeOutcome> {
        match owned {
            Ok(false) => None,
            Ok(true) => {
                self.finish_lookup(&ticket.isbn);
                self.in_flight.remove(&ticket.isbn);
                self.owned.insert(ticket.isbn.clone());
                self.notice.raise(NoticeKind::AlreadyOwned, now);
                Some(DecodeOutcome::Noticed(NoticeKind::AlreadyOwned))
            }
            Err(message) => {
                log::warn!("Library check failed for {}: {}", ticket.isbn, message);
                Some(self.fail_lookup(ticket, now))
            }
        }
    }

    /// Apply the metadata lookup result, consuming the ticket.
    pub fn resolve_lookup(
        &mut self,
        ticket: LookupTicket,
        result: Result<Book, String>,
        now: Instant,
    ) -> DecodeOutcome {
        let mut book = match result {
            Ok(book) => book,
            Err(message) => {
                log::info!("Lookup failed for {}: {}", ticket.isbn, message);
                return self.fail_lookup(&ticket, now);
            }
        };
        self.finish_lookup(&ticket.isbn);

        // The scanned code is the identity within the session.
        if isbn::clean(&book.isbn) != ticket.isbn {
            log::debug!(
                "Service returned {} for scanned {}; keeping the scanned code",
                book.isbn,
                ticket.isbn
            );
            book.isbn = ticket.isbn.clone();
        }

        if self.state == ScanState::Scanning {
            self.state = ScanState::AwaitingConfirmation(book.clone());
            DecodeOutcome::Confirming(book)
        } else {
            self.ready.push_back(book);
            DecodeOutcome::Queued(ticket.isbn)
        }
    }

    fn fail_lookup(&mut self, ticket: &LookupTicket, now: Instant) -> DecodeOutcome {
        self.finish_lookup(&ticket.isbn);
        self.in_flight.remove(&ticket.isbn);
        self.notice.raise(NoticeKind::NotFound, now);
        DecodeOutcome::Noticed(NoticeKind::NotFound)
    }

    fn finish_lookup(&mut self, isbn: &str) {
        if self.lookups_pending == 0 {
            log::warn!("Lookup for {} finished with no lookup pending", isbn);
        }
        self.lookups_pending = self.lookups_pending.saturating_sub(1);
    }

    // ---- confirmation ----

    /// Accept the pending book into the batch with `status`.
    ///
    /// The ISBN stays in flight so it cannot be scanned again this session.
    pub fn confirm(&mut self, status: ReadingStatus) -> Result<PendingBook, SessionError> {
        let book = self.take_pending()?;
        let entry = PendingBook { book, status };
        self.batch.insert(0, entry.clone());
        log::info!("Added {} to batch as {}", entry.isbn(), status);
        Ok(entry)
    }

    /// Reject the pending book; its ISBN may be scanned again.
    pub fn discard(&mut self) -> Result<Book, SessionError> {
        let book = self.take_pending()?;
        self.in_flight.remove(&book.isbn);
        log::info!("Discarded {}", book.isbn);
        Ok(book)
    }

    fn take_pending(&mut self) -> Result<Book, SessionError> {
        if !self.state.is_paused() {
            return Err(SessionError::NoPendingConfirmation);
        }
        let next = self.next_after_confirmation();
        match std::mem::replace(&mut self.state, next) {
            ScanState::AwaitingConfirmation(book) => Ok(book),
            other => {
                self.state = other;
                Err(SessionError::NoPendingConfirmation)
            }
        }
    }

    /// State to enter once the current confirmation is resolved.
    fn next_after_confirmation(&mut self) -> ScanState {
        match self.ready.pop_front() {
            Some(book) => ScanState::AwaitingConfirmation(book),
            None => ScanState::Scanning,
        }
    }

    /// Move a pending book back to the front of the ready queue.
    fn park_pending(&mut self) {
        if let ScanState::AwaitingConfirmation(book) =
            std::mem::replace(&mut self.state, ScanState::Idle)
        {
            self.ready.push_front(book);
        }
    }

    // ---- batch ----

    /// Remove a batch entry and free its ISBN for rescanning.
    pub fn remove_from_batch(&mut self, isbn: &str) -> Result<Option<PendingBook>, SessionError> {
        if self.submitting {
            return Err(SessionError::SubmitInProgress);
        }
        let code = isbn::clean(isbn);
        let Some(index) = self.batch.iter().position(|p| p.isbn() == code) else {
            return Ok(None);
        };
        let removed = self.batch.remove(index);
        self.in_flight.remove(&code);
        Ok(Some(removed))
    }

    /// Freeze the batch for submission and return the request payload.
    pub fn begin_submit(&mut self) -> Result<Vec<BookStatusUpdate>, SessionError> {
        if self.submitting {
            return Err(SessionError::SubmitInProgress);
        }
        // A book parked by a device failure still needs confirm or discard.
        if self.state.is_paused() || !self.ready.is_empty() {
            return Err(SessionError::ConfirmationPending);
        }
        if self.lookups_pending > 0 {
            return Err(SessionError::LookupInProgress);
        }
        if self.batch.is_empty() {
            return Err(SessionError::EmptyBatch);
        }

        self.submitting = true;
        Ok(self
            .batch
            .iter()
            .map(|p| BookStatusUpdate {
                isbn: p.isbn().to_string(),
                status: p.status,
            })
            .collect())
    }

    /// Apply the submission result.
    ///
    /// Success starts a fresh session (batch, in-flight and owned sets
    /// cleared). Failure leaves the batch exactly as it was.
    pub fn finish_submit(
        &mut self,
        result: Result<SubmitReport, String>,
        now: Instant,
    ) -> Result<SubmitReport, SessionError> {
        self.submitting = false;
        match result {
            Ok(report) => {
                self.batch.clear();
                self.in_flight.clear();
                self.owned.clear();
                self.ready.clear();
                self.notice.clear();
                Ok(report)
            }
            Err(message) => {
                self.notice.raise(NoticeKind::SubmitFailed, now);
                Err(SessionError::SubmitFailed(message))
            }
        }
    }

    /// Check the set invariants.
    ///
    /// Owned ISBNs are neither in flight nor batched; every batched, pending
    /// or queued ISBN is in flight; batch ISBNs are unique.
    pub fn invariants_hold(&self) -> bool {
        let owned_disjoint = self
            .owned
            .iter()
            .all(|i| !self.in_flight.contains(i) && !self.batch.iter().any(|p| p.isbn() == i));
        let batched_in_flight = self.batch.iter().all(|p| self.in_flight.contains(p.isbn()));
        let pending_in_flight = self
            .state
            .pending()
            .into_iter()
            .chain(self.ready.iter())
            .all(|b| self.in_flight.contains(&b.isbn));
        let unique: HashSet<&str> = self.batch.iter().map(|p| p.isbn()).collect();

        owned_disjoint && batched_in_flight && pending_in_flight && unique.len() == self.batch.len()
    }
}
