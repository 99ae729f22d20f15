//! Single-slot transient notices shown to the operator.

use std::fmt;
use std::time::{Duration, Instant};

/// How long a notice stays visible unless configured otherwise.
pub const DEFAULT_NOTICE_TTL: Duration = Duration::from_secs(3);

/// Why a notice was raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    AlreadyOwned,
    InvalidBarcode,
    NotFound,
    SubmitFailed,
    ScanError,
}

impl NoticeKind {
    /// Default text shown for this kind.
    pub fn message(self) -> &'static str {
        match self {
            NoticeKind::AlreadyOwned => "You already own this book",
            NoticeKind::InvalidBarcode => "Invalid barcode (ISBN required)",
            NoticeKind::NotFound => "Book not found in the database",
            NoticeKind::SubmitFailed => "Failed to add the books to your library",
            NoticeKind::ScanError => "Scanner error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
    pub raised_at: Instant,
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Holds at most one notice; a new one replaces the old, nothing is queued.
#[derive(Debug, Clone)]
pub struct NoticeSlot {
    current: Option<Notice>,
    ttl: Duration,
}

impl Default for NoticeSlot {
    fn default() -> Self {
        Self::new(DEFAULT_NOTICE_TTL)
    }
}

impl NoticeSlot {
    pub fn new(ttl: Duration) -> Self {
        Self { current: None, ttl }
    }

    /// Show `kind` with its default message.
    pub fn raise(&mut self, kind: NoticeKind, now: Instant) {
        self.raise_with(kind, kind.message(), now);
    }

    /// Show `kind` with a custom message.
    pub fn raise_with(&mut self, kind: NoticeKind, message: impl Into<String>, now: Instant) {
        self.current = Some(Notice {
            kind,
            message: message.into(),
            raised_at: now,
        });
    }

    /// The visible notice at `now`, if it has not expired.
    pub fn current(&self, now: Instant) -> Option<&Notice> {
        self.current
            .as_ref()
            .filter(|n| now.saturating_duration_since(n.raised_at) < self.ttl)
    }

    /// Drop an expired notice. Returns true if one was removed.
    pub fn expire(&mut self, now: Instant) -> bool {
        if self.current.is_some() && self.current(now).is_none() {
            self.current = None;
            return true;
        }
        false
    }

    pub fn clear(&mut self) {
        self.current = None;
    }
}
