//! Book metadata and reading-status types shared by the API client and the
//! scan session.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Book metadata as returned by the lookup endpoint.
///
/// The ISBN is the primary identity. A `Book` is never modified after it has
/// been fetched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Book {
    pub isbn: String,
    pub title: String,
    #[serde(default)]
    pub authors: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publisher: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub categories: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    /// Cover thumbnail URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_thumbnail: Option<String>,
}

impl Book {
    /// Minimal book with only the required fields set.
    pub fn new(isbn: impl Into<String>, title: impl Into<String>, authors: Vec<String>) -> Self {
        Self {
            isbn: isbn.into(),
            title: title.into(),
            authors,
            publisher: None,
            published_date: None,
            description: None,
            page_count: None,
            categories: None,
            language: None,
            image_thumbnail: None,
        }
    }

    /// Authors joined for display, or "Unknown author".
    pub fn author_line(&self) -> String {
        if self.authors.is_empty() {
            "Unknown author".to_string()
        } else {
            self.authors.join(", ")
        }
    }
}

impl fmt::Display for Book {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} by {} [{}]", self.title, self.author_line(), self.isbn)
    }
}

/// Where a book stands for the reader. No other values exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadingStatus {
    ToRead,
    Reading,
    Read,
}

impl ReadingStatus {
    pub const ALL: [ReadingStatus; 3] = [Self::ToRead, Self::Reading, Self::Read];

    /// Wire name (`to_read`, `reading`, `read`).
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ToRead => "to_read",
            Self::Reading => "reading",
            Self::Read => "read",
        }
    }

    /// Human-readable label.
    pub fn label(self) -> &'static str {
        match self {
            Self::ToRead => "To read",
            Self::Reading => "Reading",
            Self::Read => "Read",
        }
    }
}

impl fmt::Display for ReadingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown reading status.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown reading status '{0}' (expected to_read, reading or read)")]
pub struct UnknownStatus(pub String);

impl FromStr for ReadingStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "to_read" | "to-read" => Ok(Self::ToRead),
            "reading" => Ok(Self::Reading),
            "read" => Ok(Self::Read),
            _ => Err(UnknownStatus(s.to_string())),
        }
    }
}

/// A confirmed book waiting in the scan batch, not yet persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingBook {
    pub book: Book,
    pub status: ReadingStatus,
}

impl PendingBook {
    pub fn isbn(&self) -> &str {
        &self.book.isbn
    }
}

/// A book held in the remote library.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibraryEntry {
    pub book: Book,
    pub status: ReadingStatus,
    pub added_at: DateTime<Utc>,
}
