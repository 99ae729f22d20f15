//! Request/response shapes and the collaborator trait used by the scan session.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::client::ApiError;
use crate::book::{Book, LibraryEntry, ReadingStatus};

/// One `(isbn, status)` pair in an add-books request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookStatusUpdate {
    pub isbn: String,
    pub status: ReadingStatus,
}

/// Response of the add-books endpoint.
///
/// Entries are kept as raw JSON; the service reports them per book and their
/// shape is not part of the contract.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct AddBooksResponse {
    #[serde(default)]
    pub added: Vec<serde_json::Value>,
    #[serde(default)]
    pub errors: Vec<serde_json::Value>,
}

/// Response of the remove-books endpoint.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RemoveBooksResponse {
    #[serde(default)]
    pub removed: Vec<String>,
    #[serde(default)]
    pub errors: Vec<serde_json::Value>,
}

/// Response of the update-status endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StatusChange {
    pub isbn: String,
    pub new_status: ReadingStatus,
}

#[derive(Debug, Serialize)]
pub(super) struct AddBooksRequest<'a> {
    pub books: &'a [BookStatusUpdate],
}

#[derive(Debug, Serialize)]
pub(super) struct RemoveBooksRequest<'a> {
    pub isbns: &'a [String],
}

#[derive(Debug, Serialize)]
pub(super) struct UpdateStatusRequest<'a> {
    pub isbn: &'a str,
    pub status: ReadingStatus,
}

/// Operations the scan session and CLI need from the library service.
#[async_trait]
pub trait LibraryApi: Send + Sync {
    /// Fetch metadata for one ISBN. Unknown ISBNs yield `ApiError::NotFound`.
    async fn lookup_book(&self, isbn: &str) -> Result<Book, ApiError>;

    /// Every book currently in the user's library.
    async fn list_library(&self) -> Result<Vec<LibraryEntry>, ApiError>;

    /// Add all given books in a single request.
    async fn add_books(&self, books: &[BookStatusUpdate]) -> Result<AddBooksResponse, ApiError>;

    async fn remove_books(&self, isbns: &[String]) -> Result<RemoveBooksResponse, ApiError>;

    async fn update_status(&self, isbn: &str, status: ReadingStatus)
        -> Result<StatusChange, ApiError>;
}
