//! In-memory library service for session tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use shelfscan::api::{
    AddBooksResponse, ApiError, BookStatusUpdate, LibraryApi, RemoveBooksResponse, StatusChange,
};
use shelfscan::book::{Book, LibraryEntry, ReadingStatus};

/// Library service fake with call counters and failure switches.
///
/// Every call sleeps for `latency` first so concurrent calls interleave.
#[derive(Default)]
pub struct FakeLibrary {
    catalog: Mutex<HashMap<String, Book>>,
    library: Mutex<Vec<LibraryEntry>>,
    submissions: Mutex<Vec<Vec<BookStatusUpdate>>>,
    latency: Mutex<Duration>,
    pub lookup_calls: AtomicUsize,
    pub list_calls: AtomicUsize,
    pub add_calls: AtomicUsize,
    pub fail_add: AtomicBool,
    pub fail_list: AtomicBool,
}

impl FakeLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `isbn` known to the lookup endpoint.
    pub fn with_book(self, isbn: &str, title: &str) -> Self {
        self.catalog.lock().unwrap().insert(
            isbn.to_string(),
            Book::new(isbn, title, vec!["A. Author".to_string()]),
        );
        self
    }

    /// Put `isbn` in the user's library.
    pub fn with_owned(self, isbn: &str, status: ReadingStatus) -> Self {
        self.library.lock().unwrap().push(LibraryEntry {
            book: Book::new(isbn, "Owned", vec![]),
            status,
            added_at: Utc::now(),
        });
        self
    }

    pub fn with_latency(self, latency: Duration) -> Self {
        *self.latency.lock().unwrap() = latency;
        self
    }

    pub fn lookups(&self) -> usize {
        self.lookup_calls.load(Ordering::SeqCst)
    }

    pub fn submissions(&self) -> Vec<Vec<BookStatusUpdate>> {
        self.submissions.lock().unwrap().clone()
    }

    async fn wait(&self) {
        let latency = *self.latency.lock().unwrap();
        if latency.is_zero() {
            tokio::task::yield_now().await;
        } else {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait]
impl LibraryApi for FakeLibrary {
    async fn lookup_book(&self, isbn: &str) -> Result<Book, ApiError> {
        self.lookup_calls.fetch_add(1, Ordering::SeqCst);
        self.wait().await;
        let found = self.catalog.lock().unwrap().get(isbn).cloned();
        found.ok_or_else(|| ApiError::NotFound {
            isbn: isbn.to_string(),
        })
    }

    async fn list_library(&self) -> Result<Vec<LibraryEntry>, ApiError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.wait().await;
        if self.fail_list.load(Ordering::SeqCst) {
            return Err(ApiError::Api {
                status: 500,
                message: "HTTP 500".to_string(),
            });
        }
        Ok(self.library.lock().unwrap().clone())
    }

    async fn add_books(&self, books: &[BookStatusUpdate]) -> Result<AddBooksResponse, ApiError> {
        self.add_calls.fetch_add(1, Ordering::SeqCst);
        self.wait().await;
        if self.fail_add.load(Ordering::SeqCst) {
            return Err(ApiError::Api {
                status: 503,
                message: "Service unavailable".to_string(),
            });
        }
        self.submissions.lock().unwrap().push(books.to_vec());
        Ok(AddBooksResponse {
            added: books
                .iter()
                .map(|b| serde_json::json!({"isbn": b.isbn}))
                .collect(),
            errors: vec![],
        })
    }

    async fn remove_books(&self, isbns: &[String]) -> Result<RemoveBooksResponse, ApiError> {
        let mut library = self.library.lock().unwrap();
        library.retain(|e| !isbns.contains(&e.book.isbn));
        Ok(RemoveBooksResponse {
            removed: isbns.to_vec(),
            errors: vec![],
        })
    }

    async fn update_status(
        &self,
        isbn: &str,
        status: ReadingStatus,
    ) -> Result<StatusChange, ApiError> {
        Ok(StatusChange {
            isbn: isbn.to_string(),
            new_status: status,
        })
    }
}
