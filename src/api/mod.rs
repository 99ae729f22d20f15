//! REST client for the library service.
//!
//! The scan session talks to the service only through the [`LibraryApi`]
//! trait; [`LibraryClient`] is the HTTP implementation.

mod client;
mod retry;
mod types;

pub use client::{
    ApiError, LibraryClient, DEFAULT_API_BASE_URL, LIBRARY_API_TOKEN_ENV, LIBRARY_API_URL_ENV,
};
pub use retry::RetryPolicy;
pub use types::{AddBooksResponse, BookStatusUpdate, LibraryApi, RemoveBooksResponse, StatusChange};
