//! LibraryClient - handles communication with the library REST service.

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;

use super::retry::{is_transient_network_error, is_transient_status, parse_retry_after, RetryPolicy};
use super::types::{
    AddBooksRequest, AddBooksResponse, BookStatusUpdate, LibraryApi, RemoveBooksRequest,
    RemoveBooksResponse, StatusChange, UpdateStatusRequest,
};
use crate::book::{Book, LibraryEntry, ReadingStatus};

/// Environment variable holding the bearer token.
pub const LIBRARY_API_TOKEN_ENV: &str = "SHELFSCAN_TOKEN";

/// Environment variable overriding the service base URL.
pub const LIBRARY_API_URL_ENV: &str = "SHELFSCAN_API_URL";

/// Default base URL of the library service.
pub const DEFAULT_API_BASE_URL: &str = "https://api.virtuallibrary.com";

/// Default timeout for a single HTTP request.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

const LOOKUP_PATH: &str = "/api/books/lookup";
const LIBRARY_PATH: &str = "/api/library/";
const ADD_PATH: &str = "/api/library/add/";
const REMOVE_PATH: &str = "/api/library/remove/";
const UPDATE_STATUS_PATH: &str = "/api/library/update-status/";

const HTTP_STATUS_NOT_FOUND: u16 = 404;
const HTTP_STATUS_TOO_MANY_REQUESTS: u16 = 429;

/// Client for the library REST service.
pub struct LibraryClient {
    base_url: String,
    token: Option<String>,
    retry: RetryPolicy,
    http_client: reqwest::Client,
}

impl std::fmt::Debug for LibraryClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LibraryClient")
            .field("base_url", &self.base_url)
            .field("authenticated", &self.token.is_some())
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl LibraryClient {
    /// Create a client for a custom base URL, without a token.
    ///
    /// Useful for testing against a mock server.
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self, ApiError> {
        Self::with_settings(base_url.into(), None, DEFAULT_TIMEOUT, RetryPolicy::default())
    }

    /// Create a client with every knob explicit.
    pub fn with_settings(
        base_url: String,
        token: Option<String>,
        timeout: Duration,
        retry: RetryPolicy,
    ) -> Result<Self, ApiError> {
        let base_url = base_url.trim().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(ApiError::InvalidRequest("base URL is empty".to_string()));
        }

        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT.min(timeout))
            .build()?;

        Ok(Self {
            base_url,
            token: token.filter(|t| !t.trim().is_empty()),
            retry,
            http_client,
        })
    }

    /// Replace the bearer token.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        let token = token.into();
        self.token = (!token.trim().is_empty()).then_some(token);
        self
    }

    /// Replace the retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Send a request built by `make`, retrying transient failures.
    ///
    /// `make` is called once per attempt. Idempotent requests are retried on
    /// timeouts and gateway errors too; others only when the connection
    /// could not be established. Rate limits honour `Retry-After`.
    async fn execute<T, F>(&self, make: F, idempotent: bool) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        F: Fn() -> reqwest::RequestBuilder,
    {
        let max_attempts = self.retry.max_attempts();
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            let err = match self.send_once(self.authorize(make())).await {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };

            if !err.is_retryable(idempotent) {
                return Err(err);
            }

            if attempt >= max_attempts {
                log::error!("Request failed after {} attempts: {}", attempt, err);
                return Err(match err {
                    ApiError::Http(http_err) if attempt > 1 => ApiError::Network {
                        message: http_err.to_string(),
                        attempts: attempt,
                    },
                    other => other,
                });
            }

            let delay = match &err {
                ApiError::RateLimit {
                    retry_after_secs: Some(secs),
                    ..
                } => Duration::from_secs(*secs).min(self.retry.backoff_max),
                _ => self.retry.delay(attempt - 1),
            };

            log::warn!(
                "Request failed (attempt {}/{}): {}. Retrying in {:?}...",
                attempt,
                max_attempts,
                err,
                delay
            );

            tokio::time::sleep(delay).await;
        }
    }

    async fn send_once<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, ApiError> {
        let response = request.send().await?;
        let status = response.status();

        if status.is_success() {
            return Ok(response.json().await?);
        }

        if status.as_u16() == HTTP_STATUS_TOO_MANY_REQUESTS {
            let retry_after_secs = parse_retry_after(&response);
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::RateLimit {
                message: error_message(&body, status.as_u16()),
                retry_after_secs,
            });
        }

        let body = response.text().await.unwrap_or_default();
        Err(ApiError::Api {
            status: status.as_u16(),
            message: error_message(&body, status.as_u16()),
        })
    }
}

/// Extract a human-readable error from a response body.
///
/// Prefers the JSON `detail` field, then `message`, then `HTTP <status>`.
fn error_message(body: &str, status: u16) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| {
            ["detail", "message"].iter().find_map(|key| {
                value
                    .get(key)
                    .and_then(|v| v.as_str())
                    .map(str::to_string)
            })
        })
        .unwrap_or_else(|| format!("HTTP {}", status))
}

#[async_trait]
impl LibraryApi for LibraryClient {
    async fn lookup_book(&self, isbn: &str) -> Result<Book, ApiError> {
        let url = self.url(LOOKUP_PATH);
        let result = self
            .execute(
                || self.http_client.get(&url).query(&[("isbn", isbn)]),
                true,
            )
            .await;

        match result {
            Err(ApiError::Api {
                status: HTTP_STATUS_NOT_FOUND,
                ..
            }) => Err(ApiError::NotFound {
                isbn: isbn.to_string(),
            }),
            other => other,
        }
    }

    async fn list_library(&self) -> Result<Vec<LibraryEntry>, ApiError> {
        let url = self.url(LIBRARY_PATH);
        self.execute(|| self.http_client.get(&url), true).await
    }

    async fn add_books(&self, books: &[BookStatusUpdate]) -> Result<AddBooksResponse, ApiError> {
        if books.is_empty() {
            return Err(ApiError::InvalidRequest("no books to add".to_string()));
        }
        let url = self.url(ADD_PATH);
        let body = AddBooksRequest { books };
        self.execute(|| self.http_client.post(&url).json(&body), false)
            .await
    }

    async fn remove_books(&self, isbns: &[String]) -> Result<RemoveBooksResponse, ApiError> {
        if isbns.is_empty() {
            return Err(ApiError::InvalidRequest("no books to remove".to_string()));
        }
        let url = self.url(REMOVE_PATH);
        let body = RemoveBooksRequest { isbns };
        self.execute(|| self.http_client.post(&url).json(&body), false)
            .await
    }

    async fn update_status(
        &self,
        isbn: &str,
        status: ReadingStatus,
    ) -> Result<StatusChange, ApiError> {
        let url = self.url(UPDATE_STATUS_PATH);
        let body = UpdateStatusRequest { isbn, status };
        // Setting the same status twice is harmless, so this one may retry.
        self.execute(|| self.http_client.post(&url).json(&body), true)
            .await
    }
}

/// Errors that can occur talking to the library service.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    Api {
        /// HTTP status code of the response
        status: u16,
        /// `detail`/`message` from the body, or `HTTP <status>`
        message: String,
    },

    #[error("Book not found: {isbn}")]
    NotFound { isbn: String },

    #[error("Rate limited: {message}")]
    RateLimit {
        message: String,
        /// Retry-After header value in seconds, if provided
        retry_after_secs: Option<u64>,
    },

    #[error("Network error: {message} (after {attempts} attempts)")]
    Network { message: String, attempts: u32 },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl ApiError {
    fn is_retryable(&self, idempotent: bool) -> bool {
        match self {
            ApiError::Http(e) => is_transient_network_error(e, idempotent),
            ApiError::Api { status, .. } => idempotent && is_transient_status(*status),
            ApiError::RateLimit { .. } => true,
            _ => false,
        }
    }

    /// Whether the service reported that the book does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::NotFound { .. })
    }
}
