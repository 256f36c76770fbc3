//! Error types for the bookmarking API client.
//!
//! # Design
//! `Unauthorized` and `Throttled` get dedicated variants because callers
//! react to them differently from other failures: the first means the
//! credentials are wrong, the second means "back off and try again later".
//! All other non-200 responses land in `HttpError` with the raw status code
//! and body. A 200 response whose status string is not `done` becomes
//! `Rejected`, so a refused mutation can never pass for a successful one.

use thiserror::Error;

/// Errors returned by `DeliciousClient` parse methods and `Account` calls.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request never produced an HTTP response (DNS, TLS, I/O).
    #[error("transport failed: {0}")]
    Transport(String),

    /// The server returned 401; the credentials were not accepted.
    #[error("authentication rejected")]
    Unauthorized,

    /// The server returned 503, its throttling status.
    #[error("throttled by service: {url}")]
    Throttled { url: String },

    /// The server returned a non-200 status other than 401 or 503.
    #[error("HTTP {status}: {body}")]
    HttpError { status: u16, body: String },

    /// The server answered 200 but reported a status other than `done`.
    #[error("request rejected by service: {code}")]
    Rejected { code: String },

    /// The response body could not be turned into the expected records.
    #[error("deserialization failed: {0}")]
    DeserializationError(String),

    /// An input was refused before any request was issued.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl ApiError {
    /// HTTP status carried by this error, if the server produced one.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Unauthorized => Some(401),
            ApiError::Throttled { .. } => Some(503),
            ApiError::HttpError { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_throttled(&self) -> bool {
        matches!(self, ApiError::Throttled { .. })
    }
}
