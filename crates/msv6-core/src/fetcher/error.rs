use serde::Serialize;
use std::fmt;
use std::io;

use crate::retry::{classify_curl_error, classify_http_status, ErrorKind, Retryable};

/// Failure of one entry's fetch.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("connection failed: {0}")]
    ConnectionFailed(String),
    #[error("timed out: {0}")]
    Timeout(String),
    #[error("size mismatch: expected {expected} bytes, got {actual}")]
    SizeMismatch { expected: u64, actual: u64 },
    #[error("no raw URL for this entry")]
    RawUrlUnavailable,
    #[error("HTTP {0}")]
    Http(u32),
    #[error("storage: {0}")]
    Storage(#[from] io::Error),
    #[error("cancelled")]
    Cancelled,
}

impl From<curl::Error> for FetchError {
    fn from(e: curl::Error) -> Self {
        match classify_curl_error(&e) {
            ErrorKind::Timeout => FetchError::Timeout(e.to_string()),
            _ => FetchError::ConnectionFailed(e.to_string()),
        }
    }
}

impl FetchError {
    pub fn kind(&self) -> FetchErrorKind {
        match self {
            FetchError::ConnectionFailed(_) => FetchErrorKind::ConnectionFailed,
            FetchError::Timeout(_) => FetchErrorKind::Timeout,
            FetchError::SizeMismatch { .. } => FetchErrorKind::SizeMismatch,
            FetchError::RawUrlUnavailable => FetchErrorKind::RawUrlUnavailable,
            FetchError::Http(_) => FetchErrorKind::Http,
            FetchError::Storage(_) => FetchErrorKind::Storage,
            FetchError::Cancelled => FetchErrorKind::Cancelled,
        }
    }
}

impl Retryable for FetchError {
    fn retry_kind(&self) -> ErrorKind {
        match self {
            FetchError::ConnectionFailed(_) => ErrorKind::Connection,
            FetchError::Timeout(_) => ErrorKind::Timeout,
            FetchError::Http(code) => classify_http_status(*code),
            FetchError::SizeMismatch { .. }
            | FetchError::RawUrlUnavailable
            | FetchError::Storage(_)
            | FetchError::Cancelled => ErrorKind::Other,
        }
    }
}

/// Stable, reportable error category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FetchErrorKind {
    ConnectionFailed,
    Timeout,
    SizeMismatch,
    RawUrlUnavailable,
    Http,
    Storage,
    Cancelled,
}

impl fmt::Display for FetchErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FetchErrorKind::ConnectionFailed => "connection-failed",
            FetchErrorKind::Timeout => "timeout",
            FetchErrorKind::SizeMismatch => "size-mismatch",
            FetchErrorKind::RawUrlUnavailable => "raw-url-unavailable",
            FetchErrorKind::Http => "http",
            FetchErrorKind::Storage => "storage",
            FetchErrorKind::Cancelled => "cancelled",
        })
    }
}
