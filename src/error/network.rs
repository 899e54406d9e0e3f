//! Network-related error types.
//!
//! Every request outcome that is not a 2xx response ends up here, either as
//! a transport failure (no response at all) or as an [`NetworkError::HttpStatus`]
//! carrying the server's status and body untouched.

use std::fmt;

use super::category::ErrorCategory;

/// Network-specific error variants.
#[derive(Debug, Clone, PartialEq)]
pub enum NetworkError {
    /// Connection to the server failed before a request was sent.
    ConnectionFailed { url: String, message: String },

    /// The client gave up waiting for a response.
    Timeout { url: String, duration_secs: u64 },

    /// The server answered with a non-2xx status.
    HttpStatus { status: u16, body: String },

    /// The connection broke while reading or writing.
    Io { message: String },

    /// The response could not be decoded.
    InvalidResponse { message: String },

    /// Generic network error.
    Other { message: String },
}

impl NetworkError {
    /// Check if this error is likely transient and the identical request
    /// can be sent again.
    pub fn is_retryable(&self) -> bool {
        match self {
            NetworkError::ConnectionFailed { .. } => true,
            NetworkError::Timeout { .. } => true,
            NetworkError::Io { .. } => true,
            NetworkError::HttpStatus { status, .. } => {
                *status >= 500 || *status == 429 || *status == 408
            }
            NetworkError::InvalidResponse { .. } => false,
            NetworkError::Other { .. } => false,
        }
    }

    /// True for a client-side timeout, where the server outcome is unknown.
    pub fn is_timeout(&self) -> bool {
        matches!(self, NetworkError::Timeout { .. })
    }

    /// The HTTP status, if the server responded.
    pub fn status(&self) -> Option<u16> {
        match self {
            NetworkError::HttpStatus { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// True if the server answered with exactly `code`.
    pub fn has_status(&self, code: u16) -> bool {
        self.status() == Some(code)
    }

    /// Classify the error for handling decisions.
    pub fn category(&self) -> ErrorCategory {
        match self {
            NetworkError::HttpStatus { status, .. } => match *status {
                401 | 403 => ErrorCategory::Auth,
                408 | 429 | 500..=599 => ErrorCategory::Server,
                _ => ErrorCategory::Client,
            },
            NetworkError::InvalidResponse { .. } => ErrorCategory::Server,
            _ => ErrorCategory::Network,
        }
    }
}

impl fmt::Display for NetworkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetworkError::ConnectionFailed { url, message } => {
                write!(f, "Connection failed to '{}': {}", url, message)
            }
            NetworkError::Timeout { url, duration_secs } => {
                write!(f, "Request to '{}' timed out after {} seconds", url, duration_secs)
            }
            NetworkError::HttpStatus { status, body } => {
                if body.is_empty() {
                    write!(f, "HTTP {} error", status)
                } else {
                    write!(f, "HTTP {} error: {}", status, body)
                }
            }
            NetworkError::Io { message } => write!(f, "IO error: {}", message),
            NetworkError::InvalidResponse { message } => {
                write!(f, "Invalid response: {}", message)
            }
            NetworkError::Other { message } => write!(f, "Network error: {}", message),
        }
    }
}

impl std::error::Error for NetworkError {}

/// Classify a reqwest error into a NetworkError.
pub fn classify_reqwest_error(err: &reqwest::Error, url: &str, timeout_secs: u64) -> NetworkError {
    if err.is_timeout() {
        NetworkError::Timeout {
            url: url.to_string(),
            duration_secs: timeout_secs,
        }
    } else if err.is_connect() {
        NetworkError::ConnectionFailed {
            url: url.to_string(),
            message: err.to_string(),
        }
    } else if err.is_decode() {
        NetworkError::InvalidResponse {
            message: format!("Failed to decode response: {}", err),
        }
    } else if err.is_body() || err.is_request() {
        NetworkError::Io {
            message: err.to_string(),
        }
    } else {
        NetworkError::Other {
            message: err.to_string(),
        }
    }
}
