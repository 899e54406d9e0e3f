//! Error category classification.
//!
//! Categories give callers a coarse view of an error for deciding whether
//! a run can be retried later or needs operator action first.

use std::fmt;

/// High-level categorization of errors for handling decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Connection, DNS, timeout. Generally transient.
    Network,

    /// Rejected credentials (401/403).
    Auth,

    /// Backend errors (5xx, throttling). Generally transient.
    Server,

    /// The server rejected the request content (4xx other than auth).
    Client,

    /// Input records or arguments need fixing before a run can start.
    User,

    /// Missing or inconsistent settings.
    Configuration,
}

impl ErrorCategory {
    /// Returns a short label for the category suitable for logging.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Network => "network",
            ErrorCategory::Auth => "auth",
            ErrorCategory::Server => "server",
            ErrorCategory::Client => "client",
            ErrorCategory::User => "user",
            ErrorCategory::Configuration => "configuration",
        }
    }

    /// Returns suggested recovery actions for this category.
    pub fn recovery_hint(&self) -> &'static str {
        match self {
            ErrorCategory::Network => "Check connectivity to the user API and try again",
            ErrorCategory::Auth => "Check the configured API username and password",
            ErrorCategory::Server => "The server may be overloaded. Please try again later",
            ErrorCategory::Client => "Check the submitted record against the server's rules",
            ErrorCategory::User => "Fix the input records and start the run again",
            ErrorCategory::Configuration => "Check your USERSYNC_* settings",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
