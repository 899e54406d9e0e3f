//! Connection and pipeline settings.
//!
//! Use the builder methods to customize a [`SyncConfig`], or load one from
//! `USERSYNC_*` environment variables with [`SyncConfig::from_env`].
//!
//! ```ignore
//! use usersync::config::SyncConfig;
//!
//! let config = SyncConfig::new("https://play.dhis2.org/dev")
//!     .with_credentials("admin", "district")
//!     .with_minimal_role_id("Euq3XfEIEbx");
//! ```

use std::time::Duration;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};

use crate::error::{SyncError, SyncResult};

pub const ENV_BASE_URL: &str = "USERSYNC_BASE_URL";
pub const ENV_USERNAME: &str = "USERSYNC_USERNAME";
pub const ENV_PASSWORD: &str = "USERSYNC_PASSWORD";
pub const ENV_MINIMAL_ROLE_ID: &str = "USERSYNC_MINIMAL_ROLE_ID";
pub const ENV_PAGE_SIZE: &str = "USERSYNC_PAGE_SIZE";

/// Settings shared by the transport, the monitor and every pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncConfig {
    /// Server root, without the trailing `/api`
    pub base_url: String,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Timeout for every request except the delete call
    pub request_timeout: Duration,
    /// Timeout for the delete call; server-side deletion can be slow
    pub delete_timeout: Duration,
    /// Total attempts per request, including the first
    pub max_attempts: u32,
    /// First retry delay; doubles per attempt
    pub retry_base_delay: Duration,
    /// Liveness probe cadence once connected or past the failure threshold
    pub probe_interval: Duration,
    /// Consecutive probe failures before reporting disconnected
    pub probe_failure_threshold: u32,
    /// First probe backoff below the threshold; doubles per failure
    pub probe_base_delay: Duration,
    /// Pause between the reference-stripping update and the delete
    pub settle_delay: Duration,
    /// The one role a user keeps while being stripped for deletion
    pub minimal_role_id: Option<String>,
    /// Export page size
    pub page_size: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            username: None,
            password: None,
            request_timeout: Duration::from_secs(30),
            delete_timeout: Duration::from_secs(60),
            max_attempts: 3,
            retry_base_delay: Duration::from_secs(1),
            probe_interval: Duration::from_secs(30),
            probe_failure_threshold: 3,
            probe_base_delay: Duration::from_secs(1),
            settle_delay: Duration::from_secs(2),
            minimal_role_id: None,
            page_size: 5000,
        }
    }
}

impl SyncConfig {
    /// Create a config for the given server with default settings.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::default().with_base_url(base_url)
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_delete_timeout(mut self, timeout: Duration) -> Self {
        self.delete_timeout = timeout;
        self
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn with_retry_base_delay(mut self, delay: Duration) -> Self {
        self.retry_base_delay = delay;
        self
    }

    pub fn with_probe_interval(mut self, interval: Duration) -> Self {
        self.probe_interval = interval;
        self
    }

    pub fn with_probe_base_delay(mut self, delay: Duration) -> Self {
        self.probe_base_delay = delay;
        self
    }

    pub fn with_probe_failure_threshold(mut self, threshold: u32) -> Self {
        self.probe_failure_threshold = threshold.max(1);
        self
    }

    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    pub fn with_minimal_role_id(mut self, role_id: impl Into<String>) -> Self {
        self.minimal_role_id = Some(role_id.into());
        self
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Zero every delay. Intended for tests against a local mock server.
    pub fn without_delays(self) -> Self {
        self.with_retry_base_delay(Duration::ZERO)
            .with_probe_base_delay(Duration::ZERO)
            .with_settle_delay(Duration::ZERO)
    }

    /// Load settings from `USERSYNC_*` environment variables.
    ///
    /// `USERSYNC_BASE_URL` is required; everything else falls back to the
    /// defaults.
    pub fn from_env() -> SyncResult<Self> {
        let base_url = std::env::var(ENV_BASE_URL)
            .map_err(|_| SyncError::Config(format!("{} is not set", ENV_BASE_URL)))?;
        let mut config = Self::new(base_url);

        if let (Ok(user), Ok(pass)) = (std::env::var(ENV_USERNAME), std::env::var(ENV_PASSWORD)) {
            config = config.with_credentials(user, pass);
        }
        if let Ok(role) = std::env::var(ENV_MINIMAL_ROLE_ID) {
            config = config.with_minimal_role_id(role);
        }
        if let Ok(raw) = std::env::var(ENV_PAGE_SIZE) {
            let size = raw.parse::<u32>().map_err(|_| {
                SyncError::Config(format!("{} must be a positive integer, got '{}'", ENV_PAGE_SIZE, raw))
            })?;
            config = config.with_page_size(size);
        }
        Ok(config)
    }

    /// `Authorization` header value, when credentials are configured.
    pub fn authorization_header(&self) -> Option<String> {
        match (&self.username, &self.password) {
            (Some(user), Some(pass)) => {
                Some(format!("Basic {}", BASE64.encode(format!("{}:{}", user, pass))))
            }
            _ => None,
        }
    }

    /// Absolute URL for a path below `/api`.
    pub fn api_url(&self, path: &str) -> String {
        format!("{}/api/{}", self.base_url, path.trim_start_matches('/'))
    }
}
