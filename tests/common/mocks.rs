//! Mock implementations for test fixtures.
//!
//! This module re-exports the mock implementations from
//! `usersync::adapters::mock` and provides a builder for scripting them.

pub use usersync::adapters::mock::{MockHttpClient, MockResponse, RecordedRequest};
pub use usersync::traits::{HttpClient, Method, Response};

use serde_json::Value;

/// Configuration for setting up mock HTTP responses.
pub struct MockHttpConfig {
    client: MockHttpClient,
}

impl MockHttpConfig {
    /// Creates a new mock HTTP configuration.
    pub fn new() -> Self {
        Self {
            client: MockHttpClient::new(),
        }
    }

    /// Configures a JSON response for a method and URL.
    pub fn with_json_response(self, method: Method, url: &str, status: u16, json: Value) -> Self {
        self.client
            .set_response(method, url, MockResponse::json(status, json));
        self
    }

    /// Configures an empty-bodied response for a method and URL.
    pub fn with_status(self, method: Method, url: &str, status: u16) -> Self {
        self.client
            .set_response(method, url, MockResponse::status(status));
        self
    }

    /// Queues a one-shot response ahead of the fixed one.
    pub fn with_queued(self, method: Method, url: &str, response: MockResponse) -> Self {
        self.client.push_response(method, url, response);
        self
    }

    /// Configures a default response for unmatched requests.
    pub fn with_default_status(self, status: u16) -> Self {
        self.client
            .set_default_response(MockResponse::status(status));
        self
    }

    /// Builds the configured MockHttpClient.
    pub fn build(self) -> MockHttpClient {
        self.client
    }
}

impl Default for MockHttpConfig {
    fn default() -> Self {
        Self::new()
    }
}
