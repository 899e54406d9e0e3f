//! Mock HTTP client for testing.
//!
//! Provides a configurable mock HTTP client that returns scripted responses
//! or errors, records every request, and tracks how many requests were in
//! flight at once.

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::error::NetworkError;
use crate::traits::{Headers, HttpClient, HttpRequest, Method, Response};

/// A recorded HTTP request for verification in tests.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: Method,
    pub url: String,
    pub headers: Headers,
    pub body: Option<String>,
    pub timeout: Duration,
    /// When the request reached the mock (tokio clock, so paused-time aware)
    pub sent_at: tokio::time::Instant,
}

impl RecordedRequest {
    /// Parse the recorded body as JSON.
    pub fn json(&self) -> Option<serde_json::Value> {
        self.body
            .as_deref()
            .and_then(|b| serde_json::from_str(b).ok())
    }
}

/// Configuration for a mock response.
#[derive(Debug, Clone)]
pub enum MockResponse {
    /// Return a response with any status
    Success(Response),
    /// Fail without a response
    Error(NetworkError),
}

impl MockResponse {
    /// An empty-bodied response with the given status.
    pub fn status(status: u16) -> Self {
        MockResponse::Success(Response::new(status, Bytes::new()))
    }

    /// A JSON response with the given status.
    pub fn json(status: u16, value: serde_json::Value) -> Self {
        MockResponse::Success(Response::json_body(status, &value))
    }

    /// A client-side timeout.
    pub fn timeout() -> Self {
        MockResponse::Error(NetworkError::Timeout {
            url: "mock".to_string(),
            duration_secs: 0,
        })
    }

    /// A refused connection.
    pub fn connection_failed() -> Self {
        MockResponse::Error(NetworkError::ConnectionFailed {
            url: "mock".to_string(),
            message: "connection refused".to_string(),
        })
    }
}

type RouteKey = (Method, String);

/// Mock HTTP client for testing.
///
/// Responses are looked up per method and URL in this order:
/// 1. the next queued response for the exact URL ([`push_response`])
/// 2. the fixed response for the exact URL ([`set_response`])
/// 3. the fixed response with the longest matching URL prefix
/// 4. the default response
///
/// [`push_response`]: MockHttpClient::push_response
/// [`set_response`]: MockHttpClient::set_response
#[derive(Debug, Clone, Default)]
pub struct MockHttpClient {
    responses: Arc<Mutex<HashMap<RouteKey, MockResponse>>>,
    queued: Arc<Mutex<HashMap<RouteKey, VecDeque<MockResponse>>>>,
    default_response: Arc<Mutex<Option<MockResponse>>>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    latency: Arc<Mutex<Duration>>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

impl MockHttpClient {
    /// Create a new mock HTTP client.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a fixed response for a method and URL (exact or prefix).
    pub fn set_response(&self, method: Method, url: &str, response: MockResponse) {
        let mut responses = self.responses.lock().unwrap();
        responses.insert((method, url.to_string()), response);
    }

    /// Queue a one-shot response for a method and exact URL.
    ///
    /// Queued responses are consumed in order before any fixed response.
    pub fn push_response(&self, method: Method, url: &str, response: MockResponse) {
        let mut queued = self.queued.lock().unwrap();
        queued
            .entry((method, url.to_string()))
            .or_default()
            .push_back(response);
    }

    /// Set a default response for requests without specific matches.
    pub fn set_default_response(&self, response: MockResponse) {
        let mut default = self.default_response.lock().unwrap();
        *default = Some(response);
    }

    /// Delay every response by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock().unwrap() = latency;
    }

    /// Get all recorded requests.
    pub fn get_requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Recorded requests with the given method.
    pub fn requests_with(&self, method: Method) -> Vec<RecordedRequest> {
        self.get_requests()
            .into_iter()
            .filter(|r| r.method == method)
            .collect()
    }

    /// Clear all recorded requests.
    pub fn clear_requests(&self) {
        self.requests.lock().unwrap().clear();
    }

    /// Highest number of requests observed in flight at the same time.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn record_request(&self, request: &HttpRequest) {
        let mut requests = self.requests.lock().unwrap();
        requests.push(RecordedRequest {
            method: request.method,
            url: request.url.clone(),
            headers: request.headers.clone(),
            body: request.body.clone(),
            timeout: request.timeout,
            sent_at: tokio::time::Instant::now(),
        });
    }

    fn get_response(&self, method: Method, url: &str) -> Option<MockResponse> {
        let key = (method, url.to_string());

        if let Some(queue) = self.queued.lock().unwrap().get_mut(&key) {
            if let Some(response) = queue.pop_front() {
                return Some(response);
            }
        }

        let responses = self.responses.lock().unwrap();
        if let Some(response) = responses.get(&key) {
            return Some(response.clone());
        }

        let prefix_match = responses
            .iter()
            .filter(|((m, pattern), _)| *m == method && url.starts_with(pattern.as_str()))
            .max_by_key(|((_, pattern), _)| pattern.len())
            .map(|(_, response)| response.clone());
        if prefix_match.is_some() {
            return prefix_match;
        }

        self.default_response.lock().unwrap().clone()
    }
}

#[async_trait]
impl HttpClient for MockHttpClient {
    async fn execute(&self, request: &HttpRequest) -> Result<Response, NetworkError> {
        self.record_request(request);

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let latency = *self.latency.lock().unwrap();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        let result = match self.get_response(request.method, &request.url) {
            Some(MockResponse::Success(response)) => Ok(response),
            Some(MockResponse::Error(err)) => Err(err),
            None => Err(NetworkError::Other {
                message: format!("No mock response for {} {}", request.method, request.url),
            }),
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}
