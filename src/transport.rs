//! Retrying request transport.
//!
//! Every request the engines issue goes through [`RetryingTransport::send`],
//! which resends the identical request with exponential backoff when the
//! failure looks transient and hands the final failure back untouched.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::config::SyncConfig;
use crate::error::NetworkError;
use crate::events::EventSink;
use crate::traits::{HttpClient, HttpRequest, Response};

/// Retry policy configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    /// Delay after the first failed attempt; doubles for each later one.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    #[must_use]
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// Delay before resending after `failed_attempt` (1-based) failed:
    /// `base_delay * 2^(failed_attempt - 1)`.
    #[must_use]
    pub fn delay_for(&self, failed_attempt: u32) -> Duration {
        let exponent = failed_attempt.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(1u32 << exponent)
    }

    /// Whether another attempt is allowed after `failed_attempt` failed
    /// with `error` on `request`.
    #[must_use]
    pub fn should_retry(&self, failed_attempt: u32, error: &NetworkError, request: &HttpRequest) -> bool {
        if !request.retryable || failed_attempt >= self.max_attempts {
            return false;
        }
        if error.is_timeout() && !request.retry_timeouts {
            return false;
        }
        error.is_retryable()
    }
}

/// Executes requests with bounded exponential-backoff retry.
///
/// Non-2xx responses become [`NetworkError::HttpStatus`] with the body
/// preserved. Only transient failures (see [`NetworkError::is_retryable`])
/// are resent; a 409 or 404 comes back on the first attempt.
#[derive(Clone)]
pub struct RetryingTransport {
    client: Arc<dyn HttpClient>,
    policy: RetryPolicy,
    events: EventSink,
}

impl RetryingTransport {
    pub fn new(client: Arc<dyn HttpClient>, policy: RetryPolicy, events: EventSink) -> Self {
        Self {
            client,
            policy,
            events,
        }
    }

    /// Build a transport using the attempt count and base delay from `config`.
    pub fn from_config(client: Arc<dyn HttpClient>, config: &SyncConfig, events: EventSink) -> Self {
        Self::new(
            client,
            RetryPolicy::new(config.max_attempts, config.retry_base_delay),
            events,
        )
    }

    pub fn events(&self) -> &EventSink {
        &self.events
    }

    /// Send `request`, retrying transient failures.
    ///
    /// Emits one warning per retry. After the last attempt the failure of
    /// that attempt is returned as-is.
    pub async fn send(&self, request: HttpRequest) -> Result<Response, NetworkError> {
        let mut attempt: u32 = 1;
        loop {
            let error = match self.client.execute(&request).await {
                Ok(response) if response.is_success() => {
                    if attempt > 1 {
                        debug!(
                            method = %request.method,
                            url = %request.url,
                            attempt,
                            "Request succeeded after retries"
                        );
                    }
                    return Ok(response);
                }
                Ok(response) => NetworkError::HttpStatus {
                    status: response.status,
                    body: response.text(),
                },
                Err(error) => error,
            };

            if !self.policy.should_retry(attempt, &error, &request) {
                if attempt > 1 {
                    debug!(
                        method = %request.method,
                        url = %request.url,
                        attempts = attempt,
                        error = %error,
                        "Giving up on request"
                    );
                }
                return Err(error);
            }

            let delay = self.policy.delay_for(attempt);
            warn!(
                method = %request.method,
                url = %request.url,
                attempt,
                max_attempts = self.policy.max_attempts,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "Retrying after transient error"
            );
            self.events.warning(format!(
                "{} {} failed ({}); retry {}/{} in {}ms",
                request.method,
                request.url,
                error,
                attempt,
                self.policy.max_attempts - 1,
                delay.as_millis()
            ));

            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::mock::{MockHttpClient, MockResponse};
    use crate::events::{create_event_channel, drain, LogSeverity, SyncEvent};
    use crate::traits::Method;

    const URL: &str = "https://dhis.test/api/users";

    fn transport(mock: &MockHttpClient, policy: RetryPolicy) -> RetryingTransport {
        RetryingTransport::new(Arc::new(mock.clone()), policy, EventSink::disabled())
    }

    #[test]
    fn test_default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.base_delay, Duration::from_secs(1));
    }

    #[test]
    fn test_delay_doubles() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(1), Duration::from_secs(1));
        assert_eq!(policy.delay_for(2), Duration::from_secs(2));
        assert_eq!(policy.delay_for(3), Duration::from_secs(4));
    }

    #[test]
    fn test_should_retry_respects_timeout_opt_out() {
        let policy = RetryPolicy::default();
        let timeout = NetworkError::Timeout {
            url: URL.to_string(),
            duration_secs: 60,
        };
        let plain = HttpRequest::delete(URL);
        let no_timeouts = HttpRequest::delete(URL).without_timeout_retries();
        assert!(policy.should_retry(1, &timeout, &plain));
        assert!(!policy.should_retry(1, &timeout, &no_timeouts));
        assert!(!policy.should_retry(3, &timeout, &plain));
    }

    #[tokio::test]
    async fn test_success_first_try() {
        let mock = MockHttpClient::new();
        mock.set_response(Method::Get, URL, MockResponse::status(200));

        let response = transport(&mock, RetryPolicy::default())
            .send(HttpRequest::get(URL))
            .await
            .unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(mock.get_requests().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_one_then_two_seconds() {
        let mock = MockHttpClient::new();
        mock.push_response(Method::Get, URL, MockResponse::status(503));
        mock.push_response(Method::Get, URL, MockResponse::connection_failed());
        mock.push_response(Method::Get, URL, MockResponse::status(200));

        let response = transport(&mock, RetryPolicy::default())
            .send(HttpRequest::get(URL))
            .await
            .unwrap();
        assert_eq!(response.status, 200);

        let requests = mock.get_requests();
        assert_eq!(requests.len(), 3);
        assert_eq!(
            requests[1].sent_at - requests[0].sent_at,
            Duration::from_secs(1)
        );
        assert_eq!(
            requests[2].sent_at - requests[1].sent_at,
            Duration::from_secs(2)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_attempts_surface_last_error() {
        let mock = MockHttpClient::new();
        mock.push_response(Method::Put, URL, MockResponse::status(500));
        mock.push_response(Method::Put, URL, MockResponse::status(502));
        mock.push_response(
            Method::Put,
            URL,
            MockResponse::json(503, serde_json::json!({"message": "maintenance"})),
        );

        let err = transport(&mock, RetryPolicy::default())
            .send(HttpRequest::put(URL))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            NetworkError::HttpStatus {
                status: 503,
                body: r#"{"message":"maintenance"}"#.to_string(),
            }
        );
        assert_eq!(mock.get_requests().len(), 3);
    }

    #[tokio::test]
    async fn test_conflict_not_retried() {
        let mock = MockHttpClient::new();
        mock.set_response(Method::Post, URL, MockResponse::status(409));

        let err = transport(&mock, RetryPolicy::new(3, Duration::ZERO))
            .send(HttpRequest::post(URL))
            .await
            .unwrap_err();
        assert!(err.has_status(409));
        assert_eq!(mock.get_requests().len(), 1);
    }

    #[tokio::test]
    async fn test_timeout_opt_out_returns_first_timeout() {
        let mock = MockHttpClient::new();
        mock.set_response(Method::Delete, URL, MockResponse::timeout());

        let err = transport(&mock, RetryPolicy::new(3, Duration::ZERO))
            .send(HttpRequest::delete(URL).without_timeout_retries())
            .await
            .unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(mock.get_requests().len(), 1);
    }

    #[tokio::test]
    async fn test_single_attempt_request_not_resent() {
        let mock = MockHttpClient::new();
        mock.push_response(Method::Get, URL, MockResponse::status(503));
        mock.push_response(Method::Get, URL, MockResponse::status(200));

        let err = transport(&mock, RetryPolicy::new(3, Duration::ZERO))
            .send(HttpRequest::get(URL).without_retries())
            .await
            .unwrap_err();
        assert!(err.has_status(503));
        assert_eq!(mock.get_requests().len(), 1);
    }

    #[tokio::test]
    async fn test_one_warning_per_retry() {
        let mock = MockHttpClient::new();
        mock.set_response(Method::Get, URL, MockResponse::status(500));
        let (sink, mut rx) = create_event_channel();
        let transport =
            RetryingTransport::new(Arc::new(mock.clone()), RetryPolicy::new(3, Duration::ZERO), sink);

        let _ = transport.send(HttpRequest::get(URL)).await;

        let warnings: Vec<_> = drain(&mut rx)
            .into_iter()
            .filter(|e| matches!(e, SyncEvent::Log(l) if l.severity == LogSeverity::Warning))
            .collect();
        assert_eq!(warnings.len(), 2);
    }

    #[tokio::test]
    async fn test_identical_request_resent() {
        let mock = MockHttpClient::new();
        mock.push_response(Method::Post, URL, MockResponse::status(500));
        mock.push_response(Method::Post, URL, MockResponse::status(201));

        let request = HttpRequest::post(URL)
            .with_json(&serde_json::json!({"username": "alice"}))
            .unwrap();
        transport(&mock, RetryPolicy::new(3, Duration::ZERO))
            .send(request)
            .await
            .unwrap();

        let requests = mock.get_requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].body, requests[1].body);
        assert_eq!(requests[0].headers, requests[1].headers);
    }
}
