//! Reqwest-based HTTP client adapter.
//!
//! This module provides the production HTTP client implementation using
//! reqwest, implementing the [`HttpClient`] trait from `crate::traits`.

use async_trait::async_trait;

use crate::error::{classify_reqwest_error, NetworkError};
use crate::traits::{Headers, HttpClient, HttpRequest, Method, Response};

/// HTTP client implementation using reqwest.
///
/// Timeouts are applied per request from [`HttpRequest::timeout`], so one
/// client serves both the standard and the extended delete timeout.
#[derive(Debug, Clone)]
pub struct ReqwestHttpClient {
    client: reqwest::Client,
}

impl ReqwestHttpClient {
    /// Create a new ReqwestHttpClient with default settings.
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    /// Create a new ReqwestHttpClient with a custom reqwest::Client.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Get a reference to the underlying reqwest::Client.
    pub fn inner(&self) -> &reqwest::Client {
        &self.client
    }

    /// Convert reqwest headers to our Headers type.
    fn convert_headers(headers: &reqwest::header::HeaderMap) -> Headers {
        headers
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.to_string(), v.to_string()))
            })
            .collect()
    }

    /// Build the reqwest request for a method, URL, headers and body.
    fn build(&self, request: &HttpRequest) -> reqwest::RequestBuilder {
        let mut builder = match request.method {
            Method::Get => self.client.get(&request.url),
            Method::Post => self.client.post(&request.url),
            Method::Put => self.client.put(&request.url),
            Method::Delete => self.client.delete(&request.url),
        };
        for (key, value) in &request.headers {
            builder = builder.header(key, value);
        }
        if let Some(ref body) = request.body {
            builder = builder.body(body.clone());
        }
        builder.timeout(request.timeout)
    }
}

impl Default for ReqwestHttpClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn execute(&self, request: &HttpRequest) -> Result<Response, NetworkError> {
        let timeout_secs = request.timeout.as_secs();
        let classify = |e: reqwest::Error| classify_reqwest_error(&e, &request.url, timeout_secs);

        let response = self.build(request).send().await.map_err(classify)?;

        let status = response.status().as_u16();
        let headers = Self::convert_headers(response.headers());
        let body = response.bytes().await.map_err(classify)?;

        Ok(Response::with_headers(status, headers, body))
    }
}
