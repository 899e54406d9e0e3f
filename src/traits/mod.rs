//! Trait abstractions for dependency injection and testability.
//!
//! - [`HttpClient`] - one-request HTTP execution, implemented by the reqwest
//!   adapter and by the mock used in tests

pub mod http;

pub use http::{Headers, HttpClient, HttpRequest, Method, Response, DEFAULT_TIMEOUT};
