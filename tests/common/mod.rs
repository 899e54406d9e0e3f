//! Common test utilities for integration tests.
//!
//! This module provides reusable fixtures and helpers for running the
//! pipelines against a `wiremock` server through the reqwest adapter.
//!
//! # Example
//!
//! ```ignore
//! let server = MockServer::start().await;
//! let api = build_api(&server.uri(), EventSink::disabled());
//! ```

#![allow(dead_code)]

pub mod mocks;

pub use mocks::*;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use usersync::adapters::ReqwestHttpClient;
use usersync::models::UserRecord;
use usersync::{ConnectionStatus, EventSink, RetryingTransport, SyncConfig, UserApi};

pub const TEST_USER: &str = "admin";
pub const TEST_PASSWORD: &str = "district";
pub const MINIMAL_ROLE: &str = "minRole";

/// `Authorization` header the server should see for the test credentials.
pub fn expected_auth() -> String {
    "Basic YWRtaW46ZGlzdHJpY3Q=".to_string()
}

/// Config pointing at a mock server, with every delay zeroed.
pub fn test_config(uri: &str) -> SyncConfig {
    SyncConfig::new(uri)
        .with_credentials(TEST_USER, TEST_PASSWORD)
        .with_minimal_role_id(MINIMAL_ROLE)
        .with_request_timeout(Duration::from_secs(5))
        .without_delays()
}

pub fn build_api_with(config: SyncConfig, events: EventSink) -> UserApi {
    let transport =
        RetryingTransport::from_config(Arc::new(ReqwestHttpClient::new()), &config, events);
    UserApi::new(transport, config)
}

pub fn build_api(uri: &str, events: EventSink) -> UserApi {
    build_api_with(test_config(uri), events)
}

/// A status receiver that always reports `Connected`.
pub fn connected() -> watch::Receiver<ConnectionStatus> {
    watch::channel(ConnectionStatus::Connected).1
}

/// A valid record with one role and one org unit.
pub fn user_record(username: &str) -> UserRecord {
    UserRecord::new(username)
        .with_names("Test", username)
        .with_roles(["role1"])
        .with_org_units(["ou1"])
}

pub fn user_records(count: usize) -> Vec<UserRecord> {
    (0..count).map(|i| user_record(&format!("user{}", i))).collect()
}
