//! Connection monitor tests against a wiremock server.

mod common;

use std::time::Duration;

use common::{build_api_with, test_config, MockHttpConfig};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use usersync::monitor::wait_for_status;
use usersync::traits::Method;
use usersync::{ConnectionMonitor, ConnectionStatus, EventSink, RetryPolicy, RetryingTransport, UserApi};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_monitor_reports_connected() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/system/ping"))
        .respond_with(ResponseTemplate::new(200).set_body_string("pong"))
        .mount(&server)
        .await;

    let monitor = ConnectionMonitor::new(build_api_with(test_config(&server.uri()), EventSink::disabled()));
    let mut status = monitor.status_receiver();
    let stop = CancellationToken::new();
    let handle = monitor.spawn(stop.clone());

    let reached = tokio::time::timeout(Duration::from_secs(5), wait_for_status(&mut status))
        .await
        .unwrap();
    assert_eq!(reached, Some(ConnectionStatus::Connected));

    stop.cancel();
    handle.await.unwrap();
}

#[tokio::test]
async fn test_monitor_disconnects_after_three_failed_probes() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/system/ping"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let config = test_config(&server.uri()).with_max_attempts(1);
    let monitor = ConnectionMonitor::new(build_api_with(config, EventSink::disabled()));
    let mut status = monitor.status_receiver();
    let stop = CancellationToken::new();
    let handle = monitor.spawn(stop.clone());

    let reached = tokio::time::timeout(Duration::from_secs(5), wait_for_status(&mut status))
        .await
        .unwrap();
    assert_eq!(reached, Some(ConnectionStatus::Disconnected));
    assert_eq!(server.received_requests().await.unwrap().len(), 3);

    stop.cancel();
    handle.await.unwrap();
}

#[tokio::test]
async fn test_monitor_counts_probes_not_transport_attempts() {
    let mock = MockHttpConfig::new()
        .with_status(Method::Get, "http://dhis.test/api/system/ping", 500)
        .build();
    let config = test_config("http://dhis.test");
    let transport = RetryingTransport::new(
        Arc::new(mock.clone()),
        RetryPolicy::new(3, Duration::ZERO),
        EventSink::disabled(),
    );
    let mut monitor = ConnectionMonitor::new(UserApi::new(transport, config));

    monitor.probe_once().await;
    assert_eq!(monitor.consecutive_failures(), 1);
    assert_eq!(mock.get_requests().len(), 3);
    assert_eq!(monitor.status(), ConnectionStatus::Checking);
}
