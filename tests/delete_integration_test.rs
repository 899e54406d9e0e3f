//! Deletion pipeline tests against a wiremock server.

mod common;

use std::time::Duration;

use common::{build_api_with, connected, expected_auth, test_config, MINIMAL_ROLE};
use tokio_util::sync::CancellationToken;
use usersync::models::DeleteTarget;
use usersync::{DeletionPipeline, EventSink};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn stored_user() -> serde_json::Value {
    serde_json::json!({
        "id": "u1",
        "username": "alice",
        "userRoles": [{"id": "superuser"}],
        "organisationUnits": [{"id": "ou1"}],
        "dataViewOrganisationUnits": [{"id": "ou2"}],
        "teiSearchOrganisationUnits": [{"id": "ou3"}],
        "userGroups": [{"id": "g1"}],
        "attributeValues": []
    })
}

async fn mount_strip(server: &MockServer) {
    Mock::given(method("PUT"))
        .and(path("/api/users/u1"))
        .and(header("Authorization", expected_auth().as_str()))
        .and(body_partial_json(serde_json::json!({
            "disabled": true,
            "userRoles": [{"id": MINIMAL_ROLE}],
            "organisationUnits": [],
            "dataViewOrganisationUnits": [],
            "teiSearchOrganisationUnits": [],
            "userGroups": [],
            "attributeValues": []
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_strip_then_delete() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/users/u1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(stored_user()))
        .expect(1)
        .mount(&server)
        .await;
    mount_strip(&server).await;
    Mock::given(method("DELETE"))
        .and(path("/api/users/u1"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let pipeline = DeletionPipeline::new(
        build_api_with(test_config(&server.uri()), EventSink::disabled()),
        connected(),
    );
    let summary = pipeline
        .run(vec![DeleteTarget::new("u1", "alice")], &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(summary.deleted, 1);
    assert_eq!(summary.failed, 0);
}

#[tokio::test]
async fn test_delete_timeout_confirmed_by_404() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/users/u1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(stored_user()))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/users/u1"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;
    mount_strip(&server).await;
    Mock::given(method("DELETE"))
        .and(path("/api/users/u1"))
        .respond_with(ResponseTemplate::new(204).set_delay(Duration::from_secs(2)))
        .expect(1)
        .mount(&server)
        .await;

    let config = test_config(&server.uri()).with_delete_timeout(Duration::from_millis(200));
    let pipeline = DeletionPipeline::new(build_api_with(config, EventSink::disabled()), connected());
    let summary = pipeline
        .run(vec![DeleteTarget::new("u1", "alice")], &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(summary.deleted, 1);
    assert_eq!(summary.failed, 0);
}

#[tokio::test]
async fn test_delete_timeout_with_user_still_present_is_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/users/u1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(stored_user()))
        .expect(2)
        .mount(&server)
        .await;
    mount_strip(&server).await;
    Mock::given(method("DELETE"))
        .and(path("/api/users/u1"))
        .respond_with(ResponseTemplate::new(204).set_delay(Duration::from_secs(2)))
        .mount(&server)
        .await;

    let config = test_config(&server.uri()).with_delete_timeout(Duration::from_millis(200));
    let pipeline = DeletionPipeline::new(build_api_with(config, EventSink::disabled()), connected());
    let summary = pipeline
        .run(vec![DeleteTarget::new("u1", "alice")], &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(summary.deleted, 0);
    assert_eq!(summary.failed, 1);
}
