use std::time::Duration;

use checkop_checkly::mapping::{check_payload, group_payload};
use checkop_checkly::{ApiError, ChecklyClient, CheckDefinition, GroupDefinition, MonitoringApi};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer) -> ChecklyClient {
    ChecklyClient::new(&server.uri(), "secret-key", "acct-1", Duration::from_secs(5)).unwrap()
}

fn check() -> CheckDefinition {
    CheckDefinition {
        name: "test-ingress-foobar-baz".into(),
        namespace: Some("web".into()),
        endpoint: "https://foo.bar/baz".into(),
        success: "200".into(),
        muted: true,
        group_id: 42,
        ..Default::default()
    }
}

#[tokio::test]
async fn test_create_check_sends_payload_and_auth() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/checks"))
        .and(header("Authorization", "Bearer secret-key"))
        .and(header("X-Checkly-Account", "acct-1"))
        .and(body_partial_json(serde_json::json!({
            "name": "test-ingress-foobar-baz",
            "checkType": "API",
            "muted": true,
            "shouldFail": false,
            "groupId": 42,
            "request": {"url": "https://foo.bar/baz", "method": "GET"}
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
            "id": "5f1c3a2e-check",
            "name": "test-ingress-foobar-baz"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let payload = check_payload(&check()).unwrap();
    let id = client(&server).create_check(&payload).await.unwrap();
    assert_eq!(id, "5f1c3a2e-check");
}

#[tokio::test]
async fn test_update_and_delete_check() {
    let server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/v1/checks/abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "abc"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/v1/checks/abc"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server);
    let payload = check_payload(&check()).unwrap();
    client.update_check("abc", &payload).await.unwrap();
    client.delete_check("abc").await.unwrap();
}

#[tokio::test]
async fn test_status_codes_map_to_error_taxonomy() {
    let server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/v1/checks/gone"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/v1/checks/busy"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/v1/checks/bad"))
        .respond_with(ResponseTemplate::new(400).set_body_string("frequency must be one of"))
        .mount(&server)
        .await;

    let client = client(&server);
    assert!(client.delete_check("gone").await.unwrap_err().is_not_found());

    let err = client.delete_check("busy").await.unwrap_err();
    assert!(err.is_retriable());
    assert!(err.to_string().contains("maintenance"));

    let payload = check_payload(&check()).unwrap();
    let err = client.update_check("bad", &payload).await.unwrap_err();
    assert!(matches!(err, ApiError::Validation(_)));
}

#[tokio::test]
async fn test_group_lifecycle() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/check-groups"))
        .and(body_partial_json(serde_json::json!({
            "name": "ops",
            "concurrency": 2,
            "locations": ["eu-west-1"]
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({"id": 17})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/v1/check-groups/17"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": 17})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/v1/check-groups/17"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server);
    let payload = group_payload(&GroupDefinition {
        name: "ops".into(),
        activated: true,
        ..Default::default()
    });
    let id = client.create_group(&payload).await.unwrap();
    assert_eq!(id, 17);
    client.update_group(id, &payload).await.unwrap();
    client.delete_group(id).await.unwrap();
}

#[tokio::test]
async fn test_connection_failure_is_transient() {
    let client = ChecklyClient::new(
        "http://127.0.0.1:1",
        "secret-key",
        "",
        Duration::from_secs(1),
    )
    .unwrap();
    let err = client.delete_group(1).await.unwrap_err();
    assert!(err.is_retriable());
}

#[tokio::test]
async fn test_base_url_path_prefix_is_kept() {
    let server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/checkly/v1/check-groups/7"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let base = format!("{}/checkly", server.uri());
    let client = ChecklyClient::new(&base, "secret-key", "acct-1", Duration::from_secs(5)).unwrap();
    client.delete_group(7).await.unwrap();
}
