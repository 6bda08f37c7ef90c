//! Router-level integration tests for the webhook ingest surface (§6, §8
//! concrete scenarios), grounded on the teacher's `tests/gateway/...`
//! `axum_test::TestServer`-driven integration suite.

mod support;

use std::sync::atomic::Ordering;
use std::time::Duration;

use hookrelay_core::EventKind;
use wiremock::matchers::{body_bytes, method};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn pull_request_labeled_payload() -> Vec<u8> {
    serde_json::json!({
        "repo": {"org": "acme", "name": "widgets", "fullName": "acme/widgets"},
        "actor": "alice",
        "htmlUrl": "https://example.com/pr/1",
        "action": "labeled",
        "number": 1,
        "sha": "deadbeef",
        "body": "",
        "title": "add widget",
        "state": "open",
        "assignees": []
    })
    .to_string()
    .into_bytes()
}

fn push_payload() -> Vec<u8> {
    serde_json::json!({
        "repo": {"org": "acme", "name": "widgets", "fullName": "acme/widgets"},
        "owner": "acme-bot",
        "ref_name": "refs/heads/main",
        "before": "a",
        "after": "b"
    })
    .to_string()
    .into_bytes()
}

fn issue_comment_payload() -> Vec<u8> {
    serde_json::json!({
        "repo": {"org": "acme", "name": "tools", "fullName": "acme/tools"},
        "actor": "bob",
        "htmlUrl": "https://example.com/issues/1#comment",
        "action": "created",
        "issue": {
            "number": 7,
            "state": "open",
            "title": "bug",
            "body": "",
            "assignees": [],
            "author": "bob",
            "htmlUrl": "https://example.com/issues/1"
        },
        "commentId": 99,
        "body": "me too"
    })
    .to_string()
    .into_bytes()
}

/// Scenario 1 (§8): a `pull_request` event with `action="labeled"` still
/// invokes the concrete-event handler once; `labeled` is in the non-comment
/// allow-list so no generic-comment dispatch is attempted.
#[tokio::test]
async fn unknown_action_label_event_still_invokes_the_concrete_handler() {
    let mut registry = hookrelay_core::PluginRegistry::new();
    let calls = support::register_counting_handler(&mut registry, EventKind::PullRequest, "size");

    let plugins_yaml = "plugins:\n  acme:\n    plugins: [size]\n";
    let server = support::test_server(registry, plugins_yaml, &["size"]).await;

    let body = pull_request_labeled_payload();
    let response = server
        .post(support::WEBHOOK_PATH)
        .add_header("X-Hub-Signature-256", support::sign(&body).parse().unwrap())
        .add_header("X-GitHub-Event", "pull_request".parse().unwrap())
        .add_header("X-GitHub-Delivery", "evt-1".parse().unwrap())
        .bytes(body.into())
        .await;

    response.assert_status_ok();
    response.assert_text("Event received. Have a nice day.");

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

/// Scenario 4 (§8): a panicking plugin does not stop a sibling plugin, and
/// the webhook caller still gets 200 before either handler completes.
#[tokio::test]
async fn panicking_plugin_does_not_affect_sibling_and_ingest_returns_200() {
    let mut registry = hookrelay_core::PluginRegistry::new();
    support::register_panicking_handler(&mut registry, EventKind::Push, "a");
    let calls = support::register_counting_handler(&mut registry, EventKind::Push, "b");

    let plugins_yaml = "plugins:\n  acme:\n    plugins: [a, b]\n";
    let server = support::test_server(registry, plugins_yaml, &["a", "b"]).await;

    let body = push_payload();
    let response = server
        .post(support::WEBHOOK_PATH)
        .add_header("X-Hub-Signature-256", support::sign(&body).parse().unwrap())
        .add_header("X-GitHub-Event", "push".parse().unwrap())
        .add_header("X-GitHub-Delivery", "evt-2".parse().unwrap())
        .bytes(body.into())
        .await;

    response.assert_status_ok();

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

/// Scenario 4's signature half (§8 scenario 4): a request signed with a
/// secret outside the active token set is rejected with 403 and never
/// dispatched.
#[tokio::test]
async fn mismatched_signature_is_rejected_with_403() {
    let registry = hookrelay_core::PluginRegistry::new();
    let server = support::test_server(registry, "plugins: {}\n", &[]).await;

    let body = push_payload();
    let response = server
        .post(support::WEBHOOK_PATH)
        .add_header("X-Hub-Signature-256", "sha256=0000000000000000000000000000000000000000000000000000000000000000".parse().unwrap())
        .add_header("X-GitHub-Event", "push".parse().unwrap())
        .add_header("X-GitHub-Delivery", "evt-3".parse().unwrap())
        .bytes(body.into())
        .await;

    response.assert_status(axum::http::StatusCode::FORBIDDEN);
}

/// Scenario 3 (§8): a repo with only an external plugin configured and no
/// in-process plugins still receives exactly one forwarded POST; no
/// in-process handler runs because none is registered.
#[tokio::test]
async fn external_only_plugin_receives_the_original_payload() {
    let mock_server = MockServer::start().await;
    let body = issue_comment_payload();

    Mock::given(method("POST"))
        .and(body_bytes(body.clone()))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&mock_server)
        .await;

    let registry = hookrelay_core::PluginRegistry::new();
    let plugins_yaml = format!(
        "externalPlugins:\n  acme/tools:\n    - name: cat\n      endpoint: \"{}\"\n      events: [issue_comment]\n",
        mock_server.uri()
    );
    let server = support::test_server(registry, &plugins_yaml, &[]).await;

    let response = server
        .post(support::WEBHOOK_PATH)
        .add_header("X-Hub-Signature-256", support::sign(&body).parse().unwrap())
        .add_header("X-GitHub-Event", "issue_comment".parse().unwrap())
        .add_header("X-GitHub-Delivery", "evt-4".parse().unwrap())
        .bytes(body.clone().into())
        .await;

    response.assert_status_ok();

    tokio::time::sleep(Duration::from_millis(200)).await;
    mock_server.verify().await;
}

#[tokio::test]
async fn liveness_and_readiness_endpoints_report_ok() {
    let registry = hookrelay_core::PluginRegistry::new();
    let server = support::test_server(registry, "plugins: {}\n", &[]).await;

    server.get("/").await.assert_status_ok();
    server.get("/readyz").await.assert_status_ok();
}
