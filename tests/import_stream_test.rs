//! End-to-end tests: HTTP import request -> CRM calls -> progress stream

mod common;

use attendee_sync::infra::Config;
use attendee_sync::io::server::serve;
use attendee_sync::io::ProgressMessage;
use attendee_sync::services::Importer;
use common::FakeCrm;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;

struct TestServer {
    url: String,
    _shutdown: watch::Sender<bool>,
}

async fn start_server(crm: &FakeCrm) -> TestServer {
    let config = Config::default()
        .with_crm_base_url(&crm.base_url)
        .with_env_tokens(Some("live-token".into()), None)
        .with_pacing_ms(0, 0);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    let (shutdown, shutdown_rx) = watch::channel(false);
    tokio::spawn(serve(listener, Arc::new(Importer::new(config)), shutdown_rx));

    TestServer { url, _shutdown: shutdown }
}

async fn post_import(server: &TestServer, body: serde_json::Value) -> (u16, String) {
    let response = reqwest::Client::new()
        .post(format!("{}/api/import", server.url))
        .json(&body)
        .send()
        .await
        .unwrap();
    let status = response.status().as_u16();
    (status, response.text().await.unwrap())
}

fn messages(body: &str) -> Vec<ProgressMessage> {
    body.lines().filter_map(ProgressMessage::decode).collect()
}

#[tokio::test]
async fn test_stream_reports_partial_failure() {
    let events_seen = AtomicUsize::new(0);
    let crm = FakeCrm::start(move |req| {
        if req.path == "/events" && events_seen.fetch_add(1, Ordering::SeqCst) == 1 {
            return (500, String::new());
        }
        (200, "{}".to_string())
    })
    .await;
    let server = start_server(&crm).await;

    let (status, body) = post_import(
        &server,
        json!({
            "records": [
                {"Email": "a@example.com", "Status": "Registered"},
                {"Email": "b@example.com", "Status": "Registered"}
            ],
            "mapping": {"email": "Email", "status": "Status"},
            "eventSettings": {"eventName": "Launch"}
        }),
    )
    .await;

    assert_eq!(status, 200);
    let messages = messages(&body);
    assert_eq!(messages.len(), 4);
    assert_eq!(messages[0], ProgressMessage::Start { total_events: 2, total_processed: 2 });
    assert!(matches!(messages[1], ProgressMessage::Progress { successful: 1, failed: 0, .. }));
    match &messages[2] {
        ProgressMessage::Progress { result, successful: 1, failed: 1, index: 2, total: 2 } => {
            assert_eq!(result.email, "b@example.com");
            assert_eq!(result.error.as_deref(), Some("CRM API error 500"));
        }
        other => panic!("unexpected {:?}", other),
    }
    match &messages[3] {
        ProgressMessage::Complete { total_processed, successful, failed, results, errors } => {
            assert_eq!((*total_processed, *successful, *failed), (2, 1, 1));
            assert_eq!(results.len(), 2);
            assert!(errors.is_empty());
        }
        other => panic!("unexpected {:?}", other),
    }

    let events = crm.requests_to("/events");
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].body["metadata"]["event_name"], "Launch");
    assert!(events.iter().all(|r| r.authorization.as_deref() == Some("Bearer live-token")));
}

#[tokio::test]
async fn test_row_warnings_reach_complete() {
    let crm = FakeCrm::accepting().await;
    let server = start_server(&crm).await;

    let (_, body) = post_import(
        &server,
        json!({
            "records": [
                {"Email": "not-an-email", "Joined": "yes"},
                {"Email": "c@example.com", "Joined": "yes"}
            ],
            "mapping": {"email": "Email", "hasJoinedEvent": "Joined"}
        }),
    )
    .await;

    let messages = messages(&body);
    match messages.last() {
        Some(ProgressMessage::Complete { errors, successful: 1, .. }) => {
            assert_eq!(errors, &vec!["Row 1: missing or invalid email".to_string()]);
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[tokio::test]
async fn test_no_events_rejected_before_remote_calls() {
    let crm = FakeCrm::accepting().await;
    let server = start_server(&crm).await;

    let (status, body) = post_import(
        &server,
        json!({
            "records": [{"Email": "a@example.com", "Status": "Cancelled"}],
            "mapping": {"email": "Email", "status": "Status"}
        }),
    )
    .await;

    assert_eq!(status, 200);
    let messages = messages(&body);
    assert_eq!(messages.len(), 1);
    assert!(matches!(messages[0], ProgressMessage::Error { .. }));
    assert!(crm.requests().is_empty());
}

#[tokio::test]
async fn test_missing_credentials_rejected() {
    let crm = FakeCrm::accepting().await;
    let server = start_server(&crm).await;

    let (_, body) = post_import(
        &server,
        json!({
            "records": [{"Email": "a@example.com", "Status": "Registered"}],
            "mapping": {"email": "Email", "status": "Status"},
            "environment": "sandbox"
        }),
    )
    .await;

    assert_eq!(
        messages(&body),
        vec![ProgressMessage::Error {
            error: "no API token configured for the sandbox environment".into()
        }]
    );
    assert!(crm.requests().is_empty());
}

#[tokio::test]
async fn test_malformed_json_is_bad_request() {
    let crm = FakeCrm::accepting().await;
    let server = start_server(&crm).await;

    let response = reqwest::Client::new()
        .post(format!("{}/api/import", server.url))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 400);
    let body: serde_json::Value = response.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().starts_with("invalid request body"));
}

#[tokio::test]
async fn test_health_and_unknown_route() {
    let crm = FakeCrm::accepting().await;
    let server = start_server(&crm).await;
    let client = reqwest::Client::new();

    let health = client.get(format!("{}/health", server.url)).send().await.unwrap();
    assert_eq!(health.status().as_u16(), 200);
    assert_eq!(health.text().await.unwrap(), "ok");

    let missing = client.get(format!("{}/nope", server.url)).send().await.unwrap();
    assert_eq!(missing.status().as_u16(), 404);
}
