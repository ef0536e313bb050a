//! Integration tests for the reqwest CRM client against a loopback server

mod common;

use attendee_sync::domain::{DomainEvent, EventKind, EventMetadata};
use attendee_sync::infra::{Config, CrmEnvironment, ImportError};
use attendee_sync::io::crm::{ContactUpdate, EventSubmission, NewContact};
use attendee_sync::io::{CrmApi, CrmError, HttpCrmClient};
use common::FakeCrm;
use serde_json::json;
use std::time::Duration;

fn client(base_url: &str) -> HttpCrmClient {
    HttpCrmClient::new(base_url, "secret-token", Duration::from_secs(5), CrmEnvironment::Sandbox)
        .unwrap()
}

#[tokio::test]
async fn test_create_contact_wire_format() {
    let fake = FakeCrm::accepting().await;
    let contact = NewContact::new("ada@example.com", Some("Ada Lovelace".into()), None);

    client(&fake.base_url).create_contact(&contact).await.unwrap();

    let requests = fake.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].method, "POST");
    assert_eq!(requests[0].path, "/contacts");
    assert_eq!(requests[0].authorization.as_deref(), Some("Bearer secret-token"));
    assert_eq!(
        requests[0].body,
        json!({"role": "user", "email": "ada@example.com", "name": "Ada Lovelace"})
    );
}

#[tokio::test]
async fn test_conflict_error_parsed() {
    let fake = FakeCrm::start(|_| {
        (
            409,
            json!({
                "type": "error.list",
                "request_id": "req-1",
                "errors": [{"code": "conflict", "message": "A contact matching those details already exists"}]
            })
            .to_string(),
        )
    })
    .await;

    let err = client(&fake.base_url)
        .create_contact(&NewContact::new("ada@example.com", None, None))
        .await
        .unwrap_err();

    assert!(err.is_conflict());
    assert_eq!(
        err.to_string(),
        "CRM API error 409: A contact matching those details already exists (request id: req-1)"
    );
}

#[tokio::test]
async fn test_search_returns_first_match() {
    let fake = FakeCrm::start(|_| {
        (
            200,
            json!({"type": "list", "data": [
                {"type": "contact", "id": "c-17", "email": "ada@example.com"},
                {"type": "contact", "id": "c-18", "email": "ada@example.com"}
            ]})
            .to_string(),
        )
    })
    .await;

    let found = client(&fake.base_url).search_contact_by_email("ada@example.com").await.unwrap();

    assert_eq!(found.map(|c| c.id), Some("c-17".to_string()));
    let requests = fake.requests();
    assert_eq!(requests[0].path, "/contacts/search");
    assert_eq!(
        requests[0].body,
        json!({"query": {"field": "email", "operator": "=", "value": "ada@example.com"}})
    );
}

#[tokio::test]
async fn test_search_without_match() {
    let fake = FakeCrm::start(|_| (200, json!({"type": "list", "data": []}).to_string())).await;
    let found = client(&fake.base_url).search_contact_by_email("nobody@example.com").await.unwrap();
    assert_eq!(found, None);
}

#[tokio::test]
async fn test_update_contact_sends_only_supplied_fields() {
    let fake = FakeCrm::accepting().await;
    let update = ContactUpdate { name: None, phone: Some("+1 555 0100".into()) };

    client(&fake.base_url).update_contact("c-17", &update).await.unwrap();

    let requests = fake.requests();
    assert_eq!(requests[0].method, "PUT");
    assert_eq!(requests[0].path, "/contacts/c-17");
    assert_eq!(requests[0].body, json!({"phone": "+1 555 0100"}));
}

#[tokio::test]
async fn test_create_event_wire_format() {
    let fake = FakeCrm::accepting().await;
    let event = DomainEvent {
        kind: EventKind::Attended,
        occurred_at: 1_714_557_600,
        email: "ada@example.com".into(),
        name: Some("Ada".into()),
        phone: None,
        metadata: EventMetadata {
            event_name: Some("Rust Meetup".into()),
            event_date: Some("2024-05-01 18:00".into()),
            ticket_type: Some("VIP".into()),
            presenter: None,
        },
    };

    client(&fake.base_url).create_event(&EventSubmission::from_event(&event)).await.unwrap();

    let requests = fake.requests_to("/events");
    assert_eq!(requests.len(), 1);
    assert_eq!(
        requests[0].body,
        json!({
            "event_name": "attended",
            "created_at": 1_714_557_600,
            "email": "ada@example.com",
            "metadata": {
                "event_name": "Rust Meetup",
                "event_date": "2024-05-01 18:00",
                "ticket_type": "VIP"
            }
        })
    );
}

#[tokio::test]
async fn test_server_error_without_body() {
    let fake = FakeCrm::start(|_| (500, String::new())).await;
    let err = client(&fake.base_url)
        .create_contact(&NewContact::new("ada@example.com", None, None))
        .await
        .unwrap_err();
    assert_eq!(err, CrmError::Api { status: 500, messages: vec![], request_id: None });
}

#[tokio::test]
async fn test_unreachable_server_is_transport_error() {
    // bind then drop to get a port nothing listens on
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = client(&format!("http://{}", addr))
        .create_contact(&NewContact::new("ada@example.com", None, None))
        .await
        .unwrap_err();
    assert!(matches!(err, CrmError::Transport(_)));
    assert_eq!(err.status(), None);
}

#[test]
fn test_from_config_requires_token() {
    let config = Config::default().with_env_tokens(Some("live-token".into()), None);

    let live = HttpCrmClient::from_config(&config, CrmEnvironment::Live).unwrap();
    assert_eq!(live.environment(), CrmEnvironment::Live);

    let err = HttpCrmClient::from_config(&config, CrmEnvironment::Sandbox).err().unwrap();
    assert_eq!(
        err.downcast_ref::<ImportError>(),
        Some(&ImportError::MissingCredentials("sandbox".into()))
    );
}
