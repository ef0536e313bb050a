//! CRM REST client
//!
//! Four operations are used:
//! - `POST {base}/contacts` - create (409/422 means the contact already exists)
//! - `POST {base}/contacts/search` - exact match on email, first hit wins
//! - `PUT {base}/contacts/{id}` - partial update
//! - `POST {base}/events` - submit a lifecycle event
//!
//! Error bodies look like `{"type":"error.list","request_id":"..","errors":[{"code":"..","message":".."}]}`.

use crate::domain::DomainEvent;
use crate::infra::config::{Config, CrmEnvironment};
use crate::infra::error::ImportError;
use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::debug;

/// Errors from the remote API
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CrmError {
    /// The API answered with a non-success status
    #[error("CRM API error {status}{}{}", join_messages(.messages), request_suffix(.request_id))]
    Api { status: u16, messages: Vec<String>, request_id: Option<String> },

    /// The request never produced a response (connect, timeout, TLS)
    #[error("request failed: {0}")]
    Transport(String),

    /// A success response whose body could not be decoded
    #[error("invalid response body: {0}")]
    Decode(String),
}

fn join_messages(messages: &[String]) -> String {
    if messages.is_empty() {
        String::new()
    } else {
        format!(": {}", messages.join("; "))
    }
}

fn request_suffix(request_id: &Option<String>) -> String {
    match request_id {
        Some(id) => format!(" (request id: {})", id),
        None => String::new(),
    }
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    request_id: Option<String>,
    #[serde(default)]
    errors: Vec<ErrorItem>,
}

#[derive(Debug, Deserialize)]
struct ErrorItem {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl CrmError {
    /// Build an API error from a status code and raw response body
    pub fn from_response(status: u16, body: &str) -> Self {
        let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
        let messages = parsed
            .errors
            .into_iter()
            .filter_map(|e| e.message.or(e.code))
            .filter(|m| !m.trim().is_empty())
            .collect();
        CrmError::Api { status, messages, request_id: parsed.request_id }
    }

    /// "Already exists" class of errors
    pub fn is_conflict(&self) -> bool {
        matches!(self, CrmError::Api { status: 409 | 422, .. })
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            CrmError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for CrmError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            CrmError::Decode(e.to_string())
        } else {
            CrmError::Transport(e.to_string())
        }
    }
}

/// Contact creation payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewContact {
    pub role: &'static str,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

impl NewContact {
    pub fn new(email: &str, name: Option<String>, phone: Option<String>) -> Self {
        Self { role: "user", email: email.to_string(), name, phone }
    }
}

/// Partial contact update; absent fields are left untouched remotely
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ContactUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

impl ContactUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.phone.is_none()
    }
}

/// A contact as returned by search
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RemoteContact {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    data: Vec<RemoteContact>,
}

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    query: SearchQuery<'a>,
}

#[derive(Debug, Serialize)]
struct SearchQuery<'a> {
    field: &'static str,
    operator: &'static str,
    value: &'a str,
}

/// Event payload as submitted to `POST /events`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventSubmission {
    pub event_name: String,
    /// Unix seconds
    pub created_at: i64,
    pub email: String,
    #[serde(skip_serializing_if = "serde_json::Map::is_empty")]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl EventSubmission {
    pub fn from_event(event: &DomainEvent) -> Self {
        Self {
            event_name: event.kind.as_str().to_string(),
            created_at: event.occurred_at,
            email: event.email.clone(),
            metadata: event.metadata.to_wire(),
        }
    }
}

/// Remote contact/event API
#[async_trait]
pub trait CrmApi: Send + Sync {
    async fn create_contact(&self, contact: &NewContact) -> Result<(), CrmError>;

    async fn search_contact_by_email(&self, email: &str)
        -> Result<Option<RemoteContact>, CrmError>;

    async fn update_contact(&self, contact_id: &str, update: &ContactUpdate)
        -> Result<(), CrmError>;

    async fn create_event(&self, event: &EventSubmission) -> Result<(), CrmError>;
}

/// reqwest-backed client bound to one credential set
pub struct HttpCrmClient {
    client: Client,
    base_url: String,
    token: String,
    environment: CrmEnvironment,
}

impl HttpCrmClient {
    pub fn new(
        base_url: &str,
        token: &str,
        timeout: Duration,
        environment: CrmEnvironment,
    ) -> Result<Self, CrmError> {
        // Create HTTP client once for reuse (connection pooling)
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
            environment,
        })
    }

    /// Build a client for one batch. The credential set is fixed for the
    /// client's lifetime.
    pub fn from_config(config: &Config, environment: CrmEnvironment) -> anyhow::Result<Self> {
        let token = config
            .crm_token(environment)
            .ok_or_else(|| ImportError::MissingCredentials(environment.to_string()))?;
        Ok(Self::new(config.crm_base_url(), token, config.crm_timeout(), environment)?)
    }

    pub fn environment(&self) -> CrmEnvironment {
        self.environment
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send(&self, op: &'static str, request: RequestBuilder) -> Result<Response, CrmError> {
        let start = Instant::now();
        let response = request
            .bearer_auth(&self.token)
            .header(ACCEPT, "application/json")
            .header(CONTENT_TYPE, "application/json")
            .send()
            .await?;

        let status = response.status();
        debug!(
            op = %op,
            status = %status.as_u16(),
            latency_ms = %start.elapsed().as_millis(),
            environment = %self.environment,
            "crm_request"
        );

        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(CrmError::from_response(status.as_u16(), &body))
    }
}

#[async_trait]
impl CrmApi for HttpCrmClient {
    async fn create_contact(&self, contact: &NewContact) -> Result<(), CrmError> {
        let request = self.client.post(self.url("/contacts")).json(contact);
        self.send("create_contact", request).await?;
        Ok(())
    }

    async fn search_contact_by_email(
        &self,
        email: &str,
    ) -> Result<Option<RemoteContact>, CrmError> {
        let body = SearchRequest { query: SearchQuery { field: "email", operator: "=", value: email } };
        let request = self.client.post(self.url("/contacts/search")).json(&body);
        let response = self.send("search_contact", request).await?;
        let found: SearchResponse = response.json().await?;
        Ok(found.data.into_iter().next())
    }

    async fn update_contact(
        &self,
        contact_id: &str,
        update: &ContactUpdate,
    ) -> Result<(), CrmError> {
        let request = self.client.put(self.url(&format!("/contacts/{}", contact_id))).json(update);
        self.send("update_contact", request).await?;
        Ok(())
    }

    async fn create_event(&self, event: &EventSubmission) -> Result<(), CrmError> {
        let request = self.client.post(self.url("/events")).json(event);
        self.send("create_event", request).await?;
        Ok(())
    }
}
