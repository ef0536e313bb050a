//! Event publishing - contact resolution, settle delay, event submission
//!
//! `publish` is total: every remote failure becomes a failed `PublishOutcome`.

use crate::domain::{DomainEvent, PublishOutcome};
use crate::io::crm::{CrmApi, CrmError, EventSubmission};
use crate::services::contact_resolver::{ContactResolution, ContactResolver};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

pub struct EventPublisher {
    api: Arc<dyn CrmApi>,
    resolver: ContactResolver,
    /// Gives a just-created contact time to become visible to the events endpoint
    settle_delay: Duration,
}

impl EventPublisher {
    pub fn new(api: Arc<dyn CrmApi>, settle_delay: Duration) -> Self {
        let resolver = ContactResolver::new(api.clone());
        Self { api, resolver, settle_delay }
    }

    /// Publish one event and report how it went
    pub async fn publish(&self, event: &DomainEvent) -> PublishOutcome {
        self.publish_traced(event).await.0
    }

    /// Same as `publish`, also returning the contact resolution path taken
    pub async fn publish_traced(&self, event: &DomainEvent) -> (PublishOutcome, ContactResolution) {
        let start = Instant::now();
        let resolution = self
            .resolver
            .ensure_contact(&event.email, event.name.as_deref(), event.phone.as_deref())
            .await;
        debug!(email = %event.email, contact = %resolution.as_str(), "contact_resolved");

        if !self.settle_delay.is_zero() {
            tokio::time::sleep(self.settle_delay).await;
        }

        let submission = EventSubmission::from_event(event);
        let outcome = match self.api.create_event(&submission).await {
            Ok(()) => {
                info!(
                    email = %event.email,
                    kind = %event.kind,
                    occurred_at = %event.occurred_at,
                    latency_ms = %start.elapsed().as_millis(),
                    "event_published"
                );
                PublishOutcome::succeeded(event)
            }
            Err(e) => {
                let message = failure_message(&e);
                warn!(
                    email = %event.email,
                    kind = %event.kind,
                    contact = %resolution.as_str(),
                    error = %message,
                    "event_publish_failed"
                );
                PublishOutcome::failed(event, message)
            }
        };

        (outcome, resolution)
    }
}

/// Human-readable failure text. API errors carry status, field messages and
/// request id; anything else falls back to its own message.
fn failure_message(e: &CrmError) -> String {
    match e {
        CrmError::Transport(m) | CrmError::Decode(m) if m.trim().is_empty() => {
            "Unknown error".to_string()
        }
        _ => e.to_string(),
    }
}
