//! Import driver - one batch from raw records to a closed progress stream
//!
//! Flow:
//! 1. `prepare_import`: normalize, classify, derive, reject empty
//! 2. resolve the CRM client for the requested environment
//! 3. publish sequentially, forwarding every outcome to the `ProgressStreamer`
//!
//! Failures in 1 or 2 reject the batch with a single `error` message. A sink
//! failure mid-batch ends the batch with an `error` message. The sink is
//! closed on every path.

use crate::domain::event::new_uuid_v7;
use crate::domain::{ColumnMapping, DomainEvent, EventSettings, Record};
use crate::infra::config::{Config, CrmEnvironment};
use crate::infra::error::ImportError;
use crate::io::crm::{CrmApi, HttpCrmClient};
use crate::io::progress::{ProgressSink, ProgressStreamer};
use crate::services::classifier::classify_all;
use crate::services::deriver::derive_events;
use crate::services::normalizer::normalize_records;
use crate::services::orchestrator::publish_stream;
use crate::services::publisher::EventPublisher;
use futures::StreamExt;
use serde::Deserialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// One import request as received from a caller
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportRequest {
    #[serde(default)]
    pub records: Vec<Record>,
    #[serde(default)]
    pub mapping: ColumnMapping,
    #[serde(default)]
    pub event_settings: EventSettings,
    #[serde(default)]
    pub environment: Option<CrmEnvironment>,
}

/// Validated batch ready for publishing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedImport {
    pub attendee_count: usize,
    pub events: Vec<DomainEvent>,
    pub warnings: Vec<String>,
}

/// Run the pure part of the pipeline. No remote calls are issued here.
pub fn prepare_import(
    records: &[Record],
    mapping: &ColumnMapping,
    settings: &EventSettings,
) -> Result<PreparedImport, ImportError> {
    let normalized = normalize_records(records, mapping)?;
    let attendee_count = normalized.attendees.len();
    let classified = classify_all(normalized.attendees);
    let events = derive_events(&classified, settings);

    if events.is_empty() {
        return Err(ImportError::NoEvents { attendees: attendee_count });
    }

    Ok(PreparedImport { attendee_count, events, warnings: normalized.warnings })
}

/// Runs import batches against the configured CRM
pub struct Importer {
    config: Config,
}

impl Importer {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run a batch with a client built from config for the requested environment
    pub async fn run<S: ProgressSink>(&self, request: ImportRequest, sink: S) -> S {
        let batch_id = new_uuid_v7();
        let environment = request.environment.unwrap_or(self.config.default_environment());
        let mut streamer = ProgressStreamer::new(sink);

        let prepared = match prepare_import(&request.records, &request.mapping, &request.event_settings) {
            Ok(prepared) => prepared,
            Err(e) => return reject(&batch_id, streamer, &e.to_string()).await,
        };

        let client = match HttpCrmClient::from_config(&self.config, environment) {
            Ok(client) => client,
            Err(e) => return reject(&batch_id, streamer, &e.to_string()).await,
        };

        info!(batch_id = %batch_id, environment = %environment, "crm_client_ready");
        self.publish(&batch_id, prepared, Arc::new(client), &mut streamer).await;
        streamer.finish().await
    }

    /// Run a batch against an already constructed API
    pub async fn run_with_api<S: ProgressSink>(
        &self,
        request: ImportRequest,
        api: Arc<dyn CrmApi>,
        sink: S,
    ) -> S {
        let batch_id = new_uuid_v7();
        let mut streamer = ProgressStreamer::new(sink);

        match prepare_import(&request.records, &request.mapping, &request.event_settings) {
            Ok(prepared) => {
                self.publish(&batch_id, prepared, api, &mut streamer).await;
                streamer.finish().await
            }
            Err(e) => reject(&batch_id, streamer, &e.to_string()).await,
        }
    }

    async fn publish<S: ProgressSink>(
        &self,
        batch_id: &str,
        prepared: PreparedImport,
        api: Arc<dyn CrmApi>,
        streamer: &mut ProgressStreamer<S>,
    ) {
        let start = Instant::now();
        let total = prepared.events.len();
        info!(
            batch_id = %batch_id,
            events = %total,
            attendees = %prepared.attendee_count,
            warnings = %prepared.warnings.len(),
            "batch_started"
        );

        let publisher = EventPublisher::new(api, self.config.settle_delay());
        let result = stream_events(
            &publisher,
            &prepared,
            self.config.inter_event_delay(),
            streamer,
        )
        .await;

        let tally = streamer.tally();
        match result {
            Ok(()) => info!(
                batch_id = %batch_id,
                total = %total,
                successful = %tally.successful,
                failed = %tally.failed,
                duration_ms = %start.elapsed().as_millis(),
                "batch_complete"
            ),
            Err(e) => {
                warn!(
                    batch_id = %batch_id,
                    error = %e,
                    successful = %tally.successful,
                    failed = %tally.failed,
                    "batch_aborted"
                );
                // the sink may be the thing that failed; nothing more to do if so
                let _ = streamer.fail(&e.to_string()).await;
            }
        }
    }
}

async fn stream_events<S: ProgressSink>(
    publisher: &EventPublisher,
    prepared: &PreparedImport,
    inter_event_delay: Duration,
    streamer: &mut ProgressStreamer<S>,
) -> anyhow::Result<()> {
    streamer.start(prepared.events.len(), prepared.attendee_count).await?;

    let progress = publish_stream(publisher, &prepared.events, inter_event_delay);
    futures::pin_mut!(progress);
    while let Some(item) = progress.next().await {
        streamer.progress(item).await?;
    }

    streamer.complete(prepared.attendee_count, prepared.warnings.clone()).await
}

async fn reject<S: ProgressSink>(batch_id: &str, mut streamer: ProgressStreamer<S>, error: &str) -> S {
    warn!(batch_id = %batch_id, error = %error, "batch_rejected");
    let _ = streamer.fail(error).await;
    streamer.finish().await
}
