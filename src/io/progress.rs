//! Progress stream - incremental batch results for a remote caller
//!
//! Wire format: one JSON message per line, prefixed with `data: ` and followed by
//! a blank line (server-sent events framing). Per batch the order is:
//! - `start` once
//! - `progress` once per published event
//! - exactly one terminal `complete` or `error`
//!
//! after which the sink is closed. A batch rejected before publishing emits only
//! the terminal `error`.

use crate::domain::PublishOutcome;
use crate::services::orchestrator::{BatchProgress, BatchTally};
use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::debug;

pub const LINE_PREFIX: &str = "data: ";

/// Messages sent to the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ProgressMessage {
    #[serde(rename_all = "camelCase")]
    Start { total_events: usize, total_processed: usize },

    Progress {
        result: PublishOutcome,
        index: usize,
        total: usize,
        successful: usize,
        failed: usize,
    },

    #[serde(rename_all = "camelCase")]
    Complete {
        total_processed: usize,
        successful: usize,
        failed: usize,
        results: Vec<PublishOutcome>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        errors: Vec<String>,
    },

    Error { error: String },
}

impl ProgressMessage {
    /// Framed wire line
    pub fn encode(&self) -> String {
        let json = serde_json::to_string(self).unwrap_or_else(|e| {
            serde_json::json!({"type": "error", "error": format!("serialization failed: {}", e)})
                .to_string()
        });
        format!("{}{}\n\n", LINE_PREFIX, json)
    }

    /// Parse one wire line; blank lines and foreign lines yield None
    pub fn decode(line: &str) -> Option<Self> {
        let json = line.trim().strip_prefix(LINE_PREFIX.trim_end())?;
        serde_json::from_str(json.trim()).ok()
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ProgressMessage::Complete { .. } | ProgressMessage::Error { .. })
    }
}

/// Destination for progress messages
#[async_trait]
pub trait ProgressSink: Send {
    async fn send(&mut self, message: &ProgressMessage) -> anyhow::Result<()>;

    /// Release the underlying transport. Called exactly once per batch.
    async fn close(&mut self) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Collects messages in memory
#[async_trait]
impl ProgressSink for Vec<ProgressMessage> {
    async fn send(&mut self, message: &ProgressMessage) -> anyhow::Result<()> {
        self.push(message.clone());
        Ok(())
    }
}

/// Feeds framed lines into a bounded channel (HTTP response body)
pub struct ChannelSink {
    tx: Option<mpsc::Sender<Bytes>>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::Sender<Bytes>) -> Self {
        Self { tx: Some(tx) }
    }
}

#[async_trait]
impl ProgressSink for ChannelSink {
    async fn send(&mut self, message: &ProgressMessage) -> anyhow::Result<()> {
        let tx = self.tx.as_ref().ok_or_else(|| anyhow::anyhow!("progress stream already closed"))?;
        tx.send(Bytes::from(message.encode()))
            .await
            .map_err(|_| anyhow::anyhow!("progress receiver dropped"))
    }

    async fn close(&mut self) -> anyhow::Result<()> {
        // dropping the sender ends the response body
        self.tx.take();
        Ok(())
    }
}

/// Writes framed lines to any async writer (stdout for the CLI)
pub struct WriterSink<W> {
    writer: W,
}

impl<W> WriterSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

#[async_trait]
impl<W: AsyncWrite + Unpin + Send> ProgressSink for WriterSink<W> {
    async fn send(&mut self, message: &ProgressMessage) -> anyhow::Result<()> {
        self.writer.write_all(message.encode().as_bytes()).await?;
        self.writer.flush().await?;
        Ok(())
    }

    async fn close(&mut self) -> anyhow::Result<()> {
        self.writer.flush().await?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StreamState {
    Idle,
    Started,
    Finished,
}

/// Serializes batch events into progress messages, enforcing message order
pub struct ProgressStreamer<S: ProgressSink> {
    sink: S,
    state: StreamState,
    tally: BatchTally,
    results: Vec<PublishOutcome>,
}

impl<S: ProgressSink> ProgressStreamer<S> {
    pub fn new(sink: S) -> Self {
        Self { sink, state: StreamState::Idle, tally: BatchTally::default(), results: Vec::new() }
    }

    pub fn tally(&self) -> BatchTally {
        self.tally
    }

    pub async fn start(&mut self, total_events: usize, total_processed: usize) -> anyhow::Result<()> {
        anyhow::ensure!(self.state == StreamState::Idle, "start sent twice");
        self.state = StreamState::Started;
        self.results.reserve(total_events);
        self.sink.send(&ProgressMessage::Start { total_events, total_processed }).await
    }

    pub async fn progress(&mut self, progress: BatchProgress) -> anyhow::Result<()> {
        anyhow::ensure!(self.state == StreamState::Started, "progress outside a started batch");
        self.tally.record(&progress.outcome);
        self.results.push(progress.outcome.clone());
        let message = ProgressMessage::Progress {
            result: progress.outcome,
            index: progress.index,
            total: progress.total,
            successful: self.tally.successful,
            failed: self.tally.failed,
        };
        self.sink.send(&message).await
    }

    pub async fn complete(&mut self, total_processed: usize, warnings: Vec<String>) -> anyhow::Result<()> {
        anyhow::ensure!(self.state == StreamState::Started, "complete outside a started batch");
        self.state = StreamState::Finished;
        let message = ProgressMessage::Complete {
            total_processed,
            successful: self.tally.successful,
            failed: self.tally.failed,
            results: std::mem::take(&mut self.results),
            errors: warnings,
        };
        self.sink.send(&message).await
    }

    /// Terminal error. Allowed before `start` (rejected batch) or mid-batch.
    pub async fn fail(&mut self, error: &str) -> anyhow::Result<()> {
        anyhow::ensure!(self.state != StreamState::Finished, "terminal message already sent");
        self.state = StreamState::Finished;
        self.sink.send(&ProgressMessage::Error { error: error.to_string() }).await
    }

    /// Close the sink and hand it back. Runs regardless of which terminal path was taken.
    pub async fn finish(mut self) -> S {
        if let Err(e) = self.sink.close().await {
            debug!(error = %e, "progress_sink_close_failed");
        }
        self.sink
    }
}
