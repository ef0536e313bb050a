//! Batch orchestration - strictly sequential publishing with pacing
//!
//! `publish_stream` is the core: a lazy, finite producer yielding one
//! `BatchProgress` per event in input order. Publishing of event i+1 starts only
//! after the consumer has taken item i and the pacing delay has elapsed, so no
//! two publishes ever overlap.

use crate::domain::{DomainEvent, PublishOutcome};
use crate::services::publisher::EventPublisher;
use futures::stream::{Stream, StreamExt};
use std::time::Duration;

/// One published event and its position in the batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchProgress {
    pub outcome: PublishOutcome,
    /// 1-based
    pub index: usize,
    pub total: usize,
}

/// Aggregate counts for a finished batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchTally {
    pub successful: usize,
    pub failed: usize,
}

impl BatchTally {
    pub fn record(&mut self, outcome: &PublishOutcome) {
        if outcome.success {
            self.successful += 1;
        } else {
            self.failed += 1;
        }
    }

    pub fn from_outcomes(outcomes: &[PublishOutcome]) -> Self {
        let mut tally = Self::default();
        for outcome in outcomes {
            tally.record(outcome);
        }
        tally
    }
}

/// Lazily publish events one at a time
pub fn publish_stream<'a>(
    publisher: &'a EventPublisher,
    events: &'a [DomainEvent],
    inter_event_delay: Duration,
) -> impl Stream<Item = BatchProgress> + Send + 'a {
    async_stream::stream! {
        let total = events.len();
        for (i, event) in events.iter().enumerate() {
            let outcome = publisher.publish(event).await;
            yield BatchProgress { outcome, index: i + 1, total };

            if i + 1 < total && !inter_event_delay.is_zero() {
                tokio::time::sleep(inter_event_delay).await;
            }
        }
    }
}

/// Publish every event, invoking `on_progress` after each one.
///
/// A failing event never stops the batch; an error returned by `on_progress`
/// does, and is propagated.
pub async fn run_batch<F>(
    publisher: &EventPublisher,
    events: &[DomainEvent],
    inter_event_delay: Duration,
    mut on_progress: F,
) -> anyhow::Result<Vec<PublishOutcome>>
where
    F: FnMut(&BatchProgress) -> anyhow::Result<()>,
{
    let mut outcomes = Vec::with_capacity(events.len());
    let stream = publish_stream(publisher, events, inter_event_delay);
    futures::pin_mut!(stream);

    while let Some(progress) = stream.next().await {
        on_progress(&progress)?;
        outcomes.push(progress.outcome);
    }

    Ok(outcomes)
}

/// Publish every event and return the materialized outcomes
pub async fn collect_batch(
    publisher: &EventPublisher,
    events: &[DomainEvent],
    inter_event_delay: Duration,
) -> Vec<PublishOutcome> {
    publish_stream(publisher, events, inter_event_delay).map(|p| p.outcome).collect().await
}
