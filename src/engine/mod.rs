//! Core engine.
//!
//! Ingestion: chain events → creation filter → dedup queue → enricher → live feed.
//! Operator side: selected-account poller, search, trade orchestration.

pub mod enricher;
pub mod feed;
pub mod filter;
pub mod holdings;
pub mod notices;
pub mod orchestrator;
pub mod poller;
pub mod queue;
pub mod search;

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::types::TradeEvent;
use queue::DedupQueue;

/// Counters for one run of [`run_ingest`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestSummary {
    pub events_seen: u64,
    pub creations: u64,
}

/// Drain decoded trade events, queueing every account creation.
///
/// Returns when the event channel closes.
pub async fn run_ingest(mut events: mpsc::Receiver<TradeEvent>, queue: DedupQueue) -> IngestSummary {
    let mut summary = IngestSummary::default();

    while let Some(event) = events.recv().await {
        summary.events_seen += 1;

        if !filter::is_account_creation(&event) {
            continue;
        }

        summary.creations += 1;
        debug!(subject = %event.subject, block = ?event.block_number, "Account creation detected");
        queue.enqueue(event.subject);
    }

    info!(
        events = summary.events_seen,
        creations = summary.creations,
        "Event stream closed"
    );
    summary
}
