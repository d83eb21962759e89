//! Coalescing enrichment queue.
//!
//! Addresses wait in FIFO order; an address already waiting is not added
//! twice. A single worker task drains the queue one item at a time and
//! awaits each handler call to completion before taking the next, so at
//! most one enrichment call is ever in flight and feed insertions never
//! race. Handler failures are counted and logged; the worker moves on.

use alloy::primitives::Address;
use async_trait::async_trait;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::types::EnrichmentError;

/// Processing step run for each dequeued address.
#[async_trait]
pub trait QueueHandler: Send + Sync + 'static {
    async fn handle(&self, address: Address) -> Result<(), EnrichmentError>;
}

/// Point-in-time queue counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    pub enqueued: u64,
    pub coalesced: u64,
    pub processed: u64,
    pub failed: u64,
    pub pending: usize,
    pub busy: bool,
}

#[derive(Default)]
struct QueueState {
    waiting: VecDeque<Address>,
    in_flight: Option<Address>,
}

struct Shared {
    state: Mutex<QueueState>,
    wake: Notify,
    enqueued: AtomicU64,
    coalesced: AtomicU64,
    processed: AtomicU64,
    failed: AtomicU64,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Shared {
    fn state(&self) -> std::sync::MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Handle to the queue. Cheap to clone; all clones feed the same worker.
#[derive(Clone)]
pub struct DedupQueue {
    shared: Arc<Shared>,
}

impl DedupQueue {
    /// Start the worker task. Must be called inside a Tokio runtime.
    pub fn spawn<H: QueueHandler>(handler: H) -> Self {
        let shared = Arc::new(Shared {
            state: Mutex::new(QueueState::default()),
            wake: Notify::new(),
            enqueued: AtomicU64::new(0),
            coalesced: AtomicU64::new(0),
            processed: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            worker: Mutex::new(None),
        });

        let worker = tokio::spawn(run_worker(shared.clone(), Arc::new(handler)));
        *shared.worker.lock().unwrap_or_else(PoisonError::into_inner) = Some(worker);

        Self { shared }
    }

    /// Queue `address` unless it is already waiting.
    ///
    /// Returns `false` when the call was coalesced into a waiting entry.
    pub fn enqueue(&self, address: Address) -> bool {
        self.shared.enqueued.fetch_add(1, Ordering::Relaxed);

        let added = {
            let mut state = self.shared.state();
            if state.waiting.contains(&address) {
                false
            } else {
                state.waiting.push_back(address);
                true
            }
        };

        if added {
            debug!(address = %address, "Queued for enrichment");
            self.shared.wake.notify_one();
        } else {
            self.shared.coalesced.fetch_add(1, Ordering::Relaxed);
            debug!(address = %address, "Already queued, coalesced");
        }
        added
    }

    /// Number of addresses waiting (excluding the one in flight).
    pub fn pending_len(&self) -> usize {
        self.shared.state().waiting.len()
    }

    /// `true` when nothing is waiting or running.
    pub fn is_idle(&self) -> bool {
        let state = self.shared.state();
        state.waiting.is_empty() && state.in_flight.is_none()
    }

    pub fn stats(&self) -> QueueStats {
        let (pending, busy) = {
            let state = self.shared.state();
            (state.waiting.len(), state.in_flight.is_some())
        };
        QueueStats {
            enqueued: self.shared.enqueued.load(Ordering::Relaxed),
            coalesced: self.shared.coalesced.load(Ordering::Relaxed),
            processed: self.shared.processed.load(Ordering::Relaxed),
            failed: self.shared.failed.load(Ordering::Relaxed),
            pending,
            busy,
        }
    }

    /// Stop the worker. An in-flight call is abandoned; waiting items are dropped.
    pub fn shutdown(&self) {
        let worker = self
            .shared
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(worker) = worker {
            worker.abort();
            let dropped = {
                let mut state = self.shared.state();
                state.in_flight = None;
                std::mem::take(&mut state.waiting).len()
            };
            info!(dropped, "Enrichment queue stopped");
        }
    }
}

async fn run_worker<H: QueueHandler>(shared: Arc<Shared>, handler: Arc<H>) {
    loop {
        let next = {
            let mut state = shared.state();
            let next = state.waiting.pop_front();
            state.in_flight = next;
            next
        };

        let Some(address) = next else {
            shared.wake.notified().await;
            continue;
        };

        match handler.handle(address).await {
            Ok(()) => {
                shared.processed.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                shared.failed.fetch_add(1, Ordering::Relaxed);
                warn!(address = %address, error = %e, "Enrichment failed, skipping");
            }
        }

        shared.state().in_flight = None;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
