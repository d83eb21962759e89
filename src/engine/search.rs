//! Debounced, cancellable account search.
//!
//! Every call to [`SearchController::search`] takes a ticket and waits out
//! the debounce window. If another call arrived meanwhile, this one bows
//! out without touching the network. Otherwise it cancels whatever request
//! is still in flight and issues its own. Only the most recently issued
//! request may write the displayed results.

use alloy::primitives::Address;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::{oneshot, RwLock};
use tracing::{debug, error};

use crate::services::SearchService;
use crate::types::{SearchError, SearchHit, ServiceError};

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);

/// Cancel token for the request currently in flight. Dropping or firing
/// the sender cancels it.
struct InFlight {
    ticket: u64,
    cancel: oneshot::Sender<()>,
}

pub struct SearchController {
    service: Arc<dyn SearchService>,
    debounce: Duration,
    /// Bumped on every call.
    latest_call: AtomicU64,
    /// Ticket of the most recently issued request.
    latest_issued: AtomicU64,
    in_flight: Mutex<Option<InFlight>>,
    displayed: RwLock<Vec<SearchHit>>,
    requests_issued: AtomicU64,
}

impl SearchController {
    pub fn new(service: Arc<dyn SearchService>, debounce: Duration) -> Self {
        Self {
            service,
            debounce,
            latest_call: AtomicU64::new(0),
            latest_issued: AtomicU64::new(0),
            in_flight: Mutex::new(None),
            displayed: RwLock::new(Vec::new()),
            requests_issued: AtomicU64::new(0),
        }
    }

    /// Run a search for `query`.
    ///
    /// Returns `SearchError::Cancelled` when superseded, either during the
    /// debounce window or while the request was in flight.
    pub async fn search(&self, query: &str) -> Result<Vec<SearchHit>, SearchError> {
        let ticket = self.latest_call.fetch_add(1, Ordering::SeqCst) + 1;

        tokio::time::sleep(self.debounce).await;
        if self.latest_call.load(Ordering::SeqCst) != ticket {
            debug!(query, "Search superseded during debounce");
            return Err(SearchError::Cancelled);
        }

        let query = query.trim();
        if query.is_empty() {
            self.cancel_in_flight();
            self.latest_issued.store(ticket, Ordering::SeqCst);
            self.displayed.write().await.clear();
            return Ok(Vec::new());
        }

        let cancelled = self.arm(ticket);
        self.requests_issued.fetch_add(1, Ordering::Relaxed);
        debug!(query, ticket, "Issuing search");

        let outcome = tokio::select! {
            _ = cancelled => Err(SearchError::Cancelled),
            result = self.dispatch(query) => result.map_err(|source| SearchError::Failed {
                query: query.to_string(),
                source,
            }),
        };
        self.disarm(ticket);

        let mut displayed = self.displayed.write().await;
        let is_latest = self.latest_issued.load(Ordering::SeqCst) == ticket;

        match outcome {
            Ok(hits) if is_latest => {
                *displayed = hits.clone();
                Ok(hits)
            }
            Ok(_) | Err(SearchError::Cancelled) => {
                debug!(query, "Search result superseded, discarding");
                Err(SearchError::Cancelled)
            }
            Err(e) => {
                error!(error = %e, "Search failed");
                if is_latest {
                    displayed.clear();
                }
                Err(e)
            }
        }
    }

    /// Results currently shown to the operator.
    pub async fn displayed(&self) -> Vec<SearchHit> {
        self.displayed.read().await.clone()
    }

    /// Outbound requests issued so far.
    pub fn requests_issued(&self) -> u64 {
        self.requests_issued.load(Ordering::Relaxed)
    }

    async fn dispatch(&self, query: &str) -> Result<Vec<SearchHit>, ServiceError> {
        match parse_address(query) {
            Some(address) => match self.service.lookup_address(address).await {
                Ok(hit) => Ok(vec![hit]),
                Err(ServiceError::NotFound { .. }) => Ok(Vec::new()),
                Err(e) => Err(e),
            },
            None => self.service.search_by_username(query).await,
        }
    }

    /// Install a fresh cancel token for `ticket`, cancelling the previous one.
    ///
    /// `latest_issued` moves before the old token fires, so a superseded
    /// request that wakes up can never still see itself as latest.
    fn arm(&self, ticket: u64) -> oneshot::Receiver<()> {
        self.latest_issued.store(ticket, Ordering::SeqCst);
        let (cancel, cancelled) = oneshot::channel();
        let previous = self
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(InFlight { ticket, cancel });
        if let Some(previous) = previous {
            debug!(ticket = previous.ticket, "Cancelling in-flight search");
            let _ = previous.cancel.send(());
        }
        cancelled
    }

    fn disarm(&self, ticket: u64) {
        let mut slot = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.as_ref().is_some_and(|f| f.ticket == ticket) {
            *slot = None;
        }
    }

    fn cancel_in_flight(&self) {
        let previous = self
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(previous) = previous {
            let _ = previous.cancel.send(());
        }
    }
}

fn parse_address(query: &str) -> Option<Address> {
    if query.len() == 42 && query.starts_with("0x") {
        query.parse().ok()
    } else {
        None
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
