//! Selected-account poller.
//!
//! Keeps at most one recurring timer, bound to the currently selected
//! address. Selecting a new address cancels the old timer before the new
//! one starts. Ticks fire on a fixed interval and each spawns its own
//! fetch, so under slow responses fetches for the same address can
//! overlap; results are stamped with the selection generation and
//! anything that lands after the selection changed is discarded.

use alloy::primitives::Address;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::services::AccountStateService;
use crate::types::{AccountState, PollError};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(3);

enum PollerState {
    Idle,
    Polling {
        address: Address,
        timer: JoinHandle<()>,
    },
}

/// Everything a fetch task needs, cloned into each tick.
#[derive(Clone)]
struct FetchContext {
    service: Arc<dyn AccountStateService>,
    generation: Arc<AtomicU64>,
    latest: Arc<RwLock<Option<AccountState>>>,
}

impl FetchContext {
    fn spawn_fetch(&self, address: Address, generation: u64) {
        let ctx = self.clone();
        tokio::spawn(async move {
            match ctx.service.account_state(address).await {
                Ok(state) => {
                    let mut latest = ctx.latest.write().await;
                    if ctx.generation.load(Ordering::SeqCst) == generation {
                        *latest = Some(state);
                    } else {
                        debug!(address = %address, "Discarding poll result for previous selection");
                    }
                }
                Err(source) => {
                    let err = PollError { address, source };
                    warn!(error = %err, "Account poll failed, retrying next tick");
                }
            }
        });
    }
}

pub struct SelectedAccountPoller {
    ctx: FetchContext,
    interval: Duration,
    state: PollerState,
}

impl SelectedAccountPoller {
    pub fn new(service: Arc<dyn AccountStateService>, interval: Duration) -> Self {
        Self {
            ctx: FetchContext {
                service,
                generation: Arc::new(AtomicU64::new(0)),
                latest: Arc::new(RwLock::new(None)),
            },
            interval,
            state: PollerState::Idle,
        }
    }

    /// Change the selection. `None` deselects.
    ///
    /// The previous timer is cancelled first; a new selection is fetched
    /// immediately and then once per interval.
    pub async fn select(&mut self, address: Option<Address>) {
        let latest_lock = self.ctx.latest.clone();
        let generation = {
            let mut latest = latest_lock.write().await;
            self.cancel_timer();
            *latest = None;
            self.ctx.generation.fetch_add(1, Ordering::SeqCst) + 1
        };

        let Some(address) = address else {
            info!("Selection cleared");
            return;
        };

        info!(address = %address, interval_ms = self.interval.as_millis() as u64, "Polling selected account");
        self.ctx.spawn_fetch(address, generation);

        let ctx = self.ctx.clone();
        let period = self.interval;
        let timer = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                ctx.spawn_fetch(address, generation);
            }
        });

        self.state = PollerState::Polling { address, timer };
    }

    /// One out-of-band fetch for the current selection, if any.
    pub fn refresh_now(&self) {
        if let PollerState::Polling { address, .. } = &self.state {
            let generation = self.ctx.generation.load(Ordering::SeqCst);
            self.ctx.spawn_fetch(*address, generation);
        }
    }

    pub fn selected(&self) -> Option<Address> {
        match &self.state {
            PollerState::Idle => None,
            PollerState::Polling { address, .. } => Some(*address),
        }
    }

    /// Latest state fetched for the current selection.
    pub async fn latest(&self) -> Option<AccountState> {
        self.ctx.latest.read().await.clone()
    }

    /// Cancel any active timer and forget the selection.
    pub fn stop(&mut self) {
        self.cancel_timer();
        self.ctx.generation.fetch_add(1, Ordering::SeqCst);
    }

    fn cancel_timer(&mut self) {
        if let PollerState::Polling { address, timer } =
            std::mem::replace(&mut self.state, PollerState::Idle)
        {
            timer.abort();
            debug!(address = %address, "Poll timer cancelled");
        }
    }
}

impl Drop for SelectedAccountPoller {
    fn drop(&mut self) {
        self.cancel_timer();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
