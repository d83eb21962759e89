//! Console API route handlers.
//!
//! All endpoints return JSON. State is shared via `Arc<ConsoleState>`.

use alloy::primitives::Address;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::chain::SignerConnector;
use crate::engine::feed::SharedFeed;
use crate::engine::holdings::HoldingsBook;
use crate::engine::notices::NoticeBoard;
use crate::engine::orchestrator::TransactionOrchestrator;
use crate::engine::poller::SelectedAccountPoller;
use crate::engine::queue::{DedupQueue, QueueStats};
use crate::engine::search::SearchController;
use crate::types::{
    AccountState, EnrichedAccount, Holding, Notice, SearchError, SearchHit, TradeError, TradeReceipt,
};

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

/// Shared state accessible by all route handlers.
pub struct ConsoleState {
    pub feed: SharedFeed,
    pub queue: DedupQueue,
    pub poller: Mutex<SelectedAccountPoller>,
    pub search: SearchController,
    pub orchestrator: TransactionOrchestrator,
    pub notices: Arc<NoticeBoard>,
    pub holdings: HoldingsBook,
    pub connector: Arc<dyn SignerConnector>,
    pub started_at: DateTime<Utc>,
}

impl ConsoleState {
    /// Post-trade refresh: re-read holdings for the signer and re-poll the
    /// selected account once.
    pub async fn refresh_after_trade(&self) {
        if let Some(owner) = self.orchestrator.signer_address().await {
            let _ = self.holdings.refresh(owner).await;
        }
        self.poller.lock().await.refresh_now();
    }
}

pub type AppState = Arc<ConsoleState>;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

type ApiError = (StatusCode, Json<ErrorBody>);

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (status, Json(ErrorBody { error: message.into() }))
}

#[derive(Debug, Clone, Serialize)]
pub struct SelectedResponse {
    pub address: Option<Address>,
    pub state: Option<AccountState>,
    /// `state.display_price_wei` in ETH.
    pub display_price_eth: Option<Decimal>,
}

impl SelectedResponse {
    fn new(address: Option<Address>, state: Option<AccountState>) -> Self {
        let display_price_eth = state.as_ref().and_then(AccountState::display_price_eth);
        Self {
            address,
            state,
            display_price_eth,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SelectRequest {
    pub address: Option<Address>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub q: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
    pub query: String,
    /// `true` when a newer search superseded this one.
    pub cancelled: bool,
    /// Set when the lookup failed. `results` is empty in that case.
    pub error: Option<String>,
    pub results: Vec<SearchHit>,
}

#[derive(Deserialize)]
pub struct WalletRequest {
    pub private_key: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct WalletResponse {
    pub address: Address,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TradeRequest {
    pub subject: Address,
    pub quantity: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    pub queue: QueueStats,
    pub feed_len: usize,
    pub feed_capacity: usize,
    pub search_requests: u64,
    pub signer: Option<Address>,
    pub uptime_secs: i64,
}

// ---------------------------------------------------------------------------
// Route handlers
// ---------------------------------------------------------------------------

/// GET /api/feed
pub async fn get_feed(State(state): State<AppState>) -> Json<Vec<EnrichedAccount>> {
    Json(state.feed.read().await.snapshot())
}

/// GET /api/selected
pub async fn get_selected(State(state): State<AppState>) -> Json<SelectedResponse> {
    let poller = state.poller.lock().await;
    Json(SelectedResponse::new(poller.selected(), poller.latest().await))
}

/// POST /api/selected
pub async fn post_selected(
    State(state): State<AppState>,
    Json(req): Json<SelectRequest>,
) -> Json<SelectedResponse> {
    let mut poller = state.poller.lock().await;
    poller.select(req.address).await;
    Json(SelectedResponse::new(poller.selected(), poller.latest().await))
}

/// GET /api/search?q=
///
/// A failed lookup still answers 200 with empty results and `error` set.
pub async fn get_search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Json<SearchResponse> {
    let (results, cancelled, error) = match state.search.search(&params.q).await {
        Ok(results) => (results, false, None),
        Err(SearchError::Cancelled) => (Vec::new(), true, None),
        // Already logged by the controller.
        Err(e) => (Vec::new(), false, Some(e.to_string())),
    };
    Json(SearchResponse {
        query: params.q,
        cancelled,
        error,
        results,
    })
}

/// POST /api/wallet
pub async fn post_wallet(
    State(state): State<AppState>,
    Json(req): Json<WalletRequest>,
) -> Result<Json<WalletResponse>, ApiError> {
    let key = SecretString::new(req.private_key);
    let chain = state.connector.connect(&key).await.map_err(|e| {
        warn!(error = %format!("{e:#}"), "Signing identity rejected");
        api_error(StatusCode::BAD_REQUEST, format!("{e:#}"))
    })?;

    let address = state.orchestrator.configure(chain).await;
    state.holdings.clear().await;
    let _ = state.holdings.refresh(address).await;
    info!(signer = %address, "Wallet configured from console");

    Ok(Json(WalletResponse { address }))
}

/// GET /api/holdings
pub async fn get_holdings(State(state): State<AppState>) -> Json<Vec<Holding>> {
    Json(state.holdings.snapshot().await)
}

/// POST /api/buy
pub async fn post_buy(
    State(state): State<AppState>,
    Json(req): Json<TradeRequest>,
) -> Result<Json<TradeReceipt>, ApiError> {
    let refresher = state.clone();
    state
        .orchestrator
        .buy_shares(req.subject, req.quantity, move || async move {
            refresher.refresh_after_trade().await;
        })
        .await
        .map(Json)
        .map_err(trade_error)
}

/// POST /api/sell
pub async fn post_sell(
    State(state): State<AppState>,
    Json(req): Json<TradeRequest>,
) -> Result<Json<TradeReceipt>, ApiError> {
    let refresher = state.clone();
    state
        .orchestrator
        .sell_shares(req.subject, req.quantity, move || async move {
            refresher.refresh_after_trade().await;
        })
        .await
        .map(Json)
        .map_err(trade_error)
}

/// GET /api/notices
pub async fn get_notices(State(state): State<AppState>) -> Json<Vec<Notice>> {
    Json(state.notices.recent())
}

/// GET /api/stats
pub async fn get_stats(State(state): State<AppState>) -> Json<StatsResponse> {
    let (feed_len, feed_capacity) = {
        let feed = state.feed.read().await;
        (feed.len(), feed.capacity())
    };

    Json(StatsResponse {
        queue: state.queue.stats(),
        feed_len,
        feed_capacity,
        search_requests: state.search.requests_issued(),
        signer: state.orchestrator.signer_address().await,
        uptime_secs: (Utc::now() - state.started_at).num_seconds(),
    })
}

/// GET /health
pub async fn health() -> StatusCode {
    StatusCode::OK
}

fn trade_error(e: TradeError) -> ApiError {
    let status = match e {
        TradeError::NotConfigured { .. } => StatusCode::CONFLICT,
        TradeError::InvalidQuantity { .. } => StatusCode::BAD_REQUEST,
        TradeError::Quote { .. } | TradeError::Submission { .. } | TradeError::Confirmation { .. } => {
            StatusCode::BAD_GATEWAY
        }
    };
    api_error(status, e.to_string())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
