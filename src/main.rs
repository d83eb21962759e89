//! friendterm entry point.
//!
//! Loads configuration, initialises structured logging, wires the
//! ingestion pipeline (chain events → filter → dedup queue → enricher →
//! live feed) and the operator console, then runs until Ctrl+C or until
//! the event stream ends.

use anyhow::Result;
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::{error, info, warn};

use friendterm::chain::client::AlloyConnector;
use friendterm::chain::events::ChainEventSource;
use friendterm::chain::SignerConnector;
use friendterm::config::AppConfig;
use friendterm::console::{self, ConsoleState};
use friendterm::engine::enricher::AccountEnricher;
use friendterm::engine::feed::LiveFeed;
use friendterm::engine::holdings::HoldingsBook;
use friendterm::engine::notices::NoticeBoard;
use friendterm::engine::orchestrator::TransactionOrchestrator;
use friendterm::engine::poller::SelectedAccountPoller;
use friendterm::engine::queue::DedupQueue;
use friendterm::engine::run_ingest;
use friendterm::engine::search::SearchController;
use friendterm::services::kosetto::KosettoClient;
use friendterm::services::twitter::TwitterClient;

const BANNER: &str = r#"
  __      _                _ _
 / _|_ __(_) ___ _ __   __| | |_ ___ _ __ _ __ ___
| |_| '__| |/ _ \ '_ \ / _` | __/ _ \ '__| '_ ` _ \
|  _| |  | |  __/ | | | (_| | ||  __/ |  | | | | | |
|_| |_|  |_|\___|_| |_|\__,_|\__\___|_|  |_| |_| |_|

  friend.tech new-account feed & trading console
  v0.1.0
"#;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let cfg = AppConfig::load("config.toml")?;

    init_logging();

    println!("{BANNER}");
    info!(
        contract = %cfg.chain.contract_address,
        feed_capacity = cfg.feed.capacity,
        poll_interval_ms = cfg.poller.interval_ms,
        console = cfg.console.enabled,
        "friendterm starting up"
    );

    let ws_url = AppConfig::resolve_env(&cfg.chain.ws_url_env)?;

    // -- External services -----------------------------------------------

    let timeout = cfg.services.request_timeout();
    let kosetto = Arc::new(KosettoClient::new(
        cfg.services.kosetto_base_url.clone(),
        AppConfig::resolve_secret(cfg.services.kosetto_auth_token_env.as_deref()),
        timeout,
    )?);

    let twitter_bearer = AppConfig::resolve_secret(cfg.services.twitter_bearer_env.as_deref());
    if twitter_bearer.is_none() {
        warn!("No Twitter bearer token configured, follower counts will stay empty");
    }
    let twitter = Arc::new(TwitterClient::new(twitter_bearer, timeout)?);

    // -- Engine ----------------------------------------------------------

    let feed = LiveFeed::shared(cfg.feed.capacity);
    let queue = DedupQueue::spawn(AccountEnricher::new(kosetto.clone(), twitter, feed.clone()));

    let notices = Arc::new(NoticeBoard::new(cfg.console.notice_capacity));
    let orchestrator = TransactionOrchestrator::new(cfg.trading.settle_delay(), notices.clone());
    let holdings = HoldingsBook::new(kosetto.clone());
    let connector: Arc<dyn SignerConnector> =
        Arc::new(AlloyConnector::new(ws_url.clone(), cfg.chain.contract_address));

    if let Some(key) = AppConfig::resolve_secret(Some(&cfg.chain.private_key_env)) {
        match connector.connect(&key).await {
            Ok(chain) => {
                let signer = orchestrator.configure(chain).await;
                let _ = holdings.refresh(signer).await;
            }
            Err(e) => {
                warn!(error = %format!("{e:#}"), "Startup private key rejected, configure one from the console");
            }
        }
    } else {
        info!("No startup private key, trading disabled until a wallet is configured");
    }

    let state = Arc::new(ConsoleState {
        feed,
        queue: queue.clone(),
        poller: Mutex::new(SelectedAccountPoller::new(kosetto.clone(), cfg.poller.interval())),
        search: SearchController::new(kosetto, cfg.search.debounce()),
        orchestrator,
        notices,
        holdings,
        connector,
        started_at: Utc::now(),
    });

    let console_task = if cfg.console.enabled {
        Some(console::spawn_console(state.clone(), cfg.console.port))
    } else {
        None
    };

    // -- Ingestion -------------------------------------------------------

    let source = ChainEventSource::connect(&ws_url, cfg.chain.contract_address).await?;
    let (events_tx, events_rx) = mpsc::channel(cfg.chain.event_buffer.max(1));
    let pump = source.start(events_tx).await?;
    let mut ingest = tokio::spawn(run_ingest(events_rx, queue.clone()));

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    info!("Watching for new accounts. Press Ctrl+C to stop.");

    tokio::select! {
        _ = &mut shutdown => {
            info!("Shutdown signal received.");
        }
        result = &mut ingest => {
            match result {
                Ok(summary) => warn!(
                    events = summary.events_seen,
                    creations = summary.creations,
                    "Event stream ended"
                ),
                Err(e) => error!(error = %e, "Ingest task failed"),
            }
        }
    }

    // -- Teardown --------------------------------------------------------

    pump.abort();
    ingest.abort();
    queue.shutdown();
    state.poller.lock().await.stop();
    if let Some(task) = console_task {
        task.abort();
    }

    let stats = queue.stats();
    info!(
        enqueued = stats.enqueued,
        coalesced = stats.coalesced,
        enriched = stats.processed,
        failed = stats.failed,
        "friendterm shut down cleanly."
    );

    Ok(())
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("friendterm=info"));

    let json_logging = std::env::var("FRIENDTERM_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}
