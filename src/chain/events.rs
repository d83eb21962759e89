//! `Trade` event source.
//!
//! Holds one websocket subscription to the contract's `Trade` event and
//! pumps decoded `TradeEvent`s into a channel in arrival order.
//! Malformed payloads are dropped with a warning; they never end the
//! subscription. Reconnection is not handled here: when the stream ends
//! the pump task ends and says so.

use alloy::primitives::Address;
use alloy::providers::{DynProvider, Provider, ProviderBuilder, WsConnect};
use alloy::rpc::types::Log;
use alloy::sol_types;
use anyhow::{Context, Result};
use futures::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::FriendtechSharesV1::{self, Trade};
use crate::types::{DecodeError, Direction, TradeEvent};

/// Normalise a decoded contract event plus its log metadata.
pub fn trade_event_from_log(event: &Trade, log: &Log) -> TradeEvent {
    TradeEvent {
        trader: event.trader,
        subject: event.subject,
        direction: Direction::from_is_buy(event.isBuy),
        share_amount: event.shareAmount,
        eth_amount: event.ethAmount,
        protocol_fee: event.protocolEthAmount,
        subject_fee: event.subjectEthAmount,
        supply: event.supply,
        block_number: log.block_number,
        tx_hash: log.transaction_hash,
    }
}

/// Counters reported when a pump finishes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PumpSummary {
    pub delivered: u64,
    pub dropped: u64,
}

/// Drain `stream` into `sink` until either side closes.
///
/// Generic over the stream so tests can feed it without a node.
pub async fn pump_events<S>(mut stream: S, sink: mpsc::Sender<TradeEvent>) -> PumpSummary
where
    S: Stream<Item = Result<(Trade, Log), sol_types::Error>> + Unpin,
{
    let mut summary = PumpSummary::default();

    while let Some(item) = stream.next().await {
        match item {
            Ok((event, log)) => {
                let trade = trade_event_from_log(&event, &log);
                debug!(trade = %trade, "Trade event received");
                if sink.send(trade).await.is_err() {
                    info!("Trade consumer closed, stopping event pump");
                    return summary;
                }
                summary.delivered += 1;
            }
            Err(e) => {
                let err = DecodeError(e.to_string());
                warn!(error = %err, "Dropping undecodable Trade log");
                summary.dropped += 1;
            }
        }
    }

    info!(
        delivered = summary.delivered,
        dropped = summary.dropped,
        "Trade event stream ended"
    );
    summary
}

/// One logical subscription to `Trade` on one contract.
pub struct ChainEventSource {
    provider: DynProvider,
    contract: Address,
}

impl ChainEventSource {
    /// Open a websocket connection to the chain endpoint.
    pub async fn connect(ws_url: &str, contract: Address) -> Result<Self> {
        let provider = ProviderBuilder::new()
            .connect_ws(WsConnect::new(ws_url))
            .await
            .context("Failed to connect to chain websocket endpoint")?
            .erased();

        info!(contract = %contract, "Connected to chain event endpoint");
        Ok(Self { provider, contract })
    }

    /// Subscribe and spawn the pump. Subscription errors surface here;
    /// everything after that is logged by the pump task.
    pub async fn start(self, sink: mpsc::Sender<TradeEvent>) -> Result<JoinHandle<PumpSummary>> {
        let contract = FriendtechSharesV1::new(self.contract, self.provider.clone());
        let subscription = contract
            .Trade_filter()
            .subscribe()
            .await
            .context("Failed to subscribe to Trade events")?;

        info!(contract = %self.contract, "Subscribed to Trade events");

        // The provider owns the websocket backend; keep it alive with the pump.
        let provider = self.provider;
        Ok(tokio::spawn(async move {
            let summary = pump_events(subscription.into_stream(), sink).await;
            drop(provider);
            summary
        }))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
