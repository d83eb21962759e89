//! Buy/sell orchestration.
//!
//! A trade runs quote → submit → confirm in order, stopping at the first
//! failure. Every failure becomes an operator-visible error notice. Once a
//! transaction is confirmed the caller gets its receipt straight away; the
//! refresh callback runs once, after the settle delay, followed by the
//! success notice.

use alloy::primitives::{Address, U256};
use chrono::Utc;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{error, info};

use super::notices::NoticeSink;
use crate::chain::TradeChain;
use crate::types::{Direction, Notice, TradeError, TradeOrder, TradeReceipt};

pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_secs(5);

pub struct TransactionOrchestrator {
    identity: RwLock<Option<Arc<dyn TradeChain>>>,
    settle_delay: Duration,
    notices: Arc<dyn NoticeSink>,
}

impl TransactionOrchestrator {
    pub fn new(settle_delay: Duration, notices: Arc<dyn NoticeSink>) -> Self {
        Self {
            identity: RwLock::new(None),
            settle_delay,
            notices,
        }
    }

    /// Install (or replace) the signing identity. Returns its address.
    pub async fn configure(&self, chain: Arc<dyn TradeChain>) -> Address {
        let signer = chain.signer_address();
        *self.identity.write().await = Some(chain);
        info!(signer = %signer, "Signing identity configured");
        signer
    }

    pub async fn signer_address(&self) -> Option<Address> {
        self.identity
            .read()
            .await
            .as_ref()
            .map(|chain| chain.signer_address())
    }

    pub async fn buy_shares<F, Fut>(
        &self,
        subject: Address,
        quantity: u64,
        refresh: F,
    ) -> Result<TradeReceipt, TradeError>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.trade(subject, Direction::Buy, quantity, refresh).await
    }

    pub async fn sell_shares<F, Fut>(
        &self,
        subject: Address,
        quantity: u64,
        refresh: F,
    ) -> Result<TradeReceipt, TradeError>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.trade(subject, Direction::Sell, quantity, refresh).await
    }

    async fn trade<F, Fut>(
        &self,
        subject: Address,
        direction: Direction,
        quantity: u64,
        refresh: F,
    ) -> Result<TradeReceipt, TradeError>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        match self.execute(subject, direction, quantity).await {
            Ok(receipt) => {
                self.spawn_settlement(receipt.clone(), refresh);
                Ok(receipt)
            }
            Err(e) => {
                error!(subject = ?e.subject(), direction = %direction, error = %e, "Trade failed");
                self.notices.publish(Notice::error(e.to_string()));
                Err(e)
            }
        }
    }

    async fn execute(
        &self,
        subject: Address,
        direction: Direction,
        quantity: u64,
    ) -> Result<TradeReceipt, TradeError> {
        let chain = self
            .identity
            .read()
            .await
            .clone()
            .ok_or(TradeError::NotConfigured { subject, direction })?;

        if quantity == 0 {
            return Err(TradeError::InvalidQuantity { subject, direction });
        }
        let amount = U256::from(quantity);

        let value = match direction {
            Direction::Buy => chain
                .quote_buy(subject, amount)
                .await
                .map_err(|e| TradeError::Quote {
                    subject,
                    quantity,
                    message: format!("{e:#}"),
                })?,
            Direction::Sell => U256::ZERO,
        };

        let order = TradeOrder {
            subject,
            direction,
            amount,
            value,
        };
        info!(subject = %subject, direction = %direction, quantity, value_wei = %value, "Submitting trade");

        let tx_hash = chain
            .submit(&order)
            .await
            .map_err(|e| TradeError::Submission {
                subject,
                direction,
                message: format!("{e:#}"),
            })?;

        let confirmation = chain
            .await_confirmation(tx_hash)
            .await
            .map_err(|e| TradeError::Confirmation {
                subject,
                direction,
                tx_hash: Some(tx_hash),
                message: format!("{e:#}"),
            })?;

        if !confirmation.success {
            return Err(TradeError::Confirmation {
                subject,
                direction,
                tx_hash: Some(tx_hash),
                message: "transaction reverted".to_string(),
            });
        }

        info!(subject = %subject, direction = %direction, tx = %tx_hash, block = ?confirmation.block_number, "Trade confirmed");

        Ok(TradeReceipt {
            subject,
            direction,
            quantity,
            value_wei: value,
            tx_hash,
            block_number: confirmation.block_number,
            confirmed_at: Utc::now(),
        })
    }

    /// Wait for indexers to catch up, refresh once, then report success.
    fn spawn_settlement<F, Fut>(&self, receipt: TradeReceipt, refresh: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let delay = self.settle_delay;
        let notices = self.notices.clone();

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            refresh().await;

            let past = match receipt.direction {
                Direction::Buy => "bought",
                Direction::Sell => "sold",
            };
            info!(subject = %receipt.subject, tx = %receipt.tx_hash, "Trade settled");
            notices.publish(Notice::success(format!("Successfully {past} shares")));
        });
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
