//! alloy websocket implementation of `TradeChain`.
//!
//! One provider per signing identity, with the local wallet filler so
//! `buyShares`/`sellShares` calls are signed before broadcast.

use alloy::network::{EthereumWallet, ReceiptResponse};
use alloy::primitives::{Address, TxHash, U256};
use alloy::providers::{DynProvider, PendingTransactionBuilder, Provider, ProviderBuilder, WsConnect};
use alloy::signers::local::PrivateKeySigner;
use anyhow::{Context, Result};
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;
use tracing::{debug, info};

use super::FriendtechSharesV1::{self, FriendtechSharesV1Instance};
use super::{SignerConnector, TradeChain};
use crate::types::{Confirmation, Direction, TradeOrder};

/// Parse a hex private key (with or without `0x`) into a local signer.
pub fn parse_signer(private_key: &SecretString) -> Result<PrivateKeySigner> {
    private_key
        .expose_secret()
        .trim()
        .parse::<PrivateKeySigner>()
        .context("Invalid private key")
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

pub struct AlloyTradeChain {
    provider: DynProvider,
    contract: FriendtechSharesV1Instance<DynProvider>,
    signer: Address,
}

impl AlloyTradeChain {
    pub async fn connect(ws_url: &str, contract: Address, private_key: &SecretString) -> Result<Self> {
        let signer = parse_signer(private_key)?;
        let signer_address = signer.address();

        let provider = ProviderBuilder::new()
            .wallet(EthereumWallet::from(signer))
            .connect_ws(WsConnect::new(ws_url))
            .await
            .context("Failed to connect signing provider")?
            .erased();

        info!(signer = %signer_address, contract = %contract, "Signing identity connected");

        Ok(Self {
            contract: FriendtechSharesV1::new(contract, provider.clone()),
            provider,
            signer: signer_address,
        })
    }
}

#[async_trait]
impl TradeChain for AlloyTradeChain {
    fn signer_address(&self) -> Address {
        self.signer
    }

    async fn quote_buy(&self, subject: Address, amount: U256) -> Result<U256> {
        let price = self
            .contract
            .getBuyPriceAfterFee(subject, amount)
            .call()
            .await
            .context("getBuyPriceAfterFee call failed")?;

        debug!(subject = %subject, amount = %amount, price_wei = %price, "Buy quote");
        Ok(price)
    }

    async fn submit(&self, order: &TradeOrder) -> Result<TxHash> {
        let pending = match order.direction {
            Direction::Buy => {
                self.contract
                    .buyShares(order.subject, order.amount)
                    .value(order.value)
                    .send()
                    .await
            }
            Direction::Sell => {
                self.contract
                    .sellShares(order.subject, order.amount)
                    .value(U256::ZERO)
                    .send()
                    .await
            }
        }
        .context("Transaction rejected by node")?;

        Ok(*pending.tx_hash())
    }

    async fn await_confirmation(&self, tx_hash: TxHash) -> Result<Confirmation> {
        let receipt = PendingTransactionBuilder::new(self.provider.root().clone(), tx_hash)
            .get_receipt()
            .await
            .context("Failed waiting for transaction receipt")?;

        Ok(Confirmation {
            tx_hash: receipt.transaction_hash(),
            block_number: receipt.block_number(),
            success: receipt.status(),
        })
    }
}

// ---------------------------------------------------------------------------
// Connector
// ---------------------------------------------------------------------------

/// Connects signing identities against a fixed endpoint and contract.
pub struct AlloyConnector {
    ws_url: String,
    contract: Address,
}

impl AlloyConnector {
    pub fn new(ws_url: impl Into<String>, contract: Address) -> Self {
        Self {
            ws_url: ws_url.into(),
            contract,
        }
    }
}

#[async_trait]
impl SignerConnector for AlloyConnector {
    async fn connect(&self, private_key: &SecretString) -> Result<Arc<dyn TradeChain>> {
        let chain = AlloyTradeChain::connect(&self.ws_url, self.contract, private_key).await?;
        Ok(Arc::new(chain))
    }
}
