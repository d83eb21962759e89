//! Chain integration for the friend.tech shares contract.
//!
//! Defines the contract bindings, the `TradeChain` trait the trade
//! orchestrator talks to, and the `SignerConnector` used to turn an
//! operator-supplied private key into a signing `TradeChain`.
//! - `events`: `Trade` event subscription and decoding
//! - `client`: alloy websocket implementation of both traits

pub mod client;
pub mod events;

use alloy::primitives::{address, Address, TxHash, U256};
use alloy::sol;
use anyhow::Result;
use async_trait::async_trait;
use secrecy::SecretString;
use std::sync::Arc;

use crate::types::{Confirmation, TradeOrder};

/// friend.tech shares contract on Base mainnet.
pub const DEFAULT_CONTRACT_ADDRESS: Address = address!("CF205808Ed36593aa40a44F10c7f7C2F67d4A4d4");

sol! {
    #[sol(rpc)]
    #[derive(Debug)]
    contract FriendtechSharesV1 {
        event Trade(
            address trader,
            address subject,
            bool isBuy,
            uint256 shareAmount,
            uint256 ethAmount,
            uint256 protocolEthAmount,
            uint256 subjectEthAmount,
            uint256 supply
        );

        function getBuyPriceAfterFee(address sharesSubject, uint256 amount) public view returns (uint256);
        function buyShares(address sharesSubject, uint256 amount) public payable;
        function sellShares(address sharesSubject, uint256 amount) public payable;
    }
}

/// Signed access to the shares contract.
///
/// Each step of a trade is its own call so the orchestrator can tell
/// quote, submission and confirmation failures apart.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TradeChain: Send + Sync {
    /// Address of the signing identity.
    fn signer_address(&self) -> Address;

    /// Read-only price of `amount` shares of `subject`, fees included, in wei.
    async fn quote_buy(&self, subject: Address, amount: U256) -> Result<U256>;

    /// Sign and broadcast an order. Returns once the node accepted it.
    async fn submit(&self, order: &TradeOrder) -> Result<TxHash>;

    /// Wait for the transaction to be mined.
    async fn await_confirmation(&self, tx_hash: TxHash) -> Result<Confirmation>;
}

/// Builds a signing `TradeChain` from a private key.
#[async_trait]
pub trait SignerConnector: Send + Sync {
    async fn connect(&self, private_key: &SecretString) -> Result<Arc<dyn TradeChain>>;
}
