//! Shared types for friendterm.
//!
//! The data model used across the chain, engine, service and dashboard
//! modules, plus the domain error taxonomy. Kept free of behaviour so
//! every other module can depend on it without cycles.

use alloy::primitives::{Address, TxHash, U256};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of decimals in one ETH.
pub const ETH_DECIMALS: u32 = 18;

/// Convert a wei amount into an ETH decimal.
///
/// Returns `None` when the amount does not fit a `Decimal` mantissa,
/// which only happens far outside any realistic share price.
pub fn wei_to_eth(wei: U256) -> Option<Decimal> {
    let raw = u128::try_from(wei).ok()?;
    let raw = i128::try_from(raw).ok()?;
    Decimal::try_from_i128_with_scale(raw, ETH_DECIMALS)
        .ok()
        .map(|d| d.normalize())
}

// ---------------------------------------------------------------------------
// Trades
// ---------------------------------------------------------------------------

/// Direction of a share trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Buy,
    Sell,
}

impl Direction {
    pub fn from_is_buy(is_buy: bool) -> Self {
        if is_buy {
            Direction::Buy
        } else {
            Direction::Sell
        }
    }

    /// Verb used in operator-facing messages ("buy" / "sell").
    pub fn verb(&self) -> &'static str {
        match self {
            Direction::Buy => "buy",
            Direction::Sell => "sell",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Buy => write!(f, "BUY"),
            Direction::Sell => write!(f, "SELL"),
        }
    }
}

/// One decoded `Trade` event from the shares contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TradeEvent {
    pub trader: Address,
    pub subject: Address,
    pub direction: Direction,
    pub share_amount: U256,
    /// Trade value in wei (before fees).
    pub eth_amount: U256,
    pub protocol_fee: U256,
    pub subject_fee: U256,
    /// Subject's share supply after this trade.
    pub supply: U256,
    pub block_number: Option<u64>,
    pub tx_hash: Option<TxHash>,
}

impl fmt::Display for TradeEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} x{} of {} ({} wei, supply {})",
            self.trader, self.direction, self.share_amount, self.subject, self.eth_amount, self.supply,
        )
    }
}

/// A buy/sell order ready to be signed and submitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TradeOrder {
    pub subject: Address,
    pub direction: Direction,
    pub amount: U256,
    /// Value attached to the transaction. Zero for sells.
    pub value: U256,
}

/// On-chain confirmation of a submitted transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Confirmation {
    pub tx_hash: TxHash,
    pub block_number: Option<u64>,
    /// `false` when the transaction was mined but reverted.
    pub success: bool,
}

/// Result of a confirmed buy or sell.
#[derive(Debug, Clone, Serialize)]
pub struct TradeReceipt {
    pub subject: Address,
    pub direction: Direction,
    pub quantity: u64,
    #[serde(with = "serde_wei")]
    pub value_wei: U256,
    pub tx_hash: TxHash,
    pub block_number: Option<u64>,
    pub confirmed_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Accounts
// ---------------------------------------------------------------------------

/// Profile data for an address, as returned by the profile service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Profile {
    pub address: Address,
    pub display_name: String,
    pub handle: String,
    pub avatar_url: String,
}

/// Social follower data for a handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FollowerCount {
    pub count: u64,
    pub verified: bool,
}

/// A newly discovered account as it sits in the live feed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrichedAccount {
    pub address: Address,
    pub display_name: String,
    pub handle: String,
    pub avatar_url: String,
    /// Filled in asynchronously after insertion.
    pub followers: Option<u64>,
    pub verified: Option<bool>,
    pub found_at: DateTime<Utc>,
}

impl EnrichedAccount {
    pub fn discovered(profile: Profile, found_at: DateTime<Utc>) -> Self {
        Self {
            address: profile.address,
            display_name: profile.display_name,
            handle: profile.handle,
            avatar_url: profile.avatar_url,
            followers: None,
            verified: None,
            found_at,
        }
    }
}

impl fmt::Display for EnrichedAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.followers {
            Some(n) => write!(f, "@{} ({}) [{} followers]", self.handle, self.address, n),
            None => write!(f, "@{} ({})", self.handle, self.address),
        }
    }
}

/// Live on-chain/indexed state of one account, refreshed by the poller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountState {
    pub address: Address,
    pub display_name: String,
    pub handle: String,
    pub avatar_url: String,
    pub holder_count: u64,
    pub share_supply: u64,
    #[serde(with = "serde_wei")]
    pub display_price_wei: U256,
}

impl AccountState {
    pub fn display_price_eth(&self) -> Option<Decimal> {
        wei_to_eth(self.display_price_wei)
    }
}

/// A share position held by the operator's signing address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Holding {
    pub subject: Address,
    pub display_name: String,
    pub handle: String,
    pub avatar_url: String,
    pub balance: u64,
}

/// One row of search results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchHit {
    pub address: Address,
    pub display_name: String,
    pub handle: String,
    pub avatar_url: String,
}

// ---------------------------------------------------------------------------
// Operator notices
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Success,
    Error,
}

/// An operator-visible message. Trade outcomes are reported here.
#[derive(Debug, Clone, Serialize)]
pub struct Notice {
    pub id: uuid::Uuid,
    pub level: NoticeLevel,
    pub title: String,
    pub description: String,
    pub at: DateTime<Utc>,
}

impl Notice {
    pub fn success(description: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Success, "Success", description)
    }

    pub fn error(description: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Error, "Error", description)
    }

    fn new(level: NoticeLevel, title: &str, description: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4(),
            level,
            title: title.to_string(),
            description: description.into(),
            at: Utc::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// Wei (de)serialization
// ---------------------------------------------------------------------------

/// Wei amounts as decimal strings. Accepts strings or JSON numbers on input,
/// since the friend.tech API is not consistent about which it sends.
pub mod serde_wei {
    use alloy::primitives::U256;
    use serde::{de, Deserialize, Deserializer, Serializer};
    use std::str::FromStr;

    pub fn serialize<S: Serializer>(value: &U256, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(value)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<U256, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Number(u64),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Number(n) => Ok(U256::from(n)),
            Raw::Text(s) if s.trim().is_empty() => Ok(U256::ZERO),
            Raw::Text(s) => U256::from_str(s.trim()).map_err(de::Error::custom),
        }
    }
}

/// Counts that may arrive as strings or numbers.
pub fn de_flex_u64<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(u64),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Number(n) => Ok(n),
        Raw::Text(s) if s.trim().is_empty() => Ok(0),
        Raw::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Failure of an external request/response service.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ServiceError {
    #[error("{service}: not found ({what})")]
    NotFound { service: &'static str, what: String },

    #[error("{service} unavailable: {message}")]
    Unavailable { service: &'static str, message: String },
}

impl ServiceError {
    pub fn unavailable(service: &'static str, message: impl fmt::Display) -> Self {
        ServiceError::Unavailable {
            service,
            message: message.to_string(),
        }
    }

    pub fn not_found(service: &'static str, what: impl fmt::Display) -> Self {
        ServiceError::NotFound {
            service,
            what: what.to_string(),
        }
    }
}

/// A chain payload that could not be decoded into a `TradeEvent`.
#[derive(Debug, thiserror::Error)]
#[error("Malformed Trade event payload: {0}")]
pub struct DecodeError(pub String);

/// Profile enrichment failed for one queued address.
#[derive(Debug, Clone, thiserror::Error)]
#[error("Enrichment failed for {address}: {source}")]
pub struct EnrichmentError {
    pub address: Address,
    #[source]
    pub source: ServiceError,
}

/// One poll tick failed. Transient; the next tick retries.
#[derive(Debug, Clone, thiserror::Error)]
#[error("Poll failed for {address}: {source}")]
pub struct PollError {
    pub address: Address,
    #[source]
    pub source: ServiceError,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SearchError {
    /// Superseded by a newer search. Expected.
    #[error("Search cancelled")]
    Cancelled,

    #[error("Search for '{query}' failed: {source}")]
    Failed {
        query: String,
        #[source]
        source: ServiceError,
    },
}

/// Failures on the trade path. Always surfaced to the operator.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TradeError {
    #[error(
        "Failed to {verb} shares for {subject}: no signing identity configured, save a private key first",
        verb = .direction.verb()
    )]
    NotConfigured { subject: Address, direction: Direction },

    #[error("Failed to {verb} shares for {subject}: quantity must be at least 1", verb = .direction.verb())]
    InvalidQuantity { subject: Address, direction: Direction },

    #[error("Failed to quote {quantity} shares for {subject}: {message}")]
    Quote {
        subject: Address,
        quantity: u64,
        message: String,
    },

    #[error("Failed to {verb} shares for {subject}: {message}", verb = .direction.verb())]
    Submission {
        subject: Address,
        direction: Direction,
        message: String,
    },

    #[error("Failed to confirm {verb} of shares for {subject}: {message}", verb = .direction.verb())]
    Confirmation {
        subject: Address,
        direction: Direction,
        tx_hash: Option<TxHash>,
        message: String,
    },
}

impl TradeError {
    /// Subject address the failed operation targeted, if it got that far.
    pub fn subject(&self) -> Option<Address> {
        match self {
            TradeError::NotConfigured { subject, .. }
            | TradeError::InvalidQuantity { subject, .. }
            | TradeError::Quote { subject, .. }
            | TradeError::Submission { subject, .. }
            | TradeError::Confirmation { subject, .. } => Some(*subject),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
