//! Mock services for integration testing.
//!
//! Deterministic in-memory implementations of the friend.tech API, the
//! follower-count service and the chain. Latency, failures and call logs
//! are all controllable from test code.

use alloy::primitives::{Address, TxHash, U256};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use friendterm::chain::{SignerConnector, TradeChain};
use friendterm::services::{
    AccountStateService, FollowerCountService, HoldingsService, ProfileService, SearchService,
};
use friendterm::types::*;

pub fn addr(n: u8) -> Address {
    let mut bytes = [0u8; 20];
    bytes[19] = n;
    Address::from(bytes)
}

/// A creation event for `subject` (self-buy of the first share).
pub fn creation(subject: Address) -> TradeEvent {
    TradeEvent {
        trader: subject,
        subject,
        direction: Direction::Buy,
        share_amount: U256::from(1),
        eth_amount: U256::ZERO,
        protocol_fee: U256::ZERO,
        subject_fee: U256::ZERO,
        supply: U256::from(1),
        block_number: Some(1),
        tx_hash: None,
    }
}

/// An ordinary market buy, which the filter must ignore.
pub fn market_buy(trader: Address, subject: Address, supply: u64) -> TradeEvent {
    TradeEvent {
        trader,
        subject,
        eth_amount: U256::from(62_500_000_000_000u64),
        supply: U256::from(supply),
        ..creation(subject)
    }
}

// ---------------------------------------------------------------------------
// friend.tech API
// ---------------------------------------------------------------------------

/// In-memory friend.tech API.
///
/// Every address resolves to a profile with handle `user<N>` unless it is
/// listed in `missing`.
#[derive(Default)]
pub struct MockFriendtech {
    latency: Mutex<HashMap<Address, Duration>>,
    missing: Mutex<Vec<Address>>,
    profile_calls: Mutex<Vec<Address>>,
    state_calls: Mutex<Vec<Address>>,
    holdings: Mutex<Vec<Holding>>,
    holdings_calls: Mutex<u32>,
    /// If set, all operations will return this error.
    force_error: Mutex<Option<String>>,
}

impl MockFriendtech {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_latency(&self, address: Address, latency: Duration) {
        self.latency.lock().unwrap().insert(address, latency);
    }

    pub fn set_missing(&self, address: Address) {
        self.missing.lock().unwrap().push(address);
    }

    pub fn set_error(&self, msg: &str) {
        *self.force_error.lock().unwrap() = Some(msg.to_string());
    }

    pub fn set_holdings(&self, holdings: Vec<Holding>) {
        *self.holdings.lock().unwrap() = holdings;
    }

    pub fn profile_calls(&self) -> Vec<Address> {
        self.profile_calls.lock().unwrap().clone()
    }

    pub fn state_calls_for(&self, address: Address) -> usize {
        self.state_calls
            .lock()
            .unwrap()
            .iter()
            .filter(|a| **a == address)
            .count()
    }

    pub fn holdings_calls(&self) -> u32 {
        *self.holdings_calls.lock().unwrap()
    }

    fn check(&self, address: Address) -> Result<(), ServiceError> {
        if let Some(msg) = self.force_error.lock().unwrap().clone() {
            return Err(ServiceError::unavailable("mock", msg));
        }
        if self.missing.lock().unwrap().contains(&address) {
            return Err(ServiceError::not_found("mock", address));
        }
        Ok(())
    }

    async fn delay(&self, address: Address) {
        let latency = self.latency.lock().unwrap().get(&address).copied();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
    }
}

fn handle_for(address: Address) -> String {
    format!("user{}", address.0[19])
}

#[async_trait]
impl ProfileService for MockFriendtech {
    async fn profile(&self, address: Address) -> Result<Profile, ServiceError> {
        self.profile_calls.lock().unwrap().push(address);
        self.delay(address).await;
        self.check(address)?;
        Ok(Profile {
            address,
            display_name: format!("User {}", address.0[19]),
            handle: handle_for(address),
            avatar_url: format!("https://pbs.example/{}.png", address.0[19]),
        })
    }
}

#[async_trait]
impl AccountStateService for MockFriendtech {
    async fn account_state(&self, address: Address) -> Result<AccountState, ServiceError> {
        self.state_calls.lock().unwrap().push(address);
        self.delay(address).await;
        self.check(address)?;
        Ok(AccountState {
            address,
            display_name: format!("User {}", address.0[19]),
            handle: handle_for(address),
            avatar_url: String::new(),
            holder_count: 5,
            share_supply: 7,
            display_price_wei: U256::from(3_062_500_000_000_000u64),
        })
    }
}

#[async_trait]
impl SearchService for MockFriendtech {
    async fn search_by_username(&self, username: &str) -> Result<Vec<SearchHit>, ServiceError> {
        self.check(Address::ZERO)?;
        Ok(vec![SearchHit {
            address: addr(1),
            display_name: username.to_string(),
            handle: username.to_string(),
            avatar_url: String::new(),
        }])
    }

    async fn lookup_address(&self, address: Address) -> Result<SearchHit, ServiceError> {
        self.check(address)?;
        Ok(SearchHit {
            address,
            display_name: format!("User {}", address.0[19]),
            handle: handle_for(address),
            avatar_url: String::new(),
        })
    }
}

#[async_trait]
impl HoldingsService for MockFriendtech {
    async fn holdings(&self, owner: Address) -> Result<Vec<Holding>, ServiceError> {
        *self.holdings_calls.lock().unwrap() += 1;
        self.check(owner)?;
        Ok(self.holdings.lock().unwrap().clone())
    }
}

// ---------------------------------------------------------------------------
// Followers
// ---------------------------------------------------------------------------

/// Follower counts keyed by handle. Unknown handles are unavailable.
#[derive(Default)]
pub struct MockFollowers {
    counts: Mutex<HashMap<String, u64>>,
}

impl MockFollowers {
    pub fn with(counts: &[(&str, u64)]) -> Arc<Self> {
        let counts = counts.iter().map(|(h, c)| (h.to_string(), *c)).collect();
        Arc::new(Self {
            counts: Mutex::new(counts),
        })
    }
}

#[async_trait]
impl FollowerCountService for MockFollowers {
    async fn followers(&self, handle: &str) -> Result<FollowerCount, ServiceError> {
        self.counts
            .lock()
            .unwrap()
            .get(handle)
            .map(|count| FollowerCount {
                count: *count,
                verified: false,
            })
            .ok_or_else(|| ServiceError::unavailable("mock-twitter", "rate limited"))
    }
}

// ---------------------------------------------------------------------------
// Chain
// ---------------------------------------------------------------------------

/// Which stage of a trade should fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailAt {
    Quote,
    Submit,
    Confirm,
    Revert,
}

/// In-memory shares contract with a fixed quote.
pub struct MockChain {
    signer: Address,
    quote: U256,
    fail_at: Mutex<Option<FailAt>>,
    submitted: Mutex<Vec<TradeOrder>>,
    quotes: Mutex<u32>,
}

impl MockChain {
    pub fn new(signer: Address, quote: U256) -> Arc<Self> {
        Arc::new(Self {
            signer,
            quote,
            fail_at: Mutex::new(None),
            submitted: Mutex::new(Vec::new()),
            quotes: Mutex::new(0),
        })
    }

    pub fn fail_at(&self, stage: FailAt) {
        *self.fail_at.lock().unwrap() = Some(stage);
    }

    pub fn submitted(&self) -> Vec<TradeOrder> {
        self.submitted.lock().unwrap().clone()
    }

    pub fn quotes(&self) -> u32 {
        *self.quotes.lock().unwrap()
    }

    fn failing(&self, stage: FailAt) -> bool {
        *self.fail_at.lock().unwrap() == Some(stage)
    }
}

#[async_trait]
impl TradeChain for MockChain {
    fn signer_address(&self) -> Address {
        self.signer
    }

    async fn quote_buy(&self, _subject: Address, amount: U256) -> Result<U256> {
        *self.quotes.lock().unwrap() += 1;
        if self.failing(FailAt::Quote) {
            return Err(anyhow!("execution reverted"));
        }
        Ok(self.quote * amount)
    }

    async fn submit(&self, order: &TradeOrder) -> Result<TxHash> {
        if self.failing(FailAt::Submit) {
            return Err(anyhow!("insufficient funds for gas * price + value"));
        }
        self.submitted.lock().unwrap().push(order.clone());
        Ok(TxHash::repeat_byte(self.submitted.lock().unwrap().len() as u8))
    }

    async fn await_confirmation(&self, tx_hash: TxHash) -> Result<Confirmation> {
        tokio::time::sleep(Duration::from_millis(200)).await;
        if self.failing(FailAt::Confirm) {
            return Err(anyhow!("websocket closed"));
        }
        Ok(Confirmation {
            tx_hash,
            block_number: Some(9_000_000),
            success: !self.failing(FailAt::Revert),
        })
    }
}

/// Hands out the same `MockChain` for the key "0xgood".
pub struct MockConnector {
    pub chain: Arc<MockChain>,
}

#[async_trait]
impl SignerConnector for MockConnector {
    async fn connect(&self, private_key: &SecretString) -> Result<Arc<dyn TradeChain>> {
        if private_key.expose_secret() != "0xgood" {
            return Err(anyhow!("Invalid private key"));
        }
        Ok(self.chain.clone())
    }
}
