//! External request/response services.
//!
//! Defines one trait per collaborator the engine consumes and provides
//! HTTP implementations for:
//! - friend.tech API (profiles, account state, search, holdings)
//! - Twitter v1.1 (follower counts)

pub mod kosetto;
pub mod twitter;

use alloy::primitives::Address;
use async_trait::async_trait;

use crate::types::{AccountState, FollowerCount, Holding, Profile, SearchHit, ServiceError};

/// Address → profile. Called by the enrichment queue.
#[async_trait]
pub trait ProfileService: Send + Sync {
    async fn profile(&self, address: Address) -> Result<Profile, ServiceError>;
}

/// Handle → follower count. Independent of the profile service.
#[async_trait]
pub trait FollowerCountService: Send + Sync {
    async fn followers(&self, handle: &str) -> Result<FollowerCount, ServiceError>;
}

/// Address → live account state. Polled for the selected account.
#[async_trait]
pub trait AccountStateService: Send + Sync {
    async fn account_state(&self, address: Address) -> Result<AccountState, ServiceError>;
}

#[async_trait]
pub trait SearchService: Send + Sync {
    async fn search_by_username(&self, username: &str) -> Result<Vec<SearchHit>, ServiceError>;

    async fn lookup_address(&self, address: Address) -> Result<SearchHit, ServiceError>;
}

/// Share positions held by an address.
#[async_trait]
pub trait HoldingsService: Send + Sync {
    async fn holdings(&self, owner: Address) -> Result<Vec<Holding>, ServiceError>;
}
