//! friend.tech (kosetto) API client.
//!
//! Serves profiles, live account state, user search and token holdings.
//!
//! Base URL: https://prod-api.kosetto.com
//! Auth: not required for `/users/{address}`; search needs the
//! `authorization` header with a session token.

use alloy::primitives::{Address, U256};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use super::{AccountStateService, HoldingsService, ProfileService, SearchService};
use crate::types::{
    de_flex_u64, serde_wei, AccountState, Holding, Profile, SearchHit, ServiceError,
};

pub const DEFAULT_BASE_URL: &str = "https://prod-api.kosetto.com";
const SERVICE: &str = "friend.tech";

// ---------------------------------------------------------------------------
// API response types
// ---------------------------------------------------------------------------

/// `/users/{address}` and search result rows. Only the fields we use.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct KosettoUser {
    address: Address,
    #[serde(default)]
    twitter_username: Option<String>,
    #[serde(default)]
    twitter_name: Option<String>,
    #[serde(default)]
    twitter_pfp_url: Option<String>,
    #[serde(default, deserialize_with = "de_flex_u64")]
    holder_count: u64,
    #[serde(default, deserialize_with = "de_flex_u64")]
    share_supply: u64,
    #[serde(default, with = "serde_wei")]
    display_price: U256,
}

impl KosettoUser {
    fn into_profile(self) -> Profile {
        Profile {
            address: self.address,
            display_name: self.twitter_name.unwrap_or_default(),
            handle: self.twitter_username.unwrap_or_default(),
            avatar_url: self.twitter_pfp_url.unwrap_or_default(),
        }
    }

    fn into_account_state(self) -> AccountState {
        AccountState {
            address: self.address,
            display_name: self.twitter_name.unwrap_or_default(),
            handle: self.twitter_username.unwrap_or_default(),
            avatar_url: self.twitter_pfp_url.unwrap_or_default(),
            holder_count: self.holder_count,
            share_supply: self.share_supply,
            display_price_wei: self.display_price,
        }
    }

    fn into_search_hit(self) -> SearchHit {
        SearchHit {
            address: self.address,
            display_name: self.twitter_name.unwrap_or_default(),
            handle: self.twitter_username.unwrap_or_default(),
            avatar_url: self.twitter_pfp_url.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct UserList<T> {
    #[serde(default = "Vec::new")]
    users: Vec<T>,
}

/// Row of `/users/{address}/token-holdings`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct KosettoHolding {
    address: Address,
    #[serde(default)]
    twitter_username: Option<String>,
    #[serde(default)]
    twitter_name: Option<String>,
    #[serde(default)]
    twitter_pfp_url: Option<String>,
    #[serde(default, deserialize_with = "de_flex_u64")]
    balance: u64,
}

impl From<KosettoHolding> for Holding {
    fn from(h: KosettoHolding) -> Self {
        Holding {
            subject: h.address,
            display_name: h.twitter_name.unwrap_or_default(),
            handle: h.twitter_username.unwrap_or_default(),
            avatar_url: h.twitter_pfp_url.unwrap_or_default(),
            balance: h.balance,
        }
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

pub struct KosettoClient {
    http: Client,
    base_url: String,
    /// Session token for endpoints that need it (search).
    auth_token: Option<SecretString>,
}

impl KosettoClient {
    pub fn new(
        base_url: Option<String>,
        auth_token: Option<SecretString>,
        timeout: Duration,
    ) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent("friendterm/0.1.0")
            .build()
            .context("Failed to build HTTP client for friend.tech")?;

        Ok(Self {
            http,
            base_url: base_url
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            auth_token,
        })
    }

    // -- Internal helpers ------------------------------------------------

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        authorized: bool,
    ) -> Result<T, ServiceError> {
        let url = format!("{}{}", self.base_url, path);
        debug!(url = %url, "friend.tech request");

        let mut req = self.http.get(&url);
        if authorized {
            if let Some(token) = &self.auth_token {
                req = req.header("authorization", token.expose_secret().as_str());
            }
        }

        let resp = req
            .send()
            .await
            .map_err(|e| ServiceError::unavailable(SERVICE, e))?;

        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            return Err(ServiceError::not_found(SERVICE, path));
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ServiceError::unavailable(SERVICE, format!("{status}: {body}")));
        }

        let body = resp
            .text()
            .await
            .map_err(|e| ServiceError::unavailable(SERVICE, e))?;
        parse_body(&body)
    }

    async fn user(&self, address: Address) -> Result<KosettoUser, ServiceError> {
        self.get_json(&format!("/users/{address}"), false).await
    }
}

fn parse_body<T: DeserializeOwned>(body: &str) -> Result<T, ServiceError> {
    serde_json::from_str(body)
        .map_err(|e| ServiceError::unavailable(SERVICE, format!("unexpected response body: {e}")))
}

// ---------------------------------------------------------------------------
// Trait implementations
// ---------------------------------------------------------------------------

#[async_trait]
impl ProfileService for KosettoClient {
    async fn profile(&self, address: Address) -> Result<Profile, ServiceError> {
        self.user(address).await.map(KosettoUser::into_profile)
    }
}

#[async_trait]
impl AccountStateService for KosettoClient {
    async fn account_state(&self, address: Address) -> Result<AccountState, ServiceError> {
        self.user(address).await.map(KosettoUser::into_account_state)
    }
}

#[async_trait]
impl SearchService for KosettoClient {
    async fn search_by_username(&self, username: &str) -> Result<Vec<SearchHit>, ServiceError> {
        let path = format!("/search/users?username={}", urlencoding::encode(username));
        let list: UserList<KosettoUser> = self.get_json(&path, true).await?;
        Ok(list.users.into_iter().map(KosettoUser::into_search_hit).collect())
    }

    async fn lookup_address(&self, address: Address) -> Result<SearchHit, ServiceError> {
        let path = format!("/users/{address}");
        let user: KosettoUser = self.get_json(&path, true).await?;
        Ok(user.into_search_hit())
    }
}

#[async_trait]
impl HoldingsService for KosettoClient {
    async fn holdings(&self, owner: Address) -> Result<Vec<Holding>, ServiceError> {
        let path = format!("/users/{owner}/token-holdings");
        let list: UserList<KosettoHolding> = self.get_json(&path, false).await?;
        Ok(list.users.into_iter().map(Holding::from).collect())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
