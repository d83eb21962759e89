//! Configuration loading from TOML with environment variable resolution.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs. Every
//! section and field has a default, so a partial (or empty) file is valid.
//! Secrets and the websocket endpoint are referenced by env-var name and
//! resolved at runtime.

use alloy::primitives::Address;
use anyhow::{bail, Context, Result};
use secrecy::SecretString;
use serde::Deserialize;
use std::fs;
use std::time::Duration;

use crate::chain::DEFAULT_CONTRACT_ADDRESS;
use crate::engine::orchestrator::DEFAULT_SETTLE_DELAY;
use crate::engine::poller::DEFAULT_POLL_INTERVAL;
use crate::engine::search::DEFAULT_DEBOUNCE;

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub chain: ChainConfig,
    pub feed: FeedConfig,
    pub poller: PollerConfig,
    pub search: SearchConfig,
    pub trading: TradingConfig,
    pub services: ServicesConfig,
    pub console: ConsoleConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ChainConfig {
    pub contract_address: Address,
    /// Env var holding the websocket RPC endpoint.
    pub ws_url_env: String,
    /// Env var holding an optional startup private key.
    pub private_key_env: String,
    /// Buffer between the event subscription and the ingest loop.
    pub event_buffer: usize,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            contract_address: DEFAULT_CONTRACT_ADDRESS,
            ws_url_env: "FRIENDTERM_WS_URL".to_string(),
            private_key_env: "FRIENDTERM_PRIVATE_KEY".to_string(),
            event_buffer: 1024,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct FeedConfig {
    pub capacity: usize,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self { capacity: 20 }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PollerConfig {
    pub interval_ms: u64,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval_ms: DEFAULT_POLL_INTERVAL.as_millis() as u64,
        }
    }
}

impl PollerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SearchConfig {
    pub debounce_ms: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            debounce_ms: DEFAULT_DEBOUNCE.as_millis() as u64,
        }
    }
}

impl SearchConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct TradingConfig {
    pub settle_delay_secs: u64,
}

impl Default for TradingConfig {
    fn default() -> Self {
        Self {
            settle_delay_secs: DEFAULT_SETTLE_DELAY.as_secs(),
        }
    }
}

impl TradingConfig {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_secs(self.settle_delay_secs)
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServicesConfig {
    /// Overrides the friend.tech API base URL.
    pub kosetto_base_url: Option<String>,
    pub kosetto_auth_token_env: Option<String>,
    pub twitter_bearer_env: Option<String>,
    pub request_timeout_secs: u64,
}

impl Default for ServicesConfig {
    fn default() -> Self {
        Self {
            kosetto_base_url: None,
            kosetto_auth_token_env: Some("FRIENDTECH_AUTH_TOKEN".to_string()),
            twitter_bearer_env: Some("TWITTER_BEARER_TOKEN".to_string()),
            request_timeout_secs: 15,
        }
    }
}

impl ServicesConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ConsoleConfig {
    pub enabled: bool,
    pub port: u16,
    pub notice_capacity: usize,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: 8080,
            notice_capacity: 50,
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        Self::parse(&contents).with_context(|| format!("Failed to parse config file: {path}"))
    }

    pub fn parse(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.poller.interval_ms == 0 {
            bail!("poller.interval_ms must be positive");
        }
        if self.feed.capacity == 0 {
            bail!("feed.capacity must be positive");
        }
        if self.services.request_timeout_secs == 0 {
            bail!("services.request_timeout_secs must be positive");
        }
        Ok(())
    }

    /// Resolve an environment variable name to its value.
    /// Useful for loading secrets referenced in the config.
    pub fn resolve_env(env_name: &str) -> Result<String> {
        std::env::var(env_name)
            .with_context(|| format!("Environment variable not set: {env_name}"))
    }

    /// Resolve an optional secret. Unset or empty variables yield `None`.
    pub fn resolve_secret(env_name: Option<&str>) -> Option<SecretString> {
        let value = std::env::var(env_name?).ok()?;
        let value = value.trim();
        if value.is_empty() {
            None
        } else {
            Some(SecretString::new(value.to_string()))
        }
    }
}
