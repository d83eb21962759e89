//! Twitter follower-count lookup.
//!
//! API: `https://api.twitter.com/1.1/users/lookup.json?screen_name=...`
//! Auth: app bearer token. Without one every lookup reports
//! `Unavailable`, which the enricher treats as "no follower data".

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use super::FollowerCountService;
use crate::types::{FollowerCount, ServiceError};

const BASE_URL: &str = "https://api.twitter.com/1.1";
const SERVICE: &str = "twitter";

#[derive(Debug, Deserialize)]
struct TwitterUser {
    #[serde(default)]
    followers_count: u64,
    #[serde(default)]
    verified: bool,
}

pub struct TwitterClient {
    http: Client,
    bearer: Option<SecretString>,
}

impl TwitterClient {
    pub fn new(bearer: Option<SecretString>, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client for Twitter")?;
        Ok(Self { http, bearer })
    }
}

fn first_user(body: &str, handle: &str) -> Result<FollowerCount, ServiceError> {
    let users: Vec<TwitterUser> = serde_json::from_str(body)
        .map_err(|e| ServiceError::unavailable(SERVICE, format!("unexpected response body: {e}")))?;
    users
        .into_iter()
        .next()
        .map(|u| FollowerCount {
            count: u.followers_count,
            verified: u.verified,
        })
        .ok_or_else(|| ServiceError::not_found(SERVICE, handle))
}

#[async_trait]
impl FollowerCountService for TwitterClient {
    async fn followers(&self, handle: &str) -> Result<FollowerCount, ServiceError> {
        let Some(bearer) = &self.bearer else {
            return Err(ServiceError::unavailable(SERVICE, "no bearer token configured"));
        };

        let url = format!(
            "{BASE_URL}/users/lookup.json?screen_name={}",
            urlencoding::encode(handle)
        );
        debug!(handle, "Twitter follower lookup");

        let resp = self
            .http
            .get(&url)
            .bearer_auth(bearer.expose_secret())
            .send()
            .await
            .map_err(|e| ServiceError::unavailable(SERVICE, e))?;

        let status = resp.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(ServiceError::not_found(SERVICE, handle));
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ServiceError::unavailable(SERVICE, format!("{status}: {body}")));
        }

        let body = resp
            .text()
            .await
            .map_err(|e| ServiceError::unavailable(SERVICE, e))?;
        first_user(&body, handle)
    }
}
