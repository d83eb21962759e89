//! Account enrichment step.
//!
//! Runs on the queue worker: resolves a new account's profile, inserts it
//! into the live feed, then fetches follower data off the worker so a
//! slow or failing follower lookup never holds up the next account.

use alloy::primitives::Address;
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info};

use super::feed::SharedFeed;
use super::queue::QueueHandler;
use crate::services::{FollowerCountService, ProfileService};
use crate::types::{EnrichedAccount, EnrichmentError};

pub struct AccountEnricher {
    profiles: Arc<dyn ProfileService>,
    followers: Arc<dyn FollowerCountService>,
    feed: SharedFeed,
}

impl AccountEnricher {
    pub fn new(
        profiles: Arc<dyn ProfileService>,
        followers: Arc<dyn FollowerCountService>,
        feed: SharedFeed,
    ) -> Self {
        Self {
            profiles,
            followers,
            feed,
        }
    }

    /// Look up follower data for `handle` and patch the feed entry.
    fn spawn_follower_patch(&self, handle: String) {
        let followers = self.followers.clone();
        let feed = self.feed.clone();

        tokio::spawn(async move {
            match followers.followers(&handle).await {
                Ok(count) => {
                    let patched = feed.write().await.patch_follower_count(&handle, count);
                    debug!(handle = %handle, followers = count.count, patched, "Follower count resolved");
                }
                Err(e) => {
                    debug!(handle = %handle, error = %e, "Follower lookup failed, leaving count empty");
                }
            }
        });
    }
}

#[async_trait]
impl QueueHandler for AccountEnricher {
    async fn handle(&self, address: Address) -> Result<(), EnrichmentError> {
        let profile = self
            .profiles
            .profile(address)
            .await
            .map_err(|source| EnrichmentError { address, source })?;

        let account = EnrichedAccount::discovered(profile, Utc::now());
        let handle = account.handle.clone();
        info!(account = %account, "New account joined");

        self.feed.write().await.insert(account);

        if !handle.is_empty() {
            self.spawn_follower_patch(handle);
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
