//! Live feed of newly discovered accounts.
//!
//! Newest first, bounded. Insertions come from the enrichment queue's
//! single worker; follower counts are patched in later by handle.

use alloy::primitives::Address;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use crate::types::{EnrichedAccount, FollowerCount};

pub const DEFAULT_FEED_CAPACITY: usize = 20;

/// Feed shared between the enrichment worker and readers.
pub type SharedFeed = Arc<RwLock<LiveFeed>>;

#[derive(Debug, Clone)]
pub struct LiveFeed {
    entries: VecDeque<EnrichedAccount>,
    capacity: usize,
}

impl LiveFeed {
    /// A capacity of zero is bumped to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity + 1),
            capacity,
        }
    }

    pub fn shared(capacity: usize) -> SharedFeed {
        Arc::new(RwLock::new(Self::new(capacity)))
    }

    /// Prepend `account`, replacing any older entry for the same address,
    /// then evict from the tail down to capacity.
    pub fn insert(&mut self, account: EnrichedAccount) {
        self.entries.retain(|e| e.address != account.address);
        self.entries.push_front(account);

        while self.entries.len() > self.capacity {
            if let Some(evicted) = self.entries.pop_back() {
                debug!(address = %evicted.address, "Evicted oldest feed entry");
            }
        }
    }

    /// Update follower data for `handle`. Returns `false` when no entry
    /// matches, which is expected once the entry has been evicted.
    pub fn patch_follower_count(&mut self, handle: &str, followers: FollowerCount) -> bool {
        let mut patched = false;
        for entry in self
            .entries
            .iter_mut()
            .filter(|e| !e.handle.is_empty() && e.handle.eq_ignore_ascii_case(handle))
        {
            entry.followers = Some(followers.count);
            entry.verified = Some(followers.verified);
            patched = true;
        }
        patched
    }

    pub fn get(&self, address: Address) -> Option<&EnrichedAccount> {
        self.entries.iter().find(|e| e.address == address)
    }

    pub fn snapshot(&self) -> Vec<EnrichedAccount> {
        self.entries.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for LiveFeed {
    fn default() -> Self {
        Self::new(DEFAULT_FEED_CAPACITY)
    }
}
