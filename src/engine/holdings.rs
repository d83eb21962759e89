//! Cached share positions for the signing address.

use alloy::primitives::Address;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::services::HoldingsService;
use crate::types::{Holding, ServiceError};

pub struct HoldingsBook {
    service: Arc<dyn HoldingsService>,
    holdings: RwLock<Vec<Holding>>,
}

impl HoldingsBook {
    pub fn new(service: Arc<dyn HoldingsService>) -> Self {
        Self {
            service,
            holdings: RwLock::new(Vec::new()),
        }
    }

    /// Re-fetch positions for `owner`. On failure the previous snapshot is kept.
    pub async fn refresh(&self, owner: Address) -> Result<usize, ServiceError> {
        match self.service.holdings(owner).await {
            Ok(fresh) => {
                let count = fresh.len();
                *self.holdings.write().await = fresh;
                debug!(owner = %owner, positions = count, "Holdings refreshed");
                Ok(count)
            }
            Err(e) => {
                warn!(owner = %owner, error = %e, "Holdings refresh failed");
                Err(e)
            }
        }
    }

    pub async fn snapshot(&self) -> Vec<Holding> {
        self.holdings.read().await.clone()
    }

    pub async fn clear(&self) {
        self.holdings.write().await.clear();
    }
}
