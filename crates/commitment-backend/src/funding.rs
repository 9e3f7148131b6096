//! Pre-funded anchor pool.
//!
//! [`CachingFunder`] wraps a [`FundingService`] and keeps a small stock of
//! funded outputs per locking script so that minting does not wait on the
//! funding round trip.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::{BackendError, Result};
use crate::utxo::{FundedOutpoint, FundingResponse, FundingService};

/// Default stock below which the pool is refilled.
pub const DEFAULT_MIN_LEVEL: usize = 2;
/// Default number of funding requests per refill.
pub const DEFAULT_REQUEST_LEVEL: usize = 4;

type Pool = HashMap<String, Vec<(FundedOutpoint, String)>>;

/// A funding service that serves from a per-script pool.
pub struct CachingFunder {
    inner: Arc<dyn FundingService>,
    min_level: usize,
    request_level: usize,
    pool: Mutex<Pool>,
}

impl CachingFunder {
    pub fn new(inner: Arc<dyn FundingService>) -> Self {
        Self::with_levels(inner, DEFAULT_MIN_LEVEL, DEFAULT_REQUEST_LEVEL)
    }

    pub fn with_levels(inner: Arc<dyn FundingService>, min_level: usize, request_level: usize) -> Self {
        Self {
            inner,
            min_level,
            request_level: request_level.max(1),
            pool: Mutex::new(HashMap::new()),
        }
    }

    /// Funded outputs held for `locking_script`.
    pub async fn available(&self, locking_script: &str) -> usize {
        self.pool
            .lock()
            .await
            .get(locking_script)
            .map_or(0, Vec::len)
    }
}

#[async_trait]
impl FundingService for CachingFunder {
    async fn request_funds(&self, fee_estimate: u64, locking_script: &str) -> Result<FundingResponse> {
        let mut pool = self.pool.lock().await;
        let stock = pool.entry(locking_script.to_string()).or_default();

        if stock.len() < self.min_level {
            for _ in 0..self.request_level {
                match self.inner.request_funds(fee_estimate, locking_script).await {
                    Ok(response) if response.is_success() => {
                        let tx = response.tx;
                        stock.extend(response.outpoints.into_iter().map(|o| (o, tx.clone())));
                    }
                    // Serve what we have. An empty pool surfaces the failure.
                    Ok(response) if !stock.is_empty() => {
                        warn!(status = %response.status, "refill stopped early");
                        break;
                    }
                    Ok(response) => return Ok(response),
                    Err(e) if !stock.is_empty() => {
                        warn!(error = %e, "refill stopped early");
                        break;
                    }
                    Err(e) => return Err(e),
                }
            }
            debug!(stock = stock.len(), "refilled funding pool");
        }

        if stock.is_empty() {
            return Err(BackendError::MintFailed("funding pool is empty".into()));
        }
        // Oldest first.
        let (outpoint, tx) = stock.remove(0);
        Ok(FundingResponse {
            status: FundingResponse::SUCCESS.to_string(),
            outpoints: vec![outpoint],
            tx,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryUtxoChain;

    #[tokio::test]
    async fn test_refills_below_min_level() {
        let chain = MemoryUtxoChain::new();
        let funder = CachingFunder::with_levels(chain.clone(), 2, 3);

        let first = funder.request_funds(100, "21aaac").await.unwrap();
        assert!(first.is_success());
        assert_eq!(first.outpoints.len(), 1);
        assert_eq!(funder.available("21aaac").await, 2);
        assert_eq!(chain.funding_requests(), 3);

        funder.request_funds(100, "21aaac").await.unwrap();
        assert_eq!(funder.available("21aaac").await, 1);
        assert_eq!(chain.funding_requests(), 3);

        // Below min level again: refill.
        funder.request_funds(100, "21aaac").await.unwrap();
        assert_eq!(funder.available("21aaac").await, 3);
        assert_eq!(chain.funding_requests(), 6);
    }

    #[tokio::test]
    async fn test_pools_are_per_script() {
        let chain = MemoryUtxoChain::new();
        let funder = CachingFunder::with_levels(chain.clone(), 1, 2);
        let a = funder.request_funds(100, "21aaac").await.unwrap();
        let b = funder.request_funds(100, "21bbac").await.unwrap();
        assert_ne!(a.outpoints, b.outpoints);
        assert_eq!(funder.available("21aaac").await, 1);
        assert_eq!(funder.available("21bbac").await, 1);
    }

    #[tokio::test]
    async fn test_empty_pool_surfaces_refusal() {
        let chain = MemoryUtxoChain::new();
        chain.set_funding_available(false);
        let funder = CachingFunder::new(chain.clone());
        let response = funder.request_funds(100, "21aaac").await.unwrap();
        assert!(!response.is_success());
    }

    #[tokio::test]
    async fn test_serves_stock_when_refill_fails() {
        let chain = MemoryUtxoChain::new();
        let funder = CachingFunder::with_levels(chain.clone(), 1, 2);
        funder.request_funds(100, "21aaac").await.unwrap();
        assert_eq!(funder.available("21aaac").await, 1);

        chain.set_funding_available(false);
        // Stock of one is at min level, no refill attempted.
        let served = funder.request_funds(100, "21aaac").await.unwrap();
        assert!(served.is_success());
        assert_eq!(funder.available("21aaac").await, 0);
    }
}
