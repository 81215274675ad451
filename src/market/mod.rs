//! Market data provider and the shared market snapshot
//!
//! `MarketDataSource` is the injected provider; `MarketDataStore` owns the
//! snapshot every view reads. Snapshots are replaced wholesale, never edited.

use crate::digest::content_digest;
use crate::models::{MarketOverview, PortfolioDetails};
use crate::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

pub mod fixtures;

/// Supplier of market and portfolio data
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    async fn get_market_overview(&self) -> Result<MarketOverview>;
    async fn get_portfolio(&self) -> Result<PortfolioDetails>;
}

/// Fixed data behind a simulated network delay
pub struct StaticMarketData {
    epoch: DateTime<Utc>,
    latency: Duration,
}

impl StaticMarketData {
    /// Article timestamps are anchored to the construction time
    pub fn new(latency: Duration) -> Self {
        Self::with_epoch(Utc::now(), latency)
    }

    pub fn with_epoch(epoch: DateTime<Utc>, latency: Duration) -> Self {
        Self { epoch, latency }
    }

    async fn simulate_latency(&self) {
        self.simulate_latency_scaled(1, 1).await;
    }

    async fn simulate_latency_scaled(&self, num: u32, den: u32) {
        let scaled = self.latency * num / den;
        if !scaled.is_zero() {
            tokio::time::sleep(scaled).await;
        }
    }
}

#[async_trait]
impl MarketDataSource for StaticMarketData {
    async fn get_market_overview(&self) -> Result<MarketOverview> {
        self.simulate_latency().await;

        let mut overview = fixtures::market_overview(self.epoch);
        overview.version =
            content_digest(&(&overview.indices, &overview.trending, &overview.news));
        Ok(overview)
    }

    async fn get_portfolio(&self) -> Result<PortfolioDetails> {
        // Portfolio screens load a little faster than the market overview
        self.simulate_latency_scaled(4, 5).await;
        Ok(fixtures::portfolio())
    }
}

/// Owner of the current market snapshot
pub struct MarketDataStore {
    source: Arc<dyn MarketDataSource>,
    current: RwLock<Arc<MarketOverview>>,
    latest_load: AtomicU64,
}

impl MarketDataStore {
    pub fn new(source: Arc<dyn MarketDataSource>) -> Self {
        Self {
            source,
            current: RwLock::new(Arc::new(MarketOverview::loading())),
            latest_load: AtomicU64::new(0),
        }
    }

    pub fn source(&self) -> Arc<dyn MarketDataSource> {
        Arc::clone(&self.source)
    }

    /// Current snapshot; cheap to clone and never mutated
    pub async fn snapshot(&self) -> Arc<MarketOverview> {
        Arc::clone(&*self.current.read().await)
    }

    /// Fetch a fresh overview and publish it.
    ///
    /// While loading, the previous content is republished with `is_loading`
    /// set. On failure the previous content stays and the flag is cleared.
    /// When loads overlap only the most recently started one publishes.
    pub async fn load(&self) -> Result<Arc<MarketOverview>> {
        let load_id = self.latest_load.fetch_add(1, Ordering::SeqCst) + 1;

        {
            let mut current = self.current.write().await;
            if !current.is_loading {
                let mut marked = (**current).clone();
                marked.is_loading = true;
                *current = Arc::new(marked);
            }
        }

        debug!(load_id, "Loading market overview");
        let result = self.source.get_market_overview().await;

        let mut current = self.current.write().await;
        if self.latest_load.load(Ordering::SeqCst) != load_id {
            debug!(load_id, "Superseded market load discarded");
            return Ok(Arc::clone(&*current));
        }

        match result {
            Ok(mut overview) => {
                overview.is_loading = false;
                let snapshot = Arc::new(overview);
                *current = Arc::clone(&snapshot);
                info!(
                    version = %snapshot.version,
                    indices = snapshot.indices.len(),
                    news = snapshot.news.len(),
                    "Market overview published"
                );
                Ok(snapshot)
            }
            Err(e) => {
                warn!("Market overview load failed: {}", e);
                let mut previous = (**current).clone();
                previous.is_loading = false;
                *current = Arc::new(previous);
                Err(e)
            }
        }
    }
}
