//! Periodic catalog refresh
//!
//! Polls a [`CatalogFetcher`] for every configured provider and feeds the
//! payloads to [`CatalogStore::refresh`]. Failed attempts keep the last
//! known good catalog and are retried on the next tick.

use super::{CatalogStore, RefreshOutcome};
use crate::models::CloudProvider;
use crate::observability::StructuredLogger;
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;
use tracing::{info, warn};

/// Source of raw provider catalog payloads
#[async_trait]
pub trait CatalogFetcher: Send + Sync {
    async fn fetch(&self, provider: CloudProvider) -> Result<Vec<u8>>;
}

/// Configuration for the refresh worker
#[derive(Debug, Clone)]
pub struct RefreshConfig {
    /// Poll interval (default: 1 hour)
    pub interval: Duration,
    /// Providers to keep up to date
    pub providers: Vec<CloudProvider>,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(3600),
            providers: CloudProvider::ALL.to_vec(),
        }
    }
}

/// Background worker keeping a [`CatalogStore`] current
pub struct CatalogRefreshWorker {
    store: Arc<CatalogStore>,
    fetcher: Arc<dyn CatalogFetcher>,
    config: RefreshConfig,
    logger: StructuredLogger,
}

impl CatalogRefreshWorker {
    pub fn new(
        store: Arc<CatalogStore>,
        fetcher: Arc<dyn CatalogFetcher>,
        config: RefreshConfig,
    ) -> Self {
        Self {
            store,
            fetcher,
            config,
            logger: StructuredLogger::new("catalog-refresh"),
        }
    }

    /// Refresh every configured provider once, returning how many were updated
    pub async fn refresh_all(&self) -> usize {
        let mut updated = 0;

        for provider in &self.config.providers {
            let previous = self.store.version(*provider);

            let payload = match self.fetcher.fetch(*provider).await {
                Ok(payload) => payload,
                Err(e) => {
                    warn!(provider = %provider, error = %e, "Failed to fetch ip ranges catalog");
                    continue;
                }
            };

            match self.store.refresh(*provider, &payload) {
                Ok(RefreshOutcome::Updated { version, .. }) => {
                    self.logger
                        .log_catalog_refresh(provider.as_str(), previous.as_deref(), &version, true);
                    updated += 1;
                }
                Ok(RefreshOutcome::Unchanged { .. }) => {}
                Err(e) => {
                    warn!(provider = %provider, error = %e, "Ip ranges catalog refresh failed");
                    self.logger.log_catalog_refresh(
                        provider.as_str(),
                        previous.as_deref(),
                        previous.as_deref().unwrap_or_default(),
                        false,
                    );
                }
            }
        }

        updated
    }

    /// Run the refresh loop until shutdown
    pub async fn run(self, mut shutdown: tokio::sync::broadcast::Receiver<()>) {
        info!(
            interval_secs = self.config.interval.as_secs(),
            providers = self.config.providers.len(),
            "Starting ip ranges catalog refresh loop"
        );

        let mut ticker = interval(self.config.interval);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.refresh_all().await;
                }
                _ = shutdown.recv() => {
                    info!("Shutting down ip ranges catalog refresh loop");
                    break;
                }
            }
        }
    }
}
