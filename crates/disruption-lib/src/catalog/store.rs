//! Snapshot publication for IP range catalogs
//!
//! One slot per provider holds an immutable catalog behind an atomic
//! pointer. Readers take a snapshot without locking; the refresh path
//! replaces it wholesale.

use super::{parser_for, IpRangeCatalog};
use crate::error::CatalogError;
use crate::models::CloudProvider;
use crate::observability::DisruptionMetrics;
use arc_swap::ArcSwapOption;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Result of a successful refresh attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// The payload is not newer than the published catalog
    Unchanged { version: String },
    /// A new catalog was published
    Updated {
        previous: Option<String>,
        version: String,
    },
}

/// Latest published catalog of every provider
#[derive(Default)]
pub struct CatalogStore {
    aws: ArcSwapOption<IpRangeCatalog>,
    gcp: ArcSwapOption<IpRangeCatalog>,
    datadog: ArcSwapOption<IpRangeCatalog>,
}

impl CatalogStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, provider: CloudProvider) -> &ArcSwapOption<IpRangeCatalog> {
        match provider {
            CloudProvider::Aws => &self.aws,
            CloudProvider::Gcp => &self.gcp,
            CloudProvider::Datadog => &self.datadog,
        }
    }

    /// Current catalog of a provider, if one was ever published
    pub fn snapshot(&self, provider: CloudProvider) -> Option<Arc<IpRangeCatalog>> {
        self.slot(provider).load_full()
    }

    /// Version of the current catalog of a provider
    pub fn version(&self, provider: CloudProvider) -> Option<String> {
        self.snapshot(provider)
            .map(|catalog| catalog.version().to_string())
    }

    /// Atomically replace a provider's catalog, returning the previous one
    pub fn publish(&self, catalog: IpRangeCatalog) -> Option<Arc<IpRangeCatalog>> {
        let provider = catalog.provider();
        let metrics = DisruptionMetrics::new();
        metrics.set_catalog_version(provider.as_str(), catalog.version(), catalog.prefix_count());

        let previous = self.slot(provider).swap(Some(Arc::new(catalog)));
        if let Some(previous) = &previous {
            metrics.clear_catalog_version(provider.as_str(), previous.version());
        }

        previous
    }

    /// Publish a freshly fetched payload when it is newer than the current catalog
    ///
    /// Any error leaves the current catalog in place.
    pub fn refresh(
        &self,
        provider: CloudProvider,
        payload: &[u8],
    ) -> Result<RefreshOutcome, CatalogError> {
        let metrics = DisruptionMetrics::new();
        let parser = parser_for(provider);
        let cached = self.version(provider);

        let result = parser
            .is_newer(payload, cached.as_deref().unwrap_or_default())
            .and_then(|newer| if newer { parser.parse(payload).map(Some) } else { Ok(None) });

        match result {
            Ok(Some(catalog)) => {
                let version = catalog.version().to_string();
                info!(
                    provider = %provider,
                    previous = ?cached,
                    version = %version,
                    prefixes = catalog.prefix_count(),
                    "Publishing new ip ranges catalog"
                );
                self.publish(catalog);
                metrics.inc_catalog_refresh(provider.as_str(), "updated");
                Ok(RefreshOutcome::Updated {
                    previous: cached,
                    version,
                })
            }
            Ok(None) => {
                debug!(provider = %provider, version = ?cached, "Ip ranges catalog is up to date");
                metrics.inc_catalog_refresh(provider.as_str(), "unchanged");
                Ok(RefreshOutcome::Unchanged {
                    version: cached.unwrap_or_default(),
                })
            }
            Err(e) => {
                warn!(provider = %provider, error = %e, "Rejected ip ranges catalog payload");
                metrics.inc_catalog_refresh(provider.as_str(), "failed");
                Err(e)
            }
        }
    }
}
