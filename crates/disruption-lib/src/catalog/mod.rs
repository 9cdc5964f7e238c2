//! Cloud provider IP range catalogs
//!
//! This module provides:
//! - Parsers turning each provider's published IP range document into a
//!   generic [`IpRangeCatalog`]
//! - Cheap version checks so a refresh loop can poll without re-parsing
//! - A store publishing immutable catalog snapshots to concurrent readers
//!
//! Any prefix containing the public resolver address [`SENTINEL_RESOLVER`] is
//! dropped while parsing so a disruption never targets it.

mod aws;
mod datadog;
mod gcp;
mod refresh;
mod store;

#[cfg(test)]
mod tests;

pub use aws::AwsCatalogParser;
pub use datadog::DatadogCatalogParser;
pub use gcp::{GcpCatalogParser, GOOGLE_CLOUD_SERVICE};
pub use refresh::{CatalogFetcher, CatalogRefreshWorker, RefreshConfig};
pub use store::{CatalogStore, RefreshOutcome};

use crate::error::CatalogError;
use crate::models::CloudProvider;
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use ipnet::Ipv4Net;
use std::collections::BTreeMap;
use std::net::Ipv4Addr;
use std::sync::Arc;

/// Address that must never be part of a parsed catalog
pub const SENTINEL_RESOLVER: Ipv4Addr = Ipv4Addr::new(8, 8, 8, 8);

/// Parsed, versioned snapshot of a provider's IP ranges
///
/// Built once per successful parse and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IpRangeCatalog {
    provider: CloudProvider,
    version: String,
    created_at: Option<DateTime<Utc>>,
    ranges: BTreeMap<String, Vec<Ipv4Net>>,
}

impl IpRangeCatalog {
    pub fn new(
        provider: CloudProvider,
        version: impl Into<String>,
        created_at: Option<DateTime<Utc>>,
        ranges: BTreeMap<String, Vec<Ipv4Net>>,
    ) -> Self {
        Self {
            provider,
            version: version.into(),
            created_at,
            ranges,
        }
    }

    pub fn provider(&self) -> CloudProvider {
        self.provider
    }

    /// Provider-assigned version token
    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    /// Prefixes of a logical service, in catalog order
    pub fn prefixes(&self, service: &str) -> Option<&[Ipv4Net]> {
        self.ranges.get(service).map(Vec::as_slice)
    }

    pub fn services(&self) -> impl Iterator<Item = &str> {
        self.ranges.keys().map(String::as_str)
    }

    pub fn ranges(&self) -> &BTreeMap<String, Vec<Ipv4Net>> {
        &self.ranges
    }

    /// Total number of prefixes across services
    pub fn prefix_count(&self) -> usize {
        self.ranges.values().map(Vec::len).sum()
    }
}

/// Provider-specific catalog document parser
pub trait CatalogParser: Send + Sync {
    fn provider(&self) -> CloudProvider;

    /// Parse a fetched payload into a catalog
    fn parse(&self, payload: &[u8]) -> Result<IpRangeCatalog, CatalogError>;

    /// Extract only the version token of a payload
    fn version(&self, payload: &[u8]) -> Result<String, CatalogError>;

    /// Whether a payload is newer than the cached version
    ///
    /// An empty cached version is always older.
    fn is_newer(&self, payload: &[u8], cached_version: &str) -> Result<bool, CatalogError> {
        let version = self.version(payload)?;
        is_newer_counter(self.provider(), &version, cached_version)
    }
}

/// Create the parser for a provider
pub fn parser_for(provider: CloudProvider) -> Arc<dyn CatalogParser> {
    match provider {
        CloudProvider::Aws => Arc::new(AwsCatalogParser),
        CloudProvider::Gcp => Arc::new(GcpCatalogParser),
        CloudProvider::Datadog => Arc::new(DatadogCatalogParser),
    }
}

/// Reject empty payloads and decode the JSON document
pub(crate) fn decode<T: serde::de::DeserializeOwned>(
    provider: CloudProvider,
    payload: &[u8],
) -> Result<T, CatalogError> {
    if payload.iter().all(u8::is_ascii_whitespace) {
        return Err(CatalogError::Empty(provider));
    }

    serde_json::from_slice(payload).map_err(|source| CatalogError::Malformed { provider, source })
}

/// Non-empty, trimmed version token
pub(crate) fn require_version(
    provider: CloudProvider,
    version: Option<String>,
) -> Result<String, CatalogError> {
    version
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or(CatalogError::MissingVersion(provider))
}

/// Parse one IPv4 prefix, returning `None` when it covers the sentinel resolver
pub(crate) fn parse_prefix(
    provider: CloudProvider,
    raw: &str,
) -> Result<Option<Ipv4Net>, CatalogError> {
    let prefix: Ipv4Net = raw.trim().parse().map_err(|source| CatalogError::InvalidPrefix {
        provider,
        prefix: raw.to_string(),
        source,
    })?;

    if prefix.contains(&SENTINEL_RESOLVER) {
        tracing::debug!(provider = %provider, prefix = %prefix, "Excluding sentinel resolver prefix");
        return Ok(None);
    }

    Ok(Some(prefix))
}

/// Drop empty services and build the catalog, failing when nothing is left
pub(crate) fn finish(
    provider: CloudProvider,
    version: String,
    created_at: Option<DateTime<Utc>>,
    mut ranges: BTreeMap<String, Vec<Ipv4Net>>,
) -> Result<IpRangeCatalog, CatalogError> {
    ranges.retain(|_, prefixes| !prefixes.is_empty());

    if ranges.is_empty() {
        return Err(CatalogError::NoRanges(provider));
    }

    Ok(IpRangeCatalog::new(provider, version, created_at, ranges))
}

/// Compare counter-style version tokens
///
/// A cached token that is not a counter only compares by inequality.
pub(crate) fn is_newer_counter(
    provider: CloudProvider,
    version: &str,
    cached_version: &str,
) -> Result<bool, CatalogError> {
    let current: u64 = version.parse().map_err(|_| CatalogError::InvalidVersion {
        provider,
        version: version.to_string(),
    })?;

    let cached_version = cached_version.trim();
    if cached_version.is_empty() {
        return Ok(true);
    }

    match cached_version.parse::<u64>() {
        Ok(cached) => Ok(current > cached),
        Err(_) => Ok(version != cached_version),
    }
}

/// Parse the creation dates providers put in their documents
pub(crate) fn parse_created_at(raw: Option<&str>) -> Option<DateTime<Utc>> {
    let raw = raw?.trim();

    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }

    ["%Y-%m-%d-%H-%M-%S", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|naive| Utc.from_utc_datetime(&naive))
}
