//! Google Cloud cloud.json parsing
//!
//! Google publishes one flat prefix list; every IPv4 prefix is grouped under
//! the single logical service [`GOOGLE_CLOUD_SERVICE`].

use super::{decode, finish, parse_created_at, parse_prefix, require_version, CatalogParser, IpRangeCatalog};
use crate::error::CatalogError;
use crate::models::CloudProvider;
use serde::Deserialize;
use std::collections::BTreeMap;

/// Service name all Google Cloud ranges are published under
pub const GOOGLE_CLOUD_SERVICE: &str = "Google";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GcpIpRanges {
    sync_token: Option<String>,
    create_date: Option<String>,
    #[serde(default)]
    prefixes: Vec<GcpPrefix>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GcpPrefix {
    ipv4_prefix: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GcpVersion {
    sync_token: Option<String>,
}

/// Parser for the Google Cloud published ip ranges
#[derive(Debug, Clone, Copy, Default)]
pub struct GcpCatalogParser;

impl CatalogParser for GcpCatalogParser {
    fn provider(&self) -> CloudProvider {
        CloudProvider::Gcp
    }

    fn parse(&self, payload: &[u8]) -> Result<IpRangeCatalog, CatalogError> {
        let provider = self.provider();
        let document: GcpIpRanges = decode(provider, payload)?;
        let version = require_version(provider, document.sync_token)?;

        let mut prefixes = Vec::new();
        for raw in document.prefixes.iter().filter_map(|p| p.ipv4_prefix.as_deref()) {
            if let Some(prefix) = parse_prefix(provider, raw)? {
                prefixes.push(prefix);
            }
        }

        let mut ranges = BTreeMap::new();
        ranges.insert(GOOGLE_CLOUD_SERVICE.to_string(), prefixes);

        finish(
            provider,
            version,
            parse_created_at(document.create_date.as_deref()),
            ranges,
        )
    }

    fn version(&self, payload: &[u8]) -> Result<String, CatalogError> {
        let document: GcpVersion = decode(self.provider(), payload)?;
        require_version(self.provider(), document.sync_token)
    }
}
