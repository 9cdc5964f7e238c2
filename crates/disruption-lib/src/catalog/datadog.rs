//! Datadog ip-ranges parsing
//!
//! The document carries a numeric `version` and one object per product
//! (`agents`, `api`, `synthetics`, ...), each holding `prefixes_ipv4`.

use super::{decode, finish, parse_created_at, parse_prefix, require_version, CatalogParser, IpRangeCatalog};
use crate::error::CatalogError;
use crate::models::CloudProvider;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, Deserialize)]
struct DatadogIpRanges {
    version: Option<Value>,
    modified: Option<String>,
    #[serde(flatten)]
    services: BTreeMap<String, Value>,
}

#[derive(Debug, Deserialize)]
struct DatadogVersion {
    version: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct DatadogService {
    #[serde(default)]
    prefixes_ipv4: Vec<String>,
}

fn version_token(version: Option<Value>) -> Option<String> {
    match version? {
        Value::Number(number) => Some(number.to_string()),
        Value::String(token) => Some(token),
        _ => None,
    }
}

/// Parser for the Datadog published ip ranges
#[derive(Debug, Clone, Copy, Default)]
pub struct DatadogCatalogParser;

impl CatalogParser for DatadogCatalogParser {
    fn provider(&self) -> CloudProvider {
        CloudProvider::Datadog
    }

    fn parse(&self, payload: &[u8]) -> Result<IpRangeCatalog, CatalogError> {
        let provider = self.provider();
        let document: DatadogIpRanges = decode(provider, payload)?;
        let version = require_version(provider, version_token(document.version))?;

        let mut ranges = BTreeMap::new();
        for (name, value) in document.services {
            if !value.is_object() {
                continue;
            }

            let service: DatadogService = serde_json::from_value(value)
                .map_err(|source| CatalogError::Malformed { provider, source })?;

            let mut prefixes = Vec::new();
            for raw in &service.prefixes_ipv4 {
                if let Some(prefix) = parse_prefix(provider, raw)? {
                    prefixes.push(prefix);
                }
            }
            ranges.insert(name, prefixes);
        }

        finish(
            provider,
            version,
            parse_created_at(document.modified.as_deref()),
            ranges,
        )
    }

    fn version(&self, payload: &[u8]) -> Result<String, CatalogError> {
        let document: DatadogVersion = decode(self.provider(), payload)?;
        require_version(self.provider(), version_token(document.version))
    }
}
