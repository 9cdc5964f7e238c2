//! AWS ip-ranges.json parsing
//!
//! Ranges are grouped by the `service` field of each prefix entry (AMAZON,
//! EC2, S3, ...). IPv6 prefixes are published separately and ignored.

use super::{decode, finish, parse_created_at, parse_prefix, require_version, CatalogParser, IpRangeCatalog};
use crate::error::CatalogError;
use crate::models::CloudProvider;
use serde::Deserialize;
use std::collections::BTreeMap;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AwsIpRanges {
    sync_token: Option<String>,
    create_date: Option<String>,
    #[serde(default)]
    prefixes: Vec<AwsPrefix>,
}

#[derive(Debug, Deserialize)]
struct AwsPrefix {
    ip_prefix: String,
    service: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AwsVersion {
    sync_token: Option<String>,
}

/// Parser for the AWS published ip ranges
#[derive(Debug, Clone, Copy, Default)]
pub struct AwsCatalogParser;

impl CatalogParser for AwsCatalogParser {
    fn provider(&self) -> CloudProvider {
        CloudProvider::Aws
    }

    fn parse(&self, payload: &[u8]) -> Result<IpRangeCatalog, CatalogError> {
        let provider = self.provider();
        let document: AwsIpRanges = decode(provider, payload)?;
        let version = require_version(provider, document.sync_token)?;

        let mut ranges: BTreeMap<String, Vec<_>> = BTreeMap::new();
        for entry in &document.prefixes {
            if let Some(prefix) = parse_prefix(provider, &entry.ip_prefix)? {
                ranges.entry(entry.service.clone()).or_default().push(prefix);
            }
        }

        finish(
            provider,
            version,
            parse_created_at(document.create_date.as_deref()),
            ranges,
        )
    }

    fn version(&self, payload: &[u8]) -> Result<String, CatalogError> {
        let document: AwsVersion = decode(self.provider(), payload)?;
        require_version(self.provider(), document.sync_token)
    }
}
