//! Error types
//!
//! Protocol, catalog and resolution errors are fail-fast. Validation problems
//! are accumulated into [`crate::validation::ValidationErrors`] instead.

use crate::models::CloudProvider;
use std::num::ParseIntError;
use thiserror::Error;

/// Malformed agent argument protocol
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("unexpected port parameter in {value}: {source}")]
    HostPort {
        value: String,
        #[source]
        source: ParseIntError,
    },
    #[error("unexpected {field} '{token}' in {value}")]
    InvalidToken {
        field: &'static str,
        token: String,
        value: String,
    },
    #[error("service format is expected to follow '<name>;<namespace>;<port-value>-<port-name>;<port-value>-<port-name>', unexpected format detected: {0}")]
    ServiceFormat(String),
    #[error("service port format is expected to follow '<port-value>-<port-name>', unexpected format detected: {0}")]
    ServicePortFormat(String),
    #[error("port format is expected to be a valid integer, unexpected format detected in service port: {0}")]
    ServicePortNumber(String),
    #[error("expected disruption kind '{expected}', found '{found}'")]
    UnexpectedKind { expected: &'static str, found: String },
    #[error("missing value for flag {0}")]
    MissingValue(String),
    #[error("unknown flag {0}")]
    UnknownFlag(String),
    #[error("invalid value '{value}' for flag {flag}")]
    InvalidValue { flag: String, value: String },
    #[error("{field} '{value}' contains the reserved ';' separator")]
    ReservedSeparator { field: &'static str, value: String },
    #[error("cloud targets must be resolved into hosts before compiling")]
    UnresolvedCloudTargets,
}

/// Failure to turn a fetched provider payload into a catalog
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("malformed {0} ip ranges catalog: payload is empty")]
    Empty(CloudProvider),
    #[error("malformed {provider} ip ranges catalog: {source}")]
    Malformed {
        provider: CloudProvider,
        #[source]
        source: serde_json::Error,
    },
    #[error("{0} ip ranges catalog carries no version token")]
    MissingVersion(CloudProvider),
    #[error("{provider} ip ranges catalog version '{version}' is not a valid sync token")]
    InvalidVersion {
        provider: CloudProvider,
        version: String,
    },
    #[error("invalid ip prefix '{prefix}' in {provider} ip ranges catalog: {source}")]
    InvalidPrefix {
        provider: CloudProvider,
        prefix: String,
        #[source]
        source: ipnet::AddrParseError,
    },
    #[error("{0} ip ranges catalog contains no ranges once excluded prefixes are removed")]
    NoRanges(CloudProvider),
}

/// Failure to expand abstract targets into concrete filters
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("no {0} ip ranges catalog has been loaded")]
    CatalogUnavailable(CloudProvider),
    #[error("cloud service '{service}' is not part of the {provider} ip ranges")]
    UnknownCloudService {
        provider: CloudProvider,
        service: String,
    },
    #[error("resolved targets require {requested} filters, exceeding the maximum of {ceiling}")]
    FilterCapacityExceeded { ceiling: usize, requested: usize },
}
