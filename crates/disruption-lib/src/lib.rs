//! Network disruption library
//!
//! This crate provides the core functionality for:
//! - The disruption intent data model
//! - Accumulating validation of intents
//! - Service port and cloud target resolution
//! - The injector argument protocol (compile and parse)
//! - Human readable descriptions
//! - Cloud provider IP range catalogs
//! - Observability

pub mod args;
pub mod catalog;
pub mod cluster;
pub mod error;
pub mod format;
pub mod models;
pub mod observability;
pub mod resolver;
pub mod validation;

pub use args::{compile, parse_hosts, parse_services, InjectorArgs};
pub use catalog::{CatalogParser, CatalogStore, IpRangeCatalog};
pub use cluster::{KubeServiceLookup, ServiceLookup};
pub use error::{CatalogError, ProtocolError, ResolveError};
pub use format::format;
pub use models::*;
pub use observability::{DisruptionMetrics, StructuredLogger};
pub use resolver::{
    ensure_filter_capacity, resolve_cloud_targets, resolve_intent, resolve_service_ports,
    service_filters, LiveService, LiveServicePort, MAXIMUM_TC_FILTERS,
};
pub use validation::{
    validate, validate_kernel_paths, validate_structure, ValidationErrors, Violation,
};
