//! Observability infrastructure for disruption compilation
//!
//! Provides:
//! - Prometheus metrics (catalog refreshes and versions, validation failures,
//!   expanded filter counts)
//! - Structured JSON logging with tracing

use prometheus::{
    register_int_counter, register_int_counter_vec, register_int_gauge, register_int_gauge_vec,
    IntCounter, IntCounterVec, IntGauge, IntGaugeVec,
};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<DisruptionMetricsInner> = OnceLock::new();

struct DisruptionMetricsInner {
    catalog_refreshes: IntCounterVec,
    catalog_version_info: IntGaugeVec,
    catalog_prefixes: IntGaugeVec,
    validation_failures: IntCounter,
    resolved_filters: IntGauge,
    protocol_errors: IntCounter,
}

impl DisruptionMetricsInner {
    fn new() -> Self {
        Self {
            catalog_refreshes: register_int_counter_vec!(
                "network_disruption_catalog_refresh_total",
                "Catalog refresh attempts by provider and outcome",
                &["provider", "outcome"]
            )
            .expect("Failed to register catalog_refresh_total"),

            catalog_version_info: register_int_gauge_vec!(
                "network_disruption_catalog_version_info",
                "Currently published catalog version per provider",
                &["provider", "version"]
            )
            .expect("Failed to register catalog_version_info"),

            catalog_prefixes: register_int_gauge_vec!(
                "network_disruption_catalog_prefixes",
                "Number of prefixes in the published catalog per provider",
                &["provider"]
            )
            .expect("Failed to register catalog_prefixes"),

            validation_failures: register_int_counter!(
                "network_disruption_validation_failures_total",
                "Number of disruption intents rejected by validation"
            )
            .expect("Failed to register validation_failures_total"),

            resolved_filters: register_int_gauge!(
                "network_disruption_resolved_filters",
                "Number of filters produced by the last target resolution"
            )
            .expect("Failed to register resolved_filters"),

            protocol_errors: register_int_counter!(
                "network_disruption_protocol_errors_total",
                "Number of malformed injector argument vectors"
            )
            .expect("Failed to register protocol_errors_total"),
        }
    }
}

/// Handle to the process-wide disruption metrics
///
/// Clones share the same underlying metrics.
#[derive(Clone)]
pub struct DisruptionMetrics {
    _private: (),
}

impl Default for DisruptionMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl DisruptionMetrics {
    /// Create a new metrics handle (initializes global metrics if needed)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(DisruptionMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &DisruptionMetricsInner {
        GLOBAL_METRICS.get_or_init(DisruptionMetricsInner::new)
    }

    /// Count a catalog refresh attempt
    pub fn inc_catalog_refresh(&self, provider: &str, outcome: &str) {
        self.inner()
            .catalog_refreshes
            .with_label_values(&[provider, outcome])
            .inc();
    }

    /// Record the catalog published for a provider
    pub fn set_catalog_version(&self, provider: &str, version: &str, prefixes: usize) {
        let inner = self.inner();
        inner
            .catalog_version_info
            .with_label_values(&[provider, version])
            .set(1);
        inner
            .catalog_prefixes
            .with_label_values(&[provider])
            .set(prefixes as i64);
    }

    /// Drop the version series of a replaced catalog
    pub fn clear_catalog_version(&self, provider: &str, version: &str) {
        let _ = self
            .inner()
            .catalog_version_info
            .remove_label_values(&[provider, version]);
    }

    pub fn inc_validation_failures(&self) {
        self.inner().validation_failures.inc();
    }

    pub fn set_resolved_filters(&self, count: usize) {
        self.inner().resolved_filters.set(count as i64);
    }

    pub fn inc_protocol_errors(&self) {
        self.inner().protocol_errors.inc();
    }
}

/// Structured logger for disruption lifecycle events
#[derive(Clone)]
pub struct StructuredLogger {
    component: String,
}

impl StructuredLogger {
    pub fn new(component: impl Into<String>) -> Self {
        Self {
            component: component.into(),
        }
    }

    /// Log process startup
    pub fn log_startup(&self, version: &str) {
        info!(
            event = "started",
            component = %self.component,
            version = %version,
            "Network disruption component started"
        );
    }

    /// Log a decoded or loaded disruption intent
    pub fn log_intent(&self, description: &str, hosts: usize, services: usize, allowed_hosts: usize) {
        info!(
            event = "intent_received",
            component = %self.component,
            description = %description,
            hosts = hosts,
            services = services,
            allowed_hosts = allowed_hosts,
            "Network disruption intent received"
        );
    }

    /// Log a catalog refresh result
    pub fn log_catalog_refresh(&self, provider: &str, previous: Option<&str>, version: &str, success: bool) {
        if success {
            info!(
                event = "catalog_refreshed",
                component = %self.component,
                provider = %provider,
                previous_version = ?previous,
                version = %version,
                "IP ranges catalog refreshed"
            );
        } else {
            warn!(
                event = "catalog_refresh_failed",
                component = %self.component,
                provider = %provider,
                previous_version = ?previous,
                version = %version,
                "IP ranges catalog refresh failed, keeping previous snapshot"
            );
        }
    }

    /// Log process shutdown
    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "shutdown",
            component = %self.component,
            reason = %reason,
            "Network disruption component shutting down"
        );
    }
}
