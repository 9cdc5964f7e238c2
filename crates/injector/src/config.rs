//! Injector configuration

use anyhow::{Context, Result};
use serde::Deserialize;

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Text,
}

/// Injector configuration
#[derive(Debug, Clone, Deserialize)]
pub struct InjectorConfig {
    /// Resolve `--services` targets through the Kubernetes API
    #[serde(default)]
    pub resolve_services: bool,

    /// Log output format
    #[serde(default)]
    pub log_format: LogFormat,

    /// Name reported in lifecycle logs
    #[serde(default = "default_target_name")]
    pub target_name: String,
}

fn default_target_name() -> String {
    std::env::var("TARGET_POD_NAME").unwrap_or_else(|_| "unknown".to_string())
}

impl InjectorConfig {
    /// Load configuration from `INJECTOR_*` environment variables
    pub fn load() -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::Environment::with_prefix("INJECTOR").try_parsing(true))
            .build()
            .context("Failed to read injector configuration")?;

        config
            .try_deserialize()
            .context("Invalid injector configuration")
    }
}
