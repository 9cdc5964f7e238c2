//! Network disruption injector
//!
//! Runs inside the target's network namespace. It decodes the argument vector
//! produced by the compiler, optionally resolves Service targets through the
//! Kubernetes API, and emits the resulting injection plan.

use anyhow::{Context, Result};
use disruption_lib::{
    DisruptionMetrics, InjectorArgs, KubeServiceLookup, ServiceLookup, StructuredLogger,
};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod config;
mod plan;

use config::{InjectorConfig, LogFormat};

const INJECTOR_VERSION: &str = env!("CARGO_PKG_VERSION");

fn init_tracing(format: LogFormat) {
    let registry = tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")));

    // stdout carries the plan
    match format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init(),
        LogFormat::Text => registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = InjectorConfig::load()?;
    init_tracing(config.log_format);

    let metrics = DisruptionMetrics::new();
    let logger = StructuredLogger::new(&config.target_name);
    logger.log_startup(INJECTOR_VERSION);

    let args = match InjectorArgs::parse(std::env::args().skip(1)) {
        Ok(args) => args,
        Err(e) => {
            metrics.inc_protocol_errors();
            error!(error = %e, "Malformed injector arguments");
            return Err(e).context("Failed to decode injector arguments");
        }
    };

    let intent = args.into_intent();

    let lookup = if config.resolve_services && !intent.services.is_empty() {
        info!("Resolving services through the Kubernetes API");
        Some(KubeServiceLookup::try_default().await?)
    } else {
        None
    };

    let plan = plan::build_plan(
        &intent,
        lookup.as_ref().map(|l| l as &dyn ServiceLookup),
    )
    .await?;

    logger.log_intent(
        &plan.description,
        intent.hosts.len(),
        intent.services.len(),
        intent.allowed_hosts.len(),
    );
    metrics.set_resolved_filters(plan.filter_count());

    let json = serde_json::to_string_pretty(&plan).context("Failed to serialize injection plan")?;
    info!(filters = plan.filter_count(), "Injection plan ready");
    println!("{}", json);

    logger.log_shutdown("injection plan emitted");

    Ok(())
}
