//! Disruption intent CLI commands

use anyhow::{Context, Result};
use colored::Colorize;
use disruption_lib::format::format as describe;
use disruption_lib::{
    compile, resolve_intent, validate, DisruptionIntent, KubeServiceLookup, ServiceLookup,
};
use serde::Serialize;
use std::path::Path;
use tabled::Tabled;

use super::catalog::{load_catalogs, CatalogSource};
use crate::output::{
    color_percentage, format_bandwidth, print_error, print_json, print_success, print_table,
    print_warning, OutputFormat,
};

/// Read and decode an intent document
pub fn load_intent(path: &Path) -> Result<DisruptionIntent> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read intent file {}", path.display()))?;

    DisruptionIntent::from_json(&content)
        .with_context(|| format!("Failed to parse intent file {}", path.display()))
}

#[derive(Serialize)]
struct ValidationReport {
    valid: bool,
    violations: Vec<String>,
}

/// Validate an intent, returning whether it is valid
pub async fn validate_intent(path: &Path, check_services: bool, format: OutputFormat) -> Result<bool> {
    let intent = load_intent(path)?;

    let lookup = if check_services {
        Some(KubeServiceLookup::try_default().await?)
    } else {
        None
    };

    let result = validate(&intent, lookup.as_ref().map(|l| l as &dyn ServiceLookup)).await;

    let report = ValidationReport {
        valid: result.is_ok(),
        violations: match &result {
            Ok(()) => Vec::new(),
            Err(errors) => errors.violations().iter().map(ToString::to_string).collect(),
        },
    };

    match format {
        OutputFormat::Json => print_json(&report)?,
        OutputFormat::Table => match &result {
            Ok(()) => print_success(&format!("{} is a valid network disruption", path.display())),
            Err(errors) => {
                print_error(&format!(
                    "{} has {} violation(s)",
                    path.display(),
                    errors.len()
                ));
                eprintln!("{}", errors);
            }
        },
    }

    Ok(report.valid)
}

/// Print the injector argument vector of an intent
///
/// Cloud targets are expanded through the given catalogs first; an intent
/// with cloud targets and no matching catalog fails.
pub fn compile_intent(path: &Path, catalogs: &[CatalogSource], format: OutputFormat) -> Result<()> {
    let intent = load_intent(path)?;
    let store = load_catalogs(catalogs)?;

    let resolved = resolve_intent(&intent, &store)
        .with_context(|| format!("Failed to resolve targets of {}", path.display()))?;
    let args = compile(&resolved)
        .with_context(|| format!("Failed to compile intent {}", path.display()))?;

    match format {
        OutputFormat::Json => print_json(&args)?,
        OutputFormat::Table => {
            for arg in &args {
                println!("{}", arg);
            }
        }
    }

    Ok(())
}

/// Row for the effects table
#[derive(Tabled, Serialize)]
struct EffectRow {
    #[tabled(rename = "Effect")]
    effect: &'static str,
    #[tabled(rename = "Value")]
    value: String,
}

#[derive(Serialize)]
struct Description<'a> {
    description: &'a str,
    intent: &'a DisruptionIntent,
}

/// Print the human readable description of an intent
pub fn describe_intent(path: &Path, format: OutputFormat) -> Result<()> {
    let intent = load_intent(path)?;
    let sentence = describe(&intent);

    match format {
        OutputFormat::Json => print_json(&Description {
            description: &sentence,
            intent: &intent,
        })?,
        OutputFormat::Table => {
            if sentence.is_empty() {
                print_warning("This intent does not drop, delay, duplicate or corrupt any packet");
            } else {
                println!("{}", sentence.bold());
            }
            println!();

            let rows = vec![
                EffectRow {
                    effect: "drop",
                    value: color_percentage(intent.drop),
                },
                EffectRow {
                    effect: "duplicate",
                    value: color_percentage(intent.duplicate),
                },
                EffectRow {
                    effect: "corrupt",
                    value: color_percentage(intent.corrupt),
                },
                EffectRow {
                    effect: "delay",
                    value: format!("{}ms (jitter {}ms)", intent.delay, intent.delay_jitter),
                },
                EffectRow {
                    effect: "bandwidth limit",
                    value: format_bandwidth(intent.bandwidth_limit),
                },
            ];
            print_table(&rows, format);
        }
    }

    Ok(())
}
