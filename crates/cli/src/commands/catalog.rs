//! Cloud ip ranges catalog CLI commands

use anyhow::{Context, Result};
use colored::Colorize;
use disruption_lib::catalog::parser_for;
use disruption_lib::{CatalogStore, CloudProvider};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tabled::Tabled;

use crate::output::{print_info, print_json, print_success, print_table, print_warning, OutputFormat};

/// A provider document given as `<provider>=<file>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogSource {
    pub provider: CloudProvider,
    pub file: PathBuf,
}

impl FromStr for CatalogSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (provider, file) = s
            .split_once('=')
            .ok_or_else(|| format!("expected <provider>=<file>, got '{}'", s))?;

        if file.is_empty() {
            return Err(format!("missing catalog file for provider '{}'", provider));
        }

        Ok(Self {
            provider: provider.parse()?,
            file: PathBuf::from(file),
        })
    }
}

/// Load every given provider document into a fresh store
pub fn load_catalogs(sources: &[CatalogSource]) -> Result<CatalogStore> {
    let store = CatalogStore::new();

    for source in sources {
        let payload = std::fs::read(&source.file).with_context(|| {
            format!("Failed to read catalog file {}", source.file.display())
        })?;

        store.refresh(source.provider, &payload).with_context(|| {
            format!(
                "Failed to load {} catalog {}",
                source.provider,
                source.file.display()
            )
        })?;
    }

    Ok(store)
}

/// Row for the catalog services table
#[derive(Tabled, Serialize)]
struct ServiceRow {
    #[tabled(rename = "Service")]
    service: String,
    #[tabled(rename = "Prefixes")]
    prefixes: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CatalogReport {
    provider: CloudProvider,
    version: String,
    created_at: Option<String>,
    prefixes: usize,
    services: Vec<ServiceRow>,
    #[serde(skip_serializing_if = "Option::is_none")]
    newer: Option<bool>,
}

/// Parse a downloaded provider document and summarize it
pub fn check_catalog(
    provider: CloudProvider,
    file: &Path,
    cached_version: Option<&str>,
    format: OutputFormat,
) -> Result<()> {
    let payload =
        std::fs::read(file).with_context(|| format!("Failed to read catalog file {}", file.display()))?;

    let parser = parser_for(provider);
    let catalog = parser
        .parse(&payload)
        .with_context(|| format!("Failed to parse {} catalog {}", provider, file.display()))?;

    let newer = cached_version
        .map(|cached| parser.is_newer(&payload, cached))
        .transpose()?;

    let report = CatalogReport {
        provider,
        version: catalog.version().to_string(),
        created_at: catalog
            .created_at()
            .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string()),
        prefixes: catalog.prefix_count(),
        services: catalog
            .ranges()
            .iter()
            .map(|(service, prefixes)| ServiceRow {
                service: service.clone(),
                prefixes: prefixes.len(),
            })
            .collect(),
        newer,
    };

    match format {
        OutputFormat::Json => print_json(&report)?,
        OutputFormat::Table => {
            println!("{}", format!("{} IP Ranges", provider).bold());
            println!("{}", "=".repeat(50));
            println!("Version:   {}", report.version.cyan());
            println!(
                "Created:   {}",
                report.created_at.as_deref().unwrap_or("unknown")
            );
            println!("Prefixes:  {}", report.prefixes);
            println!();

            print_table(&report.services, format);

            match (cached_version, newer) {
                (Some(cached), Some(true)) => {
                    print_success(&format!("Version {} is newer than {}", report.version, cached))
                }
                (Some(cached), Some(false)) => {
                    print_warning(&format!("Version {} is not newer than {}", report.version, cached))
                }
                _ => print_info("Pass --cached-version to compare against a known version"),
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_source_parsing() {
        let source: CatalogSource = "aws=/tmp/ip-ranges.json".parse().unwrap();
        assert_eq!(source.provider, CloudProvider::Aws);
        assert_eq!(source.file, PathBuf::from("/tmp/ip-ranges.json"));

        assert!("aws".parse::<CatalogSource>().is_err());
        assert!("aws=".parse::<CatalogSource>().is_err());
        assert!("azure=/tmp/ranges.json".parse::<CatalogSource>().is_err());
    }
}
