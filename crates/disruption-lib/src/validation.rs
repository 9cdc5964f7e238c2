//! Disruption intent validation
//!
//! Rules never stop at the first problem: every violation found is appended
//! to one [`ValidationErrors`] report so callers can fix everything in one
//! pass. Service existence is only checked when a [`ServiceLookup`] is
//! available.

use crate::args::reserved_separator_fields;
use crate::cluster::ServiceLookup;
use crate::models::{
    CloudProvider, CloudTarget, DisruptionIntent, HttpFilters, ServiceTarget, DEFAULT_HTTP_PATH_FILTER,
    MAX_DELAY_JITTER_MS, MAX_DELAY_MS, MAX_HTTP_PATH_CHARACTERS, MAX_PERCENTAGE,
};
use crate::observability::DisruptionMetrics;
use crate::resolver::resolve_service_ports;
use std::fmt;
use thiserror::Error;
use tracing::debug;

/// Category prefix of every reported violation
pub const VALIDATION_PREFIX: &str = "Network:";

/// Longest path the in-kernel filter buffer can hold
pub const MAX_KERNEL_PATH_CHARACTERS: usize = 62;

/// Intent-level fields that moved to per-host filters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeprecatedField {
    Port,
    Flow,
}

impl DeprecatedField {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeprecatedField::Port => "port",
            DeprecatedField::Flow => "flow",
        }
    }

    /// Deprecated fields set on an intent
    pub fn present_in(intent: &DisruptionIntent) -> Vec<DeprecatedField> {
        let mut fields = Vec::new();
        if intent.deprecated_port.is_some() {
            fields.push(DeprecatedField::Port);
        }
        if intent.deprecated_flow.is_some() {
            fields.push(DeprecatedField::Flow);
        }
        fields
    }
}

impl fmt::Display for DeprecatedField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single business rule violation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Violation {
    #[error("host or port fields must be set when the flow field is set")]
    FlowWithoutSelector,
    #[error("the {0} specification at the network disruption level is deprecated; apply to network disruption hosts instead")]
    Deprecated(DeprecatedField),
    #[error("the path specification at the network disruption level is not valid; should not exceed 100 characters")]
    HttpPathTooLong,
    #[error("the path specification at the network disruption level is not valid; should not contains spaces")]
    HttpPathWhitespace,
    #[error("the path specification at the network disruption level is not valid; should start with a /")]
    HttpPathNotAbsolute,
    #[error("the path specification is empty")]
    EmptyKernelPath,
    #[error("the path specification is too long; should not exceed {ceiling} characters but is {length} characters long")]
    KernelPathTooLong { ceiling: usize, length: usize },
    #[error("{field} should be at most {max}, got {value}")]
    OutOfRange {
        field: &'static str,
        max: u64,
        value: u64,
    },
    #[error("at least one of bandwidthLimit, drop, delay, corrupt or duplicate must be set")]
    NoEffect,
    #[error("at least one cloud provider service list must be set")]
    EmptyCloudTarget,
    #[error("every {0} cloud service entry must have a service name")]
    MissingCloudServiceName(CloudProvider),
    #[error("{field} '{value}' must not contain the ';' character")]
    ReservedSeparator { field: &'static str, value: String },
    #[error("service targets require both a name and a namespace, got '{namespace}/{name}'")]
    IncompleteService { name: String, namespace: String },
    #[error("the service specified in the network disruption ({namespace}/{name}) does not exist: {reason}")]
    ServiceNotFound {
        name: String,
        namespace: String,
        reason: String,
    },
    #[error("the following ports of service {namespace}/{name} do not exist: {ports}")]
    UnmatchedServicePorts {
        name: String,
        namespace: String,
        ports: String,
    },
}

/// Every violation found in one validation pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    violations: Vec<Violation>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, violation: Violation) {
        self.violations.push(violation);
    }

    pub fn extend(&mut self, other: ValidationErrors) {
        self.violations.extend(other.violations);
    }

    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.violations.len()
    }

    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    pub fn contains(&self, violation: &Violation) -> bool {
        self.violations.contains(violation)
    }

    /// `Ok` when nothing was reported
    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let noun = if self.violations.len() == 1 {
            "violation"
        } else {
            "violations"
        };
        write!(
            f,
            "{} {} {} found:",
            VALIDATION_PREFIX,
            self.violations.len(),
            noun
        )?;

        for violation in &self.violations {
            write!(f, "\n\t* {} {}", VALIDATION_PREFIX, violation)?;
        }

        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

impl IntoIterator for ValidationErrors {
    type Item = Violation;
    type IntoIter = std::vec::IntoIter<Violation>;

    fn into_iter(self) -> Self::IntoIter {
        self.violations.into_iter()
    }
}

/// Validate an intent, checking Services against the cluster when possible
pub async fn validate(
    intent: &DisruptionIntent,
    lookup: Option<&dyn ServiceLookup>,
) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();

    if let Some(lookup) = lookup {
        for service in &intent.services {
            if let Some(violation) = check_live_service(lookup, service).await {
                errors.push(violation);
            }
        }
    }

    errors.extend(validate_structure(intent));

    if !errors.is_empty() {
        DisruptionMetrics::new().inc_validation_failures();
        debug!(violations = errors.len(), "Disruption intent rejected");
    }

    errors.into_result()
}

/// Rules that need nothing but the intent itself
pub fn validate_structure(intent: &DisruptionIntent) -> ValidationErrors {
    let mut errors = ValidationErrors::new();

    for service in &intent.services {
        if service.name.trim().is_empty() || service.namespace.trim().is_empty() {
            errors.push(Violation::IncompleteService {
                name: service.name.clone(),
                namespace: service.namespace.clone(),
            });
        }
    }

    for (field, value) in reserved_separator_fields(intent) {
        errors.push(Violation::ReservedSeparator { field, value });
    }

    for host in intent.hosts.iter().chain(&intent.allowed_hosts) {
        if !host.is_selectable() {
            errors.push(Violation::FlowWithoutSelector);
        }
    }

    for field in DeprecatedField::present_in(intent) {
        errors.push(Violation::Deprecated(field));
    }

    if let Some(violation) = intent.http.as_ref().and_then(check_http_filters) {
        errors.push(violation);
    }

    check_ranges(intent, &mut errors);

    if !intent.has_effect() {
        errors.push(Violation::NoEffect);
    }

    if let Some(cloud) = &intent.cloud {
        check_cloud(cloud, &mut errors);
    }

    errors
}

/// First failing rule of an HTTP path filter
pub fn check_http_filters(filters: &HttpFilters) -> Option<Violation> {
    let path = filters.path.as_deref().filter(|p| !p.is_empty())?;

    if path.len() > MAX_HTTP_PATH_CHARACTERS {
        return Some(Violation::HttpPathTooLong);
    }

    if path.chars().any(char::is_whitespace) {
        return Some(Violation::HttpPathWhitespace);
    }

    if !path.starts_with(DEFAULT_HTTP_PATH_FILTER) {
        return Some(Violation::HttpPathNotAbsolute);
    }

    None
}

/// Check the paths an injector hands to in-kernel filters
///
/// The HTTP path is matched by an eBPF program, whose buffer is smaller than
/// the HTTP path ceiling enforced by [`validate_structure`].
pub fn validate_kernel_paths(intent: &DisruptionIntent) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();

    let http_path = intent
        .http
        .as_ref()
        .and_then(|http| http.path.as_deref())
        .filter(|path| !path.is_empty());

    if let Some(Err(violation)) = http_path.map(check_kernel_path) {
        errors.push(violation);
    }

    errors.into_result()
}

/// Check a path handed to kernel-level filtering against its buffer size
pub fn check_kernel_path(path: &str) -> Result<(), Violation> {
    let path = path.trim();

    if path.is_empty() {
        return Err(Violation::EmptyKernelPath);
    }

    let length = path.chars().count();
    if length > MAX_KERNEL_PATH_CHARACTERS {
        return Err(Violation::KernelPathTooLong {
            ceiling: MAX_KERNEL_PATH_CHARACTERS,
            length,
        });
    }

    Ok(())
}

fn check_ranges(intent: &DisruptionIntent, errors: &mut ValidationErrors) {
    let bounds = [
        ("drop", intent.drop, MAX_PERCENTAGE),
        ("duplicate", intent.duplicate, MAX_PERCENTAGE),
        ("corrupt", intent.corrupt, MAX_PERCENTAGE),
        ("delay", intent.delay, MAX_DELAY_MS),
        ("delayJitter", intent.delay_jitter, MAX_DELAY_JITTER_MS),
    ];

    for (field, value, max) in bounds {
        if value > max {
            errors.push(Violation::OutOfRange {
                field,
                max: max.into(),
                value: value.into(),
            });
        }
    }
}

fn check_cloud(cloud: &CloudTarget, errors: &mut ValidationErrors) {
    if !cloud.has_any_list() {
        errors.push(Violation::EmptyCloudTarget);
        return;
    }

    for (provider, entries) in cloud.provider_lists() {
        if entries.iter().any(|e| e.service_name.trim().is_empty()) {
            errors.push(Violation::MissingCloudServiceName(provider));
        }

        for entry in entries {
            if !entry.to_host(entry.service_name.clone()).is_selectable() {
                errors.push(Violation::FlowWithoutSelector);
            }
        }
    }
}

async fn check_live_service(lookup: &dyn ServiceLookup, target: &ServiceTarget) -> Option<Violation> {
    let live = match lookup.get_service(&target.namespace, &target.name).await {
        Ok(live) => live,
        Err(e) => {
            return Some(Violation::ServiceNotFound {
                name: target.name.clone(),
                namespace: target.namespace.clone(),
                reason: format!("{:#}", e),
            })
        }
    };

    let (_, unmatched) = resolve_service_ports(target, &live);
    if unmatched.is_empty() {
        return None;
    }

    Some(Violation::UnmatchedServicePorts {
        name: target.name.clone(),
        namespace: target.namespace.clone(),
        ports: unmatched
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(","),
    })
}
