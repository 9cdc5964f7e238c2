//! Target resolution
//!
//! Turns abstract targets into concrete host filters:
//! - Service references are matched against the live Service's declared ports
//! - Cloud service names are expanded through the provider's IP range catalog
//!
//! Every filter ends up as a kernel classifier rule, so expansions are checked
//! against [`MAXIMUM_TC_FILTERS`].

use crate::catalog::CatalogStore;
use crate::error::ResolveError;
use crate::models::{
    CloudTarget, DisruptionIntent, Flow, HostTarget, Protocol, ServicePortTarget, ServiceTarget,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// Maximum number of u32 classifier filters the kernel accepts on one
/// hashtable: ids range from 0x800 to 0xFFF.
pub const MAXIMUM_TC_FILTERS: usize = 2048;

/// A port declared on a live Kubernetes Service
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveServicePort {
    pub name: String,
    pub port: u16,
    pub protocol: Option<Protocol>,
}

/// The parts of a live Kubernetes Service needed for resolution
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveService {
    pub name: String,
    pub namespace: String,
    pub cluster_ip: Option<String>,
    pub ports: Vec<LiveServicePort>,
}

impl LiveService {
    /// Address used for filters: the cluster IP, or the in-cluster DNS name
    pub fn address(&self) -> String {
        match &self.cluster_ip {
            Some(ip) if !ip.is_empty() && ip != "None" => ip.clone(),
            _ => format!("{}.{}.svc", self.name, self.namespace),
        }
    }
}

/// Match the requested ports of a Service target against the live Service
///
/// Returns the matched live ports and the requested entries that did not
/// match. An empty request selects every live port. A port number that is
/// found but disagrees with an explicitly given name is unmatched; a
/// name-only request only has to exist.
pub fn resolve_service_ports(
    target: &ServiceTarget,
    live: &LiveService,
) -> (Vec<LiveServicePort>, Vec<ServicePortTarget>) {
    if target.ports.is_empty() {
        return (live.ports.clone(), Vec::new());
    }

    let mut by_key: HashMap<String, &LiveServicePort> = HashMap::new();
    for port in &live.ports {
        by_key.insert(format!("port-{}", port.port), port);
        if !port.name.is_empty() {
            by_key.insert(format!("name-{}", port.name), port);
        }
    }

    let mut matched = Vec::new();
    let mut unmatched = Vec::new();

    for requested in &target.ports {
        if requested.port != 0 {
            match by_key.get(&format!("port-{}", requested.port)) {
                Some(found) if requested.name.is_empty() || requested.name == found.name => {
                    matched.push((*found).clone())
                }
                _ => unmatched.push(requested.clone()),
            }
        } else if !requested.name.is_empty() {
            match by_key.get(&format!("name-{}", requested.name)) {
                Some(found) => matched.push((*found).clone()),
                None => unmatched.push(requested.clone()),
            }
        }
    }

    (matched, unmatched)
}

/// Host filters for the matched ports of a Service, plus the unmatched requests
pub fn service_filters(
    target: &ServiceTarget,
    live: &LiveService,
) -> (Vec<HostTarget>, Vec<ServicePortTarget>) {
    let (matched, unmatched) = resolve_service_ports(target, live);
    let address = live.address();

    let filters = matched
        .into_iter()
        .map(|port| HostTarget {
            host: address.clone(),
            port: port.port,
            protocol: port.protocol,
            flow: Some(Flow::Egress),
            conn_state: None,
        })
        .collect();

    (filters, unmatched)
}

/// Expand every cloud service entry into one host filter per catalog prefix
///
/// One catalog snapshot per provider is taken before any expansion, so a
/// concurrent refresh never mixes catalog versions within a call.
pub fn resolve_cloud_targets(
    cloud: &CloudTarget,
    catalogs: &CatalogStore,
) -> Result<Vec<HostTarget>, ResolveError> {
    let mut snapshots = Vec::new();
    for (provider, entries) in cloud.provider_lists() {
        let snapshot = catalogs
            .snapshot(provider)
            .ok_or(ResolveError::CatalogUnavailable(provider))?;
        snapshots.push((provider, entries, snapshot));
    }

    let mut hosts = Vec::new();
    for (provider, entries, catalog) in &snapshots {
        for entry in entries.iter() {
            let prefixes = catalog.prefixes(&entry.service_name).ok_or_else(|| {
                ResolveError::UnknownCloudService {
                    provider: *provider,
                    service: entry.service_name.clone(),
                }
            })?;

            debug!(
                provider = %provider,
                service = %entry.service_name,
                version = %catalog.version(),
                prefixes = prefixes.len(),
                "Expanded cloud service"
            );

            hosts.extend(prefixes.iter().map(|prefix| entry.to_host(prefix.to_string())));
        }
    }

    ensure_filter_capacity(hosts.len())?;

    Ok(hosts)
}

/// Expand the cloud section of an intent into plain hosts
///
/// The returned intent carries no cloud section and can be compiled. The
/// capacity check covers the combined host and allowed host filters.
pub fn resolve_intent(
    intent: &DisruptionIntent,
    catalogs: &CatalogStore,
) -> Result<DisruptionIntent, ResolveError> {
    let mut resolved = intent.clone();

    if let Some(cloud) = resolved.cloud.take() {
        let hosts = resolve_cloud_targets(&cloud, catalogs)?;
        debug!(hosts = hosts.len(), "Resolved cloud targets into hosts");
        resolved.hosts.extend(hosts);
    }

    ensure_filter_capacity(resolved.hosts.len() + resolved.allowed_hosts.len())?;

    Ok(resolved)
}

/// Reject filter sets the kernel cannot install
pub fn ensure_filter_capacity(requested: usize) -> Result<(), ResolveError> {
    if requested > MAXIMUM_TC_FILTERS {
        return Err(ResolveError::FilterCapacityExceeded {
            ceiling: MAXIMUM_TC_FILTERS,
            requested,
        });
    }

    Ok(())
}
