//! Injection plan
//!
//! The concrete filter set the injector would install, built from decoded
//! arguments and, when enabled, live Service ports.

use anyhow::{Context, Result};
use disruption_lib::{
    ensure_filter_capacity, format, service_filters, validate_kernel_paths, DisruptionIntent,
    HostTarget, HttpFilters, ServiceLookup, ServicePortTarget, ServiceTarget,
};
use serde::Serialize;
use tracing::{info, warn};

/// Requested Service ports that were not found on the live Service
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnmatchedPorts {
    pub service: String,
    pub namespace: String,
    pub ports: Vec<ServicePortTarget>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InjectionPlan {
    pub description: String,
    pub corrupt: u32,
    pub drop: u32,
    pub duplicate: u32,
    pub delay: u32,
    pub delay_jitter: u32,
    pub bandwidth_limit: u64,
    pub filters: Vec<HostTarget>,
    pub allowed_hosts: Vec<HostTarget>,
    /// Services left for the injector to resolve itself
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub unresolved_services: Vec<ServiceTarget>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub unmatched_ports: Vec<UnmatchedPorts>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http: Option<HttpFilters>,
}

impl InjectionPlan {
    /// Number of classifier filters the plan installs
    pub fn filter_count(&self) -> usize {
        self.filters.len() + self.allowed_hosts.len()
    }
}

/// Build the plan, resolving Services only when a lookup is given
pub async fn build_plan(
    intent: &DisruptionIntent,
    lookup: Option<&dyn ServiceLookup>,
) -> Result<InjectionPlan> {
    validate_kernel_paths(intent).context("HTTP path filter does not fit the kernel filter")?;

    let mut filters = intent.hosts.clone();
    let mut unresolved_services = Vec::new();
    let mut unmatched_ports = Vec::new();

    for service in &intent.services {
        let Some(lookup) = lookup else {
            unresolved_services.push(service.clone());
            continue;
        };

        let live = lookup
            .get_service(&service.namespace, &service.name)
            .await
            .with_context(|| {
                format!("Failed to resolve service {}/{}", service.namespace, service.name)
            })?;

        let (resolved, unmatched) = service_filters(service, &live);
        info!(
            service = %service.name,
            namespace = %service.namespace,
            filters = resolved.len(),
            "Resolved service ports"
        );

        if !unmatched.is_empty() {
            warn!(
                service = %service.name,
                namespace = %service.namespace,
                unmatched = unmatched.len(),
                "Some requested service ports do not exist"
            );
            unmatched_ports.push(UnmatchedPorts {
                service: service.name.clone(),
                namespace: service.namespace.clone(),
                ports: unmatched,
            });
        }

        filters.extend(resolved);
    }

    let plan = InjectionPlan {
        description: format(intent),
        corrupt: intent.corrupt,
        drop: intent.drop,
        duplicate: intent.duplicate,
        delay: intent.delay,
        delay_jitter: intent.delay_jitter,
        bandwidth_limit: intent.bandwidth_limit,
        filters,
        allowed_hosts: intent.allowed_hosts.clone(),
        unresolved_services,
        unmatched_ports,
        http: intent.http.clone(),
    };

    ensure_filter_capacity(plan.filter_count())?;

    Ok(plan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use disruption_lib::{
        Flow, HttpMethod, LiveService, LiveServicePort, Protocol, ValidationErrors, Violation,
        MAXIMUM_TC_FILTERS,
    };

    struct SingleService(LiveService);

    #[async_trait]
    impl ServiceLookup for SingleService {
        async fn get_service(&self, namespace: &str, name: &str) -> Result<LiveService> {
            if self.0.namespace == namespace && self.0.name == name {
                Ok(self.0.clone())
            } else {
                anyhow::bail!("services \"{}\" not found", name)
            }
        }
    }

    fn orders() -> SingleService {
        SingleService(LiveService {
            name: "orders".to_string(),
            namespace: "prod".to_string(),
            cluster_ip: Some("10.96.0.12".to_string()),
            ports: vec![LiveServicePort {
                name: "http".to_string(),
                port: 8080,
                protocol: Some(Protocol::Tcp),
            }],
        })
    }

    fn intent() -> DisruptionIntent {
        DisruptionIntent {
            drop: 50,
            hosts: vec![HostTarget::new("10.0.0.1")],
            services: vec![ServiceTarget::new("orders", "prod")
                .with_port(8080, "")
                .with_port(0, "grpc")],
            ..Default::default()
        }
    }

    #[test]
    fn test_plan_without_lookup_keeps_services() {
        let plan = tokio_test::block_on(build_plan(&intent(), None)).unwrap();

        assert_eq!(plan.filters, vec![HostTarget::new("10.0.0.1")]);
        assert_eq!(plan.unresolved_services.len(), 1);
        assert_eq!(
            plan.description,
            "Network disruption dropping 50% of the traffic going to 10.0.0.1 and going to orders/prod on port(s) /8080,grpc/0"
        );
    }

    #[tokio::test]
    async fn test_plan_resolves_services() {
        let lookup = orders();
        let plan = build_plan(&intent(), Some(&lookup as &dyn ServiceLookup))
            .await
            .unwrap();

        assert_eq!(plan.filter_count(), 2);
        assert_eq!(plan.filters[1].host, "10.96.0.12");
        assert_eq!(plan.filters[1].port, 8080);
        assert_eq!(plan.filters[1].flow, Some(Flow::Egress));
        assert!(plan.unresolved_services.is_empty());
        assert_eq!(
            plan.unmatched_ports,
            vec![UnmatchedPorts {
                service: "orders".to_string(),
                namespace: "prod".to_string(),
                ports: vec![ServicePortTarget::new(0, "grpc")],
            }]
        );
    }

    #[tokio::test]
    async fn test_missing_service_fails() {
        let lookup = orders();
        let mut intent = intent();
        intent.services = vec![ServiceTarget::new("payments", "prod")];

        let err = build_plan(&intent, Some(&lookup as &dyn ServiceLookup))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("prod/payments"));
    }

    #[tokio::test]
    async fn test_filter_capacity_is_enforced() {
        let intent = DisruptionIntent {
            drop: 1,
            hosts: (0..=MAXIMUM_TC_FILTERS)
                .map(|i| HostTarget::new(format!("10.0.{}.{}", i / 256, i % 256)))
                .collect(),
            ..Default::default()
        };

        assert!(build_plan(&intent, None).await.is_err());
    }

    #[tokio::test]
    async fn test_http_path_beyond_kernel_buffer_fails() {
        let mut intent = intent();
        intent.http = Some(HttpFilters {
            method: Some(HttpMethod::Get),
            path: Some(format!("/{}", "v".repeat(70))),
        });

        let err = build_plan(&intent, None).await.unwrap_err();
        let violations = err
            .downcast_ref::<ValidationErrors>()
            .map(|errors| errors.violations().to_vec());
        assert!(matches!(
            violations.as_deref(),
            Some([Violation::KernelPathTooLong { length: 71, .. }])
        ));

        intent.http = Some(HttpFilters {
            method: Some(HttpMethod::Get),
            path: Some("/api/orders".to_string()),
        });
        let plan = build_plan(&intent, None).await.unwrap();
        assert_eq!(plan.http, intent.http);
    }
}
