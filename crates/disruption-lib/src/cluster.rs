//! Kubernetes Service lookup
//!
//! Validation and the injector only need a Service's ports and address, so
//! the cluster is reached through the small [`ServiceLookup`] trait. The
//! kube-backed implementation is used in-cluster; tests plug in fixtures.

use crate::models::Protocol;
use crate::resolver::{LiveService, LiveServicePort};
use anyhow::{Context, Result};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Service;
use kube::{Api, Client};
use tracing::debug;

/// Source of live Kubernetes Services
#[async_trait]
pub trait ServiceLookup: Send + Sync {
    async fn get_service(&self, namespace: &str, name: &str) -> Result<LiveService>;
}

/// Service lookup through the Kubernetes API server
#[derive(Clone)]
pub struct KubeServiceLookup {
    client: Client,
}

impl KubeServiceLookup {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Build a lookup from the in-cluster or kubeconfig environment
    pub async fn try_default() -> Result<Self> {
        let client = Client::try_default()
            .await
            .context("Failed to create Kubernetes client")?;
        Ok(Self::new(client))
    }
}

#[async_trait]
impl ServiceLookup for KubeServiceLookup {
    async fn get_service(&self, namespace: &str, name: &str) -> Result<LiveService> {
        let api: Api<Service> = Api::namespaced(self.client.clone(), namespace);
        let service = api
            .get(name)
            .await
            .with_context(|| format!("Failed to get service {}/{}", namespace, name))?;

        debug!(namespace = %namespace, name = %name, "Fetched live service");

        Ok(LiveService::from(&service))
    }
}

impl From<&Service> for LiveService {
    fn from(service: &Service) -> Self {
        let spec = service.spec.as_ref();

        let ports = spec
            .and_then(|s| s.ports.as_ref())
            .map(|ports| {
                ports
                    .iter()
                    .filter_map(|p| {
                        Some(LiveServicePort {
                            name: p.name.clone().unwrap_or_default(),
                            port: u16::try_from(p.port).ok()?,
                            protocol: p.protocol.as_deref().and_then(|t| t.parse::<Protocol>().ok()),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();

        LiveService {
            name: service.metadata.name.clone().unwrap_or_default(),
            namespace: service.metadata.namespace.clone().unwrap_or_default(),
            cluster_ip: spec.and_then(|s| s.cluster_ip.clone()),
            ports,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::{ServicePort, ServiceSpec};
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

    #[test]
    fn test_live_service_from_kubernetes_service() {
        let service = Service {
            metadata: ObjectMeta {
                name: Some("orders".to_string()),
                namespace: Some("prod".to_string()),
                ..Default::default()
            },
            spec: Some(ServiceSpec {
                cluster_ip: Some("10.96.0.12".to_string()),
                ports: Some(vec![
                    ServicePort {
                        name: Some("http".to_string()),
                        port: 8080,
                        protocol: Some("TCP".to_string()),
                        ..Default::default()
                    },
                    ServicePort {
                        port: 5353,
                        protocol: Some("UDP".to_string()),
                        ..Default::default()
                    },
                    ServicePort {
                        name: Some("sctp".to_string()),
                        port: 9000,
                        protocol: Some("SCTP".to_string()),
                        ..Default::default()
                    },
                ]),
                ..Default::default()
            }),
            ..Default::default()
        };

        let live = LiveService::from(&service);

        assert_eq!(live.name, "orders");
        assert_eq!(live.namespace, "prod");
        assert_eq!(live.address(), "10.96.0.12");
        assert_eq!(live.ports.len(), 3);
        assert_eq!(live.ports[0].protocol, Some(Protocol::Tcp));
        assert_eq!(live.ports[1].name, "");
        assert_eq!(live.ports[1].protocol, Some(Protocol::Udp));
        assert_eq!(live.ports[2].protocol, None);
    }

    #[test]
    fn test_service_without_spec() {
        let live = LiveService::from(&Service::default());
        assert!(live.ports.is_empty());
        assert_eq!(live.cluster_ip, None);
    }
}
