//! Human readable disruption descriptions
//!
//! Produces sentences such as
//! `Network disruption dropping 50%, corrupting 10% of the traffic going to 10.0.0.1:80`
//! for events and operator-facing output.

use crate::models::{CloudServiceTarget, DisruptionIntent, Flow, HostTarget, ServiceTarget};

/// Describe an intent, or return an empty string when it alters no packet
///
/// Bandwidth limits and jitter alone do not produce a sentence.
pub fn format(intent: &DisruptionIntent) -> String {
    let mut verbs = Vec::new();
    // percentages read "dropping 10% of the traffic", durations do not
    let mut of_word = false;

    if intent.delay != 0 {
        verbs.push(format!("delaying of {}ms", intent.delay));
    }

    if intent.drop != 0 {
        of_word = true;
        verbs.push(format!("dropping {}%", intent.drop));
    }

    if intent.duplicate != 0 {
        of_word = true;
        verbs.push(format!("duplicating {}%", intent.duplicate));
    }

    if intent.corrupt != 0 {
        of_word = true;
        verbs.push(format!("corrupting {}%", intent.corrupt));
    }

    if verbs.is_empty() {
        return String::new();
    }

    let mut description = format!("Network disruption {}", verbs.join(", "));

    if of_word {
        description.push_str(" of");
    }

    description.push_str(" the traffic");

    if intent.delay_jitter != 0 {
        description.push_str(&format!(" with {}ms of delay jitter", intent.delay_jitter));
    }

    let mut clauses: Vec<String> = intent.hosts.iter().map(host_clause).collect();
    clauses.extend(intent.services.iter().map(service_clause));

    if let Some(cloud) = &intent.cloud {
        // AWS, Datadog then GCP
        let entries = [&cloud.aws, &cloud.datadog, &cloud.gcp]
            .into_iter()
            .flatten()
            .flatten();
        clauses.extend(entries.map(cloud_clause));
    }

    if let Some((last, rest)) = clauses.split_last() {
        description.push_str(&rest.join(","));
        if !rest.is_empty() {
            description.push_str(" and");
        }
        description.push_str(last);
    }

    description
}

fn direction(flow: Option<Flow>) -> &'static str {
    match flow {
        Some(Flow::Ingress) => " coming from ",
        _ => " going to ",
    }
}

fn host_clause(host: &HostTarget) -> String {
    let mut clause = format!("{}{}", direction(host.flow), host.host);

    if host.port != 0 {
        clause.push_str(&format!(":{}", host.port));
    }

    if let Some(protocol) = host.protocol {
        clause.push_str(&format!(" with protocol {}", protocol));
    }

    clause
}

fn service_clause(service: &ServiceTarget) -> String {
    let mut clause = format!(" going to {}/{}", service.name, service.namespace);

    if !service.ports.is_empty() {
        let ports: Vec<String> = service.ports.iter().map(ToString::to_string).collect();
        clause.push_str(&format!(" on port(s) {}", ports.join(",")));
    }

    clause
}

fn cloud_clause(service: &CloudServiceTarget) -> String {
    let mut clause = format!("{}{}", direction(service.flow), service.service_name);

    if let Some(protocol) = service.protocol {
        clause.push_str(&format!(" with protocol {}", protocol));
    }

    clause
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CloudTarget, Protocol};

    #[test]
    fn test_delay_to_host() {
        let intent = DisruptionIntent {
            delay: 100,
            hosts: vec![HostTarget {
                flow: Some(Flow::Egress),
                ..HostTarget::new("api.internal")
            }],
            ..Default::default()
        };

        assert_eq!(
            format(&intent),
            "Network disruption delaying of 100ms the traffic going to api.internal"
        );
    }

    #[test]
    fn test_no_verbs_no_sentence() {
        let intent = DisruptionIntent {
            bandwidth_limit: 1000,
            delay_jitter: 5,
            hosts: vec![HostTarget::new("10.0.0.1")],
            ..Default::default()
        };

        assert_eq!(format(&intent), "");
    }

    #[test]
    fn test_percentages_use_of() {
        let intent = DisruptionIntent {
            delay: 10,
            drop: 50,
            corrupt: 5,
            delay_jitter: 3,
            hosts: vec![HostTarget {
                port: 443,
                protocol: Some(Protocol::Tcp),
                flow: Some(Flow::Ingress),
                ..HostTarget::new("10.0.0.0/8")
            }],
            ..Default::default()
        };

        assert_eq!(
            format(&intent),
            "Network disruption delaying of 10ms, dropping 50%, corrupting 5% of the traffic with 3ms of delay jitter coming from 10.0.0.0/8:443 with protocol tcp"
        );
    }

    #[test]
    fn test_multiple_targets_join_with_and() {
        let intent = DisruptionIntent {
            duplicate: 20,
            hosts: vec![HostTarget::new("a.internal"), HostTarget::new("b.internal")],
            services: vec![ServiceTarget::new("orders", "prod")
                .with_port(8080, "http")
                .with_port(9090, "metrics")],
            cloud: Some(CloudTarget {
                gcp: Some(vec![CloudServiceTarget::new("Google")]),
                aws: Some(vec![CloudServiceTarget {
                    protocol: Some(Protocol::Udp),
                    flow: Some(Flow::Ingress),
                    ..CloudServiceTarget::new("S3")
                }]),
                datadog: Some(vec![CloudServiceTarget::new("synthetics")]),
            }),
            ..Default::default()
        };

        assert_eq!(
            format(&intent),
            "Network disruption duplicating 20% of the traffic going to a.internal, going to b.internal, going to orders/prod on port(s) http/8080,metrics/9090, coming from S3 with protocol udp, going to synthetics and going to Google"
        );
    }

    #[test]
    fn test_two_targets() {
        let intent = DisruptionIntent {
            drop: 100,
            services: vec![ServiceTarget::new("orders", "prod"), ServiceTarget::new("cart", "prod")],
            ..Default::default()
        };

        assert_eq!(
            format(&intent),
            "Network disruption dropping 100% of the traffic going to orders/prod and going to cart/prod"
        );
    }

    #[test]
    fn test_without_targets() {
        let intent = DisruptionIntent {
            drop: 1,
            ..Default::default()
        };

        assert_eq!(format(&intent), "Network disruption dropping 1% of the traffic");
    }
}
