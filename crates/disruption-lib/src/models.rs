//! Core data models for network disruption intents
//!
//! These types mirror the operator-facing disruption document. Optional
//! selector fields use `Option` for "unset"; the numeric `0` port keeps its
//! historical meaning of "any port".

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

/// Maximum value of drop, corrupt and duplicate percentages
pub const MAX_PERCENTAGE: u32 = 100;

/// Maximum delay in milliseconds
pub const MAX_DELAY_MS: u32 = 60_000;

/// Maximum delay jitter in milliseconds
pub const MAX_DELAY_JITTER_MS: u32 = 100;

/// Maximum length of an HTTP path filter
pub const MAX_HTTP_PATH_CHARACTERS: usize = 100;

/// HTTP path matching every request
pub const DEFAULT_HTTP_PATH_FILTER: &str = "/";

/// Transport protocol of a host filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Tcp,
    Udp,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Tcp => "tcp",
            Protocol::Udp => "udp",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Protocol {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "tcp" => Ok(Protocol::Tcp),
            "udp" => Ok(Protocol::Udp),
            other => Err(format!("unknown protocol '{}', expected tcp or udp", other)),
        }
    }
}

/// Traffic direction a filter applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Flow {
    /// Outgoing packets
    Egress,
    /// Incoming packets
    Ingress,
}

impl Flow {
    pub fn as_str(&self) -> &'static str {
        match self {
            Flow::Egress => "egress",
            Flow::Ingress => "ingress",
        }
    }
}

impl fmt::Display for Flow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Flow {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "egress" => Ok(Flow::Egress),
            "ingress" => Ok(Flow::Ingress),
            other => Err(format!("unknown flow '{}', expected ingress or egress", other)),
        }
    }
}

/// Connection tracking state a filter applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConnState {
    #[serde(rename = "new")]
    New,
    /// Travels as `est` on the wire
    #[serde(rename = "est", alias = "established")]
    Established,
}

impl ConnState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnState::New => "new",
            ConnState::Established => "est",
        }
    }
}

impl fmt::Display for ConnState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConnState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "new" => Ok(ConnState::New),
            "est" | "established" => Ok(ConnState::Established),
            other => Err(format!("unknown connection state '{}', expected new or est", other)),
        }
    }
}

/// HTTP method filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HttpMethod {
    #[default]
    All,
    Delete,
    Get,
    Head,
    Options,
    Patch,
    Post,
    Put,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::All => "all",
            HttpMethod::Delete => "delete",
            HttpMethod::Get => "get",
            HttpMethod::Head => "head",
            HttpMethod::Options => "options",
            HttpMethod::Patch => "patch",
            HttpMethod::Post => "post",
            HttpMethod::Put => "put",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "all" => Ok(HttpMethod::All),
            "delete" => Ok(HttpMethod::Delete),
            "get" => Ok(HttpMethod::Get),
            "head" => Ok(HttpMethod::Head),
            "options" => Ok(HttpMethod::Options),
            "patch" => Ok(HttpMethod::Patch),
            "post" => Ok(HttpMethod::Post),
            "put" => Ok(HttpMethod::Put),
            other => Err(format!("unknown http method '{}'", other)),
        }
    }
}

/// Cloud providers publishing IP range catalogs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CloudProvider {
    #[serde(rename = "AWS")]
    Aws,
    #[serde(rename = "GCP")]
    Gcp,
    #[serde(rename = "Datadog")]
    Datadog,
}

impl CloudProvider {
    pub const ALL: [CloudProvider; 3] = [CloudProvider::Aws, CloudProvider::Gcp, CloudProvider::Datadog];

    pub fn as_str(&self) -> &'static str {
        match self {
            CloudProvider::Aws => "AWS",
            CloudProvider::Gcp => "GCP",
            CloudProvider::Datadog => "Datadog",
        }
    }
}

impl fmt::Display for CloudProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CloudProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "aws" => Ok(CloudProvider::Aws),
            "gcp" => Ok(CloudProvider::Gcp),
            "datadog" => Ok(CloudProvider::Datadog),
            other => Err(format!("unknown cloud provider '{}', expected aws, gcp or datadog", other)),
        }
    }
}

/// Deserialize an optional token where an empty string means unset
fn empty_as_none<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: fmt::Display,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(token) => token.parse().map(Some).map_err(serde::de::Error::custom),
    }
}

fn is_zero_port(port: &u16) -> bool {
    *port == 0
}

/// A single host filter
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostTarget {
    /// Literal address, CIDR prefix or resolvable name
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub host: String,
    /// 0 means any port
    #[serde(default, skip_serializing_if = "is_zero_port")]
    pub port: u16,
    #[serde(default, deserialize_with = "empty_as_none", skip_serializing_if = "Option::is_none")]
    pub protocol: Option<Protocol>,
    #[serde(default, deserialize_with = "empty_as_none", skip_serializing_if = "Option::is_none")]
    pub flow: Option<Flow>,
    #[serde(default, deserialize_with = "empty_as_none", skip_serializing_if = "Option::is_none")]
    pub conn_state: Option<ConnState>,
}

impl HostTarget {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            ..Default::default()
        }
    }

    /// A flow direction alone does not select any traffic
    pub fn is_selectable(&self) -> bool {
        self.flow.is_none() || !self.host.is_empty() || self.port != 0
    }
}

/// A port requested on a Kubernetes Service, addressable by number or name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServicePortTarget {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "is_zero_port")]
    pub port: u16,
}

impl ServicePortTarget {
    pub fn new(port: u16, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            port,
        }
    }
}

impl fmt::Display for ServicePortTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.name, self.port)
    }
}

/// Reference to a Kubernetes Service
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceTarget {
    pub name: String,
    pub namespace: String,
    /// Empty means every port of the Service
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<ServicePortTarget>,
}

impl ServiceTarget {
    pub fn new(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            ports: Vec::new(),
        }
    }

    pub fn with_port(mut self, port: u16, name: impl Into<String>) -> Self {
        self.ports.push(ServicePortTarget::new(port, name));
        self
    }
}

/// A logical cloud service, expanded through the provider's IP range catalog
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloudServiceTarget {
    #[serde(rename = "service")]
    pub service_name: String,
    #[serde(default, deserialize_with = "empty_as_none", skip_serializing_if = "Option::is_none")]
    pub protocol: Option<Protocol>,
    #[serde(default, deserialize_with = "empty_as_none", skip_serializing_if = "Option::is_none")]
    pub flow: Option<Flow>,
    #[serde(default, deserialize_with = "empty_as_none", skip_serializing_if = "Option::is_none")]
    pub conn_state: Option<ConnState>,
}

impl CloudServiceTarget {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            ..Default::default()
        }
    }

    /// Host filter carrying this entry's selectors for the given host
    pub fn to_host(&self, host: impl Into<String>) -> HostTarget {
        HostTarget {
            host: host.into(),
            port: 0,
            protocol: self.protocol,
            flow: self.flow,
            conn_state: self.conn_state,
        }
    }
}

/// Cloud provider service lists
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloudTarget {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aws: Option<Vec<CloudServiceTarget>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gcp: Option<Vec<CloudServiceTarget>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datadog: Option<Vec<CloudServiceTarget>>,
}

impl CloudTarget {
    pub fn list(&self, provider: CloudProvider) -> Option<&[CloudServiceTarget]> {
        match provider {
            CloudProvider::Aws => self.aws.as_deref(),
            CloudProvider::Gcp => self.gcp.as_deref(),
            CloudProvider::Datadog => self.datadog.as_deref(),
        }
    }

    /// Provider lists that are present, in AWS, GCP, Datadog order
    pub fn provider_lists(&self) -> Vec<(CloudProvider, &[CloudServiceTarget])> {
        CloudProvider::ALL
            .into_iter()
            .filter_map(|provider| self.list(provider).map(|list| (provider, list)))
            .collect()
    }

    pub fn has_any_list(&self) -> bool {
        self.provider_lists().iter().any(|(_, list)| !list.is_empty())
    }
}

/// HTTP method and path filters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpFilters {
    #[serde(default, deserialize_with = "empty_as_none", skip_serializing_if = "Option::is_none")]
    pub method: Option<HttpMethod>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

/// Root disruption intent
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisruptionIntent {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hosts: Vec<HostTarget>,
    /// Excluded from disruption even when otherwise matched
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allowed_hosts: Vec<HostTarget>,
    #[serde(default)]
    pub disable_default_allowed_hosts: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub services: Vec<ServiceTarget>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cloud: Option<CloudTarget>,
    #[serde(default)]
    pub drop: u32,
    #[serde(default)]
    pub duplicate: u32,
    #[serde(default)]
    pub corrupt: u32,
    /// Milliseconds
    #[serde(default)]
    pub delay: u32,
    /// Milliseconds
    #[serde(default)]
    pub delay_jitter: u32,
    #[serde(default)]
    pub bandwidth_limit: u64,
    #[serde(rename = "port", default, skip_serializing_if = "Option::is_none")]
    pub deprecated_port: Option<u16>,
    #[serde(
        rename = "flow",
        default,
        deserialize_with = "empty_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub deprecated_flow: Option<Flow>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http: Option<HttpFilters>,
}

impl DisruptionIntent {
    /// True when at least one degradation parameter has an effect
    pub fn has_effect(&self) -> bool {
        self.bandwidth_limit != 0
            || self.drop != 0
            || self.delay != 0
            || self.corrupt != 0
            || self.duplicate != 0
    }

    /// True when a method other than ALL or a path other than `/` is requested
    pub fn has_http_filters(&self) -> bool {
        match &self.http {
            Some(http) => {
                http.method.unwrap_or_default() != HttpMethod::All
                    || http.path.as_deref().unwrap_or(DEFAULT_HTTP_PATH_FILTER)
                        != DEFAULT_HTTP_PATH_FILTER
            }
            None => false,
        }
    }

    /// Load an intent from a JSON document
    pub fn from_json(document: &str) -> serde_json::Result<Self> {
        serde_json::from_str(document)
    }
}
