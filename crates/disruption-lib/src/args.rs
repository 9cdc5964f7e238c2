//! Injector argument protocol
//!
//! The injector receives a flat argument vector:
//!
//! ```text
//! network-disruption --corrupt N --drop N --duplicate N --delay N --delay-jitter N
//!     --bandwidth-limit N [--hosts H]* [--allowed-hosts H]* [--services S]*
//!     [--path P] [--method M]
//! ```
//!
//! where a host value is `<host>;<port>;<protocol>;<flow>;<connState>` (always
//! five fields) and a service value is `<name>;<namespace>[;<port>-<name>]*`.
//! Field order and delimiters are a contract with the injector and must not be
//! derived from the in-memory model.

use crate::error::ProtocolError;
use crate::models::{
    DisruptionIntent, HostTarget, HttpFilters, HttpMethod, ServicePortTarget, ServiceTarget,
};
use std::str::FromStr;

/// Leading token of every network disruption invocation
pub const DISRUPTION_KIND: &str = "network-disruption";

const FIELD_SEPARATOR: char = ';';
const SERVICE_PORT_SEPARATOR: char = '-';
const HOST_FIELDS: usize = 5;

pub const FLAG_CORRUPT: &str = "--corrupt";
pub const FLAG_DROP: &str = "--drop";
pub const FLAG_DUPLICATE: &str = "--duplicate";
pub const FLAG_DELAY: &str = "--delay";
pub const FLAG_DELAY_JITTER: &str = "--delay-jitter";
pub const FLAG_BANDWIDTH_LIMIT: &str = "--bandwidth-limit";
pub const FLAG_HOSTS: &str = "--hosts";
pub const FLAG_ALLOWED_HOSTS: &str = "--allowed-hosts";
pub const FLAG_SERVICES: &str = "--services";
pub const FLAG_PATH: &str = "--path";
pub const FLAG_METHOD: &str = "--method";

/// Compile a resolved intent into the injector argument vector
///
/// Cloud targets have no wire form: run [`crate::resolver::resolve_intent`]
/// first. Values carrying the field separator are rejected rather than
/// encoded into something the injector cannot decode.
pub fn compile(intent: &DisruptionIntent) -> Result<Vec<String>, ProtocolError> {
    if intent.cloud.as_ref().is_some_and(|cloud| cloud.has_any_list()) {
        return Err(ProtocolError::UnresolvedCloudTargets);
    }

    if let Some((field, value)) = reserved_separator_fields(intent).into_iter().next() {
        return Err(ProtocolError::ReservedSeparator { field, value });
    }

    let mut args = vec![
        DISRUPTION_KIND.to_string(),
        FLAG_CORRUPT.to_string(),
        intent.corrupt.to_string(),
        FLAG_DROP.to_string(),
        intent.drop.to_string(),
        FLAG_DUPLICATE.to_string(),
        intent.duplicate.to_string(),
        FLAG_DELAY.to_string(),
        intent.delay.to_string(),
        FLAG_DELAY_JITTER.to_string(),
        intent.delay_jitter.to_string(),
        FLAG_BANDWIDTH_LIMIT.to_string(),
        intent.bandwidth_limit.to_string(),
    ];

    for host in &intent.hosts {
        args.push(FLAG_HOSTS.to_string());
        args.push(encode_host(host));
    }

    for host in &intent.allowed_hosts {
        args.push(FLAG_ALLOWED_HOSTS.to_string());
        args.push(encode_host(host));
    }

    for service in &intent.services {
        args.push(FLAG_SERVICES.to_string());
        args.push(encode_service(service));
    }

    if let Some(http) = &intent.http {
        if let Some(path) = http.path.as_deref().filter(|p| !p.is_empty()) {
            args.push(FLAG_PATH.to_string());
            args.push(path.to_string());
        }

        if let Some(method) = http.method {
            args.push(FLAG_METHOD.to_string());
            args.push(method.to_string());
        }
    }

    Ok(args)
}

/// Target fields whose value contains the `;` field separator
pub fn reserved_separator_fields(intent: &DisruptionIntent) -> Vec<(&'static str, String)> {
    let mut fields = Vec::new();
    let mut check = |field: &'static str, value: &str| {
        if value.contains(FIELD_SEPARATOR) {
            fields.push((field, value.to_string()));
        }
    };

    for host in &intent.hosts {
        check("host", &host.host);
    }
    for host in &intent.allowed_hosts {
        check("allowed host", &host.host);
    }
    for service in &intent.services {
        check("service name", &service.name);
        check("service namespace", &service.namespace);
        for port in &service.ports {
            check("service port name", &port.name);
        }
    }

    fields
}

/// Encode a host as `<host>;<port>;<protocol>;<flow>;<connState>`
pub fn encode_host(host: &HostTarget) -> String {
    format!(
        "{};{};{};{};{}",
        host.host,
        host.port,
        host.protocol.map(|p| p.as_str()).unwrap_or_default(),
        host.flow.map(|f| f.as_str()).unwrap_or_default(),
        host.conn_state.map(|c| c.as_str()).unwrap_or_default(),
    )
}

/// Decode a single `<host>;<port>;<protocol>;<flow>;<connState>` value
///
/// Trailing fields may be omitted; an empty segment means unset.
pub fn decode_host(value: &str) -> Result<HostTarget, ProtocolError> {
    let fields: Vec<&str> = value.splitn(HOST_FIELDS, FIELD_SEPARATOR).collect();
    let field = |index: usize| fields.get(index).copied().filter(|f| !f.is_empty());

    let port = match field(1) {
        Some(raw) => raw.parse::<u16>().map_err(|source| ProtocolError::HostPort {
            value: value.to_string(),
            source,
        })?,
        None => 0,
    };

    Ok(HostTarget {
        host: fields[0].to_string(),
        port,
        protocol: parse_token(field(2), "protocol", value)?,
        flow: parse_token(field(3), "flow", value)?,
        conn_state: parse_token(field(4), "connection state", value)?,
    })
}

fn parse_token<T: FromStr>(
    raw: Option<&str>,
    field: &'static str,
    value: &str,
) -> Result<Option<T>, ProtocolError> {
    raw.map(|token| {
        token.parse().map_err(|_| ProtocolError::InvalidToken {
            field,
            token: token.to_string(),
            value: value.to_string(),
        })
    })
    .transpose()
}

/// Encode a service as `<name>;<namespace>` followed by `;<port>-<name>` segments
pub fn encode_service(service: &ServiceTarget) -> String {
    let mut encoded = format!("{};{}", service.name, service.namespace);
    for port in &service.ports {
        encoded.push_str(&format!(";{}-{}", port.port, port.name));
    }
    encoded
}

/// Decode a single `<name>;<namespace>[;<port>-<name>]*` value
pub fn decode_service(value: &str) -> Result<ServiceTarget, ProtocolError> {
    let fields: Vec<&str> = value.split(FIELD_SEPARATOR).collect();
    if fields.len() < 2 {
        return Err(ProtocolError::ServiceFormat(value.to_string()));
    }

    let ports = fields[2..]
        .iter()
        .map(|segment| {
            let (number, name) = segment
                .split_once(SERVICE_PORT_SEPARATOR)
                .ok_or_else(|| ProtocolError::ServicePortFormat(segment.to_string()))?;
            let port = number
                .parse::<u16>()
                .map_err(|_| ProtocolError::ServicePortNumber(segment.to_string()))?;
            Ok(ServicePortTarget::new(port, name))
        })
        .collect::<Result<Vec<_>, ProtocolError>>()?;

    Ok(ServiceTarget {
        name: fields[0].to_string(),
        namespace: fields[1].to_string(),
        ports,
    })
}

/// Parse every `--hosts`/`--allowed-hosts` value, aborting on the first malformed one
pub fn parse_hosts<S: AsRef<str>>(values: &[S]) -> Result<Vec<HostTarget>, ProtocolError> {
    values.iter().map(|v| decode_host(v.as_ref())).collect()
}

/// Parse every `--services` value, aborting on the first malformed one
pub fn parse_services<S: AsRef<str>>(values: &[S]) -> Result<Vec<ServiceTarget>, ProtocolError> {
    values.iter().map(|v| decode_service(v.as_ref())).collect()
}

/// Decoded injector invocation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InjectorArgs {
    pub corrupt: u32,
    pub drop: u32,
    pub duplicate: u32,
    pub delay: u32,
    pub delay_jitter: u32,
    pub bandwidth_limit: u64,
    pub hosts: Vec<HostTarget>,
    pub allowed_hosts: Vec<HostTarget>,
    pub services: Vec<ServiceTarget>,
    pub path: Option<String>,
    pub method: Option<HttpMethod>,
}

impl InjectorArgs {
    /// Parse a full argument vector, starting with the disruption kind token
    ///
    /// Flags accept both `--flag value` and `--flag=value`.
    pub fn parse<I, S>(args: I) -> Result<Self, ProtocolError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let args: Vec<String> = args.into_iter().map(|a| a.as_ref().to_string()).collect();
        let mut iter = args.iter();

        match iter.next() {
            Some(kind) if kind == DISRUPTION_KIND => {}
            other => {
                return Err(ProtocolError::UnexpectedKind {
                    expected: DISRUPTION_KIND,
                    found: other.cloned().unwrap_or_default(),
                })
            }
        }

        let mut parsed = InjectorArgs::default();
        let mut hosts = Vec::new();
        let mut allowed_hosts = Vec::new();
        let mut services = Vec::new();

        while let Some(arg) = iter.next() {
            let (flag, inline) = match arg.split_once('=') {
                Some((flag, value)) if flag.starts_with("--") => (flag, Some(value.to_string())),
                _ => (arg.as_str(), None),
            };

            let value = match inline {
                Some(value) => value,
                None => iter
                    .next()
                    .cloned()
                    .ok_or_else(|| ProtocolError::MissingValue(flag.to_string()))?,
            };

            match flag {
                FLAG_CORRUPT => parsed.corrupt = parse_value(flag, &value)?,
                FLAG_DROP => parsed.drop = parse_value(flag, &value)?,
                FLAG_DUPLICATE => parsed.duplicate = parse_value(flag, &value)?,
                FLAG_DELAY => parsed.delay = parse_value(flag, &value)?,
                FLAG_DELAY_JITTER => parsed.delay_jitter = parse_value(flag, &value)?,
                FLAG_BANDWIDTH_LIMIT => parsed.bandwidth_limit = parse_value(flag, &value)?,
                FLAG_HOSTS => hosts.push(value),
                FLAG_ALLOWED_HOSTS => allowed_hosts.push(value),
                FLAG_SERVICES => services.push(value),
                FLAG_PATH => parsed.path = Some(value),
                FLAG_METHOD => parsed.method = Some(parse_value(flag, &value)?),
                other => return Err(ProtocolError::UnknownFlag(other.to_string())),
            }
        }

        parsed.hosts = parse_hosts(&hosts)?;
        parsed.allowed_hosts = parse_hosts(&allowed_hosts)?;
        parsed.services = parse_services(&services)?;

        Ok(parsed)
    }

    /// The subset of the intent the injector needs
    pub fn into_intent(self) -> DisruptionIntent {
        let http = if self.path.is_some() || self.method.is_some() {
            Some(HttpFilters {
                method: self.method,
                path: self.path,
            })
        } else {
            None
        };

        DisruptionIntent {
            hosts: self.hosts,
            allowed_hosts: self.allowed_hosts,
            services: self.services,
            drop: self.drop,
            duplicate: self.duplicate,
            corrupt: self.corrupt,
            delay: self.delay,
            delay_jitter: self.delay_jitter,
            bandwidth_limit: self.bandwidth_limit,
            http,
            ..Default::default()
        }
    }
}

fn parse_value<T: FromStr>(flag: &str, value: &str) -> Result<T, ProtocolError> {
    value.parse().map_err(|_| ProtocolError::InvalidValue {
        flag: flag.to_string(),
        value: value.to_string(),
    })
}
