//! Host names and `host:port` endpoints, as used for the control plane endpoint
//! and the certificate SANs.

use std::{fmt::Display, net::IpAddr, num::ParseIntError, str::FromStr};

use snafu::{OptionExt, ResultExt, Snafu};

use crate::validation;

#[derive(Debug, PartialEq, Eq, Snafu)]
pub enum HostNameParseError {
    #[snafu(display(
        "the given hostname {hostname:?} is not a valid hostname, which needs to be either a domain name or IP address"
    ))]
    InvalidHostname {
        source: validation::Errors,
        hostname: String,
    },
}

/// A validated host name, either an IP address or a RFC 1123 subdomain.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub enum HostName {
    IpAddress(IpAddr),
    DomainName(String),
}

impl FromStr for HostName {
    type Err = HostNameParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        if let Ok(ip) = value.parse::<IpAddr>() {
            return Ok(Self::IpAddress(ip));
        }

        validation::is_rfc_1123_subdomain(value).context(InvalidHostnameSnafu { hostname: value })?;
        Ok(Self::DomainName(value.to_owned()))
    }
}

impl Display for HostName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::IpAddress(ip) => write!(f, "{ip}"),
            Self::DomainName(domain_name) => f.write_str(domain_name),
        }
    }
}

#[derive(Debug, PartialEq, Eq, Snafu)]
pub enum EndpointParseError {
    #[snafu(display("endpoint must not be empty"))]
    Empty,

    #[snafu(display("IPv6 host in endpoint {endpoint:?} is missing the closing bracket"))]
    UnclosedBracket { endpoint: String },

    #[snafu(display("failed to parse port {port:?}"))]
    ParsePort {
        source: ParseIntError,
        port: String,
    },

    #[snafu(display("port {port} is out of range, must be between 1 and 65535"))]
    PortOutOfRange { port: u16 },

    #[snafu(display("invalid host"))]
    InvalidHost { source: HostNameParseError },
}

/// A `host` or `host:port` endpoint. IPv6 hosts with a port are written in
/// brackets, like `[fd00::1]:6443`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Endpoint {
    pub host: HostName,
    pub port: Option<u16>,
}

impl FromStr for Endpoint {
    type Err = EndpointParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let (host, port) = split_host_port(value)?;
        let host = host.parse().context(InvalidHostSnafu)?;

        Ok(Self { host, port })
    }
}

/// Splits `value` into its host and its optional port, without validating the
/// host.
fn split_host_port(value: &str) -> Result<(&str, Option<u16>), EndpointParseError> {
    if value.is_empty() {
        return EmptySnafu.fail();
    }

    // A bare IPv6 address contains colons but no port
    if value.parse::<IpAddr>().is_ok() {
        return Ok((value, None));
    }

    let (host, port) = match value.strip_prefix('[') {
        Some(rest) => match rest.split_once("]:") {
            Some((host, port)) => (host, Some(port)),
            None => {
                let host = rest
                    .strip_suffix(']')
                    .context(UnclosedBracketSnafu { endpoint: value })?;
                (host, None)
            }
        },
        None => match value.rsplit_once(':') {
            Some((host, port)) => (host, Some(port)),
            None => (value, None),
        },
    };

    let port = port
        .map(|port| port.parse::<u16>().context(ParsePortSnafu { port }))
        .transpose()?;

    if port == Some(0) {
        return PortOutOfRangeSnafu { port: 0u16 }.fail();
    }

    Ok((host, port))
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("cp.example.k8s.io", "cp.example.k8s.io", None)]
    #[case("cp.example.k8s.io:7443", "cp.example.k8s.io", Some(7443))]
    #[case("10.100.0.1:6443", "10.100.0.1", Some(6443))]
    #[case("fd00::1", "fd00::1", None)]
    #[case("[fd00::1]:6443", "fd00::1", Some(6443))]
    #[case("[fd00::1]", "fd00::1", None)]
    fn valid_endpoint(#[case] input: &str, #[case] host: &str, #[case] port: Option<u16>) {
        let endpoint = Endpoint::from_str(input).expect("valid endpoint");
        assert_eq!(endpoint.host.to_string(), host);
        assert_eq!(endpoint.port, port);
    }

    #[rstest]
    #[case("")]
    #[case("cp.example.k8s.io:")]
    #[case("cp.example.k8s.io:port")]
    #[case("cp.example.k8s.io:70000")]
    #[case("cp.example.k8s.io:0")]
    #[case("cp_example:6443")]
    #[case("-cp.example.k8s.io")]
    fn invalid_endpoint(#[case] input: &str) {
        Endpoint::from_str(input).expect_err("invalid endpoint");
    }

    #[rstest]
    #[case("[fd00::1")]
    #[case("[fd00::1:6443")]
    #[case("[cp.example.k8s.io")]
    fn unclosed_bracket(#[case] input: &str) {
        let err = Endpoint::from_str(input).expect_err("the bracket must be closed");
        assert_eq!(
            err,
            EndpointParseError::UnclosedBracket {
                endpoint: input.to_owned()
            }
        );
    }

    #[rstest]
    #[case("10.100.0.1", true)]
    #[case("::1", true)]
    #[case("example.k8s.io", false)]
    fn host_name(#[case] input: &str, #[case] is_ip: bool) {
        let host = HostName::from_str(input).expect("valid host name");
        assert_eq!(matches!(host, HostName::IpAddress(_)), is_ip);
    }
}
