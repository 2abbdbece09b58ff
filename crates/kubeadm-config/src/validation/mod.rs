//! Validation of configuration values.
//!
//! The building blocks in this module check single values, like DNS names,
//! CIDRs or paths. The rules for a whole master configuration live in
//! [`master`] and report every violation together with the path of the
//! offending field.

// The DNS checks are adapted from Kubernetes.
// See apimachinery/pkg/util/validation/validation.go in the Kubernetes source

use std::{
    fmt::{Display, Write},
    net::IpAddr,
    sync::LazyLock,
};

use const_format::concatcp;
use regex::Regex;
use snafu::Snafu;

pub mod master;

pub use master::validate;

const RFC_1123_LABEL_FMT: &str = "[a-z0-9]([-a-z0-9]*[a-z0-9])?";

/// This is a subdomain's max length in DNS (RFC 1123)
const RFC_1123_SUBDOMAIN_MAX_LENGTH: usize = 253;
const RFC_1123_SUBDOMAIN_FMT: &str =
    concatcp!(RFC_1123_LABEL_FMT, "(\\.", RFC_1123_LABEL_FMT, ")*");
const RFC_1123_SUBDOMAIN_ERROR_MSG: &str = "a lowercase RFC 1123 subdomain must consist of lower case alphanumeric characters, '-' or '.', and must start and end with an alphanumeric character";

const WILDCARD_DNS_1123_SUBDOMAIN_FMT: &str = concatcp!("\\*\\.", RFC_1123_SUBDOMAIN_FMT);
const WILDCARD_DNS_1123_SUBDOMAIN_ERROR_MSG: &str = "a wildcard DNS-1123 subdomain must start with '*.', followed by a valid DNS subdomain, which must consist of lower case alphanumeric characters, '-' or '.' and end with an alphanumeric character";

const DOMAIN_MAX_LENGTH: usize = RFC_1123_SUBDOMAIN_MAX_LENGTH;
/// Same as [`RFC_1123_SUBDOMAIN_FMT`], but allows a trailing dot
const DOMAIN_FMT: &str = concatcp!(RFC_1123_SUBDOMAIN_FMT, "\\.?");
const DOMAIN_ERROR_MSG: &str = "a domain must consist of lower case alphanumeric characters, '-' or '.', and must start with an alphanumeric character and end with an alphanumeric character or '.'";

// Lazily initialized regular expressions
static DOMAIN_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!("^{DOMAIN_FMT}$")).expect("failed to compile domain regex")
});

static RFC_1123_SUBDOMAIN_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!("^{RFC_1123_SUBDOMAIN_FMT}$"))
        .expect("failed to compile RFC 1123 subdomain regex")
});

static WILDCARD_DNS_1123_SUBDOMAIN_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!("^{WILDCARD_DNS_1123_SUBDOMAIN_FMT}$"))
        .expect("failed to compile wildcard DNS-1123 subdomain regex")
});

type Result<T = (), E = Errors> = std::result::Result<T, E>;

/// A collection of errors discovered during validation of a single value.
#[derive(Debug, PartialEq, Eq)]
pub struct Errors(Vec<Error>);

impl Display for Errors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, error) in self.0.iter().enumerate() {
            let prefix = match i {
                0 => "",
                _ => ", ",
            };
            write!(f, "{prefix}{error}")?;
        }
        Ok(())
    }
}
impl std::error::Error for Errors {}

/// A single validation error.
#[derive(Debug, PartialEq, Eq, Snafu)]
pub enum Error {
    #[snafu(transparent)]
    Regex { source: RegexError },

    #[snafu(display("input is {length} bytes long but must be no more than {max_length}"))]
    TooLong { length: usize, max_length: usize },
}

#[derive(Debug, PartialEq, Eq)]
pub struct RegexError {
    /// The primary error message.
    msg: &'static str,

    /// The regex that the input must match.
    regex: &'static str,

    /// Examples of valid inputs (if non-empty).
    examples: &'static [&'static str],
}

impl Display for RegexError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let Self {
            msg,
            regex,
            examples,
        } = self;
        write!(f, "{msg} (")?;
        if !examples.is_empty() {
            for (i, example) in examples.iter().enumerate() {
                let prefix = match i {
                    0 => "e.g.",
                    _ => "or",
                };
                write!(f, "{prefix} {example:?}, ")?;
            }
        }
        write!(f, "regex used for validation is {regex:?})")
    }
}

impl std::error::Error for RegexError {}

/// Returns [`Ok`] if `value`'s length fits within `max_length`.
fn validate_str_length(value: &str, max_length: usize) -> Result<(), Error> {
    if value.len() > max_length {
        TooLongSnafu {
            length: value.len(),
            max_length,
        }
        .fail()
    } else {
        Ok(())
    }
}

/// Returns [`Ok`] if `value` matches `regex`.
fn validate_str_regex(
    value: &str,
    regex: &'static Regex,
    error_msg: &'static str,
    examples: &'static [&'static str],
) -> Result<(), Error> {
    if regex.is_match(value) {
        Ok(())
    } else {
        Err(RegexError {
            msg: error_msg,
            regex: regex
                .as_str()
                // Clean up start/end-of-line markers
                .trim_start_matches('^')
                .trim_end_matches('$'),
            examples,
        }
        .into())
    }
}

/// Returns [`Ok`] if *all* validations are [`Ok`], otherwise returns all errors.
fn validate_all(validations: impl IntoIterator<Item = Result<(), Error>>) -> Result {
    let errors = validations
        .into_iter()
        .filter_map(std::result::Result::err)
        .collect::<Vec<_>>();
    if errors.is_empty() {
        Ok(())
    } else {
        Err(Errors(errors))
    }
}

pub fn is_domain(value: &str) -> Result {
    validate_all([
        validate_str_length(value, DOMAIN_MAX_LENGTH),
        validate_str_regex(
            value,
            &DOMAIN_REGEX,
            DOMAIN_ERROR_MSG,
            &["cluster.local", "cluster.local."],
        ),
    ])
}

/// Tests for a string that conforms to the definition of a subdomain in DNS (RFC 1123).
pub fn is_rfc_1123_subdomain(value: &str) -> Result {
    validate_all([
        validate_str_length(value, RFC_1123_SUBDOMAIN_MAX_LENGTH),
        validate_str_regex(
            value,
            &RFC_1123_SUBDOMAIN_REGEX,
            RFC_1123_SUBDOMAIN_ERROR_MSG,
            &["example.com"],
        ),
    ])
}

/// Tests for a string that is a subdomain in DNS (RFC 1123) prefixed with a
/// `*.` wildcard label.
pub fn is_wildcard_dns_1123_subdomain(value: &str) -> Result {
    validate_all([
        validate_str_length(value, RFC_1123_SUBDOMAIN_MAX_LENGTH),
        validate_str_regex(
            value,
            &WILDCARD_DNS_1123_SUBDOMAIN_REGEX,
            WILDCARD_DNS_1123_SUBDOMAIN_ERROR_MSG,
            &["*.example.com"],
        ),
    ])
}

#[derive(Debug, PartialEq, Eq, Snafu)]
pub enum CidrError {
    #[snafu(display("CIDR must be of the form <ADDRESS>/<PREFIX LENGTH>"))]
    MissingPrefixLength,

    #[snafu(display("{address:?} is not a valid IP address"))]
    InvalidAddress { address: String },

    #[snafu(display("{prefix_length:?} is not a valid prefix length, must be at most {max}"))]
    InvalidPrefixLength { prefix_length: String, max: u8 },
}

/// Parses a CIDR like `10.96.0.0/12` or `fd00::/108`.
///
/// Like Kubernetes, the address may have bits set outside of the prefix.
pub fn parse_cidr(value: &str) -> Result<(IpAddr, u8), CidrError> {
    let Some((address, prefix_length)) = value.split_once('/') else {
        return MissingPrefixLengthSnafu.fail();
    };

    let Ok(ip) = address.parse::<IpAddr>() else {
        return InvalidAddressSnafu { address }.fail();
    };

    let max = if ip.is_ipv4() { 32 } else { 128 };
    match prefix_length.parse::<u8>() {
        Ok(length) if length <= max && !prefix_length.starts_with('+') => Ok((ip, length)),
        _ => InvalidPrefixLengthSnafu { prefix_length, max }.fail(),
    }
}

/// A path to a field in a configuration, like `etcd.local.serverCertSANs[3]`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FieldPath {
    segments: Vec<Segment>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum Segment {
    Field(String),
    Index(usize),
}

impl Display for FieldPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            match segment {
                Segment::Field(ident) => {
                    if i > 0 {
                        f.write_char('.')?;
                    }
                    f.write_str(ident)?;
                }
                Segment::Index(index) => write!(f, "[{index}]")?,
            }
        }
        Ok(())
    }
}

/// Tracks the field currently being validated.
///
/// Nested fields borrow their parent, so building paths is free until an error
/// is actually reported.
pub struct Validator<'a> {
    segment: Option<SegmentRef<'a>>,
    parent: Option<&'a Self>,
}

#[derive(Clone, Copy)]
enum SegmentRef<'a> {
    Field(&'a str),
    Index(usize),
}

impl Validator<'static> {
    pub fn root() -> Self {
        Self {
            segment: None,
            parent: None,
        }
    }
}

impl Validator<'_> {
    pub fn field<'b>(&'b self, ident: &'b str) -> Validator<'b> {
        Validator {
            segment: Some(SegmentRef::Field(ident)),
            parent: Some(self),
        }
    }

    pub fn index(&self, index: usize) -> Validator<'_> {
        Validator {
            segment: Some(SegmentRef::Index(index)),
            parent: Some(self),
        }
    }

    pub fn path(&self) -> FieldPath {
        let mut segments = Vec::new();
        let mut curr = Some(self);
        while let Some(curr_some) = curr {
            match curr_some.segment {
                Some(SegmentRef::Field(ident)) => segments.push(Segment::Field(ident.to_owned())),
                Some(SegmentRef::Index(index)) => segments.push(Segment::Index(index)),
                None => {}
            }
            curr = curr_some.parent;
        }
        segments.reverse();

        FieldPath { segments }
    }

    pub fn error(&self, problem: ValidationProblem) -> ValidationError {
        ValidationError {
            path: self.path(),
            problem,
        }
    }
}

/// A violation of a validation rule, located at `path`.
#[derive(Debug, PartialEq, Eq, Snafu)]
#[snafu(display("{path}: {problem}"))]
pub struct ValidationError {
    pub path: FieldPath,
    #[snafu(source)]
    pub problem: ValidationProblem,
}

/// What exactly is wrong with a field.
#[derive(Debug, PartialEq, Eq, Snafu)]
pub enum ValidationProblem {
    #[snafu(display("field is required"))]
    FieldRequired,

    #[snafu(display("{value:?} is not a valid IP address"))]
    InvalidIpAddress { value: String },

    #[snafu(display("port {port} is out of range, must be between 1 and 65535"))]
    PortOutOfRange { port: i32 },

    #[snafu(display("{value:?} is not a valid CIDR"))]
    InvalidCidr { source: CidrError, value: String },

    #[snafu(display("{value:?} is invalid"))]
    InvalidName { source: Errors, value: String },

    #[snafu(display("{value:?} is not a valid endpoint"))]
    InvalidEndpoint {
        source: crate::host::EndpointParseError,
        value: String,
    },

    #[snafu(display("{value:?} is neither an IP address nor a valid DNS subdomain"))]
    InvalidSubjectAltName { value: String },

    #[snafu(display("{value:?} must be an absolute path"))]
    NotAbsolutePath { value: String },

    #[snafu(display("{value:?} is neither a semantic version nor a release label"))]
    InvalidKubernetesVersion { value: String },

    #[snafu(display("{value:?} does not match {pattern:?}"))]
    InvalidFormat {
        value: String,
        pattern: &'static str,
    },

    #[snafu(display("{value:?} is not supported, expected one of {supported:?}"))]
    Unsupported {
        value: String,
        supported: &'static [&'static str],
    },

    #[snafu(display("{value} must not be negative"))]
    Negative { value: i32 },

    #[snafu(display("{message}"))]
    Conflict { message: &'static str },
}

/// Every violation found in a configuration.
#[derive(Debug, PartialEq, Eq)]
pub struct ValidationErrors(Vec<ValidationError>);

impl ValidationErrors {
    pub fn iter(&self) -> impl Iterator<Item = &ValidationError> {
        self.0.iter()
    }

}

impl IntoIterator for ValidationErrors {
    type IntoIter = std::vec::IntoIter<ValidationError>;
    type Item = ValidationError;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl Display for ValidationErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, error) in self.0.iter().enumerate() {
            let prefix = match i {
                0 => "",
                _ => ", ",
            };
            write!(f, "{prefix}{error}")?;
        }
        Ok(())
    }
}
impl std::error::Error for ValidationErrors {}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("")]
    #[case("-")]
    #[case("a-")]
    #[case("-a")]
    #[case("_")]
    #[case("a_b")]
    #[case(".")]
    #[case("a.")]
    #[case(".a")]
    #[case("a..b")]
    #[case("a b")]
    #[case("a:b")]
    #[case("A")]
    #[case("EXAMPLE.k8s.io")]
    #[case(&"a".repeat(254))]
    fn is_rfc_1123_subdomain_fail(#[case] value: &str) {
        assert!(is_rfc_1123_subdomain(value).is_err());
    }

    #[rstest]
    #[case("a")]
    #[case("ab")]
    #[case("a-1")]
    #[case("a--1--2--b")]
    #[case("0")]
    #[case("1-a")]
    #[case("a.b.c.d.e")]
    #[case("1.2.3.4.5")]
    #[case("example.k8s.io")]
    #[case("xn--7gq663byk9a.xn--fiqz9s")]
    #[case(&"a".repeat(253))]
    fn is_rfc_1123_subdomain_pass(#[case] value: &str) {
        assert!(is_rfc_1123_subdomain(value).is_ok());
        // Every valid RFC1123 is also a valid domain
        assert!(is_domain(value).is_ok());
    }

    #[rstest]
    #[case("cluster.local")]
    #[case("cluster.local.")]
    fn is_domain_pass(#[case] value: &str) {
        assert!(is_domain(value).is_ok());
    }

    #[rstest]
    #[case("*.example.com", true)]
    #[case("*.k8s.io", true)]
    #[case("*", false)]
    #[case("*.", false)]
    #[case("a.*.example.com", false)]
    fn wildcard_subdomain(#[case] value: &str, #[case] valid: bool) {
        assert_eq!(is_wildcard_dns_1123_subdomain(value).is_ok(), valid);
    }

    #[rstest]
    #[case("10.96.0.0/12", 12)]
    #[case("10.96.0.1/12", 12)]
    #[case("0.0.0.0/0", 0)]
    #[case("fd00::/108", 108)]
    fn valid_cidr(#[case] value: &str, #[case] prefix_length: u8) {
        let (_, length) = parse_cidr(value).expect("valid CIDR");
        assert_eq!(length, prefix_length);
    }

    #[rstest]
    #[case("10.0.1.15", CidrError::MissingPrefixLength)]
    #[case("10.0.1/24", CidrError::InvalidAddress { address: "10.0.1".into() })]
    #[case("10.0.1.0/33", CidrError::InvalidPrefixLength { prefix_length: "33".into(), max: 32 })]
    #[case("fd00::/129", CidrError::InvalidPrefixLength { prefix_length: "129".into(), max: 128 })]
    #[case("10.0.1.0/+8", CidrError::InvalidPrefixLength { prefix_length: "+8".into(), max: 32 })]
    fn invalid_cidr(#[case] value: &str, #[case] expected: CidrError) {
        assert_eq!(parse_cidr(value).expect_err("invalid CIDR"), expected);
    }

    #[test]
    fn field_path() {
        let root = Validator::root();
        let etcd = root.field("etcd");
        let local = etcd.field("local");
        let sans = local.field("serverCertSANs");

        assert_eq!(sans.index(3).path().to_string(), "etcd.local.serverCertSANs[3]");
        assert_eq!(root.path().to_string(), "");

        let tokens = root.field("bootstrapTokens");
        let token = tokens.index(0);
        assert_eq!(
            token.field("groups").index(1).path().to_string(),
            "bootstrapTokens[0].groups[1]"
        );
    }
}
