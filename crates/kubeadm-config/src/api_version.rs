use std::{fmt, ops::Deref, str::FromStr, sync::LazyLock};

use regex::Regex;
use snafu::{ResultExt, Snafu, ensure};

use crate::version::{ParseVersionError, VersionName};

const MAX_GROUP_LENGTH: usize = 253;

static API_GROUP_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:(?:[a-z0-9][a-z0-9-]{0,61}[a-z0-9])\.?)+$")
        .expect("failed to compile API group regex")
});

/// Error variants which can be encountered when creating a new [`Group`] from
/// unparsed input.
#[derive(Debug, PartialEq, Eq, Snafu)]
pub enum ParseGroupError {
    #[snafu(display("group must not be empty"))]
    Empty,

    #[snafu(display("group must not be longer than 253 characters"))]
    TooLong,

    #[snafu(display("group must be a valid DNS subdomain"))]
    InvalidFormat,
}

#[derive(Debug, PartialEq, Eq, Snafu)]
pub enum ParseSchemaVersionError {
    #[snafu(display("schema version {input:?} must be of the form <GROUP>/<VERSION>"))]
    MissingGroup { input: String },

    #[snafu(display("failed to parse group of schema version {input:?}"))]
    ParseGroup {
        source: ParseGroupError,
        input: String,
    },

    #[snafu(display("failed to parse version of schema version {input:?}"))]
    ParseVersion {
        source: ParseVersionError,
        input: String,
    },
}

/// A validated API group, for example `kubeadm.k8s.io`.
///
/// The group string must be non-empty, lower case and a valid DNS subdomain.
#[derive(Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct Group(String);

impl FromStr for Group {
    type Err = ParseGroupError;

    fn from_str(group: &str) -> Result<Self, Self::Err> {
        ensure!(!group.is_empty(), EmptySnafu);
        ensure!(group.len() <= MAX_GROUP_LENGTH, TooLongSnafu);
        ensure!(API_GROUP_REGEX.is_match(group), InvalidFormatSnafu);

        Ok(Self(group.to_owned()))
    }
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self)
    }
}

impl Deref for Group {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Names exactly one supported wire format with the `<GROUP>/<VERSION>` format,
/// for example `kubeadm.k8s.io/v1alpha3` or `kubeadm.k8s.io/__internal`.
///
/// This is the value of the `apiVersion` field of a configuration document.
/// Schema versions order by group first and then by version, with the internal
/// version sorting last.
#[derive(Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct SchemaVersion {
    pub group: Group,
    pub version: VersionName,
}

impl FromStr for SchemaVersion {
    type Err = ParseSchemaVersionError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let Some((group, version)) = input.split_once('/') else {
            return MissingGroupSnafu { input }.fail();
        };

        let group = Group::from_str(group).context(ParseGroupSnafu { input })?;
        let version = VersionName::from_str(version).context(ParseVersionSnafu { input })?;

        Ok(Self { group, version })
    }
}

impl fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.group, self.version)
    }
}

impl SchemaVersion {
    pub fn is_internal(&self) -> bool {
        self.version.is_internal()
    }

    /// Returns the internal schema version of the same group.
    pub fn to_internal(&self) -> Self {
        Self {
            group: self.group.clone(),
            version: VersionName::Internal,
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::version::{Level, Version};

    #[rstest]
    #[case("kubeadm.k8s.io/v1alpha3", VersionName::Release(Version::new(1, Some(Level::Alpha(3)))))]
    #[case("kubeadm.k8s.io/v1beta1", VersionName::Release(Version::new(1, Some(Level::Beta(1)))))]
    #[case("kubeadm.k8s.io/__internal", VersionName::Internal)]
    fn valid_schema_version(#[case] input: &str, #[case] expected: VersionName) {
        let schema_version = SchemaVersion::from_str(input).expect("valid schema version");
        assert_eq!(&*schema_version.group, "kubeadm.k8s.io");
        assert_eq!(schema_version.version, expected);
        assert_eq!(schema_version.to_string(), input);
    }

    #[rstest]
    #[case("v1alpha3")]
    #[case("/v1alpha3")]
    #[case("Kubeadm.k8s.io/v1alpha3")]
    #[case("kubeadm.k8s.io/1alpha3")]
    #[case("kubeadm.k8s.io/")]
    fn invalid_schema_version(#[case] input: &str) {
        SchemaVersion::from_str(input).expect_err("invalid schema version");
    }

    #[test]
    fn missing_group() {
        let err = SchemaVersion::from_str("v1").expect_err("group is required");
        assert_eq!(
            err,
            ParseSchemaVersionError::MissingGroup { input: "v1".into() }
        );
    }

    #[test]
    fn to_internal_keeps_group() {
        let schema_version =
            SchemaVersion::from_str("kubeadm.k8s.io/v1alpha2").expect("valid schema version");
        let internal = schema_version.to_internal();

        assert!(internal.is_internal());
        assert_eq!(internal.group, schema_version.group);
        assert!(schema_version < internal);
    }

    #[test]
    fn group_too_long() {
        let group = format!("{}.io", "a".repeat(MAX_GROUP_LENGTH));
        assert_eq!(Group::from_str(&group), Err(ParseGroupError::TooLong));
    }
}
