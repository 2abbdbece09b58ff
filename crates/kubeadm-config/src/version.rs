use std::{cmp::Ordering, fmt::Display, num::ParseIntError, str::FromStr, sync::LazyLock};

use regex::Regex;
use snafu::{OptionExt, ResultExt, Snafu};

/// The reserved version name of the canonical, in-memory representation.
pub const INTERNAL_VERSION: &str = "__internal";

static VERSION_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^v(?P<major>\d+)(?P<level>[a-z0-9][a-z0-9-]{0,60}[a-z0-9])?$")
        .expect("failed to compile version regex")
});

static LEVEL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<identifier>[a-z]+)(?P<version>\d+)$").expect("failed to compile level regex")
});

/// Error variants which can be encountered when creating a new [`Level`] from
/// unparsed input.
#[derive(Debug, PartialEq, Eq, Snafu)]
pub enum ParseLevelError {
    #[snafu(display("invalid level format, expected beta<VERSION>/alpha<VERSION>"))]
    InvalidLevelFormat,

    #[snafu(display("failed to parse level version"))]
    ParseLevelVersion { source: ParseIntError },

    #[snafu(display("unknown level identifier {identifier:?}"))]
    UnknownIdentifier { identifier: String },
}

/// Error variants which can be encountered when creating a new [`Version`] or
/// [`VersionName`] from unparsed input.
#[derive(Debug, PartialEq, Eq, Snafu)]
pub enum ParseVersionError {
    #[snafu(display(
        "invalid version format {input:?}, expected v<MAJOR>(alpha<LEVEL>|beta<LEVEL>)"
    ))]
    InvalidFormat { input: String },

    #[snafu(display("failed to parse major version"))]
    ParseMajorVersion { source: ParseIntError },

    #[snafu(display("failed to parse version level"))]
    ParseLevel { source: ParseLevelError },
}

/// A minor API version with the `beta/alpha<VERSION>` format.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
pub enum Level {
    /// Beta-level minor version, `beta<VERSION>`.
    Beta(u64),

    /// Alpha-level minor version, `alpha<VERSION>`.
    Alpha(u64),
}

impl FromStr for Level {
    type Err = ParseLevelError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let captures = LEVEL_REGEX.captures(input).context(InvalidLevelFormatSnafu)?;

        let identifier = captures
            .name("identifier")
            .expect("internal error: check that the correct match label is specified")
            .as_str();

        let version = captures
            .name("version")
            .expect("internal error: check that the correct match label is specified")
            .as_str()
            .parse::<u64>()
            .context(ParseLevelVersionSnafu)?;

        match identifier {
            "alpha" => Ok(Self::Alpha(version)),
            "beta" => Ok(Self::Beta(version)),
            _ => UnknownIdentifierSnafu { identifier }.fail(),
        }
    }
}

impl PartialOrd for Level {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Level {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Beta(lhs), Self::Beta(rhs)) | (Self::Alpha(lhs), Self::Alpha(rhs)) => {
                lhs.cmp(rhs)
            }
            (Self::Beta(_), Self::Alpha(_)) => Ordering::Greater,
            (Self::Alpha(_), Self::Beta(_)) => Ordering::Less,
        }
    }
}

impl Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Beta(beta) => write!(f, "beta{beta}"),
            Self::Alpha(alpha) => write!(f, "alpha{alpha}"),
        }
    }
}

/// A released API version, following the `v<MAJOR>(alpha<LEVEL>|beta<LEVEL>)`
/// format, for example `v1alpha3`.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
pub struct Version {
    pub major: u64,
    pub level: Option<Level>,
}

impl FromStr for Version {
    type Err = ParseVersionError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let captures = VERSION_REGEX
            .captures(input)
            .context(InvalidFormatSnafu { input })?;

        let major = captures
            .name("major")
            .expect("internal error: check that the correct match label is specified")
            .as_str()
            .parse::<u64>()
            .context(ParseMajorVersionSnafu)?;

        let level = captures
            .name("level")
            .map(|level| Level::from_str(level.as_str()))
            .transpose()
            .context(ParseLevelSnafu)?;

        Ok(Self { major, level })
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        match self.major.cmp(&other.major) {
            Ordering::Equal => {}
            ord => return ord,
        }

        match (&self.level, &other.level) {
            (Some(lhs), Some(rhs)) => lhs.cmp(rhs),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
    }
}

impl Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.level {
            Some(level) => write!(f, "v{major}{level}", major = self.major),
            None => write!(f, "v{major}", major = self.major),
        }
    }
}

impl Version {
    pub fn new(major: u64, level: Option<Level>) -> Self {
        Self { major, level }
    }
}

/// The version part of a [`SchemaVersion`](crate::SchemaVersion).
///
/// Besides released versions, every API group has exactly one internal version,
/// which all released versions convert through. The internal version sorts
/// after every released version.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub enum VersionName {
    Release(Version),
    Internal,
}

impl FromStr for VersionName {
    type Err = ParseVersionError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        if input == INTERNAL_VERSION {
            return Ok(Self::Internal);
        }

        Version::from_str(input).map(Self::Release)
    }
}

impl Display for VersionName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Release(version) => version.fmt(f),
            Self::Internal => f.write_str(INTERNAL_VERSION),
        }
    }
}

impl VersionName {
    pub fn is_internal(&self) -> bool {
        matches!(self, Self::Internal)
    }
}
