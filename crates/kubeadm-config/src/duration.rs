//! This module contains a [`Duration`] type which parses and prints durations
//! in the format used throughout Kubernetes configuration files, like `24h0m0s`,
//! `1.5h`, `90s` or `500ms`.
//!
//! The accepted grammar is the one of Go's `time.ParseDuration`: a sequence of
//! decimal numbers, each with an optional fraction and a unit, in any order.
//! Negative durations are rejected. Printing always produces the canonical
//! form, so `1h30m` is printed as `1h30m0s`.

use std::{fmt::Display, num::ParseIntError, ops::Deref, str::FromStr};

use serde::{Deserialize, Serialize, de::Visitor};
use snafu::{OptionExt, ResultExt, Snafu, ensure};

#[derive(Debug, Snafu, PartialEq, Eq)]
#[snafu(module)]
pub enum DurationParseError {
    #[snafu(display("invalid input, the duration is empty"))]
    InvalidInput,

    #[snafu(display("negative durations are not supported"))]
    Negative,

    #[snafu(display("unexpected character {chr:?}"))]
    UnexpectedCharacter { chr: char },

    #[snafu(display("fragment with value {value:?} has no unit"))]
    NoUnit { value: String },

    #[snafu(display("failed to parse fragment unit {unit:?}"))]
    ParseUnit { unit: String },

    #[snafu(display("failed to parse fragment value as integer"))]
    ParseInt { source: ParseIntError },

    #[snafu(display("duration overflows the supported range"))]
    Overflow,
}

/// Units supported by [`Duration`], ordered from largest to smallest.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, strum::Display, strum::EnumString)]
pub enum DurationUnit {
    #[strum(serialize = "h")]
    Hours,

    #[strum(serialize = "m")]
    Minutes,

    #[strum(serialize = "s")]
    Seconds,

    #[strum(serialize = "ms")]
    Milliseconds,

    // Both the micro sign and the greek small letter mu are accepted
    #[strum(to_string = "µs", serialize = "us", serialize = "\u{3bc}s")]
    Microseconds,

    #[strum(serialize = "ns")]
    Nanoseconds,
}

impl DurationUnit {
    const fn nanos(self) -> u64 {
        match self {
            Self::Hours => 60 * 60 * 1_000_000_000,
            Self::Minutes => 60 * 1_000_000_000,
            Self::Seconds => 1_000_000_000,
            Self::Milliseconds => 1_000_000,
            Self::Microseconds => 1_000,
            Self::Nanoseconds => 1,
        }
    }
}

/// Digits of a fraction beyond this can not change the result by a full
/// nanosecond.
const MAX_FRACTION_DIGITS: usize = 18;

#[derive(Clone, Copy, Debug, Default, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct Duration(std::time::Duration);

impl FromStr for Duration {
    type Err = DurationParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        use duration_parse_error::{
            InvalidInputSnafu, NegativeSnafu, NoUnitSnafu, OverflowSnafu, ParseUnitSnafu,
            UnexpectedCharacterSnafu,
        };

        let input = s.trim();
        ensure!(!input.starts_with('-'), NegativeSnafu);
        let input = input.strip_prefix('+').unwrap_or(input);
        ensure!(!input.is_empty(), InvalidInputSnafu);

        // Kubernetes accepts a plain zero without a unit
        if input == "0" {
            return Ok(Self::default());
        }

        let mut rest = input;
        let mut nanos: u64 = 0;

        while !rest.is_empty() {
            let (whole, remainder) = split_while(rest, |c| c.is_ascii_digit());
            let (fraction, remainder) = match remainder.strip_prefix('.') {
                Some(remainder) => split_while(remainder, |c| c.is_ascii_digit()),
                None => ("", remainder),
            };

            if whole.is_empty() && fraction.is_empty() {
                let chr = rest.chars().next().context(InvalidInputSnafu)?;
                return UnexpectedCharacterSnafu { chr }.fail();
            }

            let (unit, remainder) = split_while(remainder, |c| c != '.' && !c.is_ascii_digit());
            if unit.is_empty() {
                let value = &rest[..rest.len() - remainder.len()];
                return NoUnitSnafu { value }.fail();
            }
            let unit = unit
                .parse::<DurationUnit>()
                .ok()
                .context(ParseUnitSnafu { unit })?;

            let fragment = fragment_nanos(whole, fraction, unit)?;
            nanos = nanos.checked_add(fragment).context(OverflowSnafu)?;
            rest = remainder;
        }

        Ok(Self(std::time::Duration::from_nanos(nanos)))
    }
}

/// Splits `input` at the first character not matching `f`.
fn split_while(input: &str, f: impl Fn(char) -> bool) -> (&str, &str) {
    let at = input.find(|c| !f(c)).unwrap_or(input.len());
    input.split_at(at)
}

fn fragment_nanos(
    whole: &str,
    fraction: &str,
    unit: DurationUnit,
) -> Result<u64, DurationParseError> {
    use duration_parse_error::{OverflowSnafu, ParseIntSnafu};

    let whole = if whole.is_empty() {
        0
    } else {
        whole.parse::<u64>().context(ParseIntSnafu)?
    };
    let mut nanos = whole.checked_mul(unit.nanos()).context(OverflowSnafu)?;

    let fraction = &fraction[..fraction.len().min(MAX_FRACTION_DIGITS)];
    if !fraction.is_empty() {
        let scale = 10_u128.pow(fraction.len() as u32);
        let value = u128::from(fraction.parse::<u64>().context(ParseIntSnafu)?);
        let fraction_nanos = u64::try_from(value * u128::from(unit.nanos()) / scale)
            .ok()
            .context(OverflowSnafu)?;
        nanos = nanos.checked_add(fraction_nanos).context(OverflowSnafu)?;
    }

    Ok(nanos)
}

impl Display for Duration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let nanos = self.0.as_nanos();

        if nanos == 0 {
            return f.write_str("0s");
        }

        // Durations below one second use the largest unit that keeps them above one
        if nanos < 1_000 {
            return write!(f, "{nanos}ns");
        }
        if nanos < 1_000_000 {
            write_decimal(f, nanos / 1_000, nanos % 1_000, 3)?;
            return f.write_str("µs");
        }
        if nanos < 1_000_000_000 {
            write_decimal(f, nanos / 1_000_000, nanos % 1_000_000, 6)?;
            return f.write_str("ms");
        }

        let seconds_total = nanos / 1_000_000_000;
        let hours = seconds_total / 3600;
        let minutes = seconds_total / 60 % 60;

        if hours > 0 {
            write!(f, "{hours}h")?;
        }

        if hours > 0 || minutes > 0 {
            write!(f, "{minutes}m")?;
        }

        write_decimal(f, seconds_total % 60, nanos % 1_000_000_000, 9)?;
        f.write_str("s")
    }
}

/// Writes `whole.fraction`, with the fraction zero-padded to `digits` and
/// trailing zeros removed.
fn write_decimal(
    f: &mut std::fmt::Formatter<'_>,
    whole: u128,
    fraction: u128,
    digits: usize,
) -> std::fmt::Result {
    if fraction == 0 {
        return write!(f, "{whole}");
    }

    let fraction = format!("{fraction:0digits$}");
    write!(f, "{whole}.{}", fraction.trim_end_matches('0'))
}

impl Deref for Duration {
    type Target = std::time::Duration;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<std::time::Duration> for Duration {
    fn from(value: std::time::Duration) -> Self {
        Self(value)
    }
}

impl Duration {
    pub const fn from_hours(hours: u64) -> Self {
        Self(std::time::Duration::from_secs(hours * 60 * 60))
    }
}

impl<'de> Deserialize<'de> for Duration {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct DurationVisitor;

        impl Visitor<'_> for DurationVisitor {
            type Value = Duration;

            fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
                formatter.write_str("a string in any of the supported formats")
            }

            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                v.parse().map_err(serde::de::Error::custom)
            }
        }

        deserializer.deserialize_str(DurationVisitor)
    }
}

impl Serialize for Duration {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    const SECOND: u64 = 1_000_000_000;

    #[rstest]
    #[case("24h0m0s", 24 * 60 * 60 * SECOND)]
    #[case("24h", 24 * 60 * 60 * SECOND)]
    #[case("1h30m", 90 * 60 * SECOND)]
    #[case("90s", 90 * SECOND)]
    #[case("1s500ms", 1500 * 1_000_000)]
    #[case("0", 0)]
    #[case("+5s", 5 * SECOND)]
    #[case("30m1h", 90 * 60 * SECOND)]
    fn parse(#[case] input: &str, #[case] nanos: u64) {
        let duration: Duration = input.parse().expect("valid duration");
        assert_eq!(duration.as_nanos(), u128::from(nanos));
    }

    #[rstest]
    #[case::hours("1.5h", 90 * 60 * SECOND)]
    #[case::leading_dot(".5s", SECOND / 2)]
    #[case::trailing_dot("1.s", SECOND)]
    #[case::milliseconds("2.25ms", 2_250_000)]
    #[case::truncated("1.0000000001s", SECOND)]
    fn parse_fraction(#[case] input: &str, #[case] nanos: u64) {
        let duration: Duration = input.parse().expect("valid duration");
        assert_eq!(duration.as_nanos(), u128::from(nanos));
    }

    #[rstest]
    #[case::nanoseconds("10ns", 10)]
    #[case::microseconds("10us", 10_000)]
    #[case::micro_sign("10\u{b5}s", 10_000)]
    #[case::greek_mu("10\u{3bc}s", 10_000)]
    fn parse_small_units(#[case] input: &str, #[case] nanos: u64) {
        let duration: Duration = input.parse().expect("valid duration");
        assert_eq!(duration.as_nanos(), u128::from(nanos));
    }

    #[rstest]
    #[case("", DurationParseError::InvalidInput)]
    #[case("+", DurationParseError::InvalidInput)]
    #[case("-1h", DurationParseError::Negative)]
    #[case("10", DurationParseError::NoUnit { value: "10".into() })]
    #[case("1.5", DurationParseError::NoUnit { value: "1.5".into() })]
    #[case("1d", DurationParseError::ParseUnit { unit: "d".into() })]
    #[case("1h-", DurationParseError::ParseUnit { unit: "h-".into() })]
    #[case(".s", DurationParseError::UnexpectedCharacter { chr: '.' })]
    #[case("h", DurationParseError::UnexpectedCharacter { chr: 'h' })]
    #[case("9999999999999h", DurationParseError::Overflow)]
    fn parse_invalid(#[case] input: &str, #[case] expected: DurationParseError) {
        let err = input.parse::<Duration>().expect_err("invalid duration");
        assert_eq!(err, expected);
    }

    #[rstest]
    #[case("24h", "24h0m0s")]
    #[case("1h30m", "1h30m0s")]
    #[case("1.5h", "1h30m0s")]
    #[case("90s", "1m30s")]
    #[case("45s", "45s")]
    #[case("1s500ms", "1.5s")]
    #[case("250ms", "250ms")]
    #[case("1.5ms", "1.5ms")]
    #[case("10us", "10\u{b5}s")]
    #[case("7ns", "7ns")]
    #[case("0", "0s")]
    fn display(#[case] input: &str, #[case] expected: &str) {
        let duration: Duration = input.parse().expect("valid duration");
        assert_eq!(duration.to_string(), expected);
    }

    #[test]
    fn serde_roundtrip() {
        let duration: Duration = serde_yaml::from_str("24h0m0s").expect("valid duration");
        assert_eq!(duration, Duration::from_hours(24));
        assert_eq!(
            serde_yaml::to_string(&duration).expect("duration must serialize"),
            "24h0m0s\n"
        );
    }
}
