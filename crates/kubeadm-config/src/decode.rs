//! Turns raw documents into versioned configurations.
//!
//! Decoding happens in two passes. The first pass leniently reads only the
//! `apiVersion` and `kind` of the document to determine which registered
//! version it is written in. The second pass strictly deserializes the whole
//! document into the type of that version, rejecting unknown fields.

use std::str::FromStr;

use serde::Deserialize;
use snafu::{ResultExt, Snafu};
use tracing::debug;

use crate::{
    api_version::{ParseSchemaVersionError, SchemaVersion},
    apis::VersionedDocument,
    scheme::{Registration, Scheme},
    yaml,
};

/// The type information every configuration document carries.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TypeMeta {
    #[serde(default)]
    pub api_version: Option<String>,

    #[serde(default)]
    pub kind: Option<String>,
}

#[derive(Debug, PartialEq, Eq, Snafu)]
pub enum UnsupportedVersionError {
    #[snafu(display("the document declares no apiVersion and no fallback version was given"))]
    MissingApiVersion,

    #[snafu(display("failed to parse apiVersion {api_version:?}"))]
    InvalidApiVersion {
        source: ParseSchemaVersionError,
        api_version: String,
    },

    #[snafu(display("{schema_version} is no longer supported, {hint}"))]
    Deprecated {
        schema_version: SchemaVersion,
        hint: &'static str,
    },

    #[snafu(display("{schema_version} is not a supported version"))]
    NotRegistered { schema_version: SchemaVersion },

    #[snafu(display("kind {kind:?} is not supported by {schema_version}, expected {expected:?}"))]
    UnsupportedKind {
        kind: String,
        schema_version: SchemaVersion,
        expected: &'static str,
    },
}

/// A document could not be deserialized.
///
/// The message of the underlying error contains the path of the offending
/// field, [`DecodeError::location`] the position in the raw document.
#[derive(Debug, Snafu)]
pub enum DecodeError {
    #[snafu(display("failed to read the type information of the document"))]
    ReadTypeMeta { source: serde_yaml::Error },

    #[snafu(display("failed to decode document as {schema_version}"))]
    Deserialize {
        source: serde_yaml::Error,
        schema_version: SchemaVersion,
    },
}

impl DecodeError {
    /// The position in the raw document the error occurred at, if known.
    pub fn location(&self) -> Option<serde_yaml::Location> {
        match self {
            Self::ReadTypeMeta { source } | Self::Deserialize { source, .. } => source.location(),
        }
    }
}

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("unsupported version"))]
    UnsupportedVersion { source: UnsupportedVersionError },

    #[snafu(display("failed to decode document"))]
    Decode { source: DecodeError },
}

/// Reads the `apiVersion` and `kind` of `raw` without looking at any other
/// field.
pub fn read_type_meta(raw: &[u8]) -> Result<TypeMeta, DecodeError> {
    // An empty document deserializes into the unit value, not into a map.
    if raw.iter().all(u8::is_ascii_whitespace) {
        return Ok(TypeMeta::default());
    }

    yaml::from_slice(raw).context(ReadTypeMetaSnafu)
}

/// Determines the registered version a document with `type_meta` is written
/// in.
///
/// The embedded `apiVersion` wins over the `hint`, which is only used for
/// documents that declare no version.
pub fn resolve_version<'a>(
    type_meta: &TypeMeta,
    hint: Option<&SchemaVersion>,
    scheme: &'a Scheme,
) -> Result<&'a Registration, UnsupportedVersionError> {
    let schema_version = match (&type_meta.api_version, hint) {
        (Some(api_version), _) => {
            SchemaVersion::from_str(api_version).context(InvalidApiVersionSnafu { api_version })?
        }
        (None, Some(hint)) => hint.clone(),
        (None, None) => return MissingApiVersionSnafu.fail(),
    };

    if let Some(hint) = scheme.deprecation_hint(&schema_version) {
        return DeprecatedSnafu {
            schema_version,
            hint,
        }
        .fail();
    }

    let Some(registration) = scheme.lookup(&schema_version) else {
        return NotRegisteredSnafu { schema_version }.fail();
    };

    match &type_meta.kind {
        Some(kind) if kind != registration.kind() => UnsupportedKindSnafu {
            kind,
            schema_version,
            expected: registration.kind(),
        }
        .fail(),
        _ => Ok(registration),
    }
}

/// Decodes `raw` into the registered version it is written in, falling back to
/// `hint` for documents without an `apiVersion`.
pub fn decode(
    raw: &[u8],
    hint: Option<&SchemaVersion>,
    scheme: &Scheme,
) -> Result<VersionedDocument, Error> {
    let type_meta = read_type_meta(raw).context(DecodeSnafu)?;
    let registration =
        resolve_version(&type_meta, hint, scheme).context(UnsupportedVersionSnafu)?;

    debug!(
        schema_version = %registration.schema_version(),
        "decoding document"
    );

    registration
        .decode(raw)
        .context(DeserializeSnafu {
            schema_version: registration.schema_version().clone(),
        })
        .context(DecodeSnafu)
}

#[cfg(test)]
mod tests {
    use indoc::indoc;
    use rstest::rstest;

    use super::*;
    use crate::{
        apis::{self, v1alpha2, v1alpha3},
        scheme::SCHEME,
    };

    fn schema_version(api_version: &str) -> SchemaVersion {
        SchemaVersion::from_str(api_version).expect("valid apiVersion")
    }

    #[rstest]
    #[case(indoc! {"
        apiVersion: kubeadm.k8s.io/v1alpha2
        kind: MasterConfiguration
        api:
          advertiseAddress: 192.168.2.2
    "}, None, v1alpha2::API_VERSION)]
    #[case(indoc! {"
        apiVersion: kubeadm.k8s.io/v1alpha3
        kind: MasterConfiguration
        apiEndpoint:
          advertiseAddress: 192.168.2.2
    "}, Some(v1alpha2::API_VERSION), v1alpha3::API_VERSION)]
    #[case(indoc! {"
        apiEndpoint:
          advertiseAddress: 192.168.2.2
    "}, Some(v1alpha3::API_VERSION), v1alpha3::API_VERSION)]
    fn decode_versions(
        #[case] raw: &str,
        #[case] hint: Option<&str>,
        #[case] expected: &str,
    ) {
        let hint = hint.map(schema_version);
        let document = decode(raw.as_bytes(), hint.as_ref(), &SCHEME).expect("document must decode");

        assert_eq!(document.api_version(), expected);
    }

    #[test]
    fn missing_api_version() {
        let err = decode(b"kind: MasterConfiguration\n", None, &SCHEME)
            .expect_err("a version is required");

        assert!(matches!(
            err,
            Error::UnsupportedVersion {
                source: UnsupportedVersionError::MissingApiVersion
            }
        ));
    }

    #[rstest]
    #[case("apiVersion: kubeadm.k8s.io/v1alpha1\nkind: MasterConfiguration\n")]
    #[case("apiVersion: kubeadm.k8s.io/v1beta1\nkind: MasterConfiguration\n")]
    #[case("apiVersion: kubeadm.k8s.io/v1alpha3\nkind: NodeConfiguration\n")]
    #[case("apiVersion: kubeadm\nkind: MasterConfiguration\n")]
    fn unsupported_version(#[case] raw: &str) {
        let err = decode(raw.as_bytes(), None, &SCHEME).expect_err("version is not supported");
        assert!(matches!(err, Error::UnsupportedVersion { .. }));
    }

    #[test]
    fn deprecated_version_hint() {
        let type_meta = TypeMeta {
            api_version: Some(apis::V1ALPHA1_API_VERSION.to_owned()),
            kind: Some(apis::KIND.to_owned()),
        };

        let err = resolve_version(&type_meta, None, &SCHEME).expect_err("v1alpha1 is deprecated");
        assert!(matches!(err, UnsupportedVersionError::Deprecated { .. }));
        assert!(err.to_string().contains("migrate"));
    }

    #[test]
    fn unknown_field_has_location() {
        let raw = indoc! {"
            apiVersion: kubeadm.k8s.io/v1alpha3
            kind: MasterConfiguration
            networking:
              podSubnet: 10.244.0.0/16
              unknownField: true
        "};

        let err = match decode(raw.as_bytes(), None, &SCHEME) {
            Err(Error::Decode { source }) => source,
            other => unreachable!("expected a decode error, got {other:?}"),
        };

        let location = err.location().expect("location must be known");
        assert!(location.line() >= 3, "error must point into the networking section");

        assert!(matches!(err, DecodeError::Deserialize { .. }));
        let source = std::error::Error::source(&err).expect("the parse error must be kept");
        assert!(source.to_string().contains("unknownField"));
    }

    #[test]
    fn malformed_document() {
        let err = decode(b"apiVersion: [\n", None, &SCHEME).expect_err("malformed YAML");
        assert!(matches!(
            err,
            Error::Decode {
                source: DecodeError::ReadTypeMeta { .. }
            }
        ));
    }
}
