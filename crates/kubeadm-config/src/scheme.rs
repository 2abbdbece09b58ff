//! The version registry.
//!
//! A [`Scheme`] knows every schema version a document can be written in and
//! holds, per version, the functions to decode, convert and encode it. It is
//! built once through a [`SchemeBuilder`] and is read-only afterwards, so it can
//! be shared freely between threads. The process-wide registry of all kubeadm
//! master configuration versions is [`SCHEME`].

use std::{
    collections::BTreeMap,
    fmt,
    str::FromStr,
    sync::LazyLock,
};

use snafu::{OptionExt, ResultExt, Snafu, ensure};

use crate::{
    api_version::{ParseSchemaVersionError, SchemaVersion},
    apis::{self, VersionedConfig, VersionedDocument, internal, v1alpha2, v1alpha3},
    convert::ConversionError,
    encode::EncodeError,
    yaml,
};

/// The registry of all supported kubeadm master configuration versions.
pub static SCHEME: LazyLock<Scheme> = LazyLock::new(|| {
    Scheme::builder()
        .register::<internal::MasterConfiguration>()
        .register::<v1alpha2::MasterConfiguration>()
        .register::<v1alpha3::MasterConfiguration>()
        .deprecated(
            apis::V1ALPHA1_API_VERSION,
            "please migrate the document with kubeadm v1.11 before using it with this version",
        )
        .preferred(v1alpha3::API_VERSION)
        .build()
        .expect("the built-in scheme must be valid")
});

#[derive(Debug, PartialEq, Eq, Snafu)]
pub enum BuildError {
    #[snafu(display("failed to parse registered apiVersion {api_version:?}"))]
    ParseApiVersion {
        source: ParseSchemaVersionError,
        api_version: &'static str,
    },

    #[snafu(display("version {schema_version} is registered more than once"))]
    DuplicateVersion { schema_version: SchemaVersion },

    #[snafu(display("version {schema_version} is marked as deprecated but also registered"))]
    DeprecatedRegistered { schema_version: SchemaVersion },

    #[snafu(display("version {schema_version} belongs to a different group than {group}"))]
    GroupMismatch {
        schema_version: SchemaVersion,
        group: String,
    },

    #[snafu(display("no internal version is registered"))]
    MissingInternal,

    #[snafu(display("the preferred version {schema_version} is not registered"))]
    PreferredNotRegistered { schema_version: SchemaVersion },

    #[snafu(display("the preferred version must not be the internal version"))]
    PreferredInternal,

    #[snafu(display("no preferred version is set"))]
    MissingPreferred,
}

/// The conversion edges and codecs of one version, derived from the
/// [`VersionedConfig`] implementation of the registered type.
#[derive(Clone, Copy)]
struct Codec {
    api_version: &'static str,
    kind: &'static str,
    decode: fn(&[u8]) -> Result<VersionedDocument, serde_yaml::Error>,
    to_internal: fn(VersionedDocument) -> Result<internal::MasterConfiguration, VersionedDocument>,
    from_internal: fn(&internal::MasterConfiguration) -> VersionedDocument,
    encode: fn(VersionedDocument, yaml::SerializeOptions) -> Result<String, EncodeError>,
}

impl Codec {
    fn of<T: VersionedConfig>() -> Self {
        Self {
            api_version: T::API_VERSION,
            kind: T::KIND,
            decode: decode::<T>,
            to_internal: to_internal::<T>,
            from_internal: from_internal::<T>,
            encode: encode::<T>,
        }
    }
}

/// A registered version together with its conversion edges and codecs.
#[derive(Clone)]
pub struct Registration {
    schema_version: SchemaVersion,
    codec: Codec,
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("schema_version", &self.schema_version)
            .field("kind", &self.codec.kind)
            .finish_non_exhaustive()
    }
}

impl Registration {
    pub fn schema_version(&self) -> &SchemaVersion {
        &self.schema_version
    }

    pub fn api_version(&self) -> &'static str {
        self.codec.api_version
    }

    pub fn kind(&self) -> &'static str {
        self.codec.kind
    }

    /// Strictly deserializes `raw` into the type registered for this version.
    pub fn decode(&self, raw: &[u8]) -> Result<VersionedDocument, serde_yaml::Error> {
        (self.codec.decode)(raw)
    }

    pub fn to_internal(
        &self,
        document: VersionedDocument,
    ) -> Result<internal::MasterConfiguration, ConversionError> {
        (self.codec.to_internal)(document).map_err(|document| ConversionError::UnexpectedDocument {
            expected: self.codec.api_version,
            found: document.api_version(),
        })
    }

    pub fn from_internal(&self, config: &internal::MasterConfiguration) -> VersionedDocument {
        (self.codec.from_internal)(config)
    }

    pub fn encode(
        &self,
        document: VersionedDocument,
        options: yaml::SerializeOptions,
    ) -> Result<String, EncodeError> {
        (self.codec.encode)(document, options)
    }
}

fn decode<T: VersionedConfig>(raw: &[u8]) -> Result<VersionedDocument, serde_yaml::Error> {
    yaml::from_slice::<T>(raw).map(Into::into)
}

fn to_internal<T: VersionedConfig>(
    document: VersionedDocument,
) -> Result<internal::MasterConfiguration, VersionedDocument> {
    T::try_from(document).map(T::into_internal)
}

fn from_internal<T: VersionedConfig>(config: &internal::MasterConfiguration) -> VersionedDocument {
    T::from_internal(config).into()
}

fn encode<T: VersionedConfig>(
    document: VersionedDocument,
    options: yaml::SerializeOptions,
) -> Result<String, EncodeError> {
    let config = T::try_from(document).map_err(|document| EncodeError::UnexpectedDocument {
        expected: T::API_VERSION,
        found: document.api_version(),
    })?;

    yaml::to_string(&config, options).map_err(|source| EncodeError::Serialize {
        source,
        api_version: T::API_VERSION,
    })
}

/// A read-only registry of schema versions.
#[derive(Debug)]
pub struct Scheme {
    registrations: BTreeMap<SchemaVersion, Registration>,
    deprecated: BTreeMap<SchemaVersion, &'static str>,
    internal: SchemaVersion,
    preferred: SchemaVersion,
}

impl Scheme {
    pub fn builder() -> SchemeBuilder {
        SchemeBuilder::default()
    }

    /// Returns the registration of `schema_version`, if any.
    pub fn lookup(&self, schema_version: &SchemaVersion) -> Option<&Registration> {
        self.registrations.get(schema_version)
    }

    /// Returns the registration whose `apiVersion` is exactly `api_version`.
    pub fn lookup_api_version(&self, api_version: &str) -> Option<&Registration> {
        self.registrations
            .values()
            .find(|registration| registration.codec.api_version == api_version)
    }

    /// Returns the migration hint if `schema_version` was supported in the
    /// past and is rejected now.
    pub fn deprecation_hint(&self, schema_version: &SchemaVersion) -> Option<&'static str> {
        self.deprecated.get(schema_version).copied()
    }

    pub fn internal_version(&self) -> &SchemaVersion {
        &self.internal
    }

    /// The external version documents are rendered in unless asked otherwise.
    pub fn preferred_version(&self) -> &SchemaVersion {
        &self.preferred
    }

    /// Returns all registered versions in ascending order, the internal
    /// version last.
    #[cfg(test)]
    pub fn versions(&self) -> impl Iterator<Item = &SchemaVersion> {
        self.registrations.keys()
    }

    #[cfg(test)]
    pub fn is_registered(&self, schema_version: &SchemaVersion) -> bool {
        self.registrations.contains_key(schema_version)
    }
}

/// Collects the versions of a [`Scheme`].
///
/// Every problem is reported by [`SchemeBuilder::build`], so that a broken
/// registry fails as soon as it is constructed.
#[derive(Default)]
pub struct SchemeBuilder {
    codecs: Vec<Codec>,
    deprecated: Vec<(&'static str, &'static str)>,
    preferred: Option<&'static str>,
}

impl SchemeBuilder {
    /// Registers the version `T` is (de)serialized as.
    pub fn register<T: VersionedConfig>(&mut self) -> &mut Self {
        self.codecs.push(Codec::of::<T>());
        self
    }

    /// Marks `api_version` as a formerly supported version, which is rejected
    /// with `hint` when decoded.
    pub fn deprecated(&mut self, api_version: &'static str, hint: &'static str) -> &mut Self {
        self.deprecated.push((api_version, hint));
        self
    }

    pub fn preferred(&mut self, api_version: &'static str) -> &mut Self {
        self.preferred = Some(api_version);
        self
    }

    pub fn build(&self) -> Result<Scheme, BuildError> {
        let mut registrations = BTreeMap::new();

        for &codec in &self.codecs {
            let schema_version = parse_api_version(codec.api_version)?;

            ensure!(
                !registrations.contains_key(&schema_version),
                DuplicateVersionSnafu { schema_version }
            );

            registrations.insert(
                schema_version.clone(),
                Registration {
                    schema_version,
                    codec,
                },
            );
        }

        let internal = registrations
            .keys()
            .find(|schema_version| schema_version.is_internal())
            .cloned()
            .context(MissingInternalSnafu)?;

        for schema_version in registrations.keys() {
            ensure!(
                schema_version.group == internal.group,
                GroupMismatchSnafu {
                    schema_version: schema_version.clone(),
                    group: internal.group.to_string(),
                }
            );
        }

        let mut deprecated = BTreeMap::new();

        for &(api_version, hint) in &self.deprecated {
            let schema_version = parse_api_version(api_version)?;

            ensure!(
                !registrations.contains_key(&schema_version),
                DeprecatedRegisteredSnafu { schema_version }
            );

            deprecated.insert(schema_version, hint);
        }

        let preferred = parse_api_version(self.preferred.context(MissingPreferredSnafu)?)?;

        ensure!(!preferred.is_internal(), PreferredInternalSnafu);
        ensure!(
            registrations.contains_key(&preferred),
            PreferredNotRegisteredSnafu {
                schema_version: preferred
            }
        );

        Ok(Scheme {
            registrations,
            deprecated,
            internal,
            preferred,
        })
    }
}

fn parse_api_version(api_version: &'static str) -> Result<SchemaVersion, BuildError> {
    SchemaVersion::from_str(api_version).context(ParseApiVersionSnafu { api_version })
}
