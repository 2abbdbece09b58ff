//! The kubeadm master configuration API in all its supported versions.
//!
//! Versions never convert into each other directly. Each released version only
//! knows how to convert to and from the [`internal`] representation, which makes
//! the conversion graph a star with the internal version at its center.

use serde::{Serialize, de::DeserializeOwned};

pub mod core_v1;
pub mod internal;
pub mod v1alpha2;
pub mod v1alpha3;

/// The API group of every kubeadm configuration document.
pub const GROUP_NAME: &str = "kubeadm.k8s.io";

/// The kind of every document handled by this crate.
pub const KIND: &str = "MasterConfiguration";

pub const INTERNAL_API_VERSION: &str = const_format::concatcp!(GROUP_NAME, "/__internal");

/// Versions which were supported by earlier releases and which are rejected
/// with a pointer on how to migrate.
pub const V1ALPHA1_API_VERSION: &str = const_format::concatcp!(GROUP_NAME, "/v1alpha1");

/// A configuration type of one specific version.
///
/// Implementors are registered in the [`Scheme`](crate::scheme::Scheme), which
/// derives the decode, convert and encode functions for the version from this
/// trait.
pub trait VersionedConfig:
    Serialize
    + DeserializeOwned
    + Into<VersionedDocument>
    + TryFrom<VersionedDocument, Error = VersionedDocument>
{
    /// The `apiVersion` this type is (de)serialized with.
    const API_VERSION: &'static str;

    /// The `kind` this type is (de)serialized with.
    const KIND: &'static str = KIND;

    /// Converts `self` into the internal representation.
    ///
    /// This is a pure structural mapping, no defaulting takes place.
    fn into_internal(self) -> internal::MasterConfiguration;

    /// Converts the internal representation into this version, dropping all
    /// fields which can not be expressed in it.
    fn from_internal(config: &internal::MasterConfiguration) -> Self;
}

/// A decoded configuration document, tagged with the version it was decoded
/// from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VersionedDocument {
    Internal(internal::MasterConfiguration),
    V1Alpha2(v1alpha2::MasterConfiguration),
    V1Alpha3(v1alpha3::MasterConfiguration),
}

impl VersionedDocument {
    /// Returns the `apiVersion` of the contained configuration.
    pub fn api_version(&self) -> &'static str {
        match self {
            Self::Internal(_) => internal::MasterConfiguration::API_VERSION,
            Self::V1Alpha2(_) => v1alpha2::MasterConfiguration::API_VERSION,
            Self::V1Alpha3(_) => v1alpha3::MasterConfiguration::API_VERSION,
        }
    }
}
