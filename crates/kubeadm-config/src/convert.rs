//! Moves configurations between their versioned and internal representations.
//!
//! Conversions always go through the internal representation, a document is
//! never converted from one released version into another directly.

use snafu::{OptionExt, Snafu};
use tracing::debug;

use crate::{
    api_version::SchemaVersion,
    apis::{VersionedDocument, internal},
    scheme::Scheme,
};

#[derive(Debug, PartialEq, Eq, Snafu)]
pub enum ConversionError {
    #[snafu(display("no conversion is registered for {api_version:?}"))]
    MissingEdge { api_version: String },

    #[snafu(display("expected a {expected:?} document, got a {found:?} document"))]
    UnexpectedDocument {
        expected: &'static str,
        found: &'static str,
    },
}

/// Converts a decoded document into the internal representation.
pub fn to_internal(
    document: VersionedDocument,
    scheme: &Scheme,
) -> Result<internal::MasterConfiguration, ConversionError> {
    let api_version = document.api_version();
    let registration = scheme
        .lookup_api_version(api_version)
        .context(MissingEdgeSnafu { api_version })?;

    debug!(api_version, "converting document to the internal version");
    registration.to_internal(document)
}

/// Converts the internal representation into a document of the `target`
/// version. Fields `target` can not express are dropped.
pub fn from_internal(
    config: &internal::MasterConfiguration,
    target: &SchemaVersion,
    scheme: &Scheme,
) -> Result<VersionedDocument, ConversionError> {
    let registration = scheme.lookup(target).context(MissingEdgeSnafu {
        api_version: target.to_string(),
    })?;

    debug!(%target, "converting internal configuration to target version");
    Ok(registration.from_internal(config))
}
