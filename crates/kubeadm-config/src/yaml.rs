//! Utility functions for reading and writing configuration documents in the
//! YAML file format.
use serde::de::DeserializeOwned;
use snafu::{ResultExt, Snafu};

type Result<T, E = Error> = std::result::Result<T, E>;

/// Represents every error which can be encountered during YAML serialization.
#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to serialize YAML"))]
    SerializeYaml { source: serde_yaml::Error },

    #[snafu(display("failed to write YAML document separator"))]
    WriteDocumentSeparator { source: std::io::Error },

    #[snafu(display("failed to parse bytes as valid UTF-8 string"))]
    ParseUtf8Bytes { source: std::string::FromUtf8Error },
}

/// Provides configurable options during YAML serialization.
///
/// Rendered configuration documents use [`SerializeOptions::document()`],
/// which omits the leading document separator.
#[derive(Clone, Copy, Debug)]
pub struct SerializeOptions {
    /// Adds leading triple dashes (`---`) to the output string.
    pub explicit_document: bool,

    /// Serialize enum variants as YAML maps using the variant name as the key.
    pub singleton_map: bool,
}

impl Default for SerializeOptions {
    fn default() -> Self {
        Self {
            explicit_document: true,
            singleton_map: true,
        }
    }
}

impl SerializeOptions {
    /// Options for a standalone configuration file.
    pub fn document() -> Self {
        Self {
            explicit_document: false,
            ..Self::default()
        }
    }
}

/// Serializes the given data structure and writes it to a [`Writer`](std::io::Write).
pub fn serialize<T, W>(value: &T, mut writer: W, options: SerializeOptions) -> Result<()>
where
    T: serde::Serialize,
    W: std::io::Write,
{
    if options.explicit_document {
        writer
            .write_all(b"---\n")
            .context(WriteDocumentSeparatorSnafu)?;
    }

    let mut serializer = serde_yaml::Serializer::new(writer);

    if options.singleton_map {
        serde_yaml::with::singleton_map_recursive::serialize(value, &mut serializer)
            .context(SerializeYamlSnafu)?;
    } else {
        value
            .serialize(&mut serializer)
            .context(SerializeYamlSnafu)?;
    }

    Ok(())
}

/// Serializes the given data structure into a [`String`].
pub fn to_string<T>(value: &T, options: SerializeOptions) -> Result<String>
where
    T: serde::Serialize,
{
    let mut buffer = Vec::new();
    serialize(value, &mut buffer, options)?;

    String::from_utf8(buffer).context(ParseUtf8BytesSnafu)
}

/// Deserializes a single document, rejecting anything the target type does
/// not declare when it is marked with `deny_unknown_fields`.
pub fn from_slice<T>(raw: &[u8]) -> Result<T, serde_yaml::Error>
where
    T: DeserializeOwned,
{
    serde_yaml::from_slice(raw)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    #[test]
    fn explicit_document_separator() {
        let value = BTreeMap::from([("b", 2), ("a", 1)]);

        let yaml = to_string(&value, SerializeOptions::default()).expect("map must serialize");
        assert_eq!(yaml, "---\na: 1\nb: 2\n");

        let yaml = to_string(&value, SerializeOptions::document()).expect("map must serialize");
        assert_eq!(yaml, "a: 1\nb: 2\n");
    }
}
