//! Serializes configurations into the wire format of a target version.
//!
//! The output is byte-stable: struct fields are emitted in declaration order
//! and every map is ordered by key.

use snafu::{ResultExt, Snafu};

use crate::{
    api_version::SchemaVersion,
    apis::{VersionedDocument, internal},
    convert::{self, ConversionError},
    scheme::Scheme,
    yaml,
};

#[derive(Debug, Snafu)]
pub enum EncodeError {
    #[snafu(display("failed to convert to the target version"))]
    Convert { source: ConversionError },

    #[snafu(display("no encoder is registered for {api_version:?}"))]
    MissingEncoder { api_version: String },

    #[snafu(display("expected a {expected:?} document, got a {found:?} document"))]
    UnexpectedDocument {
        expected: &'static str,
        found: &'static str,
    },

    #[snafu(display("failed to serialize {api_version:?} document"))]
    Serialize {
        source: yaml::Error,
        api_version: &'static str,
    },
}

/// Serializes an already converted document in the version it is tagged with.
pub fn encode_document(document: VersionedDocument, scheme: &Scheme) -> Result<String, EncodeError> {
    let api_version = document.api_version();
    let registration =
        scheme
            .lookup_api_version(api_version)
            .ok_or_else(|| EncodeError::MissingEncoder {
                api_version: api_version.to_owned(),
            })?;

    registration.encode(document, yaml::SerializeOptions::document())
}

/// Converts `config` into the `target` version and serializes it.
pub fn encode(
    config: &internal::MasterConfiguration,
    target: &SchemaVersion,
    scheme: &Scheme,
) -> Result<String, EncodeError> {
    let document = convert::from_internal(config, target, scheme).context(ConvertSnafu)?;
    encode_document(document, scheme)
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use indoc::indoc;

    use super::*;
    use crate::{apis::v1alpha2, scheme::SCHEME};

    #[test]
    fn encode_v1alpha2() {
        let mut config = internal::MasterConfiguration::new();
        config.api_endpoint.advertise_address = Some("192.168.2.2".into());
        config.api_endpoint.bind_port = Some(6443);
        config.cluster_name = Some("kubernetes".into());
        config.api_server_extra_volumes = vec![internal::HostPathMount {
            name: "audit".into(),
            host_path: "/etc/kubernetes/audit".into(),
            mount_path: "/etc/kubernetes/audit".into(),
            read_only: true,
            path_type: None,
        }];

        let target = SchemaVersion::from_str(v1alpha2::API_VERSION).expect("valid apiVersion");
        let yaml = encode(&config, &target, &SCHEME).expect("config must encode");

        assert_eq!(
            yaml,
            indoc! {"
                apiVersion: kubeadm.k8s.io/v1alpha2
                kind: MasterConfiguration
                nodeRegistration: {}
                api:
                  advertiseAddress: 192.168.2.2
                  bindPort: 6443
                etcd: {}
                networking: {}
                apiServerExtraVolumes:
                - name: audit
                  hostPath: /etc/kubernetes/audit
                  mountPath: /etc/kubernetes/audit
                  writable: false
                clusterName: kubernetes
            "}
        );
    }

    #[test]
    fn encode_is_deterministic() {
        let mut config = internal::MasterConfiguration::new();
        for (key, value) in [("z", "1"), ("a", "2"), ("m", "3")] {
            config
                .api_server_extra_args
                .insert(key.to_owned(), value.to_owned());
        }

        let target = SCHEME.preferred_version().clone();
        let first = encode(&config, &target, &SCHEME).expect("config must encode");
        let second = encode(&config.clone(), &target, &SCHEME).expect("config must encode");

        assert_eq!(first, second);
        assert!(first.contains("apiServerExtraArgs:\n  a: '2'\n  m: '3'\n  z: '1'\n"));
    }
}
