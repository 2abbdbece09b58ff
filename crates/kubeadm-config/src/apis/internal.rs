//! The internal, version-independent representation of the kubeadm master
//! configuration. Every released version converts to and from these types, and
//! defaulting, normalization and validation only ever operate on them.
//!
//! Most fields are optional so that "unset" can be told apart from an explicit
//! zero value. Defaulting fills the unset ones.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{
    apis::{
        self, VersionedConfig, VersionedDocument,
        core_v1::{HostPathType, Taint},
    },
    duration::Duration,
};

/// Contains the configuration for the control plane, as used by the bootstrap
/// logic.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct MasterConfiguration {
    #[serde(default)]
    pub api_version: String,

    #[serde(default)]
    pub kind: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bootstrap_tokens: Vec<BootstrapToken>,

    #[serde(default)]
    pub node_registration: NodeRegistrationOptions,

    #[serde(default)]
    pub api_endpoint: ApiEndpoint,

    /// A stable IP address or DNS name for the control plane, optionally with a
    /// port.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub control_plane_endpoint: Option<String>,

    #[serde(default)]
    pub etcd: Etcd,

    #[serde(default)]
    pub networking: Networking,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kubernetes_version: Option<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub api_server_extra_args: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub controller_manager_extra_args: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub scheduler_extra_args: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub api_server_extra_volumes: Vec<HostPathMount>,

    /// Extra Subject Alternative Names for the API server serving certificate.
    #[serde(
        default,
        rename = "apiServerCertSANs",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub api_server_cert_sans: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificates_dir: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_repository: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unified_control_plane_image: Option<String>,

    /// Only expressible in `v1alpha2`, it is retained here so that converting
    /// from `v1alpha2` to the internal version does not lose it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audit_policy: Option<AuditPolicyConfiguration>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub feature_gates: BTreeMap<String, bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_name: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct BootstrapToken {
    /// Of the form `[a-z0-9]{6}.[a-z0-9]{16}`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl: Option<Duration>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub usages: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<String>,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct NodeRegistrationOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cri_socket: Option<String>,

    /// [`None`] means "use the default taints", while an empty list means "no
    /// taints at all".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub taints: Option<Vec<Taint>>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub kubelet_extra_args: BTreeMap<String, String>,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct ApiEndpoint {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub advertise_address: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bind_port: Option<i32>,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct Etcd {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local: Option<LocalEtcd>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external: Option<ExternalEtcd>,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct LocalEtcd {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_repository: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra_args: BTreeMap<String, String>,

    #[serde(
        default,
        rename = "serverCertSANs",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub server_cert_sans: Vec<String>,

    #[serde(default, rename = "peerCertSANs", skip_serializing_if = "Vec::is_empty")]
    pub peer_cert_sans: Vec<String>,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct ExternalEtcd {
    #[serde(default)]
    pub endpoints: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca_file: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cert_file: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_file: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct Networking {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_subnet: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pod_subnet: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dns_domain: Option<String>,
}

/// An extra host path mounted into a control plane component.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct HostPathMount {
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub host_path: String,

    #[serde(default)]
    pub mount_path: String,

    #[serde(default)]
    pub read_only: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path_type: Option<HostPathType>,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct AuditPolicyConfiguration {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_dir: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_max_age: Option<i32>,
}

impl MasterConfiguration {
    /// Returns an empty configuration carrying the internal type information.
    pub fn new() -> Self {
        Self {
            api_version: <Self as VersionedConfig>::API_VERSION.to_owned(),
            kind: apis::KIND.to_owned(),
            ..Default::default()
        }
    }
}

impl VersionedConfig for MasterConfiguration {
    const API_VERSION: &'static str = apis::INTERNAL_API_VERSION;

    fn into_internal(self) -> MasterConfiguration {
        Self {
            api_version: Self::API_VERSION.to_owned(),
            kind: apis::KIND.to_owned(),
            ..self
        }
    }

    fn from_internal(config: &MasterConfiguration) -> Self {
        config.clone().into_internal()
    }
}

impl From<MasterConfiguration> for VersionedDocument {
    fn from(value: MasterConfiguration) -> Self {
        Self::Internal(value)
    }
}

impl TryFrom<VersionedDocument> for MasterConfiguration {
    type Error = VersionedDocument;

    fn try_from(value: VersionedDocument) -> Result<Self, Self::Error> {
        match value {
            VersionedDocument::Internal(config) => Ok(config),
            other => Err(other),
        }
    }
}
