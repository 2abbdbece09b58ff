//! The `kubeadm.k8s.io/v1alpha3` version of the master configuration, which is
//! the preferred version.
//!
//! It is structurally close to the internal representation. The only field the
//! internal representation knows about and this version does not is the audit
//! policy.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{
    apis::{
        self, VersionedDocument,
        core_v1::{HostPathType, Taint},
    },
    duration::Duration,
};

mod conversion;

pub const API_VERSION: &str = const_format::concatcp!(apis::GROUP_NAME, "/v1alpha3");

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

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub feature_gates: BTreeMap<String, bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_name: Option<String>,
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
pub struct BootstrapToken {
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

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub taints: Option<Vec<Taint>>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub kubelet_extra_args: BTreeMap<String, String>,
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
    /// Registry the etcd image is pulled from, derived from the cluster wide
    /// `imageRepository` unless set.
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

impl From<MasterConfiguration> for VersionedDocument {
    fn from(value: MasterConfiguration) -> Self {
        Self::V1Alpha3(value)
    }
}

impl TryFrom<VersionedDocument> for MasterConfiguration {
    type Error = VersionedDocument;

    fn try_from(value: VersionedDocument) -> Result<Self, Self::Error> {
        match value {
            VersionedDocument::V1Alpha3(config) => Ok(config),
            other => Err(other),
        }
    }
}
