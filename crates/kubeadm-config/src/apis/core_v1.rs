//! Kubernetes core types embedded in every version of the kubeadm API. They are
//! shared between versions because they are owned by a different API group.

use serde::{Deserialize, Serialize};

/// Node taint that is applied when registering a node.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Taint {
    pub key: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,

    pub effect: TaintEffect,
}

impl Taint {
    pub const MASTER_KEY: &'static str = "node-role.kubernetes.io/master";

    /// The taint kubeadm puts on control plane nodes by default.
    pub fn master() -> Self {
        Self {
            key: Self::MASTER_KEY.to_owned(),
            value: None,
            effect: TaintEffect::NoSchedule,
        }
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum TaintEffect {
    NoSchedule,
    PreferNoSchedule,
    NoExecute,
}

/// The type of a host path volume, see the Kubernetes `HostPathType`.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum HostPathType {
    DirectoryOrCreate,
    Directory,
    FileOrCreate,
    File,
    Socket,
    CharDevice,
    BlockDevice,
}
