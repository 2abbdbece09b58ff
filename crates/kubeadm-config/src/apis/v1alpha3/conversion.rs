use tracing::warn;

use crate::apis::{
    self, VersionedConfig, internal,
    v1alpha3::{
        API_VERSION, ApiEndpoint, BootstrapToken, Etcd, ExternalEtcd, HostPathMount, LocalEtcd,
        MasterConfiguration, Networking, NodeRegistrationOptions,
    },
};

impl VersionedConfig for MasterConfiguration {
    const API_VERSION: &'static str = API_VERSION;

    fn into_internal(self) -> internal::MasterConfiguration {
        internal::MasterConfiguration {
            api_version: apis::INTERNAL_API_VERSION.to_owned(),
            kind: apis::KIND.to_owned(),
            bootstrap_tokens: self.bootstrap_tokens.into_iter().map(Into::into).collect(),
            node_registration: self.node_registration.into(),
            api_endpoint: internal::ApiEndpoint {
                advertise_address: self.api_endpoint.advertise_address,
                bind_port: self.api_endpoint.bind_port,
            },
            control_plane_endpoint: self.control_plane_endpoint,
            etcd: self.etcd.into(),
            networking: self.networking.into(),
            kubernetes_version: self.kubernetes_version,
            api_server_extra_args: self.api_server_extra_args,
            controller_manager_extra_args: self.controller_manager_extra_args,
            scheduler_extra_args: self.scheduler_extra_args,
            api_server_extra_volumes: self
                .api_server_extra_volumes
                .into_iter()
                .map(Into::into)
                .collect(),
            api_server_cert_sans: self.api_server_cert_sans,
            certificates_dir: self.certificates_dir,
            image_repository: self.image_repository,
            unified_control_plane_image: self.unified_control_plane_image,
            audit_policy: None,
            feature_gates: self.feature_gates,
            cluster_name: self.cluster_name,
        }
    }

    fn from_internal(config: &internal::MasterConfiguration) -> Self {
        let config = config.clone();

        if config.audit_policy.is_some() {
            warn!(
                api_version = API_VERSION,
                "dropping auditPolicy, it can not be expressed in this version"
            );
        }

        Self {
            api_version: API_VERSION.to_owned(),
            kind: apis::KIND.to_owned(),
            bootstrap_tokens: config.bootstrap_tokens.into_iter().map(Into::into).collect(),
            node_registration: config.node_registration.into(),
            api_endpoint: ApiEndpoint {
                advertise_address: config.api_endpoint.advertise_address,
                bind_port: config.api_endpoint.bind_port,
            },
            control_plane_endpoint: config.control_plane_endpoint,
            etcd: config.etcd.into(),
            networking: config.networking.into(),
            kubernetes_version: config.kubernetes_version,
            api_server_extra_args: config.api_server_extra_args,
            controller_manager_extra_args: config.controller_manager_extra_args,
            scheduler_extra_args: config.scheduler_extra_args,
            api_server_extra_volumes: config
                .api_server_extra_volumes
                .into_iter()
                .map(Into::into)
                .collect(),
            api_server_cert_sans: config.api_server_cert_sans,
            certificates_dir: config.certificates_dir,
            image_repository: config.image_repository,
            unified_control_plane_image: config.unified_control_plane_image,
            feature_gates: config.feature_gates,
            cluster_name: config.cluster_name,
        }
    }
}

impl From<BootstrapToken> for internal::BootstrapToken {
    fn from(value: BootstrapToken) -> Self {
        Self {
            token: value.token,
            description: value.description,
            ttl: value.ttl,
            usages: value.usages,
            groups: value.groups,
        }
    }
}

impl From<internal::BootstrapToken> for BootstrapToken {
    fn from(value: internal::BootstrapToken) -> Self {
        Self {
            token: value.token,
            description: value.description,
            ttl: value.ttl,
            usages: value.usages,
            groups: value.groups,
        }
    }
}

impl From<NodeRegistrationOptions> for internal::NodeRegistrationOptions {
    fn from(value: NodeRegistrationOptions) -> Self {
        Self {
            name: value.name,
            cri_socket: value.cri_socket,
            taints: value.taints,
            kubelet_extra_args: value.kubelet_extra_args,
        }
    }
}

impl From<internal::NodeRegistrationOptions> for NodeRegistrationOptions {
    fn from(value: internal::NodeRegistrationOptions) -> Self {
        Self {
            name: value.name,
            cri_socket: value.cri_socket,
            taints: value.taints,
            kubelet_extra_args: value.kubelet_extra_args,
        }
    }
}

impl From<Etcd> for internal::Etcd {
    fn from(value: Etcd) -> Self {
        Self {
            local: value.local.map(|local| internal::LocalEtcd {
                image_repository: local.image_repository,
                data_dir: local.data_dir,
                extra_args: local.extra_args,
                server_cert_sans: local.server_cert_sans,
                peer_cert_sans: local.peer_cert_sans,
            }),
            external: value.external.map(|external| internal::ExternalEtcd {
                endpoints: external.endpoints,
                ca_file: external.ca_file,
                cert_file: external.cert_file,
                key_file: external.key_file,
            }),
        }
    }
}

impl From<internal::Etcd> for Etcd {
    fn from(value: internal::Etcd) -> Self {
        Self {
            local: value.local.map(|local| LocalEtcd {
                image_repository: local.image_repository,
                data_dir: local.data_dir,
                extra_args: local.extra_args,
                server_cert_sans: local.server_cert_sans,
                peer_cert_sans: local.peer_cert_sans,
            }),
            external: value.external.map(|external| ExternalEtcd {
                endpoints: external.endpoints,
                ca_file: external.ca_file,
                cert_file: external.cert_file,
                key_file: external.key_file,
            }),
        }
    }
}

impl From<Networking> for internal::Networking {
    fn from(value: Networking) -> Self {
        Self {
            service_subnet: value.service_subnet,
            pod_subnet: value.pod_subnet,
            dns_domain: value.dns_domain,
        }
    }
}

impl From<internal::Networking> for Networking {
    fn from(value: internal::Networking) -> Self {
        Self {
            service_subnet: value.service_subnet,
            pod_subnet: value.pod_subnet,
            dns_domain: value.dns_domain,
        }
    }
}

impl From<HostPathMount> for internal::HostPathMount {
    fn from(value: HostPathMount) -> Self {
        Self {
            name: value.name,
            host_path: value.host_path,
            mount_path: value.mount_path,
            read_only: value.read_only,
            path_type: value.path_type,
        }
    }
}

impl From<internal::HostPathMount> for HostPathMount {
    fn from(value: internal::HostPathMount) -> Self {
        Self {
            name: value.name,
            host_path: value.host_path,
            mount_path: value.mount_path,
            read_only: value.read_only,
            path_type: value.path_type,
        }
    }
}
