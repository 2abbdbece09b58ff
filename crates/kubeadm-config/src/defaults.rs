//! Defaulting of the internal configuration.
//!
//! Every [`DefaultRule`] declares the fields it writes and the fields it reads.
//! A rule reading a field runs after the rule writing it, which makes the rule
//! set a graph that is sorted topologically once, when the [`Defaulter`] is
//! built. Cycles and fields written by more than one rule are rejected at that
//! point.
//!
//! Rules only fill fields which are unset, so defaulting a configuration twice
//! yields the same result as defaulting it once.

use std::{collections::BTreeMap, sync::LazyLock};

use petgraph::{algo::toposort, graph::DiGraph};
use snafu::{OptionExt, ResultExt, Snafu};
use tracing::{debug, trace};

use crate::{
    apis::{core_v1::Taint, internal},
    duration::Duration,
    merge::Merge,
};

pub const DEFAULT_KUBERNETES_VERSION: &str = "stable-1.11";
pub const DEFAULT_API_BIND_PORT: i32 = 6443;
pub const DEFAULT_SERVICE_SUBNET: &str = "10.96.0.0/12";
pub const DEFAULT_DNS_DOMAIN: &str = "cluster.local";
pub const DEFAULT_CERTIFICATES_DIR: &str = "/etc/kubernetes/pki";
pub const DEFAULT_IMAGE_REPOSITORY: &str = "k8s.gcr.io";
pub const DEFAULT_CLUSTER_NAME: &str = "kubernetes";
pub const DEFAULT_ETCD_DATA_DIR: &str = "/var/lib/etcd";
pub const DEFAULT_CRI_SOCKET: &str = "/var/run/dockershim.sock";
pub const DEFAULT_TOKEN_TTL: Duration = Duration::from_hours(24);
pub const DEFAULT_TOKEN_USAGES: &[&str] = &["signing", "authentication"];
pub const DEFAULT_TOKEN_GROUPS: &[&str] = &["system:bootstrappers:kubeadm:default-node-token"];
pub const DEFAULT_AUDIT_LOG_DIR: &str = "/var/log/kubernetes/audit";
pub const DEFAULT_AUDIT_LOG_MAX_AGE: i32 = 2;

/// The defaulter used by the pipeline, containing all built-in rules.
pub static DEFAULTER: LazyLock<Defaulter> = LazyLock::new(|| {
    Defaulter::new(&builtin_rules()).expect("the built-in default rules must form a valid graph")
});

#[derive(Debug, PartialEq, Eq, Snafu)]
pub enum BuildError {
    #[snafu(display("default rule {name:?} is registered more than once"))]
    DuplicateRule { name: &'static str },

    #[snafu(display("field {field:?} is written by both rule {first:?} and rule {second:?}"))]
    DuplicateWriter {
        field: &'static str,
        first: &'static str,
        second: &'static str,
    },

    #[snafu(display("default rule {rule:?} is part of a dependency cycle"))]
    Cycle { rule: &'static str },
}

#[derive(Debug, PartialEq, Eq, Snafu)]
pub enum RuleError {
    #[snafu(display("field {field:?} is required to derive a default, but is unset"))]
    MissingPrerequisite { field: &'static str },
}

#[derive(Debug, PartialEq, Eq, Snafu)]
pub enum DefaultingError {
    #[snafu(display("failed to apply default rule {rule:?}"))]
    ApplyRule {
        source: RuleError,
        rule: &'static str,
    },
}

/// A single default rule, see the module documentation.
#[derive(Clone, Copy, Debug)]
pub struct DefaultRule {
    pub name: &'static str,

    /// The field paths this rule fills.
    pub writes: &'static [&'static str],

    /// The field paths this rule derives its values from.
    pub reads: &'static [&'static str],

    pub apply: fn(&mut internal::MasterConfiguration) -> Result<(), RuleError>,
}

/// An ordered set of [`DefaultRule`]s.
#[derive(Debug)]
pub struct Defaulter {
    rules: Vec<DefaultRule>,
}

impl Defaulter {
    /// Sorts `rules` topologically by their declared reads and writes.
    pub fn new(rules: &[DefaultRule]) -> Result<Self, BuildError> {
        let mut graph = DiGraph::<usize, ()>::new();
        let nodes: Vec<_> = (0..rules.len()).map(|index| graph.add_node(index)).collect();

        let mut names = BTreeMap::new();
        let mut writers = BTreeMap::new();

        for (index, rule) in rules.iter().enumerate() {
            if names.insert(rule.name, index).is_some() {
                return DuplicateRuleSnafu { name: rule.name }.fail();
            }

            for field in rule.writes {
                if let Some(first) = writers.insert(*field, index) {
                    return DuplicateWriterSnafu {
                        field: *field,
                        first: rules[first].name,
                        second: rule.name,
                    }
                    .fail();
                }
            }
        }

        for (reader, rule) in rules.iter().enumerate() {
            for field in rule.reads {
                match writers.get(field) {
                    Some(&writer) if writer != reader => {
                        graph.add_edge(nodes[writer], nodes[reader], ());
                    }
                    _ => {}
                }
            }
        }

        let order = toposort(&graph, None).map_err(|cycle| BuildError::Cycle {
            rule: rules[graph[cycle.node_id()]].name,
        })?;

        let rules = order.into_iter().map(|node| rules[graph[node]]).collect();
        Ok(Self { rules })
    }

    /// The rules in the order they are applied in.
    pub fn rules(&self) -> impl Iterator<Item = &DefaultRule> {
        self.rules.iter()
    }

    /// Fills all unset fields of `config`, stopping at the first failing rule.
    pub fn apply(&self, config: &mut internal::MasterConfiguration) -> Result<(), DefaultingError> {
        for rule in &self.rules {
            (rule.apply)(config).context(ApplyRuleSnafu { rule: rule.name })?;
            trace!(rule = rule.name, "applied default rule");
        }

        debug!(rules = self.rules.len(), "defaulted configuration");
        Ok(())
    }
}

fn to_strings(values: &[&str]) -> Vec<String> {
    values.iter().map(ToString::to_string).collect()
}

/// Returns all built-in rules, in no particular order.
pub fn builtin_rules() -> Vec<DefaultRule> {
    let mut rules = cluster_rules();
    rules.extend(etcd_rules());
    rules.extend(node_rules());
    rules
}

/// Rules for the top-level cluster settings.
fn cluster_rules() -> Vec<DefaultRule> {
    vec![
        DefaultRule {
            name: "kubernetes-version",
            writes: &["kubernetesVersion"],
            reads: &[],
            apply: |config| {
                config
                    .kubernetes_version
                    .merge(&Some(DEFAULT_KUBERNETES_VERSION.to_owned()));
                Ok(())
            },
        },
        DefaultRule {
            name: "api-bind-port",
            writes: &["apiEndpoint.bindPort"],
            reads: &[],
            apply: |config| {
                config
                    .api_endpoint
                    .bind_port
                    .merge(&Some(DEFAULT_API_BIND_PORT));
                Ok(())
            },
        },
        DefaultRule {
            name: "networking",
            writes: &["networking.serviceSubnet", "networking.dnsDomain"],
            reads: &[],
            apply: |config| {
                config.networking.merge(&internal::Networking {
                    service_subnet: Some(DEFAULT_SERVICE_SUBNET.to_owned()),
                    pod_subnet: None,
                    dns_domain: Some(DEFAULT_DNS_DOMAIN.to_owned()),
                });
                Ok(())
            },
        },
        DefaultRule {
            name: "certificates-dir",
            writes: &["certificatesDir"],
            reads: &[],
            apply: |config| {
                config
                    .certificates_dir
                    .merge(&Some(DEFAULT_CERTIFICATES_DIR.to_owned()));
                Ok(())
            },
        },
        DefaultRule {
            name: "image-repository",
            writes: &["imageRepository"],
            reads: &[],
            apply: |config| {
                config
                    .image_repository
                    .merge(&Some(DEFAULT_IMAGE_REPOSITORY.to_owned()));
                Ok(())
            },
        },
        DefaultRule {
            name: "cluster-name",
            writes: &["clusterName"],
            reads: &[],
            apply: |config| {
                config
                    .cluster_name
                    .merge(&Some(DEFAULT_CLUSTER_NAME.to_owned()));
                Ok(())
            },
        },
        DefaultRule {
            name: "audit-policy",
            writes: &["auditPolicy.logDir", "auditPolicy.logMaxAge"],
            reads: &["auditPolicy"],
            apply: |config| {
                if let Some(audit_policy) = &mut config.audit_policy {
                    audit_policy.merge(&internal::AuditPolicyConfiguration {
                        path: None,
                        log_dir: Some(DEFAULT_AUDIT_LOG_DIR.to_owned()),
                        log_max_age: Some(DEFAULT_AUDIT_LOG_MAX_AGE),
                    });
                }
                Ok(())
            },
        },
    ]
}

/// Rules for the `etcd` sub-tree.
fn etcd_rules() -> Vec<DefaultRule> {
    vec![
        DefaultRule {
            name: "etcd",
            writes: &["etcd.local"],
            reads: &[],
            apply: |config| {
                let etcd = &mut config.etcd;
                if etcd.local.is_none() && etcd.external.is_none() {
                    etcd.local = Some(internal::LocalEtcd::default());
                }
                Ok(())
            },
        },
        DefaultRule {
            name: "etcd-data-dir",
            writes: &["etcd.local.dataDir"],
            reads: &["etcd.local"],
            apply: |config| {
                if let Some(local) = &mut config.etcd.local {
                    local
                        .data_dir
                        .merge(&Some(DEFAULT_ETCD_DATA_DIR.to_owned()));
                }
                Ok(())
            },
        },
        DefaultRule {
            name: "etcd-image-repository",
            writes: &["etcd.local.imageRepository"],
            reads: &["imageRepository", "etcd.local"],
            apply: default_etcd_image_repository,
        },
    ]
}

/// Rules for the `nodeRegistration` and `bootstrapTokens` sub-trees.
fn node_rules() -> Vec<DefaultRule> {
    vec![
        DefaultRule {
            name: "node-registration",
            writes: &["nodeRegistration.criSocket", "nodeRegistration.taints"],
            reads: &[],
            apply: |config| {
                config
                    .node_registration
                    .merge(&internal::NodeRegistrationOptions {
                        cri_socket: Some(DEFAULT_CRI_SOCKET.to_owned()),
                        taints: Some(vec![Taint::master()]),
                        ..Default::default()
                    });
                Ok(())
            },
        },
        DefaultRule {
            name: "bootstrap-tokens",
            writes: &["bootstrapTokens"],
            reads: &[],
            apply: |config| {
                if config.bootstrap_tokens.is_empty() {
                    config
                        .bootstrap_tokens
                        .push(internal::BootstrapToken::default());
                }

                let defaults = internal::BootstrapToken {
                    ttl: Some(DEFAULT_TOKEN_TTL),
                    usages: to_strings(DEFAULT_TOKEN_USAGES),
                    groups: to_strings(DEFAULT_TOKEN_GROUPS),
                    ..Default::default()
                };
                for token in &mut config.bootstrap_tokens {
                    token.merge(&defaults);
                }
                Ok(())
            },
        },
    ]
}

fn default_etcd_image_repository(
    config: &mut internal::MasterConfiguration,
) -> Result<(), RuleError> {
    let Some(local) = &mut config.etcd.local else {
        return Ok(());
    };
    if local.image_repository.is_some() {
        return Ok(());
    }

    let image_repository = config
        .image_repository
        .as_ref()
        .context(MissingPrerequisiteSnafu {
            field: "imageRepository",
        })?;
    local.image_repository = Some(image_repository.clone());
    Ok(())
}
