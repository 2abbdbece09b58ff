use crate::{
    apis::{core_v1::Taint, internal},
    duration::Duration,
};

/// A type that can be merged with itself.
///
/// Default rules use this to fill the fields of a configuration which are left
/// unset with the fields of a fully populated default value, without ever
/// touching the fields which are set already.
///
/// # Options
///
/// A field should be [`Option`]al if it is [`Atomic`] (for example: [`String`]),
/// so that "unset" can be told apart from an explicit zero value. Lists which
/// have no such distinction are treated as unset when they are empty.
pub trait Merge {
    /// Merge with `defaults`, preferring values from `self` if they are set there
    fn merge(&mut self, defaults: &Self);
}

/// A marker trait for types that are merged atomically (as one single value) rather than
/// trying to merge each field individually
pub trait Atomic: Clone {}
impl Atomic for i32 {}
impl Atomic for String {}
impl Atomic for Duration {}
impl Atomic for Vec<Taint> {}

impl<T: Atomic> Merge for Option<T> {
    fn merge(&mut self, defaults: &Self) {
        if self.is_none() {
            self.clone_from(defaults);
        }
    }
}

/// Fills `list` with `defaults` if it is empty.
fn merge_list<T: Clone>(list: &mut Vec<T>, defaults: &[T]) {
    if list.is_empty() {
        list.extend_from_slice(defaults);
    }
}

impl Merge for internal::BootstrapToken {
    fn merge(&mut self, defaults: &Self) {
        self.token.merge(&defaults.token);
        self.description.merge(&defaults.description);
        self.ttl.merge(&defaults.ttl);
        merge_list(&mut self.usages, &defaults.usages);
        merge_list(&mut self.groups, &defaults.groups);
    }
}

impl Merge for internal::NodeRegistrationOptions {
    fn merge(&mut self, defaults: &Self) {
        self.name.merge(&defaults.name);
        self.cri_socket.merge(&defaults.cri_socket);
        self.taints.merge(&defaults.taints);
    }
}

impl Merge for internal::Networking {
    fn merge(&mut self, defaults: &Self) {
        self.service_subnet.merge(&defaults.service_subnet);
        self.pod_subnet.merge(&defaults.pod_subnet);
        self.dns_domain.merge(&defaults.dns_domain);
    }
}

impl Merge for internal::LocalEtcd {
    fn merge(&mut self, defaults: &Self) {
        self.image_repository.merge(&defaults.image_repository);
        self.data_dir.merge(&defaults.data_dir);
    }
}

impl Merge for internal::AuditPolicyConfiguration {
    fn merge(&mut self, defaults: &Self) {
        self.path.merge(&defaults.path);
        self.log_dir.merge(&defaults.log_dir);
        self.log_max_age.merge(&defaults.log_max_age);
    }
}

#[cfg(test)]
mod tests {
    use super::Merge;
    use crate::apis::{core_v1::Taint, internal};

    /// Moving version of [`Merge::merge`], to produce slightly nicer test output
    fn merge<T: Merge>(mut overrides: T, defaults: &T) -> T {
        overrides.merge(defaults);
        overrides
    }

    #[test]
    fn merge_option() {
        assert_eq!(merge(None, &Some(1)), Some(1));
        assert_eq!(merge(Some(0), &Some(1)), Some(0));
        assert_eq!(merge(Some(0), &None), Some(0));
        assert_eq!(merge::<Option<i32>>(None, &None), None);
    }

    #[test]
    fn merge_keeps_explicit_empty_taints() {
        let defaults = internal::NodeRegistrationOptions {
            cri_socket: Some("/var/run/dockershim.sock".into()),
            taints: Some(vec![Taint::master()]),
            ..Default::default()
        };

        let merged = merge(
            internal::NodeRegistrationOptions {
                taints: Some(Vec::new()),
                ..Default::default()
            },
            &defaults,
        );
        assert_eq!(merged.taints, Some(Vec::new()));
        assert_eq!(merged.cri_socket.as_deref(), Some("/var/run/dockershim.sock"));

        let merged = merge(internal::NodeRegistrationOptions::default(), &defaults);
        assert_eq!(merged.taints, Some(vec![Taint::master()]));
    }

    #[test]
    fn merge_nested_struct() {
        let mut networking = internal::Networking {
            pod_subnet: Some("10.244.0.0/16".into()),
            dns_domain: Some("cluster.example".into()),
            ..Default::default()
        };

        networking.merge(&internal::Networking {
            service_subnet: Some("10.96.0.0/12".into()),
            pod_subnet: None,
            dns_domain: Some("cluster.local".into()),
        });

        assert_eq!(
            networking,
            internal::Networking {
                service_subnet: Some("10.96.0.0/12".into()),
                pod_subnet: Some("10.244.0.0/16".into()),
                dns_domain: Some("cluster.example".into()),
            }
        );
    }

    #[test]
    fn merge_fills_empty_lists_only() {
        let defaults = internal::BootstrapToken {
            usages: vec!["signing".into(), "authentication".into()],
            groups: vec!["system:bootstrappers:kubeadm:default-node-token".into()],
            ..Default::default()
        };

        let merged = merge(
            internal::BootstrapToken {
                usages: vec!["signing".into()],
                ..Default::default()
            },
            &defaults,
        );

        assert_eq!(merged.usages, ["signing"]);
        assert_eq!(merged.groups, defaults.groups);
    }
}
