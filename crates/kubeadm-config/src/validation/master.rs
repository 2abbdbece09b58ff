//! Validation rules for the internal master configuration.
//!
//! Every rule reports its violations instead of returning early, so that a
//! single run shows everything that is wrong with a configuration.

use std::{net::IpAddr, path::Path, str::FromStr, sync::LazyLock};

use regex::Regex;

use crate::{
    apis::internal,
    host::Endpoint,
    validation::{
        ValidationError, ValidationErrors, ValidationProblem, Validator, is_domain,
        is_rfc_1123_subdomain, is_wildcard_dns_1123_subdomain, parse_cidr,
    },
};

const BOOTSTRAP_TOKEN_PATTERN: &str = r"^[a-z0-9]{6}\.[a-z0-9]{16}$";
const BOOTSTRAP_GROUP_PATTERN: &str = r"^system:bootstrappers:[a-z0-9:-]{0,255}[a-z0-9]$";
const RELEASE_LABEL_PATTERN: &str = r"^(stable|latest|ci|ci-cross)(-[0-9]+(\.[0-9]+)?)?$";

/// The usages a bootstrap token can be created with.
pub const KNOWN_TOKEN_USAGES: &[&str] = &["signing", "authentication"];

/// The feature gates known to kubeadm.
pub const KNOWN_FEATURE_GATES: &[&str] = &[
    "Auditing",
    "CoreDNS",
    "DynamicKubeletConfig",
    "HighAvailability",
    "SelfHosting",
    "StoreCertsInSecrets",
];

static BOOTSTRAP_TOKEN_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(BOOTSTRAP_TOKEN_PATTERN).expect("failed to compile bootstrap token regex")
});

static BOOTSTRAP_GROUP_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(BOOTSTRAP_GROUP_PATTERN).expect("failed to compile bootstrap group regex")
});

static RELEASE_LABEL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(RELEASE_LABEL_PATTERN).expect("failed to compile release label regex")
});

/// Validates a defaulted and normalized configuration, returning every
/// violation found.
pub fn validate(config: &internal::MasterConfiguration) -> Result<(), ValidationErrors> {
    let mut errors = Vec::new();
    let root = Validator::root();

    validate_api_endpoint(&config.api_endpoint, &root.field("apiEndpoint"), &mut errors);

    if let Some(endpoint) = &config.control_plane_endpoint {
        let field = root.field("controlPlaneEndpoint");
        if let Err(source) = Endpoint::from_str(endpoint) {
            errors.push(field.error(ValidationProblem::InvalidEndpoint {
                source,
                value: endpoint.clone(),
            }));
        }
    }

    validate_networking(&config.networking, &root.field("networking"), &mut errors);
    validate_absolute_path(
        config.certificates_dir.as_deref(),
        true,
        &root.field("certificatesDir"),
        &mut errors,
    );
    validate_kubernetes_version(
        config.kubernetes_version.as_deref(),
        &root.field("kubernetesVersion"),
        &mut errors,
    );
    validate_cert_sans(
        &config.api_server_cert_sans,
        &root.field("apiServerCertSANs"),
        &mut errors,
    );
    validate_etcd(&config.etcd, &root.field("etcd"), &mut errors);
    validate_node_registration(
        &config.node_registration,
        &root.field("nodeRegistration"),
        &mut errors,
    );

    let tokens = root.field("bootstrapTokens");
    for (index, token) in config.bootstrap_tokens.iter().enumerate() {
        validate_bootstrap_token(token, &tokens.index(index), &mut errors);
    }

    let volumes = root.field("apiServerExtraVolumes");
    for (index, volume) in config.api_server_extra_volumes.iter().enumerate() {
        validate_host_path_mount(volume, &volumes.index(index), &mut errors);
    }

    let feature_gates = root.field("featureGates");
    for name in config.feature_gates.keys() {
        if !KNOWN_FEATURE_GATES.contains(&name.as_str()) {
            errors.push(feature_gates.field(name).error(ValidationProblem::Unsupported {
                value: name.clone(),
                supported: KNOWN_FEATURE_GATES,
            }));
        }
    }

    if let Some(audit_policy) = &config.audit_policy {
        validate_audit_policy(audit_policy, &root.field("auditPolicy"), &mut errors);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ValidationErrors(errors))
    }
}

fn validate_api_endpoint(
    api_endpoint: &internal::ApiEndpoint,
    validator: &Validator,
    errors: &mut Vec<ValidationError>,
) {
    match &api_endpoint.advertise_address {
        Some(address) if address.parse::<IpAddr>().is_err() => errors.push(
            validator
                .field("advertiseAddress")
                .error(ValidationProblem::InvalidIpAddress {
                    value: address.clone(),
                }),
        ),
        _ => {}
    }

    let field = validator.field("bindPort");
    match api_endpoint.bind_port {
        Some(port) if !(1..=65535).contains(&port) => {
            errors.push(field.error(ValidationProblem::PortOutOfRange { port }));
        }
        Some(_) => {}
        None => errors.push(field.error(ValidationProblem::FieldRequired)),
    }
}

fn validate_networking(
    networking: &internal::Networking,
    validator: &Validator,
    errors: &mut Vec<ValidationError>,
) {
    validate_cidr(
        networking.service_subnet.as_deref(),
        true,
        &validator.field("serviceSubnet"),
        errors,
    );
    validate_cidr(
        networking.pod_subnet.as_deref(),
        false,
        &validator.field("podSubnet"),
        errors,
    );

    let field = validator.field("dnsDomain");
    match &networking.dns_domain {
        Some(domain) => {
            if let Err(source) = is_domain(domain) {
                errors.push(field.error(ValidationProblem::InvalidName {
                    source,
                    value: domain.clone(),
                }));
            }
        }
        None => errors.push(field.error(ValidationProblem::FieldRequired)),
    }
}

fn validate_cidr(
    value: Option<&str>,
    required: bool,
    validator: &Validator,
    errors: &mut Vec<ValidationError>,
) {
    match value {
        Some(value) => {
            if let Err(source) = parse_cidr(value) {
                errors.push(validator.error(ValidationProblem::InvalidCidr {
                    source,
                    value: value.to_owned(),
                }));
            }
        }
        None if required => errors.push(validator.error(ValidationProblem::FieldRequired)),
        None => {}
    }
}

fn validate_absolute_path(
    value: Option<&str>,
    required: bool,
    validator: &Validator,
    errors: &mut Vec<ValidationError>,
) {
    match value {
        Some(value) if !Path::new(value).is_absolute() => {
            errors.push(validator.error(ValidationProblem::NotAbsolutePath {
                value: value.to_owned(),
            }));
        }
        Some(_) => {}
        None if required => errors.push(validator.error(ValidationProblem::FieldRequired)),
        None => {}
    }
}

fn validate_kubernetes_version(
    value: Option<&str>,
    validator: &Validator,
    errors: &mut Vec<ValidationError>,
) {
    let Some(value) = value else {
        errors.push(validator.error(ValidationProblem::FieldRequired));
        return;
    };

    if !is_kubernetes_version(value) {
        errors.push(validator.error(ValidationProblem::InvalidKubernetesVersion {
            value: value.to_owned(),
        }));
    }
}

/// Returns whether `value` is either a semantic version like `v1.11.2` or a
/// release label like `stable-1.11`.
pub fn is_kubernetes_version(value: &str) -> bool {
    let semantic = value.strip_prefix('v').unwrap_or(value);

    semver::Version::parse(semantic).is_ok() || RELEASE_LABEL_REGEX.is_match(value)
}

fn validate_cert_sans(sans: &[String], validator: &Validator, errors: &mut Vec<ValidationError>) {
    for (index, san) in sans.iter().enumerate() {
        let is_valid = san.parse::<IpAddr>().is_ok()
            || is_rfc_1123_subdomain(san).is_ok()
            || is_wildcard_dns_1123_subdomain(san).is_ok();

        if !is_valid {
            errors.push(
                validator
                    .index(index)
                    .error(ValidationProblem::InvalidSubjectAltName { value: san.clone() }),
            );
        }
    }
}

fn validate_etcd(etcd: &internal::Etcd, validator: &Validator, errors: &mut Vec<ValidationError>) {
    match (&etcd.local, &etcd.external) {
        (Some(_), Some(_)) => errors.push(validator.error(ValidationProblem::Conflict {
            message: "local and external etcd are mutually exclusive",
        })),
        (None, None) => errors.push(validator.error(ValidationProblem::Conflict {
            message: "either local or external etcd must be configured",
        })),
        _ => {}
    }

    if let Some(local) = &etcd.local {
        let validator = validator.field("local");
        validate_absolute_path(
            local.data_dir.as_deref(),
            true,
            &validator.field("dataDir"),
            errors,
        );
        validate_cert_sans(
            &local.server_cert_sans,
            &validator.field("serverCertSANs"),
            errors,
        );
        validate_cert_sans(
            &local.peer_cert_sans,
            &validator.field("peerCertSANs"),
            errors,
        );
    }

    if let Some(external) = &etcd.external {
        let validator = validator.field("external");

        if external.endpoints.is_empty() {
            errors.push(
                validator
                    .field("endpoints")
                    .error(ValidationProblem::FieldRequired),
            );
        }

        let files = [&external.ca_file, &external.cert_file, &external.key_file];
        let set = files.iter().filter(|file| file.is_some()).count();
        if set != 0 && set != files.len() {
            errors.push(validator.error(ValidationProblem::Conflict {
                message: "caFile, certFile and keyFile must either all be set or all be unset",
            }));
        }
    }
}

fn validate_node_registration(
    node_registration: &internal::NodeRegistrationOptions,
    validator: &Validator,
    errors: &mut Vec<ValidationError>,
) {
    let name = node_registration
        .name
        .as_ref()
        .map(|name| (name, is_rfc_1123_subdomain(name)));
    if let Some((name, Err(source))) = name {
        errors.push(
            validator
                .field("name")
                .error(ValidationProblem::InvalidName {
                    source,
                    value: name.clone(),
                }),
        );
    }

    validate_absolute_path(
        node_registration.cri_socket.as_deref(),
        true,
        &validator.field("criSocket"),
        errors,
    );
}

fn validate_bootstrap_token(
    token: &internal::BootstrapToken,
    validator: &Validator,
    errors: &mut Vec<ValidationError>,
) {
    match &token.token {
        Some(value) if !BOOTSTRAP_TOKEN_REGEX.is_match(value) => errors.push(
            validator
                .field("token")
                .error(ValidationProblem::InvalidFormat {
                    // The token is a secret
                    value: "<redacted>".to_owned(),
                    pattern: BOOTSTRAP_TOKEN_PATTERN,
                }),
        ),
        _ => {}
    }

    let usages = validator.field("usages");
    for (index, usage) in token.usages.iter().enumerate() {
        if !KNOWN_TOKEN_USAGES.contains(&usage.as_str()) {
            errors.push(usages.index(index).error(ValidationProblem::Unsupported {
                value: usage.clone(),
                supported: KNOWN_TOKEN_USAGES,
            }));
        }
    }

    let groups = validator.field("groups");
    for (index, group) in token.groups.iter().enumerate() {
        if !BOOTSTRAP_GROUP_REGEX.is_match(group) {
            errors.push(groups.index(index).error(ValidationProblem::InvalidFormat {
                value: group.clone(),
                pattern: BOOTSTRAP_GROUP_PATTERN,
            }));
        }
    }
}

fn validate_host_path_mount(
    volume: &internal::HostPathMount,
    validator: &Validator,
    errors: &mut Vec<ValidationError>,
) {
    if volume.name.is_empty() {
        errors.push(validator.field("name").error(ValidationProblem::FieldRequired));
    }

    validate_absolute_path(
        Some(volume.host_path.as_str()),
        true,
        &validator.field("hostPath"),
        errors,
    );
    validate_absolute_path(
        Some(volume.mount_path.as_str()),
        true,
        &validator.field("mountPath"),
        errors,
    );
}

fn validate_audit_policy(
    audit_policy: &internal::AuditPolicyConfiguration,
    validator: &Validator,
    errors: &mut Vec<ValidationError>,
) {
    match audit_policy.log_max_age {
        Some(value) if value < 0 => errors.push(
            validator
                .field("logMaxAge")
                .error(ValidationProblem::Negative { value }),
        ),
        _ => {}
    }

    validate_absolute_path(
        audit_policy.path.as_deref(),
        false,
        &validator.field("path"),
        errors,
    );
    validate_absolute_path(
        audit_policy.log_dir.as_deref(),
        false,
        &validator.field("logDir"),
        errors,
    );
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::defaults::DEFAULTER;

    fn defaulted() -> internal::MasterConfiguration {
        let mut config = internal::MasterConfiguration::new();
        config.api_endpoint.advertise_address = Some("192.168.2.2".into());
        DEFAULTER
            .apply(&mut config)
            .expect("defaulting must succeed");
        config
    }

    fn paths(errors: ValidationErrors) -> Vec<String> {
        errors
            .into_iter()
            .map(|error| error.path.to_string())
            .collect()
    }

    #[test]
    fn defaulted_config_is_valid() {
        validate(&defaulted()).expect("defaulted configuration must be valid");
    }

    #[test]
    fn empty_config_reports_required_fields() {
        let errors = validate(&internal::MasterConfiguration::new())
            .expect_err("an empty configuration is invalid");

        assert_eq!(
            paths(errors),
            [
                "apiEndpoint.bindPort",
                "networking.serviceSubnet",
                "networking.dnsDomain",
                "certificatesDir",
                "kubernetesVersion",
                "etcd",
                "nodeRegistration.criSocket",
            ]
        );
    }

    #[test]
    fn aggregates_all_violations() {
        let mut config = defaulted();
        config.api_endpoint.advertise_address = Some("1.2.3.4.5".into());
        config.api_endpoint.bind_port = Some(0);
        config.networking.pod_subnet = Some("10.0.1.15".into());
        config.networking.dns_domain = Some("cluster_global".into());
        config.certificates_dir = Some("relativepath".into());
        config.node_registration.cri_socket = Some("criruntime.sock".into());
        config.api_server_cert_sans = vec!["example.k8s.io".into(), "not a san".into()];

        let errors = validate(&config).expect_err("configuration is invalid");
        assert_eq!(errors.iter().count(), 7);
        assert_eq!(
            paths(errors),
            [
                "apiEndpoint.advertiseAddress",
                "apiEndpoint.bindPort",
                "networking.podSubnet",
                "networking.dnsDomain",
                "certificatesDir",
                "apiServerCertSANs[1]",
                "nodeRegistration.criSocket",
            ]
        );
    }

    #[rstest]
    #[case("v1.11.2", true)]
    #[case("1.11.2", true)]
    #[case("v1.12.0-beta.1", true)]
    #[case("stable", true)]
    #[case("stable-1", true)]
    #[case("stable-1.11", true)]
    #[case("latest", true)]
    #[case("latest-1.11", true)]
    #[case("v1.11", false)]
    #[case("unstable", false)]
    #[case("", false)]
    fn kubernetes_version(#[case] value: &str, #[case] valid: bool) {
        assert_eq!(is_kubernetes_version(value), valid);
    }

    #[rstest]
    #[case(vec!["*.example.k8s.io", "10.100.0.1", "fd00::1"], vec![])]
    #[case(vec!["EXAMPLE.k8s.io"], vec!["etcd.local.serverCertSANs[0]"])]
    #[case(vec!["example.k8s.io", "a..b", "*"], vec!["etcd.local.serverCertSANs[1]", "etcd.local.serverCertSANs[2]"])]
    fn etcd_server_cert_sans(#[case] sans: Vec<&str>, #[case] expected: Vec<&str>) {
        let mut config = defaulted();
        let local = config.etcd.local.as_mut().expect("local etcd is defaulted");
        local.server_cert_sans = sans.into_iter().map(ToOwned::to_owned).collect();

        let actual = match validate(&config) {
            Ok(()) => Vec::new(),
            Err(errors) => paths(errors),
        };
        assert_eq!(actual, expected);
    }

    #[test]
    fn external_etcd() {
        let mut config = defaulted();
        config.etcd.external = Some(internal::ExternalEtcd {
            endpoints: Vec::new(),
            ca_file: Some("/etc/etcd/ca.crt".into()),
            cert_file: None,
            key_file: None,
        });

        let errors = validate(&config).expect_err("configuration is invalid");
        assert_eq!(
            paths(errors),
            ["etcd", "etcd.external.endpoints", "etcd.external"]
        );
    }

    #[rstest]
    #[case("cp.example.k8s.io:6443", vec![])]
    #[case("[fd00::1]:6443", vec![])]
    #[case("[fd00::1", vec!["controlPlaneEndpoint"])]
    #[case("cp_example:6443", vec!["controlPlaneEndpoint"])]
    fn control_plane_endpoint(#[case] endpoint: &str, #[case] expected: Vec<&str>) {
        let mut config = defaulted();
        config.control_plane_endpoint = Some(endpoint.to_owned());

        let actual = match validate(&config) {
            Ok(()) => Vec::new(),
            Err(errors) => paths(errors),
        };
        assert_eq!(actual, expected);
    }

    #[test]
    fn bootstrap_tokens() {
        let mut config = defaulted();
        config.bootstrap_tokens = vec![internal::BootstrapToken {
            token: Some("abcdef.0123456789abcdef".into()),
            usages: vec!["signing".into(), "encryption".into()],
            groups: vec![
                "system:bootstrappers:kubeadm:default-node-token".into(),
                "system:masters".into(),
            ],
            ..Default::default()
        }];

        let errors = validate(&config).expect_err("configuration is invalid");
        assert_eq!(
            paths(errors),
            ["bootstrapTokens[0].usages[1]", "bootstrapTokens[0].groups[1]"]
        );

        config.bootstrap_tokens[0] = internal::BootstrapToken {
            token: Some("ABCDEF.0123456789abcdef".into()),
            ..Default::default()
        };
        let errors = validate(&config).expect_err("configuration is invalid");
        assert!(!errors.to_string().contains("ABCDEF"));
        assert_eq!(paths(errors), ["bootstrapTokens[0].token"]);
    }

    #[test]
    fn feature_gates_and_volumes() {
        let mut config = defaulted();
        config.feature_gates.insert("CoreDNS".into(), true);
        config.feature_gates.insert("Teleportation".into(), true);
        config.api_server_extra_volumes = vec![internal::HostPathMount {
            name: String::new(),
            host_path: "/etc/kubernetes/audit".into(),
            mount_path: "audit".into(),
            read_only: true,
            path_type: None,
        }];

        let errors = validate(&config).expect_err("configuration is invalid");
        assert_eq!(
            paths(errors),
            [
                "apiServerExtraVolumes[0].name",
                "apiServerExtraVolumes[0].mountPath",
                "featureGates.Teleportation",
            ]
        );
    }

    #[test]
    fn audit_policy() {
        let mut config = defaulted();
        config.audit_policy = Some(internal::AuditPolicyConfiguration {
            path: Some("policy.yaml".into()),
            log_dir: Some("/var/log/kubernetes/audit".into()),
            log_max_age: Some(-1),
        });

        let errors = validate(&config).expect_err("configuration is invalid");
        assert_eq!(
            paths(errors),
            ["auditPolicy.logMaxAge", "auditPolicy.path"]
        );
    }
}
