//! Composes the individual stages into the operations callers actually need.
//!
//! Processing a document runs decode, conversion into the internal version,
//! defaulting, normalization and validation in that order. Every stage but
//! validation stops at its first error. Validation reports all violations at
//! once.

use snafu::{ResultExt, Snafu};
use tracing::{debug, instrument};

use crate::{
    api_version::SchemaVersion,
    apis::internal,
    convert::{self, ConversionError},
    decode::{self, DecodeError, UnsupportedVersionError},
    defaults::{DEFAULTER, Defaulter, DefaultingError},
    encode::{self, EncodeError},
    normalize,
    scheme::{SCHEME, Scheme},
    validation::{self, ValidationErrors},
};

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("the document version is not supported"))]
    UnsupportedVersion { source: UnsupportedVersionError },

    #[snafu(display("failed to decode the document"))]
    Decode { source: DecodeError },

    #[snafu(display("failed to convert the document"))]
    Conversion { source: ConversionError },

    #[snafu(display("failed to default the configuration"))]
    Defaulting { source: DefaultingError },

    #[snafu(display("the configuration is invalid"))]
    Validation { source: ValidationErrors },

    #[snafu(display("failed to encode the configuration"))]
    Encode { source: EncodeError },
}

impl From<decode::Error> for Error {
    fn from(value: decode::Error) -> Self {
        match value {
            decode::Error::UnsupportedVersion { source } => Self::UnsupportedVersion { source },
            decode::Error::Decode { source } => Self::Decode { source },
        }
    }
}

/// Runs the configuration stages against one [`Scheme`] and one [`Defaulter`].
///
/// The pipeline holds no state of its own, so it can be shared freely.
#[derive(Clone, Copy, Debug)]
pub struct Pipeline<'a> {
    scheme: &'a Scheme,
    defaulter: &'a Defaulter,
}

impl Default for Pipeline<'static> {
    fn default() -> Self {
        Self::new(&SCHEME, &DEFAULTER)
    }
}

impl<'a> Pipeline<'a> {
    pub fn new(scheme: &'a Scheme, defaulter: &'a Defaulter) -> Self {
        Self { scheme, defaulter }
    }

    pub fn scheme(&self) -> &'a Scheme {
        self.scheme
    }

    /// Decodes `raw` and turns it into a defaulted, normalized and validated
    /// internal configuration.
    ///
    /// `hint` is only consulted for documents which carry no `apiVersion`.
    #[instrument(skip(self, raw))]
    pub fn process(
        &self,
        raw: &[u8],
        hint: Option<&SchemaVersion>,
    ) -> Result<internal::MasterConfiguration, Error> {
        let document = decode::decode(raw, hint, self.scheme)?;
        let config = convert::to_internal(document, self.scheme).context(ConversionSnafu)?;

        self.complete(config)
    }

    /// Serializes `config` in the `target` version.
    #[instrument(skip(self, config))]
    pub fn render(
        &self,
        config: &internal::MasterConfiguration,
        target: &SchemaVersion,
    ) -> Result<String, Error> {
        encode::encode(config, target, self.scheme).context(EncodeSnafu)
    }

    /// Processes `raw` and renders the result in the `target` version.
    #[instrument(skip(self, raw))]
    pub fn migrate(
        &self,
        raw: &[u8],
        hint: Option<&SchemaVersion>,
        target: &SchemaVersion,
    ) -> Result<String, Error> {
        let config = self.process(raw, hint)?;
        self.render(&config, target)
    }

    /// Returns the configuration every unset field defaults to.
    #[instrument(skip(self))]
    pub fn defaulted_config(&self) -> Result<internal::MasterConfiguration, Error> {
        self.complete(internal::MasterConfiguration::new())
    }

    fn complete(
        &self,
        mut config: internal::MasterConfiguration,
    ) -> Result<internal::MasterConfiguration, Error> {
        self.defaulter
            .apply(&mut config)
            .context(DefaultingSnafu)?;
        normalize::normalize(&mut config);
        validation::validate(&config).context(ValidationSnafu)?;

        debug!("configuration is valid");
        Ok(config)
    }
}

/// Runs [`Pipeline::process`] with the built-in scheme and default rules.
pub fn process(
    raw: &[u8],
    hint: Option<&SchemaVersion>,
) -> Result<internal::MasterConfiguration, Error> {
    Pipeline::default().process(raw, hint)
}

/// Runs [`Pipeline::render`] with the built-in scheme.
pub fn render(
    config: &internal::MasterConfiguration,
    target: &SchemaVersion,
) -> Result<String, Error> {
    Pipeline::default().render(config, target)
}

/// Runs [`Pipeline::migrate`] with the built-in scheme and default rules.
pub fn migrate(
    raw: &[u8],
    hint: Option<&SchemaVersion>,
    target: &SchemaVersion,
) -> Result<String, Error> {
    Pipeline::default().migrate(raw, hint, target)
}

/// Runs [`Pipeline::defaulted_config`] with the built-in scheme and default
/// rules.
pub fn defaulted_config() -> Result<internal::MasterConfiguration, Error> {
    Pipeline::default().defaulted_config()
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use indoc::indoc;
    use rstest::rstest;

    use super::*;
    use crate::{
        apis::v1alpha3,
        defaults::{DefaultRule, builtin_rules},
    };

    #[test]
    fn process_normalizes_and_validates() {
        let raw = indoc! {"
            apiVersion: kubeadm.k8s.io/v1alpha3
            kind: MasterConfiguration
            apiEndpoint:
              advertiseAddress: 192.168.2.2
            apiServerCertSANs:
            - Master.Example.com
            - 10.100.0.1
        "};

        let config = process(raw.as_bytes(), None).expect("document must be processed");
        assert_eq!(config.api_server_cert_sans, ["master.example.com", "10.100.0.1"]);
        assert_eq!(config.api_endpoint.bind_port, Some(6443));
        assert_eq!(config.api_version, "kubeadm.k8s.io/__internal");
    }

    #[test]
    fn process_uses_hint_without_api_version() {
        let raw = "api:\n  bindPort: 7443\n";
        let hint = SchemaVersion::from_str("kubeadm.k8s.io/v1alpha2").expect("valid version");

        let config = process(raw.as_bytes(), Some(&hint)).expect("document must be processed");
        assert_eq!(config.api_endpoint.bind_port, Some(7443));
    }

    #[rstest]
    #[case::deprecated("apiVersion: kubeadm.k8s.io/v1alpha1\nkind: MasterConfiguration\n")]
    #[case::missing("kind: MasterConfiguration\n")]
    #[case::wrong_kind("apiVersion: kubeadm.k8s.io/v1alpha3\nkind: NodeConfiguration\n")]
    fn unsupported_version(#[case] raw: &str) {
        let err = process(raw.as_bytes(), None).expect_err("document must be rejected");
        assert!(matches!(err, Error::UnsupportedVersion { .. }), "{err:?}");
    }

    #[test]
    fn decode_error() {
        let raw = "apiVersion: kubeadm.k8s.io/v1alpha3\nkind: MasterConfiguration\nnope: 1\n";
        let err = process(raw.as_bytes(), None).expect_err("unknown fields are rejected");
        assert!(matches!(err, Error::Decode { .. }), "{err:?}");
    }

    #[test]
    fn validation_errors_are_aggregated() {
        let raw = indoc! {"
            apiVersion: kubeadm.k8s.io/v1alpha3
            kind: MasterConfiguration
            certificatesDir: relativepath
            networking:
              dnsDomain: cluster_global
        "};

        let err = process(raw.as_bytes(), None).expect_err("document is invalid");
        let source = match err {
            Error::Validation { source } => source,
            other => unreachable!("expected validation errors, got {other:?}"),
        };
        assert_eq!(source.iter().count(), 2);
    }

    #[test]
    fn defaulting_error() {
        let rules: Vec<_> = builtin_rules()
            .into_iter()
            .filter(|rule| rule.name != "image-repository")
            .collect();
        let defaulter = Defaulter::new(&rules).expect("rules must form a DAG");
        let pipeline = Pipeline::new(&SCHEME, &defaulter);

        let raw = "apiVersion: kubeadm.k8s.io/v1alpha3\nkind: MasterConfiguration\n";
        let err = pipeline
            .process(raw.as_bytes(), None)
            .expect_err("the etcd image repository can not be derived");
        assert!(matches!(err, Error::Defaulting { .. }), "{err:?}");
    }

    #[rstest]
    #[case::fraction("1.5h", "1h30m0s")]
    #[case::microseconds("10us", "10\u{b5}s")]
    fn token_ttl(#[case] ttl: &str, #[case] expected: &str) {
        let raw = format!(
            "apiVersion: kubeadm.k8s.io/v1alpha3\nkind: MasterConfiguration\nbootstrapTokens:\n- ttl: {ttl}\n"
        );

        let config = process(raw.as_bytes(), None).expect("document must be processed");
        let ttl = config.bootstrap_tokens[0].ttl.expect("ttl must be set");
        assert_eq!(ttl.to_string(), expected);
    }

    #[test]
    fn load_balancer_port_is_not_the_bind_port() {
        let raw = indoc! {"
            apiVersion: kubeadm.k8s.io/v1alpha3
            kind: MasterConfiguration
            controlPlaneEndpoint: lb.example.com:443
        "};

        let config = process(raw.as_bytes(), None).expect("document must be processed");
        assert_eq!(config.api_endpoint.bind_port, Some(6443));
    }

    #[test]
    fn custom_defaulter() {
        let defaulter = Defaulter::new(&[DefaultRule {
            name: "cluster-name",
            writes: &["clusterName"],
            reads: &[],
            apply: |config| {
                config.cluster_name = Some("custom".into());
                Ok(())
            },
        }])
        .expect("rules must form a DAG");
        let pipeline = Pipeline::new(&SCHEME, &defaulter);

        // Without the built-in rules the required fields stay unset
        let err = pipeline
            .defaulted_config()
            .expect_err("configuration is incomplete");
        assert!(matches!(err, Error::Validation { .. }));
    }

    #[test]
    fn migrate_to_preferred_version() {
        let raw = indoc! {"
            apiVersion: kubeadm.k8s.io/v1alpha2
            kind: MasterConfiguration
            api:
              advertiseAddress: 192.168.2.2
              controlPlaneEndpoint: cp.example.k8s.io
        "};

        let target = SCHEME.preferred_version();
        let rendered = migrate(raw.as_bytes(), None, target).expect("document must migrate");

        assert!(rendered.starts_with("apiVersion: kubeadm.k8s.io/v1alpha3\n"));
        assert!(rendered.contains("controlPlaneEndpoint: cp.example.k8s.io\n"));

        let config = process(rendered.as_bytes(), None).expect("output must be processable");
        assert_eq!(
            config.control_plane_endpoint.as_deref(),
            Some("cp.example.k8s.io")
        );
    }

    #[test]
    fn defaulted_config_renders() {
        let config = defaulted_config().expect("defaults must be valid");
        let target = SchemaVersion::from_str(v1alpha3::API_VERSION).expect("valid version");

        let rendered = render(&config, &target).expect("configuration must render");
        assert!(rendered.contains("kubernetesVersion: stable-1.11\n"));
    }
}
