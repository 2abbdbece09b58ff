//! Reads, migrates and validates kubeadm master configuration files.
//!
//! All file access happens here, the library only ever sees bytes.

use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use clap::{Args, Parser, Subcommand};
use kubeadm_config::{SchemaVersion, pipeline, scheme::SCHEME};
use snafu::{ResultExt, Snafu};
use tracing::info;

mod logging;

const APP_NAME: &str = "kubeadm-config";
const LOG_ENV: &str = "KUBEADM_CONFIG_LOG";

#[derive(Debug, Snafu)]
enum Error {
    #[snafu(display("failed to initialize logging"))]
    InitLogging { source: logging::Error },

    #[snafu(display("failed to read configuration file {}", path.display()))]
    ReadConfig {
        source: std::io::Error,
        path: PathBuf,
    },

    #[snafu(display("failed to write configuration file {}", path.display()))]
    WriteConfig {
        source: std::io::Error,
        path: PathBuf,
    },

    #[snafu(display("failed to write to stdout"))]
    WriteStdout { source: std::io::Error },

    #[snafu(display("failed to migrate configuration file {}", path.display()))]
    Migrate {
        source: pipeline::Error,
        path: PathBuf,
    },

    #[snafu(display("configuration file {} is not valid", path.display()))]
    Validate {
        source: pipeline::Error,
        path: PathBuf,
    },

    #[snafu(display("failed to build the default configuration"))]
    DefaultConfig { source: pipeline::Error },
}

#[derive(Debug, Parser)]
#[command(
    name = APP_NAME,
    author,
    version,
    about = "Migrates, defaults and validates kubeadm master configuration files"
)]
struct Opts {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Converts a configuration file into another API version, filling in all
    /// defaults on the way.
    Migrate(MigrateArguments),

    /// Prints the configuration used when no configuration file is given.
    PrintDefault(PrintDefaultArguments),

    /// Checks a configuration file and reports every problem found in it.
    Validate(ValidateArguments),
}

#[derive(Debug, Args)]
struct MigrateArguments {
    /// The configuration file to migrate.
    #[arg(long, value_name = "FILE", env = "KUBEADM_CONFIG_OLD_CONFIG")]
    old_config: PathBuf,

    /// Where to write the migrated configuration. Written to stdout if omitted.
    #[arg(long, value_name = "FILE", env = "KUBEADM_CONFIG_NEW_CONFIG")]
    new_config: Option<PathBuf>,

    /// The apiVersion assumed for documents which declare none.
    #[arg(long, env = "KUBEADM_CONFIG_FALLBACK_API_VERSION")]
    fallback_api_version: Option<SchemaVersion>,

    /// The apiVersion to write. Defaults to the preferred version.
    #[arg(long, env = "KUBEADM_CONFIG_API_VERSION")]
    api_version: Option<SchemaVersion>,
}

#[derive(Debug, Args)]
struct PrintDefaultArguments {
    /// The apiVersion to write. Defaults to the preferred version.
    #[arg(long, env = "KUBEADM_CONFIG_API_VERSION")]
    api_version: Option<SchemaVersion>,
}

#[derive(Debug, Args)]
struct ValidateArguments {
    /// The configuration file to validate.
    #[arg(long, value_name = "FILE", env = "KUBEADM_CONFIG_CONFIG")]
    config: PathBuf,

    /// The apiVersion assumed for documents which declare none.
    #[arg(long, env = "KUBEADM_CONFIG_FALLBACK_API_VERSION")]
    fallback_api_version: Option<SchemaVersion>,
}

#[snafu::report]
fn main() -> Result<(), Error> {
    let opts = Opts::parse();
    logging::initialize_logging(LOG_ENV, APP_NAME).context(InitLoggingSnafu)?;

    match opts.command {
        Command::Migrate(arguments) => migrate(&arguments),
        Command::PrintDefault(arguments) => print_default(&arguments),
        Command::Validate(arguments) => validate(&arguments),
    }
}

fn target_version(api_version: Option<&SchemaVersion>) -> &SchemaVersion {
    api_version.unwrap_or_else(|| SCHEME.preferred_version())
}

fn read_config(path: &Path) -> Result<Vec<u8>, Error> {
    fs::read(path).context(ReadConfigSnafu { path })
}

fn write_output(path: Option<&Path>, rendered: &str) -> Result<(), Error> {
    match path {
        Some(path) => fs::write(path, rendered).context(WriteConfigSnafu { path }),
        None => std::io::stdout()
            .lock()
            .write_all(rendered.as_bytes())
            .context(WriteStdoutSnafu),
    }
}

fn migrate(arguments: &MigrateArguments) -> Result<(), Error> {
    let path = &arguments.old_config;
    let target = target_version(arguments.api_version.as_ref());

    let raw = read_config(path)?;
    let rendered = pipeline::migrate(&raw, arguments.fallback_api_version.as_ref(), target)
        .context(MigrateSnafu { path })?;

    info!(old_config = %path.display(), %target, "migrated configuration");
    write_output(arguments.new_config.as_deref(), &rendered)
}

fn print_default(arguments: &PrintDefaultArguments) -> Result<(), Error> {
    let target = target_version(arguments.api_version.as_ref());

    let config = pipeline::defaulted_config().context(DefaultConfigSnafu)?;
    let rendered = pipeline::render(&config, target).context(DefaultConfigSnafu)?;

    write_output(None, &rendered)
}

fn validate(arguments: &ValidateArguments) -> Result<(), Error> {
    let path = &arguments.config;

    let raw = read_config(path)?;
    pipeline::process(&raw, arguments.fallback_api_version.as_ref())
        .context(ValidateSnafu { path })?;

    info!(config = %path.display(), "configuration is valid");
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;
    use indoc::indoc;

    use super::*;

    const INCOMPLETE: &str = indoc! {"
        apiVersion: kubeadm.k8s.io/v1alpha2
        kind: MasterConfiguration
        api:
          advertiseAddress: 192.168.2.2
          bindPort: 7443
    "};

    #[test]
    fn verify_cli() {
        Opts::command().debug_assert();
    }

    #[test]
    fn parse_migrate() {
        let opts = Opts::try_parse_from([
            APP_NAME,
            "migrate",
            "--old-config",
            "old.yaml",
            "--api-version",
            "kubeadm.k8s.io/v1alpha2",
        ])
        .expect("arguments must parse");

        let Command::Migrate(arguments) = opts.command else {
            unreachable!("expected the migrate command");
        };
        assert_eq!(arguments.old_config, PathBuf::from("old.yaml"));
        assert_eq!(
            arguments.api_version.as_ref().map(ToString::to_string),
            Some("kubeadm.k8s.io/v1alpha2".to_owned())
        );
    }

    #[test]
    fn reject_invalid_api_version() {
        Opts::try_parse_from([APP_NAME, "print-default", "--api-version", "v1alpha3"])
            .expect_err("an apiVersion needs a group");
    }

    #[test]
    fn migrate_file() {
        let dir = tempfile::tempdir().expect("temporary directory must be created");
        let old_config = dir.path().join("old.yaml");
        let new_config = dir.path().join("new.yaml");
        fs::write(&old_config, INCOMPLETE).expect("old configuration must be written");

        migrate(&MigrateArguments {
            old_config,
            new_config: Some(new_config.clone()),
            fallback_api_version: None,
            api_version: None,
        })
        .expect("configuration must migrate");

        let migrated = fs::read_to_string(new_config).expect("new configuration must be written");
        assert!(migrated.starts_with("apiVersion: kubeadm.k8s.io/v1alpha3\n"));
        assert!(migrated.contains("apiEndpoint:\n  advertiseAddress: 192.168.2.2\n  bindPort: 7443\n"));
    }

    #[test]
    fn validate_file() {
        let dir = tempfile::tempdir().expect("temporary directory must be created");
        let config = dir.path().join("config.yaml");

        fs::write(&config, INCOMPLETE).expect("configuration must be written");
        validate(&ValidateArguments {
            config: config.clone(),
            fallback_api_version: None,
        })
        .expect("configuration must be valid");

        fs::write(&config, "apiVersion: kubeadm.k8s.io/v1alpha3\ncertificatesDir: pki\n")
            .expect("configuration must be written");
        let err = validate(&ValidateArguments {
            config,
            fallback_api_version: None,
        })
        .expect_err("a relative certificatesDir is invalid");
        assert!(matches!(err, Error::Validate { .. }));
    }

    #[test]
    fn missing_file() {
        let dir = tempfile::tempdir().expect("temporary directory must be created");

        let err = validate(&ValidateArguments {
            config: dir.path().join("missing.yaml"),
            fallback_api_version: None,
        })
        .expect_err("a missing file can not be validated");
        assert!(matches!(err, Error::ReadConfig { .. }));
    }
}
