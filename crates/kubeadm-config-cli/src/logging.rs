use std::path::{Path, PathBuf};

use snafu::{ResultExt, Snafu};
use tracing_appender::rolling::{InitError, RollingFileAppender, Rotation};
use tracing_subscriber::{
    EnvFilter, Registry,
    filter::LevelFilter,
    fmt,
    layer::SubscriberExt,
    util::{SubscriberInitExt, TryInitError},
};

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to initialize rolling file appender in {}", directory.display()))]
    InitRollingFileAppender {
        source: InitError,
        directory: PathBuf,
    },

    #[snafu(display("failed to install the global tracing subscriber"))]
    InstallSubscriber { source: TryInitError },
}

/// Initializes `tracing` logging with the filter read from the environment
/// variable `env`, defaulting to INFO.
///
/// Log output is written to stderr, so that it never mixes with rendered
/// configuration documents. It is additionally copied into a daily rotated
/// file when `{env}_DIRECTORY` is set to a directory path.
pub fn initialize_logging(env: &str, app_name: &str) -> Result<(), Error> {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .with_env_var(env)
        .from_env_lossy();

    let file_appender_directory = std::env::var_os(format!("{env}_DIRECTORY")).map(PathBuf::from);
    let file_layer = file_appender_directory
        .as_deref()
        .map(|directory| rolling_file_appender(directory, app_name))
        .transpose()?
        .map(|appender| fmt::layer().with_ansi(false).with_writer(appender));

    Registry::default()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .try_init()
        .context(InstallSubscriberSnafu)?;

    // Logging is only possible once the subscriber is installed
    match file_appender_directory {
        Some(directory) => tracing::info!(directory = %directory.display(), "file logging enabled"),
        None => tracing::debug!("file logging disabled, because no log directory set"),
    }

    Ok(())
}

fn rolling_file_appender(directory: &Path, app_name: &str) -> Result<RollingFileAppender, Error> {
    RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_suffix(format!("{app_name}.log"))
        .max_log_files(6)
        .build(directory)
        .context(InitRollingFileAppenderSnafu { directory })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rolling_file_appender_in_unusable_directory() {
        let dir = tempfile::tempdir().expect("temporary directory must be created");
        let file = dir.path().join("file");
        std::fs::write(&file, "").expect("file must be written");

        // A file where the log directory should be can not be turned into one
        let err = rolling_file_appender(&file.join("logs"), "kubeadm-config")
            .expect_err("the log directory can not be created");
        assert!(matches!(err, Error::InitRollingFileAppender { .. }));
    }

    #[test]
    fn rolling_file_appender_creates_directory() {
        let dir = tempfile::tempdir().expect("temporary directory must be created");
        let directory = dir.path().join("logs");

        rolling_file_appender(&directory, "kubeadm-config").expect("appender must be created");
        assert!(directory.is_dir());
    }
}
