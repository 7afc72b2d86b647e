use std::path::Path;

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;

const LOG_FILE_PREFIX: &str = "ignite.log";

/// Flushes buffered file log lines when dropped; hold it for the life of `main`.
pub struct FileLogGuard(WorkerGuard);

fn open_log_writer(dir: &Path) -> std::io::Result<(NonBlocking, WorkerGuard)> {
    std::fs::create_dir_all(dir)?;
    let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
    Ok(tracing_appender::non_blocking(appender))
}

pub fn init_tracing(config: &Config) -> Option<FileLogGuard> {
    let env_filter =
        EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    let file_writer = config
        .file_logs
        .then(|| open_log_writer(&config.log_dir))
        .transpose();
    let (file_writer, open_error) = match file_writer {
        Ok(writer) => (writer, None),
        Err(err) => (None, Some(err)),
    };
    let (writer, guard) = file_writer.unzip();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(true))
        .with(writer.map(|w| fmt::layer().with_writer(w).with_ansi(false).with_target(true)))
        .init();

    if let Some(err) = open_error {
        tracing::warn!(
            log_dir = %config.log_dir.display(),
            error = %err,
            "file logging disabled: cannot create log directory"
        );
    }

    guard.map(FileLogGuard)
}
