use std::path::PathBuf;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

const LOG_FILE_PREFIX: &str = "bmi_relay";
const DEFAULT_LOG_FILTER: &str = "info";

pub struct FileLogger {
    log_directory: PathBuf,
    rotation: Rotation,
}

impl FileLogger {
    pub fn new(log_directory: PathBuf) -> Self {
        Self {
            log_directory,
            rotation: Rotation::DAILY,
        }
    }

    /// Create the log directory and a non-blocking writer into a rolling file.
    /// The guard must be kept alive for buffered lines to be flushed.
    pub fn setup_file_logging(&self) -> std::io::Result<(NonBlocking, WorkerGuard)> {
        std::fs::create_dir_all(&self.log_directory)?;

        let file_appender =
            RollingFileAppender::new(self.rotation.clone(), &self.log_directory, LOG_FILE_PREFIX);

        Ok(tracing_appender::non_blocking(file_appender))
    }
}

/// Install the global subscriber: console output, plus a rolling file when `log_dir` is set.
/// `RUST_LOG` overrides the default `info` filter.
pub fn setup_logging(log_dir: Option<&str>) -> std::io::Result<Option<WorkerGuard>> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    match log_dir {
        Some(dir) => {
            let (file_writer, guard) = FileLogger::new(PathBuf::from(dir)).setup_file_logging()?;
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer()) // Console output
                .with(
                    fmt::layer()
                        .with_writer(file_writer)
                        .with_ansi(false), // Disable ANSI colors for file logs
                )
                .init();
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer())
                .init();
            Ok(None)
        }
    }
}
