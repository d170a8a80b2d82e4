use std::sync::OnceLock;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::core::config::AppPaths;

const LOG_FILE_PREFIX: &str = "research.log";
const DEFAULT_FILTER: &str = "info";

/// Keeps the file writer flushing until process exit.
static FILE_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Log to stderr and to a daily-rolling file under `paths.log_dir`.
///
/// `RUST_LOG` overrides the default `info` filter. Only the first call
/// installs a subscriber.
pub fn init(paths: &AppPaths) {
    if let Err(err) = std::fs::create_dir_all(&paths.log_dir) {
        eprintln!("Cannot create {}: {}", paths.log_dir.display(), err);
    }

    let (file_writer, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::daily(&paths.log_dir, LOG_FILE_PREFIX));
    if FILE_GUARD.set(guard).is_err() {
        return;
    }

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(fmt::layer().with_ansi(false).with_writer(file_writer))
        .try_init();
}
