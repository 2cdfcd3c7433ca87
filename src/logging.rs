//! File logging setup shared by hosts of the engine.

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// Log to `dir/file_name` (never rotated). Filter comes from `RUST_LOG`,
/// defaulting to `info`.
///
/// Keep the returned guard alive for as long as logs should be flushed.
pub fn init_file_logging(dir: impl AsRef<Path>, file_name: &str) -> WorkerGuard {
    let file_appender = tracing_appender::rolling::never(dir.as_ref(), file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    // A subscriber may already be installed by the host
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(non_blocking)
        .with_ansi(false)
        .try_init();
    guard
}
