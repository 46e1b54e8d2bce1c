//! Tracing subscriber bootstrap.

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,tiller=debug"))
}

/// Install the default fmt subscriber. Safe to call more than once;
/// later calls are ignored.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .try_init();
}

/// Install a subscriber that also writes daily-rotated files under
/// `log_dir`. The returned guard must be held for the lifetime of the
/// process or buffered lines are lost.
pub fn init_tracing_with_file(log_dir: &str, file_prefix: &str) -> WorkerGuard {
    let appender = tracing_appender::rolling::daily(log_dir, file_prefix);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(writer)
        .with_ansi(false)
        .try_init();

    guard
}
