//! Logging setup
//!
//! `tracing` everywhere; filtering via the `AB_LOG` environment variable
//! (default `info`). Server processes additionally write a daily-rolling
//! file under the state directory's `logs/`; CLI one-shots log to stderr
//! only.

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// Environment variable controlling the log filter
pub const LOG_ENV_VAR: &str = "AB_LOG";

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV_VAR).unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Initialize stderr-only logging (CLI one-shot commands).
/// Safe to call more than once; later calls are no-ops.
pub fn init_stderr() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Initialize logging for a server process: stderr plus a daily-rolling
/// file in `logs_dir`. The returned guard must be held for the process
/// lifetime or buffered lines are lost.
#[must_use]
pub fn init_server(logs_dir: &Path) -> Option<WorkerGuard> {
    let appender = tracing_appender::rolling::daily(logs_dir, "agent-brain.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let initialized = tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(writer)
        .with_ansi(false)
        .try_init()
        .is_ok();

    initialized.then_some(guard)
}
