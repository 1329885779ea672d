use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Initialize logging.
///
/// With a `log_dir`, records go to `pkgflow.YYYY-MM-DD` files rotated daily in
/// that directory; otherwise they go to stderr. The level defaults to `warn`
/// (`debug` with `--verbose`) and can be overridden via the `PKGFLOW_LOG` or
/// `RUST_LOG` environment variables.
///
/// When logging to a file, the returned [`WorkerGuard`] **must** be held for
/// the lifetime of the program so buffered records are flushed on shutdown.
pub fn init(log_dir: Option<&Path>, verbose: bool) -> Option<WorkerGuard> {
    let default_level = if verbose { "debug" } else { "warn" };
    let env_filter = EnvFilter::try_from_env("PKGFLOW_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    match log_dir {
        Some(dir) => {
            let file_appender = tracing_appender::rolling::daily(dir, "pkgflow");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

            tracing_subscriber::registry()
                .with(
                    fmt::layer()
                        .with_writer(non_blocking)
                        .with_ansi(false)
                        .with_target(true)
                        .with_thread_ids(true),
                )
                .with(env_filter)
                .init();

            Some(guard)
        }
        None => {
            tracing_subscriber::registry()
                .with(
                    fmt::layer()
                        .with_writer(std::io::stderr)
                        .with_target(false),
                )
                .with(env_filter)
                .init();

            None
        }
    }
}
