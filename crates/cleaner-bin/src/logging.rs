//! Logging bootstrap, modeled on the teacher's `AppStartup::configure_logging`:
//! a non-blocking file appender feeding a `tracing_subscriber::fmt` layer,
//! gated behind the `--logging`/`--logging-csv` flags instead of being
//! unconditional (a one-shot CLI has no reason to always write a log file).

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;

pub struct LoggingGuard {
    _guard: Option<WorkerGuard>,
}

/// Initializes `tracing` for this process. `csv` selects a compact
/// comma-separated field format instead of the default `fmt` layout; both
/// write to `cleaner.log` in the current directory. Returns a guard that must
/// be held until the end of `main` to flush the non-blocking writer.
pub fn init(enabled: bool, csv: bool) -> LoggingGuard {
    if !enabled {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_writer(std::io::stderr)
            .try_init();
        return LoggingGuard { _guard: None };
    }

    let log_dir = Path::new(".");
    let log_path = log_dir.join("cleaner.log");
    if log_path.exists() {
        let _ = std::fs::remove_file(&log_path);
    }

    let file_appender = tracing_appender::rolling::never(log_dir, "cleaner.log");
    let (nb_writer, guard) = tracing_appender::non_blocking(file_appender);

    let subscriber = tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).with_writer(nb_writer);

    let result = if csv {
        subscriber.compact().try_init()
    } else {
        subscriber.try_init()
    };

    match result {
        Ok(()) => LoggingGuard { _guard: Some(guard) },
        Err(_) => LoggingGuard { _guard: None },
    }
}
