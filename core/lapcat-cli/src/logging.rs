//! Log setup: stderr plus a daily file under ~/.lapcat/logs.

use std::env;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

const LOG_FILE_PREFIX: &str = "lapcat.log";

fn debug_forced() -> bool {
    env::var("LAPCAT_DEBUG_LOG")
        .map(|value| matches!(value.as_str(), "1" | "true" | "TRUE" | "yes" | "YES"))
        .unwrap_or(false)
}

fn filter(verbose: bool) -> EnvFilter {
    if verbose || debug_forced() {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    }
}

/// Installs the global subscriber. Keep the guard alive until exit so the
/// file writer flushes.
pub fn init(verbose: bool) -> Option<WorkerGuard> {
    let log_dir = lapcat_core::get_lapcat_dir()
        .map(|dir| dir.join("logs"))
        .filter(|dir| fs_err::create_dir_all(dir).is_ok());

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_ansi(false).with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let stderr_layer = fmt::layer().with_target(false).with_writer(std::io::stderr);

    let installed = tracing_subscriber::registry()
        .with(filter(verbose))
        .with(stderr_layer)
        .with(file_layer)
        .try_init();
    if installed.is_err() {
        return None;
    }
    guard
}
