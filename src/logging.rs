//! Tracing subscriber setup
//!
//! The adapter itself only emits `tracing` events. Applications that want
//! them on stderr or in a file call [`init`] once at startup.
//!
//! Environment variables take precedence over the config file:
//! - `STOREDPROC_TRACE_LEVEL`: filter directive, e.g. `storedproc=debug`
//! - `STOREDPROC_TRACE_FILE`: append to this file instead of stderr
//! - `STOREDPROC_TRACE_JSON`: `1` for json lines, `0` for text

use crate::config::LoggingConfig;
use std::env;
use std::sync::OnceLock;
use tracing_appender::non_blocking::WorkerGuard;

static TRACE_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Install the global tracing subscriber.
///
/// Returns `false` if a subscriber was already installed or the log file
/// could not be opened.
pub fn init(logging_config: &LoggingConfig) -> bool {
    let level = env::var("STOREDPROC_TRACE_LEVEL")
        .ok()
        .unwrap_or_else(|| logging_config.level.clone());

    let json = env::var("STOREDPROC_TRACE_JSON")
        .ok()
        .map_or_else(|| logging_config.format == "json", |v| v != "0");

    let log_path = env::var("STOREDPROC_TRACE_FILE")
        .ok()
        .or_else(|| logging_config.file.clone());

    let (writer, guard) = match log_path {
        Some(path) => {
            let file = match std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
            {
                Ok(f) => f,
                Err(e) => {
                    eprintln!("ERROR: Unable to open log file '{path}': {e}");
                    return false;
                }
            };
            tracing_appender::non_blocking(file)
        }
        None => tracing_appender::non_blocking(std::io::stderr()),
    };
    let _ = TRACE_GUARD.set(guard);

    let filter = tracing_subscriber::EnvFilter::try_new(level)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let base = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_writer(writer)
        .with_timer(tracing_subscriber::fmt::time::SystemTime);

    let subscriber: Box<dyn tracing::Subscriber + Send + Sync> = if json {
        Box::new(base.json().finish())
    } else {
        Box::new(base.compact().finish())
    };

    tracing::subscriber::set_global_default(subscriber).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unopenable_log_file() {
        if env::var("STOREDPROC_TRACE_FILE").is_ok() {
            return;
        }
        let temp = tempfile::TempDir::new().unwrap();
        let config = LoggingConfig {
            file: Some(temp.path().join("missing").join("adapter.log").to_string_lossy().into_owned()),
            ..LoggingConfig::default()
        };
        assert!(!init(&config));
    }
}
