//! Logging initialization and configuration.
//!
//! Uses the `tracing` ecosystem for structured logging with support for
//! both human-readable and JSON output formats, plus an optional plain-text
//! log file per run.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize the logging subsystem.
///
/// # Arguments
///
/// * `level` - Default filter directive when RUST_LOG is unset.
/// * `json_format` - If true, outputs structured JSON logs; otherwise pretty-printed.
/// * `directory` - If set, also writes `lustre_<timestamp>.log` there.
///
/// # Notes
///
/// - Log output goes to stderr (stdout is reserved for data output)
/// - The RUST_LOG environment variable can override the log level
pub fn init(level: &str, json_format: bool, directory: Option<&Path>) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let mut log_path = None;
    let mut file_error = None;
    let file_layer = match directory.map(open_log_file).transpose() {
        Ok(Some((file, path))) => {
            log_path = Some(path);
            Some(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
        }
        Ok(None) => None,
        Err(e) => {
            file_error = Some(e);
            None
        }
    };

    let stderr_json = json_format.then(|| fmt::layer().json().with_writer(std::io::stderr));
    let stderr_pretty = (!json_format).then(|| {
        fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
            .with_ansi(true)
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_json)
        .with(stderr_pretty)
        .with(file_layer)
        .init();

    if let Some(path) = log_path {
        tracing::debug!("Logging to {:?}", path);
    }
    if let Some(e) = file_error {
        tracing::warn!("Log file disabled: {e}");
    }
}

/// Initialize logging with settings from the configuration.
///
/// `--verbose` forces debug level and `--json-logs` forces JSON output.
pub fn init_from_config(
    config: &lustre_core::Config,
    verbose_override: bool,
    json_logs_override: bool,
) {
    let level = if verbose_override {
        "debug"
    } else {
        config.logging.level.as_str()
    };
    let json_format = json_logs_override || config.logging.format == "json";
    init(level, json_format, config.logging.directory.as_deref());
}

fn log_file_name(now: chrono::DateTime<chrono::Local>) -> String {
    format!("lustre_{}.log", now.format("%Y%m%d_%H%M%S"))
}

fn open_log_file(directory: &Path) -> std::io::Result<(File, PathBuf)> {
    std::fs::create_dir_all(directory)?;
    let path = directory.join(log_file_name(chrono::Local::now()));
    Ok((File::create(&path)?, path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_log_file_name() {
        let now = chrono::Local
            .with_ymd_and_hms(2024, 3, 9, 14, 5, 7)
            .single()
            .unwrap();
        assert_eq!(log_file_name(now), "lustre_20240309_140507.log");
    }

    #[test]
    fn test_open_log_file_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let logs = dir.path().join("logs");
        let (_, path) = open_log_file(&logs).unwrap();
        assert!(path.exists());
        assert!(path.starts_with(&logs));
    }
}
