//! Logging setup: console output (human or JSON) and an optional rolling
//! JSON log file

use anyhow::Result;
use std::ffi::OsStr;
use std::path::Path;
use tracing::info;
use tracing_appender::{non_blocking::WorkerGuard, rolling};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LogSettings;

const CRATES: [&str; 3] = ["siasync", "siasync_engine", "siasync_core"];

fn level_name(level: &str) -> &'static str {
    match level.to_lowercase().as_str() {
        "trace" => "trace",
        "debug" => "debug",
        "warn" => "warn",
        "error" => "error",
        _ => "info",
    }
}

/// Default filter when `RUST_LOG` is unset
pub fn filter_directive(level: &str) -> String {
    let level = level_name(level);
    CRATES
        .iter()
        .map(|krate| format!("{}={}", krate, level))
        .collect::<Vec<_>>()
        .join(",")
}

/// Install the global subscriber. Keep the returned guard alive for the
/// life of the process or buffered file output is lost.
pub fn init_logging(settings: &LogSettings) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directive(&settings.level)));

    let human_layer = if settings.json {
        None
    } else {
        Some(fmt::layer().with_target(true))
    };
    let json_layer = if settings.json {
        Some(fmt::layer().json().with_current_span(true))
    } else {
        None
    };

    let (file_layer, guard) = match &settings.file {
        Some(log_path) => {
            let directory = log_path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            std::fs::create_dir_all(directory)?;
            let file_name = log_path
                .file_name()
                .unwrap_or_else(|| OsStr::new("siasync.log"));

            let appender = match settings.rotation.as_str() {
                "hourly" => rolling::hourly(directory, file_name),
                "never" => rolling::never(directory, file_name),
                _ => rolling::daily(directory, file_name),
            };
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_writer(non_blocking)
                .json()
                .with_current_span(true)
                .with_span_list(true);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(human_layer)
        .with(json_layer)
        .with(file_layer)
        .try_init()?;

    info!(
        level = level_name(&settings.level),
        json = settings.json,
        file = settings.file.as_ref().map(|p| p.display().to_string()).unwrap_or_default(),
        "Logging initialized"
    );

    Ok(guard)
}
