//! Structured logging setup
//!
//! Logs go to stderr (stdout belongs to the CLI's JSON output) or to an
//! append-only file when `logging.file_path` is set.

use std::sync::Arc;

use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan, writer::BoxMakeWriter},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use crate::config::LoggingConfig;

/// HTTP and Redis client internals are only interesting when something is wrong
const QUIET_DEPENDENCIES: &[&str] = &["hyper=warn", "hyper_util=warn", "reqwest=warn", "redis=warn"];

/// Install the global subscriber.
///
/// `format = "json"` emits one JSON object per event with span context, any
/// other value gives human-readable output. `RUST_LOG` overrides `level`.
pub fn init_logging(config: &LoggingConfig) -> anyhow::Result<()> {
    let level = parse_log_level(&config.level)?;
    let filter = EnvFilter::try_from_default_env().or_else(|_| default_filter(level))?;
    let to_file = config.file_path.is_some();
    let writer = make_writer(config.file_path.as_deref())?;

    let registry = tracing_subscriber::registry().with(filter);
    if config.format.eq_ignore_ascii_case("json") {
        let layer = fmt::layer()
            .json()
            .with_span_events(FmtSpan::CLOSE)
            .with_current_span(true)
            .with_target(true)
            .with_writer(writer);
        registry.with(layer).try_init()?;
    } else {
        let layer = fmt::layer()
            .compact()
            .with_target(false)
            .with_ansi(!to_file)
            .with_writer(writer);
        registry.with(layer).try_init()?;
    }

    Ok(())
}

fn default_filter(level: Level) -> Result<EnvFilter, tracing_subscriber::filter::ParseError> {
    EnvFilter::try_new(default_directives(level))
}

fn default_directives(level: Level) -> String {
    std::iter::once(level.as_str().to_lowercase())
        .chain(QUIET_DEPENDENCIES.iter().map(ToString::to_string))
        .collect::<Vec<_>>()
        .join(",")
}

fn make_writer(file_path: Option<&str>) -> anyhow::Result<BoxMakeWriter> {
    let Some(path) = file_path else {
        return Ok(BoxMakeWriter::new(std::io::stderr));
    };

    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| anyhow::anyhow!("Cannot open log file {path}: {e}"))?;
    Ok(BoxMakeWriter::new(Arc::new(file)))
}

fn parse_log_level(level: &str) -> anyhow::Result<Level> {
    match level.trim().to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" | "warning" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        _ => Err(anyhow::anyhow!("Invalid log level: {level}")),
    }
}
