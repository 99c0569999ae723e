use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::error::{NotaryError, Result};

/// Initialize tracing with both stdout and rolling file output.
/// Format: human-readable logfmt OR JSON if desired. Level comes from
/// `RUST_LOG`, defaulting to `info`.
///
/// Keep the returned guard alive for as long as file logging should flush.
pub fn init_logging(log_dir: &str, json_format: bool) -> Result<WorkerGuard> {
    // Log file = {log_dir}/notary.log.{date}
    let file_appender = rolling::daily(log_dir, "notary.log");
    let (non_blocking_file, guard) = tracing_appender::non_blocking(file_appender);

    // Console layer (stderr so command output on stdout stays clean)
    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_level(true);

    // File layer (logfmt or JSON format depending on input)
    let file_layer = if json_format {
        fmt::layer()
            .json()
            .with_writer(non_blocking_file)
            .with_current_span(false)
            .with_span_list(false)
            .with_level(true)
            .boxed()
    } else {
        fmt::layer()
            .with_writer(non_blocking_file)
            .with_target(false)
            .with_ansi(false)
            .with_level(true)
            .boxed()
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    // Combine all layers and set global subscriber
    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| NotaryError::Storage(format!("logging already initialized: {e}")))?;

    Ok(guard)
}
