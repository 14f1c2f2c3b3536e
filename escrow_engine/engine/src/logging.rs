pub use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing with both stdout and rolling file output.
///
/// `filter` uses `RUST_LOG` syntax; when empty the `RUST_LOG` environment
/// variable is consulted and `info` is the fallback. The returned guard
/// flushes the file writer and must stay alive for the life of the process.
pub fn init_logging(log_dir: &str, file_prefix: &str, json_format: bool, filter: &str) -> WorkerGuard {
    // Log file = {log_dir}/{file_prefix}.log.{date}
    let file_appender = rolling::daily(log_dir, format!("{file_prefix}.log"));
    let (non_blocking_file, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = if filter.trim().is_empty() {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    } else {
        EnvFilter::new(filter)
    };

    let stdout_layer = fmt::layer()
        .with_writer(std::io::stdout)
        .with_target(false)
        .with_level(true);

    // logfmt or JSON depending on input
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
            .with_ansi(false)
            .with_target(false)
            .with_level(true)
            .boxed()
    };

    // try_init so tests and repeated calls do not panic
    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer)
        .try_init();

    guard
}
