//! Logging setup
//!
//! Two rolling files under `log_dir`: the application log (level from
//! config, overridable with `RUST_LOG`) and `audit.log`, which captures the
//! `audit` and `notify` targets emitted at the transfer engine's exits. The
//! audit trail is always JSON and ignores the application level, so turning
//! the app log down to `warn` never drops audit events.

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::RollingFileAppender;
use tracing_subscriber::filter::Targets;
use tracing_subscriber::{EnvFilter, Layer, fmt, prelude::*};

use crate::config::AppConfig;

/// Writer guards; dropping them stops the non-blocking log threads, so the
/// caller holds this for the life of the process.
pub struct LogGuards {
    _app: WorkerGuard,
    _audit: WorkerGuard,
}

fn rolling_file(config: &AppConfig, file_name: &str) -> RollingFileAppender {
    match config.rotation.as_str() {
        "hourly" => tracing_appender::rolling::hourly(&config.log_dir, file_name),
        "daily" => tracing_appender::rolling::daily(&config.log_dir, file_name),
        _ => tracing_appender::rolling::never(&config.log_dir, file_name),
    }
}

fn app_filter(config: &AppConfig) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone()))
}

pub fn init_logging(config: &AppConfig) -> LogGuards {
    let (app_writer, app_guard) =
        tracing_appender::non_blocking(rolling_file(config, &config.log_file));
    let (audit_writer, audit_guard) =
        tracing_appender::non_blocking(rolling_file(config, "audit.log"));

    fn audit_layer<S>(audit_writer: tracing_appender::non_blocking::NonBlocking) -> impl Layer<S>
    where
        S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
    {
        fmt::layer()
            .json()
            .with_writer(audit_writer)
            .with_ansi(false)
            .with_filter(
                Targets::new()
                    .with_target("audit", tracing::Level::INFO)
                    .with_target("notify", tracing::Level::INFO),
            )
    }

    if config.use_json {
        let app_layer = fmt::layer()
            .json()
            .with_writer(app_writer)
            .with_ansi(false)
            .with_filter(app_filter(config));
        tracing_subscriber::registry()
            .with(app_layer)
            .with(audit_layer(audit_writer))
            .init();
    } else {
        let app_layer = fmt::layer()
            .with_writer(app_writer)
            .with_ansi(false)
            .with_filter(app_filter(config));
        let stdout_layer = fmt::layer()
            .with_ansi(true)
            .with_filter(app_filter(config));
        tracing_subscriber::registry()
            .with(app_layer)
            .with(stdout_layer)
            .with(audit_layer(audit_writer))
            .init();
    }

    LogGuards {
        _app: app_guard,
        _audit: audit_guard,
    }
}
