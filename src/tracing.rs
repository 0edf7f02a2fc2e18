use crate::config::settings::{AppConfig, LoggingConfig, SentryConfig};
use anyhow::Result;
use std::io;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan, MakeWriter},
    layer::SubscriberExt,
    registry::LookupSpan,
    util::SubscriberInitExt,
    EnvFilter, Layer, Registry,
};

/// Guards that must outlive the server so buffered logs and Sentry events are flushed
#[must_use = "dropping the guards stops log and error delivery"]
pub struct TracingGuards {
    _file: Option<WorkerGuard>,
    _sentry: Option<sentry::ClientInitGuard>,
}

impl TracingGuards {
    /// Whether logs go through the non-blocking file appender
    pub fn has_file_writer(&self) -> bool {
        self._file.is_some()
    }
}

/// Initialize the global tracing subscriber: formatted output to the configured
/// target plus, when a DSN is configured, the Sentry layer.
pub fn init_tracing(config: &AppConfig) -> Result<TracingGuards> {
    let logging_config = &config.logging;
    let sentry_config = &config.sentry;

    let sentry_guard = init_sentry(sentry_config)?;
    let env_filter = create_env_filter(logging_config);

    let (output, file_guard) = match logging_config.target.to_lowercase().as_str() {
        "stderr" => (fmt_layer(logging_config, io::stderr), None),
        "file" => {
            let (writer, guard) = file_writer(logging_config)?;
            (fmt_layer(logging_config, writer), Some(guard))
        }
        _ => (fmt_layer(logging_config, io::stdout), None),
    };

    let sentry_layer = sentry_guard.as_ref().map(|_| create_sentry_layer());

    tracing_subscriber::registry()
        .with(output.with_filter(env_filter))
        .with(sentry_layer)
        .try_init()?;

    tracing::info!(
        level = %logging_config.level,
        format = %logging_config.format,
        target = %logging_config.target,
        sentry_enabled = sentry_config.is_enabled(),
        sentry_dsn = %mask_dsn(&sentry_config.dsn),
        "Tracing initialized"
    );

    Ok(TracingGuards {
        _file: file_guard,
        _sentry: sentry_guard,
    })
}

/// Initialize Sentry SDK with configuration
fn init_sentry(config: &SentryConfig) -> Result<Option<sentry::ClientInitGuard>> {
    if !config.is_enabled() {
        return Ok(None);
    }

    let guard = sentry::init(sentry::ClientOptions {
        dsn: Some(config.dsn.parse()?),
        environment: Some(config.environment.clone().into()),
        release: config.release.clone().map(Into::into),
        traces_sample_rate: config.traces_sample_rate,
        max_breadcrumbs: config.max_breadcrumbs,
        debug: config.debug,
        ..Default::default()
    });

    sentry::configure_scope(|scope| {
        scope.set_tag("service", "user-admin");
        scope.set_tag("version", env!("CARGO_PKG_VERSION"));
    });

    Ok(Some(guard))
}

/// Mask sensitive parts of DSN for logging
pub fn mask_dsn(dsn: &str) -> String {
    match dsn.parse::<url::Url>() {
        Ok(parsed) => format!("{}://***@{}", parsed.scheme(), parsed.host_str().unwrap_or("unknown")),
        Err(_) => "***".to_string(),
    }
}

/// Errors become Sentry events, everything down to debug becomes a breadcrumb
fn create_sentry_layer<S>() -> sentry_tracing::SentryLayer<S>
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
{
    sentry_tracing::layer().event_filter(|md| match *md.level() {
        tracing::Level::ERROR => sentry_tracing::EventFilter::Event,
        tracing::Level::TRACE => sentry_tracing::EventFilter::Ignore,
        _ => sentry_tracing::EventFilter::Breadcrumb,
    })
}

/// `RUST_LOG` wins over the configured level; an unparsable level falls back to info
fn create_env_filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

fn fmt_layer<W>(config: &LoggingConfig, writer: W) -> Box<dyn Layer<Registry> + Send + Sync>
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let layer = fmt::layer()
        .with_writer(writer)
        .with_target(true)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_file(config.include_location)
        .with_line_number(config.include_location)
        .with_span_events(FmtSpan::CLOSE);

    match config.format.to_lowercase().as_str() {
        "pretty" => layer.pretty().boxed(),
        "compact" => layer.compact().boxed(),
        _ => layer.json().boxed(),
    }
}

/// Daily-rolling, non-blocking file writer for the configured path
fn file_writer(config: &LoggingConfig) -> Result<(tracing_appender::non_blocking::NonBlocking, WorkerGuard)> {
    let file_path = config
        .file_path
        .as_ref()
        .ok_or_else(|| anyhow::anyhow!("File path is required when target is 'file'"))?;

    let path = std::path::Path::new(file_path);
    let directory = path
        .parent()
        .ok_or_else(|| anyhow::anyhow!("Invalid file path: {}", file_path))?;
    let filename = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| anyhow::anyhow!("Invalid filename: {}", file_path))?;

    std::fs::create_dir_all(directory)?;

    let appender = tracing_appender::rolling::daily(directory, filename);
    Ok(tracing_appender::non_blocking(appender))
}
