//! Logging setup (spec §6 ambient stack: `tracing` + `tracing-subscriber`,
//! with optional JSON formatting and file output via `tracing-appender`).
//!
//! [`LoggingBuilder`] is the manual, code-first entry point; [`init_from_config`]
//! builds the same kind of subscriber from a loaded [`crate::config::LoggingConfig`]
//! so a process can be fully driven by its config file/environment instead.

use std::sync::OnceLock;

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::config::{LogFormat, LogOutput, LoggingConfig};

/// Span event configuration for logging.
///
/// Controls when span lifecycle events (new/enter/exit/close) are logged.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpanEvents {
    pub new: bool,
    pub enter: bool,
    pub exit: bool,
    pub close: bool,
}

impl SpanEvents {
    pub const NONE: Self = Self { new: false, enter: false, exit: false, close: false };

    /// Log span creation and close events only.
    pub const LIFECYCLE: Self = Self { new: true, enter: false, exit: false, close: true };

    /// Log all span events.
    pub const FULL: Self = Self { new: true, enter: true, exit: true, close: true };

    /// Log only enter and exit events.
    pub const ACTIVE: Self = Self { new: false, enter: true, exit: true, close: false };

    fn to_fmt_span(self) -> fmt::format::FmtSpan {
        let mut span = fmt::format::FmtSpan::NONE;
        if self.new {
            span |= fmt::format::FmtSpan::NEW;
        }
        if self.enter {
            span |= fmt::format::FmtSpan::ENTER;
        }
        if self.exit {
            span |= fmt::format::FmtSpan::EXIT;
        }
        if self.close {
            span |= fmt::format::FmtSpan::CLOSE;
        }
        span
    }
}

/// Initializes logging with default settings (`info`, pretty, stdout).
///
/// # Panics
/// Panics if a subscriber has already been set.
pub fn init() {
    init_with_filter("info");
}

/// Initializes logging with a custom filter string, e.g.
/// `"conduit_runtime=debug,conduit_transport=trace"`.
///
/// # Panics
/// Panics if a subscriber has already been set.
pub fn init_with_filter(filter: &str) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));
    tracing_subscriber::registry().with(fmt::layer()).with(env_filter).init();
}

/// Like [`init`], but returns an error instead of panicking if a subscriber
/// is already set.
pub fn try_init() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    try_init_with_filter("info")
}

pub fn try_init_with_filter(filter: &str) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(env_filter)
        .try_init()
        .map_err(|e| Box::new(e) as Box<dyn std::error::Error + Send + Sync>)
}

/// A filter with sensible per-crate defaults, used when nothing more
/// specific is configured.
pub fn default_conduit_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("info")
            .add_directive("conduit_runtime=info".parse().unwrap())
            .add_directive("conduit_transport=info".parse().unwrap())
            .add_directive("conduit_adapter_gateway=info".parse().unwrap())
            .add_directive("conduit_core=debug".parse().unwrap())
    })
}

pub fn init_conduit() {
    tracing_subscriber::registry().with(fmt::layer()).with(default_conduit_filter()).init();
}

/// Holds the non-blocking writer guard for file-output logging so it isn't
/// dropped (and the background flush thread killed) the moment
/// [`init_from_config`] returns.
static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();

/// Builds and installs a subscriber from a [`LoggingConfig`] (spec §6
/// "logging" options). The single place that turns the config schema's
/// logging section into an actual `tracing` subscriber.
///
/// # Panics
/// Panics if a subscriber has already been set.
pub fn init_from_config(config: &LoggingConfig) {
    let mut filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(config.level.as_str()));
    for (module, level) in &config.filters {
        if let Ok(directive) = format!("{module}={}", level.as_str()).parse() {
            filter = filter.add_directive(directive);
        }
    }

    let span_events = if config.file_location { SpanEvents::LIFECYCLE } else { SpanEvents::NONE };

    match config.output {
        LogOutput::File => {
            let path = config.file_path.as_deref().unwrap_or_else(|| std::path::Path::new("conduit.log"));
            let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or_else(|| std::path::Path::new("."));
            let file_name = path.file_name().unwrap_or_else(|| std::ffi::OsStr::new("conduit.log"));
            let appender = tracing_appender::rolling::never(dir, file_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let _ = FILE_GUARD.set(guard);
            install(writer, config, span_events, filter);
        }
        LogOutput::Stderr => install(std::io::stderr, config, span_events, filter),
        LogOutput::Stdout => install(std::io::stdout, config, span_events, filter),
    }
}

fn install<W>(writer: W, config: &LoggingConfig, span_events: SpanEvents, filter: EnvFilter)
where
    W: for<'a> fmt::MakeWriter<'a> + Send + Sync + 'static,
{
    let ansi = matches!(config.output, LogOutput::Stdout | LogOutput::Stderr);
    let base = fmt::layer().with_writer(writer).with_ansi(ansi).with_span_events(span_events.to_fmt_span());

    // `.without_time()`/`.compact()`/`.json()` each change the layer's type,
    // so every combination is boxed into one trait object before `.with()`
    // unifies them (spec §6 `logging.timestamps`/`logging.format`).
    type BoxedLayer = Box<dyn tracing_subscriber::Layer<tracing_subscriber::Registry> + Send + Sync>;

    let layer: BoxedLayer = match (config.format, config.timestamps) {
        (LogFormat::Json, _) => {
            #[cfg(feature = "json-log")]
            {
                Box::new(base.json())
            }
            #[cfg(not(feature = "json-log"))]
            {
                tracing::warn!("logging.format = \"json\" requires the json-log feature; falling back to pretty");
                Box::new(base.pretty())
            }
        }
        (LogFormat::Compact, true) => Box::new(base.compact()),
        (LogFormat::Compact, false) => Box::new(base.compact().without_time()),
        (LogFormat::Full, true) => Box::new(base),
        (LogFormat::Full, false) => Box::new(base.without_time()),
        (LogFormat::Pretty, true) => Box::new(base.pretty()),
        (LogFormat::Pretty, false) => Box::new(base.pretty().without_time()),
    };

    tracing_subscriber::registry().with(layer).with(filter).init();
}

/// A builder for configuring logging by hand, independent of
/// [`crate::config::ConduitConfig`]. Kept for callers who construct a
/// process without going through the config loader at all.
#[derive(Default)]
pub struct LoggingBuilder {
    directives: Vec<String>,
    level: Option<tracing::Level>,
    span_events: SpanEvents,
    with_target: bool,
    with_thread_ids: bool,
    with_file: bool,
    with_line_number: bool,
    #[cfg(feature = "json-log")]
    json: bool,
}

impl LoggingBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_level(mut self, level: tracing::Level) -> Self {
        self.level = Some(level);
        self
    }

    pub fn directive(mut self, directive: &str) -> Self {
        self.directives.push(directive.to_string());
        self
    }

    pub fn span_events(mut self, events: SpanEvents) -> Self {
        self.span_events = events;
        self
    }

    pub fn with_span_events(mut self, events: SpanEvents) -> Self {
        self.span_events = events;
        self
    }

    pub fn with_target(mut self, enabled: bool) -> Self {
        self.with_target = enabled;
        self
    }

    pub fn with_thread_ids(mut self, enabled: bool) -> Self {
        self.with_thread_ids = enabled;
        self
    }

    pub fn with_file(mut self, enabled: bool) -> Self {
        self.with_file = enabled;
        self
    }

    pub fn with_line_number(mut self, enabled: bool) -> Self {
        self.with_line_number = enabled;
        self
    }

    #[cfg(feature = "json-log")]
    pub fn json(mut self) -> Self {
        self.json = true;
        self
    }

    fn build_filter(&self) -> EnvFilter {
        let base_filter = match self.level {
            Some(level) => match level {
                tracing::Level::TRACE => "trace",
                tracing::Level::DEBUG => "debug",
                tracing::Level::INFO => "info",
                tracing::Level::WARN => "warn",
                tracing::Level::ERROR => "error",
            },
            None => "info",
        }
        .to_string();

        let mut filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&base_filter));
        for directive in &self.directives {
            if let Ok(d) = directive.parse() {
                filter = filter.add_directive(d);
            }
        }
        filter
    }

    fn build_fmt_layer<S>(&self) -> fmt::Layer<S>
    where
        S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
    {
        fmt::layer()
            .with_span_events(self.span_events.to_fmt_span())
            .with_target(self.with_target)
            .with_thread_ids(self.with_thread_ids)
            .with_file(self.with_file)
            .with_line_number(self.with_line_number)
    }

    pub fn init(self) {
        let filter = self.build_filter();

        #[cfg(feature = "json-log")]
        if self.json {
            tracing_subscriber::registry()
                .with(fmt::layer().json().with_span_events(self.span_events.to_fmt_span()))
                .with(filter)
                .init();
            return;
        }

        tracing_subscriber::registry().with(self.build_fmt_layer()).with(filter).init();
    }

    pub fn try_init(self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let filter = self.build_filter();

        #[cfg(feature = "json-log")]
        if self.json {
            return tracing_subscriber::registry()
                .with(fmt::layer().json().with_span_events(self.span_events.to_fmt_span()))
                .with(filter)
                .try_init()
                .map_err(|e| Box::new(e) as Box<dyn std::error::Error + Send + Sync>);
        }

        tracing_subscriber::registry()
            .with(self.build_fmt_layer())
            .with(filter)
            .try_init()
            .map_err(|e| Box::new(e) as Box<dyn std::error::Error + Send + Sync>)
    }
}
