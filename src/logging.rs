//! Logging setup.
//!
//! One `EnvFilter` in front of one `fmt` layer per output (stdout and an
//! optional append-only file). `RUST_LOG` wins over the configured level.
//! Both the filter and the outputs sit behind `reload` layers, so a
//! configuration reload can re-apply them through [`LogHandle`].

use std::fmt as stdfmt;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;

use tracing::Subscriber;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::{Layered, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, reload, EnvFilter, Layer, Registry};

use crate::error::{BotError, Result};

/// Output format of log records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Full,
    Pretty,
    Compact,
    Json,
}

impl LogFormat {
    /// Parse a format name; unknown names fall back to [`LogFormat::Full`].
    pub fn parse(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "pretty" => Self::Pretty,
            "compact" => Self::Compact,
            "json" => Self::Json,
            _ => Self::Full,
        }
    }
}

/// Resolved logging options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    pub to_stdout: bool,
    pub level: String,
    pub format: LogFormat,
    pub file: Option<PathBuf>,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            to_stdout: true,
            level: "info".to_string(),
            format: LogFormat::Full,
            file: None,
        }
    }
}

type Filtered = Layered<reload::Layer<EnvFilter, Registry>, Registry>;
type BoxedLayer = Box<dyn Layer<Filtered> + Send + Sync>;

/// Swaps the level and outputs of an installed subscriber.
#[derive(Clone)]
pub struct LogHandle {
    filter: reload::Handle<EnvFilter, Registry>,
    outputs: reload::Handle<Vec<BoxedLayer>, Filtered>,
}

impl stdfmt::Debug for LogHandle {
    fn fmt(&self, f: &mut stdfmt::Formatter<'_>) -> stdfmt::Result {
        f.debug_struct("LogHandle").finish_non_exhaustive()
    }
}

impl LogHandle {
    /// Re-apply `settings`. On error the current setup stays in place.
    pub fn apply(&self, settings: &LogSettings) -> Result<()> {
        let outputs = output_layers(settings)?;
        self.filter
            .reload(env_filter(&settings.level))
            .map_err(|e| BotError::Config(format!("cannot change log level: {}", e)))?;
        self.outputs
            .reload(outputs)
            .map_err(|e| BotError::Config(format!("cannot change log outputs: {}", e)))
    }
}

fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

fn format_layer<W>(format: LogFormat, writer: W, ansi: bool) -> BoxedLayer
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let layer = fmt::layer().with_writer(writer).with_ansi(ansi);
    match format {
        LogFormat::Full => layer.boxed(),
        LogFormat::Pretty => layer.pretty().boxed(),
        LogFormat::Compact => layer.compact().boxed(),
        LogFormat::Json => layer.json().boxed(),
    }
}

fn output_layers(settings: &LogSettings) -> Result<Vec<BoxedLayer>> {
    let mut layers: Vec<BoxedLayer> = Vec::new();

    if settings.to_stdout {
        layers.push(format_layer(settings.format, std::io::stdout, true));
    }

    if let Some(path) = &settings.file {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| BotError::Config(format!("cannot open log file {}: {}", path.display(), e)))?;
        layers.push(format_layer(settings.format, Mutex::new(file), false));
    }

    Ok(layers)
}

/// Build a subscriber for `settings` without installing it.
pub fn subscriber(
    settings: &LogSettings,
) -> Result<(impl Subscriber + Send + Sync + 'static, LogHandle)> {
    let (filter, filter_handle) = reload::Layer::new(env_filter(&settings.level));
    let (outputs, outputs_handle) = reload::Layer::new(output_layers(settings)?);
    let subscriber = tracing_subscriber::registry().with(filter).with(outputs);
    Ok((
        subscriber,
        LogHandle {
            filter: filter_handle,
            outputs: outputs_handle,
        },
    ))
}

/// Install the global subscriber.
pub fn init(settings: &LogSettings) -> Result<LogHandle> {
    let (subscriber, handle) = subscriber(settings)?;
    subscriber
        .try_init()
        .map_err(|e| BotError::Config(format!("logging already initialised: {}", e)))?;
    Ok(handle)
}
