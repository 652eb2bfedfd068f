//! Logging via the tracing crate.
//!
//! The consensus core only emits `tracing` events; installing a subscriber is left to the
//! embedding application, which may use [`init_with_config`].

use std::{fmt, io};

use ansi_term::{Color, Style};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::{
    fmt::{
        format,
        time::{FormatTime, SystemTime},
        FmtContext, FormatEvent, FormatFields, FormattedFields,
    },
    prelude::*,
    registry::LookupSpan,
    EnvFilter,
};

/// Logging configuration.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct LoggingConfig {
    /// Output format for log.
    #[serde(default)]
    pub format: LoggingFormat,
    /// Abbreviate module names.
    ///
    /// If set, the text format abbreviates module names: `casper_era_consensus::components::
    /// consensus::era_supervisor` turns into `c:c:c:era_supervisor`.
    #[serde(default)]
    pub abbreviate_modules: bool,
    /// Print the level and timestamp in color.
    #[serde(default)]
    pub color: bool,
}

/// Logging output format.
///
/// Defaults to "text".
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LoggingFormat {
    /// Text format.
    Text,
    /// JSON format.
    Json,
}

impl Default for LoggingFormat {
    fn default() -> Self {
        LoggingFormat::Text
    }
}

/// Formats events of the text format: time, level, spans, module, then the event's fields.
struct FmtEvent {
    abbreviate_modules: bool,
    color: bool,
}

impl FmtEvent {
    fn new(config: &LoggingConfig) -> Self {
        FmtEvent {
            abbreviate_modules: config.abbreviate_modules,
            color: config.color,
        }
    }

    fn level_color(level: &Level) -> Color {
        match *level {
            Level::TRACE => Color::Purple,
            Level::DEBUG => Color::Blue,
            Level::INFO => Color::Green,
            Level::WARN => Color::Yellow,
            Level::ERROR => Color::Red,
        }
    }
}

impl<S, N> FormatEvent<S, N> for FmtEvent
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        writer: &mut dyn fmt::Write,
        event: &Event<'_>,
    ) -> fmt::Result {
        let dimmed = if self.color {
            Style::new().dimmed()
        } else {
            Style::new()
        };
        write!(writer, "{}", dimmed.prefix())?;
        SystemTime.format_time(writer)?;
        write!(writer, "{}", dimmed.suffix())?;

        let meta = event.metadata();
        let level_style = if self.color {
            Style::from(Self::level_color(meta.level()))
        } else {
            Style::new()
        };
        write!(
            writer,
            " {}{:<6}{}",
            level_style.prefix(),
            meta.level().to_string(),
            level_style.suffix()
        )?;

        let mut span_seen = false;
        ctx.visit_spans(|span| {
            write!(writer, "{}", span.metadata().name())?;
            span_seen = true;

            let ext = span.extensions();
            if let Some(fields) = ext.get::<FormattedFields<N>>() {
                if !fields.is_empty() {
                    write!(writer, "{{{}}}", fields)?;
                }
            }
            writer.write_char(':')
        })?;
        if span_seen {
            writer.write_char(' ')?;
        }

        let module_path = meta.module_path().unwrap_or_default();
        let module = if self.abbreviate_modules {
            abbreviate_module(module_path)
        } else {
            module_path.to_owned()
        };
        write!(
            writer,
            "{}[{}:{}]{} ",
            dimmed.prefix(),
            module,
            meta.line().unwrap_or_default(),
            dimmed.suffix()
        )?;

        ctx.format_fields(writer, event)?;
        writeln!(writer)
    }
}

/// Shortens all but the last segment of a module path to its first character.
fn abbreviate_module(module_path: &str) -> String {
    // Consensus module paths are at most six segments deep.
    let mut parts: SmallVec<[&str; 6]> = module_path.split("::").collect();
    if let Some((_last, init)) = parts.split_last_mut() {
        for part in init {
            let segment: &str = *part;
            *part = segment
                .char_indices()
                .nth(1)
                .map_or(segment, |(second, _)| &segment[..second]);
        }
    }
    parts.join(":")
}

/// Initializes the logging system with the default parameters.
pub fn init() -> anyhow::Result<()> {
    init_with_config(&LoggingConfig::default())
}

/// Initializes the logging system.
///
/// The installed subscriber is global, so this may only be called once per process. The filter
/// is read from `RUST_LOG`, e.g. `RUST_LOG=casper_era_consensus::components::consensus=debug`.
pub fn init_with_config(config: &LoggingConfig) -> anyhow::Result<()> {
    let formatter = format::debug_fn(|writer, field, value| {
        if field.name() == "message" {
            write!(writer, "{:?}", value)
        } else {
            write!(writer, "{}={:?}", field, value)
        }
    })
    .delimited("; ");

    match config.format {
        LoggingFormat::Text => tracing::subscriber::set_global_default(
            tracing_subscriber::fmt()
                .with_writer(io::stdout)
                .with_env_filter(EnvFilter::from_default_env())
                .fmt_fields(formatter)
                .event_format(FmtEvent::new(config))
                .finish(),
        )?,
        LoggingFormat::Json => tracing::subscriber::set_global_default(
            tracing_subscriber::fmt()
                .with_writer(io::stdout)
                .with_env_filter(EnvFilter::from_default_env())
                .json()
                .finish(),
        )?,
    }

    Ok(())
}
