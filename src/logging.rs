//! Structured logging setup for the command line binary
//!
//! Library code only emits `tracing` events; the binary decides how they are
//! rendered.
//!
//! # Log Format Conventions
//!
//! - `key`: raw resource key of the pipeline run (set on the `pipeline` span)
//! - `stage`: pipeline stage name ("fetch_primary", "persist", ...)
//! - `operation`: cache operation ("type_payload", "sub_resource")
//! - `status`: cache lookup result ("hit", "miss")
//! - `url`: remote URL being fetched

use std::{fmt as std_fmt, io};
use tracing::{Event, Subscriber};
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::Writer},
    prelude::*,
};

/// Tag printed after the level in place of the module path
const PROGRAM_TAG: &str = "pokeapi-pipeline";

/// Formatter that prints a short program tag instead of the module path
struct PipelineFormatter {
    with_ansi: bool,
}

/// Level column followed by the program tag, colored when `with_ansi` is set
fn level_label(level: tracing::Level, with_ansi: bool) -> String {
    if !with_ansi {
        return format!("{:5}({}): ", level, PROGRAM_TAG);
    }

    let level_style = match level {
        tracing::Level::ERROR => "\x1b[31m",
        tracing::Level::WARN => "\x1b[33m",
        tracing::Level::INFO => "\x1b[32m",
        tracing::Level::DEBUG => "\x1b[34m",
        tracing::Level::TRACE => "\x1b[35m",
    };
    format!("{}{:5}({})\x1b[0m: ", level_style, level, PROGRAM_TAG)
}

impl<S, N> FormatEvent<S, N> for PipelineFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> std_fmt::Result {
        let meta = event.metadata();

        write!(
            writer,
            "{} {}",
            chrono::Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ"),
            level_label(*meta.level(), self.with_ansi)
        )?;

        // Span fields carry the pipeline key
        if let Some(scope) = ctx.event_scope() {
            for span in scope.from_root() {
                write!(writer, "{}", span.name())?;
                let ext = span.extensions();
                if let Some(fields) = ext.get::<fmt::FormattedFields<N>>() {
                    if !fields.is_empty() {
                        write!(writer, "{{{}}}", fields)?;
                    }
                }
                write!(writer, ": ")?;
            }
        }

        ctx.field_format().format_fields(writer.by_ref(), event)?;

        writeln!(writer)
    }
}

/// Log format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable, colored
    Pretty,
    /// Human-readable, no color (CI, redirected output)
    Compact,
    /// One JSON object per line
    Json,
}

impl LogFormat {
    /// Parse from `POKEAPI_PIPELINE_LOG_FORMAT`
    pub fn from_env() -> Self {
        match std::env::var("POKEAPI_PIPELINE_LOG_FORMAT")
            .unwrap_or_default()
            .to_lowercase()
            .as_str()
        {
            "json" => Self::Json,
            "compact" => Self::Compact,
            "pretty" => Self::Pretty,
            _ => {
                if std::env::var("CI").is_ok() {
                    Self::Compact
                } else {
                    Self::Pretty
                }
            }
        }
    }
}

/// Initialize the global tracing subscriber, writing to stderr
///
/// `RUST_LOG` wins over `default_level`; with neither set the level is `info`.
pub fn init(default_level: Option<&str>) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level.unwrap_or("info")));

    match LogFormat::from_env() {
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    fmt::layer()
                        .event_format(PipelineFormatter { with_ansi: true })
                        .with_writer(io::stderr),
                )
                .init();
        }
        LogFormat::Compact => {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    fmt::layer()
                        .event_format(PipelineFormatter { with_ansi: false })
                        .with_writer(io::stderr),
                )
                .init();
        }
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    fmt::layer()
                        .with_target(false)
                        .with_file(false)
                        .with_line_number(false)
                        .with_ansi(false)
                        .with_writer(io::stderr)
                        .json(),
                )
                .init();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_label_carries_program_tag() {
        assert_eq!(
            level_label(tracing::Level::INFO, false),
            "INFO (pokeapi-pipeline): "
        );
        assert_eq!(
            level_label(tracing::Level::ERROR, true),
            "\x1b[31mERROR(pokeapi-pipeline)\x1b[0m: "
        );
    }
}
