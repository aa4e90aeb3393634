//! Tracing subscriber setup for applications embedding Tether.
//!
//! Libraries never install a subscriber themselves; call [`init_tracing`]
//! once from the binary.

use std::fmt;
use std::str::FromStr;

use tether_domain::TetherError;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt as fmt_layer, EnvFilter};

/// Filter used when `RUST_LOG` is unset or invalid.
pub const DEFAULT_FILTER: &str = "info";

/// Variable selecting the output format (`pretty` or `json`).
pub const LOG_FORMAT_VAR: &str = "TETHER_LOG_FORMAT";

/// Output format of the fmt layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable lines on stderr
    #[default]
    Pretty,
    /// One JSON object per event, including the current span
    Json,
}

impl LogFormat {
    /// Format from `TETHER_LOG_FORMAT`, `Pretty` when unset or unknown.
    pub fn from_env() -> Self {
        std::env::var(LOG_FORMAT_VAR).ok().and_then(|raw| raw.parse().ok()).unwrap_or_default()
    }
}

impl FromStr for LogFormat {
    type Err = TetherError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" | "text" | "plain" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(TetherError::Config(format!("unknown log format: {other}"))),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pretty => f.write_str("pretty"),
            Self::Json => f.write_str("json"),
        }
    }
}

/// Install the global subscriber: `RUST_LOG` filter (default `info`) plus a
/// fmt layer in the requested format.
///
/// Returns `false` when a global subscriber was already installed; calling
/// this more than once is harmless.
pub fn init_tracing(format: LogFormat) -> bool {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let registry = tracing_subscriber::registry().with(filter);

    let installed = match format {
        LogFormat::Pretty => registry
            .with(fmt_layer::layer().with_target(true).with_writer(std::io::stderr))
            .try_init(),
        LogFormat::Json => registry
            .with(
                fmt_layer::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(false)
                    .with_writer(std::io::stderr),
            )
            .try_init(),
    };

    match installed {
        Ok(()) => {
            tracing::debug!(%format, "tracing initialised");
            true
        }
        Err(_) => false,
    }
}
