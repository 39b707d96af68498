//! Process-wide log subscriber for the `geoingest` binary.
//!
//! Library crates log through the `log` facade; the subscriber installed here
//! bridges those records into `tracing` and filters them with `RUST_LOG`.

use std::sync::Once;

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

static INIT: Once = Once::new();

/// Environment variable selecting the log format.
pub const LOG_FORMAT_ENV: &str = "GEOINGEST_LOG_FORMAT";

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// JSON structured logs, one object per line.
    Json,
    /// Human-readable logs.
    #[default]
    Pretty,
}

impl LogFormat {
    /// Parse a format name; anything other than `json` selects `Pretty`.
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        if name.trim().eq_ignore_ascii_case("json") {
            Self::Json
        } else {
            Self::Pretty
        }
    }

    /// Format selected by [`LOG_FORMAT_ENV`].
    #[must_use]
    pub fn from_env() -> Self {
        std::env::var(LOG_FORMAT_ENV)
            .map(|name| Self::from_name(&name))
            .unwrap_or_default()
    }
}

/// Install the global subscriber. Later calls are no-ops.
///
/// `RUST_LOG` controls levels and defaults to `info`.
pub fn init_logging(format: LogFormat) {
    INIT.call_once(|| {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        let registry = tracing_subscriber::registry().with(env_filter);
        let installed = match format {
            LogFormat::Json => registry.with(fmt::layer().json()).try_init(),
            LogFormat::Pretty => registry.with(fmt::layer().pretty()).try_init(),
        };
        if let Err(err) = installed {
            log::warn!("log subscriber already installed: {err}");
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("json", LogFormat::Json)]
    #[case(" JSON ", LogFormat::Json)]
    #[case("pretty", LogFormat::Pretty)]
    #[case("", LogFormat::Pretty)]
    fn parses_format_names(#[case] name: &str, #[case] expected: LogFormat) {
        assert_eq!(LogFormat::from_name(name), expected);
    }

    #[rstest]
    fn repeated_initialisation_is_a_no_op() {
        init_logging(LogFormat::Pretty);
        init_logging(LogFormat::Json);
    }
}
