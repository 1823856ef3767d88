//! Logging initialization and span helpers.
//!
//! Structured logging with consistent spans: every provisioning call runs
//! inside a [`provision_span`] carrying the operation, resource kind and
//! address.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Once;
use tracing::Span;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::address::ResourceAddress;
use crate::error::Error;

static INIT: Once = Once::new();

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// JSON structured logs (for production).
    Json,
    /// Pretty-printed logs (for development).
    #[default]
    Pretty,
}

impl FromStr for LogFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "pretty" => Ok(Self::Pretty),
            other => Err(Error::InvalidInput(format!(
                "log format must be json or pretty (got {other})"
            ))),
        }
    }
}

/// Initializes the logging subsystem.
///
/// Call once at application startup. Safe to call multiple times;
/// subsequent calls are no-ops.
///
/// # Environment Variables
///
/// - `RUST_LOG`: Controls log levels (e.g., `info`, `sluice_provision=debug`)
pub fn init_logging(format: LogFormat) {
    INIT.call_once(|| {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        match format {
            LogFormat::Json => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(fmt::layer().json())
                    .init();
            }
            LogFormat::Pretty => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(fmt::layer().pretty())
                    .init();
            }
        }
    });
}

/// Creates the span wrapping one provisioning operation.
///
/// # Example
///
/// ```rust
/// use sluice_core::address::ResourceAddress;
/// use sluice_core::observability::provision_span;
///
/// let address = ResourceAddress::new("acme", "sales", "orders");
/// let span = provision_span("provision", "storage_table", &address);
/// let _guard = span.enter();
/// ```
#[must_use]
pub fn provision_span(operation: &str, kind: &str, address: &ResourceAddress) -> Span {
    tracing::info_span!(
        "provision",
        op = operation,
        kind = kind,
        project = %address.project,
        dataset = %address.dataset,
        resource = %address.name,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logging_succeeds() {
        init_logging(LogFormat::Pretty);
        init_logging(LogFormat::Json);
    }

    #[test]
    fn test_provision_span_creates_span() {
        let address = ResourceAddress::new("p", "d", "t");
        let span = provision_span("validate", "output_view", &address);
        let _guard = span.enter();
        tracing::info!("inside provision span");
    }

    #[test]
    fn parses_log_format() {
        assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("pretty".parse::<LogFormat>().unwrap(), LogFormat::Pretty);
        assert!("xml".parse::<LogFormat>().is_err());
    }
}
