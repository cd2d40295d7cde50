//! # Exchange Telemetry
//!
//! Observability for the exchange layer.
//!
//! ## Components
//!
//! - **Logging**: `tracing-subscriber` fmt layer (pretty or JSON) behind an
//!   `EnvFilter`.
//! - **Metrics**: Prometheus counters and gauges for request correlation,
//!   timeouts and channel lifecycle.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use exchange_telemetry::{init_telemetry, TelemetryConfig};
//!
//! let _guard = init_telemetry(TelemetryConfig::from_env())?;
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `EXCHANGE_SERVICE_NAME` | `exchange` | Service name attached to startup logs |
//! | `EXCHANGE_LOG_LEVEL` | `info` | Log level filter (falls back to `RUST_LOG`) |
//! | `EXCHANGE_JSON_LOGS` | `false` | Emit JSON formatted logs |

mod config;
mod logging;
pub mod metrics;

pub use config::TelemetryConfig;
pub use logging::init_logging;
pub use metrics::{
    encode_metrics, register_metrics, MetricsHandle, CHANNELS_ACTIVE, CHANNEL_INACTIVE_FAILURES,
    LATE_RESPONSES, PENDING_INVOCATIONS, REQUESTS_SENT, RESPONSES_MATCHED, TIMEOUTS,
};

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Failed to initialize logging: {0}")]
    LoggingInit(String),

    #[error("Failed to initialize Prometheus metrics: {0}")]
    MetricsInit(String),
}

/// Install logging and register metrics.
///
/// Returns a guard to hold for the lifetime of the application.
pub fn init_telemetry(config: TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    let metrics = register_metrics()?;
    init_logging(&config)?;

    tracing::info!(service = %config.service_name, "Exchange telemetry initialized");

    Ok(TelemetryGuard { _metrics: metrics })
}

/// Guard that keeps telemetry active.
pub struct TelemetryGuard {
    _metrics: MetricsHandle,
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        tracing::info!("Shutting down telemetry...");
    }
}
