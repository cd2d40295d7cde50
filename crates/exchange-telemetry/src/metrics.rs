//! Prometheus metrics for the exchange layer.
//!
//! All metrics follow the naming convention: `exchange_<area>_<metric>_<unit>`
//!
//! ## Metric Types
//!
//! - **Counter**: Monotonically increasing value (e.g., requests_sent_total)
//! - **Gauge**: Value that can go up or down (e.g., invocations_pending)

use lazy_static::lazy_static;
use prometheus::{Encoder, IntCounter, IntGauge, Registry, TextEncoder};
use std::sync::Arc;

use crate::TelemetryError;

lazy_static! {
    /// Global metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    // =========================================================================
    // CORRELATION METRICS
    // =========================================================================

    /// Two-way requests handed to a raw channel
    pub static ref REQUESTS_SENT: IntCounter = IntCounter::new(
        "exchange_requests_sent_total",
        "Total two-way requests registered and forwarded"
    ).expect("metric creation failed");

    /// Responses matched to a pending invocation
    pub static ref RESPONSES_MATCHED: IntCounter = IntCounter::new(
        "exchange_responses_matched_total",
        "Total responses that completed a pending invocation"
    ).expect("metric creation failed");

    /// Responses for unknown or already resolved request IDs
    pub static ref LATE_RESPONSES: IntCounter = IntCounter::new(
        "exchange_responses_late_total",
        "Total responses dropped because no invocation was pending"
    ).expect("metric creation failed");

    /// Invocations failed by the timeout sweep
    pub static ref TIMEOUTS: IntCounter = IntCounter::new(
        "exchange_invocations_timeout_total",
        "Total invocations resolved with CLIENT_TIMEOUT"
    ).expect("metric creation failed");

    /// Invocations failed because their channel went away
    pub static ref CHANNEL_INACTIVE_FAILURES: IntCounter = IntCounter::new(
        "exchange_invocations_channel_inactive_total",
        "Total invocations resolved with CHANNEL_INACTIVE"
    ).expect("metric creation failed");

    /// Invocations currently pending
    pub static ref PENDING_INVOCATIONS: IntGauge = IntGauge::new(
        "exchange_invocations_pending",
        "Number of invocations awaiting a terminal transition"
    ).expect("metric creation failed");

    // =========================================================================
    // CHANNEL METRICS
    // =========================================================================

    /// Exchange channels currently registered
    pub static ref CHANNELS_ACTIVE: IntGauge = IntGauge::new(
        "exchange_channels_active",
        "Number of exchange channels held by the registry"
    ).expect("metric creation failed");
}

/// Handle returned once metrics are registered
pub struct MetricsHandle {
    _registry: Arc<Registry>,
}

/// Register all metrics with the global registry.
pub fn register_metrics() -> Result<MetricsHandle, TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        // Correlation
        Box::new(REQUESTS_SENT.clone()),
        Box::new(RESPONSES_MATCHED.clone()),
        Box::new(LATE_RESPONSES.clone()),
        Box::new(TIMEOUTS.clone()),
        Box::new(CHANNEL_INACTIVE_FAILURES.clone()),
        Box::new(PENDING_INVOCATIONS.clone()),
        // Channels
        Box::new(CHANNELS_ACTIVE.clone()),
    ];

    for metric in metrics {
        REGISTRY
            .register(metric)
            .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    }

    Ok(MetricsHandle {
        _registry: Arc::new(REGISTRY.clone()),
    })
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}
