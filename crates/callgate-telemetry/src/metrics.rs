//! Prometheus metrics for callgate invocations.
//!
//! # Standard Metrics
//!
//! | Metric | Type | Labels | Description |
//! |--------|------|--------|-------------|
//! | `callgate_invocations_total` | Counter | `function`, `outcome` | Finished invocations |
//! | `callgate_invocation_duration_seconds` | Histogram | `function` | Invocation latency |
//! | `callgate_in_flight_invocations` | Gauge | - | Invocations currently running |
//!
//! Recording works whether or not an exporter is installed; without one the
//! `metrics` facade drops the samples.

use crate::error::TelemetryError;
use crate::TelemetryResult;
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Duration;

/// Name of the invocation counter.
pub const INVOCATIONS_TOTAL: &str = "callgate_invocations_total";

/// Name of the invocation latency histogram.
pub const INVOCATION_DURATION_SECONDS: &str = "callgate_invocation_duration_seconds";

/// Name of the in-flight invocations gauge.
pub const IN_FLIGHT_INVOCATIONS: &str = "callgate_in_flight_invocations";

/// Metrics configuration.
#[derive(Debug, Clone)]
pub struct MetricsConfig {
    /// Whether the Prometheus exporter is started.
    pub enabled: bool,

    /// Address to expose metrics on (e.g., "0.0.0.0:9090").
    pub addr: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            addr: "0.0.0.0:9090".to_string(),
        }
    }
}

/// How an invocation ended, as recorded in the `outcome` label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InvocationOutcome {
    /// The function returned a value.
    Success,
    /// The function returned a structured error.
    StructuredError,
    /// The function returned an unexpected error.
    Error,
    /// The function panicked.
    Panic,
    /// The function exceeded its deadline.
    Timeout,
    /// No function is registered under the requested name.
    NotFound,
    /// The request payload did not decode into the argument type.
    BadPayload,
}

impl InvocationOutcome {
    /// Returns the label value.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::StructuredError => "structured_error",
            Self::Error => "error",
            Self::Panic => "panic",
            Self::Timeout => "timeout",
            Self::NotFound => "not_found",
            Self::BadPayload => "bad_payload",
        }
    }
}

impl std::fmt::Display for InvocationOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Installs the Prometheus recorder and starts its HTTP listener.
///
/// Must be called from within a tokio runtime.
///
/// # Errors
///
/// Returns `TelemetryError::InvalidAddress` for an unparsable address and
/// `TelemetryError::MetricsInit` if the exporter cannot be installed.
pub fn init_metrics(config: &MetricsConfig) -> TelemetryResult<()> {
    if !config.enabled {
        return Ok(());
    }

    let addr: SocketAddr = config
        .addr
        .parse()
        .map_err(|e| TelemetryError::InvalidAddress(format!("{}: {e}", config.addr)))?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;

    register_metric_descriptions();

    tracing::info!(%addr, "Prometheus exporter listening");
    Ok(())
}

fn register_metric_descriptions() {
    describe_counter!(INVOCATIONS_TOTAL, "Total number of finished function invocations");
    describe_histogram!(
        INVOCATION_DURATION_SECONDS,
        "Function invocation duration in seconds"
    );
    describe_gauge!(
        IN_FLIGHT_INVOCATIONS,
        "Number of function invocations currently running"
    );
}

/// Records a finished invocation.
pub fn record_invocation(function: &str, outcome: InvocationOutcome, duration: Duration) {
    counter!(
        INVOCATIONS_TOTAL,
        "function" => function.to_string(),
        "outcome" => outcome.as_str()
    )
    .increment(1);

    histogram!(
        INVOCATION_DURATION_SECONDS,
        "function" => function.to_string()
    )
    .record(duration.as_secs_f64());
}

/// Guard that tracks one in-flight invocation until dropped.
#[derive(Debug)]
pub struct InFlightGuard {
    _private: (),
}

impl InFlightGuard {
    /// Creates a new guard and increments the in-flight gauge.
    #[must_use]
    pub fn new() -> Self {
        gauge!(IN_FLIGHT_INVOCATIONS).increment(1.0);
        Self { _private: () }
    }
}

impl Default for InFlightGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        gauge!(IN_FLIGHT_INVOCATIONS).decrement(1.0);
    }
}
