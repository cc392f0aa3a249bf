//! Observability for callgate.
//!
//! - **Logging**: structured logs via `tracing-subscriber`, JSON or pretty
//! - **Metrics**: invocation counters and latency via the `metrics` crate,
//!   optionally exported in Prometheus format
//!
//! # Example
//!
//! ```rust,ignore
//! use callgate_telemetry::{init_telemetry, TelemetryConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     init_telemetry(&TelemetryConfig::development()).expect("telemetry");
//!     tracing::info!("ready");
//! }
//! ```
//!
//! # Metrics Endpoint
//!
//! When the exporter is enabled it serves the Prometheus text format:
//!
//! ```text
//! # TYPE callgate_invocations_total counter
//! callgate_invocations_total{function="ping",outcome="success"} 12
//! callgate_invocations_total{function="orders.sync",outcome="timeout"} 1
//! ```

#![warn(missing_docs)]

pub mod error;
pub mod logging;
pub mod metrics;

pub use error::TelemetryError;
pub use logging::{init_logging, LogConfig};
pub use crate::metrics::{init_metrics, record_invocation, InFlightGuard, InvocationOutcome, MetricsConfig};

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;

/// Configuration for all telemetry subsystems.
#[derive(Debug, Clone, Default)]
pub struct TelemetryConfig {
    /// Logging configuration.
    pub logging: LogConfig,

    /// Metrics configuration.
    pub metrics: MetricsConfig,
}

impl TelemetryConfig {
    /// Human-readable logs, no exporter.
    #[must_use]
    pub fn development() -> Self {
        Self {
            logging: LogConfig::development(),
            metrics: MetricsConfig::default(),
        }
    }

    /// JSON logs, no exporter unless enabled explicitly.
    #[must_use]
    pub fn production() -> Self {
        Self {
            logging: LogConfig::production(),
            metrics: MetricsConfig::default(),
        }
    }
}

/// Initializes logging, then metrics.
///
/// # Errors
///
/// Returns `TelemetryError` if either subsystem fails to initialize.
pub fn init_telemetry(config: &TelemetryConfig) -> TelemetryResult<()> {
    init_logging(&config.logging)?;
    init_metrics(&config.metrics)?;
    Ok(())
}
