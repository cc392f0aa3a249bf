//! Top-level configuration.

use std::net::SocketAddr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use callgate_telemetry::{LogConfig, MetricsConfig, TelemetryConfig};

use crate::{
    ConfigError, LogFormat, LoggingSection, MetricsSection, ReportingSection, SecuritySection,
    ServerSection,
};

/// Complete gateway configuration.
///
/// Use [`ConfigLoader`](crate::ConfigLoader) to load it from files and
/// environment variables.
///
/// # Example
///
/// ```
/// use callgate_config::GatewayConfig;
///
/// let config = GatewayConfig::default();
/// assert_eq!(config.server.http_addr, "0.0.0.0:8080");
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    /// HTTP server.
    #[serde(default)]
    pub server: ServerSection,

    /// Authentication.
    #[serde(default)]
    pub security: SecuritySection,

    /// Logging.
    #[serde(default)]
    pub logging: LoggingSection,

    /// Metrics exporter.
    #[serde(default)]
    pub metrics: MetricsSection,

    /// Error reporting webhook.
    #[serde(default)]
    pub reporting: ReportingSection,
}

impl GatewayConfig {
    /// Development preset: pretty debug logs with source locations.
    #[must_use]
    pub fn development() -> Self {
        Self {
            logging: LoggingSection {
                level: "debug".to_string(),
                format: LogFormat::Pretty,
                include_location: true,
                ..LoggingSection::default()
            },
            ..Self::default()
        }
    }

    /// Production preset: JSON info logs.
    #[must_use]
    pub fn production() -> Self {
        Self::default()
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.http_addr.parse::<SocketAddr>().is_err() {
            return Err(ConfigError::invalid_value(
                "server.http_addr",
                format!("invalid socket address: {}", self.server.http_addr),
            ));
        }

        let prefix = &self.server.path_prefix;
        if !prefix.starts_with('/') {
            return Err(ConfigError::invalid_value(
                "server.path_prefix",
                "must start with '/'",
            ));
        }
        if prefix.len() > 1 && prefix.ends_with('/') {
            return Err(ConfigError::invalid_value(
                "server.path_prefix",
                "must not end with '/'",
            ));
        }

        if self.server.invoke_timeout_secs == 0 {
            return Err(ConfigError::invalid_value(
                "server.invoke_timeout_secs",
                "must be greater than zero",
            ));
        }
        if self.server.shutdown_timeout_secs == 0 {
            return Err(ConfigError::invalid_value(
                "server.shutdown_timeout_secs",
                "must be greater than zero",
            ));
        }
        if self.server.max_body_size == 0 {
            return Err(ConfigError::invalid_value(
                "server.max_body_size",
                "must be greater than zero",
            ));
        }

        if self.metrics.enabled && self.metrics.addr.parse::<SocketAddr>().is_err() {
            return Err(ConfigError::invalid_value(
                "metrics.addr",
                format!("invalid socket address: {}", self.metrics.addr),
            ));
        }

        if let Some(endpoint) = &self.reporting.endpoint {
            if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
                return Err(ConfigError::invalid_value(
                    "reporting.endpoint",
                    "must be an http:// or https:// URL",
                ));
            }
            if self.reporting.timeout_ms == 0 {
                return Err(ConfigError::invalid_value(
                    "reporting.timeout_ms",
                    "must be greater than zero",
                ));
            }
        }

        Ok(())
    }

    /// Returns the per-invocation deadline.
    #[must_use]
    pub const fn invoke_timeout(&self) -> Duration {
        Duration::from_secs(self.server.invoke_timeout_secs)
    }

    /// Returns the shutdown grace period.
    #[must_use]
    pub const fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.server.shutdown_timeout_secs)
    }

    /// Returns the error report delivery timeout.
    #[must_use]
    pub const fn report_timeout(&self) -> Duration {
        Duration::from_millis(self.reporting.timeout_ms)
    }

    /// Builds the telemetry configuration.
    #[must_use]
    pub fn telemetry(&self) -> TelemetryConfig {
        TelemetryConfig {
            logging: LogConfig {
                enabled: self.logging.enabled,
                level: self.logging.level.clone(),
                json_format: self.logging.format == LogFormat::Json,
                file_line_info: self.logging.include_location,
                include_target: true,
            },
            metrics: MetricsConfig {
                enabled: self.metrics.enabled,
                addr: self.metrics.addr.clone(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(GatewayConfig::default().validate().is_ok());
        assert!(GatewayConfig::development().validate().is_ok());
    }

    #[test]
    fn test_invalid_http_addr() {
        let mut config = GatewayConfig::default();
        config.server.http_addr = "localhost".to_string();

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("server.http_addr"));
    }

    #[test]
    fn test_prefix_shape() {
        let mut config = GatewayConfig::default();

        config.server.path_prefix = "rpc".to_string();
        assert!(config.validate().is_err());

        config.server.path_prefix = "/rpc/".to_string();
        assert!(config.validate().is_err());

        config.server.path_prefix = "/rpc".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_timeouts_rejected() {
        let mut config = GatewayConfig::default();
        config.server.invoke_timeout_secs = 0;
        assert!(config.validate().is_err());

        let mut config = GatewayConfig::default();
        config.server.shutdown_timeout_secs = 0;
        assert!(config.validate().is_err());

        let mut config = GatewayConfig::default();
        config.server.max_body_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_metrics_addr_checked_only_when_enabled() {
        let mut config = GatewayConfig::default();
        config.metrics.addr = "nope".to_string();
        assert!(config.validate().is_ok());

        config.metrics.enabled = true;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_reporting_endpoint_scheme() {
        let mut config = GatewayConfig::default();
        config.reporting.endpoint = Some("ftp://errors".to_string());
        assert!(config.validate().is_err());

        config.reporting.endpoint = Some("https://errors.example.com/hook".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_telemetry_mapping() {
        let telemetry = GatewayConfig::development().telemetry();
        assert!(!telemetry.logging.json_format);
        assert!(telemetry.logging.file_line_info);
        assert_eq!(telemetry.logging.level, "debug");
        assert!(!telemetry.metrics.enabled);

        assert!(GatewayConfig::production().telemetry().logging.json_format);
    }

    #[test]
    fn test_durations() {
        let config = GatewayConfig::default();
        assert_eq!(config.invoke_timeout(), Duration::from_secs(30));
        assert_eq!(config.shutdown_timeout(), Duration::from_secs(5));
        assert_eq!(config.report_timeout(), Duration::from_millis(5000));
    }
}
