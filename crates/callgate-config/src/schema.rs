//! Configuration schema types.
//!
//! Every section has serde defaults, so a file only needs the values it
//! changes. Unknown fields are rejected.

use serde::{Deserialize, Serialize};

/// Server configuration section.
///
/// # Example
///
/// ```
/// use callgate_config::ServerSection;
///
/// let server = ServerSection {
///     http_addr: "127.0.0.1:3000".to_string(),
///     ..Default::default()
/// };
/// assert_eq!(server.path_prefix, "/__callgo");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ServerSection {
    /// HTTP server bind address.
    #[serde(default = "default_http_addr")]
    pub http_addr: String,

    /// Prefix of the invoke and functions endpoints.
    #[serde(default = "default_path_prefix")]
    pub path_prefix: String,

    /// Per-invocation deadline in seconds.
    #[serde(default = "default_invoke_timeout")]
    pub invoke_timeout_secs: u64,

    /// Grace period for open connections on shutdown, in seconds.
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,

    /// Largest accepted invocation request body, in bytes.
    #[serde(default = "default_max_body_size")]
    pub max_body_size: usize,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            http_addr: default_http_addr(),
            path_prefix: default_path_prefix(),
            invoke_timeout_secs: default_invoke_timeout(),
            shutdown_timeout_secs: default_shutdown_timeout(),
            max_body_size: default_max_body_size(),
        }
    }
}

fn default_http_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_path_prefix() -> String {
    "/__callgo".to_string()
}

const fn default_invoke_timeout() -> u64 {
    30
}

const fn default_shutdown_timeout() -> u64 {
    5
}

const fn default_max_body_size() -> usize {
    1024 * 1024
}

/// Security configuration section.
#[derive(Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct SecuritySection {
    /// Shared bearer token. When unset, requests are not authenticated.
    #[serde(default)]
    pub token: Option<String>,
}

impl std::fmt::Debug for SecuritySection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecuritySection")
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Log format.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// JSON lines (production).
    #[default]
    Json,
    /// Human-readable output (development).
    Pretty,
}

/// Logging configuration section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct LoggingSection {
    /// Enable logging.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Filter directives (trace, debug, info, warn, error, or per-target).
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format.
    #[serde(default)]
    pub format: LogFormat,

    /// Include source file and line.
    #[serde(default)]
    pub include_location: bool,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            enabled: true,
            level: default_log_level(),
            format: LogFormat::default(),
            include_location: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Metrics configuration section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct MetricsSection {
    /// Start the Prometheus exporter.
    #[serde(default)]
    pub enabled: bool,

    /// Exporter listen address.
    #[serde(default = "default_metrics_addr")]
    pub addr: String,
}

impl Default for MetricsSection {
    fn default() -> Self {
        Self {
            enabled: false,
            addr: default_metrics_addr(),
        }
    }
}

fn default_metrics_addr() -> String {
    "0.0.0.0:9090".to_string()
}

/// Error reporting configuration section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ReportingSection {
    /// Webhook receiving unexpected function errors. Disabled when unset.
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Timeout of one delivery, in milliseconds.
    #[serde(default = "default_report_timeout")]
    pub timeout_ms: u64,
}

impl Default for ReportingSection {
    fn default() -> Self {
        Self {
            endpoint: None,
            timeout_ms: default_report_timeout(),
        }
    }
}

const fn default_report_timeout() -> u64 {
    5000
}

const fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_defaults() {
        let server = ServerSection::default();
        assert_eq!(server.http_addr, "0.0.0.0:8080");
        assert_eq!(server.invoke_timeout_secs, 30);
        assert_eq!(server.shutdown_timeout_secs, 5);
        assert_eq!(server.max_body_size, 1024 * 1024);
    }

    #[test]
    fn test_partial_section_keeps_defaults() {
        let server: ServerSection = toml::from_str(r#"http_addr = "127.0.0.1:1""#).unwrap();
        assert_eq!(server.http_addr, "127.0.0.1:1");
        assert_eq!(server.path_prefix, "/__callgo");
    }

    #[test]
    fn test_unknown_field_rejected() {
        assert!(toml::from_str::<MetricsSection>("enabled = true\nport = 1").is_err());
    }

    #[test]
    fn test_log_format_lowercase() {
        let logging: LoggingSection = serde_json::from_str(r#"{"format":"pretty"}"#).unwrap();
        assert_eq!(logging.format, LogFormat::Pretty);
        assert!(logging.enabled);
    }

    #[test]
    fn test_security_debug_redacts_token() {
        let security = SecuritySection {
            token: Some("hunter2".to_string()),
        };
        assert!(!format!("{security:?}").contains("hunter2"));
    }
}
