//! Typed configuration for callgate.
//!
//! - TOML and JSON configuration files
//! - Environment variable overrides (`CALLGATE__SECTION__KEY`)
//! - `.env` files via `dotenvy`
//! - Strict parsing (unknown fields are rejected) and validation
//!
//! # Configuration File Format
//!
//! ```toml
//! [server]
//! http_addr = "0.0.0.0:8080"
//! path_prefix = "/__callgo"
//! invoke_timeout_secs = 30
//! shutdown_timeout_secs = 5
//! max_body_size = 1048576
//!
//! [security]
//! token = "change-me"
//!
//! [logging]
//! level = "info"
//! format = "json"
//!
//! [metrics]
//! enabled = true
//! addr = "0.0.0.0:9090"
//!
//! [reporting]
//! endpoint = "https://errors.example.com/hook"
//! timeout_ms = 5000
//! ```
//!
//! # Example
//!
//! ```no_run
//! use callgate_config::{ConfigLoader, DEFAULT_ENV_PREFIX};
//!
//! # fn main() -> Result<(), callgate_config::ConfigError> {
//! let config = ConfigLoader::new()
//!     .with_optional_file("callgate.toml")?
//!     .with_env_prefix(DEFAULT_ENV_PREFIX)
//!     .load()?;
//!
//! println!("listening on {}", config.server.http_addr);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

mod config;
mod error;
mod loader;
mod schema;

pub use config::GatewayConfig;
pub use error::ConfigError;
pub use loader::{ConfigLoader, DEFAULT_ENV_PREFIX};
pub use schema::*;
