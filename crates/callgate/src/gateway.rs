//! Process bootstrap: configuration, telemetry, reporter, dispatcher and server.

use std::sync::Arc;

use thiserror::Error;

use callgate_config::{ConfigError, ConfigLoader, GatewayConfig, DEFAULT_ENV_PREFIX};
use callgate_server::{
    Dispatcher, ErrorReporter, Function, FunctionRegistry, ReportError, Server, ServerConfig,
    ServerError, ShutdownSignal, WebhookReporter,
};
use callgate_telemetry::{init_telemetry, TelemetryError};

/// Configuration file read by [`Gateway::from_env`] when present.
pub const DEFAULT_CONFIG_FILE: &str = "callgate.toml";

/// Errors raised while starting a gateway.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Logging or metrics could not be initialized.
    #[error(transparent)]
    Telemetry(#[from] TelemetryError),

    /// The error reporter could not be created.
    #[error(transparent)]
    Reporter(#[from] ReportError),

    /// The server could not start.
    #[error(transparent)]
    Server(#[from] ServerError),
}

/// A configured gateway collecting functions before it serves them.
///
/// # Example
///
/// ```rust,no_run
/// use callgate::prelude::*;
///
/// async fn hello(_ctx: InvocationContext) -> Result<&'static str, anyhow::Error> {
///     Ok("hello")
/// }
///
/// #[tokio::main]
/// async fn main() -> Result<(), GatewayError> {
///     let mut gateway = Gateway::from_env()?;
///     gateway.register("hello", hello);
///     gateway.run().await
/// }
/// ```
pub struct Gateway {
    config: GatewayConfig,
    registry: FunctionRegistry,
    reporter: Option<Arc<dyn ErrorReporter>>,
}

impl Gateway {
    /// Creates a gateway from an already loaded configuration.
    #[must_use]
    pub fn new(config: GatewayConfig) -> Self {
        Self {
            config,
            registry: FunctionRegistry::new(),
            reporter: None,
        }
    }

    /// Loads the configuration from [`DEFAULT_CONFIG_FILE`] if present, then
    /// `.env`, then `CALLGATE__*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::Config` if any layer is invalid.
    pub fn from_env() -> Result<Self, GatewayError> {
        let config = ConfigLoader::new()
            .with_optional_file(DEFAULT_CONFIG_FILE)?
            .with_dotenv()?
            .with_env_prefix(DEFAULT_ENV_PREFIX)
            .load()?;
        Ok(Self::new(config))
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Returns the registry.
    #[must_use]
    pub const fn registry(&self) -> &FunctionRegistry {
        &self.registry
    }

    /// Registers a function. See [`FunctionRegistry::register`].
    pub fn register<F, Args>(&mut self, name: impl Into<String>, function: F) -> &mut Self
    where
        F: Function<Args>,
    {
        self.registry.register(name, function);
        self
    }

    /// Uses `reporter` for unexpected errors instead of the configured webhook.
    #[must_use]
    pub fn with_reporter(mut self, reporter: Arc<dyn ErrorReporter>) -> Self {
        self.reporter = Some(reporter);
        self
    }

    /// Builds the server without starting it.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::Reporter` if the configured webhook client cannot
    /// be built.
    pub fn into_server(self) -> Result<Server, GatewayError> {
        let Self {
            config,
            registry,
            reporter,
        } = self;

        let reporter = match (reporter, &config.reporting.endpoint) {
            (Some(reporter), _) => Some(reporter),
            (None, Some(endpoint)) => {
                tracing::info!(endpoint = %endpoint, "Reporting function errors to webhook");
                let webhook = WebhookReporter::new(endpoint.clone(), config.report_timeout())?;
                Some(Arc::new(webhook) as Arc<dyn ErrorReporter>)
            }
            (None, None) => None,
        };

        let mut dispatcher = Dispatcher::new(registry).with_invoke_timeout(config.invoke_timeout());
        if let Some(reporter) = reporter {
            dispatcher = dispatcher.with_reporter(reporter);
        }

        let server_config = ServerConfig::builder()
            .http_addr(config.server.http_addr.clone())
            .path_prefix(config.server.path_prefix.clone())
            .optional_token(config.security.token.clone())
            .shutdown_timeout(config.shutdown_timeout())
            .max_body_size(config.server.max_body_size)
            .build();

        Ok(Server::new(server_config, dispatcher))
    }

    /// Initializes telemetry, then serves until SIGTERM or SIGINT.
    ///
    /// # Errors
    ///
    /// Returns an error if telemetry, the reporter or the listener cannot be
    /// set up.
    pub async fn run(self) -> Result<(), GatewayError> {
        init_telemetry(&self.config.telemetry())?;
        self.run_with_shutdown(ShutdownSignal::with_os_signals()).await
    }

    /// Serves until `shutdown` is triggered. Telemetry is left as it is.
    ///
    /// # Errors
    ///
    /// Returns an error if the reporter or the listener cannot be set up.
    pub async fn run_with_shutdown(self, shutdown: ShutdownSignal) -> Result<(), GatewayError> {
        if self.config.security.token.is_none() {
            tracing::warn!("No security token configured, requests are not authenticated");
        }
        self.into_server()?.run_with_shutdown(shutdown).await?;
        Ok(())
    }
}

impl std::fmt::Debug for Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway")
            .field("config", &self.config)
            .field("registry", &self.registry)
            .field("reporter", &self.reporter.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use callgate_core::InvocationContext;
    use callgate_server::InvocationEnvelope;
    use serde_json::json;
    use std::time::Duration;

    async fn double(_ctx: InvocationContext, n: i64) -> Result<i64, anyhow::Error> {
        Ok(n * 2)
    }

    fn config() -> GatewayConfig {
        let mut config = GatewayConfig::default();
        config.server.http_addr = "127.0.0.1:0".to_string();
        config.server.path_prefix = "/rpc".to_string();
        config.server.invoke_timeout_secs = 7;
        config.server.max_body_size = 4096;
        config.security.token = Some("tok".to_string());
        config
    }

    #[test]
    fn test_into_server_maps_config() {
        let mut gateway = Gateway::new(config());
        gateway.register("double", double);

        let server = gateway.into_server().unwrap();
        assert_eq!(server.config().invoke_path(), "/rpc/invoke");
        assert!(server.config().requires_token());
        assert_eq!(server.config().shutdown_timeout(), Duration::from_secs(5));
        assert_eq!(server.dispatcher().invoke_timeout(), Duration::from_secs(7));
        assert_eq!(server.config().max_body_size(), 4096);
        assert!(server.dispatcher().registry().contains("ping"));
    }

    #[test]
    fn test_into_server_with_webhook() {
        let mut config = config();
        config.reporting.endpoint = Some("http://127.0.0.1:9/errors".to_string());

        assert!(Gateway::new(config).into_server().is_ok());
    }

    #[tokio::test]
    async fn test_registered_function_is_dispatched() {
        let mut gateway = Gateway::new(config());
        gateway.register("double", double);
        let server = gateway.into_server().unwrap();

        let reply = server
            .dispatcher()
            .dispatch(InvocationEnvelope::new("double", json!(4)))
            .await
            .unwrap();
        assert_eq!(reply.payload(), Some(&json!(8)));

        let names = server.dispatcher().registry().list_names();
        assert_eq!(names, vec!["double", "ping"]);
    }

    #[tokio::test]
    async fn test_run_with_shutdown() {
        let gateway = Gateway::new(config());
        let shutdown = ShutdownSignal::new();
        shutdown.trigger();

        let result = tokio::time::timeout(
            Duration::from_secs(5),
            gateway.run_with_shutdown(shutdown),
        )
        .await
        .unwrap();
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_invalid_address_surfaces_server_error() {
        let mut config = config();
        config.server.http_addr = "bad".to_string();

        let err = Gateway::new(config)
            .run_with_shutdown(ShutdownSignal::new())
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Server(_)));
    }
}
