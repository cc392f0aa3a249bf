//! HTTP server.
//!
//! Serves two endpoints under the configured prefix:
//!
//! - `POST <prefix>/invoke` decodes an [`InvocationEnvelope`] and answers with
//!   the [`InvocationReply`] of the dispatcher;
//! - `GET <prefix>/functions` lists the registered function names.
//!
//! Transport errors are answered with a plain-text body and a matching status.
//! Each connection runs on its own task; on shutdown the accept loop stops and
//! open connections get [`ServerConfig::shutdown_timeout`] to finish.
//!
//! # Example
//!
//! ```rust,no_run
//! use callgate_core::InvocationContext;
//! use callgate_server::{FunctionRegistry, Server};
//!
//! async fn hello(_ctx: InvocationContext) -> Result<&'static str, anyhow::Error> {
//!     Ok("hello")
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut registry = FunctionRegistry::new();
//!     registry.register("hello", hello);
//!
//!     Server::builder()
//!         .http_addr("0.0.0.0:8080")
//!         .registry(registry)
//!         .build()
//!         .run()
//!         .await?;
//!     Ok(())
//! }
//! ```

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http::header::{AUTHORIZATION, CONTENT_TYPE};
use http::{Method, Request, Response, StatusCode};
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::{Body, Incoming};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::task::TaskTracker;

use crate::config::{ServerConfig, ServerConfigBuilder};
use crate::dispatcher::Dispatcher;
use crate::envelope::InvocationEnvelope;
use crate::registry::FunctionRegistry;
use crate::shutdown::ShutdownSignal;

/// HTTP response body.
pub type ResponseBody = Full<Bytes>;

/// HTTP response.
pub type HttpResponse = Response<ResponseBody>;

const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";
const TEXT_CONTENT_TYPE: &str = "text/plain; charset=utf-8";

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The bind address cannot be parsed.
    #[error("invalid address {addr:?}: {source}")]
    InvalidAddress {
        /// Configured address.
        addr: String,
        /// Parse error.
        #[source]
        source: std::net::AddrParseError,
    },

    /// The listener cannot be bound.
    #[error("cannot bind to {addr}: {source}")]
    Bind {
        /// Parsed address.
        addr: SocketAddr,
        /// I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// The gateway HTTP server.
#[derive(Debug, Clone)]
pub struct Server {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    config: ServerConfig,
    dispatcher: Dispatcher,
    invoke_path: String,
    functions_path: String,
}

impl Server {
    /// Creates a server answering with `dispatcher`.
    #[must_use]
    pub fn new(config: ServerConfig, dispatcher: Dispatcher) -> Self {
        let invoke_path = config.invoke_path();
        let functions_path = config.functions_path();
        Self {
            inner: Arc::new(Inner {
                config,
                dispatcher,
                invoke_path,
                functions_path,
            }),
        }
    }

    /// Creates a new server builder.
    #[must_use]
    pub fn builder() -> ServerBuilder {
        ServerBuilder::default()
    }

    /// Returns the server configuration.
    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.inner.config
    }

    /// Returns the dispatcher.
    #[must_use]
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.inner.dispatcher
    }

    /// Runs the server until SIGTERM or SIGINT.
    ///
    /// # Errors
    ///
    /// Returns an error if the listener cannot be bound.
    pub async fn run(self) -> Result<(), ServerError> {
        self.run_with_shutdown(ShutdownSignal::with_os_signals()).await
    }

    /// Runs the server until `shutdown` is triggered.
    ///
    /// # Errors
    ///
    /// Returns an error if the listener cannot be bound.
    pub async fn run_with_shutdown(self, shutdown: ShutdownSignal) -> Result<(), ServerError> {
        self.bind().await?.serve(shutdown).await;
        Ok(())
    }

    /// Binds the listener without serving yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is invalid or cannot be bound.
    pub async fn bind(self) -> Result<BoundServer, ServerError> {
        let addr = self
            .inner
            .config
            .socket_addr()
            .map_err(|source| ServerError::InvalidAddress {
                addr: self.inner.config.http_addr().to_string(),
                source,
            })?;

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;

        Ok(BoundServer {
            server: self,
            listener,
        })
    }

    async fn serve_connection(self, stream: TcpStream, remote_addr: SocketAddr, shutdown: ShutdownSignal) {
        let io = TokioIo::new(stream);
        let server = self.clone();
        let service = service_fn(move |req: Request<Incoming>| {
            let server = server.clone();
            async move { server.handle_request(req).await }
        });

        let conn = http1::Builder::new().serve_connection(io, service);
        tokio::pin!(conn);

        let result = tokio::select! {
            result = conn.as_mut() => result,
            () = shutdown.recv() => {
                conn.as_mut().graceful_shutdown();
                conn.as_mut().await
            }
        };

        if let Err(e) = result {
            tracing::debug!(remote_addr = %remote_addr, error = %e, "Connection error");
        }
    }

    /// Handles one request.
    pub async fn handle_request<B>(&self, req: Request<B>) -> Result<HttpResponse, Infallible>
    where
        B: Body<Data = Bytes>,
        B::Error: Into<BoxError>,
    {
        let path = req.uri().path();
        tracing::debug!(method = %req.method(), path, "Request received");

        let response = if path == self.inner.invoke_path {
            self.handle_invoke(req).await
        } else if path == self.inner.functions_path {
            self.handle_functions(&req)
        } else {
            text_response(StatusCode::NOT_FOUND, "Not Found")
        };

        Ok(response)
    }

    async fn handle_invoke<B>(&self, req: Request<B>) -> HttpResponse
    where
        B: Body<Data = Bytes>,
        B::Error: Into<BoxError>,
    {
        if req.method() != Method::POST {
            return method_not_allowed();
        }
        if !self.authorized(&req) {
            return unauthorized();
        }

        let limit = self.inner.config.max_body_size();
        let body = match Limited::new(req.into_body(), limit).collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) if e.is::<LengthLimitError>() => {
                tracing::warn!(limit, "Request body too large");
                return text_response(StatusCode::PAYLOAD_TOO_LARGE, "request body too large");
            }
            Err(e) => {
                tracing::error!(error = %e, "Cannot read request body");
                return text_response(StatusCode::INTERNAL_SERVER_ERROR, "cannot read request body");
            }
        };

        let envelope: InvocationEnvelope = match serde_json::from_slice(&body) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::warn!(error = %e, "Invalid invocation envelope");
                return text_response(StatusCode::BAD_REQUEST, "invalid request");
            }
        };

        match self.inner.dispatcher.dispatch(envelope).await {
            Ok(reply) => match serde_json::to_vec(&reply) {
                Ok(body) => json_response(StatusCode::OK, body),
                Err(e) => text_response(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    &format!("cannot encode response data: {e}"),
                ),
            },
            Err(e) => text_response(e.status_code(), &e.to_string()),
        }
    }

    fn handle_functions<B>(&self, req: &Request<B>) -> HttpResponse {
        if req.method() != Method::GET {
            return method_not_allowed();
        }
        if !self.authorized(req) {
            return unauthorized();
        }

        let names = self.inner.dispatcher.registry().list_names();
        match serde_json::to_vec(&names) {
            Ok(body) => json_response(StatusCode::OK, body),
            Err(e) => text_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &format!("cannot encode response data: {e}"),
            ),
        }
    }

    fn authorized<B>(&self, req: &Request<B>) -> bool {
        let header = req
            .headers()
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok());
        let authorized = self.inner.config.is_authorized(header);
        if !authorized {
            tracing::warn!(path = req.uri().path(), "Wrong authorization token");
        }
        authorized
    }
}

/// A server whose listener is bound.
///
/// Useful when binding port 0 and the actual address is needed before serving.
#[derive(Debug)]
pub struct BoundServer {
    server: Server,
    listener: TcpListener,
}

impl BoundServer {
    /// Returns the bound address.
    ///
    /// # Errors
    ///
    /// Returns an error if the socket address cannot be read.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Serves connections until `shutdown` is triggered, then waits for open
    /// connections up to the configured grace period.
    pub async fn serve(self, shutdown: ShutdownSignal) {
        let Self { server, listener } = self;
        let tracker = TaskTracker::new();

        if let Ok(addr) = listener.local_addr() {
            tracing::info!(
                addr = %addr,
                prefix = server.config().path_prefix(),
                functions = server.dispatcher().registry().len(),
                "Server listening"
            );
        }

        loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, remote_addr)) => {
                        tracker.spawn(server.clone().serve_connection(stream, remote_addr, shutdown.clone()));
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Cannot accept connection");
                        tokio::time::sleep(Duration::from_millis(50)).await;
                    }
                },
                () = shutdown.recv() => {
                    tracing::info!("Shutdown signal received, stopping server");
                    break;
                }
            }
        }

        drop(listener);
        tracker.close();

        let grace = server.config().shutdown_timeout();
        tracing::info!(
            connections = tracker.len(),
            grace_ms = u64::try_from(grace.as_millis()).unwrap_or(u64::MAX),
            "Waiting for open connections"
        );

        if tokio::time::timeout(grace, tracker.wait()).await.is_err() {
            tracing::warn!(connections = tracker.len(), "Shutdown grace period elapsed");
        }

        tracing::info!("Server stopped");
    }
}

/// Builder for [`Server`].
#[derive(Debug, Default)]
pub struct ServerBuilder {
    config: ServerConfigBuilder,
    registry: Option<FunctionRegistry>,
    dispatcher: Option<Dispatcher>,
}

impl ServerBuilder {
    /// Creates a new builder with default settings and an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the HTTP bind address.
    #[must_use]
    pub fn http_addr(mut self, addr: impl Into<String>) -> Self {
        self.config = self.config.http_addr(addr);
        self
    }

    /// Sets the endpoint path prefix.
    #[must_use]
    pub fn path_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config = self.config.path_prefix(prefix);
        self
    }

    /// Requires a bearer token.
    #[must_use]
    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.config = self.config.token(token);
        self
    }

    /// Sets the shutdown grace period.
    #[must_use]
    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.config = self.config.shutdown_timeout(timeout);
        self
    }

    /// Sets the maximum accepted request body size in bytes.
    #[must_use]
    pub fn max_body_size(mut self, bytes: usize) -> Self {
        self.config = self.config.max_body_size(bytes);
        self
    }

    /// Serves the functions of `registry` with a default dispatcher.
    #[must_use]
    pub fn registry(mut self, registry: FunctionRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Serves with a configured dispatcher. Takes precedence over
    /// [`registry`](Self::registry).
    #[must_use]
    pub fn dispatcher(mut self, dispatcher: Dispatcher) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    /// Builds the server.
    #[must_use]
    pub fn build(self) -> Server {
        let dispatcher = self
            .dispatcher
            .unwrap_or_else(|| Dispatcher::new(self.registry.unwrap_or_default()));
        Server::new(self.config.build(), dispatcher)
    }
}

fn json_response(status: StatusCode, body: Vec<u8>) -> HttpResponse {
    Response::builder()
        .status(status)
        .header(CONTENT_TYPE, JSON_CONTENT_TYPE)
        .body(Full::new(Bytes::from(body)))
        .unwrap_or_else(|_| Response::new(Full::new(Bytes::new())))
}

fn text_response(status: StatusCode, message: &str) -> HttpResponse {
    Response::builder()
        .status(status)
        .header(CONTENT_TYPE, TEXT_CONTENT_TYPE)
        .body(Full::new(Bytes::from(message.to_string())))
        .unwrap_or_else(|_| Response::new(Full::new(Bytes::new())))
}

fn method_not_allowed() -> HttpResponse {
    text_response(StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed")
}

fn unauthorized() -> HttpResponse {
    text_response(StatusCode::UNAUTHORIZED, "wrong authorization token")
}
