//! # Callgate Server
//!
//! Function registry, invocation dispatcher and HTTP server for callgate.
//!
//! - [`FunctionRegistry`] - Validated, name-addressed functions
//! - [`Dispatcher`] - Runs one invocation and classifies its outcome
//! - [`ErrorTranslator`] / [`ErrorReporter`] - Structured vs unexpected errors
//! - [`Server`] - hyper HTTP/1.1 server with graceful shutdown
//!
//! ## Example
//!
//! ```rust,no_run
//! use callgate_core::InvocationContext;
//! use callgate_server::{FunctionRegistry, Server};
//!
//! async fn version(_ctx: InvocationContext) -> Result<&'static str, anyhow::Error> {
//!     Ok(env!("CARGO_PKG_VERSION"))
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut registry = FunctionRegistry::new();
//!     registry.register("version", version);
//!
//!     Server::builder().registry(registry).build().run().await?;
//!     Ok(())
//! }
//! ```

#![doc(html_root_url = "https://docs.rs/callgate-server/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod config;
mod dispatcher;
mod envelope;
mod registry;
mod reporter;
mod server;
mod shutdown;
pub mod signature;
mod translate;

pub use config::{
    ServerConfig, ServerConfigBuilder, DEFAULT_HTTP_ADDR, DEFAULT_MAX_BODY_SIZE,
    DEFAULT_PATH_PREFIX, DEFAULT_SHUTDOWN_TIMEOUT,
};
pub use dispatcher::{DispatchError, Dispatcher};
pub use envelope::{InvocationEnvelope, InvocationReply};
pub use registry::{FunctionDescriptor, FunctionRegistry, PING_FUNCTION};
pub use reporter::{ErrorReport, ErrorReporter, ReportError, WebhookReporter, DEFAULT_REPORT_TIMEOUT};
pub use server::{BoundServer, HttpResponse, ResponseBody, Server, ServerBuilder, ServerError};
pub use shutdown::ShutdownSignal;
pub use signature::{Function, Signature};
pub use translate::ErrorTranslator;
