//! # Callgate
//!
//! **Invocation gateway exposing typed async functions over HTTP**
//!
//! A callgate process registers named async functions once, at startup, and
//! serves remote calls naming one of them with a JSON payload, the identity
//! of the caller and the upstream event that triggered the call.
//!
//! - Function shapes are checked by the compiler at registration
//! - Payloads are decoded into the declared argument type
//! - [`CallError`](prelude::CallError) travels back to the caller as a
//!   structured document; any other error is logged, reported and reduced to
//!   its message
//! - Panics and timeouts are contained to the invocation
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use callgate::prelude::*;
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Serialize, Deserialize)]
//! struct Post {
//!     title: String,
//! }
//!
//! async fn publish(ctx: InvocationContext, post: Partial<Post>) -> Result<Partial<Post>, CallError> {
//!     if post.title.is_empty() {
//!         return Err(CallError::failed_validation("posts", "title", "required"));
//!     }
//!     tracing::info!(user = ?ctx.accountability().and_then(|a| a.user.as_deref()), "publishing");
//!     Ok(post)
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), GatewayError> {
//!     let mut gateway = Gateway::from_env()?;
//!     gateway.register("publish", publish);
//!     gateway.run().await
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! HTTP → auth → envelope → Dispatcher → registry lookup → trigger/identity
//!                                     → payload decode → function task
//!                                     → ErrorTranslator → reply
//! ```

#![doc(html_root_url = "https://docs.rs/callgate/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod gateway;

pub use gateway::{Gateway, GatewayError, DEFAULT_CONFIG_FILE};

pub use callgate_config as config;
pub use callgate_core as core;
pub use callgate_server as server;
pub use callgate_telemetry as telemetry;

/// Prelude module for convenient imports.
///
/// ```rust
/// use callgate::prelude::*;
/// ```
pub mod prelude {
    pub use crate::gateway::{Gateway, GatewayError};

    pub use callgate_core::{
        Accountability, CallError, CallResult, InvocationContext, Partial, RawTrigger, Trigger,
        TriggerKey,
    };

    pub use callgate_server::{
        Dispatcher, ErrorReport, ErrorReporter, FunctionRegistry, InvocationEnvelope,
        InvocationReply, Server, ShutdownSignal,
    };

    pub use callgate_config::{ConfigLoader, GatewayConfig};
}
