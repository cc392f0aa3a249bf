//! Function shapes accepted by the registry.
//!
//! A function can be registered if it is an async function (or a closure
//! returning a future) of one of these shapes:
//!
//! | Parameters | Return |
//! |---|---|
//! | `(InvocationContext)` | `Result<R, E>` |
//! | `(InvocationContext, P)` | `Result<R, E>` |
//!
//! where `P: DeserializeOwned`, `R: Serialize` (use `()` for no result) and
//! `E: Into<anyhow::Error>`. The shape is checked by the [`Function`] trait
//! bounds, so anything else is rejected by the compiler.
//!
//! A function without the context parameter does not register:
//!
//! ```compile_fail
//! use callgate_server::FunctionRegistry;
//!
//! async fn no_context() -> Result<(), anyhow::Error> {
//!     Ok(())
//! }
//!
//! let mut registry = FunctionRegistry::new();
//! registry.register("no_context", no_context);
//! ```
//!
//! Neither does one with the context in the wrong position:
//!
//! ```compile_fail
//! use callgate_core::InvocationContext;
//! use callgate_server::FunctionRegistry;
//!
//! async fn swapped(_name: String, _ctx: InvocationContext) -> Result<(), anyhow::Error> {
//!     Ok(())
//! }
//!
//! let mut registry = FunctionRegistry::new();
//! registry.register("swapped", swapped);
//! ```
//!
//! Or with more than one payload parameter:
//!
//! ```compile_fail
//! use callgate_core::InvocationContext;
//! use callgate_server::FunctionRegistry;
//!
//! async fn two(_ctx: InvocationContext, _a: String, _b: String) -> Result<(), anyhow::Error> {
//!     Ok(())
//! }
//!
//! let mut registry = FunctionRegistry::new();
//! registry.register("two", two);
//! ```
//!
//! Or without an error in the return type:
//!
//! ```compile_fail
//! use callgate_core::InvocationContext;
//! use callgate_server::FunctionRegistry;
//!
//! async fn infallible(_ctx: InvocationContext) -> String {
//!     "value".to_string()
//! }
//!
//! let mut registry = FunctionRegistry::new();
//! registry.register("infallible", infallible);
//! ```
//!
//! Or whose error cannot become an `anyhow::Error`:
//!
//! ```compile_fail
//! use callgate_core::InvocationContext;
//! use callgate_server::FunctionRegistry;
//!
//! async fn stringly(_ctx: InvocationContext) -> Result<(), String> {
//!     Ok(())
//! }
//!
//! let mut registry = FunctionRegistry::new();
//! registry.register("stringly", stringly);
//! ```
//!
//! Synchronous functions are rejected too:
//!
//! ```compile_fail
//! use callgate_core::InvocationContext;
//! use callgate_server::FunctionRegistry;
//!
//! fn blocking(_ctx: InvocationContext) -> Result<(), anyhow::Error> {
//!     Ok(())
//! }
//!
//! let mut registry = FunctionRegistry::new();
//! registry.register("blocking", blocking);
//! ```

use std::any::TypeId;
use std::future::Future;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use callgate_core::InvocationContext;

/// A call whose payload has been decoded but that has not started yet.
///
/// Nothing of the function body runs until the future is polled.
pub type PendingCall = BoxFuture<'static, Result<Value, CallFailure>>;

/// Type-erased entry point stored in a descriptor.
///
/// Decodes the payload into the argument type of the function and returns the
/// pending call.
pub type Invoker =
    Arc<dyn Fn(InvocationContext, &Value) -> Result<PendingCall, serde_json::Error> + Send + Sync>;

/// Why a started call did not produce a JSON result.
#[derive(Debug)]
pub enum CallFailure {
    /// The function returned an error.
    Handler(anyhow::Error),

    /// The function result could not be encoded as JSON.
    Encode(serde_json::Error),
}

/// Argument and result types of a registered function.
///
/// Type names come from [`std::any::type_name`] and are meant for logs and
/// diagnostics only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Signature {
    /// Payload type, `None` for functions that only take the context.
    pub argument_type: Option<&'static str>,

    /// Result type, `None` for functions returning `()`.
    pub result_type: Option<&'static str>,
}

impl Signature {
    fn of<R: 'static>(argument_type: Option<&'static str>) -> Self {
        let is_unit = TypeId::of::<R>() == TypeId::of::<()>();
        Self {
            argument_type,
            result_type: (!is_unit).then(std::any::type_name::<R>),
        }
    }
}

/// Implemented for every function shape the registry accepts.
///
/// `Args` is the parameter tuple of the function; it only exists to keep the
/// two implementations apart and is always inferred.
pub trait Function<Args>: Send + Sync + Sized + 'static {
    /// Describes the argument and result types.
    fn signature(&self) -> Signature;

    /// Erases the function into an [`Invoker`].
    fn into_invoker(self) -> Invoker;
}

impl<F, Fut, R, E> Function<(InvocationContext,)> for F
where
    F: Fn(InvocationContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, E>> + Send + 'static,
    R: Serialize + Send + 'static,
    E: Into<anyhow::Error> + Send + 'static,
{
    fn signature(&self) -> Signature {
        Signature::of::<R>(None)
    }

    fn into_invoker(self) -> Invoker {
        let function = Arc::new(self);
        Arc::new(
            move |ctx: InvocationContext, _payload: &Value| -> Result<PendingCall, serde_json::Error> {
                let function = Arc::clone(&function);
                let call: PendingCall = Box::pin(async move { settle(function(ctx).await) });
                Ok(call)
            },
        )
    }
}

impl<F, Fut, P, R, E> Function<(InvocationContext, P)> for F
where
    F: Fn(InvocationContext, P) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, E>> + Send + 'static,
    P: DeserializeOwned + Send + 'static,
    R: Serialize + Send + 'static,
    E: Into<anyhow::Error> + Send + 'static,
{
    fn signature(&self) -> Signature {
        Signature::of::<R>(Some(std::any::type_name::<P>()))
    }

    fn into_invoker(self) -> Invoker {
        let function = Arc::new(self);
        Arc::new(
            move |ctx: InvocationContext, payload: &Value| -> Result<PendingCall, serde_json::Error> {
                let payload = P::deserialize(payload)?;
                let function = Arc::clone(&function);
                let call: PendingCall =
                    Box::pin(async move { settle(function(ctx, payload).await) });
                Ok(call)
            },
        )
    }
}

fn settle<R, E>(result: Result<R, E>) -> Result<Value, CallFailure>
where
    R: Serialize,
    E: Into<anyhow::Error>,
{
    let value = result.map_err(|e| CallFailure::Handler(e.into()))?;
    serde_json::to_value(value).map_err(CallFailure::Encode)
}
