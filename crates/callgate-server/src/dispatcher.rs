//! Invocation dispatch.
//!
//! The [`Dispatcher`] turns one [`InvocationEnvelope`] into one
//! [`InvocationReply`]: it looks the function up, rebuilds the trigger and the
//! invocation context, decodes the payload, runs the function on its own task
//! under a deadline and classifies whatever comes back.
//!
//! Failures the caller must see at the transport level (unknown function,
//! malformed trigger or payload, unencodable result) are returned as
//! [`DispatchError`]. Everything that happens inside the function, including
//! panics and timeouts, becomes a reply.

use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

use http::StatusCode;
use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use callgate_core::{InvocationContext, RawTrigger, TriggerKey, DEFAULT_INVOKE_TIMEOUT};
use callgate_telemetry::{record_invocation, InFlightGuard, InvocationOutcome};

use crate::envelope::{InvocationEnvelope, InvocationReply};
use crate::registry::FunctionRegistry;
use crate::reporter::ErrorReporter;
use crate::signature::CallFailure;
use crate::translate::ErrorTranslator;

/// Errors that end a dispatch without a reply.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// No function is registered under the requested name.
    #[error("function {0:?} not found")]
    FunctionNotFound(String),

    /// The manual-invocation body of the trigger is malformed.
    #[error("invalid trigger: {0}")]
    InvalidTrigger(#[source] serde_json::Error),

    /// The payload does not decode into the argument type of the function.
    #[error("cannot decode request payload: {source}")]
    PayloadDecode {
        /// Called function.
        function: String,
        /// Argument type the payload was decoded into.
        target_type: &'static str,
        /// Decode error.
        #[source]
        source: serde_json::Error,
    },

    /// The function result cannot be encoded as JSON.
    #[error("cannot encode response data: {source}")]
    ResultEncode {
        /// Called function.
        function: String,
        /// Encode error.
        #[source]
        source: serde_json::Error,
    },
}

impl DispatchError {
    /// Returns the HTTP status for this error.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::FunctionNotFound(_) => StatusCode::NOT_FOUND,
            Self::InvalidTrigger(_) | Self::PayloadDecode { .. } => StatusCode::BAD_REQUEST,
            Self::ResultEncode { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Dispatches invocations to registered functions.
///
/// Cloning is cheap; all clones share the same registry.
///
/// # Example
///
/// ```rust
/// use callgate_core::InvocationContext;
/// use callgate_server::{Dispatcher, FunctionRegistry, InvocationEnvelope};
/// use serde_json::json;
///
/// async fn double(_ctx: InvocationContext, n: i64) -> Result<i64, anyhow::Error> {
///     Ok(n * 2)
/// }
///
/// # tokio_test::block_on(async {
/// let mut registry = FunctionRegistry::new();
/// registry.register("double", double);
/// let dispatcher = Dispatcher::new(registry);
///
/// let reply = dispatcher
///     .dispatch(InvocationEnvelope::new("double", json!(21)))
///     .await
///     .unwrap();
/// assert_eq!(reply.payload(), Some(&json!(42)));
/// # });
/// ```
#[derive(Debug, Clone)]
pub struct Dispatcher {
    registry: Arc<FunctionRegistry>,
    translator: ErrorTranslator,
    invoke_timeout: Duration,
}

impl Dispatcher {
    /// Creates a dispatcher over `registry`.
    ///
    /// Adds the built-in `ping` function if the name is free, then freezes the
    /// registry.
    #[must_use]
    pub fn new(mut registry: FunctionRegistry) -> Self {
        registry.ensure_builtins();
        registry.freeze();

        Self {
            registry: Arc::new(registry),
            translator: ErrorTranslator::new(),
            invoke_timeout: DEFAULT_INVOKE_TIMEOUT,
        }
    }

    /// Returns a new dispatcher forwarding unexpected errors to `reporter`.
    #[must_use]
    pub fn with_reporter(mut self, reporter: Arc<dyn ErrorReporter>) -> Self {
        self.translator = self.translator.with_reporter(reporter);
        self
    }

    /// Returns a new dispatcher with a different per-call deadline.
    #[must_use]
    pub fn with_invoke_timeout(mut self, timeout: Duration) -> Self {
        self.invoke_timeout = timeout;
        self
    }

    /// Returns the registry.
    #[must_use]
    pub fn registry(&self) -> &FunctionRegistry {
        &self.registry
    }

    /// Returns the per-call deadline.
    #[must_use]
    pub const fn invoke_timeout(&self) -> Duration {
        self.invoke_timeout
    }

    /// Dispatches one invocation.
    ///
    /// Dropping the returned future cancels the invocation context, so a
    /// function observing cancellation stops when the caller goes away.
    ///
    /// # Errors
    ///
    /// Returns a [`DispatchError`] for transport-level failures. Function
    /// errors, panics and timeouts are reported inside the reply.
    pub async fn dispatch(
        &self,
        envelope: InvocationEnvelope,
    ) -> Result<InvocationReply, DispatchError> {
        let started = Instant::now();
        let InvocationEnvelope {
            fnname,
            accountability,
            payload,
            trigger,
        } = envelope;

        let Some(descriptor) = self.registry.lookup(&fnname) else {
            tracing::warn!(function = %fnname, "Function not found");
            record_invocation(&fnname, InvocationOutcome::NotFound, started.elapsed());
            return Err(DispatchError::FunctionNotFound(fnname));
        };

        let trigger = RawTrigger::from_wire(trigger.unwrap_or_default()).map_err(|e| {
            tracing::warn!(function = %fnname, error = %e, "Invalid trigger body");
            DispatchError::InvalidTrigger(e)
        })?;

        let cancellation = CancellationToken::new();
        let ctx = InvocationContext::new(fnname.as_str(), trigger)
            .with_optional_accountability(accountability)
            .with_deadline(started + self.invoke_timeout)
            .with_cancellation(cancellation.clone());

        tracing::info!(
            request_id = %ctx.request_id(),
            function = %fnname,
            event = %ctx.trigger().event,
            collection = %ctx.trigger().collection,
            keys = ?ctx.trigger().keys.iter().map(TriggerKey::as_str).collect::<Vec<_>>(),
            user = ctx.accountability().map_or("", |acc| acc.log_id()),
            "Function called"
        );

        let call = (descriptor.invoker())(ctx.clone(), &payload).map_err(|source| {
            let target_type = descriptor.signature().argument_type.unwrap_or("()");
            tracing::error!(
                request_id = %ctx.request_id(),
                function = %fnname,
                error = %source,
                payload = %payload,
                target_type,
                "Cannot decode request payload"
            );
            record_invocation(&fnname, InvocationOutcome::BadPayload, started.elapsed());
            DispatchError::PayloadDecode {
                function: fnname.clone(),
                target_type,
                source,
            }
        })?;

        let _cancel_on_drop = cancellation.clone().drop_guard();
        let _in_flight = InFlightGuard::new();
        let task = tokio::spawn(call);

        let (reply, outcome) = match tokio::time::timeout_at(ctx.deadline(), task).await {
            Ok(Ok(Ok(value))) => (InvocationReply::success(value), InvocationOutcome::Success),
            Ok(Ok(Err(CallFailure::Handler(error)))) => {
                let reply = self.translator.translate(&ctx, error);
                let outcome = if reply.call_error().is_some() {
                    InvocationOutcome::StructuredError
                } else {
                    InvocationOutcome::Error
                };
                (reply, outcome)
            }
            Ok(Ok(Err(CallFailure::Encode(source)))) => {
                tracing::error!(
                    request_id = %ctx.request_id(),
                    function = %fnname,
                    error = %source,
                    "Cannot encode function result"
                );
                record_invocation(&fnname, InvocationOutcome::Error, started.elapsed());
                return Err(DispatchError::ResultEncode {
                    function: fnname,
                    source,
                });
            }
            Ok(Err(join_error)) if join_error.is_panic() => {
                let message = panic_message(join_error.into_panic());
                let error = anyhow::anyhow!("function {fnname} panicked: {message}");
                (self.translator.unexpected(&ctx, &error), InvocationOutcome::Panic)
            }
            Ok(Err(_cancelled)) => {
                let error = anyhow::anyhow!("function {fnname} was cancelled");
                (self.translator.unexpected(&ctx, &error), InvocationOutcome::Error)
            }
            Err(_elapsed) => {
                cancellation.cancel();
                let error = anyhow::anyhow!(
                    "function {fnname} timed out after {:?}",
                    self.invoke_timeout
                );
                (self.translator.unexpected(&ctx, &error), InvocationOutcome::Timeout)
            }
        };

        let elapsed = started.elapsed();
        record_invocation(&fnname, outcome, elapsed);
        if outcome == InvocationOutcome::Success {
            tracing::debug!(
                request_id = %ctx.request_id(),
                function = %fnname,
                duration_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
                "Function succeeded"
            );
        }

        Ok(reply)
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    match payload.downcast::<String>() {
        Ok(message) => *message,
        Err(payload) => match payload.downcast::<&'static str>() {
            Ok(message) => (*message).to_string(),
            Err(_) => "unknown panic".to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use callgate_core::{Accountability, CallError, WireTrigger};
    use serde::{Deserialize, Serialize};
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicBool, Ordering};

    #[derive(Debug, Serialize, Deserialize)]
    struct Counter {
        foo: String,
        bar: i64,
    }

    async fn bump(_ctx: InvocationContext, mut counter: Counter) -> Result<Counter, anyhow::Error> {
        counter.foo.push_str("-bumped");
        counter.bar += 1;
        Ok(counter)
    }

    async fn whoami(ctx: InvocationContext) -> Result<Value, anyhow::Error> {
        Ok(json!({
            "user": ctx.accountability().and_then(|acc| acc.user.clone()),
            "keys": ctx.trigger().keys,
            "collection": ctx.trigger().collection,
        }))
    }

    async fn invalid(_ctx: InvocationContext) -> Result<(), CallError> {
        Err(CallError::failed_validation("posts", "title", "required"))
    }

    async fn broken(_ctx: InvocationContext) -> Result<(), anyhow::Error> {
        anyhow::bail!("database is down")
    }

    async fn explode(_ctx: InvocationContext) -> Result<(), anyhow::Error> {
        panic!("kaboom")
    }

    fn dispatcher() -> Dispatcher {
        let mut registry = FunctionRegistry::new();
        registry
            .register("bump", bump)
            .register("whoami", whoami)
            .register("invalid", invalid)
            .register("broken", broken)
            .register("explode", explode);
        Dispatcher::new(registry)
    }

    #[tokio::test]
    async fn test_success_with_payload() {
        let reply = dispatcher()
            .dispatch(InvocationEnvelope::new("bump", json!({"foo": "x", "bar": 1})))
            .await
            .unwrap();

        assert_eq!(reply.payload(), Some(&json!({"foo": "x-bumped", "bar": 2})));
        assert!(!reply.is_error());
    }

    #[tokio::test]
    async fn test_builtin_ping() {
        let dispatcher = dispatcher();
        assert!(dispatcher.registry().is_frozen());

        let reply = dispatcher
            .dispatch(InvocationEnvelope::new("ping", Value::Null))
            .await
            .unwrap();
        assert_eq!(reply.payload(), Some(&json!("pong")));
    }

    #[tokio::test]
    async fn test_not_found_invokes_nothing() {
        let err = dispatcher()
            .dispatch(InvocationEnvelope::new("missing", Value::Null))
            .await
            .unwrap_err();

        assert!(matches!(err, DispatchError::FunctionNotFound(ref name) if name == "missing"));
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(err.to_string(), r#"function "missing" not found"#);
    }

    #[tokio::test]
    async fn test_payload_decode_failure_never_invokes() {
        let called = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&called);

        let mut registry = FunctionRegistry::new();
        registry.register("typed", move |_ctx: InvocationContext, _n: u8| {
            let flag = Arc::clone(&flag);
            async move {
                flag.store(true, Ordering::SeqCst);
                Ok::<_, anyhow::Error>(())
            }
        });

        let err = Dispatcher::new(registry)
            .dispatch(InvocationEnvelope::new("typed", json!("not a number")))
            .await
            .unwrap_err();

        assert!(matches!(err, DispatchError::PayloadDecode { target_type: "u8", .. }));
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert!(err.to_string().starts_with("cannot decode request payload: "));
        assert!(!called.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_context_carries_accountability_and_trigger() {
        let envelope = InvocationEnvelope::new("whoami", Value::Null)
            .with_accountability(Accountability::user("u-1"))
            .with_trigger(WireTrigger {
                keys: vec![TriggerKey::numeric(1)],
                key: Some(TriggerKey::string("two")),
                collection: "events".to_string(),
                ..WireTrigger::default()
            });

        let reply = dispatcher().dispatch(envelope).await.unwrap();
        assert_eq!(
            reply.payload(),
            Some(&json!({"user": "u-1", "keys": [1, "two"], "collection": "events"}))
        );
    }

    #[tokio::test]
    async fn test_manual_body_overrides_location() {
        let envelope = InvocationEnvelope::new("whoami", Value::Null).with_trigger(WireTrigger {
            keys: vec![TriggerKey::numeric(1)],
            collection: "events".to_string(),
            body: Some(json!({"collection": "posts", "keys": ["p-1"]})),
            ..WireTrigger::default()
        });

        let reply = dispatcher().dispatch(envelope).await.unwrap();
        assert_eq!(reply.payload().unwrap()["collection"], "posts");
        assert_eq!(reply.payload().unwrap()["keys"], json!(["p-1"]));
    }

    #[tokio::test]
    async fn test_invalid_trigger_body() {
        let envelope = InvocationEnvelope::new("whoami", Value::Null).with_trigger(WireTrigger {
            body: Some(json!({"collection": 42})),
            ..WireTrigger::default()
        });

        let err = dispatcher().dispatch(envelope).await.unwrap_err();
        assert!(matches!(err, DispatchError::InvalidTrigger(_)));
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_structured_error_reply() {
        let reply = dispatcher()
            .dispatch(InvocationEnvelope::new("invalid", Value::Null))
            .await
            .unwrap();

        let structured = reply.call_error().unwrap();
        assert_eq!(structured.code(), "FAILED_VALIDATION");
        assert_eq!(structured.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(reply.error(), "");
        assert!(reply.payload().is_none());
    }

    #[tokio::test]
    async fn test_plain_error_reply() {
        let reply = dispatcher()
            .dispatch(InvocationEnvelope::new("broken", Value::Null))
            .await
            .unwrap();

        assert_eq!(reply.error(), "database is down");
        assert!(reply.call_error().is_none());
    }

    #[tokio::test]
    async fn test_panic_is_recovered() {
        let dispatcher = dispatcher();
        let reply = dispatcher
            .dispatch(InvocationEnvelope::new("explode", Value::Null))
            .await
            .unwrap();

        assert_eq!(reply.error(), "function explode panicked: kaboom");

        let reply = dispatcher
            .dispatch(InvocationEnvelope::new("ping", Value::Null))
            .await
            .unwrap();
        assert_eq!(reply.payload(), Some(&json!("pong")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_cancels_context() {
        let observed = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&observed);

        let mut registry = FunctionRegistry::new();
        registry.register("slow", move |ctx: InvocationContext| {
            let flag = Arc::clone(&flag);
            async move {
                ctx.cancelled().await;
                flag.store(true, Ordering::SeqCst);
                Ok::<_, anyhow::Error>(())
            }
        });

        let dispatcher = Dispatcher::new(registry).with_invoke_timeout(Duration::from_secs(2));
        let reply = dispatcher
            .dispatch(InvocationEnvelope::new("slow", Value::Null))
            .await
            .unwrap();

        assert_eq!(reply.error(), "function slow timed out after 2s");

        for _ in 0..10 {
            if observed.load(Ordering::SeqCst) {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert!(observed.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_follows_context_deadline() {
        let mut registry = FunctionRegistry::new();
        registry
            .register("just_in_time", |ctx: InvocationContext| async move {
                tokio::time::sleep_until(ctx.deadline() - Duration::from_millis(1)).await;
                Ok::<_, anyhow::Error>("done")
            })
            .register("just_late", |ctx: InvocationContext| async move {
                tokio::time::sleep_until(ctx.deadline() + Duration::from_millis(1)).await;
                Ok::<_, anyhow::Error>("done")
            });
        let dispatcher = Dispatcher::new(registry).with_invoke_timeout(Duration::from_secs(2));

        let on_time = dispatcher
            .dispatch(InvocationEnvelope::new("just_in_time", Value::Null))
            .await
            .unwrap();
        assert_eq!(on_time.payload(), Some(&json!("done")));

        let late = dispatcher
            .dispatch(InvocationEnvelope::new("just_late", Value::Null))
            .await
            .unwrap();
        assert_eq!(late.error(), "function just_late timed out after 2s");
    }

    #[tokio::test]
    async fn test_result_encode_failure() {
        use std::collections::HashMap;

        let mut registry = FunctionRegistry::new();
        registry.register("bad_map", |_ctx: InvocationContext| async {
            let mut map = HashMap::new();
            map.insert(vec![1_u8], "non-string keys do not encode");
            Ok::<_, anyhow::Error>(map)
        });

        let err = Dispatcher::new(registry)
            .dispatch(InvocationEnvelope::new("bad_map", Value::Null))
            .await
            .unwrap_err();

        assert!(matches!(err, DispatchError::ResultEncode { .. }));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_concurrent_dispatches_are_isolated() {
        let dispatcher = dispatcher();

        let handles: Vec<_> = (0..32)
            .map(|i| {
                let dispatcher = dispatcher.clone();
                tokio::spawn(async move {
                    let reply = dispatcher
                        .dispatch(InvocationEnvelope::new(
                            "bump",
                            json!({"foo": format!("v{i}"), "bar": i}),
                        ))
                        .await
                        .unwrap();
                    (i, reply)
                })
            })
            .collect();

        for handle in handles {
            let (i, reply) = handle.await.unwrap();
            assert_eq!(
                reply.payload(),
                Some(&json!({"foo": format!("v{i}-bumped"), "bar": i + 1}))
            );
        }
    }
}
