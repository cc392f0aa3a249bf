//! Invocation context types.
//!
//! The [`InvocationContext`] is handed to every registered function as its
//! first argument. It carries the caller identity, the trigger that caused the
//! call, the deadline and the cancellation signal for one invocation.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::{Accountability, RawTrigger, Trigger};

/// Default upper bound on the execution time of one invocation.
pub const DEFAULT_INVOKE_TIMEOUT: Duration = Duration::from_secs(30);

/// A unique identifier for each invocation, using UUID v7.
///
/// UUID v7 is time-ordered, which keeps identifiers sortable in logs.
///
/// # Example
///
/// ```
/// use callgate_core::RequestId;
///
/// let id = RequestId::new();
/// println!("Invocation ID: {}", id);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(Uuid);

impl RequestId {
    /// Creates a new unique request ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for RequestId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// Per-invocation context passed to every registered function.
///
/// Cloning is cheap and every clone observes the same cancellation signal.
///
/// # Example
///
/// ```
/// use callgate_core::{Accountability, InvocationContext, RawTrigger};
///
/// let ctx = InvocationContext::new("ping", RawTrigger::default())
///     .with_accountability(Accountability::user("u-1"));
///
/// assert_eq!(ctx.function(), "ping");
/// assert_eq!(ctx.accountability().unwrap().log_id(), "u-1");
/// assert!(!ctx.is_cancelled());
/// ```
#[derive(Debug, Clone)]
pub struct InvocationContext {
    request_id: RequestId,
    function: String,
    accountability: Option<Accountability>,
    trigger: RawTrigger,
    cancellation: CancellationToken,
    deadline: Instant,
}

impl InvocationContext {
    /// Creates a context for a call to `function`.
    ///
    /// The deadline defaults to [`DEFAULT_INVOKE_TIMEOUT`] from now and the
    /// context gets a fresh cancellation token.
    #[must_use]
    pub fn new(function: impl Into<String>, trigger: RawTrigger) -> Self {
        Self {
            request_id: RequestId::new(),
            function: function.into(),
            accountability: None,
            trigger,
            cancellation: CancellationToken::new(),
            deadline: Instant::now() + DEFAULT_INVOKE_TIMEOUT,
        }
    }

    /// Creates a context for tests, with an empty trigger.
    #[must_use]
    pub fn mock(function: impl Into<String>) -> Self {
        Self::new(function, RawTrigger::default())
    }

    /// Returns a new context with the given request ID.
    #[must_use]
    pub fn with_request_id(mut self, request_id: RequestId) -> Self {
        self.request_id = request_id;
        self
    }

    /// Returns a new context with the given caller identity.
    #[must_use]
    pub fn with_accountability(mut self, accountability: Accountability) -> Self {
        self.accountability = Some(accountability);
        self
    }

    /// Returns a new context with an optional caller identity.
    #[must_use]
    pub fn with_optional_accountability(mut self, accountability: Option<Accountability>) -> Self {
        self.accountability = accountability;
        self
    }

    /// Returns a new context whose deadline is `timeout` from now.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Instant::now() + timeout;
        self
    }

    /// Returns a new context with the given deadline.
    #[must_use]
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = deadline;
        self
    }

    /// Returns a new context driven by the given cancellation token.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// Returns the request ID.
    #[must_use]
    pub const fn request_id(&self) -> RequestId {
        self.request_id
    }

    /// Returns the name of the called function.
    #[must_use]
    pub fn function(&self) -> &str {
        &self.function
    }

    /// Returns the caller identity, if the call carried one.
    #[must_use]
    pub const fn accountability(&self) -> Option<&Accountability> {
        self.accountability.as_ref()
    }

    /// Returns the trigger of the call.
    #[must_use]
    pub const fn trigger(&self) -> &RawTrigger {
        &self.trigger
    }

    /// Decodes the trigger payload into `P`.
    pub fn trigger_as<P: DeserializeOwned>(&self) -> Result<Trigger<P>, serde_json::Error> {
        self.trigger.decode()
    }

    /// Decodes the manual-invocation body into `T`.
    pub fn fields<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        self.trigger.fields()
    }

    /// Returns the cancellation token of the call.
    #[must_use]
    pub const fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// Returns `true` once the call has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Completes when the call is cancelled, either by timeout or because the
    /// caller went away.
    pub async fn cancelled(&self) {
        self.cancellation.cancelled().await;
    }

    /// Returns the deadline of the call.
    #[must_use]
    pub const fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Returns the time left before the deadline, zero once it has passed.
    #[must_use]
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }
}
