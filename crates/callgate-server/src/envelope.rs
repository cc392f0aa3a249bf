//! Wire types of the invoke endpoint.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use callgate_core::{Accountability, CallError, WireTrigger};

/// Request body of one invocation.
///
/// # Example
///
/// ```
/// use callgate_server::InvocationEnvelope;
///
/// let envelope: InvocationEnvelope = serde_json::from_str(
///     r#"{"fnname":"ping","accountability":null,"payload":null}"#,
/// ).unwrap();
///
/// assert_eq!(envelope.fnname, "ping");
/// assert!(envelope.trigger.is_none());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InvocationEnvelope {
    /// Name of the function to call. Empty when absent.
    #[serde(default)]
    pub fnname: String,

    /// Caller identity.
    #[serde(default)]
    pub accountability: Option<Accountability>,

    /// Function payload, `null` when absent.
    #[serde(default)]
    pub payload: Value,

    /// Upstream trigger, empty when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger: Option<WireTrigger>,
}

impl InvocationEnvelope {
    /// Creates an envelope calling `fnname` with `payload`.
    #[must_use]
    pub fn new(fnname: impl Into<String>, payload: Value) -> Self {
        Self {
            fnname: fnname.into(),
            payload,
            ..Self::default()
        }
    }

    /// Returns a new envelope with the given caller identity.
    #[must_use]
    pub fn with_accountability(mut self, accountability: Accountability) -> Self {
        self.accountability = Some(accountability);
        self
    }

    /// Returns a new envelope with the given trigger.
    #[must_use]
    pub fn with_trigger(mut self, trigger: WireTrigger) -> Self {
        self.trigger = Some(trigger);
        self
    }
}

/// Reply to one invocation.
///
/// At most one of the result payload, the error message and the structured
/// error is set. A successful call without a result sets none and encodes as
/// `{}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InvocationReply {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    payload: Option<Value>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    error: String,

    #[serde(rename = "callGoError", default, skip_serializing_if = "Option::is_none")]
    call_error: Option<CallError>,
}

impl InvocationReply {
    /// Creates a successful reply. A `null` result is left out.
    #[must_use]
    pub fn success(payload: Value) -> Self {
        Self {
            payload: (!payload.is_null()).then_some(payload),
            ..Self::default()
        }
    }

    /// Creates a reply carrying an opaque error message.
    #[must_use]
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
            ..Self::default()
        }
    }

    /// Creates a reply carrying a structured error.
    #[must_use]
    pub fn structured(error: CallError) -> Self {
        Self {
            call_error: Some(error),
            ..Self::default()
        }
    }

    /// Returns the result payload.
    #[must_use]
    pub const fn payload(&self) -> Option<&Value> {
        self.payload.as_ref()
    }

    /// Returns the opaque error message, empty when there is none.
    #[must_use]
    pub fn error(&self) -> &str {
        &self.error
    }

    /// Returns the structured error.
    #[must_use]
    pub const fn call_error(&self) -> Option<&CallError> {
        self.call_error.as_ref()
    }

    /// Returns `true` if the reply carries any kind of error.
    #[must_use]
    pub fn is_error(&self) -> bool {
        !self.error.is_empty() || self.call_error.is_some()
    }
}
