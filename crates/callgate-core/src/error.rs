//! Structured, caller-facing errors.
//!
//! A function that wants the caller to see a well-typed error document returns
//! a [`CallError`]. Any other error a function returns is treated as
//! unexpected: it is logged, optionally reported, and only its message reaches
//! the caller.

use std::collections::BTreeMap;

use http::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using [`CallError`].
pub type CallResult<T> = Result<T, CallError>;

/// Value of the `type` extension set by the canonical constructors.
const EXTENSION_TYPE: &str = "callgo";

/// Structured error returned by a function and serialised verbatim into the
/// reply.
///
/// # Example
///
/// ```
/// use callgate_core::{CallError, CallResult};
///
/// fn check_title(title: &str) -> CallResult<()> {
///     if title.is_empty() {
///         return Err(CallError::failed_validation("posts", "title", "required"));
///     }
///     Ok(())
/// }
///
/// let err = check_title("").unwrap_err();
/// assert_eq!(err.code(), "FAILED_VALIDATION");
/// assert_eq!(err.to_string(), "[FAILED_VALIDATION] Validation failed");
/// ```
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("[{code}] {message}")]
pub struct CallError {
    code: String,
    message: String,
    status: u16,
    #[serde(default)]
    extensions: BTreeMap<String, String>,
}

impl CallError {
    /// Creates a structured error with a custom code and HTTP status.
    #[must_use]
    pub fn new(code: impl Into<String>, message: impl Into<String>, status: StatusCode) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            status: status.as_u16(),
            extensions: BTreeMap::new(),
        }
    }

    /// Creates a `FAILED_VALIDATION` error pointing at a field of a
    /// collection.
    #[must_use]
    pub fn failed_validation(
        collection: impl Into<String>,
        field: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::new("FAILED_VALIDATION", "Validation failed", StatusCode::BAD_REQUEST)
            .with_extension("type", EXTENSION_TYPE)
            .with_extension("collection", collection)
            .with_extension("field", field)
            .with_extension("message", message)
    }

    /// Creates an `INVALID` error.
    #[must_use]
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::new("INVALID", message, StatusCode::BAD_REQUEST).with_extension("type", EXTENSION_TYPE)
    }

    /// Returns a new error with an extra extension entry.
    #[must_use]
    pub fn with_extension(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extensions.insert(key.into(), value.into());
        self
    }

    /// Returns the error code.
    #[must_use]
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Returns the human-readable message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the HTTP status the upstream caller should surface.
    ///
    /// Falls back to 500 if the stored status is not a valid HTTP status.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    /// Returns the extension entries.
    #[must_use]
    pub const fn extensions(&self) -> &BTreeMap<String, String> {
        &self.extensions
    }
}
