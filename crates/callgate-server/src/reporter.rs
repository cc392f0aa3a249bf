//! Side-channel reporting of unexpected function errors.
//!
//! The dispatcher hands every unexpected error to an [`ErrorReporter`] on a
//! detached task, so reporting never delays the reply.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use callgate_core::RequestId;

/// Default timeout for one webhook delivery.
pub const DEFAULT_REPORT_TIMEOUT: Duration = Duration::from_secs(5);

/// An unexpected error raised by a function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorReport {
    /// Name of the function that failed.
    pub function: String,

    /// Request ID of the failed invocation.
    pub request_id: RequestId,

    /// Display form of the error, as sent to the caller.
    pub message: String,

    /// Display form of every error in the source chain, outermost first.
    pub chain: Vec<String>,

    /// User ID of the caller, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
}

/// Error delivering a report.
#[derive(Debug, Error)]
pub enum ReportError {
    /// The report could not be sent.
    #[error("cannot send error report: {0}")]
    Transport(#[from] reqwest::Error),

    /// The receiver answered with a non-success status.
    #[error("error report rejected with status {0}")]
    Rejected(http::StatusCode),
}

/// Receives unexpected function errors.
#[async_trait]
pub trait ErrorReporter: Send + Sync + 'static {
    /// Delivers one report.
    async fn report(&self, report: ErrorReport) -> Result<(), ReportError>;
}

/// Reporter that POSTs each report as JSON to an HTTP endpoint.
#[derive(Debug, Clone)]
pub struct WebhookReporter {
    client: reqwest::Client,
    endpoint: String,
}

impl WebhookReporter {
    /// Creates a reporter for `endpoint`, bounding each delivery by `timeout`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, ReportError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    /// Returns the target endpoint.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl ErrorReporter for WebhookReporter {
    async fn report(&self, report: ErrorReport) -> Result<(), ReportError> {
        let response = self.client.post(&self.endpoint).json(&report).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ReportError::Rejected(status));
        }
        Ok(())
    }
}
