//! Classification of errors returned by functions.
//!
//! A [`CallError`] anywhere in the error chain is a structured error: it goes
//! back to the caller verbatim. Anything else is unexpected: it is logged,
//! reported, and only its message reaches the caller.

use std::sync::Arc;

use callgate_core::{CallError, InvocationContext};

use crate::envelope::InvocationReply;
use crate::reporter::{ErrorReport, ErrorReporter};

/// Turns function errors into replies.
#[derive(Clone, Default)]
pub struct ErrorTranslator {
    reporter: Option<Arc<dyn ErrorReporter>>,
}

impl ErrorTranslator {
    /// Creates a translator without a reporter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a new translator forwarding unexpected errors to `reporter`.
    #[must_use]
    pub fn with_reporter(mut self, reporter: Arc<dyn ErrorReporter>) -> Self {
        self.reporter = Some(reporter);
        self
    }

    /// Returns `true` if a reporter is configured.
    #[must_use]
    pub fn has_reporter(&self) -> bool {
        self.reporter.is_some()
    }

    /// Classifies `error` and builds the reply for it.
    ///
    /// Classification looks at the error type, never at its message.
    /// Must be called from within a tokio runtime when a reporter is set.
    pub fn translate(&self, ctx: &InvocationContext, error: anyhow::Error) -> InvocationReply {
        if let Some(structured) = error.downcast_ref::<CallError>() {
            tracing::info!(
                request_id = %ctx.request_id(),
                function = ctx.function(),
                code = structured.code(),
                status = structured.status_code().as_u16(),
                "Function returned a structured error"
            );
            return InvocationReply::structured(structured.clone());
        }

        self.unexpected(ctx, &error)
    }

    /// Builds the reply for an error known to be unexpected.
    pub fn unexpected(&self, ctx: &InvocationContext, error: &anyhow::Error) -> InvocationReply {
        let message = error
            .chain()
            .map(ToString::to_string)
            .find(|message| !message.is_empty())
            .unwrap_or_else(|| format!("function {} failed without an error message", ctx.function()));

        tracing::error!(
            request_id = %ctx.request_id(),
            function = ctx.function(),
            error = %format!("{error:#}"),
            "Function call error"
        );

        if let Some(reporter) = &self.reporter {
            let report = ErrorReport {
                function: ctx.function().to_string(),
                request_id: ctx.request_id(),
                message: message.clone(),
                chain: error.chain().map(ToString::to_string).collect(),
                user: ctx.accountability().and_then(|acc| acc.user.clone()),
            };
            let reporter = Arc::clone(reporter);

            tokio::spawn(async move {
                let function = report.function.clone();
                if let Err(e) = reporter.report(report).await {
                    tracing::warn!(function = %function, error = %e, "Cannot report function error");
                }
            });
        }

        InvocationReply::failure(message)
    }
}

impl std::fmt::Debug for ErrorTranslator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ErrorTranslator")
            .field("reporter", &self.reporter.is_some())
            .finish()
    }
}
