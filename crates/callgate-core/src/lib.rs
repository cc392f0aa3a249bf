//! # Callgate Core
//!
//! Core types for the callgate invocation gateway.
//!
//! This crate provides the value types that flow between a remote caller and
//! the functions exposed by a callgate process:
//!
//! - [`InvocationContext`] - Per-call context carrying caller, trigger, deadline and cancellation
//! - [`Accountability`] - Who is calling
//! - [`RawTrigger`] / [`Trigger`] - What upstream event caused the call
//! - [`TriggerKey`] - A record key that may arrive as a string or a number
//! - [`CallError`] - Structured, caller-facing errors
//! - [`Partial`] - Typed JSON documents that keep their unknown fields

#![doc(html_root_url = "https://docs.rs/callgate-core/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod accountability;
mod context;
mod error;
pub mod partial;
mod trigger;

pub use accountability::Accountability;
pub use context::{InvocationContext, RequestId, DEFAULT_INVOKE_TIMEOUT};
pub use error::{CallError, CallResult};
pub use partial::{Partial, PartialError};
pub use trigger::{ManualBody, RawTrigger, Trigger, TriggerKey, WireTrigger};
