//! Function registration and lookup.
//!
//! The registry maps function names to their validated descriptors. It is
//! filled during startup and becomes read-only once serving begins: the first
//! [`FunctionRegistry::lookup`] or [`FunctionRegistry::list_names`] freezes it,
//! and registering into a frozen registry aborts.
//!
//! # Example
//!
//! ```rust
//! use callgate_core::InvocationContext;
//! use callgate_server::FunctionRegistry;
//! use serde::Deserialize;
//!
//! #[derive(Deserialize)]
//! struct Greet {
//!     name: String,
//! }
//!
//! async fn greet(_ctx: InvocationContext, req: Greet) -> Result<String, anyhow::Error> {
//!     Ok(format!("Hello, {}!", req.name))
//! }
//!
//! let mut registry = FunctionRegistry::new();
//! registry.register("greet", greet);
//!
//! assert_eq!(registry.list_names(), vec!["greet"]);
//! assert!(registry.is_frozen());
//! ```

use std::collections::BTreeMap;
use std::convert::Infallible;
use std::sync::atomic::{AtomicBool, Ordering};

use callgate_core::InvocationContext;

use crate::signature::{Function, Invoker, Signature};

/// Name of the built-in liveness function.
pub const PING_FUNCTION: &str = "ping";

/// A validated, registry-held function.
pub struct FunctionDescriptor {
    name: String,
    signature: Signature,
    invoker: Invoker,
}

impl FunctionDescriptor {
    /// Returns the function name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the argument and result types.
    #[must_use]
    pub const fn signature(&self) -> Signature {
        self.signature
    }

    /// Returns `true` if the function takes a payload.
    #[must_use]
    pub const fn takes_payload(&self) -> bool {
        self.signature.argument_type.is_some()
    }

    /// Returns the type-erased entry point.
    #[must_use]
    pub const fn invoker(&self) -> &Invoker {
        &self.invoker
    }
}

impl std::fmt::Debug for FunctionDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionDescriptor")
            .field("name", &self.name)
            .field("signature", &self.signature)
            .finish_non_exhaustive()
    }
}

/// Registry of callable functions.
#[derive(Default)]
pub struct FunctionRegistry {
    functions: BTreeMap<String, FunctionDescriptor>,
    frozen: AtomicBool,
}

impl FunctionRegistry {
    /// Creates a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a function under `name`.
    ///
    /// The accepted function shapes are described in [`crate::signature`];
    /// anything else does not compile.
    ///
    /// # Panics
    ///
    /// Registration mistakes are programming errors and abort startup. This
    /// panics if `name` is empty, if `name` is already registered, or if the
    /// registry has been frozen.
    pub fn register<F, Args>(&mut self, name: impl Into<String>, function: F) -> &mut Self
    where
        F: Function<Args>,
    {
        let name = name.into();
        assert!(!name.is_empty(), "callgate: function name cannot be empty");
        assert!(
            !self.is_frozen(),
            "callgate: cannot register function {name:?} after the registry has been frozen"
        );
        assert!(
            !self.functions.contains_key(&name),
            "callgate: function {name:?} is already registered"
        );

        let descriptor = FunctionDescriptor {
            signature: function.signature(),
            invoker: function.into_invoker(),
            name: name.clone(),
        };

        tracing::debug!(
            function = %name,
            argument_type = descriptor.signature.argument_type.unwrap_or("-"),
            result_type = descriptor.signature.result_type.unwrap_or("-"),
            "Function registered"
        );

        self.functions.insert(name, descriptor);
        self
    }

    /// Registers the built-in `ping` function unless the name is taken.
    ///
    /// Unlike [`register`](Self::register) this also works on a frozen
    /// registry, so a server can always answer liveness probes.
    pub(crate) fn ensure_builtins(&mut self) {
        if self.functions.contains_key(PING_FUNCTION) {
            return;
        }

        let descriptor = FunctionDescriptor {
            name: PING_FUNCTION.to_string(),
            signature: Function::signature(&ping),
            invoker: Function::into_invoker(ping),
        };
        self.functions.insert(PING_FUNCTION.to_string(), descriptor);
    }

    /// Looks up a function by name.
    ///
    /// Freezes the registry.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<&FunctionDescriptor> {
        self.freeze();
        self.functions.get(name)
    }

    /// Returns the registered names in lexicographic order.
    ///
    /// Freezes the registry.
    #[must_use]
    pub fn list_names(&self) -> Vec<String> {
        self.freeze();
        self.functions.keys().cloned().collect()
    }

    /// Forbids any further registration.
    pub fn freeze(&self) {
        self.frozen.store(true, Ordering::Release);
    }

    /// Returns `true` once the registry is frozen.
    #[must_use]
    pub fn is_frozen(&self) -> bool {
        self.frozen.load(Ordering::Acquire)
    }

    /// Checks if a function is registered under `name`.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// Returns the number of registered functions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.functions.len()
    }

    /// Returns `true` if no functions are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

impl std::fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionRegistry")
            .field("functions", &self.functions.keys().collect::<Vec<_>>())
            .field("frozen", &self.is_frozen())
            .finish()
    }
}

/// Built-in liveness function.
async fn ping(_ctx: InvocationContext) -> Result<&'static str, Infallible> {
    Ok("pong")
}
