// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Callable values.

use std::ops::BitOr;
use std::sync::Arc;

use parking_lot::Mutex;

use super::Value;
use crate::error::{Error, Result};

/// Hints given to a function about how it is being invoked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct CallFlags(u8);

impl CallFlags {
    pub const NONE: CallFlags = CallFlags(0);
    /// The caller waits for the result.
    pub const CALL_SYNC: CallFlags = CallFlags(1);
    /// Errors are reported back to the caller.
    pub const PROPAGATES_ERROR: CallFlags = CallFlags(1 << 1);
    /// The call must never block the caller.
    pub const NEVER_CALL_SYNC: CallFlags = CallFlags(1 << 2);

    #[must_use]
    pub fn contains(self, other: CallFlags) -> bool {
        self.0 & other.0 == other.0
    }

    #[must_use]
    pub fn bits(self) -> u8 {
        self.0
    }
}

impl BitOr for CallFlags {
    type Output = CallFlags;

    fn bitor(self, rhs: Self) -> Self::Output {
        CallFlags(self.0 | rhs.0)
    }
}

/// Arguments of a single call.
#[derive(Debug, Clone, Copy)]
pub struct CallContext<'a> {
    parameters: &'a [Value],
    flags: CallFlags,
}

impl<'a> CallContext<'a> {
    #[must_use]
    pub fn new(parameters: &'a [Value]) -> Self {
        Self {
            parameters,
            flags: CallFlags::NONE,
        }
    }

    #[must_use]
    pub fn with_flags(mut self, flags: CallFlags) -> Self {
        self.flags = flags;
        self
    }

    #[must_use]
    pub fn parameters(&self) -> &'a [Value] {
        self.parameters
    }

    #[must_use]
    pub fn parameters_len(&self) -> usize {
        self.parameters.len()
    }

    /// Parameter at `index`, `Undefined` when not provided.
    #[must_use]
    pub fn parameter(&self, index: usize) -> Value {
        self.parameters.get(index).cloned().unwrap_or(Value::Undefined)
    }

    pub fn parameter_as_int(&self, index: usize) -> Result<i32> {
        self.parameter(index).checked_int()
    }

    pub fn parameter_as_double(&self, index: usize) -> Result<f64> {
        self.parameter(index).checked_double()
    }

    #[must_use]
    pub fn flags(&self) -> CallFlags {
        self.flags
    }
}

/// A function living on the engine side of the boundary.
pub trait ValueFunction: Send + Sync + 'static {
    fn call(&self, ctx: &CallContext<'_>) -> Result<Value>;

    /// Short description, used in diagnostics.
    fn function_type(&self) -> &str {
        "native"
    }
}

impl dyn ValueFunction {
    /// Call with positional parameters and no flags.
    pub fn invoke(&self, parameters: &[Value]) -> Result<Value> {
        self.call(&CallContext::new(parameters))
    }
}

/// [`ValueFunction`] backed by a closure.
pub struct FnValueFunction<F> {
    callable: F,
}

impl<F> FnValueFunction<F>
where
    F: Fn(&CallContext<'_>) -> Result<Value> + Send + Sync + 'static,
{
    pub fn new(callable: F) -> Self {
        Self { callable }
    }
}

impl<F> ValueFunction for FnValueFunction<F>
where
    F: Fn(&CallContext<'_>) -> Result<Value> + Send + Sync + 'static,
{
    fn call(&self, ctx: &CallContext<'_>) -> Result<Value> {
        (self.callable)(ctx)
    }

    fn function_type(&self) -> &str {
        "closure"
    }
}

/// Shared [`ValueFunction`] from a closure.
pub fn value_function<F>(callable: F) -> Arc<dyn ValueFunction>
where
    F: Fn(&CallContext<'_>) -> Result<Value> + Send + Sync + 'static,
{
    Arc::new(FnValueFunction::new(callable))
}

/// Function that can be called at most once.
///
/// The first call releases the wrapped function; later calls fail.
pub struct SingleCallFunction {
    function: Mutex<Option<Arc<dyn ValueFunction>>>,
}

impl SingleCallFunction {
    pub fn wrap(function: Arc<dyn ValueFunction>) -> Arc<dyn ValueFunction> {
        Arc::new(Self {
            function: Mutex::new(Some(function)),
        })
    }

    #[must_use]
    pub fn is_consumed(&self) -> bool {
        self.function.lock().is_none()
    }
}

impl ValueFunction for SingleCallFunction {
    fn call(&self, ctx: &CallContext<'_>) -> Result<Value> {
        // Taken before the call so a re-entrant call fails too
        let function = self
            .function
            .lock()
            .take()
            .ok_or_else(|| Error::message("Single-call function was already called"))?;
        function.call(ctx)
    }

    fn function_type(&self) -> &str {
        "single-call"
    }
}
