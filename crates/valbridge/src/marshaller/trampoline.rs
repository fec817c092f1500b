// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Argument and return value conversion for bridged functions.
//!
//! A host function class receives a [`FunctionTrampoline`] when it is
//! created. Calls from the host into an engine function go through
//! [`FunctionTrampoline::forward_call`]; calls from the engine into a host
//! function use [`FunctionTrampoline::unmarshall_parameters`] and
//! [`FunctionTrampoline::marshall_return_value`] around the native call.

use std::sync::{Arc, Weak};

use super::{MarshallerCore, MarshallerId};
use crate::delegate::PlatformValue;
use crate::dispatch::DispatchQueue;
use crate::error::{Error, Result, ResultExt};
use crate::value::{CallContext, CallFlags, Value, ValueFunction};

pub struct FunctionTrampoline<P: PlatformValue> {
    core: Weak<MarshallerCore<P>>,
    return_marshaller: MarshallerId,
    parameters: Vec<MarshallerId>,
    call_flags: CallFlags,
    is_promise_return: bool,
    call_queue: Option<Arc<dyn DispatchQueue>>,
}

impl<P: PlatformValue> FunctionTrampoline<P> {
    pub(crate) fn new(
        core: Weak<MarshallerCore<P>>,
        return_marshaller: MarshallerId,
        parameters: Vec<MarshallerId>,
        is_promise_return: bool,
        returns_value: bool,
        call_queue: Option<Arc<dyn DispatchQueue>>,
    ) -> Self {
        let call_flags = if is_promise_return {
            CallFlags::NEVER_CALL_SYNC
        } else if returns_value {
            CallFlags::CALL_SYNC | CallFlags::PROPAGATES_ERROR
        } else {
            CallFlags::NONE
        };
        Self {
            core,
            return_marshaller,
            parameters,
            call_flags,
            is_promise_return,
            call_queue,
        }
    }

    fn core(&self) -> Result<Arc<MarshallerCore<P>>> {
        self.core
            .upgrade()
            .ok_or_else(|| Error::message("Marshaller registry was released"))
    }

    /// Call an engine function with native parameters.
    ///
    /// Extra parameters are ignored; the return value is unmarshalled.
    pub fn forward_call(&self, function: &dyn ValueFunction, parameters: &[P]) -> Result<P> {
        let core = self.core()?;
        let mut converted = Vec::with_capacity(self.parameters.len().min(parameters.len()));
        for (i, (marshaller, parameter)) in self.parameters.iter().zip(parameters).enumerate() {
            let value = core
                .marshall(*marshaller, None, parameter)
                .with_context(|| format!("Failed to marshall parameter '{}' of function", i))?;
            converted.push(value);
        }

        let ctx = CallContext::new(&converted).with_flags(self.call_flags);
        let result = function.call(&ctx)?;

        core.unmarshall(self.return_marshaller, &result)
            .context("Failed to unmarshall return value of function")
    }

    /// Convert engine parameters for a native call.
    ///
    /// The output has one entry per declared parameter; missing inputs are
    /// converted from `undefined`.
    pub fn unmarshall_parameters(&self, parameters: &[Value]) -> Result<Vec<P>> {
        let core = self.core()?;
        let mut output = Vec::with_capacity(self.parameters.len());
        for (i, marshaller) in self.parameters.iter().enumerate() {
            let input = parameters.get(i).cloned().unwrap_or(Value::Undefined);
            let value = core
                .unmarshall(*marshaller, &input)
                .with_context(|| format!("Failed to unmarshall parameter '{}' of function", i))?;
            output.push(value);
        }
        Ok(output)
    }

    pub fn marshall_return_value(&self, value: &P) -> Result<Value> {
        self.core()?
            .marshall(self.return_marshaller, None, value)
            .context("Failed to marshall return value of function")
    }

    #[must_use]
    pub fn parameters_len(&self) -> usize {
        self.parameters.len()
    }

    #[must_use]
    pub fn call_flags(&self) -> CallFlags {
        self.call_flags
    }

    /// Queue native calls are dispatched on, if any.
    #[must_use]
    pub fn call_queue(&self) -> Option<&Arc<dyn DispatchQueue>> {
        self.call_queue.as_ref()
    }

    #[must_use]
    pub fn is_promise_return_type(&self) -> bool {
        self.is_promise_return
    }
}
