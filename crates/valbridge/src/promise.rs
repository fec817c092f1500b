// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Resolvable promise shared across the boundary.
//!
//! A promise completes exactly once. Completion callbacks registered before
//! completion run when it happens; callbacks registered afterwards run
//! immediately. Callbacks always run outside the internal lock.
//!
//! # Cancellation
//!
//! [`Promise::cancel`] is idempotent: cancelling a completed promise is a
//! no-op, and the cancel callback runs at most once. Pending completion
//! callbacks observe [`Error::Cancelled`].

use std::any::Any;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{Error, Result};
use crate::value::{OpaqueObject, Value};

/// Callback invoked with the promise outcome.
pub type CompletionCallback = Box<dyn FnOnce(&Result<Value>) + Send>;

/// Callback invoked when the promise is cancelled.
pub type CancelCallback = Box<dyn FnOnce() + Send>;

/// Observable state of a [`Promise`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromiseState {
    Pending,
    Fulfilled,
    Rejected,
    Cancelled,
}

struct PromiseInner {
    state: PromiseState,
    result: Option<Result<Value>>,
    callbacks: Vec<CompletionCallback>,
    cancel_callback: Option<CancelCallback>,
}

/// Single-assignment asynchronous result.
pub struct Promise {
    inner: Mutex<PromiseInner>,
}

impl Promise {
    /// A pending promise.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(PromiseInner {
                state: PromiseState::Pending,
                result: None,
                callbacks: Vec::new(),
                cancel_callback: None,
            }),
        })
    }

    /// A promise already fulfilled with `value`.
    #[must_use]
    pub fn resolved(value: Value) -> Arc<Self> {
        let promise = Self::new();
        promise.fulfill(Ok(value));
        promise
    }

    /// A promise already rejected with `error`.
    #[must_use]
    pub fn rejected(error: Error) -> Arc<Self> {
        let promise = Self::new();
        promise.fulfill(Err(error));
        promise
    }

    #[must_use]
    pub fn state(&self) -> PromiseState {
        self.inner.lock().state
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.state() != PromiseState::Pending
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.state() == PromiseState::Cancelled
    }

    /// Outcome, once complete.
    #[must_use]
    pub fn result(&self) -> Option<Result<Value>> {
        self.inner.lock().result.clone()
    }

    /// Complete the promise. Ignored when already complete.
    pub fn fulfill(&self, result: Result<Value>) {
        let callbacks = {
            let mut inner = self.inner.lock();
            if inner.state != PromiseState::Pending {
                return;
            }
            inner.state = if result.is_ok() {
                PromiseState::Fulfilled
            } else {
                PromiseState::Rejected
            };
            inner.result = Some(result.clone());
            inner.cancel_callback = None;
            std::mem::take(&mut inner.callbacks)
        };

        for callback in callbacks {
            callback(&result);
        }
    }

    /// Observe completion.
    pub fn on_complete<F>(&self, callback: F)
    where
        F: FnOnce(&Result<Value>) + Send + 'static,
    {
        let ready = {
            let mut inner = self.inner.lock();
            match &inner.result {
                Some(result) => result.clone(),
                None => {
                    inner.callbacks.push(Box::new(callback));
                    return;
                }
            }
        };
        callback(&ready);
    }

    /// Install the hook run by [`Promise::cancel`].
    ///
    /// Ignored when the promise already completed.
    pub fn set_cancel_callback<F>(&self, callback: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let mut inner = self.inner.lock();
        if inner.state == PromiseState::Pending {
            inner.cancel_callback = Some(Box::new(callback));
        }
    }

    /// Cancel a pending promise.
    pub fn cancel(&self) {
        let (cancel_callback, callbacks) = {
            let mut inner = self.inner.lock();
            if inner.state != PromiseState::Pending {
                return;
            }
            inner.state = PromiseState::Cancelled;
            inner.result = Some(Err(Error::Cancelled));
            (
                inner.cancel_callback.take(),
                std::mem::take(&mut inner.callbacks),
            )
        };

        log::debug!("[promise] cancelled");

        if let Some(cancel) = cancel_callback {
            cancel();
        }
        let outcome: Result<Value> = Err(Error::Cancelled);
        for callback in callbacks {
            callback(&outcome);
        }
    }

    /// Forward this promise's outcome into `target`, and `target`'s
    /// cancellation back into this promise.
    pub fn chain_into(self: &Arc<Self>, target: &Arc<Promise>) {
        let weak_source = Arc::downgrade(self);
        target.set_cancel_callback(move || {
            if let Some(source) = weak_source.upgrade() {
                source.cancel();
            }
        });

        let target = Arc::clone(target);
        self.on_complete(move |result| match result {
            Err(err) if err.is_cancelled() => target.cancel(),
            other => target.fulfill(other.clone()),
        });
    }
}

impl OpaqueObject for Promise {
    fn class_name(&self) -> &str {
        "Promise"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}
