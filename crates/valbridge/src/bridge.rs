// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Dispatch of calls into host functions.
//!
//! Host function classes route every engine-to-host call through
//! [`handle_bridge_call`], which applies the queueing rules of the
//! function's trampoline:
//!
//! | queue | returns promise | behaviour |
//! |-------|-----------------|-----------|
//! | none  | any             | call inline, return its result |
//! | some  | no              | enqueue, return `undefined` |
//! | some  | yes             | enqueue, return a promise settled by the call |

use std::sync::Arc;

use crate::dispatch::DispatchQueue;
use crate::error::Result;
use crate::promise::Promise;
use crate::value::{CallContext, Value};

/// Run `call` for `ctx` according to the queueing rules above.
///
/// A promise returned for a queued call can be cancelled: before the task
/// starts, the call is skipped; afterwards, cancellation is forwarded to the
/// promise the call returned, and that promise's cancellation is forwarded
/// back.
pub fn handle_bridge_call<F>(
    queue: Option<&Arc<dyn DispatchQueue>>,
    is_promise_return: bool,
    ctx: &CallContext<'_>,
    call: F,
) -> Result<Value>
where
    F: FnOnce(&CallContext<'_>) -> Result<Value> + Send + 'static,
{
    let Some(queue) = queue else {
        return call(ctx);
    };

    let parameters = ctx.parameters().to_vec();
    let flags = ctx.flags();

    if !is_promise_return {
        queue.dispatch_async(Box::new(move || {
            let ctx = CallContext::new(&parameters).with_flags(flags);
            if let Err(err) = call(&ctx) {
                log::warn!("[bridge] queued call failed: {}", err.full_message());
            }
        }));
        return Ok(Value::Undefined);
    }

    let promise = Promise::new();
    let pending = Arc::clone(&promise);
    queue.dispatch_async(Box::new(move || {
        if pending.is_cancelled() {
            log::debug!("[bridge] skipping call, promise was cancelled");
            return;
        }
        let ctx = CallContext::new(&parameters).with_flags(flags);
        match call(&ctx) {
            Ok(value) => match value.object_ref::<Promise>() {
                Some(result) => result.chain_into(&pending),
                None => pending.fulfill(Ok(value)),
            },
            Err(err) => pending.fulfill(Err(err)),
        }
    }));
    Ok(Value::object(promise))
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use parking_lot::Mutex;

    use super::*;
    use crate::dispatch::DispatchTask;
    use crate::error::Error;
    use crate::promise::PromiseState;

    #[derive(Default)]
    struct ManualQueue {
        tasks: Mutex<VecDeque<DispatchTask>>,
    }

    impl ManualQueue {
        fn flush(&self) -> usize {
            let mut ran = 0;
            loop {
                let task = self.tasks.lock().pop_front();
                match task {
                    Some(task) => {
                        task();
                        ran += 1;
                    }
                    None => return ran,
                }
            }
        }
    }

    impl DispatchQueue for ManualQueue {
        fn dispatch_async(&self, task: DispatchTask) {
            self.tasks.lock().push_back(task);
        }

        fn dispatch_sync(&self, task: DispatchTask) {
            task();
        }
    }

    fn queue() -> (Arc<ManualQueue>, Arc<dyn DispatchQueue>) {
        let manual = Arc::new(ManualQueue::default());
        let dyn_queue: Arc<dyn DispatchQueue> = manual.clone();
        (manual, dyn_queue)
    }

    fn returned_promise(value: &Value) -> Arc<Promise> {
        value.object_ref::<Promise>().expect("promise")
    }

    #[test]
    fn test_without_queue_calls_inline() {
        let params = [Value::from(20)];
        let ctx = CallContext::new(&params);
        let result = handle_bridge_call(None, false, &ctx, |ctx| {
            Ok(Value::from(ctx.parameter_as_int(0)? + 1))
        })
        .expect("call");
        assert_eq!(result, Value::from(21));
    }

    #[test]
    fn test_queued_call_returns_undefined() {
        let (manual, queue) = queue();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let params = [Value::from("a")];
        let ctx = CallContext::new(&params);

        let sink = Arc::clone(&seen);
        let result = handle_bridge_call(Some(&queue), false, &ctx, move |ctx| {
            sink.lock().push(ctx.parameter(0));
            Ok(Value::Undefined)
        })
        .expect("call");

        assert_eq!(result, Value::Undefined);
        assert!(seen.lock().is_empty());
        assert_eq!(manual.flush(), 1);
        assert_eq!(*seen.lock(), vec![Value::from("a")]);
    }

    #[test]
    fn test_queued_promise_settles_after_flush() {
        let (manual, queue) = queue();
        let params = [Value::from(21)];
        let ctx = CallContext::new(&params);

        let result = handle_bridge_call(Some(&queue), true, &ctx, |ctx| {
            Ok(Value::from(ctx.parameter_as_int(0)? * 2))
        })
        .expect("call");
        let promise = returned_promise(&result);
        assert_eq!(promise.state(), PromiseState::Pending);

        manual.flush();
        assert_eq!(promise.result().expect("complete").expect("ok"), Value::from(42));
    }

    #[test]
    fn test_queued_promise_rejects_with_call_error() {
        let (manual, queue) = queue();
        let ctx = CallContext::new(&[]);

        let result = handle_bridge_call(Some(&queue), true, &ctx, |_| Err(Error::message("boom")))
            .expect("call");
        manual.flush();

        let err = returned_promise(&result).result().expect("complete").unwrap_err();
        assert_eq!(err.to_string(), "boom");
    }

    #[test]
    fn test_cancelled_before_start_skips_call() {
        let (manual, queue) = queue();
        let called = Arc::new(Mutex::new(false));
        let ctx = CallContext::new(&[]);

        let flag = Arc::clone(&called);
        let result = handle_bridge_call(Some(&queue), true, &ctx, move |_| {
            *flag.lock() = true;
            Ok(Value::Undefined)
        })
        .expect("call");

        returned_promise(&result).cancel();
        manual.flush();
        assert!(!*called.lock());
    }

    #[test]
    fn test_cancellation_reaches_inner_promise() {
        let (manual, queue) = queue();
        let inner = Promise::new();
        let ctx = CallContext::new(&[]);

        let returned = Arc::clone(&inner);
        let result = handle_bridge_call(Some(&queue), true, &ctx, move |_| Ok(Value::object(returned)))
            .expect("call");
        manual.flush();

        returned_promise(&result).cancel();
        assert!(inner.is_cancelled());
    }

    #[test]
    fn test_inner_cancellation_reaches_returned_promise() {
        let (manual, queue) = queue();
        let inner = Promise::new();
        let ctx = CallContext::new(&[]);

        let returned = Arc::clone(&inner);
        let result = handle_bridge_call(Some(&queue), true, &ctx, move |_| Ok(Value::object(returned)))
            .expect("call");
        manual.flush();

        inner.cancel();
        assert!(returned_promise(&result).is_cancelled());
    }
}
