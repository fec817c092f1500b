// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

#![allow(clippy::uninlined_format_args)] // Test code readability over pedantic
#![allow(clippy::too_many_lines)] // Integration tests
#![allow(clippy::missing_panics_doc)] // Tests panic on failure

//! Function bridging integration tests
//!
//! Engine functions called from the host, host functions called from the
//! engine, queued calls and promise results.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use valbridge::value::{json, value_function};
use valbridge::{
    ConfigError, Error, MarshallingConfig, MarshallingContext, Promise, PromiseState, Result, SchemaIdentifier, Value,
};
use valbridge_testhost::{
    test_context, test_context_with_queue, TestDispatchQueue, TestFunction, TestObject, TestPlatformValueDelegate,
};

fn ok<T>(result: Result<T>) -> T {
    match result {
        Ok(value) => value,
        Err(err) => panic!("{}", err.full_message()),
    }
}

fn parse_json(text: &str) -> Value {
    ok(json::parse(text))
}

/// Marshall a single-function object and return the engine function.
fn marshalled_function(
    ctx: &MarshallingContext<Value>,
    id: SchemaIdentifier,
    class_name: &str,
    function: Arc<TestFunction>,
) -> Arc<dyn valbridge::ValueFunction> {
    let native = Value::object(TestObject::new(class_name, vec![Value::object(function)]));
    let marshalled = ok(ctx.marshall(id, &native));
    let typed = marshalled.as_typed_object().expect("typed object");
    Arc::clone(typed.property(0).as_function().expect("function"))
}

/// Unmarshall a single-function object and return the native function.
fn unmarshalled_function(
    ctx: &MarshallingContext<Value>,
    id: SchemaIdentifier,
    property: &str,
    function: Arc<dyn valbridge::ValueFunction>,
) -> Arc<TestFunction> {
    let input = Value::default().with_map_value(property, Value::Function(function));
    let output = ok(ctx.unmarshall(id, &input));
    let object = output.object_ref::<TestObject>().expect("TestObject");
    object.property(0).object_ref::<TestFunction>().expect("TestFunction")
}

#[test]
fn test_unmarshall_function() {
    let ctx = test_context();
    ok(ctx.register_schema_str("c 'User'{'firstName': s, 'lastName': s}"));
    let id = ok(ctx.register_schema_str("c 'UserUtils'{'formatName': f(r:'User'): s}"));

    let format_name = value_function(|call| {
        let user = call.parameter(0);
        let user = user
            .as_typed_object()
            .ok_or_else(|| Error::message(format!("Expected a User, got {}", user.type_name())))?;
        let first = user.property_named("firstName").unwrap_or_default();
        let last = user.property_named("lastName").unwrap_or_default();
        Ok(Value::from(format!("{} {}", first, last)))
    });
    let function = unmarshalled_function(&ctx, id, "formatName", format_name);

    let user = Value::object(TestObject::new(
        "User",
        vec![Value::from("Jean Jacque"), Value::from("Delacroix")],
    ));
    assert_eq!(ok(function.call(&[user])), Value::from("Jean Jacque Delacroix"));
}

#[test]
fn test_unmarshalled_function_reports_bad_parameter() {
    let ctx = test_context();
    ok(ctx.register_schema_str("c 'User'{'firstName': s, 'lastName': s}"));
    let id = ok(ctx.register_schema_str("c 'UserUtils'{'formatName': f(r:'User'): s}"));

    let function = unmarshalled_function(&ctx, id, "formatName", value_function(|_| Ok(Value::from(""))));

    let err = function.call(&[Value::from(12)]).unwrap_err();
    assert!(err
        .full_message()
        .starts_with("Failed to marshall parameter '0' of function"));
}

#[test]
fn test_marshall_function() {
    let ctx = test_context();
    ok(ctx.register_schema_str("c 'User'{'firstName': s, 'lastName': s}"));
    let id = ok(ctx.register_schema_str("c 'UserUtils'{'formatName': f(r:'User'): s}"));

    let format_name = TestFunction::new(|params| {
        let user = params
            .first()
            .and_then(|user| user.object_ref::<TestObject>())
            .ok_or_else(|| Error::message("Expected a User"))?;
        Ok(Value::from(format!("{} {}", user.property(0), user.property(1))))
    });
    let function = marshalled_function(&ctx, id, "UserUtils", format_name);

    let user = parse_json(r#"{"firstName": "Ada", "lastName": "Lovelace"}"#);
    assert_eq!(ok(function.invoke(&[user])), Value::from("Ada Lovelace"));

    let err = function.invoke(&[Value::from("not a user")]).unwrap_err();
    assert!(err
        .full_message()
        .starts_with("Failed to unmarshall parameter '0' of function"));
}

#[test]
fn test_worker_function_is_queued() {
    let queue = Arc::new(TestDispatchQueue::new());
    let ctx = test_context_with_queue(Arc::clone(&queue));
    let id = ok(ctx.register_schema_str("c 'Metrics'{'enqueue': f|w|(s)}"));

    let recorded = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&recorded);
    let enqueue = TestFunction::new(move |params| {
        sink.lock().extend(params.iter().map(ToString::to_string));
        Ok(Value::Undefined)
    });
    let function = marshalled_function(&ctx, id, "Metrics", enqueue);

    let result = ok(function.invoke(&[Value::from("startup")]));
    assert_eq!(result, Value::Undefined);
    assert_eq!(queue.tasks_count(), 1);
    assert!(recorded.lock().is_empty());

    assert_eq!(queue.flush_tasks(), 1);
    assert_eq!(*recorded.lock(), vec!["startup".to_string()]);
}

#[test]
fn test_plain_function_runs_inline_with_queue() {
    let queue = Arc::new(TestDispatchQueue::new());
    let ctx = test_context_with_queue(Arc::clone(&queue));
    let id = ok(ctx.register_schema_str("c 'Math'{'square': f(i): i}"));

    let square = TestFunction::new(|params| {
        let n = params.first().map_or(0, Value::to_int);
        Ok(Value::from(n * n))
    });
    let function = marshalled_function(&ctx, id, "Math", square);

    assert_eq!(ok(function.invoke(&[Value::from(7)])), Value::from(49));
    assert_eq!(queue.tasks_count(), 0);
}

#[test]
fn test_queued_promise_result() {
    let queue = Arc::new(TestDispatchQueue::new());
    let ctx = test_context_with_queue(Arc::clone(&queue));
    let id = ok(ctx.register_schema_str("c 'Doubler'{'double': f|w|(i): p<i>}"));

    let double = TestFunction::new(|params| {
        let n = params.first().map_or(0, Value::to_int);
        Ok(Value::object(Promise::resolved(Value::from(n * 2))))
    });
    let function = marshalled_function(&ctx, id, "Doubler", double);

    let returned = ok(function.invoke(&[Value::from(21)]));
    let promise = returned.object_ref::<Promise>().expect("promise");
    assert_eq!(promise.state(), PromiseState::Pending);
    assert_eq!(queue.tasks_count(), 1);

    queue.flush_tasks();

    assert_eq!(promise.state(), PromiseState::Fulfilled);
    assert_eq!(ok(promise.result().expect("complete")), Value::from(42));
}

#[test]
fn test_queued_promise_rejection() {
    let queue = Arc::new(TestDispatchQueue::new());
    let ctx = test_context_with_queue(Arc::clone(&queue));
    let id = ok(ctx.register_schema_str("c 'Doubler'{'double': f(i): p<i>}"));

    let failing = TestFunction::new(|_| Err(Error::host_call("doubler is offline")));
    let function = marshalled_function(&ctx, id, "Doubler", failing);

    let returned = ok(function.invoke(&[Value::from(1)]));
    let promise = returned.object_ref::<Promise>().expect("promise");
    queue.flush_tasks();

    assert_eq!(promise.state(), PromiseState::Rejected);
    let err = promise.result().expect("complete").unwrap_err();
    assert_eq!(err.to_string(), "doubler is offline");
}

#[test]
fn test_cancelled_queued_promise_skips_call() {
    let queue = Arc::new(TestDispatchQueue::new());
    let ctx = test_context_with_queue(Arc::clone(&queue));
    let id = ok(ctx.register_schema_str("c 'Doubler'{'double': f(i): p<i>}"));

    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let double = TestFunction::new(move |params| {
        counter.fetch_add(1, Ordering::SeqCst);
        let n = params.first().map_or(0, Value::to_int);
        Ok(Value::object(Promise::resolved(Value::from(n * 2))))
    });
    let function = marshalled_function(&ctx, id, "Doubler", double);

    let returned = ok(function.invoke(&[Value::from(4)]));
    let promise = returned.object_ref::<Promise>().expect("promise");
    promise.cancel();

    assert_eq!(queue.flush_tasks(), 1);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert!(promise.is_cancelled());
}

#[test]
fn test_engine_promise_bridged_to_host() {
    let ctx = test_context();
    let id = ok(ctx.register_schema_str("c 'Loader'{'load': f(s): p<s>}"));

    let pending = Promise::new();
    let engine_side = Arc::clone(&pending);
    let load = value_function(move |_| Ok(Value::object(Arc::clone(&engine_side))));
    let function = unmarshalled_function(&ctx, id, "load", load);

    // 1. Completion flows to the native promise
    let native = ok(function.call(&[Value::from("config.toml")]));
    let native = native.object_ref::<Promise>().expect("native promise");
    assert!(!native.is_complete());

    pending.fulfill(Ok(Value::from("contents")));
    assert_eq!(ok(native.result().expect("complete")), Value::from("contents"));

    // 2. Cancelling the native promise cancels the engine one
    let second = Promise::new();
    let engine_side = Arc::clone(&second);
    let load = value_function(move |_| Ok(Value::object(Arc::clone(&engine_side))));
    let function = unmarshalled_function(&ctx, id, "load", load);

    let native = ok(function.call(&[Value::from("config.toml")]));
    native.object_ref::<Promise>().expect("native promise").cancel();
    assert!(second.is_cancelled());
}

#[test]
fn test_context_from_config_uses_worker_queue() {
    let config = MarshallingConfig::default().with_worker_queue("valbridge-test-worker", 0);
    let ctx = ok(MarshallingContext::from_config(
        &config,
        Arc::new(TestPlatformValueDelegate::new()),
    ));
    assert!(ctx.call_queue().is_some());

    let id = ok(ctx.register_schema_str("c 'Doubler'{'double': f(i): p<i>}"));
    let double = TestFunction::new(|params| {
        let n = params.first().map_or(0, Value::to_int);
        Ok(Value::object(Promise::resolved(Value::from(n * 2))))
    });
    let function = marshalled_function(&ctx, id, "Doubler", double);

    let returned = ok(function.invoke(&[Value::from(50)]));
    let promise = returned.object_ref::<Promise>().expect("promise");

    let (tx, rx) = mpsc::channel();
    promise.on_complete(move |result| {
        let _ = tx.send(result.clone());
    });
    let result = rx
        .recv_timeout(Duration::from_secs(5))
        .expect("worker completes the call");
    assert_eq!(ok(result), Value::from(100));
}

#[test]
fn test_single_call_engine_function() {
    let ctx = test_context();
    let id = ok(ctx.register_schema_str("c 'Loader'{'onDone': f!(s)}"));

    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let on_done = value_function(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(Value::Undefined)
    });
    let function = unmarshalled_function(&ctx, id, "onDone", Arc::clone(&on_done));

    ok(function.call(&[Value::from("ready")]));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    // The engine function is released by its first call
    assert_eq!(Arc::strong_count(&on_done), 1);

    let err = function.call(&[Value::from("again")]).unwrap_err();
    assert!(err.full_message().contains("Single-call function was already called"));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_single_call_host_function() {
    let ctx = test_context();
    let id = ok(ctx.register_schema_str("c 'Callbacks'{'resolve': f|s|(i): i}"));

    let resolve = TestFunction::new(|params| Ok(params.first().cloned().unwrap_or_default()));
    let function = marshalled_function(&ctx, id, "Callbacks", resolve);

    assert_eq!(ok(function.invoke(&[Value::from(5)])), Value::from(5));
    assert!(function.invoke(&[Value::from(6)]).is_err());
}

#[test]
fn test_context_rejects_invalid_config() {
    let config = MarshallingConfig {
        platform_name: " ".to_string(),
        ..MarshallingConfig::default()
    };
    let Err(err) = MarshallingContext::from_config(&config, Arc::new(TestPlatformValueDelegate::new())) else {
        panic!("blank platform name accepted");
    };

    assert!(matches!(&err, Error::Config(cause) if matches!(cause.as_ref(), ConfigError::Invalid(_))));
    assert_eq!(
        err.full_message(),
        "Invalid marshalling configuration\n[caused by]: Invalid configuration: platform_name must not be empty"
    );
}

#[test]
fn test_context_from_toml() {
    let config = MarshallingConfig::from_toml_str(
        r#"
        platform_name = "android"

        [dispatch]
        worker_queue = false
        "#,
    )
    .expect("valid config");

    let ctx = ok(MarshallingContext::from_config(
        &config,
        Arc::new(TestPlatformValueDelegate::new()),
    ));
    assert_eq!(ctx.platform_name(), "android");
    assert!(ctx.call_queue().is_none());
}
