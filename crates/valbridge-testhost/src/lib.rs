// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Reference host binding for valbridge.
//!
//! The host's native value type is [`Value`] itself. Class-shaped values
//! map onto small opaque objects ([`TestObject`], [`TestEnum`],
//! [`TestFunction`], ...) that export a plain structural view, so converted
//! graphs can be compared with [`flatten_value`].
//!
//! ```
//! use valbridge::Value;
//! use valbridge_testhost::{test_context, TestObject};
//!
//! let ctx = test_context();
//! let id = ctx.register_schema_str("c 'Point'{'x': d, 'y': d}").unwrap();
//!
//! let input = Value::default()
//!     .with_map_value("x", Value::from(1.0))
//!     .with_map_value("y", Value::from(2.0));
//! let point = ctx.unmarshall(id, &input).unwrap();
//! assert_eq!(point.object_ref::<TestObject>().unwrap().property(1), Value::from(2.0));
//! ```

mod classes;
mod delegate;
mod objects;
mod queue;

use std::sync::Arc;

use valbridge::value::json;
use valbridge::{DispatchQueue, MarshallingContext, SchemaRegistry, Value};

pub use classes::{TestEnumClass, TestFunctionClass, TestObjectClass};
pub use delegate::{TestObjectStore, TestPlatformValueDelegate};
pub use objects::{
    NumberType, TestCallable, TestES6Set, TestEnum, TestFunction, TestMap, TestNumberObject, TestObject,
    TestObjectProxy,
};
pub use queue::TestDispatchQueue;

/// Context over a fresh schema registry, without call queue.
pub fn test_context() -> MarshallingContext<Value> {
    MarshallingContext::new(Arc::new(TestPlatformValueDelegate::new()), None)
}

/// Context dispatching promise-returning and worker functions on `queue`.
pub fn test_context_with_queue(queue: Arc<TestDispatchQueue>) -> MarshallingContext<Value> {
    let queue: Arc<dyn DispatchQueue> = queue;
    MarshallingContext::new(Arc::new(TestPlatformValueDelegate::new()), Some(queue))
}

/// Context compiling against an existing schema registry.
pub fn test_context_with_registry(schemas: Arc<SchemaRegistry>) -> MarshallingContext<Value> {
    MarshallingContext::with_schema_registry(schemas, Arc::new(TestPlatformValueDelegate::new()), None)
}

/// Turn a converted graph into plain data by round-tripping it through JSON.
pub fn flatten_value(value: &Value) -> Value {
    json::flatten(value)
}
