// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Native objects of the test host.
//!
//! Every test object exports a plain [`Value`] through
//! [`OpaqueObject::to_value`], so converted graphs can be compared after
//! flattening them through JSON.

use std::any::Any;
use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;
use valbridge::{
    Error, FunctionTrampoline, OpaqueObject, ProxyAttachments, ProxyObject, Result, TypedObject, Value,
    ValueFunction,
};

macro_rules! impl_any {
    () => {
        fn as_any(&self) -> &dyn Any {
            self
        }

        fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
            self
        }
    };
}

/// Instance of a class schema.
pub struct TestObject {
    class_name: Arc<str>,
    properties: Mutex<Vec<Value>>,
    prototype: Mutex<Option<Arc<TestObject>>>,
    attachments: Mutex<Option<Arc<ProxyAttachments>>>,
}

impl TestObject {
    pub fn new(class_name: &str, properties: Vec<Value>) -> Arc<Self> {
        Arc::new(Self {
            class_name: Arc::from(class_name),
            properties: Mutex::new(properties),
            prototype: Mutex::new(None),
            attachments: Mutex::new(None),
        })
    }

    pub fn properties_len(&self) -> usize {
        self.properties.lock().len()
    }

    /// Property at `index`, `undefined` past the end.
    pub fn property(&self, index: usize) -> Value {
        self.properties.lock().get(index).cloned().unwrap_or(Value::Undefined)
    }

    pub fn set_property(&self, index: usize, value: Value) {
        let mut properties = self.properties.lock();
        if index >= properties.len() {
            properties.resize(index + 1, Value::Undefined);
        }
        properties[index] = value;
    }

    /// Object holding the methods of an interface implementation.
    pub fn prototype(&self) -> Option<Arc<TestObject>> {
        self.prototype.lock().clone()
    }

    pub fn set_prototype(&self, prototype: Arc<TestObject>) {
        *self.prototype.lock() = Some(prototype);
    }

    pub fn attachments(&self) -> Option<Arc<ProxyAttachments>> {
        self.attachments.lock().clone()
    }

    pub fn set_attachments(&self, attachments: Arc<ProxyAttachments>) {
        *self.attachments.lock() = Some(attachments);
    }
}

impl OpaqueObject for TestObject {
    fn class_name(&self) -> &str {
        &self.class_name
    }

    fn to_value(&self) -> Option<Value> {
        Some(
            Value::default()
                .with_map_value("className", Value::from(Arc::clone(&self.class_name)))
                .with_map_value("properties", Value::array(self.properties.lock().clone())),
        )
    }

    impl_any!();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumberType {
    Boolean,
    Integer,
    LongInteger,
    Double,
}

impl NumberType {
    pub fn class_name(self) -> &'static str {
        match self {
            NumberType::Boolean => "Boolean",
            NumberType::Integer => "Integer",
            NumberType::LongInteger => "Long",
            NumberType::Double => "Double",
        }
    }
}

/// Boxed number.
pub struct TestNumberObject {
    number_type: NumberType,
    value: Value,
}

impl TestNumberObject {
    pub fn new(number_type: NumberType, value: Value) -> Arc<Self> {
        Arc::new(Self { number_type, value })
    }

    pub fn number_type(&self) -> NumberType {
        self.number_type
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Inner value of a boxed number of the expected type.
    pub fn unwrap(value: &Value, expected: NumberType) -> Result<Value> {
        let number = value.object_ref::<TestNumberObject>().ok_or_else(|| {
            Error::message(format!("Expected {} object, got {}", expected.class_name(), value.type_name()))
        })?;
        if number.number_type != expected {
            return Err(Error::message(format!(
                "Expected {} object, got {}",
                expected.class_name(),
                number.number_type.class_name()
            )));
        }
        Ok(number.value.clone())
    }
}

impl OpaqueObject for TestNumberObject {
    fn class_name(&self) -> &str {
        self.number_type.class_name()
    }

    fn to_value(&self) -> Option<Value> {
        Some(
            Value::default()
                .with_map_value("className", Value::from(self.class_name()))
                .with_map_value("value", self.value.clone()),
        )
    }

    impl_any!();
}

/// Sorted map, used both for plain maps and ES6 maps.
pub struct TestMap {
    class_name: &'static str,
    entries: Mutex<BTreeMap<Value, Value>>,
}

impl TestMap {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            class_name: "TestMap",
            entries: Mutex::new(BTreeMap::new()),
        })
    }

    pub fn es6() -> Arc<Self> {
        Arc::new(Self {
            class_name: "Test6ESMap",
            entries: Mutex::new(BTreeMap::new()),
        })
    }

    pub fn is_es6(&self) -> bool {
        self.class_name == "Test6ESMap"
    }

    pub fn insert(&self, key: Value, value: Value) {
        self.entries.lock().insert(key, value);
    }

    pub fn get(&self, key: &Value) -> Option<Value> {
        self.entries.lock().get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Entries in key order.
    pub fn entries(&self) -> Vec<(Value, Value)> {
        self.entries
            .lock()
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }
}

impl OpaqueObject for TestMap {
    fn class_name(&self) -> &str {
        self.class_name
    }

    fn to_value(&self) -> Option<Value> {
        let (keys, values): (Vec<Value>, Vec<Value>) = self.entries().into_iter().unzip();
        Some(
            Value::default()
                .with_map_value("keys", Value::array(keys))
                .with_map_value("values", Value::array(values)),
        )
    }

    impl_any!();
}

/// Insertion-ordered set.
#[derive(Default)]
pub struct TestES6Set {
    entries: Mutex<Vec<Value>>,
}

impl TestES6Set {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn insert(&self, value: Value) {
        let mut entries = self.entries.lock();
        if !entries.contains(&value) {
            entries.push(value);
        }
    }

    pub fn entries(&self) -> Vec<Value> {
        self.entries.lock().clone()
    }
}

impl OpaqueObject for TestES6Set {
    fn class_name(&self) -> &str {
        "TestES6Set"
    }

    fn to_value(&self) -> Option<Value> {
        Some(Value::array(self.entries()))
    }

    impl_any!();
}

/// Enum case.
pub struct TestEnum {
    enum_name: Arc<str>,
    case_index: usize,
    boxed: bool,
}

impl TestEnum {
    pub fn new(enum_name: &str, case_index: usize, boxed: bool) -> Arc<Self> {
        Arc::new(Self {
            enum_name: Arc::from(enum_name),
            case_index,
            boxed,
        })
    }

    pub fn case_index(&self) -> usize {
        self.case_index
    }

    pub fn is_boxed(&self) -> bool {
        self.boxed
    }
}

impl OpaqueObject for TestEnum {
    fn class_name(&self) -> &str {
        &self.enum_name
    }

    fn to_value(&self) -> Option<Value> {
        Some(
            Value::default()
                .with_map_value("enumName", Value::from(Arc::clone(&self.enum_name)))
                .with_map_value("enumCase", Value::from(self.case_index as i32))
                .with_map_value("boxed", Value::from(self.boxed)),
        )
    }

    impl_any!();
}

/// Proxy wrapping a native object, or standing for a foreign one when
/// `object` is null.
pub struct TestObjectProxy {
    object: Value,
    typed_object: Arc<TypedObject>,
    id: u32,
}

impl TestObjectProxy {
    pub fn new(object: Value, typed_object: Arc<TypedObject>, id: u32) -> Arc<Self> {
        Arc::new(Self {
            object,
            typed_object,
            id,
        })
    }

    pub fn object(&self) -> &Value {
        &self.object
    }
}

impl ProxyObject for TestObjectProxy {
    fn typed_object(&self) -> &Arc<TypedObject> {
        &self.typed_object
    }

    fn id(&self) -> u32 {
        self.id
    }

    fn proxy_type(&self) -> &str {
        "Test Proxy"
    }

    impl_any!();
}

/// Native callable taking positional parameters.
pub type TestCallable = dyn Fn(&[Value]) -> Result<Value> + Send + Sync;

enum TestFunctionKind {
    Callable(Box<TestCallable>),
    /// Forwards to an engine function through a trampoline.
    Bridged {
        trampoline: Arc<FunctionTrampoline<Value>>,
        function: Arc<dyn ValueFunction>,
    },
}

/// Native function.
pub struct TestFunction {
    kind: TestFunctionKind,
}

impl TestFunction {
    pub fn new<F>(callable: F) -> Arc<Self>
    where
        F: Fn(&[Value]) -> Result<Value> + Send + Sync + 'static,
    {
        Arc::new(Self {
            kind: TestFunctionKind::Callable(Box::new(callable)),
        })
    }

    pub(crate) fn bridged(trampoline: Arc<FunctionTrampoline<Value>>, function: Arc<dyn ValueFunction>) -> Arc<Self> {
        Arc::new(Self {
            kind: TestFunctionKind::Bridged { trampoline, function },
        })
    }

    pub fn call(&self, parameters: &[Value]) -> Result<Value> {
        match &self.kind {
            TestFunctionKind::Callable(callable) => callable(parameters),
            TestFunctionKind::Bridged { trampoline, function } => {
                trampoline.forward_call(function.as_ref(), parameters)
            }
        }
    }
}

impl OpaqueObject for TestFunction {
    fn class_name(&self) -> &str {
        "TestFunction"
    }

    impl_any!();
}
