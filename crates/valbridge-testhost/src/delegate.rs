// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Platform delegate of the test host.
//!
//! The host's native values are engine [`Value`]s: primitives stay as they
//! are, class-shaped values become the opaque test objects of
//! [`crate::objects`].

use std::sync::Arc;

use parking_lot::ReentrantMutex;
use valbridge::{
    ArrayBuilder, ClassSchema, CollectionKind, EntryVisitor, EnumClassDelegate, EnumSchema, Error, FunctionClassDelegate,
    FunctionSchema, FunctionTrampoline, MapKey, ObjectClassDelegate, PlatformArrayIterator, PlatformObjectStore,
    PlatformValueDelegate, Promise, ProxyAttachments, Result, TypedArray, TypedArrayKind, Value, ValueMarshaller,
    WeakObjectTable,
};

use crate::classes::{test_object, TestEnumClass, TestFunctionClass, TestObjectClass};
use crate::objects::{NumberType, TestES6Set, TestMap, TestNumberObject, TestObject};

/// Identity storage: attachments live on the [`TestObject`] itself, ids are
/// mapped weakly.
#[derive(Default)]
pub struct TestObjectStore {
    mutex: ReentrantMutex<()>,
    objects: WeakObjectTable<TestObject>,
}

impl TestObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of ids recorded, live or not.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl PlatformObjectStore<Value> for TestObjectStore {
    fn mutex(&self) -> &ReentrantMutex<()> {
        &self.mutex
    }

    fn value_for_object_key(&self, object: &Value) -> Result<Option<Arc<ProxyAttachments>>> {
        Ok(test_object(object)?.attachments())
    }

    fn set_value_for_object_key(&self, object: &Value, value: Arc<ProxyAttachments>) -> Result<()> {
        test_object(object)?.set_attachments(value);
        Ok(())
    }

    fn object_for_id(&self, id: u32) -> Result<Option<Value>> {
        Ok(self.objects.get(id).map(Value::object))
    }

    fn set_object_for_id(&self, id: u32, object: &Value) -> Result<()> {
        self.objects.insert(id, &test_object(object)?);
        Ok(())
    }
}

struct TestArrayBuilder {
    items: Vec<Value>,
}

impl ArrayBuilder<Value> for TestArrayBuilder {
    fn set(&mut self, index: usize, value: Value) -> Result<()> {
        if index >= self.items.len() {
            self.items.resize(index + 1, Value::Undefined);
        }
        self.items[index] = value;
        Ok(())
    }

    fn finish(self: Box<Self>) -> Result<Value> {
        Ok(Value::array(self.items))
    }
}

fn test_map(value: &Value) -> Result<Arc<TestMap>> {
    value
        .object_ref::<TestMap>()
        .ok_or_else(|| Error::message(format!("Expected TestMap, got {}", value.type_name())))
}

/// Delegate whose native value type is [`Value`] itself.
#[derive(Default)]
pub struct TestPlatformValueDelegate {
    object_store: TestObjectStore,
}

impl TestPlatformValueDelegate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn test_object_store(&self) -> &TestObjectStore {
        &self.object_store
    }
}

impl PlatformValueDelegate<Value> for TestPlatformValueDelegate {
    fn new_void(&self) -> Value {
        Value::Undefined
    }

    fn new_null(&self) -> Value {
        Value::Null
    }

    fn new_int(&self, value: i32) -> Result<Value> {
        Ok(Value::Int(value))
    }

    fn new_int_object(&self, value: i32) -> Result<Value> {
        Ok(Value::object(TestNumberObject::new(NumberType::Integer, Value::Int(value))))
    }

    fn new_long(&self, value: i64) -> Result<Value> {
        Ok(Value::Long(value))
    }

    fn new_long_object(&self, value: i64) -> Result<Value> {
        Ok(Value::object(TestNumberObject::new(NumberType::LongInteger, Value::Long(value))))
    }

    fn new_double(&self, value: f64) -> Result<Value> {
        Ok(Value::Double(value))
    }

    fn new_double_object(&self, value: f64) -> Result<Value> {
        Ok(Value::object(TestNumberObject::new(NumberType::Double, Value::Double(value))))
    }

    fn new_bool(&self, value: bool) -> Result<Value> {
        Ok(Value::Bool(value))
    }

    fn new_bool_object(&self, value: bool) -> Result<Value> {
        Ok(Value::object(TestNumberObject::new(NumberType::Boolean, Value::Bool(value))))
    }

    fn new_string(&self, value: &str) -> Result<Value> {
        Ok(Value::from(value))
    }

    fn new_typed_array(&self, kind: TypedArrayKind, bytes: &[u8]) -> Result<Value> {
        Ok(Value::TypedArray(TypedArray::new(kind, bytes)))
    }

    fn new_untyped(&self, value: &Value) -> Result<Value> {
        Ok(value.clone())
    }

    fn new_map(&self, _capacity: usize) -> Result<Value> {
        Ok(Value::object(TestMap::new()))
    }

    fn set_map_entry(&self, map: &Value, key: &Value, value: &Value) -> Result<()> {
        test_map(map)?.insert(key.clone(), value.clone());
        Ok(())
    }

    fn map_estimated_len(&self, map: &Value) -> Result<usize> {
        Ok(test_map(map)?.len())
    }

    fn visit_map_entries(&self, map: &Value, visitor: &mut EntryVisitor<'_, Value>) -> Result<()> {
        for (key, value) in test_map(map)?.entries() {
            if !visitor(MapKey::Platform(&key), &value)? {
                break;
            }
        }
        Ok(())
    }

    fn new_es6_collection(&self, kind: CollectionKind) -> Result<Value> {
        Ok(match kind {
            CollectionKind::Map => Value::object(TestMap::es6()),
            CollectionKind::Set => Value::object(TestES6Set::new()),
        })
    }

    fn set_es6_collection_entry(&self, collection: &Value, kind: CollectionKind, items: &[Value]) -> Result<()> {
        match (kind, items) {
            (CollectionKind::Map, [key, value, ..]) => {
                test_map(collection)?.insert(key.clone(), value.clone());
                Ok(())
            }
            (CollectionKind::Set, [item, ..]) => {
                let set = collection
                    .object_ref::<TestES6Set>()
                    .ok_or_else(|| Error::message(format!("Expected TestES6Set, got {}", collection.type_name())))?;
                set.insert(item.clone());
                Ok(())
            }
            _ => Err(Error::message(format!("Missing items for {:?} entry", kind))),
        }
    }

    fn visit_es6_collection(&self, collection: &Value, visitor: &mut EntryVisitor<'_, Value>) -> Result<()> {
        if let Some(map) = collection.object_ref::<TestMap>() {
            for (key, value) in map.entries() {
                if !visitor(MapKey::Platform(&key), &value)? {
                    break;
                }
            }
            return Ok(());
        }
        if let Some(set) = collection.object_ref::<TestES6Set>() {
            let void = Value::Undefined;
            for item in set.entries() {
                if !visitor(MapKey::Platform(&item), &void)? {
                    break;
                }
            }
            return Ok(());
        }
        Err(Error::message(format!("Expected ES6 collection, got {}", collection.type_name())))
    }

    fn new_date(&self, millis: f64) -> Result<Value> {
        Ok(Value::Double(millis))
    }

    fn new_array_builder(&self, capacity: usize) -> Result<Box<dyn ArrayBuilder<Value>>> {
        Ok(Box::new(TestArrayBuilder {
            items: Vec::with_capacity(capacity),
        }))
    }

    fn new_array_iterator(&self, array: &Value) -> Result<PlatformArrayIterator<Value>> {
        let len = array
            .as_array()
            .ok_or_else(|| Error::type_mismatch(array.type_name(), "array"))?
            .len();
        Ok(PlatformArrayIterator::new(array.clone(), len))
    }

    fn array_item(&self, iterator: &PlatformArrayIterator<Value>, index: usize) -> Result<Value> {
        iterator
            .iterator()
            .as_array()
            .and_then(|items| items.get(index))
            .cloned()
            .ok_or_else(|| Error::message(format!("Array index {} out of bounds", index)))
    }

    fn new_bridged_promise(&self, promise: Arc<Promise>, marshaller: ValueMarshaller<Value>) -> Result<Value> {
        let native = Promise::new();

        let weak_source = Arc::downgrade(&promise);
        native.set_cancel_callback(move || {
            if let Some(source) = weak_source.upgrade() {
                source.cancel();
            }
        });

        let target = Arc::clone(&native);
        promise.on_complete(move |result| match result {
            Ok(value) => target.fulfill(marshaller.unmarshall(value)),
            Err(err) if err.is_cancelled() => target.cancel(),
            Err(err) => target.fulfill(Err(err.clone())),
        });

        Ok(Value::object(native))
    }

    fn new_object_class(&self, schema: &Arc<ClassSchema>) -> Result<Arc<dyn ObjectClassDelegate<Value>>> {
        Ok(Arc::new(TestObjectClass::new(Arc::clone(schema))))
    }

    fn new_enum_class(&self, schema: &Arc<EnumSchema>) -> Result<Arc<dyn EnumClassDelegate<Value>>> {
        Ok(Arc::new(TestEnumClass::new(Arc::clone(schema))))
    }

    fn new_function_class(
        &self,
        trampoline: Arc<FunctionTrampoline<Value>>,
        schema: &Arc<FunctionSchema>,
    ) -> Result<Arc<dyn FunctionClassDelegate<Value>>> {
        Ok(Arc::new(TestFunctionClass::new(trampoline, Arc::clone(schema))))
    }

    fn value_is_null(&self, value: &Value) -> bool {
        value.is_null_or_undefined()
    }

    fn value_to_int(&self, value: &Value) -> Result<i32> {
        value.checked_int()
    }

    fn value_object_to_int(&self, value: &Value) -> Result<i32> {
        TestNumberObject::unwrap(value, NumberType::Integer)?.checked_int()
    }

    fn value_to_long(&self, value: &Value) -> Result<i64> {
        value.checked_long()
    }

    fn value_object_to_long(&self, value: &Value) -> Result<i64> {
        TestNumberObject::unwrap(value, NumberType::LongInteger)?.checked_long()
    }

    fn value_to_double(&self, value: &Value) -> Result<f64> {
        value.checked_double()
    }

    fn value_object_to_double(&self, value: &Value) -> Result<f64> {
        TestNumberObject::unwrap(value, NumberType::Double)?.checked_double()
    }

    fn value_to_bool(&self, value: &Value) -> Result<bool> {
        value.checked_bool()
    }

    fn value_object_to_bool(&self, value: &Value) -> Result<bool> {
        TestNumberObject::unwrap(value, NumberType::Boolean)?.checked_bool()
    }

    fn value_to_string(&self, value: &Value) -> Result<Arc<str>> {
        value.checked_str().cloned()
    }

    fn value_to_typed_array(&self, value: &Value) -> Result<Arc<TypedArray>> {
        value
            .as_typed_array()
            .cloned()
            .ok_or_else(|| Error::type_mismatch(value.type_name(), "typed array"))
    }

    fn value_to_promise(&self, value: &Value, marshaller: ValueMarshaller<Value>) -> Result<Arc<Promise>> {
        let native = value
            .object_ref::<Promise>()
            .ok_or_else(|| Error::type_mismatch(value.type_name(), "promise"))?;
        let promise = Promise::new();

        let source = Arc::clone(&native);
        promise.set_cancel_callback(move || source.cancel());

        let weak_target = Arc::downgrade(&promise);
        native.on_complete(move |result| {
            let Some(target) = weak_target.upgrade() else {
                return;
            };
            match result {
                Ok(value) => target.fulfill(marshaller.marshall(value)),
                Err(err) if err.is_cancelled() => target.cancel(),
                Err(err) => target.fulfill(Err(err.clone())),
            }
        });

        Ok(promise)
    }

    fn date_to_double(&self, value: &Value) -> Result<f64> {
        value.checked_double()
    }

    fn value_to_untyped(&self, value: &Value) -> Result<Value> {
        Ok(value.clone())
    }

    fn object_store(&self) -> &dyn PlatformObjectStore<Value> {
        &self.object_store
    }
}
