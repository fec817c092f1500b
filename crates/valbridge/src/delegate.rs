// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Host platform contract.
//!
//! A host binding implements [`PlatformValueDelegate`] for its native value
//! type `P`. Marshallers never inspect `P` directly: every construction,
//! conversion and traversal of a platform value goes through the delegate.
//!
//! Class-shaped values (objects, enums, functions) are handled by per-class
//! delegates created once through the factory methods and cached by the
//! marshaller registry.

use std::sync::Arc;

use crate::error::Result;
use crate::marshaller::{FunctionTrampoline, ValueMarshaller};
use crate::object_store::PlatformObjectStore;
use crate::promise::Promise;
use crate::schema::{ClassSchema, EnumSchema, FunctionSchema};
use crate::value::{ProxyObject, TypedArray, TypedArrayKind, TypedObject, Value, ValueFunction};

/// A native value of the host platform.
pub trait PlatformValue: Clone + Send + Sync + 'static {}

impl<T: Clone + Send + Sync + 'static> PlatformValue for T {}

/// ES6 collection flavour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionKind {
    Map,
    Set,
}

/// Key handed to map visitors.
///
/// Hosts whose maps are keyed by native strings can skip building a
/// platform value for every key.
#[derive(Debug, Clone, Copy)]
pub enum MapKey<'a, P> {
    Platform(&'a P),
    Str(&'a str),
}

/// Visitor over map or collection entries. Returning `Ok(false)` stops the
/// traversal.
pub type EntryVisitor<'v, P> = dyn FnMut(MapKey<'_, P>, &P) -> Result<bool> + 'v;

/// Incremental construction of a platform array.
pub trait ArrayBuilder<P>: Send {
    fn set(&mut self, index: usize, value: P) -> Result<()>;

    fn finish(self: Box<Self>) -> Result<P>;
}

/// Positional access into a platform array.
#[derive(Debug, Clone)]
pub struct PlatformArrayIterator<P> {
    iterator: P,
    len: usize,
}

impl<P> PlatformArrayIterator<P> {
    pub fn new(iterator: P, len: usize) -> Self {
        Self { iterator, len }
    }

    /// Host-side iteration handle.
    pub fn iterator(&self) -> &P {
        &self.iterator
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Native object class for a class schema.
pub trait ObjectClassDelegate<P: PlatformValue>: Send + Sync {
    /// Build a native object from positional property values.
    fn new_object(&self, properties: &[P]) -> Result<P>;

    fn get_property(&self, object: &P, index: usize) -> Result<P>;

    /// Wrap a native object implementing an interface into a proxy.
    fn new_proxy(
        &self,
        object: &P,
        typed_object: Arc<TypedObject>,
        id: u32,
    ) -> Result<Arc<dyn ProxyObject>>;

    /// Whether `object` implements the method property at `index`.
    fn object_implements_method(&self, _object: &P, _index: usize) -> Result<bool> {
        Ok(true)
    }
}

/// Native enum class for an enum schema.
pub trait EnumClassDelegate<P: PlatformValue>: Send + Sync {
    fn new_enum(&self, case_index: usize, boxed: bool) -> Result<P>;

    /// Case value of a native enum object.
    fn enum_case_to_value(&self, object: &P, boxed: bool) -> Result<Value>;
}

/// Native function class for a function schema.
pub trait FunctionClassDelegate<P: PlatformValue>: Send + Sync {
    /// Native callable forwarding to `function`.
    fn new_function(&self, function: Arc<dyn ValueFunction>) -> Result<P>;

    /// Engine function forwarding to the native callable `function`.
    ///
    /// `receiver` is set only for method functions.
    fn to_value_function(&self, receiver: Option<&P>, function: &P) -> Result<Arc<dyn ValueFunction>>;
}

/// Everything the engine needs from a host platform.
pub trait PlatformValueDelegate<P: PlatformValue>: Send + Sync {
    fn new_void(&self) -> P;
    fn new_null(&self) -> P;

    fn new_int(&self, value: i32) -> Result<P>;
    fn new_int_object(&self, value: i32) -> Result<P>;
    fn new_long(&self, value: i64) -> Result<P>;
    fn new_long_object(&self, value: i64) -> Result<P>;
    fn new_double(&self, value: f64) -> Result<P>;
    fn new_double_object(&self, value: f64) -> Result<P>;
    fn new_bool(&self, value: bool) -> Result<P>;
    fn new_bool_object(&self, value: bool) -> Result<P>;
    fn new_string(&self, value: &str) -> Result<P>;

    fn new_byte_array(&self, bytes: &[u8]) -> Result<P> {
        self.new_typed_array(TypedArrayKind::ArrayBuffer, bytes)
    }
    fn new_typed_array(&self, kind: TypedArrayKind, bytes: &[u8]) -> Result<P>;

    /// Carry an engine value through untouched.
    fn new_untyped(&self, value: &Value) -> Result<P>;

    fn new_map(&self, capacity: usize) -> Result<P>;
    fn set_map_entry(&self, map: &P, key: &P, value: &P) -> Result<()>;
    fn map_estimated_len(&self, map: &P) -> Result<usize>;
    fn visit_map_entries(&self, map: &P, visitor: &mut EntryVisitor<'_, P>) -> Result<()>;

    fn new_es6_collection(&self, kind: CollectionKind) -> Result<P>;
    /// Add one entry: `[key, value]` for maps, `[item]` for sets.
    fn set_es6_collection_entry(&self, collection: &P, kind: CollectionKind, items: &[P]) -> Result<()>;
    /// Visit entries. Set visitors receive the item as key and a void value.
    fn visit_es6_collection(&self, collection: &P, visitor: &mut EntryVisitor<'_, P>) -> Result<()>;

    /// Date from milliseconds since the Unix epoch.
    fn new_date(&self, millis: f64) -> Result<P>;

    fn new_array_builder(&self, capacity: usize) -> Result<Box<dyn ArrayBuilder<P>>>;
    fn new_array_iterator(&self, array: &P) -> Result<PlatformArrayIterator<P>>;
    fn array_item(&self, iterator: &PlatformArrayIterator<P>, index: usize) -> Result<P>;

    /// Native promise settled by `promise`. Its value is unmarshalled with
    /// `marshaller`.
    fn new_bridged_promise(&self, promise: Arc<Promise>, marshaller: ValueMarshaller<P>) -> Result<P>;

    fn new_object_class(&self, schema: &Arc<ClassSchema>) -> Result<Arc<dyn ObjectClassDelegate<P>>>;
    fn new_enum_class(&self, schema: &Arc<EnumSchema>) -> Result<Arc<dyn EnumClassDelegate<P>>>;
    fn new_function_class(
        &self,
        trampoline: Arc<FunctionTrampoline<P>>,
        schema: &Arc<FunctionSchema>,
    ) -> Result<Arc<dyn FunctionClassDelegate<P>>>;

    fn value_is_null(&self, value: &P) -> bool;

    fn value_to_int(&self, value: &P) -> Result<i32>;
    fn value_object_to_int(&self, value: &P) -> Result<i32>;
    fn value_to_long(&self, value: &P) -> Result<i64>;
    fn value_object_to_long(&self, value: &P) -> Result<i64>;
    fn value_to_double(&self, value: &P) -> Result<f64>;
    fn value_object_to_double(&self, value: &P) -> Result<f64>;
    fn value_to_bool(&self, value: &P) -> Result<bool>;
    fn value_object_to_bool(&self, value: &P) -> Result<bool>;
    fn value_to_string(&self, value: &P) -> Result<Arc<str>>;

    fn value_to_byte_array(&self, value: &P) -> Result<Vec<u8>> {
        Ok(self.value_to_typed_array(value)?.bytes().to_vec())
    }
    fn value_to_typed_array(&self, value: &P) -> Result<Arc<TypedArray>>;

    /// Engine promise settled by the native promise `value`. Its value is
    /// marshalled with `marshaller`.
    fn value_to_promise(&self, value: &P, marshaller: ValueMarshaller<P>) -> Result<Arc<Promise>>;

    /// Milliseconds since the Unix epoch.
    fn date_to_double(&self, value: &P) -> Result<f64>;

    fn value_to_untyped(&self, value: &P) -> Result<Value>;

    fn object_store(&self) -> &dyn PlatformObjectStore<P>;
}
