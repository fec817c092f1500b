// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Object-shaped values: typed objects, proxies, opaque objects, typed arrays.

use std::any::Any;
use std::sync::Arc;

use super::{Value, ValueMap};
use crate::schema::ClassSchema;

/// Ordered property values bound to a class schema.
pub struct TypedObject {
    class: Arc<ClassSchema>,
    properties: Vec<Value>,
}

impl TypedObject {
    /// Build a typed object. Missing trailing properties read as `Undefined`.
    #[must_use]
    pub fn new(class: Arc<ClassSchema>, properties: Vec<Value>) -> Arc<Self> {
        Arc::new(Self { class, properties })
    }

    #[must_use]
    pub fn class(&self) -> &Arc<ClassSchema> {
        &self.class
    }

    #[must_use]
    pub fn class_name(&self) -> &str {
        self.class.name()
    }

    #[must_use]
    pub fn properties(&self) -> &[Value] {
        &self.properties
    }

    /// Property at `index`, `Undefined` when out of range.
    #[must_use]
    pub fn property(&self, index: usize) -> Value {
        self.properties.get(index).cloned().unwrap_or(Value::Undefined)
    }

    /// Property by name.
    #[must_use]
    pub fn property_named(&self, name: &str) -> Option<Value> {
        self.class
            .property_index(name)
            .map(|index| self.property(index))
    }

    /// One level deep name → value map.
    #[must_use]
    pub fn to_value_map(&self) -> ValueMap {
        self.class
            .properties()
            .iter()
            .enumerate()
            .map(|(i, prop)| (Arc::clone(prop.name()), self.property(i)))
            .collect()
    }
}

/// A live handle forwarding to an object that lives on the other side.
pub trait ProxyObject: Send + Sync + 'static {
    /// Typed view over the proxied object.
    fn typed_object(&self) -> &Arc<TypedObject>;

    /// Identifier recorded in the object store.
    fn id(&self) -> u32;

    /// Short description of the proxy kind.
    fn proxy_type(&self) -> &str;

    fn as_any(&self) -> &dyn Any;

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

/// Extensible object carried through `Value::Object`.
pub trait OpaqueObject: Send + Sync + 'static {
    fn class_name(&self) -> &str;

    /// Structural view used by JSON export.
    fn to_value(&self) -> Option<Value> {
        None
    }

    fn as_any(&self) -> &dyn Any;

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

/// Element kind of a [`TypedArray`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TypedArrayKind {
    ArrayBuffer,
    Int8Array,
    Int16Array,
    Int32Array,
    Uint8Array,
    Uint8ClampedArray,
    Uint16Array,
    Uint32Array,
    Float32Array,
    Float64Array,
}

impl TypedArrayKind {
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            TypedArrayKind::ArrayBuffer => "ArrayBuffer",
            TypedArrayKind::Int8Array => "Int8Array",
            TypedArrayKind::Int16Array => "Int16Array",
            TypedArrayKind::Int32Array => "Int32Array",
            TypedArrayKind::Uint8Array => "Uint8Array",
            TypedArrayKind::Uint8ClampedArray => "Uint8ClampedArray",
            TypedArrayKind::Uint16Array => "Uint16Array",
            TypedArrayKind::Uint32Array => "Uint32Array",
            TypedArrayKind::Float32Array => "Float32Array",
            TypedArrayKind::Float64Array => "Float64Array",
        }
    }
}

/// Byte buffer tagged with its element kind.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TypedArray {
    kind: TypedArrayKind,
    bytes: Vec<u8>,
}

impl TypedArray {
    #[must_use]
    pub fn new(kind: TypedArrayKind, bytes: impl Into<Vec<u8>>) -> Arc<Self> {
        Arc::new(Self {
            kind,
            bytes: bytes.into(),
        })
    }

    #[must_use]
    pub fn kind(&self) -> TypedArrayKind {
        self.kind
    }

    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}
