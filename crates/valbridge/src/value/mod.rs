// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Dynamic value model.
//!
//! [`Value`] is the engine-side representation every marshaller converts to
//! and from. Containers are reference counted, so cloning a `Value` is cheap
//! and shares the underlying storage.
//!
//! # Equality
//!
//! Equality, ordering and hashing are structural:
//! - numbers compare by numeric value across `Int`, `Long` and `Double`
//! - strings, arrays, maps, typed arrays and typed objects compare by content
//! - functions, proxies and opaque objects compare by identity
//!
//! # Example
//!
//! ```
//! use valbridge::Value;
//!
//! let user = Value::default()
//!     .with_map_value("name", Value::from("Ada"))
//!     .with_map_value("age", Value::from(36));
//!
//! assert_eq!(user.map_value("age"), Value::from(36.0));
//! ```

mod collections;
mod function;
pub mod json;
mod object;

#[cfg(test)]
mod tests;

pub use collections::{Es6Map, Es6Set};
pub use function::{
    value_function, CallContext, CallFlags, FnValueFunction, SingleCallFunction, ValueFunction,
};
pub use object::{OpaqueObject, ProxyObject, TypedArray, TypedArrayKind, TypedObject};

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::error::{Error, Result};

/// String-keyed map payload.
pub type ValueMap = BTreeMap<Arc<str>, Value>;

/// Dynamic value.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Undefined,
    Bool(bool),
    Int(i32),
    Long(i64),
    Double(f64),
    String(Arc<str>),
    Array(Arc<[Value]>),
    Map(Arc<ValueMap>),
    TypedArray(Arc<TypedArray>),
    Function(Arc<dyn ValueFunction>),
    Error(Arc<Error>),
    TypedObject(Arc<TypedObject>),
    ProxyObject(Arc<dyn ProxyObject>),
    Object(Arc<dyn OpaqueObject>),
}

/// Discriminant of a [`Value`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    Null,
    Undefined,
    Bool,
    Int,
    Long,
    Double,
    String,
    Array,
    Map,
    TypedArray,
    Function,
    Error,
    TypedObject,
    ProxyObject,
    Object,
}

impl ValueType {
    /// Name used in conversion error messages.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            ValueType::Null => "null",
            ValueType::Undefined => "undefined",
            ValueType::Bool => "bool",
            ValueType::Int => "int",
            ValueType::Long => "long",
            ValueType::Double => "double",
            ValueType::String => "string",
            ValueType::Array => "array",
            ValueType::Map => "map",
            ValueType::TypedArray => "typed array",
            ValueType::Function => "function",
            ValueType::Error => "error",
            ValueType::TypedObject => "typed object",
            ValueType::ProxyObject => "proxy object",
            ValueType::Object => "object",
        }
    }

    fn rank(self) -> u8 {
        match self {
            ValueType::Null => 0,
            ValueType::Undefined => 1,
            ValueType::Bool => 2,
            ValueType::Int | ValueType::Long | ValueType::Double => 3,
            ValueType::String => 4,
            ValueType::Array => 5,
            ValueType::Map => 6,
            ValueType::TypedArray => 7,
            ValueType::Function => 8,
            ValueType::Error => 9,
            ValueType::TypedObject => 10,
            ValueType::ProxyObject => 11,
            ValueType::Object => 12,
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Construction
// ---------------------------------------------------------------------------

impl Value {
    /// The `undefined` value.
    #[must_use]
    pub fn undefined() -> Self {
        Value::Undefined
    }

    /// Array value from owned items.
    #[must_use]
    pub fn array(items: Vec<Value>) -> Self {
        Value::Array(items.into())
    }

    /// Map value from owned entries.
    #[must_use]
    pub fn map(entries: ValueMap) -> Self {
        Value::Map(Arc::new(entries))
    }

    /// Error value.
    #[must_use]
    pub fn error(error: Error) -> Self {
        Value::Error(Arc::new(error))
    }

    /// Wrap an opaque object.
    pub fn object<T: OpaqueObject>(object: Arc<T>) -> Self {
        Value::Object(object)
    }

    /// Copy of this value as a map with `key` set to `value`.
    ///
    /// Non-map values are replaced by a fresh map.
    #[must_use]
    pub fn with_map_value(self, key: &str, value: Value) -> Self {
        let mut entries = match self {
            Value::Map(map) => Arc::try_unwrap(map).unwrap_or_else(|shared| (*shared).clone()),
            _ => ValueMap::new(),
        };
        entries.insert(Arc::from(key), value);
        Value::Map(Arc::new(entries))
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Long(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(Arc::from(v))
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(Arc::from(v))
    }
}

impl From<Arc<str>> for Value {
    fn from(v: Arc<str>) -> Self {
        Value::String(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::array(v)
    }
}

impl From<Arc<TypedObject>> for Value {
    fn from(v: Arc<TypedObject>) -> Self {
        Value::TypedObject(v)
    }
}

impl From<Arc<dyn ValueFunction>> for Value {
    fn from(v: Arc<dyn ValueFunction>) -> Self {
        Value::Function(v)
    }
}

// ---------------------------------------------------------------------------
// Inspection
// ---------------------------------------------------------------------------

impl Value {
    /// Discriminant.
    #[must_use]
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Null => ValueType::Null,
            Value::Undefined => ValueType::Undefined,
            Value::Bool(_) => ValueType::Bool,
            Value::Int(_) => ValueType::Int,
            Value::Long(_) => ValueType::Long,
            Value::Double(_) => ValueType::Double,
            Value::String(_) => ValueType::String,
            Value::Array(_) => ValueType::Array,
            Value::Map(_) => ValueType::Map,
            Value::TypedArray(_) => ValueType::TypedArray,
            Value::Function(_) => ValueType::Function,
            Value::Error(_) => ValueType::Error,
            Value::TypedObject(_) => ValueType::TypedObject,
            Value::ProxyObject(_) => ValueType::ProxyObject,
            Value::Object(_) => ValueType::Object,
        }
    }

    /// Name of the value's type, as used in error messages.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.value_type().name()
    }

    #[must_use]
    pub fn is_null_or_undefined(&self) -> bool {
        matches!(self, Value::Null | Value::Undefined)
    }

    /// Numbers and booleans.
    #[must_use]
    pub fn is_number(&self) -> bool {
        matches!(
            self,
            Value::Bool(_) | Value::Int(_) | Value::Long(_) | Value::Double(_)
        )
    }

    #[must_use]
    pub fn is_string(&self) -> bool {
        matches!(self, Value::String(_))
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_map(&self) -> Option<&ValueMap> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_typed_array(&self) -> Option<&Arc<TypedArray>> {
        match self {
            Value::TypedArray(array) => Some(array),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_function(&self) -> Option<&Arc<dyn ValueFunction>> {
        match self {
            Value::Function(function) => Some(function),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_typed_object(&self) -> Option<&Arc<TypedObject>> {
        match self {
            Value::TypedObject(object) => Some(object),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_proxy_object(&self) -> Option<&Arc<dyn ProxyObject>> {
        match self {
            Value::ProxyObject(proxy) => Some(proxy),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_error(&self) -> Option<&Arc<Error>> {
        match self {
            Value::Error(err) => Some(err),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_object(&self) -> Option<&Arc<dyn OpaqueObject>> {
        match self {
            Value::Object(object) => Some(object),
            _ => None,
        }
    }

    /// Downcast an opaque object to its concrete type.
    #[must_use]
    pub fn object_ref<T: OpaqueObject>(&self) -> Option<Arc<T>> {
        let object = self.as_object()?;
        Arc::clone(object).into_any().downcast::<T>().ok()
    }

    /// Downcast a proxy object to its concrete type.
    #[must_use]
    pub fn proxy_ref<T: ProxyObject>(&self) -> Option<Arc<T>> {
        let proxy = self.as_proxy_object()?;
        Arc::clone(proxy).into_any().downcast::<T>().ok()
    }

    /// Entry of a map value, `Undefined` when absent or not a map.
    #[must_use]
    pub fn map_value(&self, key: &str) -> Value {
        self.as_map()
            .and_then(|map| map.get(key).cloned())
            .unwrap_or(Value::Undefined)
    }
}

// ---------------------------------------------------------------------------
// Conversions
// ---------------------------------------------------------------------------

impl Value {
    /// Lenient conversion to `i32`.
    #[must_use]
    pub fn to_int(&self) -> i32 {
        match self {
            Value::Int(v) => *v,
            Value::Long(v) => *v as i32,
            Value::Double(v) => *v as i32,
            Value::Bool(v) => i32::from(*v),
            Value::String(s) => s
                .trim()
                .parse::<i32>()
                .unwrap_or_else(|_| s.trim().parse::<f64>().map_or(0, |d| d as i32)),
            _ => 0,
        }
    }

    /// Lenient conversion to `i64`.
    #[must_use]
    pub fn to_long(&self) -> i64 {
        match self {
            Value::Int(v) => i64::from(*v),
            Value::Long(v) => *v,
            Value::Double(v) => *v as i64,
            Value::Bool(v) => i64::from(*v),
            Value::String(s) => s
                .trim()
                .parse::<i64>()
                .unwrap_or_else(|_| s.trim().parse::<f64>().map_or(0, |d| d as i64)),
            _ => 0,
        }
    }

    /// Lenient conversion to `f64`.
    #[must_use]
    pub fn to_double(&self) -> f64 {
        match self {
            Value::Int(v) => f64::from(*v),
            Value::Long(v) => *v as f64,
            Value::Double(v) => *v,
            Value::Bool(v) => {
                if *v {
                    1.0
                } else {
                    0.0
                }
            }
            Value::String(s) => s.trim().parse::<f64>().unwrap_or(0.0),
            _ => 0.0,
        }
    }

    /// Lenient conversion to `bool`.
    #[must_use]
    pub fn to_bool(&self) -> bool {
        match self {
            Value::Bool(v) => *v,
            Value::Int(v) => *v != 0,
            Value::Long(v) => *v != 0,
            Value::Double(v) => *v != 0.0,
            Value::String(s) => matches!(&**s, "true" | "1"),
            Value::Null | Value::Undefined => false,
            _ => true,
        }
    }

    /// Strict conversion to `i32`: numbers and booleans only.
    pub fn checked_int(&self) -> Result<i32> {
        self.expect_number("int").map(|_| self.to_int())
    }

    /// Strict conversion to `i64`.
    pub fn checked_long(&self) -> Result<i64> {
        self.expect_number("long").map(|_| self.to_long())
    }

    /// Strict conversion to `f64`.
    pub fn checked_double(&self) -> Result<f64> {
        self.expect_number("double").map(|_| self.to_double())
    }

    /// Strict conversion to `bool`.
    pub fn checked_bool(&self) -> Result<bool> {
        self.expect_number("bool").map(|_| self.to_bool())
    }

    /// Strict string access.
    pub fn checked_str(&self) -> Result<&Arc<str>> {
        match self {
            Value::String(s) => Ok(s),
            other => Err(Error::type_mismatch(other.type_name(), "string")),
        }
    }

    fn expect_number(&self, expected: &'static str) -> Result<()> {
        if self.is_number() {
            Ok(())
        } else {
            Err(Error::type_mismatch(self.type_name(), expected))
        }
    }

    /// Render as a map key: strings as-is, everything else through `Display`.
    #[must_use]
    pub fn to_key_string(&self) -> Arc<str> {
        match self {
            Value::String(s) => Arc::clone(s),
            other => Arc::from(other.to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// Structural equality, ordering, hashing
// ---------------------------------------------------------------------------

fn normalized_bits(v: f64) -> u64 {
    if v == 0.0 {
        0.0f64.to_bits()
    } else {
        v.to_bits()
    }
}

fn compare_numbers(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => x.cmp(y),
        (Value::Int(_) | Value::Long(_), Value::Int(_) | Value::Long(_)) => {
            a.to_long().cmp(&b.to_long())
        }
        _ => {
            let (x, y) = (a.to_double(), b.to_double());
            if normalized_bits(x) == normalized_bits(y) {
                Ordering::Equal
            } else {
                x.total_cmp(&y)
            }
        }
    }
}

fn identity<T: ?Sized>(arc: &Arc<T>) -> usize {
    Arc::as_ptr(arc).cast::<()>() as usize
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Value {}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        let (lt, rt) = (self.value_type(), other.value_type());
        if lt.rank() != rt.rank() {
            return lt.rank().cmp(&rt.rank());
        }

        match (self, other) {
            (Value::Null, Value::Null) | (Value::Undefined, Value::Undefined) => Ordering::Equal,
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::String(a), Value::String(b)) => a.cmp(b),
            (Value::Array(a), Value::Array(b)) => a.iter().cmp(b.iter()),
            (Value::Map(a), Value::Map(b)) => a.iter().cmp(b.iter()),
            (Value::TypedArray(a), Value::TypedArray(b)) => a.as_ref().cmp(b.as_ref()),
            (Value::Error(a), Value::Error(b)) => a.full_message().cmp(&b.full_message()),
            (Value::TypedObject(a), Value::TypedObject(b)) => {
                if Arc::ptr_eq(a, b) {
                    Ordering::Equal
                } else {
                    a.class_name()
                        .cmp(b.class_name())
                        .then_with(|| a.properties().iter().cmp(b.properties().iter()))
                }
            }
            (Value::Function(a), Value::Function(b)) => identity(a).cmp(&identity(b)),
            (Value::ProxyObject(a), Value::ProxyObject(b)) => identity(a).cmp(&identity(b)),
            (Value::Object(a), Value::Object(b)) => identity(a).cmp(&identity(b)),
            _ => compare_numbers(self, other),
        }
    }
}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.value_type().rank().hash(state);
        match self {
            Value::Null | Value::Undefined => {}
            Value::Bool(v) => v.hash(state),
            Value::Int(_) | Value::Long(_) | Value::Double(_) => {
                normalized_bits(self.to_double()).hash(state);
            }
            Value::String(s) => s.hash(state),
            Value::Array(items) => items.hash(state),
            Value::Map(map) => map.hash(state),
            Value::TypedArray(array) => array.hash(state),
            Value::Error(err) => err.full_message().hash(state),
            Value::TypedObject(object) => {
                object.class_name().hash(state);
                object.properties().hash(state);
            }
            Value::Function(f) => identity(f).hash(state),
            Value::ProxyObject(p) => identity(p).hash(state),
            Value::Object(o) => identity(o).hash(state),
        }
    }
}

// ---------------------------------------------------------------------------
// Formatting
// ---------------------------------------------------------------------------

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Undefined => f.write_str("undefined"),
            Value::Bool(v) => write!(f, "{}", v),
            Value::Int(v) => write!(f, "{}", v),
            Value::Long(v) => write!(f, "{}", v),
            Value::Double(v) => write!(f, "{}", v),
            Value::String(s) => f.write_str(s),
            Value::Array(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
            Value::Map(map) => {
                f.write_str("{")?;
                for (i, (key, value)) in map.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}: {}", key, value)?;
                }
                f.write_str("}")
            }
            Value::TypedArray(array) => {
                write!(f, "<{} {} bytes>", array.kind().name(), array.bytes().len())
            }
            Value::Function(function) => write!(f, "<function {}>", function.function_type()),
            Value::Error(err) => write!(f, "<error: {}>", err),
            Value::TypedObject(object) => {
                write!(f, "<{}>{}", object.class_name(), Value::map(object.to_value_map()))
            }
            Value::ProxyObject(proxy) => write!(
                f,
                "<{} proxy of {}>",
                proxy.proxy_type(),
                proxy.typed_object().class_name()
            ),
            Value::Object(object) => write!(f, "<{}>", object.class_name()),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => write!(f, "{:?}", s),
            Value::Long(v) => write!(f, "{}L", v),
            Value::Double(v) => write!(f, "{:?}", v),
            other => fmt::Display::fmt(other, f),
        }
    }
}
