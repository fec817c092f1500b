// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! JSON interop for [`Value`].
//!
//! Export is lossy for identity-based values: functions become `null`,
//! proxies export their typed object, and opaque objects export through
//! [`OpaqueObject::to_value`](super::OpaqueObject::to_value) when they
//! provide one.

use std::sync::Arc;

use serde_json::{Map as JsonMap, Number, Value as Json};

use super::{Value, ValueMap};

/// Convert a value into a JSON document.
#[must_use]
pub fn to_json(value: &Value) -> Json {
    match value {
        Value::Null | Value::Undefined | Value::Function(_) => Json::Null,
        Value::Bool(v) => Json::Bool(*v),
        Value::Int(v) => Json::Number(Number::from(*v)),
        Value::Long(v) => Json::Number(Number::from(*v)),
        Value::Double(v) => Number::from_f64(*v).map_or(Json::Null, Json::Number),
        Value::String(s) => Json::String(s.to_string()),
        Value::Array(items) => Json::Array(items.iter().map(to_json).collect()),
        Value::Map(map) => map_to_json(map),
        Value::TypedArray(array) => Json::Array(
            array
                .bytes()
                .iter()
                .map(|b| Json::Number(Number::from(*b)))
                .collect(),
        ),
        Value::Error(err) => Json::String(err.full_message()),
        Value::TypedObject(object) => map_to_json(&object.to_value_map()),
        Value::ProxyObject(proxy) => map_to_json(&proxy.typed_object().to_value_map()),
        Value::Object(object) => match object.to_value() {
            Some(inner) => to_json(&inner),
            None => Json::String(object.class_name().to_string()),
        },
    }
}

fn map_to_json(map: &ValueMap) -> Json {
    let mut out = JsonMap::new();
    for (key, value) in map {
        out.insert(key.to_string(), to_json(value));
    }
    Json::Object(out)
}

/// Convert a JSON document into a value.
///
/// Integral numbers become `Int` when they fit, `Long` otherwise.
#[must_use]
pub fn from_json(json: &Json) -> Value {
    match json {
        Json::Null => Value::Null,
        Json::Bool(v) => Value::Bool(*v),
        Json::Number(n) => {
            if let Some(i) = n.as_i64() {
                i32::try_from(i).map_or(Value::Long(i), Value::Int)
            } else if let Some(u) = n.as_u64() {
                Value::Long(i64::try_from(u).unwrap_or(i64::MAX))
            } else {
                Value::Double(n.as_f64().unwrap_or(0.0))
            }
        }
        Json::String(s) => Value::from(s.as_str()),
        Json::Array(items) => Value::array(items.iter().map(from_json).collect()),
        Json::Object(map) => Value::map(
            map.iter()
                .map(|(key, value)| (Arc::from(key.as_str()), from_json(value)))
                .collect(),
        ),
    }
}

/// Round-trip through JSON, turning object graphs into plain data.
#[must_use]
pub fn flatten(value: &Value) -> Value {
    from_json(&to_json(value))
}

/// Parse JSON text into a value.
pub fn parse(text: &str) -> crate::Result<Value> {
    serde_json::from_str::<Json>(text)
        .map(|json| from_json(&json))
        .map_err(|err| crate::Error::message(format!("Invalid JSON: {}", err)))
}
