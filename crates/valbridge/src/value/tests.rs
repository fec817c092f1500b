// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

use super::*;
use crate::schema::{ClassProperty, ClassSchema, Schema};
use std::collections::HashSet;

fn user_class() -> Arc<ClassSchema> {
    Arc::new(ClassSchema::new(
        "User",
        false,
        vec![
            ClassProperty::new("name", Schema::string()),
            ClassProperty::new("age", Schema::int()),
        ],
    ))
}

#[test]
fn test_numbers_compare_across_widths() {
    assert_eq!(Value::Int(42), Value::Double(42.0));
    assert_eq!(Value::Long(42), Value::Int(42));
    assert_ne!(Value::Int(42), Value::Double(42.5));
    assert!(Value::Int(1) < Value::Double(1.5));
    assert_ne!(Value::Bool(true), Value::Int(1));
}

#[test]
fn test_hash_consistent_with_equality() {
    let mut set = HashSet::new();
    set.insert(Value::Int(7));
    assert!(set.contains(&Value::Double(7.0)));
    assert!(set.contains(&Value::Long(7)));
    assert!(!set.contains(&Value::from("7")));
}

#[test]
fn test_null_and_undefined_are_distinct() {
    assert_ne!(Value::Null, Value::Undefined);
    assert!(Value::Null.is_null_or_undefined());
    assert!(Value::default().is_null_or_undefined());
}

#[test]
fn test_lenient_conversions() {
    assert_eq!(Value::from("12").to_int(), 12);
    assert_eq!(Value::from("12.7").to_int(), 12);
    assert_eq!(Value::Double(3.9).to_long(), 3);
    assert!(Value::from("true").to_bool());
    assert!(Value::from("1").to_bool());
    assert!(!Value::from("yes").to_bool());
    assert_eq!(Value::Bool(true).to_double(), 1.0);
}

#[test]
fn test_checked_conversions_report_type_names() {
    let err = Value::from("nope").checked_double().unwrap_err();
    assert_eq!(err.to_string(), "Cannot convert type 'string' to type 'double'");

    let err = Value::Double(42.0).checked_str().unwrap_err();
    assert_eq!(err.to_string(), "Cannot convert type 'double' to type 'string'");

    assert_eq!(Value::Bool(true).checked_int().expect("bool is numeric"), 1);
}

#[test]
fn test_with_map_value_builds_maps() {
    let value = Value::Null
        .with_map_value("b", Value::from(2))
        .with_map_value("a", Value::from(1));

    let keys: Vec<&str> = value
        .as_map()
        .expect("map")
        .keys()
        .map(|k| &**k)
        .collect();
    assert_eq!(keys, vec!["a", "b"]);
    assert_eq!(value.map_value("a"), Value::Int(1));
    assert_eq!(value.map_value("missing"), Value::Undefined);
}

#[test]
fn test_typed_object_equality_and_map_view() {
    let a = TypedObject::new(user_class(), vec![Value::from("Ada"), Value::from(36)]);
    let b = TypedObject::new(user_class(), vec![Value::from("Ada"), Value::from(36.0)]);

    assert_eq!(Value::TypedObject(a.clone()), Value::TypedObject(b));
    assert_eq!(a.property_named("age"), Some(Value::Int(36)));
    assert_eq!(a.property(5), Value::Undefined);

    let map = a.to_value_map();
    assert_eq!(map.get("name"), Some(&Value::from("Ada")));
}

#[test]
fn test_functions_compare_by_identity() {
    let f = value_function(|ctx| Ok(ctx.parameter(0)));
    let g = value_function(|ctx| Ok(ctx.parameter(0)));

    assert_eq!(Value::Function(f.clone()), Value::Function(f.clone()));
    assert_ne!(Value::Function(f.clone()), Value::Function(g));
    assert_eq!(
        f.invoke(&[Value::from("echo")]).expect("call"),
        Value::from("echo")
    );
}

#[test]
fn test_call_flags() {
    let flags = CallFlags::CALL_SYNC | CallFlags::PROPAGATES_ERROR;
    assert!(flags.contains(CallFlags::CALL_SYNC));
    assert!(!flags.contains(CallFlags::NEVER_CALL_SYNC));
    assert!(flags.contains(CallFlags::NONE));
}

#[test]
fn test_opaque_object_downcast() {
    let set = Es6Set::new(vec![Value::from("x")]);
    let value = Value::object(set);

    let back = value.object_ref::<Es6Set>().expect("downcast");
    assert_eq!(back.entries, vec![Value::from("x")]);
    assert!(value.object_ref::<Es6Map>().is_none());
}

#[test]
fn test_es6_map_pairs() {
    let map = Es6Map::new(vec![
        Value::from("k1"),
        Value::from(1.5),
        Value::from("k2"),
        Value::from(2.5),
    ]);
    let pairs: Vec<_> = map.pairs().collect();
    assert_eq!(pairs.len(), 2);
    assert_eq!(pairs[1], (&Value::from("k2"), &Value::from(2.5)));
}

#[test]
fn test_json_flatten_typed_object() {
    let object = TypedObject::new(user_class(), vec![Value::from("Ada"), Value::Undefined]);
    let flat = json::flatten(&Value::TypedObject(object));

    assert_eq!(
        flat,
        Value::Null
            .with_map_value("name", Value::from("Ada"))
            .with_map_value("age", Value::Null)
    );
}

#[test]
fn test_json_keeps_integer_and_double_kinds() {
    let value = json::parse(r#"{"i": 1, "d": 1.5, "big": 9999999999}"#).expect("parse");

    assert!(matches!(value.map_value("i"), Value::Int(1)));
    assert!(matches!(value.map_value("d"), Value::Double(_)));
    assert!(matches!(value.map_value("big"), Value::Long(9_999_999_999)));
}

#[test]
fn test_display() {
    let value = Value::array(vec![Value::from(1), Value::from("a"), Value::Null]);
    assert_eq!(value.to_string(), "[1, a, null]");
    assert_eq!(Value::Undefined.type_name(), "undefined");
    assert_eq!(Value::object(Es6Set::new(vec![])).type_name(), "object");
}
