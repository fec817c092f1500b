// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

#![allow(clippy::uninlined_format_args)] // Test code readability over pedantic
#![allow(clippy::float_cmp)] // Test assertions with constants
#![allow(clippy::missing_panics_doc)] // Tests panic on failure

//! Registry hook integration tests
//!
//! Marshaller processors, interface property listeners, lazily provided
//! schemas and randomized round trips.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use valbridge::value::json;
use valbridge::{
    Error, MarshallerProcessor, MarshallerRegistryListener, RegistryGuard, Result, Schema, SchemaKind,
    SchemaRegistryKey, SchemaRegistryListener, Value,
};
use valbridge_testhost::{flatten_value, test_context, TestObject};

fn ok<T>(result: Result<T>) -> T {
    match result {
        Ok(value) => value,
        Err(err) => panic!("{}", err.full_message()),
    }
}

fn parse_json(text: &str) -> Value {
    ok(json::parse(text))
}

fn point(value: &Value) -> Result<Arc<TestObject>> {
    value
        .object_ref::<TestObject>()
        .ok_or_else(|| Error::message(format!("Expected a Point, got {}", value.type_name())))
}

/// Stores points at twice their engine-side coordinate.
struct ScalePoints;

impl MarshallerProcessor<Value> for ScalePoints {
    fn preprocess(&self, _receiver: Option<&Value>, value: &Value) -> Result<Value> {
        let x = point(value)?.property(0).to_double();
        Ok(Value::object(TestObject::new("Point", vec![Value::from(x / 2.0)])))
    }

    fn postprocess(&self, value: Value) -> Result<Value> {
        let native = point(&value)?;
        let x = native.property(0).to_double();
        native.set_property(0, Value::from(x * 2.0));
        Ok(value)
    }
}

#[derive(Default)]
struct CountingProcessor {
    postprocessed: AtomicUsize,
}

impl MarshallerProcessor<Value> for CountingProcessor {
    fn preprocess(&self, _receiver: Option<&Value>, value: &Value) -> Result<Value> {
        Ok(value.clone())
    }

    fn postprocess(&self, value: Value) -> Result<Value> {
        self.postprocessed.fetch_add(1, Ordering::SeqCst);
        Ok(value)
    }
}

#[test]
fn test_processor_wraps_linked_type() {
    let ctx = test_context();
    ctx.marshaller_registry()
        .register_processor(SchemaRegistryKey::named("Point"), Arc::new(ScalePoints));
    ok(ctx.register_schema_str("c 'Point'{'x': d}"));
    let id = ok(ctx.register_schema_str("c 'Segment'{'start': r:'Point', 'end': r:'Point'}"));

    let output = ok(ctx.unmarshall(id, &parse_json(r#"{"start": {"x": 1.0}, "end": {"x": 2.0}}"#)));
    assert_eq!(
        flatten_value(&output),
        parse_json(
            r#"{"className": "Segment", "properties": [
                {"className": "Point", "properties": [2.0]},
                {"className": "Point", "properties": [4.0]}
            ]}"#
        )
    );

    let marshalled = ok(ctx.marshall(id, &output));
    assert_eq!(
        flatten_value(&marshalled),
        parse_json(r#"{"start": {"x": 1.0}, "end": {"x": 2.0}}"#)
    );
}

#[test]
fn test_processor_applies_on_every_request() {
    let ctx = test_context();
    ctx.marshaller_registry()
        .register_processor(SchemaRegistryKey::named("Point"), Arc::new(ScalePoints));
    ok(ctx.register_schema_str("c 'Point'{'x': d}"));
    let link = ok(Schema::parse("r:'Point'"));
    let input = parse_json(r#"{"x": 1.0}"#);

    let first = ok(ctx.marshaller_for_schema(&link));
    let second = ok(ctx.marshaller_for_schema(&link));
    assert_eq!(first.id(), second.id());

    for marshaller in [first, second] {
        let output = ok(marshaller.unmarshall(&input));
        assert_eq!(point(&output).expect("point").property(0), Value::from(2.0));
    }
}

#[test]
fn test_processor_applies_to_generic_instances() {
    let ctx = test_context();
    let processor = Arc::new(CountingProcessor::default());
    ctx.marshaller_registry()
        .register_processor(SchemaRegistryKey::named("Box"), processor.clone());
    ok(ctx.register_schema_str("c 'Box'{'value': r:0}"));
    let id = ok(ctx.register_schema_str("c 'Shelf'{'left': g:'Box'<d>, 'right': g:'Box'<s>}"));

    let input = parse_json(r#"{"left": {"value": 1.5}, "right": {"value": "label"}}"#);
    ok(ctx.unmarshall(id, &input));

    assert_eq!(processor.postprocessed.load(Ordering::SeqCst), 2);
}

/// Lets interface doubles be provided as strings.
struct DoublesAsStrings;

impl MarshallerRegistryListener for DoublesAsStrings {
    fn schema_for_interface_property_unmarshaller(&self, schema: &Schema) -> Schema {
        if matches!(schema.kind(), SchemaKind::Double) {
            Schema::string()
        } else {
            schema.clone()
        }
    }
}

#[test]
fn test_listener_compiles_unbalanced_properties() {
    let ctx = test_context();
    ctx.marshaller_registry()
        .set_listener(Some(Arc::new(DoublesAsStrings)));
    let id = ok(ctx.register_schema_str("c+ 'Gauge'{'level': d, 'unit': s}"));

    let output = ok(ctx.unmarshall(id, &parse_json(r#"{"level": "high", "unit": "%"}"#)));
    let gauge = output.object_ref::<TestObject>().expect("TestObject");
    assert_eq!(gauge.property(0), Value::from("high"));

    let native = Value::object(TestObject::new("Gauge", vec![Value::from(0.5), Value::from("%")]));
    let marshalled = ok(ctx.marshall(id, &native));
    let typed = marshalled.as_proxy_object().expect("proxy").typed_object();
    assert_eq!(typed.property(0), Value::from(0.5));
    assert_eq!(typed.property(1), Value::from("%"));
}

#[test]
fn test_listener_ignores_plain_classes() {
    let ctx = test_context();
    ctx.marshaller_registry()
        .set_listener(Some(Arc::new(DoublesAsStrings)));
    let id = ok(ctx.register_schema_str("c 'Reading'{'level': d}"));

    let err = ctx
        .unmarshall(id, &parse_json(r#"{"level": "high"}"#))
        .unwrap_err();
    assert_eq!(
        err.full_message(),
        "Failed to unmarshall property 'level' of class 'Reading'\n\
         [caused by]: Cannot convert type 'string' to type 'double'"
    );
}

/// Provides `Tag` on first use.
struct LazyTags;

impl SchemaRegistryListener for LazyTags {
    fn resolve_schema_identifier_for_schema_key(
        &self,
        registry: &mut RegistryGuard<'_>,
        key: &SchemaRegistryKey,
    ) -> Result<()> {
        if *key != SchemaRegistryKey::named("Tag") {
            return Err(Error::TypeNotRegistered);
        }
        registry.register_schema(&Schema::parse("c 'Tag'{'label': s}")?)?;
        Ok(())
    }
}

#[test]
fn test_schema_listener_provides_missing_types() {
    let ctx = test_context();
    ctx.schema_registry().set_listener(Some(Arc::new(LazyTags)));
    let id = ok(ctx.register_schema_str("c 'Post'{'tags': a<r:'Tag'>}"));

    let output = ok(ctx.unmarshall(id, &parse_json(r#"{"tags": [{"label": "rust"}]}"#)));
    assert_eq!(
        flatten_value(&output),
        parse_json(
            r#"{"className": "Post", "properties": [[
                {"className": "Tag", "properties": ["rust"]}
            ]]}"#
        )
    );
    assert!(ctx
        .schema_registry()
        .identifier_for_key(&SchemaRegistryKey::named("Tag"))
        .is_some());

    let other = ok(ctx.register_schema_str("c 'Draft'{'author': r:'Author'}"));
    let err = ctx.marshaller(other).unwrap_err();
    assert!(matches!(err.root_cause(), Error::TypeNotRegistered));
}

fn random_record(rng: &mut fastrand::Rng, depth: u32) -> Value {
    let label: String = (0..rng.usize(0..12)).map(|_| rng.alphanumeric()).collect();
    let tags: Vec<Value> = (0..rng.usize(0..4))
        .map(|i| Value::from(format!("tag-{}", i)))
        .collect();
    let parent = if depth > 0 && rng.bool() {
        random_record(rng, depth - 1)
    } else {
        Value::Null
    };

    Value::default()
        .with_map_value("id", Value::from(rng.i32(..)))
        .with_map_value("score", Value::from(rng.f64() * 1000.0))
        .with_map_value("label", Value::from(label))
        .with_map_value("tags", Value::array(tags))
        .with_map_value("parent", parent)
}

#[test]
fn test_random_records_round_trip() {
    let ctx = test_context();
    let id = ok(ctx.register_schema_str(
        "c 'Record'{'id': i, 'score': d, 'label': s, 'tags': a<s>, 'parent': r?:'Record'}",
    ));
    let mut rng = fastrand::Rng::with_seed(0x5eed);

    for _ in 0..64 {
        let input = random_record(&mut rng, 3);
        let native = ok(ctx.unmarshall(id, &input));
        let marshalled = ok(ctx.marshall(id, &native));
        assert_eq!(flatten_value(&marshalled), flatten_value(&input));
    }
}
