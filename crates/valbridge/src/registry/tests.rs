// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

use super::*;
use std::sync::atomic::{AtomicUsize, Ordering};

fn parse(text: &str) -> Schema {
    Schema::parse(text).unwrap_or_else(|err| panic!("failed to parse '{}': {}", text, err))
}

fn resolve(registry: &SchemaRegistry, schema: &Schema, arguments: &[Schema]) -> Result<Schema> {
    registry
        .lock()
        .resolve_type_references(schema, ResolveMode::Schema, arguments)
        .map(|output| output.schema)
}

type RegisterCallback = Box<dyn Fn(&mut RegistryGuard<'_>) -> Result<()> + Send + Sync>;

#[derive(Default)]
struct CallbackListener {
    callbacks: Mutex<HashMap<SchemaRegistryKey, RegisterCallback>>,
}

impl CallbackListener {
    fn set_callback(&self, key: SchemaRegistryKey, callback: RegisterCallback) {
        self.callbacks.lock().insert(key, callback);
    }
}

impl SchemaRegistryListener for CallbackListener {
    fn resolve_schema_identifier_for_schema_key(
        &self,
        registry: &mut RegistryGuard<'_>,
        key: &SchemaRegistryKey,
    ) -> Result<()> {
        match self.callbacks.lock().get(key) {
            Some(callback) => callback(registry),
            None => Err(Error::message("Cannot find matching register callback")),
        }
    }
}

#[test]
fn test_register_and_lookup() {
    let registry = SchemaRegistry::new();
    let class = parse("c 'MyClass'{'hello': s}");

    let id = registry.register_schema(&class).expect("register");

    assert_eq!(registry.schema_for_identifier(id), class);
    assert_eq!(
        registry.identifier_for_key(&SchemaRegistryKey::named("MyClass")),
        Some(id)
    );
    assert!(registry.schema_for_identifier(SchemaIdentifier::new(42)).is_void());
    assert!(registry.register_schema(&Schema::int()).is_err());
}

#[test]
fn test_reregistering_keeps_identifier() {
    let registry = SchemaRegistry::new();
    let first = registry.register_schema(&parse("c 'A'{'x': i}")).expect("register");
    let second = registry.register_schema(&parse("c 'A'{'x': s}")).expect("register");

    assert_eq!(first, second);
    assert_eq!(registry.all_schemas(), vec![parse("c 'A'{'x': s}")]);
}

#[test]
fn test_unregister_never_reuses_slot() {
    let registry = SchemaRegistry::new();
    let a = registry.register_schema(&parse("c 'A'{}")).expect("register");

    let mut guard = registry.lock();
    guard.unregister(a);
    assert!(guard.schema_and_key_for_identifier(a).is_none());
    assert!(guard.schema_for_identifier(a).is_void());

    let b = guard.register_schema(&parse("c 'B'{}")).expect("register");
    assert_ne!(a, b);
    assert_eq!(guard.all_schema_keys(), vec![Schema::named("B")]);
}

#[test]
fn test_update_schema_if_key_exists() {
    let registry = SchemaRegistry::new();
    registry.register_schema(&parse("c 'A'{}")).expect("register");

    let mut guard = registry.lock();
    assert!(guard.update_schema_if_key_exists(&SchemaRegistryKey::named("A"), parse("c 'A'{'x': b}")));
    assert!(!guard.update_schema_if_key_exists(&SchemaRegistryKey::named("Z"), parse("c 'Z'{}")));

    let entry = guard
        .schema_and_key_for_identifier(SchemaIdentifier::new(0))
        .expect("entry");
    assert_eq!(entry.key, SchemaRegistryKey::named("A"));
    assert_eq!(entry.schema, parse("c 'A'{'x': b}"));
    assert_eq!(
        guard
            .reference_for_key(&SchemaRegistryKey::named("A"))
            .expect("reference")
            .to_string(),
        "link:ref:'A'"
    );
}

#[test]
fn test_resolves_positional_and_named_references() {
    let registry = SchemaRegistry::new();
    let class = parse("c 'MyClass'{'hello': s}");
    registry.register_schema(&class).expect("register");

    // 1. Positional references take the type argument
    let resolved = resolve(&registry, &parse("r:0"), &[Schema::int()]).expect("resolve");
    assert_eq!(resolved, Schema::int());
    assert!(!resolved.is_boxed());

    // 2. Named references become links
    let resolved = resolve(&registry, &parse("r:'MyClass'"), &[]).expect("resolve");
    let link = resolved.as_schema_reference().expect("link");
    assert_eq!(registry.schema_for_identifier(link.identifier()), class);

    // 3. Optional is preserved
    let resolved = resolve(&registry, &parse("r?:'MyClass'"), &[]).expect("resolve");
    assert!(resolved.is_optional());
    assert!(resolved.as_schema_reference().is_some());
}

#[test]
fn test_missing_type_argument_fails() {
    let registry = SchemaRegistry::new();
    let err = resolve(&registry, &parse("r:1"), &[Schema::int()]).unwrap_err();

    assert!(matches!(err, Error::OutOfBoundsGenericIndex { index: 1, .. }));
    assert_eq!(
        err.to_string(),
        "Missing type argument at position 1 (types arguments are genref:''<int>)"
    );
}

#[test]
fn test_unregistered_type_reports_chain() {
    let registry = SchemaRegistry::new();
    let err = resolve(&registry, &parse("c 'MyObject'{'items': a<r:'Other'>}"), &[]).unwrap_err();

    assert_eq!(
        err.full_message(),
        "Failed to resolve MyObject.items\n[caused by]: Could not resolve type reference \
         'Other'\n[caused by]: Type not registered in ValueSchemaRegistry"
    );
}

#[test]
fn test_listener_registers_missing_types() {
    let registry = SchemaRegistry::new();
    let listener = Arc::new(CallbackListener::default());
    let shared: Arc<dyn SchemaRegistryListener> = listener.clone();
    registry.set_listener(Some(shared));

    let class = parse("c 'MyClass' {'type': r:'MyEnum'}");
    let enumeration = parse("e<s> 'MyEnum' {'good': 'OK', 'bad': 'NOT OK'}");

    // 1. Fails while nobody provides the enum
    assert!(resolve(&registry, &class, &[]).is_err());

    // 2. The listener registers it on demand
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    listener.set_callback(
        SchemaRegistryKey::named("MyEnum"),
        Box::new(move |guard: &mut RegistryGuard<'_>| {
            counter.fetch_add(1, Ordering::SeqCst);
            guard.register_schema(&enumeration).map(|_| ())
        }),
    );

    let resolved = resolve(&registry, &class, &[]).expect("resolve");
    assert_eq!(resolved.to_string(), "class 'MyClass'{'type': link:ref:'MyEnum'}");

    // 3. Already registered, the listener is not asked again
    resolve(&registry, &class, &[]).expect("resolve");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_resolves_nested_references() {
    let registry = SchemaRegistry::new();
    registry
        .register_schema(&parse("c 'MyClass'{'hello': s}"))
        .expect("register");

    let schema = parse(
        "c 'OtherClass'{'myFunction': f(r:1): r:0, 'myArray': a<r:'MyClass'>, \
         'myArrayOfNested': a<c 'Nested'{'otherArray': a<r:1>}>}",
    );

    let resolved = resolve(&registry, &schema, &[Schema::int(), Schema::bool()]).expect("resolve");
    assert_eq!(
        resolved.to_string(),
        "class 'OtherClass'{'myFunction': func(bool): int, 'myArray': array<link:ref:'MyClass'>, \
         'myArrayOfNested': array<class 'Nested'{'otherArray': array<bool>}>}"
    );

    // Boxing of type arguments is preserved
    let resolved = resolve(
        &registry,
        &schema,
        &[Schema::int().as_boxed(), Schema::bool().as_boxed()],
    )
    .expect("resolve");
    assert_eq!(
        resolved.to_string(),
        "class 'OtherClass'{'myFunction': func(bool@): int@, 'myArray': array<link:ref:'MyClass'>, \
         'myArrayOfNested': array<class 'Nested'{'otherArray': array<bool@>}>}"
    );
}

#[test]
fn test_simple_schemas_are_inlined() {
    let registry = SchemaRegistry::new();
    registry.register(Schema::named("Alias"), parse("a<s>"));
    registry.register(Schema::named("Number"), Schema::int());

    assert_eq!(resolve(&registry, &parse("r:'Alias'"), &[]).expect("resolve"), parse("a<s>"));
    // int is not among the inlined kinds
    assert!(resolve(&registry, &parse("r:'Number'"), &[])
        .expect("resolve")
        .as_schema_reference()
        .is_some());
}

#[test]
fn test_hinted_and_boxed_keys_alias_the_plain_entry() {
    let registry = SchemaRegistry::new();
    let enumeration = parse("e<i> 'Status'{'ok': 1}");
    let plain = registry.register_schema(&enumeration).expect("register");

    let resolved = resolve(&registry, &parse("r@<e>:'Status'"), &[]).expect("resolve");
    let link = resolved.as_schema_reference().expect("link");

    assert_ne!(link.identifier(), plain);
    assert_eq!(link.key().to_string(), "ref@<enum>:'Status'");
    assert_eq!(
        registry.schema_for_identifier(link.identifier()),
        enumeration.as_boxed()
    );
}

#[test]
fn test_enum_hint_on_class_fails() {
    let registry = SchemaRegistry::new();
    registry.register_schema(&parse("c 'NotEnum'{}")).expect("register");

    let err = resolve(&registry, &parse("r<e>:'NotEnum'"), &[]).unwrap_err();
    assert!(matches!(err, Error::NotAnEnum { .. }));
}

#[test]
fn test_resolves_generic_with_resolved_value() {
    let registry = SchemaRegistry::new();
    registry
        .register_schema(&parse("c 'Observable'{'value': r:0}"))
        .expect("register");

    let resolved = resolve(
        &registry,
        &parse("c 'Store'{'observable': g:'Observable'<i@>}"),
        &[],
    )
    .expect("resolve");

    assert_eq!(
        resolved.to_string(),
        "class 'Store'{'observable': link:genref:'Observable'<int@>}"
    );
    let keys = registry.all_schema_keys();
    assert_eq!(keys[1].to_string(), "genref:'Observable'<int@>");
    assert_eq!(
        registry.all_schemas()[1].to_string(),
        "class 'Observable'{'value': int@}"
    );
}

#[test]
fn test_resolves_complex_generics() {
    let registry = SchemaRegistry::new();
    let observable = parse("c 'Observable'{'value': r:0, 'value2': r:1}");
    let store = parse(
        "c 'Store'{'observable': g:'Observable'<r:2, r:'Friend'>, \
         'observableOfObservables': g:'Observable'<a<g:'Observable'<r:1, r:0>>, r:2>}",
    );
    let friend = parse("c 'Friend'{'isConnected': f(): g:'Observable'<s, i@>}");
    let friend_store = parse("c 'FriendStore'{'store': g:'Store'<d@, r:'Friend', b>}");

    registry.register_schema(&observable).expect("register");
    registry.register_schema(&store).expect("register");
    registry.register_schema(&friend).expect("register");
    let friend_store_id = registry.register_schema(&friend_store).expect("register");

    let resolved = resolve(&registry, &friend_store, &[]).expect("resolve");
    assert_eq!(
        resolved.to_string(),
        "class 'FriendStore'{'store': link:genref:'Store'<double@, ref:'Friend', bool>}"
    );

    // Registered sources are untouched until explicitly updated
    let schemas = registry.all_schemas();
    assert_eq!(schemas.len(), 8);
    assert_eq!(schemas[0], observable);
    assert_eq!(schemas[3], friend_store);

    registry.lock().update_schema(friend_store_id, resolved);
    let schemas = registry.all_schemas();
    assert_eq!(schemas.len(), 8);

    // Each instantiation gets its own entry
    let rendered: Vec<String> = schemas.iter().map(ToString::to_string).collect();
    assert_eq!(
        rendered[3],
        "class 'FriendStore'{'store': link:genref:'Store'<double@, ref:'Friend', bool>}"
    );
    assert_eq!(
        rendered[4],
        "class 'Store'{'observable': link:genref:'Observable'<bool, ref:'Friend'>, \
         'observableOfObservables': link:genref:'Observable'<array<genref:'Observable'<ref:'Friend', \
         double@>>, bool>}"
    );
    assert_eq!(
        rendered[5],
        "class 'Observable'{'value': bool, 'value2': link:ref:'Friend'}"
    );
    assert_eq!(
        rendered[6],
        "class 'Observable'{'value': array<link:genref:'Observable'<ref:'Friend', double@>>, \
         'value2': bool}"
    );
    assert_eq!(
        rendered[7],
        "class 'Observable'{'value': link:ref:'Friend', 'value2': double@}"
    );

    let keys: Vec<String> = registry
        .all_schema_keys()
        .iter()
        .map(ToString::to_string)
        .collect();
    assert_eq!(
        keys,
        vec![
            "ref:'Observable'",
            "ref:'Store'",
            "ref:'Friend'",
            "ref:'FriendStore'",
            "genref:'Store'<double@, ref:'Friend', bool>",
            "genref:'Observable'<bool, ref:'Friend'>",
            "genref:'Observable'<array<genref:'Observable'<ref:'Friend', double@>>, bool>",
            "genref:'Observable'<ref:'Friend', double@>",
        ]
    );

    // Resolving again reuses the instantiations
    resolve(&registry, &friend_store, &[]).expect("resolve");
    assert_eq!(registry.all_schemas().len(), 8);
}

#[test]
fn test_recursive_generic_terminates() {
    let registry = SchemaRegistry::new();
    registry
        .register_schema(&parse("c 'Node'{'value': r:0, 'next': g?:'Node'<r:0>}"))
        .expect("register");

    let resolved = resolve(&registry, &parse("g:'Node'<s>"), &[]).expect("resolve");
    assert_eq!(resolved.to_string(), "link:genref:'Node'<string>");
    assert_eq!(
        registry.all_schemas()[1].to_string(),
        "class 'Node'{'value': string, 'next': link?:genref:'Node'<string>}"
    );
}

#[test]
fn test_failed_instantiation_is_unregistered() {
    let registry = SchemaRegistry::new();
    registry
        .register_schema(&parse("c 'Box'{'value': r:0, 'other': r:'Missing'}"))
        .expect("register");

    assert!(resolve(&registry, &parse("g:'Box'<i>"), &[]).is_err());
    assert_eq!(registry.all_schema_keys(), vec![Schema::named("Box")]);
}

#[test]
fn test_key_mode_needs_no_registry() {
    let key = TypeResolver::without_registry()
        .resolve(&parse("g:'Observable'<r:0>"), ResolveMode::Key, &[Schema::string()])
        .expect("resolve");
    assert!(key.changed);
    assert_eq!(key.schema.to_string(), "genref:'Observable'<string>");

    let err = TypeResolver::without_registry()
        .resolve(&parse("r:'A'"), ResolveMode::Schema, &[])
        .unwrap_err();
    assert_eq!(err.to_string(), "Cannot resolve schema without a registry instance");
}
