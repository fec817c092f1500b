// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Immutable schema model.
//!
//! A [`Schema`] describes the shape of a value: a primitive, a class or
//! interface, an enum, a function, a collection, or a reference to another
//! registered schema. Every schema additionally carries two flags:
//!
//! - **optional**: null/undefined is an accepted value
//! - **boxed**: primitives travel as host objects rather than raw values
//!
//! # Text form
//!
//! Schemas are usually written in a compact grammar and parsed with
//! [`Schema::parse`]:
//!
//! ```text
//! c 'User'{'name': s, 'age': i?}       class
//! c+ 'Listener'{'onEvent': f*(s)}      interface
//! e<i> 'Status'{'ok': 200}             enum
//! g:'Observable'<r:'User'>             generic instantiation
//! ```
//!
//! # Example
//!
//! ```
//! use valbridge::Schema;
//!
//! let schema = Schema::parse("a?<l>").unwrap();
//! assert_eq!(schema.to_string(), "array?<long>");
//! assert_eq!(Schema::parse(&schema.to_short_string()).unwrap(), schema);
//! ```

mod display;
mod parser;


use std::sync::Arc;

use crate::error::Result;
use crate::registry::SchemaIdentifier;
use crate::value::Value;

/// Shape of a value plus its optional/boxed flags.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Schema {
    kind: SchemaKind,
    optional: bool,
    boxed: bool,
}

/// Variant of a [`Schema`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SchemaKind {
    Untyped,
    Void,
    Int,
    Long,
    Double,
    Bool,
    String,
    TypedArray,
    Date,
    TypeReference(TypeReference),
    GenericTypeReference(Arc<GenericTypeReference>),
    Class(Arc<ClassSchema>),
    Enum(Arc<EnumSchema>),
    Function(Arc<FunctionSchema>),
    Array(Arc<Schema>),
    Map(Arc<Schema>, Arc<Schema>),
    Es6Map(Arc<Schema>, Arc<Schema>),
    Es6Set(Arc<Schema>),
    Promise(Arc<Schema>),
    /// Link to a registered schema, produced by type resolution.
    SchemaReference(Arc<SchemaReference>),
}

/// What a type reference is expected to resolve to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TypeReferenceHint {
    #[default]
    Unknown,
    Object,
    Enum,
    Converted,
}

/// Target of a type reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeReferenceTarget {
    /// A registered type name.
    Named(Arc<str>),
    /// A generic type argument position.
    Positional(usize),
}

/// Reference to a named type or to a generic type argument.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeReference {
    hint: TypeReferenceHint,
    target: TypeReferenceTarget,
}

impl TypeReference {
    #[must_use]
    pub fn named(name: impl Into<Arc<str>>) -> Self {
        Self {
            hint: TypeReferenceHint::Unknown,
            target: TypeReferenceTarget::Named(name.into()),
        }
    }

    #[must_use]
    pub fn positional(index: usize) -> Self {
        Self {
            hint: TypeReferenceHint::Unknown,
            target: TypeReferenceTarget::Positional(index),
        }
    }

    #[must_use]
    pub fn with_hint(mut self, hint: TypeReferenceHint) -> Self {
        self.hint = hint;
        self
    }

    #[must_use]
    pub fn hint(&self) -> TypeReferenceHint {
        self.hint
    }

    #[must_use]
    pub fn target(&self) -> &TypeReferenceTarget {
        &self.target
    }

    /// Name of a named reference.
    #[must_use]
    pub fn name(&self) -> Option<&Arc<str>> {
        match &self.target {
            TypeReferenceTarget::Named(name) => Some(name),
            TypeReferenceTarget::Positional(_) => None,
        }
    }

    /// Index of a positional reference.
    #[must_use]
    pub fn position(&self) -> Option<usize> {
        match &self.target {
            TypeReferenceTarget::Positional(index) => Some(*index),
            TypeReferenceTarget::Named(_) => None,
        }
    }
}

/// A generic base type instantiated with type arguments.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GenericTypeReference {
    base: TypeReference,
    arguments: Vec<Schema>,
}

impl GenericTypeReference {
    #[must_use]
    pub fn new(base: TypeReference, arguments: Vec<Schema>) -> Self {
        Self { base, arguments }
    }

    #[must_use]
    pub fn base(&self) -> &TypeReference {
        &self.base
    }

    #[must_use]
    pub fn arguments(&self) -> &[Schema] {
        &self.arguments
    }
}

/// Named property of a class.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClassProperty {
    name: Arc<str>,
    schema: Schema,
}

impl ClassProperty {
    #[must_use]
    pub fn new(name: impl Into<Arc<str>>, schema: Schema) -> Self {
        Self {
            name: name.into(),
            schema,
        }
    }

    #[must_use]
    pub fn name(&self) -> &Arc<str> {
        &self.name
    }

    #[must_use]
    pub fn schema(&self) -> &Schema {
        &self.schema
    }
}

/// Class or interface with ordered properties.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClassSchema {
    name: Arc<str>,
    is_interface: bool,
    properties: Vec<ClassProperty>,
}

impl ClassSchema {
    #[must_use]
    pub fn new(name: impl Into<Arc<str>>, is_interface: bool, properties: Vec<ClassProperty>) -> Self {
        Self {
            name: name.into(),
            is_interface,
            properties,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn name_arc(&self) -> &Arc<str> {
        &self.name
    }

    #[must_use]
    pub fn is_interface(&self) -> bool {
        self.is_interface
    }

    #[must_use]
    pub fn properties(&self) -> &[ClassProperty] {
        &self.properties
    }

    #[must_use]
    pub fn property(&self, index: usize) -> Option<&ClassProperty> {
        self.properties.get(index)
    }

    #[must_use]
    pub fn property_index(&self, name: &str) -> Option<usize> {
        self.properties.iter().position(|p| &*p.name == name)
    }

    /// Same class with replaced property schemas, in order.
    #[must_use]
    pub fn with_property_schemas(&self, schemas: Vec<Schema>) -> Self {
        let properties = self
            .properties
            .iter()
            .zip(schemas)
            .map(|(p, schema)| ClassProperty::new(Arc::clone(&p.name), schema))
            .collect();
        Self::new(Arc::clone(&self.name), self.is_interface, properties)
    }
}

/// Enum case with its raw value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EnumCase {
    name: Arc<str>,
    value: Value,
}

impl EnumCase {
    #[must_use]
    pub fn new(name: impl Into<Arc<str>>, value: Value) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn value(&self) -> &Value {
        &self.value
    }
}

/// Enum with its case representation schema.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EnumSchema {
    name: Arc<str>,
    case_schema: Schema,
    cases: Vec<EnumCase>,
}

impl EnumSchema {
    #[must_use]
    pub fn new(name: impl Into<Arc<str>>, case_schema: Schema, cases: Vec<EnumCase>) -> Self {
        Self {
            name: name.into(),
            case_schema,
            cases,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn case_schema(&self) -> &Schema {
        &self.case_schema
    }

    #[must_use]
    pub fn cases(&self) -> &[EnumCase] {
        &self.cases
    }

    #[must_use]
    pub fn case(&self, index: usize) -> Option<&EnumCase> {
        self.cases.get(index)
    }

    /// Index of the case whose raw value equals `value`.
    ///
    /// Linear in the number of cases.
    #[must_use]
    pub fn case_index_for_value(&self, value: &Value) -> Option<usize> {
        self.cases.iter().position(|case| case.value == *value)
    }
}

/// Function attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FunctionAttributes {
    /// The function is bound to its receiver.
    pub is_method: bool,
    /// The function may only be called once.
    pub is_single_call: bool,
    /// Calls are dispatched to the worker queue.
    pub dispatch_to_worker: bool,
}

impl FunctionAttributes {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        !self.is_method && !self.is_single_call && !self.dispatch_to_worker
    }
}

/// Function signature.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FunctionSchema {
    attributes: FunctionAttributes,
    return_schema: Schema,
    parameters: Vec<Schema>,
}

impl FunctionSchema {
    #[must_use]
    pub fn new(attributes: FunctionAttributes, return_schema: Schema, parameters: Vec<Schema>) -> Self {
        Self {
            attributes,
            return_schema,
            parameters,
        }
    }

    #[must_use]
    pub fn attributes(&self) -> FunctionAttributes {
        self.attributes
    }

    #[must_use]
    pub fn return_schema(&self) -> &Schema {
        &self.return_schema
    }

    #[must_use]
    pub fn parameters(&self) -> &[Schema] {
        &self.parameters
    }

    #[must_use]
    pub fn with_attributes(&self, attributes: FunctionAttributes) -> Self {
        Self {
            attributes,
            return_schema: self.return_schema.clone(),
            parameters: self.parameters.clone(),
        }
    }
}

/// Link from a schema position to a registry entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SchemaReference {
    key: Schema,
    identifier: SchemaIdentifier,
}

impl SchemaReference {
    #[must_use]
    pub fn new(key: Schema, identifier: SchemaIdentifier) -> Self {
        Self { key, identifier }
    }

    /// Registry key of the linked schema.
    #[must_use]
    pub fn key(&self) -> &Schema {
        &self.key
    }

    #[must_use]
    pub fn identifier(&self) -> SchemaIdentifier {
        self.identifier
    }
}

// ---------------------------------------------------------------------------
// Construction
// ---------------------------------------------------------------------------

impl Schema {
    #[must_use]
    pub fn new(kind: SchemaKind) -> Self {
        Self {
            kind,
            optional: false,
            boxed: false,
        }
    }

    #[must_use]
    pub fn untyped() -> Self {
        Self::new(SchemaKind::Untyped)
    }

    #[must_use]
    pub fn void() -> Self {
        Self::new(SchemaKind::Void)
    }

    #[must_use]
    pub fn int() -> Self {
        Self::new(SchemaKind::Int)
    }

    #[must_use]
    pub fn long() -> Self {
        Self::new(SchemaKind::Long)
    }

    #[must_use]
    pub fn double() -> Self {
        Self::new(SchemaKind::Double)
    }

    #[must_use]
    pub fn bool() -> Self {
        Self::new(SchemaKind::Bool)
    }

    #[must_use]
    pub fn string() -> Self {
        Self::new(SchemaKind::String)
    }

    #[must_use]
    pub fn typed_array() -> Self {
        Self::new(SchemaKind::TypedArray)
    }

    #[must_use]
    pub fn date() -> Self {
        Self::new(SchemaKind::Date)
    }

    #[must_use]
    pub fn type_reference(reference: TypeReference) -> Self {
        Self::new(SchemaKind::TypeReference(reference))
    }

    /// `ref:'name'`.
    #[must_use]
    pub fn named(name: impl Into<Arc<str>>) -> Self {
        Self::type_reference(TypeReference::named(name))
    }

    #[must_use]
    pub fn generic_type_reference(base: TypeReference, arguments: Vec<Schema>) -> Self {
        Self::new(SchemaKind::GenericTypeReference(Arc::new(
            GenericTypeReference::new(base, arguments),
        )))
    }

    #[must_use]
    pub fn class(class: ClassSchema) -> Self {
        Self::new(SchemaKind::Class(Arc::new(class)))
    }

    #[must_use]
    pub fn enumeration(schema: EnumSchema) -> Self {
        Self::new(SchemaKind::Enum(Arc::new(schema)))
    }

    #[must_use]
    pub fn function(schema: FunctionSchema) -> Self {
        Self::new(SchemaKind::Function(Arc::new(schema)))
    }

    #[must_use]
    pub fn array(item: Schema) -> Self {
        Self::new(SchemaKind::Array(Arc::new(item)))
    }

    #[must_use]
    pub fn map(key: Schema, value: Schema) -> Self {
        Self::new(SchemaKind::Map(Arc::new(key), Arc::new(value)))
    }

    #[must_use]
    pub fn es6_map(key: Schema, value: Schema) -> Self {
        Self::new(SchemaKind::Es6Map(Arc::new(key), Arc::new(value)))
    }

    #[must_use]
    pub fn es6_set(item: Schema) -> Self {
        Self::new(SchemaKind::Es6Set(Arc::new(item)))
    }

    #[must_use]
    pub fn promise(value: Schema) -> Self {
        Self::new(SchemaKind::Promise(Arc::new(value)))
    }

    #[must_use]
    pub fn schema_reference(key: Schema, identifier: SchemaIdentifier) -> Self {
        Self::new(SchemaKind::SchemaReference(Arc::new(SchemaReference::new(
            key, identifier,
        ))))
    }

    /// Parse the compact text form.
    pub fn parse(text: &str) -> Result<Self> {
        parser::parse(text)
    }
}

// ---------------------------------------------------------------------------
// Flags
// ---------------------------------------------------------------------------

impl Schema {
    #[must_use]
    pub fn is_optional(&self) -> bool {
        self.optional
    }

    #[must_use]
    pub fn is_boxed(&self) -> bool {
        self.boxed
    }

    #[must_use]
    pub fn as_optional(&self) -> Self {
        self.clone().with_flags(true, self.boxed)
    }

    #[must_use]
    pub fn as_non_optional(&self) -> Self {
        self.clone().with_flags(false, self.boxed)
    }

    #[must_use]
    pub fn as_boxed(&self) -> Self {
        self.clone().with_flags(self.optional, true)
    }

    #[must_use]
    pub fn as_unboxed(&self) -> Self {
        self.clone().with_flags(self.optional, false)
    }

    #[must_use]
    pub fn with_flags(mut self, optional: bool, boxed: bool) -> Self {
        self.optional = optional;
        self.boxed = boxed;
        self
    }
}

// ---------------------------------------------------------------------------
// Accessors
// ---------------------------------------------------------------------------

impl Schema {
    #[must_use]
    pub fn kind(&self) -> &SchemaKind {
        &self.kind
    }

    #[must_use]
    pub fn is_void(&self) -> bool {
        matches!(self.kind, SchemaKind::Void)
    }

    #[must_use]
    pub fn is_untyped(&self) -> bool {
        matches!(self.kind, SchemaKind::Untyped)
    }

    #[must_use]
    pub fn is_promise(&self) -> bool {
        matches!(self.kind, SchemaKind::Promise(_))
    }

    #[must_use]
    pub fn as_class(&self) -> Option<&Arc<ClassSchema>> {
        match &self.kind {
            SchemaKind::Class(class) => Some(class),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_enum(&self) -> Option<&Arc<EnumSchema>> {
        match &self.kind {
            SchemaKind::Enum(schema) => Some(schema),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_function(&self) -> Option<&Arc<FunctionSchema>> {
        match &self.kind {
            SchemaKind::Function(schema) => Some(schema),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_type_reference(&self) -> Option<&TypeReference> {
        match &self.kind {
            SchemaKind::TypeReference(reference) => Some(reference),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_generic_type_reference(&self) -> Option<&Arc<GenericTypeReference>> {
        match &self.kind {
            SchemaKind::GenericTypeReference(reference) => Some(reference),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_schema_reference(&self) -> Option<&Arc<SchemaReference>> {
        match &self.kind {
            SchemaKind::SchemaReference(reference) => Some(reference),
            _ => None,
        }
    }

    #[must_use]
    pub fn array_item(&self) -> Option<&Schema> {
        match &self.kind {
            SchemaKind::Array(item) => Some(item),
            _ => None,
        }
    }

    /// Class and enum schemas are registered under `ref:'Name'`.
    #[must_use]
    pub fn declared_name(&self) -> Option<&str> {
        match &self.kind {
            SchemaKind::Class(class) => Some(class.name()),
            SchemaKind::Enum(schema) => Some(schema.name()),
            _ => None,
        }
    }
}
