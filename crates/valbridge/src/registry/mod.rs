// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Schema registry.
//!
//! Maps schema keys (usually `ref:'Name'`, or `genref:'Name'<...>` for
//! instantiated generics) to schemas and stable [`SchemaIdentifier`]s.
//! Identifiers are indexes into an append-only entry table: unregistering
//! clears the entry but never reuses its slot.
//!
//! All multi-step work happens through a [`RegistryGuard`] obtained from
//! [`SchemaRegistry::lock`], so a resolution that registers intermediate
//! entries is atomic with respect to other threads. The registry listener is
//! invoked while the guard is held and receives it.

mod resolver;

#[cfg(test)]
mod tests;

pub use resolver::{ResolveMode, ResolveOutput, TypeResolver};

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};

use crate::error::{Error, Result};
use crate::schema::{
    GenericTypeReference, Schema, SchemaKind, TypeReference, TypeReferenceHint,
};

/// Stable identifier of a registry entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SchemaIdentifier(u32);

impl SchemaIdentifier {
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }

    fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for SchemaIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lookup key of a registry entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SchemaRegistryKey(Schema);

impl SchemaRegistryKey {
    #[must_use]
    pub fn new(schema: Schema) -> Self {
        Self(schema)
    }

    /// Key `ref:'name'`.
    #[must_use]
    pub fn named(name: &str) -> Self {
        Self(Schema::named(name))
    }

    #[must_use]
    pub fn schema(&self) -> &Schema {
        &self.0
    }

    #[must_use]
    pub fn into_schema(self) -> Schema {
        self.0
    }

    /// Same key with type hints removed and without the boxed flag.
    #[must_use]
    pub fn simplified(&self) -> Self {
        Self(simplify(&self.0).as_unboxed())
    }
}

impl From<Schema> for SchemaRegistryKey {
    fn from(schema: Schema) -> Self {
        Self(schema)
    }
}

impl fmt::Display for SchemaRegistryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

fn simplify_reference(reference: &TypeReference) -> TypeReference {
    reference.clone().with_hint(TypeReferenceHint::Unknown)
}

fn simplify(schema: &Schema) -> Schema {
    match schema.kind() {
        SchemaKind::TypeReference(reference) => Schema::type_reference(simplify_reference(reference))
            .with_flags(schema.is_optional(), schema.is_boxed()),
        SchemaKind::GenericTypeReference(generic) => Schema::new(SchemaKind::GenericTypeReference(
            Arc::new(GenericTypeReference::new(
                simplify_reference(generic.base()),
                generic.arguments().iter().map(simplify).collect(),
            )),
        ))
        .with_flags(schema.is_optional(), schema.is_boxed()),
        _ => schema.clone(),
    }
}

/// Key and schema of a live registry entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaEntry {
    pub key: SchemaRegistryKey,
    pub schema: Schema,
}

/// Provides schemas for keys the registry does not know yet.
pub trait SchemaRegistryListener: Send + Sync {
    /// Register a schema for `key` through `registry`.
    ///
    /// Called while the registry is locked. The key must be registered when
    /// this returns `Ok`.
    fn resolve_schema_identifier_for_schema_key(
        &self,
        registry: &mut RegistryGuard<'_>,
        key: &SchemaRegistryKey,
    ) -> Result<()>;
}

struct RegistryEntry {
    key: Option<SchemaRegistryKey>,
    schema: Schema,
}

#[derive(Default)]
struct RegistryState {
    entries: Vec<RegistryEntry>,
    index_by_key: HashMap<SchemaRegistryKey, SchemaIdentifier>,
    listener: Option<Arc<dyn SchemaRegistryListener>>,
}

/// Thread-safe schema registry.
#[derive(Default)]
pub struct SchemaRegistry {
    inner: Mutex<RegistryState>,
}

impl SchemaRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock the registry for a sequence of operations.
    pub fn lock(&self) -> RegistryGuard<'_> {
        RegistryGuard {
            state: self.inner.lock(),
        }
    }

    /// Register a class or enum under `ref:'Name'`.
    pub fn register_schema(&self, schema: &Schema) -> Result<SchemaIdentifier> {
        self.lock().register_schema(schema)
    }

    pub fn register(&self, key: impl Into<SchemaRegistryKey>, schema: Schema) -> SchemaIdentifier {
        self.lock().register(key.into(), schema)
    }

    #[must_use]
    pub fn schema_for_identifier(&self, identifier: SchemaIdentifier) -> Schema {
        self.lock().schema_for_identifier(identifier)
    }

    #[must_use]
    pub fn identifier_for_key(&self, key: &SchemaRegistryKey) -> Option<SchemaIdentifier> {
        self.lock().identifier_for_key(key)
    }

    #[must_use]
    pub fn all_schemas(&self) -> Vec<Schema> {
        self.lock().all_schemas()
    }

    #[must_use]
    pub fn all_schema_keys(&self) -> Vec<Schema> {
        self.lock().all_schema_keys()
    }

    pub fn set_listener(&self, listener: Option<Arc<dyn SchemaRegistryListener>>) {
        self.lock().set_listener(listener);
    }
}

/// Exclusive access to the registry state.
pub struct RegistryGuard<'a> {
    state: MutexGuard<'a, RegistryState>,
}

impl RegistryGuard<'_> {
    /// Register `schema` under `key`.
    ///
    /// An already-registered key keeps its identifier; its schema is replaced.
    pub fn register(&mut self, key: SchemaRegistryKey, schema: Schema) -> SchemaIdentifier {
        if let Some(&identifier) = self.state.index_by_key.get(&key) {
            self.state.entries[identifier.index()].schema = schema;
            return identifier;
        }

        let identifier = SchemaIdentifier::new(self.state.entries.len() as u32);
        log::debug!("[registry] registering {} as #{}", key, identifier);
        self.state.index_by_key.insert(key.clone(), identifier);
        self.state.entries.push(RegistryEntry {
            key: Some(key),
            schema,
        });
        identifier
    }

    /// Register a class or enum schema under `ref:'Name'`.
    pub fn register_schema(&mut self, schema: &Schema) -> Result<SchemaIdentifier> {
        let name = schema.declared_name().ok_or_else(|| {
            Error::message(format!(
                "Only class and enum schemas can be registered by name, got {}",
                schema
            ))
        })?;
        let key = SchemaRegistryKey::named(name);
        Ok(self.register(key, schema.clone()))
    }

    /// Clear an entry. Its identifier is never reused.
    pub fn unregister(&mut self, identifier: SchemaIdentifier) {
        let state = &mut *self.state;
        let Some(entry) = state.entries.get_mut(identifier.index()) else {
            return;
        };
        entry.schema = Schema::void();
        if let Some(key) = entry.key.take() {
            log::debug!("[registry] unregistering {} (#{})", key, identifier);
            state.index_by_key.remove(&key);
        }
    }

    /// Schema of an entry, `void` when unknown.
    #[must_use]
    pub fn schema_for_identifier(&self, identifier: SchemaIdentifier) -> Schema {
        self.state
            .entries
            .get(identifier.index())
            .map_or_else(Schema::void, |entry| entry.schema.clone())
    }

    /// Key and schema of a live entry.
    #[must_use]
    pub fn schema_and_key_for_identifier(&self, identifier: SchemaIdentifier) -> Option<SchemaEntry> {
        let entry = self.state.entries.get(identifier.index())?;
        let key = entry.key.clone()?;
        Some(SchemaEntry {
            key,
            schema: entry.schema.clone(),
        })
    }

    #[must_use]
    pub fn identifier_for_key(&self, key: &SchemaRegistryKey) -> Option<SchemaIdentifier> {
        self.state.index_by_key.get(key).copied()
    }

    /// Replace the schema of an entry. Unknown identifiers are ignored.
    pub fn update_schema(&mut self, identifier: SchemaIdentifier, schema: Schema) {
        if let Some(entry) = self.state.entries.get_mut(identifier.index()) {
            entry.schema = schema;
        }
    }

    /// Replace the schema registered under `key`, if any.
    pub fn update_schema_if_key_exists(&mut self, key: &SchemaRegistryKey, schema: Schema) -> bool {
        match self.identifier_for_key(key) {
            Some(identifier) => {
                self.update_schema(identifier, schema);
                true
            }
            None => false,
        }
    }

    /// Link to the entry registered under `key`.
    #[must_use]
    pub fn reference_for_key(&self, key: &SchemaRegistryKey) -> Option<Schema> {
        self.identifier_for_key(key)
            .map(|identifier| Schema::schema_reference(key.schema().clone(), identifier))
    }

    /// Schemas of live entries, in registration order.
    #[must_use]
    pub fn all_schemas(&self) -> Vec<Schema> {
        self.state
            .entries
            .iter()
            .filter(|entry| entry.key.is_some())
            .map(|entry| entry.schema.clone())
            .collect()
    }

    /// Keys of live entries, in registration order.
    #[must_use]
    pub fn all_schema_keys(&self) -> Vec<Schema> {
        self.state
            .entries
            .iter()
            .filter_map(|entry| entry.key.as_ref().map(|key| key.schema().clone()))
            .collect()
    }

    pub fn set_listener(&mut self, listener: Option<Arc<dyn SchemaRegistryListener>>) {
        self.state.listener = listener;
    }

    /// Identifier for `key`, resolving it lazily when missing.
    ///
    /// Tries the exact key, then the simplified key (registering the
    /// original key as an alias), then the listener.
    pub fn resolve_identifier(&mut self, key: &SchemaRegistryKey) -> Result<SchemaIdentifier> {
        if let Some(identifier) = self.identifier_for_key(key) {
            return Ok(identifier);
        }

        let simplified = key.simplified();
        if simplified != *key {
            let source = self.resolve_identifier(&simplified)?;
            let mut schema = self.schema_for_identifier(source);
            if key.schema().is_boxed() {
                schema = schema.as_boxed();
            }
            return Ok(self.register(key.clone(), schema));
        }

        let Some(listener) = self.state.listener.clone() else {
            return Err(Error::TypeNotRegistered);
        };

        log::debug!("[registry] asking listener for {}", key);
        listener.resolve_schema_identifier_for_schema_key(self, key)?;
        self.identifier_for_key(key).ok_or(Error::TypeNotRegistered)
    }

    /// Resolve the type references of `schema` against this registry.
    pub fn resolve_type_references(
        &mut self,
        schema: &Schema,
        mode: ResolveMode,
        type_arguments: &[Schema],
    ) -> Result<ResolveOutput> {
        TypeResolver::new(self).resolve(schema, mode, type_arguments)
    }
}
