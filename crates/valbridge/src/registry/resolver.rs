// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Type reference resolution.
//!
//! Two modes walk a schema and rewrite its references:
//!
//! - [`ResolveMode::Key`] produces the canonical registry key of a schema:
//!   positional references are substituted with the current type
//!   arguments and links are replaced by their keys.
//! - [`ResolveMode::Schema`] additionally replaces named references by
//!   registry links (or by the referenced schema inline when it is simple)
//!   and instantiates generics as their own registry entries.
//!
//! An instantiated generic is registered under its key *before* its base
//! schema is resolved, so a generic that refers to itself terminates.

use std::sync::Arc;

use super::{RegistryGuard, SchemaIdentifier, SchemaRegistryKey};
use crate::error::{Error, Result, ResultExt};
use crate::schema::{
    ClassSchema, FunctionSchema, GenericTypeReference, Schema, SchemaKind, TypeReference,
    TypeReferenceHint, TypeReferenceTarget,
};

/// What a resolution produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveMode {
    /// Canonical registry key.
    Key,
    /// Schema with references linked to registry entries.
    Schema,
}

/// Resolved schema and whether it differs from the input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolveOutput {
    pub schema: Schema,
    pub changed: bool,
}

impl ResolveOutput {
    fn changed(schema: Schema) -> Self {
        Self {
            schema,
            changed: true,
        }
    }

    fn unchanged(schema: &Schema) -> Self {
        Self {
            schema: schema.clone(),
            changed: false,
        }
    }
}

/// Walks schemas and rewrites their type references.
pub struct TypeResolver<'g, 'r> {
    registry: Option<&'g mut RegistryGuard<'r>>,
}

impl<'g, 'r> TypeResolver<'g, 'r> {
    #[must_use]
    pub fn new(registry: &'g mut RegistryGuard<'r>) -> Self {
        Self {
            registry: Some(registry),
        }
    }

    /// A resolver limited to [`ResolveMode::Key`].
    #[must_use]
    pub fn without_registry() -> Self {
        Self { registry: None }
    }

    /// Resolve `schema`, substituting positional references with
    /// `type_arguments`.
    pub fn resolve(
        &mut self,
        schema: &Schema,
        mode: ResolveMode,
        type_arguments: &[Schema],
    ) -> Result<ResolveOutput> {
        let starting_key = if type_arguments.is_empty() {
            Schema::void()
        } else {
            Schema::generic_type_reference(TypeReference::named(""), type_arguments.to_vec())
        };
        self.resolve_in(&starting_key, mode, schema)
    }

    fn registry(&mut self) -> Result<&mut RegistryGuard<'r>> {
        self.registry
            .as_deref_mut()
            .ok_or_else(|| Error::message("Cannot resolve schema without a registry instance"))
    }

    fn resolve_in(
        &mut self,
        current_key: &Schema,
        mode: ResolveMode,
        schema: &Schema,
    ) -> Result<ResolveOutput> {
        let mut output = self.resolve_inner(current_key, mode, schema)?;
        if schema.is_optional() && !output.schema.is_optional() {
            output.schema = output.schema.as_optional();
            output.changed = true;
        }
        if schema.is_boxed() && !output.schema.is_boxed() {
            output.schema = output.schema.as_boxed();
            output.changed = true;
        }
        Ok(output)
    }

    fn resolve_inner(
        &mut self,
        current_key: &Schema,
        mode: ResolveMode,
        schema: &Schema,
    ) -> Result<ResolveOutput> {
        match schema.kind() {
            SchemaKind::TypeReference(reference) => {
                self.resolve_type_reference(current_key, mode, reference, schema.is_boxed())
            }
            SchemaKind::GenericTypeReference(generic) => {
                self.resolve_generic(current_key, mode, generic, schema.is_boxed())
            }
            SchemaKind::Function(function) => self.resolve_function(current_key, mode, schema, function),
            SchemaKind::Class(class) => self.resolve_class(current_key, mode, schema, class),
            SchemaKind::Array(item) => {
                let item = self.resolve_in(current_key, mode, item)?;
                Ok(if item.changed {
                    ResolveOutput::changed(Schema::array(item.schema))
                } else {
                    ResolveOutput::unchanged(schema)
                })
            }
            SchemaKind::Promise(item) => {
                let item = self.resolve_in(current_key, mode, item)?;
                Ok(if item.changed {
                    ResolveOutput::changed(Schema::promise(item.schema))
                } else {
                    ResolveOutput::unchanged(schema)
                })
            }
            SchemaKind::Es6Set(item) => {
                let item = self.resolve_in(current_key, mode, item)?;
                Ok(if item.changed {
                    ResolveOutput::changed(Schema::es6_set(item.schema))
                } else {
                    ResolveOutput::unchanged(schema)
                })
            }
            SchemaKind::Map(key, value) => {
                let key = self.resolve_in(current_key, mode, key)?;
                let value = self.resolve_in(current_key, mode, value)?;
                Ok(if key.changed || value.changed {
                    ResolveOutput::changed(Schema::map(key.schema, value.schema))
                } else {
                    ResolveOutput::unchanged(schema)
                })
            }
            SchemaKind::Es6Map(key, value) => {
                let key = self.resolve_in(current_key, mode, key)?;
                let value = self.resolve_in(current_key, mode, value)?;
                Ok(if key.changed || value.changed {
                    ResolveOutput::changed(Schema::es6_map(key.schema, value.schema))
                } else {
                    ResolveOutput::unchanged(schema)
                })
            }
            SchemaKind::SchemaReference(reference) if mode == ResolveMode::Key => {
                Ok(ResolveOutput::changed(reference.key().clone()))
            }
            _ => Ok(ResolveOutput::unchanged(schema)),
        }
    }

    fn resolve_function(
        &mut self,
        current_key: &Schema,
        mode: ResolveMode,
        schema: &Schema,
        function: &FunctionSchema,
    ) -> Result<ResolveOutput> {
        let return_output = self
            .resolve_in(current_key, mode, function.return_schema())
            .context("Failed to resolve return value")?;

        let mut changed = return_output.changed;
        let mut parameters = Vec::with_capacity(function.parameters().len());
        for (i, parameter) in function.parameters().iter().enumerate() {
            let output = self
                .resolve_in(current_key, mode, parameter)
                .with_context(|| format!("Failed to resolve parameter at index {}", i))?;
            changed |= output.changed;
            parameters.push(output.schema);
        }

        if !changed {
            return Ok(ResolveOutput::unchanged(schema));
        }
        Ok(ResolveOutput::changed(Schema::function(FunctionSchema::new(
            function.attributes(),
            return_output.schema,
            parameters,
        ))))
    }

    fn resolve_class(
        &mut self,
        current_key: &Schema,
        mode: ResolveMode,
        schema: &Schema,
        class: &ClassSchema,
    ) -> Result<ResolveOutput> {
        let mut changed = false;
        let mut property_schemas = Vec::with_capacity(class.properties().len());
        for property in class.properties() {
            let output = self
                .resolve_in(current_key, mode, property.schema())
                .with_context(|| format!("Failed to resolve {}.{}", class.name(), property.name()))?;
            changed |= output.changed;
            property_schemas.push(output.schema);
        }

        if !changed {
            return Ok(ResolveOutput::unchanged(schema));
        }
        Ok(ResolveOutput::changed(Schema::class(
            class.with_property_schemas(property_schemas),
        )))
    }

    fn resolve_type_reference(
        &mut self,
        current_key: &Schema,
        mode: ResolveMode,
        reference: &TypeReference,
        boxed: bool,
    ) -> Result<ResolveOutput> {
        let name = match reference.target() {
            TypeReferenceTarget::Positional(index) => {
                let argument = type_argument(current_key, *index)?;
                let output = self.resolve_in(current_key, mode, &argument)?;
                let schema = if boxed {
                    output.schema.as_boxed()
                } else {
                    output.schema
                };
                return Ok(ResolveOutput::changed(schema));
            }
            TypeReferenceTarget::Named(name) => name,
        };

        let mut key = Schema::type_reference(reference.clone());
        if boxed {
            key = key.as_boxed();
        }

        if mode == ResolveMode::Key {
            return Ok(ResolveOutput::changed(key));
        }

        let registry = self.registry()?;
        let key = SchemaRegistryKey::from(key);
        let identifier =
            registry
                .resolve_identifier(&key)
                .map_err(|cause| Error::UnresolvedTypeReference {
                    name: name.to_string(),
                    cause: Box::new(cause),
                })?;

        if reference.hint() == TypeReferenceHint::Enum
            && registry.schema_for_identifier(identifier).as_enum().is_none()
        {
            return Err(Error::NotAnEnum {
                name: name.to_string(),
            });
        }

        Ok(ResolveOutput::changed(schema_from_reference(
            registry, &key, identifier,
        )))
    }

    fn resolve_generic(
        &mut self,
        current_key: &Schema,
        mode: ResolveMode,
        generic: &Arc<GenericTypeReference>,
        boxed: bool,
    ) -> Result<ResolveOutput> {
        let mut arguments = Vec::with_capacity(generic.arguments().len());
        for (i, argument) in generic.arguments().iter().enumerate() {
            let output = self
                .resolve_in(current_key, ResolveMode::Key, argument)
                .with_context(|| format!("Could not resolve type argument at position {}", i))?;
            arguments.push(output.schema);
        }

        let mut new_key = Schema::generic_type_reference(generic.base().clone(), arguments);
        if boxed {
            new_key = new_key.as_boxed();
        }

        if mode == ResolveMode::Key {
            return Ok(ResolveOutput::changed(new_key));
        }

        let base = self.resolve_type_reference(&new_key, ResolveMode::Schema, generic.base(), boxed)?;
        let Some(base_reference) = base.schema.as_schema_reference().cloned() else {
            // Fully resolved inline, nothing to instantiate.
            return Ok(ResolveOutput::changed(base.schema));
        };

        let registry_key = SchemaRegistryKey::from(new_key.clone());
        let registry = self.registry()?;
        if let Some(identifier) = registry.identifier_for_key(&registry_key) {
            return Ok(ResolveOutput::changed(schema_from_reference(
                registry,
                &registry_key,
                identifier,
            )));
        }

        log::debug!("[registry] instantiating {}", registry_key);
        let base_schema = registry.schema_for_identifier(base_reference.identifier());
        let identifier = registry.register(registry_key.clone(), base_schema.clone());

        match self.resolve_in(&new_key, ResolveMode::Schema, &base_schema) {
            Ok(output) => {
                let registry = self.registry()?;
                registry.update_schema(identifier, output.schema);
                Ok(ResolveOutput::changed(schema_from_reference(
                    registry,
                    &registry_key,
                    identifier,
                )))
            }
            Err(err) => {
                self.registry()?.unregister(identifier);
                Err(err)
            }
        }
    }
}

fn type_argument(current_key: &Schema, index: usize) -> Result<Schema> {
    current_key
        .as_generic_type_reference()
        .and_then(|generic| generic.arguments().get(index).cloned())
        .ok_or_else(|| Error::OutOfBoundsGenericIndex {
            index,
            arguments: current_key.to_string(),
        })
}

/// Simple schemas are inlined rather than linked.
fn should_use_schema_reference(schema: &Schema) -> bool {
    match schema.kind() {
        SchemaKind::Untyped
        | SchemaKind::String
        | SchemaKind::Long
        | SchemaKind::Double
        | SchemaKind::Bool
        | SchemaKind::TypedArray => false,
        SchemaKind::Array(item) => should_use_schema_reference(item),
        _ => true,
    }
}

fn schema_from_reference(
    registry: &RegistryGuard<'_>,
    key: &SchemaRegistryKey,
    identifier: SchemaIdentifier,
) -> Schema {
    let schema = registry.schema_for_identifier(identifier);
    if should_use_schema_reference(&schema) {
        Schema::schema_reference(key.schema().clone(), identifier)
    } else {
        schema
    }
}
