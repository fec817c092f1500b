// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Marshaller compilation and cache.
//!
//! Compiling a schema key proceeds depth first:
//!
//! 1. schema links become indirect nodes, queued and patched once the
//!    top-level node is complete (FIFO);
//! 2. a cached key returns its node;
//! 3. otherwise the schema's type references are resolved, an arena slot is
//!    reserved and cached under the key, children are compiled, and the
//!    node fills the slot. The key is then appended to the ordered key list.
//!
//! When any step fails, every cache entry, key and slot added during the
//! call is dropped along with its pending indirect nodes.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;

use super::class::{ClassDelegate, EnumClass, FunctionClass, ObjectClass};
use super::node::{ClassNode, IndirectNode, MarshallerNode, Primitive};
use super::trampoline::FunctionTrampoline;
use super::{MarshallerCore, MarshallerId, ValueMarshaller};
use crate::delegate::{
    EnumClassDelegate, ObjectClassDelegate, PlatformValue, PlatformValueDelegate,
};
use crate::dispatch::DispatchQueue;
use crate::error::{Error, Result, ResultExt};
use crate::registry::{
    RegistryGuard, ResolveMode, SchemaIdentifier, SchemaRegistry, SchemaRegistryKey, TypeResolver,
};
use crate::schema::{ClassSchema, EnumSchema, Schema, SchemaKind, SchemaReference};

/// Hook around the conversions of a registered type.
///
/// Registered per type key; generic instantiations share the processor of
/// their base type.
pub trait MarshallerProcessor<P: PlatformValue>: Send + Sync {
    /// Transform a platform value before it is marshalled.
    fn preprocess(&self, receiver: Option<&P>, value: &P) -> Result<P>;

    /// Transform a platform value after it was unmarshalled.
    fn postprocess(&self, value: P) -> Result<P>;
}

/// Customizes how interface properties are compiled.
pub trait MarshallerRegistryListener: Send + Sync {
    /// Schema used when unmarshalling an interface property. Returning a
    /// schema different from `schema` compiles an unbalanced property.
    fn schema_for_interface_property_unmarshaller(&self, schema: &Schema) -> Schema;
}

/// A compiled marshaller and the resolved schema it was compiled from.
pub struct MarshallerWithSchema<P: PlatformValue> {
    pub marshaller: ValueMarshaller<P>,
    pub schema: Schema,
}

impl<P: PlatformValue> Clone for MarshallerWithSchema<P> {
    fn clone(&self) -> Self {
        Self {
            marshaller: self.marshaller.clone(),
            schema: self.schema.clone(),
        }
    }
}

#[derive(Clone)]
struct Compiled {
    id: MarshallerId,
    schema: Schema,
}

struct PendingIndirect {
    id: MarshallerId,
    key: SchemaRegistryKey,
    identifier: SchemaIdentifier,
}

struct CacheState<P: PlatformValue> {
    by_key: HashMap<SchemaRegistryKey, Compiled>,
    /// Top-level requests that compiled to a link, so repeated requests
    /// return the same indirect node.
    links_by_key: HashMap<SchemaRegistryKey, Compiled>,
    keys: Vec<Schema>,
    processors: HashMap<SchemaRegistryKey, Arc<dyn MarshallerProcessor<P>>>,
    pending: VecDeque<PendingIndirect>,
    object_classes: HashMap<Arc<str>, Arc<dyn ObjectClassDelegate<P>>>,
    enum_classes: HashMap<Arc<str>, Arc<dyn EnumClassDelegate<P>>>,
    listener: Option<Arc<dyn MarshallerRegistryListener>>,
}

impl<P: PlatformValue> Default for CacheState<P> {
    fn default() -> Self {
        Self {
            by_key: HashMap::new(),
            links_by_key: HashMap::new(),
            keys: Vec::new(),
            processors: HashMap::new(),
            pending: VecDeque::new(),
            object_classes: HashMap::new(),
            enum_classes: HashMap::new(),
            listener: None,
        }
    }
}

/// Compiles schemas into marshallers and caches them by schema key.
pub struct MarshallerRegistry<P: PlatformValue> {
    schemas: Arc<SchemaRegistry>,
    core: Arc<MarshallerCore<P>>,
    worker_queue: Option<Arc<dyn DispatchQueue>>,
    state: Mutex<CacheState<P>>,
}

impl<P: PlatformValue> MarshallerRegistry<P> {
    /// Registry compiling against `schemas`.
    ///
    /// Functions returning promises, or carrying the worker attribute, are
    /// called on `worker_queue` when one is given.
    pub fn new(
        schemas: Arc<SchemaRegistry>,
        delegate: Arc<dyn PlatformValueDelegate<P>>,
        worker_queue: Option<Arc<dyn DispatchQueue>>,
    ) -> Self {
        Self {
            schemas,
            core: Arc::new(MarshallerCore::new(delegate)),
            worker_queue,
            state: Mutex::new(CacheState::default()),
        }
    }

    #[must_use]
    pub fn schema_registry(&self) -> &Arc<SchemaRegistry> {
        &self.schemas
    }

    #[must_use]
    pub fn delegate(&self) -> &dyn PlatformValueDelegate<P> {
        self.core.delegate()
    }

    /// Next identifier handed to a new proxy.
    pub fn next_proxy_id(&self) -> u32 {
        self.core.next_proxy_id()
    }

    /// Marshaller for `schema` registered under `key`, compiled on first use.
    ///
    /// `registry` must be a guard of this registry's schema registry.
    pub fn get_value_marshaller(
        &self,
        registry: &mut RegistryGuard<'_>,
        key: &SchemaRegistryKey,
        schema: &Schema,
    ) -> Result<MarshallerWithSchema<P>> {
        let mut state = self.state.lock();
        if let Some(compiled) = state.links_by_key.get(key) {
            return Ok(MarshallerWithSchema {
                marshaller: self.core.handle(compiled.id),
                schema: compiled.schema.clone(),
            });
        }

        let mut compiler = Compiler {
            core: &self.core,
            worker_queue: self.worker_queue.as_ref(),
            guard: registry,
            state: &mut state,
            added_keys: Vec::new(),
            reserved: Vec::new(),
            keys_len: 0,
        };
        compiler.keys_len = compiler.state.keys.len();

        let result = compiler.compile(key, schema).and_then(|compiled| {
            compiler.flush_pending()?;
            Ok(compiled)
        });
        if result.is_err() {
            compiler.rollback();
        }
        let compiled = result?;

        if self.core.is_indirect(compiled.id) {
            state.links_by_key.insert(key.clone(), compiled.clone());
        }
        Ok(MarshallerWithSchema {
            marshaller: self.core.handle(compiled.id),
            schema: compiled.schema,
        })
    }

    /// Marshaller for a schema, keyed by its canonical key.
    pub fn get_value_marshaller_for_schema(
        &self,
        registry: &mut RegistryGuard<'_>,
        schema: &Schema,
    ) -> Result<MarshallerWithSchema<P>> {
        let key = schema_key(schema)?;
        self.get_value_marshaller(registry, &key, schema)
    }

    /// Marshaller for a registered entry.
    pub fn marshaller_for_identifier(&self, identifier: SchemaIdentifier) -> Result<ValueMarshaller<P>> {
        let mut registry = self.schemas.lock();
        let entry = registry.schema_and_key_for_identifier(identifier).ok_or_else(|| {
            Error::message(format!("Could not resolve schema for identifier '{}'", identifier))
        })?;
        Ok(self
            .get_value_marshaller(&mut registry, &entry.key, &entry.schema)?
            .marshaller)
    }

    /// Keys compiled so far, children before parents.
    #[must_use]
    pub fn get_value_marshaller_keys(&self) -> Vec<Schema> {
        self.state.lock().keys.clone()
    }

    /// Arena slots allocated so far. Slots of failed compilations are
    /// reused, so this only grows with successfully compiled nodes.
    #[must_use]
    pub fn slot_count(&self) -> usize {
        self.core.slot_count()
    }

    /// Attach `processor` to links targeting `key`.
    ///
    /// Only marshallers compiled afterwards pick it up.
    pub fn register_processor(&self, key: SchemaRegistryKey, processor: Arc<dyn MarshallerProcessor<P>>) {
        self.state.lock().processors.insert(key, processor);
    }

    pub fn set_listener(&self, listener: Option<Arc<dyn MarshallerRegistryListener>>) {
        self.state.lock().listener = listener;
    }
}

/// Canonical key of `schema`.
fn schema_key(schema: &Schema) -> Result<SchemaRegistryKey> {
    TypeResolver::without_registry()
        .resolve(schema, ResolveMode::Key, &[])
        .map(|output| SchemaRegistryKey::new(output.schema))
        .context("Could not resolve schema key")
}

/// Processors are registered against the base type of generics.
fn processor_key(key: &SchemaRegistryKey) -> SchemaRegistryKey {
    match key.schema().as_generic_type_reference() {
        Some(generic) => SchemaRegistryKey::new(Schema::type_reference(generic.base().clone())),
        None => key.clone(),
    }
}

/// One compilation session.
struct Compiler<'a, 'g, 'r, P: PlatformValue> {
    core: &'a Arc<MarshallerCore<P>>,
    worker_queue: Option<&'a Arc<dyn DispatchQueue>>,
    guard: &'g mut RegistryGuard<'r>,
    state: &'a mut CacheState<P>,
    added_keys: Vec<SchemaRegistryKey>,
    reserved: Vec<MarshallerId>,
    keys_len: usize,
}

impl<P: PlatformValue> Compiler<'_, '_, '_, P> {
    fn delegate(&self) -> &dyn PlatformValueDelegate<P> {
        self.core.delegate()
    }

    fn reserve(&mut self) -> MarshallerId {
        let id = self.core.reserve();
        self.reserved.push(id);
        id
    }

    /// Add a node that is not cached under any key.
    fn add_node(&mut self, node: MarshallerNode<P>) -> MarshallerId {
        let id = self.reserve();
        self.core.fill(id, node);
        id
    }

    fn rollback(&mut self) {
        for key in self.added_keys.drain(..) {
            self.state.by_key.remove(&key);
        }
        self.state.keys.truncate(self.keys_len);
        self.state.pending.clear();
        for id in self.reserved.drain(..) {
            self.core.release(id);
        }
    }

    fn compile(&mut self, key: &SchemaRegistryKey, schema: &Schema) -> Result<Compiled> {
        if let Some(link) = schema.as_schema_reference() {
            return Ok(self.compile_link(link, schema));
        }
        if let Some(compiled) = self.state.by_key.get(key) {
            return Ok(compiled.clone());
        }

        let resolved = self
            .guard
            .resolve_type_references(schema, ResolveMode::Schema, &[])
            .with_context(|| format!("Could not resolve type references of schema key '{}'", key))?;
        if let Some(link) = resolved.schema.as_schema_reference() {
            // The key names a registered type; compile that entry instead.
            return Ok(self.compile_link(link, &resolved.schema));
        }
        if resolved.changed {
            self.guard.update_schema_if_key_exists(key, resolved.schema.clone());
        }
        let schema = resolved.schema;

        let id = self.reserve();
        self.state.by_key.insert(
            key.clone(),
            Compiled {
                id,
                schema: schema.clone(),
            },
        );
        self.added_keys.push(key.clone());

        let node = self.build(key, &schema)?;
        self.core.fill(id, node);
        self.state.keys.push(key.schema().clone());
        log::debug!("[marshaller] compiled {} as {}", key, id);

        Ok(Compiled { id, schema })
    }

    fn compile_link(&mut self, link: &SchemaReference, schema: &Schema) -> Compiled {
        let key = SchemaRegistryKey::new(link.key().clone());
        let processor = self.state.processors.get(&processor_key(&key)).cloned();
        let id = self.add_node(MarshallerNode::Indirect(IndirectNode {
            optional: schema.is_optional(),
            target: OnceLock::new(),
            processor,
        }));
        self.state.pending.push_back(PendingIndirect {
            id,
            key,
            identifier: link.identifier(),
        });
        Compiled {
            id,
            schema: schema.clone(),
        }
    }

    /// Compile queued links until none remain.
    fn flush_pending(&mut self) -> Result<()> {
        while let Some(pending) = self.state.pending.pop_front() {
            let schema = self.guard.schema_for_identifier(pending.identifier);
            let target = self.compile(&pending.key, &schema)?;
            let node = self.core.node(pending.id)?;
            if let MarshallerNode::Indirect(indirect) = node.as_ref() {
                // A slot is patched once; a second set is a no-op.
                let _ = indirect.target.set(target.id);
            }
        }
        Ok(())
    }

    /// Compile `schema` as a child under its canonical key.
    fn child(&mut self, schema: &Schema) -> Result<MarshallerId> {
        let key = schema_key(schema)?;
        Ok(self.compile(&key, schema)?.id)
    }

    fn build(&mut self, key: &SchemaRegistryKey, schema: &Schema) -> Result<MarshallerNode<P>> {
        if schema.is_void() {
            return Ok(MarshallerNode::Undefined);
        }
        if schema.is_optional() {
            let inner_key = SchemaRegistryKey::new(key.schema().as_non_optional());
            let inner = self.compile(&inner_key, &schema.as_non_optional())?;
            return Ok(MarshallerNode::Optional(inner.id));
        }

        let boxed = schema.is_boxed();
        let node = match schema.kind() {
            SchemaKind::Bool => MarshallerNode::Primitive {
                kind: Primitive::Bool,
                boxed,
            },
            SchemaKind::Int => MarshallerNode::Primitive {
                kind: Primitive::Int,
                boxed,
            },
            SchemaKind::Long => MarshallerNode::Primitive {
                kind: Primitive::Long,
                boxed,
            },
            SchemaKind::Double => MarshallerNode::Primitive {
                kind: Primitive::Double,
                boxed,
            },
            SchemaKind::String => MarshallerNode::String,
            SchemaKind::TypedArray => MarshallerNode::TypedArray,
            SchemaKind::Date => MarshallerNode::Date,
            SchemaKind::Untyped => MarshallerNode::Class(ClassNode {
                delegate: ClassDelegate::Untyped,
                properties: Vec::new(),
            }),
            SchemaKind::Function(_) => self.build_function(schema)?,
            SchemaKind::Class(class) => self.build_class(class)?,
            SchemaKind::Enum(enumeration) => self.build_enum(enumeration, boxed)?,
            SchemaKind::Array(item) => MarshallerNode::Array(
                self.child(item).context("While processing array item type")?,
            ),
            SchemaKind::Map(key, value) => MarshallerNode::Map {
                key: self.child(key).context("While processing map key type")?,
                value: self.child(value).context("While processing map value type")?,
            },
            SchemaKind::Es6Map(key, value) => MarshallerNode::Es6Map {
                key: self.child(key).context("While processing map key type")?,
                value: self.child(value).context("While processing map value type")?,
            },
            SchemaKind::Es6Set(item) => {
                MarshallerNode::Es6Set(self.child(item).context("While processing set key type")?)
            }
            SchemaKind::Promise(item) => MarshallerNode::Promise(
                self.child(item).context("While processing promise value type")?,
            ),
            _ => {
                return Err(Error::message(format!("Unsupported schema '{}'", schema)));
            }
        };
        Ok(node)
    }

    fn build_function(&mut self, schema: &Schema) -> Result<MarshallerNode<P>> {
        let Some(function) = schema.as_function() else {
            return Err(Error::message(format!("Unsupported schema '{}'", schema)));
        };

        let return_schema = function.return_schema();
        let return_marshaller = self
            .child(return_schema)
            .with_context(|| format!("While processing function return value of {}", schema))?;

        let mut parameters = Vec::with_capacity(function.parameters().len());
        for (i, parameter) in function.parameters().iter().enumerate() {
            let id = self
                .child(parameter)
                .with_context(|| format!("While processing function parameter {} of {}", i, schema))?;
            parameters.push(id);
        }

        let attributes = function.attributes();
        let is_promise_return = return_schema.is_promise();
        let call_queue = if is_promise_return || attributes.dispatch_to_worker {
            self.worker_queue.cloned()
        } else {
            None
        };
        let trampoline = Arc::new(FunctionTrampoline::new(
            Arc::downgrade(self.core),
            return_marshaller,
            parameters,
            is_promise_return,
            !return_schema.is_void(),
            call_queue,
        ));

        let class = self
            .delegate()
            .new_function_class(trampoline, function)
            .with_context(|| format!("Could not create function class for {}", schema))?;

        Ok(MarshallerNode::Class(ClassNode {
            delegate: ClassDelegate::Function(FunctionClass {
                class,
                is_method: attributes.is_method,
                is_single_call: attributes.is_single_call,
            }),
            properties: Vec::new(),
        }))
    }

    fn object_class(&mut self, schema: &Arc<ClassSchema>) -> Result<Arc<dyn ObjectClassDelegate<P>>> {
        if let Some(class) = self.state.object_classes.get(schema.name_arc()) {
            return Ok(Arc::clone(class));
        }
        let class = self
            .delegate()
            .new_object_class(schema)
            .with_context(|| format!("Unable to resolve Object class '{}'", schema.name()))?;
        self.state
            .object_classes
            .insert(Arc::clone(schema.name_arc()), Arc::clone(&class));
        Ok(class)
    }

    fn enum_class(&mut self, schema: &Arc<EnumSchema>) -> Result<Arc<dyn EnumClassDelegate<P>>> {
        let name: Arc<str> = Arc::from(schema.name());
        if let Some(class) = self.state.enum_classes.get(&name) {
            return Ok(Arc::clone(class));
        }
        let class = self
            .delegate()
            .new_enum_class(schema)
            .with_context(|| format!("Unable to resolve Enum class '{}'", schema.name()))?;
        self.state.enum_classes.insert(name, Arc::clone(&class));
        Ok(class)
    }

    fn build_class(&mut self, schema: &Arc<ClassSchema>) -> Result<MarshallerNode<P>> {
        let class = self.object_class(schema)?;
        let listener = if schema.is_interface() {
            self.state.listener.clone()
        } else {
            None
        };

        let mut properties = Vec::with_capacity(schema.properties().len());
        for property in schema.properties() {
            let context = || format!("While processing property '{}' of {}", property.name(), schema.name());
            let mut id = self.child(property.schema()).with_context(context)?;

            if let Some(listener) = &listener {
                let unmarshall_schema = listener.schema_for_interface_property_unmarshaller(property.schema());
                if unmarshall_schema != *property.schema() {
                    let unmarshaller = self.child(&unmarshall_schema).with_context(context)?;
                    id = self.add_node(MarshallerNode::Unbalanced {
                        marshaller: id,
                        unmarshaller,
                    });
                }
            }
            properties.push(id);
        }

        let object = ObjectClass {
            schema: Arc::clone(schema),
            class,
        };
        let delegate = if schema.is_interface() {
            ClassDelegate::Interface(object)
        } else {
            ClassDelegate::Object(object)
        };
        Ok(MarshallerNode::Class(ClassNode {
            delegate,
            properties,
        }))
    }

    fn build_enum(&mut self, schema: &Arc<EnumSchema>, boxed: bool) -> Result<MarshallerNode<P>> {
        let class = self.enum_class(schema)?;
        Ok(MarshallerNode::Class(ClassNode {
            delegate: ClassDelegate::Enum(EnumClass {
                schema: Arc::clone(schema),
                class,
                boxed,
            }),
            properties: Vec::new(),
        }))
    }
}
