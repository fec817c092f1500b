// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Marshaller node kinds and their conversions.

use std::sync::{Arc, OnceLock};

use super::class::{ClassDelegate, InstanceArgs, ObjectClass};
use super::registry::MarshallerProcessor;
use super::{MarshallerCore, MarshallerId};
use crate::delegate::{CollectionKind, MapKey, PlatformValue};
use crate::error::{Direction, Error, Result, ResultExt};
use crate::object_store::{get_or_create_proxy, retain_proxy};
use crate::promise::Promise;
use crate::value::{Es6Map, Es6Set, TypedObject, Value, ValueMap};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Primitive {
    Bool,
    Int,
    Long,
    Double,
}

/// Class-shaped node: the strategy plus one marshaller per property.
pub(crate) struct ClassNode<P: PlatformValue> {
    pub delegate: ClassDelegate<P>,
    pub properties: Vec<MarshallerId>,
}

/// Forward to a node compiled later, patched once it exists.
pub(crate) struct IndirectNode<P: PlatformValue> {
    pub optional: bool,
    pub target: OnceLock<MarshallerId>,
    pub processor: Option<Arc<dyn MarshallerProcessor<P>>>,
}

impl<P: PlatformValue> IndirectNode<P> {
    fn target(&self) -> Result<MarshallerId> {
        self.target
            .get()
            .copied()
            .ok_or_else(|| Error::message("Unresolved indirect marshaller"))
    }
}

pub(crate) enum MarshallerNode<P: PlatformValue> {
    Undefined,
    Optional(MarshallerId),
    Primitive { kind: Primitive, boxed: bool },
    String,
    TypedArray,
    Date,
    Array(MarshallerId),
    Map { key: MarshallerId, value: MarshallerId },
    Es6Map { key: MarshallerId, value: MarshallerId },
    Es6Set(MarshallerId),
    Promise(MarshallerId),
    Class(ClassNode<P>),
    /// Different conversions per direction.
    Unbalanced {
        marshaller: MarshallerId,
        unmarshaller: MarshallerId,
    },
    Indirect(IndirectNode<P>),
}

impl<P: PlatformValue> MarshallerNode<P> {
    pub(crate) fn is_optional(&self, core: &MarshallerCore<P>) -> bool {
        match self {
            MarshallerNode::Optional(_) => true,
            MarshallerNode::Indirect(indirect) => indirect.optional,
            MarshallerNode::Unbalanced {
                marshaller,
                unmarshaller,
            } => core.is_optional(*marshaller) || core.is_optional(*unmarshaller),
            _ => false,
        }
    }

    pub(crate) fn unmarshall(
        &self,
        core: &Arc<MarshallerCore<P>>,
        id: MarshallerId,
        value: &Value,
    ) -> Result<P> {
        let delegate = core.delegate();
        match self {
            MarshallerNode::Undefined => Ok(delegate.new_void()),
            MarshallerNode::Optional(inner) => {
                if value.is_null_or_undefined() {
                    Ok(delegate.new_null())
                } else {
                    core.unmarshall(*inner, value)
                }
            }
            MarshallerNode::Primitive { kind, boxed } => match (kind, boxed) {
                (Primitive::Bool, false) => delegate.new_bool(value.checked_bool()?),
                (Primitive::Bool, true) => delegate.new_bool_object(value.checked_bool()?),
                (Primitive::Int, false) => delegate.new_int(value.checked_int()?),
                (Primitive::Int, true) => delegate.new_int_object(value.checked_int()?),
                (Primitive::Long, false) => delegate.new_long(value.checked_long()?),
                (Primitive::Long, true) => delegate.new_long_object(value.checked_long()?),
                (Primitive::Double, false) => delegate.new_double(value.checked_double()?),
                (Primitive::Double, true) => delegate.new_double_object(value.checked_double()?),
            },
            MarshallerNode::String => delegate.new_string(value.checked_str()?),
            MarshallerNode::TypedArray => {
                let array = value
                    .as_typed_array()
                    .ok_or_else(|| Error::type_mismatch(value.type_name(), "typed array"))?;
                delegate.new_typed_array(array.kind(), array.bytes())
            }
            MarshallerNode::Date => delegate.new_date(value.checked_double()?),
            MarshallerNode::Array(item) => unmarshall_array(core, *item, value),
            MarshallerNode::Map { key, value: item } => {
                unmarshall_map(core, *key, *item, value).context("While unmarshalling map")
            }
            MarshallerNode::Es6Map { key, value: item } => {
                unmarshall_es6_map(core, *key, *item, value).context("While unmarshalling ES6 map")
            }
            MarshallerNode::Es6Set(item) => {
                unmarshall_es6_set(core, *item, value).context("While unmarshalling ES6 set")
            }
            MarshallerNode::Promise(item) => {
                let promise = value
                    .object_ref::<Promise>()
                    .ok_or_else(|| Error::type_mismatch(value.type_name(), "promise"))?;
                delegate.new_bridged_promise(promise, core.handle(*item))
            }
            MarshallerNode::Class(class) => class.unmarshall(core, id, value),
            MarshallerNode::Unbalanced { unmarshaller, .. } => core.unmarshall(*unmarshaller, value),
            MarshallerNode::Indirect(indirect) => {
                let target = indirect.target()?;
                if indirect.optional && value.is_null_or_undefined() {
                    return Ok(delegate.new_null());
                }
                let output = core.unmarshall(target, value)?;
                match &indirect.processor {
                    Some(processor) => processor.postprocess(output),
                    None => Ok(output),
                }
            }
        }
    }

    pub(crate) fn marshall(
        &self,
        core: &Arc<MarshallerCore<P>>,
        id: MarshallerId,
        receiver: Option<&P>,
        value: &P,
    ) -> Result<Value> {
        let delegate = core.delegate();
        match self {
            MarshallerNode::Undefined => Ok(Value::Undefined),
            MarshallerNode::Optional(inner) => {
                if delegate.value_is_null(value) {
                    Ok(Value::Undefined)
                } else {
                    core.marshall(*inner, receiver, value)
                }
            }
            MarshallerNode::Primitive { kind, boxed } => Ok(match (kind, boxed) {
                (Primitive::Bool, false) => Value::Bool(delegate.value_to_bool(value)?),
                (Primitive::Bool, true) => Value::Bool(delegate.value_object_to_bool(value)?),
                (Primitive::Int, false) => Value::Int(delegate.value_to_int(value)?),
                (Primitive::Int, true) => Value::Int(delegate.value_object_to_int(value)?),
                (Primitive::Long, false) => Value::Long(delegate.value_to_long(value)?),
                (Primitive::Long, true) => Value::Long(delegate.value_object_to_long(value)?),
                (Primitive::Double, false) => Value::Double(delegate.value_to_double(value)?),
                (Primitive::Double, true) => Value::Double(delegate.value_object_to_double(value)?),
            }),
            MarshallerNode::String => Ok(Value::String(delegate.value_to_string(value)?)),
            MarshallerNode::TypedArray => Ok(Value::TypedArray(delegate.value_to_typed_array(value)?)),
            MarshallerNode::Date => Ok(Value::Double(delegate.date_to_double(value)?)),
            MarshallerNode::Array(item) => marshall_array(core, *item, value),
            MarshallerNode::Map { key, value: item } => {
                marshall_map(core, *key, *item, value).context("While marshalling map")
            }
            MarshallerNode::Es6Map { key, value: item } => {
                marshall_es6_map(core, *key, *item, value).context("While marshalling ES6 map")
            }
            MarshallerNode::Es6Set(item) => {
                marshall_es6_set(core, *item, value).context("While marshalling ES6 set")
            }
            MarshallerNode::Promise(item) => {
                let promise = delegate.value_to_promise(value, core.handle(*item))?;
                Ok(Value::object(promise))
            }
            MarshallerNode::Class(class) => class.marshall(core, id, receiver, value),
            MarshallerNode::Unbalanced { marshaller, .. } => core.marshall(*marshaller, receiver, value),
            MarshallerNode::Indirect(indirect) => {
                let target = indirect.target()?;
                if indirect.optional && delegate.value_is_null(value) {
                    return Ok(Value::Undefined);
                }
                match &indirect.processor {
                    Some(processor) => {
                        let preprocessed = processor.preprocess(receiver, value)?;
                        core.marshall(target, None, &preprocessed)
                    }
                    None => core.marshall(target, receiver, value),
                }
            }
        }
    }
}

fn unmarshall_array<P: PlatformValue>(
    core: &Arc<MarshallerCore<P>>,
    item: MarshallerId,
    value: &Value,
) -> Result<P> {
    let items = value
        .as_array()
        .ok_or_else(|| Error::type_mismatch(value.type_name(), "array"))?;
    let mut builder = core.delegate().new_array_builder(items.len())?;
    for (i, entry) in items.iter().enumerate() {
        let output = core
            .unmarshall(item, entry)
            .with_context(|| format!("while unmarshalling array index '{}'", i))?;
        builder.set(i, output)?;
    }
    builder.finish()
}

fn marshall_array<P: PlatformValue>(
    core: &Arc<MarshallerCore<P>>,
    item: MarshallerId,
    value: &P,
) -> Result<Value> {
    let delegate = core.delegate();
    let iterator = delegate.new_array_iterator(value)?;
    let mut items = Vec::with_capacity(iterator.len());
    for i in 0..iterator.len() {
        let entry = delegate.array_item(&iterator, i)?;
        let output = core
            .marshall(item, None, &entry)
            .with_context(|| format!("while marshalling array index '{}'", i))?;
        items.push(output);
    }
    Ok(Value::array(items))
}

fn unmarshall_map<P: PlatformValue>(
    core: &Arc<MarshallerCore<P>>,
    key: MarshallerId,
    item: MarshallerId,
    value: &Value,
) -> Result<P> {
    let entries = value
        .as_map()
        .ok_or_else(|| Error::type_mismatch(value.type_name(), "map"))?;
    let delegate = core.delegate();
    let map = delegate.new_map(entries.len())?;
    for (entry_key, entry_value) in entries {
        let platform_key = core.unmarshall(key, &Value::String(Arc::clone(entry_key)))?;
        let platform_value = core.unmarshall(item, entry_value)?;
        delegate.set_map_entry(&map, &platform_key, &platform_value)?;
    }
    Ok(map)
}

fn marshall_map<P: PlatformValue>(
    core: &Arc<MarshallerCore<P>>,
    key: MarshallerId,
    item: MarshallerId,
    value: &P,
) -> Result<Value> {
    let delegate = core.delegate();
    let mut entries = Vec::with_capacity(delegate.map_estimated_len(value)?);
    delegate.visit_map_entries(value, &mut |entry_key, entry_value| {
        let entry_key: Arc<str> = match entry_key {
            MapKey::Platform(platform_key) => core.marshall(key, None, platform_key)?.to_key_string(),
            MapKey::Str(s) => Arc::from(s),
        };
        entries.push((entry_key, core.marshall(item, None, entry_value)?));
        Ok(true)
    })?;
    Ok(Value::map(entries.into_iter().collect::<ValueMap>()))
}

fn unmarshall_es6_map<P: PlatformValue>(
    core: &Arc<MarshallerCore<P>>,
    key: MarshallerId,
    item: MarshallerId,
    value: &Value,
) -> Result<P> {
    let source = value
        .object_ref::<Es6Map>()
        .ok_or_else(|| Error::type_mismatch(value.type_name(), "ES6Map"))?;
    let delegate = core.delegate();
    let collection = delegate.new_es6_collection(CollectionKind::Map)?;
    for (entry_key, entry_value) in source.pairs() {
        let pair = [core.unmarshall(key, entry_key)?, core.unmarshall(item, entry_value)?];
        delegate.set_es6_collection_entry(&collection, CollectionKind::Map, &pair)?;
    }
    Ok(collection)
}

fn marshall_es6_map<P: PlatformValue>(
    core: &Arc<MarshallerCore<P>>,
    key: MarshallerId,
    item: MarshallerId,
    value: &P,
) -> Result<Value> {
    let mut entries = Vec::new();
    core.delegate().visit_es6_collection(value, &mut |entry_key, entry_value| {
        let entry_key = match entry_key {
            MapKey::Platform(platform_key) => core.marshall(key, None, platform_key)?,
            MapKey::Str(s) => Value::from(s),
        };
        entries.push(entry_key);
        entries.push(core.marshall(item, None, entry_value)?);
        Ok(true)
    })?;
    Ok(Value::object(Es6Map::new(entries)))
}

fn unmarshall_es6_set<P: PlatformValue>(
    core: &Arc<MarshallerCore<P>>,
    item: MarshallerId,
    value: &Value,
) -> Result<P> {
    let source = value
        .object_ref::<Es6Set>()
        .ok_or_else(|| Error::type_mismatch(value.type_name(), "ES6Set"))?;
    let delegate = core.delegate();
    let collection = delegate.new_es6_collection(CollectionKind::Set)?;
    for entry in &source.entries {
        let output = core.unmarshall(item, entry)?;
        delegate.set_es6_collection_entry(&collection, CollectionKind::Set, std::slice::from_ref(&output))?;
    }
    Ok(collection)
}

fn marshall_es6_set<P: PlatformValue>(
    core: &Arc<MarshallerCore<P>>,
    item: MarshallerId,
    value: &P,
) -> Result<Value> {
    let mut entries = Vec::new();
    core.delegate().visit_es6_collection(value, &mut |entry, _| {
        entries.push(match entry {
            MapKey::Platform(platform_item) => core.marshall(item, None, platform_item)?,
            MapKey::Str(s) => Value::from(s),
        });
        Ok(true)
    })?;
    Ok(Value::object(Es6Set::new(entries)))
}

/// Property `index` of an engine object, typed or map-shaped.
fn source_property(value: &Value, name: &str, index: usize) -> Value {
    match value {
        Value::TypedObject(object) => object.property(index),
        Value::ProxyObject(proxy) => proxy.typed_object().property(index),
        Value::Map(map) => map.get(name).cloned().unwrap_or(Value::Undefined),
        _ => Value::Undefined,
    }
}

impl<P: PlatformValue> ClassNode<P> {
    fn unmarshall(&self, core: &Arc<MarshallerCore<P>>, id: MarshallerId, value: &Value) -> Result<P> {
        let delegate = core.delegate();
        match &self.delegate {
            ClassDelegate::Object(class) => self.unmarshall_object(core, class, value),
            ClassDelegate::Interface(class) => match value.as_proxy_object() {
                Some(proxy) => {
                    let store = delegate.object_store();
                    let _lock = store.mutex().lock();
                    if let Some(object) = store.object_for_id(proxy.id())? {
                        return Ok(object);
                    }
                    let object = self
                        .unmarshall_object(core, class, &Value::TypedObject(Arc::clone(proxy.typed_object())))?;
                    retain_proxy(store, &object, id, proxy)?;
                    Ok(object)
                }
                None => self.unmarshall_object(core, class, value),
            },
            ClassDelegate::Enum(enumeration) => {
                let index = enumeration
                    .schema
                    .case_index_for_value(value)
                    .ok_or_else(|| Error::EnumCaseNotFound {
                        enum_name: enumeration.schema.name().to_string(),
                        value: value.to_string(),
                    })?;
                self.delegate.new_instance(delegate, InstanceArgs::EnumCase(index))
            }
            ClassDelegate::Function(_) => {
                let function = value
                    .as_function()
                    .ok_or_else(|| Error::type_mismatch(value.type_name(), "function"))?;
                self.delegate
                    .new_instance(delegate, InstanceArgs::Function(Arc::clone(function)))
            }
            ClassDelegate::Untyped => self.delegate.new_instance(delegate, InstanceArgs::Untyped(value)),
        }
    }

    /// All-or-nothing: the first failing property aborts the conversion.
    fn unmarshall_object(
        &self,
        core: &Arc<MarshallerCore<P>>,
        class: &ObjectClass<P>,
        value: &Value,
    ) -> Result<P> {
        if !matches!(
            value,
            Value::TypedObject(_) | Value::ProxyObject(_) | Value::Map(_)
        ) {
            return Err(Error::type_mismatch(value.type_name(), "typed object"));
        }

        let schema = &class.schema;
        let mut properties = Vec::with_capacity(self.properties.len());
        for (index, (marshaller, property)) in self.properties.iter().zip(schema.properties()).enumerate() {
            let source = source_property(value, property.name(), index);
            let output = core
                .unmarshall(*marshaller, &source)
                .map_err(|err| err.in_property(schema.name(), property.name(), Direction::Unmarshall))?;
            properties.push(output);
        }
        self.delegate
            .new_instance(core.delegate(), InstanceArgs::Properties(&properties))
    }

    fn marshall(
        &self,
        core: &Arc<MarshallerCore<P>>,
        id: MarshallerId,
        receiver: Option<&P>,
        value: &P,
    ) -> Result<Value> {
        let delegate = core.delegate();
        match &self.delegate {
            ClassDelegate::Object(class) => {
                Ok(Value::TypedObject(self.marshall_typed_object(core, class, None, value)?))
            }
            ClassDelegate::Interface(class) => {
                let proxy = get_or_create_proxy(delegate.object_store(), value, id, || {
                    let typed_object = self
                        .marshall_typed_object(core, class, Some(value), value)
                        .with_context(|| format!("While creating proxy object for class: {}", class.schema.name()))?;
                    self.delegate.new_proxy(value, typed_object, core.next_proxy_id())
                })?;
                Ok(Value::ProxyObject(proxy))
            }
            ClassDelegate::Enum(enumeration) => {
                enumeration.class.enum_case_to_value(value, enumeration.boxed)
            }
            ClassDelegate::Function(function) => {
                let receiver = if function.is_method { receiver } else { None };
                let bridged = function.class.to_value_function(receiver, value)?;
                Ok(Value::Function(function.bridged(bridged)))
            }
            ClassDelegate::Untyped => delegate.value_to_untyped(value),
        }
    }

    fn marshall_typed_object(
        &self,
        core: &Arc<MarshallerCore<P>>,
        class: &ObjectClass<P>,
        receiver: Option<&P>,
        value: &P,
    ) -> Result<Arc<TypedObject>> {
        let delegate = core.delegate();
        let schema = &class.schema;
        let mut properties = Vec::with_capacity(self.properties.len());
        for (index, (marshaller, property)) in self.properties.iter().zip(schema.properties()).enumerate() {
            let output = self
                .delegate
                .get_property(delegate, value, index)
                .and_then(|property_value| core.marshall(*marshaller, receiver, &property_value))
                .map_err(|err| err.in_property(schema.name(), property.name(), Direction::Marshall))?;
            properties.push(output);
        }
        Ok(TypedObject::new(Arc::clone(schema), properties))
    }
}
