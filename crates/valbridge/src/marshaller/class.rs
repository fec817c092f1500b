// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Class-shaped marshalling strategies.

use std::sync::Arc;

use crate::delegate::{
    EnumClassDelegate, FunctionClassDelegate, ObjectClassDelegate, PlatformValue,
    PlatformValueDelegate,
};
use crate::error::{Error, Result};
use crate::schema::{ClassSchema, EnumSchema, SchemaKind};
use crate::value::{ProxyObject, SingleCallFunction, TypedObject, Value, ValueFunction};

/// Object or interface class.
pub struct ObjectClass<P: PlatformValue> {
    pub schema: Arc<ClassSchema>,
    pub class: Arc<dyn ObjectClassDelegate<P>>,
}

impl<P: PlatformValue> Clone for ObjectClass<P> {
    fn clone(&self) -> Self {
        Self {
            schema: Arc::clone(&self.schema),
            class: Arc::clone(&self.class),
        }
    }
}

impl<P: PlatformValue> ObjectClass<P> {
    /// Whether the property at `index` is an optional function.
    fn is_optional_method(&self, index: usize) -> bool {
        self.schema.property(index).is_some_and(|property| {
            let schema = property.schema();
            schema.is_optional() && matches!(schema.kind(), SchemaKind::Function(_))
        })
    }
}

/// Enum class, bound to the boxing of the schema it was compiled for.
pub struct EnumClass<P: PlatformValue> {
    pub schema: Arc<EnumSchema>,
    pub class: Arc<dyn EnumClassDelegate<P>>,
    pub boxed: bool,
}

/// Function class.
pub struct FunctionClass<P: PlatformValue> {
    pub class: Arc<dyn FunctionClassDelegate<P>>,
    pub is_method: bool,
    /// Functions crossing the boundary are released after their first call.
    pub is_single_call: bool,
}

impl<P: PlatformValue> FunctionClass<P> {
    pub(crate) fn bridged(&self, function: Arc<dyn ValueFunction>) -> Arc<dyn ValueFunction> {
        if self.is_single_call {
            SingleCallFunction::wrap(function)
        } else {
            function
        }
    }
}

/// Inputs of [`ClassDelegate::new_instance`], one shape per strategy.
pub enum InstanceArgs<'a, P> {
    Properties(&'a [P]),
    EnumCase(usize),
    Function(Arc<dyn ValueFunction>),
    Untyped(&'a Value),
}

/// How a class-shaped schema maps onto the host.
pub enum ClassDelegate<P: PlatformValue> {
    Object(ObjectClass<P>),
    Interface(ObjectClass<P>),
    Enum(EnumClass<P>),
    Function(FunctionClass<P>),
    Untyped,
}

impl<P: PlatformValue> ClassDelegate<P> {
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            ClassDelegate::Object(_) => "object",
            ClassDelegate::Interface(_) => "interface",
            ClassDelegate::Enum(_) => "enum",
            ClassDelegate::Function(_) => "function",
            ClassDelegate::Untyped => "untyped",
        }
    }

    /// Build a native instance.
    pub fn new_instance(
        &self,
        delegate: &dyn PlatformValueDelegate<P>,
        args: InstanceArgs<'_, P>,
    ) -> Result<P> {
        match (self, args) {
            (
                ClassDelegate::Object(object) | ClassDelegate::Interface(object),
                InstanceArgs::Properties(properties),
            ) => object.class.new_object(properties),
            (ClassDelegate::Enum(enumeration), InstanceArgs::EnumCase(index)) => {
                enumeration.class.new_enum(index, enumeration.boxed)
            }
            (ClassDelegate::Function(function), InstanceArgs::Function(callable)) => {
                function.class.new_function(function.bridged(callable))
            }
            (ClassDelegate::Untyped, InstanceArgs::Untyped(value)) => delegate.new_untyped(value),
            (class, _) => Err(Error::message(format!(
                "Invalid instance arguments for {} class",
                class.kind_name()
            ))),
        }
    }

    /// Read the property at `index` of a native instance.
    ///
    /// Interfaces report optional methods the object does not implement as
    /// null.
    pub fn get_property(
        &self,
        delegate: &dyn PlatformValueDelegate<P>,
        object: &P,
        index: usize,
    ) -> Result<P> {
        match self {
            ClassDelegate::Object(class) => class.class.get_property(object, index),
            ClassDelegate::Interface(class) => {
                if class.is_optional_method(index) && !class.class.object_implements_method(object, index)? {
                    return Ok(delegate.new_null());
                }
                class.class.get_property(object, index)
            }
            other => Err(Error::message(format!(
                "Cannot read property {} of {} class",
                index,
                other.kind_name()
            ))),
        }
    }

    /// Wrap a native object into a proxy. Only interfaces have proxies.
    pub fn new_proxy(&self, object: &P, typed_object: Arc<TypedObject>, id: u32) -> Result<Arc<dyn ProxyObject>> {
        match self {
            ClassDelegate::Interface(class) => class.class.new_proxy(object, typed_object, id),
            ClassDelegate::Object(class) => Err(Error::ExpectedInterfaceSchema {
                class: class.schema.name().to_string(),
            }),
            other => Err(Error::message(format!("Cannot create proxy of {} class", other.kind_name()))),
        }
    }
}
