// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Class delegates of the test host.

use std::sync::{Arc, Weak};

use valbridge::{
    handle_bridge_call, CallContext, ClassSchema, EnumClassDelegate, EnumSchema, Error, FunctionClassDelegate,
    FunctionSchema, FunctionTrampoline, ObjectClassDelegate, ProxyObject, Result, TypedObject, Value, ValueFunction,
};

use crate::objects::{TestEnum, TestFunction, TestObject, TestObjectProxy};

pub(crate) fn test_object(value: &Value) -> Result<Arc<TestObject>> {
    value
        .object_ref::<TestObject>()
        .ok_or_else(|| Error::message(format!("Expected TestObject, got {}", value.type_name())))
}

/// Objects are [`TestObject`]s holding their properties positionally.
///
/// Interface implementations keep their methods on a prototype object.
pub struct TestObjectClass {
    schema: Arc<ClassSchema>,
}

impl TestObjectClass {
    pub fn new(schema: Arc<ClassSchema>) -> Self {
        Self { schema }
    }
}

impl ObjectClassDelegate<Value> for TestObjectClass {
    fn new_object(&self, properties: &[Value]) -> Result<Value> {
        Ok(Value::object(TestObject::new(self.schema.name(), properties.to_vec())))
    }

    fn get_property(&self, object: &Value, index: usize) -> Result<Value> {
        let object = test_object(object)?;
        if self.schema.is_interface() {
            if let Some(prototype) = object.prototype() {
                return Ok(prototype.property(index));
            }
        }
        Ok(object.property(index))
    }

    fn new_proxy(&self, object: &Value, typed_object: Arc<TypedObject>, id: u32) -> Result<Arc<dyn ProxyObject>> {
        Ok(TestObjectProxy::new(object.clone(), typed_object, id))
    }

    fn object_implements_method(&self, object: &Value, index: usize) -> Result<bool> {
        Ok(!self.get_property(object, index)?.is_null_or_undefined())
    }
}

pub struct TestEnumClass {
    schema: Arc<EnumSchema>,
}

impl TestEnumClass {
    pub fn new(schema: Arc<EnumSchema>) -> Self {
        Self { schema }
    }
}

impl EnumClassDelegate<Value> for TestEnumClass {
    fn new_enum(&self, case_index: usize, boxed: bool) -> Result<Value> {
        Ok(Value::object(TestEnum::new(self.schema.name(), case_index, boxed)))
    }

    fn enum_case_to_value(&self, object: &Value, boxed: bool) -> Result<Value> {
        let enumeration = object
            .object_ref::<TestEnum>()
            .ok_or_else(|| Error::message(format!("Expected TestEnum, got {}", object.type_name())))?;
        if enumeration.is_boxed() != boxed {
            return Err(Error::message(format!(
                "Boxing mismatch for enum '{}'",
                self.schema.name()
            )));
        }
        self.schema
            .case(enumeration.case_index())
            .map(|case| case.value().clone())
            .ok_or_else(|| {
                Error::message(format!(
                    "Enum '{}' has no case at index {}",
                    self.schema.name(),
                    enumeration.case_index()
                ))
            })
    }
}

pub struct TestFunctionClass {
    trampoline: Arc<FunctionTrampoline<Value>>,
    schema: Arc<FunctionSchema>,
}

impl TestFunctionClass {
    pub fn new(trampoline: Arc<FunctionTrampoline<Value>>, schema: Arc<FunctionSchema>) -> Self {
        Self { trampoline, schema }
    }

    pub fn schema(&self) -> &Arc<FunctionSchema> {
        &self.schema
    }
}

impl FunctionClassDelegate<Value> for TestFunctionClass {
    fn new_function(&self, function: Arc<dyn ValueFunction>) -> Result<Value> {
        Ok(Value::object(TestFunction::bridged(Arc::clone(&self.trampoline), function)))
    }

    fn to_value_function(&self, receiver: Option<&Value>, function: &Value) -> Result<Arc<dyn ValueFunction>> {
        let function = function
            .object_ref::<TestFunction>()
            .ok_or_else(|| Error::message("Unable to retrieve TestFunction"))?;
        let receiver = match receiver {
            Some(receiver) => Some(Arc::downgrade(&test_object(receiver)?)),
            None => None,
        };
        Ok(Arc::new(ValueFunctionWithTestFunction {
            trampoline: Arc::clone(&self.trampoline),
            receiver,
            function,
        }))
    }
}

/// Engine function calling a native [`TestFunction`].
///
/// Method receivers are passed as the first native parameter and held
/// weakly, so a proxy does not keep its object alive through its methods.
struct ValueFunctionWithTestFunction {
    trampoline: Arc<FunctionTrampoline<Value>>,
    receiver: Option<Weak<TestObject>>,
    function: Arc<TestFunction>,
}

impl ValueFunction for ValueFunctionWithTestFunction {
    fn call(&self, ctx: &CallContext<'_>) -> Result<Value> {
        let trampoline = Arc::clone(&self.trampoline);
        let receiver = self.receiver.clone();
        let function = Arc::clone(&self.function);

        handle_bridge_call(
            self.trampoline.call_queue(),
            self.trampoline.is_promise_return_type(),
            ctx,
            move |ctx| {
                let mut parameters = Vec::with_capacity(trampoline.parameters_len() + 1);
                if let Some(receiver) = &receiver {
                    let receiver = receiver
                        .upgrade()
                        .ok_or_else(|| Error::message("Receiver was released"))?;
                    parameters.push(Value::object(receiver));
                }
                parameters.extend(trampoline.unmarshall_parameters(ctx.parameters())?);

                let result = function.call(&parameters)?;
                trampoline.marshall_return_value(&result)
            },
        )
    }

    fn function_type(&self) -> &str {
        "TestFunction"
    }
}
