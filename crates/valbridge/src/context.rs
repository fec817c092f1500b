// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Marshalling context.
//!
//! [`MarshallingContext`] ties together a schema registry, the marshaller
//! registry compiling against it, the host delegate and the optional worker
//! queue. Hosts create one context per engine instance and pass it around
//! explicitly.

use std::sync::Arc;

use crate::config::MarshallingConfig;
use crate::delegate::{PlatformValue, PlatformValueDelegate};
use crate::dispatch::{DispatchQueue, SerialWorkerQueue};
use crate::error::{Result, ResultExt};
use crate::marshaller::{MarshallerRegistry, ValueMarshaller};
use crate::registry::{SchemaIdentifier, SchemaRegistry};
use crate::schema::Schema;
use crate::value::Value;

/// Registries and services shared by every conversion of one engine.
pub struct MarshallingContext<P: PlatformValue> {
    platform_name: String,
    schemas: Arc<SchemaRegistry>,
    marshallers: MarshallerRegistry<P>,
    call_queue: Option<Arc<dyn DispatchQueue>>,
}

impl<P: PlatformValue> MarshallingContext<P> {
    /// Context with an empty schema registry.
    pub fn new(delegate: Arc<dyn PlatformValueDelegate<P>>, call_queue: Option<Arc<dyn DispatchQueue>>) -> Self {
        Self::with_schema_registry(Arc::new(SchemaRegistry::new()), delegate, call_queue)
    }

    /// Context compiling against an existing schema registry.
    pub fn with_schema_registry(
        schemas: Arc<SchemaRegistry>,
        delegate: Arc<dyn PlatformValueDelegate<P>>,
        call_queue: Option<Arc<dyn DispatchQueue>>,
    ) -> Self {
        let marshallers = MarshallerRegistry::new(Arc::clone(&schemas), delegate, call_queue.clone());
        Self {
            platform_name: MarshallingConfig::default().platform_name,
            schemas,
            marshallers,
            call_queue,
        }
    }

    /// Context built from configuration, spawning the worker queue when
    /// enabled.
    pub fn from_config(config: &MarshallingConfig, delegate: Arc<dyn PlatformValueDelegate<P>>) -> Result<Self> {
        config.validate()?;

        let call_queue = if config.dispatch.worker_queue {
            let queue = SerialWorkerQueue::new(&config.dispatch.queue_name, config.dispatch.queue_capacity)
                .context("Could not start worker queue")?;
            Some(Arc::new(queue) as Arc<dyn DispatchQueue>)
        } else {
            None
        };

        log::debug!(
            "[marshaller] created context for platform '{}' (worker queue: {})",
            config.platform_name,
            config.dispatch.worker_queue
        );

        let mut context = Self::new(delegate, call_queue);
        context.platform_name = config.platform_name.clone();
        Ok(context)
    }

    #[must_use]
    pub fn platform_name(&self) -> &str {
        &self.platform_name
    }

    #[must_use]
    pub fn schema_registry(&self) -> &Arc<SchemaRegistry> {
        &self.schemas
    }

    #[must_use]
    pub fn marshaller_registry(&self) -> &MarshallerRegistry<P> {
        &self.marshallers
    }

    #[must_use]
    pub fn delegate(&self) -> &dyn PlatformValueDelegate<P> {
        self.marshallers.delegate()
    }

    /// Queue bridged calls are dispatched on, if any.
    #[must_use]
    pub fn call_queue(&self) -> Option<&Arc<dyn DispatchQueue>> {
        self.call_queue.as_ref()
    }

    /// Parse a class or enum schema and register it under its name.
    pub fn register_schema_str(&self, text: &str) -> Result<SchemaIdentifier> {
        let schema = Schema::parse(text)?;
        self.schemas.register_schema(&schema)
    }

    /// Parse a schema and register it under an explicit key.
    pub fn register_schema_with_key(&self, key: &str, text: &str) -> Result<SchemaIdentifier> {
        let key = Schema::parse(key).context("Invalid schema key")?;
        let schema = Schema::parse(text)?;
        Ok(self.schemas.register(key, schema))
    }

    /// Compiled marshaller of a registered entry.
    pub fn marshaller(&self, identifier: SchemaIdentifier) -> Result<ValueMarshaller<P>> {
        self.marshallers.marshaller_for_identifier(identifier)
    }

    /// Compiled marshaller of an arbitrary schema, keyed by its canonical key.
    pub fn marshaller_for_schema(&self, schema: &Schema) -> Result<ValueMarshaller<P>> {
        let mut registry = self.schemas.lock();
        Ok(self
            .marshallers
            .get_value_marshaller_for_schema(&mut registry, schema)?
            .marshaller)
    }

    /// Convert a platform value into an engine value.
    pub fn marshall(&self, identifier: SchemaIdentifier, value: &P) -> Result<Value> {
        self.marshaller(identifier)?.marshall(value)
    }

    /// Convert an engine value into a platform value.
    pub fn unmarshall(&self, identifier: SchemaIdentifier, value: &Value) -> Result<P> {
        self.marshaller(identifier)?.unmarshall(value)
    }

    /// Next identifier handed to a new proxy.
    pub fn next_proxy_id(&self) -> u32 {
        self.marshallers.next_proxy_id()
    }
}
