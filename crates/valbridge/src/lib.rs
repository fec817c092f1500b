// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! valbridge - schema-driven value marshalling
//!
//! Converts a dynamic in-process value model ([`Value`]) into and out of a
//! host platform's native values, guided by type schemas resolved at
//! runtime.
//!
//! # Features
//!
//! - **Schema registry**: named and generic types, resolved lazily
//! - **Compiled marshallers**: one cached graph per schema key, recursive
//!   types included
//! - **Object strategies**: plain objects, interfaces, enums, functions and
//!   untyped passthrough
//! - **Proxy identity**: an object crossing the boundary twice yields the
//!   same proxy, and a proxy coming back yields the original object
//! - **Async bridging**: promises and queued host calls
//!
//! # Direction vocabulary
//!
//! - **unmarshall**: [`Value`] into a platform value
//! - **marshall**: platform value into a [`Value`]
//!
//! # Schema grammar
//!
//! ```
//! use valbridge::Schema;
//!
//! let schema = Schema::parse("c 'User'{'name': s, 'age': i?, 'tags': a<s>}").unwrap();
//! assert_eq!(schema.declared_name(), Some("User"));
//! ```
//!
//! # Configuration File
//!
//! ```toml
//! platform_name = "android"
//!
//! [dispatch]
//! worker_queue = true
//! queue_name = "valbridge-worker"
//! ```

pub mod bridge;
pub mod config;
pub mod context;
pub mod delegate;
pub mod dispatch;
pub mod error;
pub mod marshaller;
pub mod object_store;
pub mod promise;
pub mod registry;
pub mod schema;
pub mod value;

pub use bridge::handle_bridge_call;
pub use config::{ConfigError, DispatchConfig, MarshallingConfig};
pub use context::MarshallingContext;
pub use delegate::{
    ArrayBuilder, CollectionKind, EntryVisitor, EnumClassDelegate, FunctionClassDelegate, MapKey,
    ObjectClassDelegate, PlatformArrayIterator, PlatformValue, PlatformValueDelegate,
};
pub use dispatch::{DispatchQueue, DispatchTask, SerialWorkerQueue};
pub use error::{Direction, Error, Result, ResultExt};
pub use marshaller::{
    FunctionTrampoline, MarshallerId, MarshallerProcessor, MarshallerRegistry,
    MarshallerRegistryListener, MarshallerWithSchema, ValueMarshaller,
};
pub use object_store::{PlatformObjectStore, ProxyAttachments, WeakObjectTable};
pub use promise::{Promise, PromiseState};
pub use registry::{
    RegistryGuard, SchemaEntry, SchemaIdentifier, SchemaRegistry, SchemaRegistryKey,
    SchemaRegistryListener,
};
pub use schema::{ClassSchema, EnumSchema, FunctionSchema, Schema, SchemaKind};
pub use value::{
    CallContext, CallFlags, Es6Map, Es6Set, OpaqueObject, ProxyObject, SingleCallFunction, TypedArray,
    TypedArrayKind, TypedObject, Value, ValueFunction, ValueMap,
};
