// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! ES6-style collections carried as opaque objects.
//!
//! Both collections keep a flat entry list: `[k0, v0, k1, v1, ...]` for maps
//! and `[v0, v1, ...]` for sets, in insertion order.

use std::any::Any;
use std::sync::Arc;

use super::{OpaqueObject, Value};

/// Ordered key/value collection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Es6Map {
    pub entries: Vec<Value>,
}

impl Es6Map {
    #[must_use]
    pub fn new(entries: Vec<Value>) -> Arc<Self> {
        Arc::new(Self { entries })
    }

    /// Number of key/value pairs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len() / 2
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.len() < 2
    }

    /// Iterate over `(key, value)` pairs; a dangling trailing key is ignored.
    pub fn pairs(&self) -> impl Iterator<Item = (&Value, &Value)> {
        self.entries.chunks_exact(2).map(|pair| (&pair[0], &pair[1]))
    }
}

impl OpaqueObject for Es6Map {
    fn class_name(&self) -> &str {
        "ES6Map"
    }

    fn to_value(&self) -> Option<Value> {
        Some(Value::array(self.entries.clone()))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

/// Ordered value collection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Es6Set {
    pub entries: Vec<Value>,
}

impl Es6Set {
    #[must_use]
    pub fn new(entries: Vec<Value>) -> Arc<Self> {
        Arc::new(Self { entries })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl OpaqueObject for Es6Set {
    fn class_name(&self) -> &str {
        "ES6Set"
    }

    fn to_value(&self) -> Option<Value> {
        Some(Value::array(self.entries.clone()))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}
