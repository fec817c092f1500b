// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Compiled value marshallers.
//!
//! A schema compiles into a graph of marshaller nodes stored in an arena and
//! addressed by [`MarshallerId`]. Nodes refer to their children by id, so
//! recursive schemas compile into cyclic graphs without reference cycles.
//!
//! Direction vocabulary:
//! - **unmarshall** converts an engine [`Value`] into a platform value `P`;
//! - **marshall** converts a platform value back into a [`Value`].
//!
//! [`MarshallerRegistry`] owns the compilation cache; [`ValueMarshaller`] is
//! a cheap handle onto one compiled node.

mod class;
mod node;
mod registry;
mod trampoline;

pub use class::{ClassDelegate, EnumClass, FunctionClass, InstanceArgs, ObjectClass};
pub use registry::{
    MarshallerProcessor, MarshallerRegistry, MarshallerRegistryListener, MarshallerWithSchema,
};
pub use trampoline::FunctionTrampoline;

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::delegate::{PlatformValue, PlatformValueDelegate};
use crate::error::{Error, Result};
use crate::value::Value;

use node::MarshallerNode;

/// Index of a node in the marshaller arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MarshallerId(u32);

impl MarshallerId {
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

impl fmt::Display for MarshallerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "marshaller#{}", self.0)
    }
}

/// Slot storage for compiled nodes. Released slots are handed out again by
/// later reservations.
struct NodeArena<T> {
    slots: Vec<Option<Arc<T>>>,
    free: Vec<MarshallerId>,
}

impl<T> NodeArena<T> {
    fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
        }
    }

    fn reserve(&mut self) -> MarshallerId {
        if let Some(id) = self.free.pop() {
            return id;
        }
        self.slots.push(None);
        MarshallerId::new((self.slots.len() - 1) as u32)
    }

    fn fill(&mut self, id: MarshallerId, node: T) {
        if let Some(slot) = self.slots.get_mut(id.index()) {
            *slot = Some(Arc::new(node));
        }
    }

    fn release(&mut self, id: MarshallerId) {
        let Some(slot) = self.slots.get_mut(id.index()) else {
            return;
        };
        *slot = None;
        if !self.free.contains(&id) {
            self.free.push(id);
        }
    }

    fn get(&self, id: MarshallerId) -> Option<Arc<T>> {
        self.slots.get(id.index()).and_then(Clone::clone)
    }

    fn len(&self) -> usize {
        self.slots.len()
    }
}

/// Arena of compiled nodes plus the runtime services they use.
pub(crate) struct MarshallerCore<P: PlatformValue> {
    nodes: RwLock<NodeArena<MarshallerNode<P>>>,
    delegate: Arc<dyn PlatformValueDelegate<P>>,
    next_proxy_id: AtomicU32,
}

impl<P: PlatformValue> MarshallerCore<P> {
    pub(crate) fn new(delegate: Arc<dyn PlatformValueDelegate<P>>) -> Self {
        Self {
            nodes: RwLock::new(NodeArena::new()),
            delegate,
            next_proxy_id: AtomicU32::new(1),
        }
    }

    pub(crate) fn delegate(&self) -> &dyn PlatformValueDelegate<P> {
        self.delegate.as_ref()
    }

    pub(crate) fn next_proxy_id(&self) -> u32 {
        self.next_proxy_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Reserve an empty slot, filled once its node is built.
    pub(crate) fn reserve(&self) -> MarshallerId {
        self.nodes.write().reserve()
    }

    pub(crate) fn fill(&self, id: MarshallerId, node: MarshallerNode<P>) {
        self.nodes.write().fill(id, node);
    }

    /// Empty a slot so its node is no longer reachable through its id. The
    /// slot is reused by the next reservation.
    pub(crate) fn release(&self, id: MarshallerId) {
        self.nodes.write().release(id);
    }

    pub(crate) fn node(&self, id: MarshallerId) -> Result<Arc<MarshallerNode<P>>> {
        self.nodes
            .read()
            .get(id)
            .ok_or_else(|| Error::message(format!("Unresolved {}", id)))
    }

    /// Number of arena slots, filled or free.
    pub(crate) fn slot_count(&self) -> usize {
        self.nodes.read().len()
    }

    pub(crate) fn is_indirect(&self, id: MarshallerId) -> bool {
        self.node(id)
            .map(|node| matches!(node.as_ref(), MarshallerNode::Indirect(_)))
            .unwrap_or(false)
    }

    pub(crate) fn unmarshall(self: &Arc<Self>, id: MarshallerId, value: &Value) -> Result<P> {
        self.node(id)?.unmarshall(self, id, value)
    }

    pub(crate) fn marshall(
        self: &Arc<Self>,
        id: MarshallerId,
        receiver: Option<&P>,
        value: &P,
    ) -> Result<Value> {
        self.node(id)?.marshall(self, id, receiver, value)
    }

    pub(crate) fn handle(self: &Arc<Self>, id: MarshallerId) -> ValueMarshaller<P> {
        ValueMarshaller::new(Arc::clone(self), id)
    }

    pub(crate) fn is_optional(&self, id: MarshallerId) -> bool {
        self.node(id).map(|node| node.is_optional(self)).unwrap_or(false)
    }
}

/// Handle onto a compiled marshaller.
pub struct ValueMarshaller<P: PlatformValue> {
    core: Arc<MarshallerCore<P>>,
    id: MarshallerId,
}

impl<P: PlatformValue> Clone for ValueMarshaller<P> {
    fn clone(&self) -> Self {
        Self {
            core: Arc::clone(&self.core),
            id: self.id,
        }
    }
}

impl<P: PlatformValue> fmt::Debug for ValueMarshaller<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValueMarshaller").field("id", &self.id).finish()
    }
}

impl<P: PlatformValue> ValueMarshaller<P> {
    pub(crate) fn new(core: Arc<MarshallerCore<P>>, id: MarshallerId) -> Self {
        Self { core, id }
    }

    #[must_use]
    pub fn id(&self) -> MarshallerId {
        self.id
    }

    /// Convert an engine value into a platform value.
    pub fn unmarshall(&self, value: &Value) -> Result<P> {
        self.core.unmarshall(self.id, value)
    }

    /// Convert a platform value into an engine value.
    pub fn marshall(&self, value: &P) -> Result<Value> {
        self.core.marshall(self.id, None, value)
    }

    /// Like [`ValueMarshaller::marshall`], for a value read from `receiver`.
    pub fn marshall_with_receiver(&self, receiver: Option<&P>, value: &P) -> Result<Value> {
        self.core.marshall(self.id, receiver, value)
    }

    /// Whether null and undefined pass through this marshaller.
    #[must_use]
    pub fn is_optional(&self) -> bool {
        self.core.is_optional(self.id)
    }
}
