// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Cross-boundary object identity.
//!
//! Native objects crossing the boundary as interfaces are represented by
//! proxies. The store keeps two relations:
//!
//! - native object → [`ProxyAttachments`], one live proxy per marshaller,
//!   so marshalling the same object twice under the same schema yields the
//!   same proxy while distinct schemas never share one;
//! - proxy id → native object, so a proxy coming back is unwrapped into the
//!   object it was created for.
//!
//! Hosts own the storage (attachments usually live on the native object
//! itself); [`WeakObjectTable`] covers the id side.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use dashmap::DashMap;
use parking_lot::{Mutex, ReentrantMutex};

use crate::delegate::PlatformValue;
use crate::error::Result;
use crate::marshaller::MarshallerId;
use crate::value::ProxyObject;

/// Identity storage provided by the host.
pub trait PlatformObjectStore<P: PlatformValue>: Send + Sync {
    /// Lock serializing proxy creation and lookups. Reentrant because
    /// marshalling a proxy's properties may marshall nested interfaces.
    fn mutex(&self) -> &ReentrantMutex<()>;

    /// Attachments previously stored on `object`.
    fn value_for_object_key(&self, object: &P) -> Result<Option<Arc<ProxyAttachments>>>;

    fn set_value_for_object_key(&self, object: &P, value: Arc<ProxyAttachments>) -> Result<()>;

    /// Native object a proxy id was created for, if still alive.
    fn object_for_id(&self, id: u32) -> Result<Option<P>>;

    /// Record `object` under `id`. The store must not keep it alive.
    fn set_object_for_id(&self, id: u32, object: &P) -> Result<()>;
}

enum AttachedProxy {
    Weak(Weak<dyn ProxyObject>),
    Strong(Arc<dyn ProxyObject>),
}

impl AttachedProxy {
    fn get(&self) -> Option<Arc<dyn ProxyObject>> {
        match self {
            AttachedProxy::Weak(weak) => weak.upgrade(),
            AttachedProxy::Strong(proxy) => Some(Arc::clone(proxy)),
        }
    }
}

/// Proxies attached to one native object, keyed by the marshaller that
/// produced them.
#[derive(Default)]
pub struct ProxyAttachments {
    proxies: Mutex<HashMap<MarshallerId, AttachedProxy>>,
}

impl ProxyAttachments {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Live proxy for `source`. Expired entries are dropped.
    #[must_use]
    pub fn proxy(&self, source: MarshallerId) -> Option<Arc<dyn ProxyObject>> {
        let mut proxies = self.proxies.lock();
        let proxy = proxies.get(&source)?.get();
        if proxy.is_none() {
            proxies.remove(&source);
        }
        proxy
    }

    /// Attach `proxy`. A retained proxy lives as long as the attachments.
    pub fn set_proxy(&self, source: MarshallerId, proxy: &Arc<dyn ProxyObject>, retain: bool) {
        let entry = if retain {
            AttachedProxy::Strong(Arc::clone(proxy))
        } else {
            AttachedProxy::Weak(Arc::downgrade(proxy))
        };
        self.proxies.lock().insert(source, entry);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.proxies.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.proxies.lock().is_empty()
    }
}

/// Attachments of `object`, created on first use.
pub fn attachments_for<P, S>(store: &S, object: &P) -> Result<Arc<ProxyAttachments>>
where
    P: PlatformValue,
    S: PlatformObjectStore<P> + ?Sized,
{
    if let Some(attachments) = store.value_for_object_key(object)? {
        return Ok(attachments);
    }
    let attachments = ProxyAttachments::new();
    store.set_value_for_object_key(object, Arc::clone(&attachments))?;
    Ok(attachments)
}

/// Live proxy of `object` for `source`, or a new one from `create`.
///
/// A created proxy is attached weakly and its id recorded against `object`.
pub fn get_or_create_proxy<P, S, F>(
    store: &S,
    object: &P,
    source: MarshallerId,
    create: F,
) -> Result<Arc<dyn ProxyObject>>
where
    P: PlatformValue,
    S: PlatformObjectStore<P> + ?Sized,
    F: FnOnce() -> Result<Arc<dyn ProxyObject>>,
{
    let _lock = store.mutex().lock();
    let attachments = attachments_for(store, object)?;
    if let Some(proxy) = attachments.proxy(source) {
        return Ok(proxy);
    }

    let proxy = create()?;
    attachments.set_proxy(source, &proxy, false);
    store.set_object_for_id(proxy.id(), object)?;
    log::debug!("[marshaller] created proxy #{} for {}", proxy.id(), source);
    Ok(proxy)
}

/// Record that `object` was built from `proxy` and keep the proxy alive
/// with it.
pub fn retain_proxy<P, S>(
    store: &S,
    object: &P,
    source: MarshallerId,
    proxy: &Arc<dyn ProxyObject>,
) -> Result<()>
where
    P: PlatformValue,
    S: PlatformObjectStore<P> + ?Sized,
{
    let _lock = store.mutex().lock();
    store.set_object_for_id(proxy.id(), object)?;
    attachments_for(store, object)?.set_proxy(source, proxy, true);
    Ok(())
}

/// Concurrent id → object table holding weak references.
pub struct WeakObjectTable<T: ?Sized> {
    entries: DashMap<u32, Weak<T>>,
}

impl<T: ?Sized> Default for WeakObjectTable<T> {
    fn default() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }
}

impl<T: ?Sized> WeakObjectTable<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Live object for `id`. An expired entry is removed.
    #[must_use]
    pub fn get(&self, id: u32) -> Option<Arc<T>> {
        let object = self.entries.get(&id)?.upgrade();
        if object.is_none() {
            self.entries.remove_if(&id, |_, weak| weak.strong_count() == 0);
        }
        object
    }

    pub fn insert(&self, id: u32, object: &Arc<T>) {
        self.entries.insert(id, Arc::downgrade(object));
    }

    pub fn remove(&self, id: u32) -> Option<Arc<T>> {
        self.entries.remove(&id).and_then(|(_, weak)| weak.upgrade())
    }

    /// Drop every expired entry; returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, weak| weak.strong_count() > 0);
        before - self.entries.len()
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

#[cfg(test)]
mod tests {
    use std::any::Any;

    use super::*;
    use crate::schema::ClassSchema;
    use crate::value::TypedObject;

    struct Native {
        attachments: Mutex<Option<Arc<ProxyAttachments>>>,
    }

    struct Store {
        lock: ReentrantMutex<()>,
        ids: WeakObjectTable<Native>,
    }

    impl PlatformObjectStore<Arc<Native>> for Store {
        fn mutex(&self) -> &ReentrantMutex<()> {
            &self.lock
        }

        fn value_for_object_key(&self, object: &Arc<Native>) -> Result<Option<Arc<ProxyAttachments>>> {
            Ok(object.attachments.lock().clone())
        }

        fn set_value_for_object_key(&self, object: &Arc<Native>, value: Arc<ProxyAttachments>) -> Result<()> {
            *object.attachments.lock() = Some(value);
            Ok(())
        }

        fn object_for_id(&self, id: u32) -> Result<Option<Arc<Native>>> {
            Ok(self.ids.get(id))
        }

        fn set_object_for_id(&self, id: u32, object: &Arc<Native>) -> Result<()> {
            self.ids.insert(id, object);
            Ok(())
        }
    }

    struct Proxy {
        typed: Arc<TypedObject>,
        id: u32,
    }

    impl ProxyObject for Proxy {
        fn typed_object(&self) -> &Arc<TypedObject> {
            &self.typed
        }

        fn id(&self) -> u32 {
            self.id
        }

        fn proxy_type(&self) -> &str {
            "test"
        }

        fn as_any(&self) -> &dyn Any {
            self
        }

        fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
            self
        }
    }

    fn store() -> Store {
        Store {
            lock: ReentrantMutex::new(()),
            ids: WeakObjectTable::new(),
        }
    }

    fn native() -> Arc<Native> {
        Arc::new(Native {
            attachments: Mutex::new(None),
        })
    }

    fn proxy(id: u32) -> Arc<dyn ProxyObject> {
        let class = Arc::new(ClassSchema::new("Thing", true, Vec::new()));
        Arc::new(Proxy {
            typed: TypedObject::new(class, Vec::new()),
            id,
        })
    }

    #[test]
    fn test_same_source_returns_live_proxy() {
        let store = store();
        let object = native();
        let source = MarshallerId::new(1);

        let first = get_or_create_proxy(&store, &object, source, || Ok(proxy(7))).expect("create");
        let second = get_or_create_proxy(&store, &object, source, || panic!("should reuse"))
            .expect("reuse");

        assert!(Arc::ptr_eq(&first, &second));
        let recorded = store.object_for_id(7).expect("lookup").expect("recorded");
        assert!(Arc::ptr_eq(&recorded, &object));
    }

    #[test]
    fn test_distinct_sources_get_distinct_proxies() {
        let store = store();
        let object = native();

        let a = get_or_create_proxy(&store, &object, MarshallerId::new(1), || Ok(proxy(1)))
            .expect("a");
        let b = get_or_create_proxy(&store, &object, MarshallerId::new(2), || Ok(proxy(2)))
            .expect("b");

        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(attachments_for(&store, &object).expect("attachments").len(), 2);
    }

    #[test]
    fn test_expired_proxy_is_replaced() {
        let store = store();
        let object = native();
        let source = MarshallerId::new(3);

        let first = get_or_create_proxy(&store, &object, source, || Ok(proxy(10))).expect("first");
        drop(first);

        let second = get_or_create_proxy(&store, &object, source, || Ok(proxy(11))).expect("second");
        assert_eq!(second.id(), 11);
    }

    #[test]
    fn test_retained_proxy_outlives_caller() {
        let store = store();
        let object = native();
        let source = MarshallerId::new(4);

        retain_proxy(&store, &object, source, &proxy(20)).expect("retain");

        let again = get_or_create_proxy(&store, &object, source, || panic!("retained"))
            .expect("lookup");
        assert_eq!(again.id(), 20);
    }

    #[test]
    fn test_weak_table_drops_dead_objects() {
        let table = WeakObjectTable::new();
        let alive = native();
        {
            let dead = native();
            table.insert(1, &dead);
        }
        table.insert(2, &alive);

        assert!(table.get(1).is_none());
        assert!(table.get(2).is_some());
        table.insert(3, &native());
        assert_eq!(table.purge_expired(), 1);
        assert_eq!(table.len(), 1);
    }
}
