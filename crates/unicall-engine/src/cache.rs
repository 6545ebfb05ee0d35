//! Instance reuse cache.
//!
//! When a request sets `reuse:true`, the constructed receiver is kept and
//! handed back to later requests that construct the *same* instance: same
//! class identity, same constructor choice, same serialized constructor
//! arguments. State mutated by one invocation is therefore visible to the
//! next, which is exactly what reuse is for.
//!
//! The cache is unbounded by default (matching the reference runtimes,
//! where it lives for a test session). With a capacity set, the
//! oldest-inserted entry is evicted first.

use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use tracing::debug;
use unicall_types::InstanceHandle;

/// Keyed store of constructed receivers.
pub struct InstanceCache {
    capacity: usize,
    inner: Mutex<CacheState>,
}

struct CacheState {
    map: HashMap<String, InstanceHandle>,
    order: VecDeque<String>,
}

impl InstanceCache {
    /// Creates a cache; `capacity == 0` means unbounded.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            inner: Mutex::new(CacheState {
                map: HashMap::new(),
                order: VecDeque::new(),
            }),
        }
    }

    /// Builds the reuse key for one construction.
    ///
    /// The serialized argument list is part of the identity: constructing
    /// with different arguments yields a different cached instance.
    #[must_use]
    pub fn key(qualified: &str, constructor: &str, args: &serde_json::Value) -> String {
        format!("{qualified}#{constructor}#{args}")
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<InstanceHandle> {
        self.inner.lock().map.get(key).cloned()
    }

    /// Stores a handle, evicting the oldest entry when over capacity.
    pub fn insert(&self, key: String, handle: InstanceHandle) {
        let mut state = self.inner.lock();
        if state.map.insert(key.clone(), handle).is_none() {
            state.order.push_back(key);
        }
        if self.capacity > 0 {
            while state.map.len() > self.capacity {
                let Some(oldest) = state.order.pop_front() else {
                    break;
                };
                state.map.remove(&oldest);
                debug!(key = %oldest, "evicted reused instance");
            }
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().map.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every cached instance.
    pub fn clear(&self) {
        let mut state = self.inner.lock();
        state.map.clear();
        state.order.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn handle(n: i64) -> InstanceHandle {
        InstanceHandle::of("m$T", n)
    }

    #[test]
    fn key_includes_arguments() {
        let a = InstanceCache::key("p$T", "", &json!([1, 0, "X"]));
        let b = InstanceCache::key("p$T", "", &json!([2, 0, "X"]));
        let c = InstanceCache::key("p$T", "make", &json!([1, 0, "X"]));
        assert_ne!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn get_returns_same_handle() {
        let cache = InstanceCache::new(0);
        let h = handle(1);
        cache.insert("k".into(), h.clone());
        assert!(cache.get("k").unwrap().ptr_eq(&h));
        assert!(cache.get("other").is_none());
    }

    #[test]
    fn unbounded_by_default() {
        let cache = InstanceCache::new(0);
        for i in 0..100 {
            cache.insert(format!("k{i}"), handle(i));
        }
        assert_eq!(cache.len(), 100);
    }

    #[test]
    fn fifo_eviction_with_capacity() {
        let cache = InstanceCache::new(2);
        cache.insert("a".into(), handle(1));
        cache.insert("b".into(), handle(2));
        cache.insert("c".into(), handle(3));
        assert_eq!(cache.len(), 2);
        assert!(cache.get("a").is_none());
        assert!(cache.get("b").is_some());
        assert!(cache.get("c").is_some());
    }

    #[test]
    fn reinsert_does_not_grow_order() {
        let cache = InstanceCache::new(2);
        cache.insert("a".into(), handle(1));
        cache.insert("a".into(), handle(2));
        cache.insert("b".into(), handle(3));
        assert_eq!(cache.len(), 2);
        assert!(cache.get("a").is_some());
    }

    #[test]
    fn clear_empties() {
        let cache = InstanceCache::new(0);
        cache.insert("a".into(), handle(1));
        cache.clear();
        assert!(cache.is_empty());
    }
}
