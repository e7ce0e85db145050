//! The handle store: a numeric indirection table between guest-held
//! tokens and host values.
//!
//! Guests never see host addresses; they hold a `u64` handle. Handle
//! numbers come from one process-wide counter, so a handle can never be
//! confused with a live entry of another store even after its own store
//! is gone.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;

use crate::value::HostValue;

static NEXT_HANDLE: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Default)]
pub struct HandleStore {
    entries: DashMap<u64, HostValue>,
}

impl HandleStore {
    pub fn new() -> Self {
        HandleStore::default()
    }

    /// Insert a value and return its fresh handle. Handles are never
    /// reused.
    pub fn register(&self, value: HostValue) -> u64 {
        let handle = NEXT_HANDLE.fetch_add(1, Ordering::Relaxed);
        self.entries.insert(handle, value);
        handle
    }

    pub fn lookup(&self, handle: u64) -> Option<HostValue> {
        self.entries.get(&handle).map(|e| e.value().clone())
    }

    /// Idempotent: removing an absent handle is a no-op.
    pub fn remove(&self, handle: u64) {
        self.entries.remove(&handle);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_and_lookup() {
        let store = HandleStore::new();
        let h = store.register(HostValue::Int(42));
        assert_eq!(store.lookup(h), Some(HostValue::Int(42)));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn handles_are_monotonic_and_unique() {
        let store = HandleStore::new();
        let a = store.register(HostValue::Nil);
        let b = store.register(HostValue::Nil);
        assert!(b > a);
    }

    #[test]
    fn remove_is_idempotent() {
        let store = HandleStore::new();
        let h = store.register(HostValue::Bool(true));
        store.remove(h);
        assert!(store.lookup(h).is_none());
        store.remove(h);
        assert!(store.is_empty());
    }

    #[test]
    fn handles_never_collide_across_stores() {
        let a = HandleStore::new();
        let b = HandleStore::new();
        let ha = a.register(HostValue::Int(1));
        let hb = b.register(HostValue::Int(2));
        assert_ne!(ha, hb);
        // a handle from one store is simply absent in the other
        assert!(a.lookup(hb).is_none());
        assert!(b.lookup(ha).is_none());
    }
}
