//! Userdata: opaque host-owned values with per-type dispatch hooks.
//!
//! A `UserData` carries only a numeric token; what it refers to is the
//! embedder's business. Behavior comes from its `MetaTable`, a fixed record
//! of optional hooks the interpreter consults for indexing, length, and
//! calls. When the last reference drops, the finalizer (if any) runs with
//! the token so the embedder can release whatever the token named.

use std::fmt;
use std::sync::Arc;

use crate::engine::Engine;
use crate::error::EngineResult;
use crate::value::Value;

pub type IndexFn = Box<dyn Fn(&Engine, &UserData, &Value) -> EngineResult<Value> + Send + Sync>;
pub type NewIndexFn =
    Box<dyn Fn(&Engine, &UserData, &Value, Value) -> EngineResult<()> + Send + Sync>;
pub type LenFn = Box<dyn Fn(&Engine, &UserData) -> EngineResult<Value> + Send + Sync>;
pub type CallFn = Box<dyn Fn(&Engine, &UserData, &[Value]) -> EngineResult<Vec<Value>> + Send + Sync>;
pub type FinalizeFn = Box<dyn Fn(u64) + Send + Sync>;

/// Dispatch hooks shared by every userdata of one host type.
pub struct MetaTable {
    pub type_name: &'static str,
    pub index: Option<IndexFn>,
    pub newindex: Option<NewIndexFn>,
    pub len: Option<LenFn>,
    pub call: Option<CallFn>,
}

impl MetaTable {
    pub fn new(type_name: &'static str) -> Self {
        MetaTable {
            type_name,
            index: None,
            newindex: None,
            len: None,
            call: None,
        }
    }
}

impl fmt::Debug for MetaTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetaTable")
            .field("type_name", &self.type_name)
            .field("index", &self.index.is_some())
            .field("newindex", &self.newindex.is_some())
            .field("len", &self.len.is_some())
            .field("call", &self.call.is_some())
            .finish()
    }
}

pub struct UserData {
    token: u64,
    meta: Arc<MetaTable>,
    finalizer: Option<FinalizeFn>,
}

impl UserData {
    pub fn new(token: u64, meta: Arc<MetaTable>, finalizer: Option<FinalizeFn>) -> Self {
        UserData {
            token,
            meta,
            finalizer,
        }
    }

    pub fn token(&self) -> u64 {
        self.token
    }

    pub fn meta(&self) -> &MetaTable {
        &self.meta
    }

    /// Identity of the metatable, for embedders that need to recognize
    /// their own userdata.
    pub fn meta_arc(&self) -> &Arc<MetaTable> {
        &self.meta
    }
}

impl Drop for UserData {
    fn drop(&mut self) {
        if let Some(f) = self.finalizer.take() {
            f(self.token);
        }
    }
}

impl fmt::Debug for UserData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserData")
            .field("token", &self.token)
            .field("type", &self.meta.type_name)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    #[test]
    fn finalizer_runs_once_on_last_drop() {
        static FREED: AtomicU64 = AtomicU64::new(0);
        let meta = Arc::new(MetaTable::new("thing"));
        let ud = Arc::new(UserData::new(
            7,
            meta,
            Some(Box::new(|token| {
                FREED.store(token, Ordering::SeqCst);
            })),
        ));
        let alias = ud.clone();
        drop(ud);
        assert_eq!(FREED.load(Ordering::SeqCst), 0);
        drop(alias);
        assert_eq!(FREED.load(Ordering::SeqCst), 7);
    }
}
