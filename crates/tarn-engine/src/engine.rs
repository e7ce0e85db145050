//! The engine: globals, the cross-call reference registry, and the
//! public load/call entry points.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::error::EngineResult;
use crate::interp::{Interp, Scope};
use crate::table::Table;
use crate::value::Value;

pub struct Engine {
    globals: Mutex<Table>,
    /// Values pinned on behalf of the host so they stay reachable
    /// between calls.
    registry: Mutex<FxHashMap<u64, Value>>,
    next_ref: AtomicU64,
}

impl Engine {
    pub fn new() -> Self {
        let engine = Engine {
            globals: Mutex::new(Table::new()),
            registry: Mutex::new(FxHashMap::default()),
            next_ref: AtomicU64::new(1),
        };
        crate::prelude::install(&engine);
        engine
    }

    /// Parse and execute a chunk of source at the top level. Functions and
    /// assignments made by the chunk land in the globals table; parse
    /// errors carry the chunk name.
    pub fn load(&self, source: &str, chunk_name: &str) -> EngineResult<()> {
        let block = crate::parser::parse(source).map_err(|e| e.with_chunk(chunk_name))?;
        let interp = Interp::new(self);
        interp.exec_block(&block, &Scope::root())?;
        Ok(())
    }

    /// Call any callable value with the given arguments.
    pub fn call(&self, func: &Value, args: &[Value]) -> EngineResult<Vec<Value>> {
        Interp::new(self).call_value(func, args)
    }

    pub fn get_global(&self, name: &str) -> Value {
        self.globals.lock().get_str(name)
    }

    pub fn set_global(&self, name: &str, value: Value) {
        self.globals.lock().set_str(name, value);
    }

    /// Pin a value in the registry; it stays alive until released.
    pub fn register_ref(&self, value: Value) -> u64 {
        let id = self.next_ref.fetch_add(1, Ordering::Relaxed);
        self.registry.lock().insert(id, value);
        id
    }

    pub fn lookup_ref(&self, id: u64) -> Option<Value> {
        self.registry.lock().get(&id).cloned()
    }

    pub fn release_ref(&self, id: u64) {
        self.registry.lock().remove(&id);
    }
}

impl Default for Engine {
    fn default() -> Self {
        Engine::new()
    }
}
