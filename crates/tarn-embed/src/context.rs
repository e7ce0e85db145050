//! An isolated execution context: one engine, one handle store, one
//! execution lock.
//!
//! All public operations serialize on a reentrant lock, so a context is
//! safe to share across threads while nested host -> guest -> host call
//! chains on one thread remain a plain call stack. Captured functions and
//! proxies hold only weak references back to the context; once the
//! context is dropped they fail cleanly instead of dangling.

use std::path::Path;
use std::sync::{Arc, Weak};

use parking_lot::ReentrantMutex;

use tarn_engine::Engine;

use crate::bridge;
use crate::convert;
use crate::error::{InteropError, InteropResult};
use crate::handles::HandleStore;
use crate::proxy::{self, ProxyMetas};
use crate::value::{HostValue, Signature};
use crate::HostFunction;

pub(crate) struct ContextShared {
    pub(crate) exec: ReentrantMutex<()>,
    pub(crate) engine: Engine,
    pub(crate) handles: Arc<HandleStore>,
    pub(crate) metas: ProxyMetas,
}

pub struct Context {
    shared: Arc<ContextShared>,
}

impl Context {
    pub fn new() -> Self {
        let shared = Arc::new_cyclic(|weak: &Weak<ContextShared>| ContextShared {
            exec: ReentrantMutex::new(()),
            engine: Engine::new(),
            handles: Arc::new(HandleStore::new()),
            metas: proxy::build_metas(weak.clone()),
        });
        Context { shared }
    }

    /// Parse and run a script. Environment entries are installed as
    /// globals first, marshaled by copy; host functions among them become
    /// callable globals.
    pub fn load_script(&self, source: &str, env: &[(&str, HostValue)]) -> InteropResult<()> {
        let _guard = self.shared.exec.lock();
        self.install_env(env);
        self.shared.engine.load(source, "script")?;
        Ok(())
    }

    /// Like [`load_script`](Context::load_script) but reading the source
    /// from a file; the path becomes the chunk name in parse errors.
    pub fn load_file(&self, path: impl AsRef<Path>, env: &[(&str, HostValue)]) -> InteropResult<()> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)?;
        let _guard = self.shared.exec.lock();
        self.install_env(env);
        self.shared
            .engine
            .load(&source, &path.to_string_lossy())?;
        Ok(())
    }

    fn install_env(&self, env: &[(&str, HostValue)]) {
        for (name, value) in env {
            let guest = convert::encode_copy(&self.shared, value);
            self.shared.engine.set_global(name, guest);
        }
    }

    /// Set one global, marshaled by copy.
    pub fn set_global(&self, name: &str, value: &HostValue) {
        let _guard = self.shared.exec.lock();
        let guest = convert::encode_copy(&self.shared, value);
        self.shared.engine.set_global(name, guest);
    }

    /// Read a global and decode it to a host value.
    pub fn get_global(&self, name: &str) -> InteropResult<HostValue> {
        let _guard = self.shared.exec.lock();
        let value = self.shared.engine.get_global(name);
        if value.is_nil() {
            return Err(InteropError::GlobalNotFound(name.to_string()));
        }
        convert::decode(&self.shared, &value)
    }

    /// Call a global guest function. Arguments are marshaled by
    /// reference; zero results decode to nil, one result to itself, and
    /// several to a sequence.
    pub fn call(&self, name: &str, args: &[HostValue]) -> InteropResult<HostValue> {
        let _guard = self.shared.exec.lock();
        let func = self.shared.engine.get_global(name);
        if func.is_nil() {
            return Err(InteropError::GlobalNotFound(name.to_string()));
        }
        if !bridge::is_callable(&func) {
            return Err(InteropError::NotCallable(name.to_string()));
        }
        bridge::call_guest(&self.shared, &func, args)
    }

    /// Bind a global guest function to a declared signature. The global
    /// is validated now but re-resolved at every call, so redefining it
    /// in the guest takes effect immediately.
    pub fn bind(&self, name: &str, signature: Signature) -> InteropResult<HostFunction> {
        let _guard = self.shared.exec.lock();
        bridge::bind_function(&self.shared, name, signature)
    }

    /// Number of live handle-store entries. Mostly useful for tests and
    /// leak diagnostics.
    pub fn handle_count(&self) -> usize {
        self.shared.handles.len()
    }
}

impl Default for Context {
    fn default() -> Self {
        Context::new()
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("handles", &self.shared.handles.len())
            .finish()
    }
}
