//! Script file cache keyed by modification time.
//!
//! Loading the same path again reuses the cached context as long as the
//! file's mtime is unchanged; a touched file gets a fresh context so
//! stale definitions never linger.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use once_cell::sync::Lazy;
use parking_lot::Mutex;

use crate::context::Context;
use crate::error::InteropResult;
use crate::value::HostValue;

struct CacheEntry {
    context: Arc<Context>,
    modified: SystemTime,
}

#[derive(Default)]
pub struct ScriptCache {
    entries: Mutex<HashMap<PathBuf, CacheEntry>>,
}

impl ScriptCache {
    pub fn new() -> Self {
        ScriptCache::default()
    }

    /// Load a script file, reusing the cached context when the file has
    /// not changed. The environment applies only when a fresh context is
    /// built.
    pub fn load(
        &self,
        path: impl AsRef<Path>,
        env: &[(&str, HostValue)],
    ) -> InteropResult<Arc<Context>> {
        self.load_with_status(path, env).map(|(context, _)| context)
    }

    /// Like [`load`](ScriptCache::load), also reporting whether the
    /// context came from the cache.
    pub fn load_with_status(
        &self,
        path: impl AsRef<Path>,
        env: &[(&str, HostValue)],
    ) -> InteropResult<(Arc<Context>, bool)> {
        let path = path.as_ref();
        let modified = std::fs::metadata(path)?.modified()?;

        let mut entries = self.entries.lock();
        if let Some(entry) = entries.get(path) {
            if entry.modified == modified {
                return Ok((entry.context.clone(), true));
            }
        }

        let context = Arc::new(Context::new());
        context.load_file(path, env)?;
        entries.insert(
            path.to_path_buf(),
            CacheEntry {
                context: context.clone(),
                modified,
            },
        );
        Ok((context, false))
    }

    pub fn contains(&self, path: impl AsRef<Path>) -> bool {
        self.entries.lock().contains_key(path.as_ref())
    }

    pub fn remove(&self, path: impl AsRef<Path>) {
        self.entries.lock().remove(path.as_ref());
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

/// Process-wide cache for embedders that want one shared instance.
pub fn global_cache() -> &'static ScriptCache {
    static CACHE: Lazy<ScriptCache> = Lazy::new(ScriptCache::new);
    &CACHE
}
