//! The function bridge: calls crossing the boundary in both directions.
//!
//! Host -> guest: arguments go over by reference and results come back
//! decoded, collapsed to nil / single value / sequence. Guest -> host:
//! a host function travels as a handle-backed wrapper; the guest only
//! ever holds the handle, never the function's address.

use std::sync::Arc;

use tarn_engine::{EngineError, NativeFunction, Value};

use crate::context::ContextShared;
use crate::convert::{decode, decode_results, encode_copy, encode_ref};
use crate::error::{to_engine_error, InteropError, InteropResult};
use crate::handles::HandleStore;
use crate::reflect;
use crate::value::{HostFunction, HostValue, Kind, Signature};

pub(crate) fn is_callable(value: &Value) -> bool {
    match value {
        Value::Function(_) | Value::Native(_) => true,
        Value::UserData(ud) => ud.meta().call.is_some(),
        _ => false,
    }
}

// ============================================================================
// Host -> guest calls
// ============================================================================

/// Call a guest callable with host arguments marshaled by reference.
pub(crate) fn call_guest(
    shared: &Arc<ContextShared>,
    func: &Value,
    args: &[HostValue],
) -> InteropResult<HostValue> {
    let guest_args: Vec<Value> = args.iter().map(|arg| encode_ref(shared, arg)).collect();
    let results = shared.engine.call(func, &guest_args)?;
    decode_results(shared, &results)
}

/// Bind a guest global to a declared signature. The binding validates the
/// global now but resolves it again on every call, so the guest may
/// redefine it later. Declared results are truncated or nil-padded to the
/// signature; a guest fault surfaces through the error slot when the
/// signature declares one, which on the host side is just the `Err` arm.
pub(crate) fn bind_function(
    shared: &Arc<ContextShared>,
    name: &str,
    signature: Signature,
) -> InteropResult<HostFunction> {
    let current = shared.engine.get_global(name);
    if current.is_nil() {
        return Err(InteropError::GlobalNotFound(name.to_string()));
    }
    if !is_callable(&current) {
        return Err(InteropError::NotCallable(name.to_string()));
    }

    let weak = Arc::downgrade(shared);
    let global = name.to_string();
    let sig = signature.clone();
    let body = move |args: &[HostValue]| -> InteropResult<Vec<HostValue>> {
        let shared = weak.upgrade().ok_or(InteropError::ContextGone)?;
        let _guard = shared.exec.lock();
        let func = shared.engine.get_global(&global);
        if func.is_nil() {
            return Err(InteropError::GlobalNotFound(global.clone()));
        }
        let guest_args: Vec<Value> = args.iter().map(|arg| encode_ref(&shared, arg)).collect();
        let mut results = shared.engine.call(&func, &guest_args)?;
        results.resize(sig.value_results(), Value::Nil);
        results
            .iter()
            .map(|result| decode(&shared, result))
            .collect()
    };
    Ok(HostFunction::new(name, signature, body))
}

// ============================================================================
// Guest -> host calls
// ============================================================================

/// Wrap a host function as a guest callable on the copy path. The guest
/// value carries only a handle; arguments decode before the call and
/// results go back by copy. The handle retires when the guest drops the
/// wrapper.
pub(crate) fn wrap_host_fn(shared: &Arc<ContextShared>, func: &HostFunction) -> Value {
    let handle = shared.handles.register(HostValue::Func(func.clone()));
    let guard = StoreGuard {
        store: Arc::downgrade(&shared.handles),
        handle,
    };
    let weak = Arc::downgrade(shared);
    let name = func.name().to_string();
    Value::Native(Arc::new(NativeFunction::new(
        func.name(),
        move |_, args| {
            let _keep = &guard;
            let shared = weak
                .upgrade()
                .ok_or_else(|| EngineError::runtime(format!("host function '{}' is gone", name)))?;
            let func = match shared.handles.lookup(handle) {
                Some(HostValue::Func(func)) => func,
                _ => {
                    return Err(EngineError::runtime(format!(
                        "host function '{}' is gone",
                        name
                    )))
                }
            };
            let mut host_args = Vec::with_capacity(args.len());
            for arg in args {
                host_args.push(decode(&shared, arg).map_err(to_engine_error)?);
            }
            let results = reflect::invoke(&func, &host_args).map_err(to_engine_error)?;
            Ok(results
                .iter()
                .map(|result| encode_copy(&shared, result))
                .collect())
        },
    )))
}

/// Capture a guest callable as a host function. The callable is pinned
/// in the engine's registry and released when the host drops the last
/// clone of the wrapper; calling after the context is gone fails with
/// [`InteropError::ContextGone`].
pub(crate) fn capture_guest_fn(shared: &Arc<ContextShared>, value: &Value) -> HostFunction {
    let id = shared.engine.register_ref(value.clone());
    let weak = Arc::downgrade(shared);
    let guard = RegistryGuard {
        shared: weak.clone(),
        id,
    };
    let name = match value {
        Value::Function(closure) => closure
            .name
            .clone()
            .unwrap_or_else(|| "guest function".to_string()),
        Value::Native(native) => native.name().to_string(),
        _ => "guest function".to_string(),
    };
    let signature = Signature::new(Vec::new(), vec![Kind::Any]).variadic();
    HostFunction::new(name, signature, move |args| {
        let _keep = &guard;
        let shared = weak.upgrade().ok_or(InteropError::ContextGone)?;
        let _lock = shared.exec.lock();
        let func = shared
            .engine
            .lookup_ref(id)
            .ok_or(InteropError::StaleHandle(id))?;
        let guest_args: Vec<Value> = args.iter().map(|arg| encode_ref(&shared, arg)).collect();
        let results = shared.engine.call(&func, &guest_args)?;
        results
            .iter()
            .map(|result| decode(&shared, result))
            .collect()
    })
}

/// Retires a handle-store entry when the owning wrapper drops.
struct StoreGuard {
    store: std::sync::Weak<HandleStore>,
    handle: u64,
}

impl Drop for StoreGuard {
    fn drop(&mut self) {
        if let Some(store) = self.store.upgrade() {
            store.remove(self.handle);
        }
    }
}

/// Releases a pinned registry entry when the capturing wrapper drops.
struct RegistryGuard {
    shared: std::sync::Weak<ContextShared>,
    id: u64,
}

impl Drop for RegistryGuard {
    fn drop(&mut self) {
        if let Some(shared) = self.shared.upgrade() {
            shared.engine.release_ref(self.id);
        }
    }
}
