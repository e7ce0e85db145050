//! The proxy object protocol.
//!
//! A proxy is a guest userdata whose token is a handle-store entry. Two
//! metatables cover every host type: one for data composites (index,
//! newindex, len, finalize) and one for functions (call, finalize). The
//! hooks hold the context weakly; a proxy that outlives its context
//! degrades instead of dangling.
//!
//! Dispatch is forgiving on reads and strict on writes: a missing entry,
//! stale handle, or dead context reads as nil and has length 0, but a
//! write or call in the same situation raises a guest error.

use std::sync::{Arc, Weak};

use tarn_engine::{EngineError, MetaTable, Value};

use crate::context::ContextShared;
use crate::convert::{decode, encode_ref};
use crate::error::{to_engine_error, InteropError, InteropResult};
use crate::reflect::{self, upper_first};
use crate::value::HostValue;

pub(crate) struct ProxyMetas {
    pub(crate) object: Arc<MetaTable>,
    pub(crate) function: Arc<MetaTable>,
}

pub(crate) fn build_metas(weak: Weak<ContextShared>) -> ProxyMetas {
    ProxyMetas {
        object: Arc::new(object_meta(weak.clone())),
        function: Arc::new(function_meta(weak)),
    }
}

fn object_meta(weak: Weak<ContextShared>) -> MetaTable {
    let mut meta = MetaTable::new("hostobject");

    let w = weak.clone();
    meta.index = Some(Box::new(move |_, ud, key| {
        let shared = match w.upgrade() {
            Some(shared) => shared,
            None => return Ok(Value::Nil),
        };
        let target = match shared.handles.lookup(ud.token()) {
            Some(target) => target,
            None => return Ok(Value::Nil),
        };
        proxy_get(&shared, &target, key).map_err(to_engine_error)
    }));

    let w = weak.clone();
    meta.newindex = Some(Box::new(move |_, ud, key, value| {
        let shared = w
            .upgrade()
            .ok_or_else(|| EngineError::runtime("host object is gone"))?;
        let target = shared
            .handles
            .lookup(ud.token())
            .ok_or_else(|| EngineError::runtime("host object is gone"))?;
        proxy_set(&shared, &target, key, value).map_err(to_engine_error)
    }));

    let w = weak;
    meta.len = Some(Box::new(move |_, ud| {
        let len = w
            .upgrade()
            .and_then(|shared| shared.handles.lookup(ud.token()))
            .map(|target| proxy_len(&target))
            .unwrap_or(0);
        Ok(Value::Number(len as f64))
    }));

    meta
}

fn function_meta(weak: Weak<ContextShared>) -> MetaTable {
    let mut meta = MetaTable::new("hostfunction");

    // functions have no elements
    meta.len = Some(Box::new(|_, _| Ok(Value::Number(0.0))));

    meta.call = Some(Box::new(move |_, ud, args| {
        let shared = weak
            .upgrade()
            .ok_or_else(|| EngineError::runtime("host function is gone"))?;
        let target = shared
            .handles
            .lookup(ud.token())
            .ok_or_else(|| EngineError::runtime("host function is gone"))?;
        let func = match target {
            HostValue::Func(func) => func,
            other => {
                return Err(EngineError::runtime(format!(
                    "host value is not callable ({})",
                    other.type_name()
                )))
            }
        };
        let mut host_args = Vec::with_capacity(args.len());
        for arg in args {
            host_args.push(decode(&shared, arg).map_err(to_engine_error)?);
        }
        let results = reflect::invoke(&func, &host_args).map_err(to_engine_error)?;
        // results flow back by reference so the guest can mutate them
        Ok(results
            .iter()
            .map(|result| encode_ref(&shared, result))
            .collect())
    }));

    meta
}

// ============================================================================
// Generic access
// ============================================================================

fn proxy_get(
    shared: &Arc<ContextShared>,
    target: &HostValue,
    key: &Value,
) -> InteropResult<Value> {
    match target {
        HostValue::Seq(seq) => {
            let index = match normalize_index(key, seq.len()) {
                Some(index) => index,
                None => return Ok(Value::Nil),
            };
            match seq.get(index) {
                Some(item) => Ok(encode_ref(shared, &item)),
                None => Ok(Value::Nil),
            }
        }
        HostValue::Map(map) => match key.as_str().and_then(|k| map.get(k)) {
            Some(item) => Ok(encode_ref(shared, &item)),
            None => Ok(Value::Nil),
        },
        HostValue::Record(record) => {
            let name = match key.as_str() {
                Some(name) => upper_first(name),
                None => return Ok(Value::Nil),
            };
            if let Some(field) = record.field(&name) {
                return Ok(encode_ref(shared, &field));
            }
            if let Some(method) = record.method(&name) {
                return Ok(encode_ref(shared, &HostValue::Func(method)));
            }
            Ok(Value::Nil)
        }
        _ => Ok(Value::Nil),
    }
}

fn proxy_set(
    shared: &Arc<ContextShared>,
    target: &HostValue,
    key: &Value,
    value: Value,
) -> InteropResult<()> {
    let incoming = decode(shared, &value)?;
    match target {
        HostValue::Seq(seq) => {
            let len = seq.len();
            let index = normalize_index(key, len)
                .ok_or_else(|| InteropError::type_mismatch("integer index", key.type_name()))?;
            if index >= len {
                return Err(InteropError::IndexOutOfRange(index as i64 + 1));
            }
            seq.set(index, incoming)
        }
        HostValue::Map(map) => {
            let key = key
                .as_str()
                .ok_or_else(|| InteropError::type_mismatch("string key", key.type_name()))?;
            map.insert(key, incoming);
            Ok(())
        }
        HostValue::Record(record) => {
            let name = key
                .as_str()
                .ok_or_else(|| InteropError::type_mismatch("string key", key.type_name()))?;
            record.set_field(&upper_first(name), incoming)
        }
        other => Err(InteropError::type_mismatch("container", other.type_name())),
    }
}

fn proxy_len(target: &HostValue) -> usize {
    match target {
        HostValue::Seq(seq) => seq.len(),
        HostValue::Map(map) => map.len(),
        HostValue::Record(record) => record.visible_field_count(),
        _ => 0,
    }
}

/// Map a guest 1-based index to a zero-based slot. Negative indexes
/// count from the end (-1 is the last element); 0 and non-integer keys
/// never resolve.
fn normalize_index(key: &Value, len: usize) -> Option<usize> {
    let raw = key.as_int()?;
    let resolved = if raw < 0 { len as i64 + raw + 1 } else { raw };
    if resolved < 1 {
        return None;
    }
    Some(resolved as usize - 1)
}
