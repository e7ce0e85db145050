//! Bidirectional value conversion.
//!
//! Host -> guest has two paths. The copy path materializes composites as
//! guest tables, so later host-side mutation is invisible to the script.
//! The reference path registers the composite in the handle store and
//! hands the guest a proxy userdata; reads and writes through the proxy
//! reach the live host value.
//!
//! Guest -> host always copies tables, with one shape heuristic: a table
//! is decoded as a sequence while its keys run 1..n in order, and
//! anything else switches it to a map. Integer keys seen under a map
//! decode through their decimal text.

use std::sync::Arc;

use tarn_engine::{Table, Value};

use crate::bridge;
use crate::context::ContextShared;
use crate::error::{InteropError, InteropResult};
use crate::reflect::lower_first;
use crate::value::{HostMap, HostSeq, HostValue};

// ============================================================================
// Host -> guest: copy path
// ============================================================================

/// Marshal by copy. Scalars map directly; composites become fresh guest
/// tables; functions become callable wrappers backed by the handle store.
pub(crate) fn encode_copy(shared: &Arc<ContextShared>, value: &HostValue) -> Value {
    match value {
        HostValue::Nil => Value::Nil,
        HostValue::Bool(b) => Value::Bool(*b),
        HostValue::Int(i) => Value::Number(*i as f64),
        HostValue::Uint(u) => Value::Number(*u as f64),
        HostValue::Float(f) => Value::Number(*f),
        HostValue::Str(s) => Value::str(s),
        HostValue::Bytes(b) => Value::str(String::from_utf8_lossy(b)),
        HostValue::Seq(seq) => {
            let mut table = Table::new();
            for item in seq.to_vec() {
                table.push(encode_copy(shared, &item));
            }
            Value::table(table)
        }
        HostValue::Map(map) => {
            let mut table = Table::new();
            for (key, item) in map.entries() {
                table.set_str(&key, encode_copy(shared, &item));
            }
            Value::table(table)
        }
        HostValue::Record(record) => {
            let mut table = Table::new();
            for (name, item) in record.visible_fields() {
                table.set_str(&lower_first(&name), encode_copy(shared, &item));
            }
            for (name, method) in record.methods() {
                table.set_str(&lower_first(&name), bridge::wrap_host_fn(shared, &method));
            }
            Value::table(table)
        }
        HostValue::Func(func) => bridge::wrap_host_fn(shared, func),
    }
}

// ============================================================================
// Host -> guest: reference path
// ============================================================================

/// Marshal by reference. Composites and functions become proxies over a
/// handle-store entry; scalars fall back to the copy path.
pub(crate) fn encode_ref(shared: &Arc<ContextShared>, value: &HostValue) -> Value {
    match value {
        HostValue::Seq(_) | HostValue::Map(_) | HostValue::Record(_) => {
            make_proxy(shared, value.clone(), shared.metas.object.clone())
        }
        HostValue::Func(_) => make_proxy(shared, value.clone(), shared.metas.function.clone()),
        scalar => encode_copy(shared, scalar),
    }
}

/// Register the value and wrap its handle in a userdata whose finalizer
/// retires the handle. The finalizer holds the store weakly: if the
/// context died first there is nothing left to clean up.
fn make_proxy(
    shared: &Arc<ContextShared>,
    value: HostValue,
    meta: Arc<tarn_engine::MetaTable>,
) -> Value {
    let handle = shared.handles.register(value);
    let store = Arc::downgrade(&shared.handles);
    Value::UserData(Arc::new(tarn_engine::UserData::new(
        handle,
        meta,
        Some(Box::new(move |token| {
            if let Some(store) = store.upgrade() {
                store.remove(token);
            }
        })),
    )))
}

// ============================================================================
// Guest -> host
// ============================================================================

/// Decode a guest value. Tables copy (sequence or map per the shape
/// heuristic), proxies resolve to the host value they stand for, and
/// guest functions are captured as host-callable functions.
pub(crate) fn decode(shared: &Arc<ContextShared>, value: &Value) -> InteropResult<HostValue> {
    match value {
        Value::Nil => Ok(HostValue::Nil),
        Value::Bool(b) => Ok(HostValue::Bool(*b)),
        Value::Number(n) => Ok(HostValue::Float(*n)),
        Value::Str(s) => Ok(HostValue::Str(s.to_string())),
        Value::Table(table) => {
            let entries = table.lock().entries();
            decode_table(shared, &entries)
        }
        Value::UserData(ud) => {
            let meta = ud.meta_arc();
            if Arc::ptr_eq(meta, &shared.metas.object) || Arc::ptr_eq(meta, &shared.metas.function)
            {
                shared
                    .handles
                    .lookup(ud.token())
                    .ok_or(InteropError::StaleHandle(ud.token()))
            } else {
                Err(InteropError::type_mismatch("proxy userdata", "userdata"))
            }
        }
        Value::Function(_) | Value::Native(_) => Ok(HostValue::Func(bridge::capture_guest_fn(
            shared, value,
        ))),
    }
}

/// Shape heuristic over a table snapshot. Starts optimistic on both
/// shapes: while keys arrive as 1, 2, 3, ... the sequence stays live,
/// and every integer key is also recorded in the map under its decimal
/// text in case a later key breaks the run. The first break discards
/// the sequence for good; an empty table decodes to nil.
fn decode_table(
    shared: &Arc<ContextShared>,
    entries: &[(Value, Value)],
) -> InteropResult<HostValue> {
    if entries.is_empty() {
        return Ok(HostValue::Nil);
    }
    let mut seq_items: Vec<HostValue> = Vec::new();
    let mut maybe_seq = true;
    let mut next_index: i64 = 1;
    let mut map_items: Vec<(String, HostValue)> = Vec::new();

    for (key, value) in entries {
        let decoded = decode(shared, value)?;
        match key {
            Value::Number(_) => {
                let index = key.as_int().ok_or_else(|| {
                    InteropError::type_mismatch("integer or string key", "fractional number")
                })?;
                if maybe_seq && index == next_index {
                    seq_items.push(decoded.clone());
                    next_index += 1;
                } else {
                    maybe_seq = false;
                }
                map_items.push((index.to_string(), decoded));
            }
            Value::Str(s) => {
                maybe_seq = false;
                map_items.push((s.to_string(), decoded));
            }
            other => {
                return Err(InteropError::type_mismatch(
                    "integer or string key",
                    other.type_name(),
                ))
            }
        }
    }

    if maybe_seq {
        Ok(HostValue::Seq(HostSeq::from_vec(seq_items)))
    } else {
        Ok(HostValue::Map(map_items.into_iter().collect::<HostMap>()))
    }
}

/// Multi-value decode used for call results: none is nil, one is the
/// value itself, several collapse into a sequence.
pub(crate) fn decode_results(
    shared: &Arc<ContextShared>,
    results: &[Value],
) -> InteropResult<HostValue> {
    match results {
        [] => Ok(HostValue::Nil),
        [single] => decode(shared, single),
        many => {
            let mut items = Vec::with_capacity(many.len());
            for value in many {
                items.push(decode(shared, value)?);
            }
            Ok(HostValue::Seq(HostSeq::from_vec(items)))
        }
    }
}
