//! Host-side value model.
//!
//! `HostValue` is what the embedding application trades with the guest.
//! Scalars are plain; the composite variants (`Seq`, `Map`, `Record`) are
//! shared-mutable behind `Arc<RwLock<...>>`, so cloning a composite yields
//! an alias of the same storage. That is what lets a proxy held by a
//! script mutate the host's own value.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{InteropError, InteropResult};
use crate::reflect;

/// Declared type of a function parameter, result, or typed slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Bool,
    Int,
    Uint,
    Float,
    Str,
    Bytes,
    Seq,
    Map,
    Record,
    Func,
    /// Accepts any value unchanged.
    Any,
}

impl Kind {
    pub fn name(&self) -> &'static str {
        match self {
            Kind::Bool => "bool",
            Kind::Int => "int",
            Kind::Uint => "uint",
            Kind::Float => "float",
            Kind::Str => "string",
            Kind::Bytes => "bytes",
            Kind::Seq => "sequence",
            Kind::Map => "map",
            Kind::Record => "record",
            Kind::Func => "function",
            Kind::Any => "any",
        }
    }
}

/// A single host value.
#[derive(Clone)]
pub enum HostValue {
    Nil,
    Bool(bool),
    Int(i64),
    Uint(u64),
    Float(f64),
    Str(String),
    Bytes(Vec<u8>),
    Seq(HostSeq),
    Map(HostMap),
    Record(HostRecord),
    Func(HostFunction),
}

impl HostValue {
    pub fn is_nil(&self) -> bool {
        matches!(self, HostValue::Nil)
    }

    pub fn kind(&self) -> Option<Kind> {
        match self {
            HostValue::Nil => None,
            HostValue::Bool(_) => Some(Kind::Bool),
            HostValue::Int(_) => Some(Kind::Int),
            HostValue::Uint(_) => Some(Kind::Uint),
            HostValue::Float(_) => Some(Kind::Float),
            HostValue::Str(_) => Some(Kind::Str),
            HostValue::Bytes(_) => Some(Kind::Bytes),
            HostValue::Seq(_) => Some(Kind::Seq),
            HostValue::Map(_) => Some(Kind::Map),
            HostValue::Record(_) => Some(Kind::Record),
            HostValue::Func(_) => Some(Kind::Func),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self.kind() {
            None => "nil",
            Some(k) => k.name(),
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            HostValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            HostValue::Int(i) => Some(*i),
            HostValue::Uint(u) => i64::try_from(*u).ok(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            HostValue::Int(i) => Some(*i as f64),
            HostValue::Uint(u) => Some(*u as f64),
            HostValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            HostValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_seq(&self) -> Option<&HostSeq> {
        match self {
            HostValue::Seq(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&HostMap> {
        match self {
            HostValue::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&HostRecord> {
        match self {
            HostValue::Record(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_func(&self) -> Option<&HostFunction> {
        match self {
            HostValue::Func(f) => Some(f),
            _ => None,
        }
    }
}

impl PartialEq for HostValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (HostValue::Nil, HostValue::Nil) => true,
            (HostValue::Bool(a), HostValue::Bool(b)) => a == b,
            (HostValue::Int(a), HostValue::Int(b)) => a == b,
            (HostValue::Uint(a), HostValue::Uint(b)) => a == b,
            (HostValue::Float(a), HostValue::Float(b)) => a == b,
            (HostValue::Str(a), HostValue::Str(b)) => a == b,
            (HostValue::Bytes(a), HostValue::Bytes(b)) => a == b,
            (HostValue::Seq(a), HostValue::Seq(b)) => a.ptr_eq(b) || a.to_vec() == b.to_vec(),
            (HostValue::Map(a), HostValue::Map(b)) => a.ptr_eq(b) || a.sorted_entries() == b.sorted_entries(),
            (HostValue::Record(a), HostValue::Record(b)) => a.ptr_eq(b),
            (HostValue::Func(a), HostValue::Func(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl fmt::Debug for HostValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostValue::Nil => write!(f, "Nil"),
            HostValue::Bool(b) => write!(f, "Bool({})", b),
            HostValue::Int(i) => write!(f, "Int({})", i),
            HostValue::Uint(u) => write!(f, "Uint({})", u),
            HostValue::Float(x) => write!(f, "Float({})", x),
            HostValue::Str(s) => write!(f, "Str({:?})", s),
            HostValue::Bytes(b) => write!(f, "Bytes({} bytes)", b.len()),
            HostValue::Seq(s) => write!(f, "Seq(len={})", s.len()),
            HostValue::Map(m) => write!(f, "Map(len={})", m.len()),
            HostValue::Record(r) => write!(f, "Record({})", r.type_name()),
            HostValue::Func(func) => write!(f, "Func({})", func.name()),
        }
    }
}

// ============================================================================
// Composite values
// ============================================================================

/// An ordered, growable sequence. Clones alias the same storage.
#[derive(Clone, Default)]
pub struct HostSeq(Arc<RwLock<Vec<HostValue>>>);

impl HostSeq {
    pub fn new() -> Self {
        HostSeq::default()
    }

    pub fn from_vec(items: Vec<HostValue>) -> Self {
        HostSeq(Arc::new(RwLock::new(items)))
    }

    pub fn len(&self) -> usize {
        self.0.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.read().is_empty()
    }

    /// Zero-based element access.
    pub fn get(&self, index: usize) -> Option<HostValue> {
        self.0.read().get(index).cloned()
    }

    pub fn push(&self, value: HostValue) {
        self.0.write().push(value);
    }

    pub fn to_vec(&self) -> Vec<HostValue> {
        self.0.read().clone()
    }

    pub fn ptr_eq(&self, other: &HostSeq) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Replace an element in place, adapting the new value to the kind
    /// already stored there.
    pub fn set(&self, index: usize, value: HostValue) -> InteropResult<()> {
        let mut items = self.0.write();
        match items.get_mut(index) {
            Some(slot) => reflect::set_value(slot, value),
            None => Err(InteropError::IndexOutOfRange(index as i64 + 1)),
        }
    }
}

impl fmt::Debug for HostSeq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("HostSeq").field(&self.to_vec()).finish()
    }
}

/// A string-keyed map. Clones alias the same storage.
#[derive(Clone, Default)]
pub struct HostMap(Arc<RwLock<HashMap<String, HostValue>>>);

impl HostMap {
    pub fn new() -> Self {
        HostMap::default()
    }

    pub fn len(&self) -> usize {
        self.0.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.read().is_empty()
    }

    pub fn get(&self, key: &str) -> Option<HostValue> {
        self.0.read().get(key).cloned()
    }

    pub fn insert(&self, key: impl Into<String>, value: HostValue) {
        self.0.write().insert(key.into(), value);
    }

    pub fn remove(&self, key: &str) -> Option<HostValue> {
        self.0.write().remove(key)
    }

    pub fn entries(&self) -> Vec<(String, HostValue)> {
        self.0
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub fn ptr_eq(&self, other: &HostMap) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    fn sorted_entries(&self) -> Vec<(String, HostValue)> {
        let mut entries = self.entries();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }
}

impl FromIterator<(String, HostValue)> for HostMap {
    fn from_iter<I: IntoIterator<Item = (String, HostValue)>>(iter: I) -> Self {
        HostMap(Arc::new(RwLock::new(iter.into_iter().collect())))
    }
}

impl fmt::Debug for HostMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("HostMap").field(&self.sorted_entries()).finish()
    }
}

/// A named record with ordered fields and receiver-bound methods.
///
/// Only fields whose names start with an uppercase letter are visible
/// across the boundary; the rest stay private to the host.
#[derive(Clone)]
pub struct HostRecord(Arc<RwLock<RecordInner>>);

struct RecordInner {
    name: String,
    fields: Vec<(String, HostValue)>,
    methods: Vec<(String, HostFunction)>,
}

impl HostRecord {
    pub fn new(name: impl Into<String>) -> Self {
        HostRecord(Arc::new(RwLock::new(RecordInner {
            name: name.into(),
            fields: Vec::new(),
            methods: Vec::new(),
        })))
    }

    pub fn with_field(self, name: impl Into<String>, value: HostValue) -> Self {
        self.0.write().fields.push((name.into(), value));
        self
    }

    pub fn with_method(self, name: impl Into<String>, func: HostFunction) -> Self {
        self.0.write().methods.push((name.into(), func));
        self
    }

    pub fn type_name(&self) -> String {
        self.0.read().name.clone()
    }

    pub fn field(&self, name: &str) -> Option<HostValue> {
        self.0
            .read()
            .fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.clone())
    }

    /// Assign a field, adapting the value to the field's current kind.
    pub fn set_field(&self, name: &str, value: HostValue) -> InteropResult<()> {
        let mut inner = self.0.write();
        match inner.fields.iter_mut().find(|(n, _)| n == name) {
            Some((_, slot)) => reflect::set_value(slot, value),
            None => Err(InteropError::FieldNotFound(name.to_string())),
        }
    }

    pub fn method(&self, name: &str) -> Option<HostFunction> {
        self.0
            .read()
            .methods
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, f)| f.clone())
    }

    /// Fields visible across the boundary, in declaration order.
    pub fn visible_fields(&self) -> Vec<(String, HostValue)> {
        self.0
            .read()
            .fields
            .iter()
            .filter(|(n, _)| reflect::is_exported(n))
            .map(|(n, v)| (n.clone(), v.clone()))
            .collect()
    }

    pub fn visible_field_count(&self) -> usize {
        self.0
            .read()
            .fields
            .iter()
            .filter(|(n, _)| reflect::is_exported(n))
            .count()
    }

    pub fn methods(&self) -> Vec<(String, HostFunction)> {
        self.0.read().methods.clone()
    }

    pub fn ptr_eq(&self, other: &HostRecord) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for HostRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.0.read();
        f.debug_struct("HostRecord")
            .field("name", &inner.name)
            .field("fields", &inner.fields.len())
            .field("methods", &inner.methods.len())
            .finish()
    }
}

// ============================================================================
// Functions
// ============================================================================

/// Declared shape of a host or bound function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub params: Vec<Kind>,
    pub variadic: bool,
    pub results: Vec<Kind>,
    /// The last result slot reports failure instead of a value. Callers
    /// receive it as an error, never as a result.
    pub has_error_result: bool,
}

impl Signature {
    pub fn new(params: Vec<Kind>, results: Vec<Kind>) -> Self {
        Signature {
            params,
            variadic: false,
            results,
            has_error_result: false,
        }
    }

    pub fn variadic(mut self) -> Self {
        self.variadic = true;
        self
    }

    pub fn with_error_result(mut self) -> Self {
        self.has_error_result = true;
        self
    }

    /// Number of plain value results, excluding the error slot.
    pub fn value_results(&self) -> usize {
        self.results.len() - usize::from(self.has_error_result)
    }
}

pub type HostFn = Box<dyn Fn(&[HostValue]) -> InteropResult<Vec<HostValue>> + Send + Sync>;

/// A callable owned by the host (or a captured guest function wrapped
/// for the host). Cloning shares the same underlying callable.
#[derive(Clone)]
pub struct HostFunction {
    inner: Arc<FnInner>,
}

struct FnInner {
    name: String,
    signature: Signature,
    body: HostFn,
}

impl HostFunction {
    pub fn new(
        name: impl Into<String>,
        signature: Signature,
        body: impl Fn(&[HostValue]) -> InteropResult<Vec<HostValue>> + Send + Sync + 'static,
    ) -> Self {
        HostFunction {
            inner: Arc::new(FnInner {
                name: name.into(),
                signature,
                body: Box::new(body),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn signature(&self) -> &Signature {
        &self.inner.signature
    }

    /// Invoke without argument adaptation. Most callers want
    /// [`crate::reflect::invoke`] instead.
    pub fn call_raw(&self, args: &[HostValue]) -> InteropResult<Vec<HostValue>> {
        (self.inner.body)(args)
    }

    pub fn ptr_eq(&self, other: &HostFunction) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for HostFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostFunction")
            .field("name", &self.inner.name)
            .field("signature", &self.inner.signature)
            .finish_non_exhaustive()
    }
}
