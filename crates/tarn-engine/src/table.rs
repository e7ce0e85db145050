//! Tables: the engine's only aggregate data structure.
//!
//! A table keeps a dense list part for consecutive integer keys starting
//! at 1 and a hash part for everything else. Assigning at index `len + 1`
//! extends the list part and pulls any following keys out of the hash part.

use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::error::{EngineError, EngineResult};
use crate::value::Value;

/// A normalized table key. Numbers with no fractional part become `Int`,
/// strings become `Str`; nothing else can be a key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TableKey {
    Int(i64),
    Str(Arc<str>),
}

impl TableKey {
    pub fn from_value(v: &Value) -> EngineResult<TableKey> {
        match v {
            Value::Nil => Err(EngineError::runtime("table index is nil")),
            Value::Number(n) if n.is_nan() => Err(EngineError::runtime("table index is NaN")),
            Value::Number(n) if n.fract() == 0.0 && n.is_finite() => Ok(TableKey::Int(*n as i64)),
            Value::Str(s) => Ok(TableKey::Str(s.clone())),
            other => Err(EngineError::runtime(format!(
                "invalid table key of type {}",
                other.type_name()
            ))),
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            TableKey::Int(i) => Value::Number(*i as f64),
            TableKey::Str(s) => Value::Str(s.clone()),
        }
    }
}

#[derive(Debug, Default)]
pub struct Table {
    list: Vec<Value>,
    hash: FxHashMap<TableKey, Value>,
}

impl Table {
    pub fn new() -> Self {
        Table::default()
    }

    /// Length of the dense list part.
    pub fn len(&self) -> usize {
        self.list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty() && self.hash.is_empty()
    }

    pub fn get(&self, key: &Value) -> Value {
        match TableKey::from_value(key) {
            Ok(k) => self.get_key(&k),
            Err(_) => Value::Nil,
        }
    }

    pub fn get_key(&self, key: &TableKey) -> Value {
        if let TableKey::Int(i) = key {
            if *i >= 1 && (*i as usize) <= self.list.len() {
                return self.list[*i as usize - 1].clone();
            }
        }
        self.hash.get(key).cloned().unwrap_or(Value::Nil)
    }

    pub fn get_str(&self, key: &str) -> Value {
        self.hash
            .get(&TableKey::Str(Arc::from(key)))
            .cloned()
            .unwrap_or(Value::Nil)
    }

    pub fn set(&mut self, key: &Value, value: Value) -> EngineResult<()> {
        let k = TableKey::from_value(key)?;
        self.set_key(k, value);
        Ok(())
    }

    pub fn set_str(&mut self, key: &str, value: Value) {
        self.set_key(TableKey::Str(Arc::from(key)), value);
    }

    pub fn set_key(&mut self, key: TableKey, value: Value) {
        if let TableKey::Int(i) = key {
            let len = self.list.len();
            if i >= 1 && (i as usize) <= len {
                let idx = i as usize - 1;
                if value.is_nil() && idx == len - 1 {
                    self.list.pop();
                    self.shrink_list();
                } else {
                    self.list[idx] = value;
                }
                return;
            }
            if i as i128 == len as i128 + 1 && !value.is_nil() {
                self.list.push(value);
                self.migrate_from_hash();
                return;
            }
        }
        if value.is_nil() {
            self.hash.remove(&key);
        } else {
            self.hash.insert(key, value);
        }
    }

    /// Append to the list part.
    pub fn push(&mut self, value: Value) {
        self.list.push(value);
        self.migrate_from_hash();
    }

    /// Snapshot of every entry as (key, value) pairs; list entries first.
    pub fn entries(&self) -> Vec<(Value, Value)> {
        let mut out = Vec::with_capacity(self.list.len() + self.hash.len());
        for (i, v) in self.list.iter().enumerate() {
            if !v.is_nil() {
                out.push((Value::Number((i + 1) as f64), v.clone()));
            }
        }
        for (k, v) in &self.hash {
            out.push((k.to_value(), v.clone()));
        }
        out
    }

    /// Pull keys `len+1, len+2, ...` out of the hash part after an append.
    fn migrate_from_hash(&mut self) {
        loop {
            let next = TableKey::Int(self.list.len() as i64 + 1);
            match self.hash.remove(&next) {
                Some(v) => self.list.push(v),
                None => break,
            }
        }
    }

    /// Drop trailing nils left behind by erasing the last element.
    fn shrink_list(&mut self) {
        while matches!(self.list.last(), Some(Value::Nil)) {
            self.list.pop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn num(n: f64) -> Value {
        Value::Number(n)
    }

    #[test]
    fn list_part_grows_sequentially() {
        let mut t = Table::new();
        t.set(&num(1.0), Value::str("a")).unwrap();
        t.set(&num(2.0), Value::str("b")).unwrap();
        assert_eq!(t.len(), 2);
        assert_eq!(t.get(&num(1.0)).as_str(), Some("a"));
    }

    #[test]
    fn sparse_key_lands_in_hash_then_migrates() {
        let mut t = Table::new();
        t.set(&num(2.0), Value::str("b")).unwrap();
        assert_eq!(t.len(), 0);
        t.set(&num(1.0), Value::str("a")).unwrap();
        // index 2 migrates into the list part
        assert_eq!(t.len(), 2);
        assert_eq!(t.get(&num(2.0)).as_str(), Some("b"));
    }

    #[test]
    fn erasing_last_shrinks_list() {
        let mut t = Table::new();
        t.push(num(1.0));
        t.push(num(2.0));
        t.set(&num(2.0), Value::Nil).unwrap();
        assert_eq!(t.len(), 1);
    }

    #[test]
    fn string_keys_use_hash_part() {
        let mut t = Table::new();
        t.set_str("name", Value::str("tarn"));
        assert_eq!(t.get_str("name").as_str(), Some("tarn"));
        assert_eq!(t.len(), 0);
    }

    #[test]
    fn nil_key_is_rejected() {
        let mut t = Table::new();
        assert!(t.set(&Value::Nil, num(1.0)).is_err());
        assert!(t.set(&Value::Number(f64::NAN), num(1.0)).is_err());
        assert!(t.set(&Value::Bool(true), num(1.0)).is_err());
    }
}
