//! Guest value representation.
//!
//! Every value is cheap to clone: scalars are copied, everything else is an
//! `Arc`. Tables and scopes are guarded by `parking_lot` locks so values can
//! move freely between threads.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::engine::Engine;
use crate::error::EngineResult;
use crate::interp::Scope;
use crate::table::Table;
use crate::userdata::UserData;

/// Signature of a host-provided function callable from scripts.
pub type NativeFn = Box<dyn Fn(&Engine, &[Value]) -> EngineResult<Vec<Value>> + Send + Sync>;

/// A host function registered with the engine.
pub struct NativeFunction {
    name: String,
    func: NativeFn,
}

impl NativeFunction {
    pub fn new(
        name: impl Into<String>,
        func: impl Fn(&Engine, &[Value]) -> EngineResult<Vec<Value>> + Send + Sync + 'static,
    ) -> Self {
        NativeFunction {
            name: name.into(),
            func: Box::new(func),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn call(&self, engine: &Engine, args: &[Value]) -> EngineResult<Vec<Value>> {
        (self.func)(engine, args)
    }
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeFunction")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// A script-defined function together with its captured environment.
#[derive(Debug)]
pub struct Closure {
    pub name: Option<String>,
    pub params: Vec<String>,
    pub body: Arc<crate::ast::Block>,
    pub env: Scope,
}

/// A single guest value.
#[derive(Debug, Clone)]
pub enum Value {
    Nil,
    Bool(bool),
    Number(f64),
    Str(Arc<str>),
    Table(Arc<Mutex<Table>>),
    Function(Arc<Closure>),
    Native(Arc<NativeFunction>),
    UserData(Arc<UserData>),
}

impl Value {
    pub fn str(s: impl AsRef<str>) -> Value {
        Value::Str(Arc::from(s.as_ref()))
    }

    pub fn table(t: Table) -> Value {
        Value::Table(Arc::new(Mutex::new(t)))
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    /// Everything except `nil` and `false` is truthy.
    pub fn truthy(&self) -> bool {
        !matches!(self, Value::Nil | Value::Bool(false))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::Str(_) => "string",
            Value::Table(_) => "table",
            Value::Function(_) | Value::Native(_) => "function",
            Value::UserData(_) => "userdata",
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Integer view of a number value, if it has no fractional part.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Number(n) if n.fract() == 0.0 && n.is_finite() => Some(*n as i64),
            _ => None,
        }
    }

    /// Equality as scripts observe it: scalars by value, everything
    /// else by identity.
    pub fn eq_value(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Table(a), Value::Table(b)) => Arc::ptr_eq(a, b),
            (Value::Function(a), Value::Function(b)) => Arc::ptr_eq(a, b),
            (Value::Native(a), Value::Native(b)) => Arc::ptr_eq(a, b),
            (Value::UserData(a), Value::UserData(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Rendering used by `tostring`, `print`, and concatenation.
    pub fn display(&self) -> String {
        match self {
            Value::Nil => "nil".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => format_number(*n),
            Value::Str(s) => s.to_string(),
            Value::Table(t) => format!("table: {:p}", Arc::as_ptr(t)),
            Value::Function(f) => format!("function: {:p}", Arc::as_ptr(f)),
            Value::Native(f) => format!("function: builtin:{}", f.name()),
            Value::UserData(u) => format!("{}: {:p}", u.meta().type_name, Arc::as_ptr(u)),
        }
    }
}

/// Integral numbers print without a trailing `.0`.
pub fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truthiness() {
        assert!(!Value::Nil.truthy());
        assert!(!Value::Bool(false).truthy());
        assert!(Value::Bool(true).truthy());
        assert!(Value::Number(0.0).truthy());
        assert!(Value::str("").truthy());
    }

    #[test]
    fn number_formatting() {
        assert_eq!(format_number(3.0), "3");
        assert_eq!(format_number(-12.0), "-12");
        assert_eq!(format_number(0.5), "0.5");
    }

    #[test]
    fn scalar_equality() {
        assert!(Value::str("a").eq_value(&Value::str("a")));
        assert!(!Value::Number(1.0).eq_value(&Value::str("1")));
        let t = Value::table(Table::new());
        assert!(t.eq_value(&t.clone()));
        assert!(!t.eq_value(&Value::table(Table::new())));
    }
}
