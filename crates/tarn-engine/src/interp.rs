//! Tree-walking interpreter.
//!
//! Blocks execute against a `Scope` chain; closures capture the scope they
//! were defined in. Control flow threads a `Flow` result upward so `break`
//! and `return` unwind without unwinding the Rust stack.

use std::cell::Cell;
use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::ast::{BinOp, Block, Expr, FuncBody, Stat, TableItem, UnOp};
use crate::engine::Engine;
use crate::error::{EngineError, EngineResult};
use crate::table::Table;
use crate::value::{Closure, Value};

const MAX_CALL_DEPTH: usize = 200;

/// A lexical scope. Cloning is cheap; clones alias the same variables.
#[derive(Debug, Clone)]
pub struct Scope(Arc<ScopeInner>);

#[derive(Debug)]
struct ScopeInner {
    vars: Mutex<FxHashMap<String, Value>>,
    parent: Option<Scope>,
}

impl Scope {
    pub fn root() -> Self {
        Scope(Arc::new(ScopeInner {
            vars: Mutex::new(FxHashMap::default()),
            parent: None,
        }))
    }

    pub fn child(&self) -> Self {
        Scope(Arc::new(ScopeInner {
            vars: Mutex::new(FxHashMap::default()),
            parent: Some(self.clone()),
        }))
    }

    fn get(&self, name: &str) -> Option<Value> {
        let mut scope = self;
        loop {
            if let Some(v) = scope.0.vars.lock().get(name) {
                return Some(v.clone());
            }
            match &scope.0.parent {
                Some(parent) => scope = parent,
                None => return None,
            }
        }
    }

    fn declare(&self, name: &str, value: Value) {
        self.0.vars.lock().insert(name.to_string(), value);
    }

    /// Assign to an already-declared variable somewhere up the chain.
    fn assign(&self, name: &str, value: Value) -> bool {
        let mut scope = self;
        loop {
            let mut vars = scope.0.vars.lock();
            if let Some(slot) = vars.get_mut(name) {
                *slot = value;
                return true;
            }
            drop(vars);
            match &scope.0.parent {
                Some(parent) => scope = parent,
                None => return false,
            }
        }
    }
}

pub(crate) enum Flow {
    Normal,
    Break,
    Return(Vec<Value>),
}

pub(crate) struct Interp<'e> {
    engine: &'e Engine,
    depth: Cell<usize>,
}

impl<'e> Interp<'e> {
    pub(crate) fn new(engine: &'e Engine) -> Self {
        Interp {
            engine,
            depth: Cell::new(0),
        }
    }

    pub(crate) fn exec_block(&self, block: &Block, scope: &Scope) -> EngineResult<Flow> {
        for stat in &block.stats {
            match self.exec_stat(stat, scope)? {
                Flow::Normal => {}
                flow => return Ok(flow),
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_stat(&self, stat: &Stat, scope: &Scope) -> EngineResult<Flow> {
        match stat {
            Stat::Local { names, exprs } => {
                let values = self.eval_multi(exprs, scope, names.len())?;
                for (name, value) in names.iter().zip(values) {
                    scope.declare(name, value);
                }
                Ok(Flow::Normal)
            }
            Stat::Assign { targets, exprs } => {
                let values = self.eval_multi(exprs, scope, targets.len())?;
                for (target, value) in targets.iter().zip(values) {
                    self.assign_target(target, value, scope)?;
                }
                Ok(Flow::Normal)
            }
            Stat::Call(expr) => {
                self.eval_call_expr(expr, scope)?;
                Ok(Flow::Normal)
            }
            Stat::If { arms, else_body } => {
                for (cond, body) in arms {
                    if self.eval(cond, scope)?.truthy() {
                        return self.exec_block(body, &scope.child());
                    }
                }
                if let Some(body) = else_body {
                    return self.exec_block(body, &scope.child());
                }
                Ok(Flow::Normal)
            }
            Stat::While { cond, body } => {
                while self.eval(cond, scope)?.truthy() {
                    match self.exec_block(body, &scope.child())? {
                        Flow::Normal => {}
                        Flow::Break => break,
                        ret @ Flow::Return(_) => return Ok(ret),
                    }
                }
                Ok(Flow::Normal)
            }
            Stat::NumericFor {
                var,
                start,
                stop,
                step,
                body,
            } => {
                let start = self.expect_number(start, scope, "for start")?;
                let stop = self.expect_number(stop, scope, "for limit")?;
                let step = match step {
                    Some(e) => self.expect_number(e, scope, "for step")?,
                    None => 1.0,
                };
                if step == 0.0 {
                    return Err(EngineError::runtime("for step is zero"));
                }
                let mut i = start;
                while (step > 0.0 && i <= stop) || (step < 0.0 && i >= stop) {
                    let inner = scope.child();
                    inner.declare(var, Value::Number(i));
                    match self.exec_block(body, &inner)? {
                        Flow::Normal => {}
                        Flow::Break => break,
                        ret @ Flow::Return(_) => return Ok(ret),
                    }
                    i += step;
                }
                Ok(Flow::Normal)
            }
            Stat::Do(body) => self.exec_block(body, &scope.child()),
            Stat::Function { target, body } => {
                let func = self.make_closure(body, scope);
                self.assign_target(target, func, scope)?;
                Ok(Flow::Normal)
            }
            Stat::LocalFunction { name, body } => {
                // declare first so the body can refer to itself
                scope.declare(name, Value::Nil);
                let func = self.make_closure(body, scope);
                scope.declare(name, func);
                Ok(Flow::Normal)
            }
            Stat::Return(exprs) => {
                let values = self.eval_expanding(exprs, scope)?;
                Ok(Flow::Return(values))
            }
            Stat::Break => Ok(Flow::Break),
        }
    }

    fn assign_target(&self, target: &Expr, value: Value, scope: &Scope) -> EngineResult<()> {
        match target {
            Expr::Name(name) => {
                if !scope.assign(name, value.clone()) {
                    self.engine.set_global(name, value);
                }
                Ok(())
            }
            Expr::Index(obj, key) => {
                let obj = self.eval(obj, scope)?;
                let key = self.eval(key, scope)?;
                self.index_set(&obj, &key, value)
            }
            _ => Err(EngineError::runtime("cannot assign to this expression")),
        }
    }

    fn make_closure(&self, body: &FuncBody, scope: &Scope) -> Value {
        Value::Function(Arc::new(Closure {
            name: body.name.clone(),
            params: body.params.clone(),
            body: body.block.clone(),
            env: scope.clone(),
        }))
    }

    // ----- expression evaluation -----

    fn eval(&self, expr: &Expr, scope: &Scope) -> EngineResult<Value> {
        match expr {
            Expr::Nil => Ok(Value::Nil),
            Expr::True => Ok(Value::Bool(true)),
            Expr::False => Ok(Value::Bool(false)),
            Expr::Number(n) => Ok(Value::Number(*n)),
            Expr::Str(s) => Ok(Value::str(s)),
            Expr::Name(name) => Ok(scope
                .get(name)
                .unwrap_or_else(|| self.engine.get_global(name))),
            Expr::Index(obj, key) => {
                let obj = self.eval(obj, scope)?;
                let key = self.eval(key, scope)?;
                self.index_get(&obj, &key)
            }
            Expr::Call(_, _) => {
                let mut results = self.eval_call_expr(expr, scope)?;
                Ok(if results.is_empty() {
                    Value::Nil
                } else {
                    results.swap_remove(0)
                })
            }
            Expr::Function(body) => Ok(self.make_closure(body, scope)),
            Expr::TableCtor(items) => self.eval_table_ctor(items, scope),
            Expr::Binary(op, lhs, rhs) => self.eval_binary(*op, lhs, rhs, scope),
            Expr::Unary(op, operand) => {
                let v = self.eval(operand, scope)?;
                self.eval_unary(*op, &v)
            }
        }
    }

    /// Evaluate an expression list for a multi-slot context, padding with
    /// nil and expanding a trailing call into all of its results.
    fn eval_multi(&self, exprs: &[Expr], scope: &Scope, want: usize) -> EngineResult<Vec<Value>> {
        let mut values = self.eval_expanding(exprs, scope)?;
        values.resize(want, Value::Nil);
        Ok(values)
    }

    fn eval_expanding(&self, exprs: &[Expr], scope: &Scope) -> EngineResult<Vec<Value>> {
        let mut values = Vec::with_capacity(exprs.len());
        for (i, expr) in exprs.iter().enumerate() {
            let last = i + 1 == exprs.len();
            if last {
                if let Expr::Call(_, _) = expr {
                    values.extend(self.eval_call_expr(expr, scope)?);
                    break;
                }
            }
            values.push(self.eval(expr, scope)?);
        }
        Ok(values)
    }

    fn eval_call_expr(&self, expr: &Expr, scope: &Scope) -> EngineResult<Vec<Value>> {
        let (callee, args) = match expr {
            Expr::Call(callee, args) => (callee, args),
            _ => return Err(EngineError::runtime("not a call expression")),
        };
        let func = self.eval(callee, scope)?;
        let args = self.eval_expanding(args, scope)?;
        self.call_value(&func, &args)
    }

    pub(crate) fn call_value(&self, func: &Value, args: &[Value]) -> EngineResult<Vec<Value>> {
        match func {
            Value::Function(closure) => {
                let depth = self.depth.get();
                if depth >= MAX_CALL_DEPTH {
                    return Err(EngineError::runtime("stack overflow"));
                }
                self.depth.set(depth + 1);
                let result = self.call_closure(closure, args);
                self.depth.set(depth);
                result
            }
            Value::Native(native) => native.call(self.engine, args),
            Value::UserData(ud) => match &ud.meta().call {
                Some(call) => call(self.engine, ud, args),
                None => Err(EngineError::runtime("attempt to call a userdata value")),
            },
            other => Err(EngineError::runtime(format!(
                "attempt to call a {} value",
                other.type_name()
            ))),
        }
    }

    fn call_closure(&self, closure: &Closure, args: &[Value]) -> EngineResult<Vec<Value>> {
        let scope = closure.env.child();
        for (i, param) in closure.params.iter().enumerate() {
            scope.declare(param, args.get(i).cloned().unwrap_or(Value::Nil));
        }
        match self.exec_block(&closure.body, &scope)? {
            Flow::Return(values) => Ok(values),
            _ => Ok(Vec::new()),
        }
    }

    // ----- indexing -----

    pub(crate) fn index_get(&self, obj: &Value, key: &Value) -> EngineResult<Value> {
        match obj {
            Value::Table(t) => Ok(t.lock().get(key)),
            Value::UserData(ud) => match &ud.meta().index {
                Some(index) => index(self.engine, ud, key),
                None => Err(EngineError::runtime("attempt to index a userdata value")),
            },
            other => Err(EngineError::runtime(format!(
                "attempt to index a {} value",
                other.type_name()
            ))),
        }
    }

    pub(crate) fn index_set(&self, obj: &Value, key: &Value, value: Value) -> EngineResult<()> {
        match obj {
            Value::Table(t) => t.lock().set(key, value),
            Value::UserData(ud) => match &ud.meta().newindex {
                Some(newindex) => newindex(self.engine, ud, key, value),
                None => Err(EngineError::runtime("attempt to index a userdata value")),
            },
            other => Err(EngineError::runtime(format!(
                "attempt to index a {} value",
                other.type_name()
            ))),
        }
    }

    fn eval_table_ctor(&self, items: &[TableItem], scope: &Scope) -> EngineResult<Value> {
        let mut table = Table::new();
        for (i, item) in items.iter().enumerate() {
            match item {
                TableItem::Positional(expr) => {
                    let last = i + 1 == items.len();
                    if last {
                        if let Expr::Call(_, _) = expr {
                            for v in self.eval_call_expr(expr, scope)? {
                                table.push(v);
                            }
                            continue;
                        }
                    }
                    table.push(self.eval(expr, scope)?);
                }
                TableItem::Named(name, expr) => {
                    let v = self.eval(expr, scope)?;
                    table.set_str(name, v);
                }
                TableItem::Keyed(key, expr) => {
                    let k = self.eval(key, scope)?;
                    let v = self.eval(expr, scope)?;
                    table.set(&k, v)?;
                }
            }
        }
        Ok(Value::table(table))
    }

    // ----- operators -----

    fn eval_binary(&self, op: BinOp, lhs: &Expr, rhs: &Expr, scope: &Scope) -> EngineResult<Value> {
        // short-circuit forms evaluate the right side lazily
        match op {
            BinOp::And => {
                let l = self.eval(lhs, scope)?;
                return if l.truthy() { self.eval(rhs, scope) } else { Ok(l) };
            }
            BinOp::Or => {
                let l = self.eval(lhs, scope)?;
                return if l.truthy() { Ok(l) } else { self.eval(rhs, scope) };
            }
            _ => {}
        }
        let l = self.eval(lhs, scope)?;
        let r = self.eval(rhs, scope)?;
        match op {
            BinOp::Add => self.arith(&l, &r, |a, b| a + b),
            BinOp::Sub => self.arith(&l, &r, |a, b| a - b),
            BinOp::Mul => self.arith(&l, &r, |a, b| a * b),
            BinOp::Div => self.arith(&l, &r, |a, b| a / b),
            BinOp::Mod => self.arith(&l, &r, |a, b| a - (a / b).floor() * b),
            BinOp::Concat => self.concat(&l, &r),
            BinOp::Eq => Ok(Value::Bool(l.eq_value(&r))),
            BinOp::Ne => Ok(Value::Bool(!l.eq_value(&r))),
            BinOp::Lt => self.compare(&l, &r, |o| o == std::cmp::Ordering::Less),
            BinOp::Le => self.compare(&l, &r, |o| o != std::cmp::Ordering::Greater),
            BinOp::Gt => self.compare(&l, &r, |o| o == std::cmp::Ordering::Greater),
            BinOp::Ge => self.compare(&l, &r, |o| o != std::cmp::Ordering::Less),
            BinOp::And | BinOp::Or => unreachable!("handled above"),
        }
    }

    fn arith(&self, l: &Value, r: &Value, f: impl Fn(f64, f64) -> f64) -> EngineResult<Value> {
        match (l.as_number(), r.as_number()) {
            (Some(a), Some(b)) => Ok(Value::Number(f(a, b))),
            _ => {
                let bad = if l.as_number().is_none() { l } else { r };
                Err(EngineError::runtime(format!(
                    "attempt to perform arithmetic on a {} value",
                    bad.type_name()
                )))
            }
        }
    }

    fn concat(&self, l: &Value, r: &Value) -> EngineResult<Value> {
        let part = |v: &Value| -> EngineResult<String> {
            match v {
                Value::Str(_) | Value::Number(_) => Ok(v.display()),
                other => Err(EngineError::runtime(format!(
                    "attempt to concatenate a {} value",
                    other.type_name()
                ))),
            }
        };
        Ok(Value::str(format!("{}{}", part(l)?, part(r)?)))
    }

    fn compare(
        &self,
        l: &Value,
        r: &Value,
        f: impl Fn(std::cmp::Ordering) -> bool,
    ) -> EngineResult<Value> {
        let ordering = match (l, r) {
            (Value::Number(a), Value::Number(b)) => a.partial_cmp(b),
            (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
            _ => {
                return Err(EngineError::runtime(format!(
                    "attempt to compare {} with {}",
                    l.type_name(),
                    r.type_name()
                )))
            }
        };
        Ok(Value::Bool(ordering.map(&f).unwrap_or(false)))
    }

    fn eval_unary(&self, op: UnOp, v: &Value) -> EngineResult<Value> {
        match op {
            UnOp::Not => Ok(Value::Bool(!v.truthy())),
            UnOp::Neg => match v.as_number() {
                Some(n) => Ok(Value::Number(-n)),
                None => Err(EngineError::runtime(format!(
                    "attempt to perform arithmetic on a {} value",
                    v.type_name()
                ))),
            },
            UnOp::Len => match v {
                Value::Str(s) => Ok(Value::Number(s.len() as f64)),
                Value::Table(t) => Ok(Value::Number(t.lock().len() as f64)),
                Value::UserData(ud) => match &ud.meta().len {
                    Some(len) => len(self.engine, ud),
                    None => Err(EngineError::runtime(
                        "attempt to get length of a userdata value",
                    )),
                },
                other => Err(EngineError::runtime(format!(
                    "attempt to get length of a {} value",
                    other.type_name()
                ))),
            },
        }
    }

    fn expect_number(&self, expr: &Expr, scope: &Scope, what: &str) -> EngineResult<f64> {
        let v = self.eval(expr, scope)?;
        v.as_number()
            .ok_or_else(|| EngineError::runtime(format!("{} must be a number", what)))
    }
}
