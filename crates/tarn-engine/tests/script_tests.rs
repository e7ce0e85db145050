//! Script Execution Tests
//!
//! End-to-end tests running source through the full pipeline:
//! - Expressions, control flow, and functions
//! - Tables and the list/hash split
//! - Multiple return values
//! - Native functions and userdata dispatch
//! - Error propagation from `error()`
//!
//! # Running Tests
//! ```bash
//! cargo test --test script_tests
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tarn_engine::{Engine, EngineError, MetaTable, NativeFunction, UserData, Value};

fn run(source: &str) -> Engine {
    let engine = Engine::new();
    engine.load(source, "test").unwrap();
    engine
}

fn global_num(engine: &Engine, name: &str) -> f64 {
    engine.get_global(name).as_number().unwrap()
}

// ===== Expressions and Control Flow =====

#[test]
fn test_arithmetic_and_precedence() {
    let engine = run("x = 2 + 3 * 4\ny = (2 + 3) * 4\nz = 10 % 3");
    assert_eq!(global_num(&engine, "x"), 14.0);
    assert_eq!(global_num(&engine, "y"), 20.0);
    assert_eq!(global_num(&engine, "z"), 1.0);
}

#[test]
fn test_comparison_and_logic() {
    let engine = run(
        "a = 1 < 2\n\
         b = \"ab\" < \"ac\"\n\
         c = nil and 1\n\
         d = nil or \"fallback\"\n\
         e = not nil",
    );
    assert!(matches!(engine.get_global("a"), Value::Bool(true)));
    assert!(matches!(engine.get_global("b"), Value::Bool(true)));
    assert!(engine.get_global("c").is_nil());
    assert_eq!(engine.get_global("d").as_str(), Some("fallback"));
    assert!(matches!(engine.get_global("e"), Value::Bool(true)));
}

#[test]
fn test_while_and_break() {
    let engine = run(
        "n = 0\n\
         while true do\n\
           n = n + 1\n\
           if n >= 5 then break end\n\
         end",
    );
    assert_eq!(global_num(&engine, "n"), 5.0);
}

#[test]
fn test_numeric_for() {
    let engine = run(
        "total = 0\n\
         for i = 1, 10 do total = total + i end\n\
         down = 0\n\
         for i = 3, 1, -1 do down = down + i end",
    );
    assert_eq!(global_num(&engine, "total"), 55.0);
    assert_eq!(global_num(&engine, "down"), 6.0);
}

#[test]
fn test_string_concat() {
    let engine = run("s = \"n=\" .. 42 .. \"!\"");
    assert_eq!(engine.get_global("s").as_str(), Some("n=42!"));
}

// ===== Functions =====

#[test]
fn test_function_definition_and_call() {
    let engine = run(
        "function add(a, b) return a + b end\n\
         result = add(19, 23)",
    );
    assert_eq!(global_num(&engine, "result"), 42.0);
}

#[test]
fn test_closures_capture_environment() {
    let engine = run(
        "local counter = 0\n\
         function bump() counter = counter + 1 return counter end\n\
         bump() bump()\n\
         result = bump()",
    );
    assert_eq!(global_num(&engine, "result"), 3.0);
}

#[test]
fn test_recursion() {
    let engine = run(
        "function fib(n)\n\
           if n < 2 then return n end\n\
           return fib(n - 1) + fib(n - 2)\n\
         end\n\
         result = fib(10)",
    );
    assert_eq!(global_num(&engine, "result"), 55.0);
}

#[test]
fn test_multiple_returns_expand_in_tail_position() {
    let engine = run(
        "function pair() return 1, 2 end\n\
         a, b = pair()\n\
         t = { pair() }",
    );
    assert_eq!(global_num(&engine, "a"), 1.0);
    assert_eq!(global_num(&engine, "b"), 2.0);
    match engine.get_global("t") {
        Value::Table(t) => assert_eq!(t.lock().len(), 2),
        other => panic!("unexpected value {:?}", other),
    }
}

#[test]
fn test_call_from_host() {
    let engine = run("function double(n) return n * 2 end");
    let f = engine.get_global("double");
    let out = engine.call(&f, &[Value::Number(21.0)]).unwrap();
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].as_number(), Some(42.0));
}

#[test]
fn test_deep_recursion_is_an_error_not_a_crash() {
    let engine = run("function loop() return loop() end");
    let f = engine.get_global("loop");
    match engine.call(&f, &[]) {
        Err(EngineError::Runtime(msg)) => assert!(msg.contains("stack overflow")),
        other => panic!("unexpected result {:?}", other),
    }
}

// ===== Tables =====

#[test]
fn test_table_constructor_and_indexing() {
    let engine = run(
        "t = { 10, 20, name = \"tarn\", [5] = true }\n\
         a = t[1]\n\
         b = t.name\n\
         c = t[5]\n\
         n = #t",
    );
    assert_eq!(global_num(&engine, "a"), 10.0);
    assert_eq!(engine.get_global("b").as_str(), Some("tarn"));
    assert!(matches!(engine.get_global("c"), Value::Bool(true)));
    assert_eq!(global_num(&engine, "n"), 2.0);
}

#[test]
fn test_nested_tables() {
    let engine = run(
        "t = { inner = { value = 7 } }\n\
         x = t.inner.value\n\
         t.inner.value = 9\n\
         y = t.inner.value",
    );
    assert_eq!(global_num(&engine, "x"), 7.0);
    assert_eq!(global_num(&engine, "y"), 9.0);
}

// ===== Native Functions =====

#[test]
fn test_native_function_roundtrip() {
    let engine = Engine::new();
    engine.set_global(
        "host_add",
        Value::Native(Arc::new(NativeFunction::new("host_add", |_, args| {
            let a = args[0].as_number().unwrap_or(0.0);
            let b = args[1].as_number().unwrap_or(0.0);
            Ok(vec![Value::Number(a + b)])
        }))),
    );
    engine.load("result = host_add(40, 2)", "test").unwrap();
    assert_eq!(global_num(&engine, "result"), 42.0);
}

#[test]
fn test_native_error_propagates_to_caller() {
    let engine = Engine::new();
    engine.set_global(
        "fail",
        Value::Native(Arc::new(NativeFunction::new("fail", |_, _| {
            Err(EngineError::runtime("native failure"))
        }))),
    );
    match engine.load("fail()", "test") {
        Err(EngineError::Runtime(msg)) => assert_eq!(msg, "native failure"),
        other => panic!("unexpected result {:?}", other),
    }
}

// ===== Userdata =====

#[test]
fn test_userdata_index_and_len_dispatch() {
    let mut meta = MetaTable::new("probe");
    meta.index = Some(Box::new(|_, ud, key| {
        let key = key.as_str().unwrap_or("");
        Ok(Value::str(format!("{}:{}", ud.token(), key)))
    }));
    meta.len = Some(Box::new(|_, _| Ok(Value::Number(3.0))));
    let meta = Arc::new(meta);

    let engine = Engine::new();
    engine.set_global(
        "probe",
        Value::UserData(Arc::new(UserData::new(9, meta, None))),
    );
    engine
        .load("a = probe.field\nn = #probe", "test")
        .unwrap();
    assert_eq!(engine.get_global("a").as_str(), Some("9:field"));
    assert_eq!(global_num(&engine, "n"), 3.0);
}

#[test]
fn test_userdata_finalizer_runs_when_globals_drop() {
    static FREED: AtomicU64 = AtomicU64::new(0);
    let meta = Arc::new(MetaTable::new("tracked"));
    {
        let engine = Engine::new();
        engine.set_global(
            "obj",
            Value::UserData(Arc::new(UserData::new(
                31,
                meta,
                Some(Box::new(|token| {
                    FREED.store(token, Ordering::SeqCst);
                })),
            ))),
        );
        assert_eq!(FREED.load(Ordering::SeqCst), 0);
    }
    assert_eq!(FREED.load(Ordering::SeqCst), 31);
}

// ===== Errors =====

#[test]
fn test_error_builtin_carries_message() {
    let engine = run("function boom() error(\"kaboom\") end");
    let f = engine.get_global("boom");
    match engine.call(&f, &[]) {
        Err(EngineError::Runtime(msg)) => assert_eq!(msg, "kaboom"),
        other => panic!("unexpected result {:?}", other),
    }
}

#[test]
fn test_calling_a_non_function_is_an_error() {
    let engine = Engine::new();
    match engine.load("x = 5\nx()", "test") {
        Err(EngineError::Runtime(msg)) => assert!(msg.contains("call")),
        other => panic!("unexpected result {:?}", other),
    }
}

#[test]
fn test_parse_error_reports_line() {
    let engine = Engine::new();
    match engine.load("x = 1\nlocal = 2", "test") {
        Err(EngineError::Parse { line, .. }) => assert_eq!(line, 2),
        other => panic!("unexpected result {:?}", other),
    }
}

#[test]
fn test_parse_error_carries_chunk_name() {
    let engine = Engine::new();
    match engine.load("local = 1", "config.tarn") {
        Err(EngineError::Parse { chunk, .. }) => assert_eq!(chunk, "config.tarn"),
        other => panic!("unexpected result {:?}", other),
    }
}
