//! Built-in functions available to every script.

use std::sync::Arc;

use crate::engine::Engine;
use crate::error::EngineError;
use crate::value::{NativeFunction, Value};

pub(crate) fn install(engine: &Engine) {
    engine.set_global(
        "print",
        native("print", |_, args| {
            let line = args
                .iter()
                .map(Value::display)
                .collect::<Vec<_>>()
                .join("\t");
            println!("{}", line);
            Ok(Vec::new())
        }),
    );

    engine.set_global(
        "type",
        native("type", |_, args| {
            let v = args.first().cloned().unwrap_or(Value::Nil);
            Ok(vec![Value::str(v.type_name())])
        }),
    );

    engine.set_global(
        "tostring",
        native("tostring", |_, args| {
            let v = args.first().cloned().unwrap_or(Value::Nil);
            Ok(vec![Value::str(v.display())])
        }),
    );

    engine.set_global(
        "error",
        native("error", |_, args| {
            let msg = args
                .first()
                .map(Value::display)
                .unwrap_or_else(|| "error".to_string());
            Err(EngineError::Runtime(msg))
        }),
    );
}

fn native(
    name: &str,
    f: impl Fn(&Engine, &[Value]) -> crate::error::EngineResult<Vec<Value>> + Send + Sync + 'static,
) -> Value {
    Value::Native(Arc::new(NativeFunction::new(name, f)))
}
