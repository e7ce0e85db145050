//! Tarn scripting engine.
//!
//! A small embeddable, table-oriented scripting language with a
//! tree-walking interpreter. The engine is thread-safe: every value is
//! `Send + Sync`, so embedders decide their own locking discipline around
//! script execution.
//!
//! # Example
//!
//! ```ignore
//! use tarn_engine::Engine;
//!
//! let engine = Engine::new();
//! engine.load("function double(n) return n * 2 end", "demo")?;
//! let f = engine.get_global("double");
//! let out = engine.call(&f, &[tarn_engine::Value::Number(21.0)])?;
//! ```

pub mod ast;
pub mod engine;
pub mod error;
pub mod interp;
pub mod lexer;
pub mod parser;
mod prelude;
pub mod table;
pub mod userdata;
pub mod value;

pub use engine::Engine;
pub use error::{EngineError, EngineResult};
pub use interp::Scope;
pub use table::{Table, TableKey};
pub use userdata::{CallFn, FinalizeFn, IndexFn, LenFn, MetaTable, NewIndexFn, UserData};
pub use value::{Closure, NativeFn, NativeFunction, Value};
