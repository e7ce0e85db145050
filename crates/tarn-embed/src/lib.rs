//! Host interop layer for the Tarn engine.
//!
//! This crate lets an application hand its own values to scripts and call
//! across the boundary in both directions without ever exposing host
//! memory to the guest:
//!
//! - [`HandleStore`]: numeric indirection between guest tokens and host
//!   values; handles are process-unique and never reused.
//! - [`HostValue`]: the host-side value model, with shared-mutable
//!   sequence, map, and record composites.
//! - Conversion: host values travel by copy (snapshot into guest tables)
//!   or by reference (live proxies); guest tables decode with a
//!   sequence-vs-map shape heuristic.
//! - Proxies: userdata with generic index/newindex/len/call dispatch over
//!   the handle store, and finalizers that retire handles.
//! - The bridge: bound guest functions with declared signatures, host
//!   functions callable from scripts, and captured guest callables.
//! - [`Context`]: one engine + one handle store behind a reentrant
//!   execution lock; safe to share across threads.
//! - [`ScriptCache`]: mtime-keyed reuse of loaded script files.
//!
//! # Example
//!
//! ```ignore
//! use tarn_embed::{Context, HostValue, Kind, Signature};
//!
//! let ctx = Context::new();
//! ctx.load_script("function greet(name) return \"hi \" .. name end", &[])?;
//! let out = ctx.call("greet", &[HostValue::Str("ada".into())])?;
//! assert_eq!(out.as_str(), Some("hi ada"));
//! ```

mod bridge;
mod cache;
mod context;
mod convert;
mod error;
mod handles;
mod proxy;
pub mod reflect;
mod value;

pub use cache::{global_cache, ScriptCache};
pub use context::Context;
pub use error::{InteropError, InteropResult};
pub use handles::HandleStore;
pub use value::{HostFn, HostFunction, HostMap, HostRecord, HostSeq, HostValue, Kind, Signature};
