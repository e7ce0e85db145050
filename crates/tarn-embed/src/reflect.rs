//! Reflection helpers: naming rules, kind adaptation, and checked
//! function invocation.
//!
//! Guest-facing names use a lowercase initial; host-facing names use an
//! uppercase initial. Fields with a lowercase initial on the host side
//! are invisible to the guest entirely.

use crate::error::{InteropError, InteropResult};
use crate::value::{HostFunction, HostMap, HostSeq, HostValue, Kind, Signature};

/// Visible across the boundary: first letter is uppercase.
pub(crate) fn is_exported(name: &str) -> bool {
    name.chars().next().is_some_and(|c| c.is_uppercase())
}

/// `name` -> `Name`, for resolving guest keys against host fields.
pub fn upper_first(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) => c.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// `Name` -> `name`, for presenting host fields to the guest.
pub fn lower_first(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) => c.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Declared shape of a host function.
pub fn describe(func: &HostFunction) -> Signature {
    func.signature().clone()
}

/// Coerce a value to the given kind. Nil becomes the kind's zero value
/// where one exists; numeric kinds convert among themselves; strings and
/// bytes convert to each other. Anything else is a mismatch.
pub fn adapt(value: HostValue, kind: Kind) -> InteropResult<HostValue> {
    if kind == Kind::Any {
        return Ok(value);
    }
    if value.is_nil() {
        return Ok(zero_value(kind));
    }
    if value.kind() == Some(kind) {
        return Ok(value);
    }
    let adapted = match (&value, kind) {
        (HostValue::Int(i), Kind::Uint) => Some(HostValue::Uint(*i as u64)),
        (HostValue::Int(i), Kind::Float) => Some(HostValue::Float(*i as f64)),
        (HostValue::Uint(u), Kind::Int) => Some(HostValue::Int(*u as i64)),
        (HostValue::Uint(u), Kind::Float) => Some(HostValue::Float(*u as f64)),
        (HostValue::Float(f), Kind::Int) => Some(HostValue::Int(*f as i64)),
        (HostValue::Float(f), Kind::Uint) => Some(HostValue::Uint(*f as u64)),
        (HostValue::Bool(b), Kind::Int) => Some(HostValue::Int(i64::from(*b))),
        (HostValue::Str(s), Kind::Bytes) => Some(HostValue::Bytes(s.clone().into_bytes())),
        (HostValue::Bytes(b), Kind::Str) => {
            Some(HostValue::Str(String::from_utf8_lossy(b).into_owned()))
        }
        _ => None,
    };
    adapted.ok_or_else(|| InteropError::type_mismatch(kind.name(), value.type_name()))
}

fn zero_value(kind: Kind) -> HostValue {
    match kind {
        Kind::Bool => HostValue::Bool(false),
        Kind::Int => HostValue::Int(0),
        Kind::Uint => HostValue::Uint(0),
        Kind::Float => HostValue::Float(0.0),
        Kind::Str => HostValue::Str(String::new()),
        Kind::Bytes => HostValue::Bytes(Vec::new()),
        Kind::Seq => HostValue::Seq(HostSeq::new()),
        Kind::Map => HostValue::Map(HostMap::new()),
        // no zero value exists; callers see nil and decide
        Kind::Record | Kind::Func | Kind::Any => HostValue::Nil,
    }
}

/// Call a host function, adapting each argument to the declared
/// parameter kind first. Missing arguments are padded with nil before
/// adaptation; extra arguments pass through only for variadic functions.
pub fn invoke(func: &HostFunction, args: &[HostValue]) -> InteropResult<Vec<HostValue>> {
    let sig = func.signature();
    let mut adapted = Vec::with_capacity(args.len().max(sig.params.len()));
    for (i, kind) in sig.params.iter().enumerate() {
        let arg = args.get(i).cloned().unwrap_or(HostValue::Nil);
        adapted.push(adapt(arg, *kind)?);
    }
    if sig.variadic {
        for arg in args.iter().skip(sig.params.len()) {
            adapted.push(arg.clone());
        }
    }
    func.call_raw(&adapted)
}

/// Assign into a typed slot: the incoming value is adapted to the kind
/// already stored there. An untyped (nil) slot accepts anything.
pub fn set_value(dest: &mut HostValue, value: HostValue) -> InteropResult<()> {
    match dest.kind() {
        None => {
            *dest = value;
            Ok(())
        }
        Some(kind) => {
            *dest = adapt(value, kind)?;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn casing_helpers() {
        assert_eq!(upper_first("name"), "Name");
        assert_eq!(lower_first("Name"), "name");
        assert_eq!(upper_first(""), "");
        assert!(is_exported("Visible"));
        assert!(!is_exported("hidden"));
    }

    #[test]
    fn adapt_numeric_crossings() {
        assert_eq!(
            adapt(HostValue::Float(3.9), Kind::Int).unwrap(),
            HostValue::Int(3)
        );
        assert_eq!(
            adapt(HostValue::Int(7), Kind::Float).unwrap(),
            HostValue::Float(7.0)
        );
    }

    #[test]
    fn adapt_nil_yields_zero_value() {
        assert_eq!(adapt(HostValue::Nil, Kind::Str).unwrap(), HostValue::Str(String::new()));
        assert_eq!(adapt(HostValue::Nil, Kind::Int).unwrap(), HostValue::Int(0));
    }

    #[test]
    fn adapt_rejects_incompatible_kinds() {
        assert!(adapt(HostValue::Str("x".into()), Kind::Int).is_err());
    }

    #[test]
    fn invoke_pads_missing_arguments() {
        let f = HostFunction::new(
            "sum",
            Signature::new(vec![Kind::Int, Kind::Int], vec![Kind::Int]),
            |args| {
                let a = args[0].as_i64().unwrap_or(0);
                let b = args[1].as_i64().unwrap_or(0);
                Ok(vec![HostValue::Int(a + b)])
            },
        );
        let out = invoke(&f, &[HostValue::Int(5)]).unwrap();
        assert_eq!(out, vec![HostValue::Int(5)]);
    }

    #[test]
    fn set_value_respects_slot_kind() {
        let mut slot = HostValue::Int(1);
        set_value(&mut slot, HostValue::Float(2.5)).unwrap();
        assert_eq!(slot, HostValue::Int(2));
        assert!(set_value(&mut slot, HostValue::Str("no".into())).is_err());
    }
}
