//! Proxy Object Tests
//!
//! Reference-path marshaling: live host values behind guest proxies.
//! - Reads with 1-based and negative indexes
//! - Writes that mutate the host value in place
//! - Kind-checked assignment through typed slots
//! - Record field casing, private fields, and methods
//! - Handle lifecycle driven by guest finalization
//!
//! # Running Tests
//! ```bash
//! cargo test --test proxy_tests
//! ```

use tarn_embed::{
    Context, HostFunction, HostMap, HostRecord, HostSeq, HostValue, InteropError, Kind, Signature,
};

fn sample_seq() -> HostSeq {
    HostSeq::from_vec(vec![
        HostValue::Str("a".into()),
        HostValue::Str("b".into()),
        HostValue::Str("c".into()),
    ])
}

// ===== Sequence proxies =====

#[test]
fn test_sequence_reads_are_one_based() {
    let ctx = Context::new();
    ctx.load_script("function first(xs) return xs[1] end", &[])
        .unwrap();
    let out = ctx
        .call("first", &[HostValue::Seq(sample_seq())])
        .unwrap();
    assert_eq!(out, HostValue::Str("a".into()));
}

#[test]
fn test_negative_index_counts_from_the_end() {
    let ctx = Context::new();
    ctx.load_script("function pick(xs, i) return xs[i] end", &[])
        .unwrap();
    let out = ctx
        .call("pick", &[HostValue::Seq(sample_seq()), HostValue::Int(-1)])
        .unwrap();
    assert_eq!(out, HostValue::Str("c".into()));
}

#[test]
fn test_index_zero_and_out_of_range_read_as_nil() {
    let ctx = Context::new();
    ctx.load_script("function pick(xs, i) return xs[i] end", &[])
        .unwrap();
    for bad in [0, 4, -4] {
        let out = ctx
            .call("pick", &[HostValue::Seq(sample_seq()), HostValue::Int(bad)])
            .unwrap();
        assert_eq!(out, HostValue::Nil, "index {}", bad);
    }
}

#[test]
fn test_length_operator_reports_live_length() {
    let ctx = Context::new();
    ctx.load_script("function size(xs) return #xs end", &[])
        .unwrap();
    let seq = sample_seq();
    assert_eq!(
        ctx.call("size", &[HostValue::Seq(seq.clone())]).unwrap(),
        HostValue::Float(3.0)
    );
    seq.push(HostValue::Str("d".into()));
    assert_eq!(
        ctx.call("size", &[HostValue::Seq(seq)]).unwrap(),
        HostValue::Float(4.0)
    );
}

#[test]
fn test_sequence_write_mutates_the_host_value() {
    let ctx = Context::new();
    ctx.load_script("function put(xs, i, v) xs[i] = v end", &[])
        .unwrap();
    let seq = sample_seq();
    ctx.call(
        "put",
        &[
            HostValue::Seq(seq.clone()),
            HostValue::Int(2),
            HostValue::Str("B".into()),
        ],
    )
    .unwrap();
    assert_eq!(seq.get(1), Some(HostValue::Str("B".into())));
}

#[test]
fn test_out_of_range_write_is_a_guest_error() {
    let ctx = Context::new();
    ctx.load_script("function put(xs, i, v) xs[i] = v end", &[])
        .unwrap();
    let result = ctx.call(
        "put",
        &[
            HostValue::Seq(sample_seq()),
            HostValue::Int(9),
            HostValue::Str("x".into()),
        ],
    );
    match result {
        Err(InteropError::Script(msg)) => assert!(msg.contains("out of range"), "{}", msg),
        other => panic!("unexpected result {:?}", other),
    }
}

#[test]
fn test_typed_slot_adapts_assigned_values() {
    let ctx = Context::new();
    ctx.load_script("function put(xs, i, v) xs[i] = v end", &[])
        .unwrap();
    let seq = HostSeq::from_vec(vec![HostValue::Int(10)]);
    // guest numbers are floats; the int slot truncates them back
    ctx.call(
        "put",
        &[
            HostValue::Seq(seq.clone()),
            HostValue::Int(1),
            HostValue::Float(7.9),
        ],
    )
    .unwrap();
    assert_eq!(seq.get(0), Some(HostValue::Int(7)));
}

// ===== Map proxies =====

#[test]
fn test_map_reads_and_writes() {
    let ctx = Context::new();
    ctx.load_script(
        "function touch(m)\n\
           m.seen = m.count\n\
           return m.missing\n\
         end",
        &[],
    )
    .unwrap();
    let map: HostMap = [("count".to_string(), HostValue::Int(3))].into_iter().collect();
    let out = ctx.call("touch", &[HostValue::Map(map.clone())]).unwrap();
    assert_eq!(out, HostValue::Nil);
    assert_eq!(map.get("seen"), Some(HostValue::Float(3.0)));
}

// ===== Record proxies =====

fn sample_record() -> HostRecord {
    HostRecord::new("User")
        .with_field("Name", HostValue::Str("ada".into()))
        .with_field("Age", HostValue::Int(36))
        .with_field("secret", HostValue::Str("hidden".into()))
        .with_method(
            "Greet",
            HostFunction::new(
                "Greet",
                Signature::new(vec![Kind::Str], vec![Kind::Str]),
                |args| {
                    let who = args[0].as_str().unwrap_or("?").to_string();
                    Ok(vec![HostValue::Str(format!("hello {}", who))])
                },
            ),
        )
}

#[test]
fn test_record_fields_use_guest_casing() {
    let ctx = Context::new();
    ctx.load_script("function name(r) return r.name end", &[])
        .unwrap();
    let out = ctx
        .call("name", &[HostValue::Record(sample_record())])
        .unwrap();
    assert_eq!(out, HostValue::Str("ada".into()));
}

#[test]
fn test_private_record_fields_read_as_nil() {
    let ctx = Context::new();
    ctx.load_script("function peek(r) return r.secret end", &[])
        .unwrap();
    let out = ctx
        .call("peek", &[HostValue::Record(sample_record())])
        .unwrap();
    assert_eq!(out, HostValue::Nil);
}

#[test]
fn test_record_write_respects_field_kind() {
    let ctx = Context::new();
    ctx.load_script("function age(r, n) r.age = n end", &[])
        .unwrap();
    let record = sample_record();
    ctx.call(
        "age",
        &[HostValue::Record(record.clone()), HostValue::Float(37.0)],
    )
    .unwrap();
    assert_eq!(record.field("Age"), Some(HostValue::Int(37)));
}

#[test]
fn test_unknown_record_field_write_is_a_guest_error() {
    let ctx = Context::new();
    ctx.load_script("function put(r) r.nope = 1 end", &[])
        .unwrap();
    let result = ctx.call("put", &[HostValue::Record(sample_record())]);
    match result {
        Err(InteropError::Script(msg)) => assert!(msg.contains("not found"), "{}", msg),
        other => panic!("unexpected result {:?}", other),
    }
}

#[test]
fn test_record_method_call_through_proxy() {
    let ctx = Context::new();
    ctx.load_script("function greet(r) return r.greet(\"world\") end", &[])
        .unwrap();
    let out = ctx
        .call("greet", &[HostValue::Record(sample_record())])
        .unwrap();
    assert_eq!(out, HostValue::Str("hello world".into()));
}

#[test]
fn test_record_length_counts_visible_fields() {
    let ctx = Context::new();
    ctx.load_script("function size(r) return #r end", &[])
        .unwrap();
    let out = ctx
        .call("size", &[HostValue::Record(sample_record())])
        .unwrap();
    // Name and Age; secret is private
    assert_eq!(out, HostValue::Float(2.0));
}

// ===== Nested proxies =====

#[test]
fn test_nested_composite_reads_are_also_live() {
    let ctx = Context::new();
    ctx.load_script("function bump(r) r.tags[1] = \"updated\" end", &[])
        .unwrap();
    let tags = HostSeq::from_vec(vec![HostValue::Str("old".into())]);
    let record = HostRecord::new("Post").with_field("Tags", HostValue::Seq(tags.clone()));
    ctx.call("bump", &[HostValue::Record(record)]).unwrap();
    assert_eq!(tags.get(0), Some(HostValue::Str("updated".into())));
}

// ===== Handle lifecycle =====

#[test]
fn test_handles_are_retired_after_the_call() {
    let ctx = Context::new();
    ctx.load_script("function use(xs) return xs[1] end", &[])
        .unwrap();
    ctx.call("use", &[HostValue::Seq(sample_seq())]).unwrap();
    assert_eq!(ctx.handle_count(), 0);
}

#[test]
fn test_handle_survives_while_the_guest_keeps_the_proxy() {
    let ctx = Context::new();
    ctx.load_script("function keep(xs) kept = xs end", &[])
        .unwrap();
    ctx.call("keep", &[HostValue::Seq(sample_seq())]).unwrap();
    assert_eq!(ctx.handle_count(), 1);
}
