//! Host functions called from scripts.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use lark_eval::{Context, EvalErrorKind, HostValue, NativeBinding, NativeFault, Value};
use lark_ir::{BinaryOp, Span};
use pretty_assertions::assert_eq;

use super::{policy, program};

fn echo() -> NativeBinding {
    NativeBinding::new("echo", |_, args| {
        Ok(args.first().cloned().unwrap_or(HostValue::Null))
    })
}

#[test]
fn test_object_identity_survives_a_round_trip() {
    let ctx =
        Context::new(program(|_| vec![]), policy(&["native.call:*"])).expect("valid program");
    ctx.register_native(echo()).unwrap();

    let obj = ctx.new_object(None);
    let back = ctx.invoke_native("echo", &[Value::Object(obj.clone())]).unwrap();
    let back = back.as_object().expect("an object comes back");
    assert!(back.ptr_eq(&obj));
}

#[test]
fn test_script_sees_the_same_object_after_a_round_trip() {
    // let o = {}; echo(o) == o;
    let program = program(|b| {
        let obj = b.object(vec![]);
        let let_o = b.let_("o", obj);
        let o = b.ident("o");
        let echoed = b.call_named("echo", vec![o]);
        let o = b.ident("o");
        let same = b.binary(BinaryOp::Eq, echoed, o);
        vec![let_o, b.expr_stmt(same)]
    });
    let ctx = Context::builder(program)
        .policy(policy(&["native.call:*"]))
        .native(echo())
        .build()
        .unwrap();
    assert_eq!(ctx.run(vec![]).unwrap(), Value::Bool(true));
}

#[test]
fn test_functions_cross_as_callable_handles() {
    // function twice(x) { return x * 2; } echo(twice)(21);
    let program = program(|b| {
        let x = b.ident("x");
        let two = b.num(2.0);
        let product = b.binary(BinaryOp::Mul, x, two);
        let ret = b.return_(Some(product));
        let param = b.param("x");
        let twice = b.fn_decl("twice", vec![param], vec![ret]);
        let f = b.ident("twice");
        let echoed = b.call_named("echo", vec![f]);
        let arg = b.num(21.0);
        let call = b.call(echoed, vec![arg]);
        vec![twice, b.expr_stmt(call)]
    });
    let ctx = Context::builder(program)
        .policy(policy(&["native.call:*"]))
        .native(echo())
        .build()
        .unwrap();
    assert_eq!(ctx.run(vec![]).unwrap(), Value::Number(42.0));
}

#[test]
fn test_wildcard_grant_covers_native_calls() {
    let build = || {
        program(|b| {
            b.at(Span::new(0, 12));
            let call = b.call_named("clock", vec![]);
            vec![b.expr_stmt(call)]
        })
    };
    let clock = || {
        NativeBinding::new("clock", |_, _| Ok(HostValue::Number(1000.0)))
            .requires("native.call:clock")
    };

    let allowed = Context::builder(build())
        .policy(policy(&["native.call:*"]))
        .native(clock())
        .build()
        .unwrap();
    assert_eq!(allowed.run(vec![]).unwrap(), Value::Number(1000.0));

    let denied = Context::builder(build()).native(clock()).build().unwrap();
    let error = denied.run(vec![]).unwrap_err();
    assert_eq!(
        error.kind,
        EvalErrorKind::CapabilityDenied {
            capability: "native.call:clock".to_string()
        }
    );
    assert_eq!(error.span, Some(Span::new(0, 12)));
}

#[test]
fn test_native_calls_back_into_script() {
    // function inc(n) { return n + 1; } applyTimes(inc, 3, 10);
    let program = program(|b| {
        let n = b.ident("n");
        let one = b.num(1.0);
        let next = b.binary(BinaryOp::Add, n, one);
        let ret = b.return_(Some(next));
        let param = b.param("n");
        let inc = b.fn_decl("inc", vec![param], vec![ret]);
        let f = b.ident("inc");
        let times = b.num(3.0);
        let start = b.num(10.0);
        let call = b.call_named("applyTimes", vec![f, times, start]);
        vec![inc, b.expr_stmt(call)]
    });
    let calls = Arc::new(AtomicUsize::new(0));
    let counted = Arc::clone(&calls);
    let apply_times = NativeBinding::new("applyTimes", move |scope, args| {
        let (Some(f), Some(times), Some(start)) = (
            args.first().and_then(HostValue::as_function),
            args.get(1).and_then(HostValue::as_number),
            args.get(2).cloned(),
        ) else {
            return Err(NativeFault::new(NativeFault::CONVERSION, "bad arguments"));
        };
        let mut acc = start;
        for _ in 0..times as usize {
            counted.fetch_add(1, Ordering::SeqCst);
            acc = scope.call(f, &[acc])?;
        }
        Ok(acc)
    });
    let ctx = Context::builder(program)
        .policy(policy(&["native.call:*"]))
        .native(apply_times)
        .build()
        .unwrap();

    assert_eq!(ctx.run(vec![]).unwrap(), Value::Number(13.0));
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[test]
fn test_script_can_catch_native_failure() {
    // try { fails(); } catch (e) { e.kind; }
    let program = program(|b| {
        let call = b.call_named("fails", vec![]);
        let call = b.expr_stmt(call);
        let body = b.block(vec![call]);
        let e = b.ident("e");
        let kind = b.member(e, "kind");
        let ret = b.return_(Some(kind));
        let handler = b.block(vec![ret]);
        let guarded = b.try_catch(body, Some("e"), handler);
        let main = b.fn_decl("main", vec![], vec![guarded]);
        vec![main]
    });
    let fails = NativeBinding::new("fails", |_, _| Err(NativeFault::new(3, "unavailable")));
    let ctx = Context::builder(program)
        .policy(policy(&["native.call:*"]))
        .native(fails)
        .build()
        .unwrap();

    assert_eq!(ctx.run(vec![]).unwrap(), Value::str("NativeInvocationError"));
}

#[test]
fn test_registering_after_construction_rebinds_the_global() {
    let ctx = Context::new(
        program(|b| {
            let call = b.call_named("version", vec![]);
            vec![b.expr_stmt(call)]
        }),
        policy(&["native.call:*"]),
    )
    .expect("valid program");
    ctx.register_native(NativeBinding::new("version", |_, _| Ok(HostValue::from(1.0))))
        .unwrap();
    assert_eq!(ctx.run(vec![]).unwrap(), Value::Number(1.0));

    ctx.register_native(NativeBinding::new("version", |_, _| Ok(HostValue::from(2.0))))
        .unwrap();
    assert_eq!(ctx.run(vec![]).unwrap(), Value::Number(2.0));
}
