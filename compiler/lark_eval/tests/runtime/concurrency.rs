//! Several evaluators on one context.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Barrier};
use std::time::Duration;

use lark_eval::{
    Context, EvalErrorKind, GlobalSharing, HostValue, NativeBinding, RuntimeConfig, Value,
};
use lark_ir::{AstBuilder, BinaryOp, ExprId, StmtId};
use pretty_assertions::assert_eq;

use super::{policy, program};

/// `for (let i = 0; i < times; i = i + 1) body`
fn repeat(b: &mut AstBuilder, times: f64, body: StmtId) -> StmtId {
    let zero = b.num(0.0);
    let init = b.let_("i", zero);
    let i = b.ident("i");
    let limit = b.num(times);
    let cond = b.binary(BinaryOp::Lt, i, limit);
    let i = b.ident("i");
    let one = b.num(1.0);
    let next = b.binary(BinaryOp::Add, i, one);
    let update = b.assign_var("i", next);
    b.for_(Some(init), Some(cond), Some(update), body)
}

/// `counter.n = counter.n + 1;`
fn increment(b: &mut AstBuilder) -> StmtId {
    let counter = b.ident("counter");
    let target = b.member(counter, "n");
    let counter = b.ident("counter");
    let n = b.member(counter, "n");
    let one = b.num(1.0);
    let sum = b.binary(BinaryOp::Add, n, one);
    let assign = b.assign(target, sum);
    b.expr_stmt(assign)
}

/// `let counter = { n: 0 }; function work() { repeat 1000 { <locked?> increment } }`
fn counter_program(locked: bool) -> lark_ir::Program {
    program(|b| {
        let zero = b.num(0.0);
        let obj = b.object(vec![("n", zero)]);
        let let_counter = b.let_("counter", obj);

        let inc = increment(b);
        let body = if locked {
            let counter = b.ident("counter");
            let inner = b.block(vec![inc]);
            b.lock(counter, inner)
        } else {
            inc
        };
        let body = b.block(vec![body]);
        let lp = repeat(b, 1000.0, body);
        let work = b.fn_decl("work", vec![], vec![lp]);
        vec![let_counter, work]
    })
}

fn counter_value(ctx: &Context) -> Value {
    let counter = ctx.global("counter").and_then(|v| v.as_object().cloned());
    let counter = counter.expect("counter is an object");
    ctx.get_property(&counter, "n").expect("readable")
}

#[test]
fn test_locked_increments_are_not_lost() {
    let ctx =
        Context::new(counter_program(true), policy(&["thread.spawn"])).expect("valid program");
    ctx.run(vec![]).expect("top level runs");
    let work = ctx.global("work").expect("hoisted");

    let first = ctx.spawn(&work, vec![]).expect("spawn");
    let second = ctx.spawn(&work, vec![]).expect("spawn");
    assert!(first.join().is_ok());
    assert!(second.join().is_ok());

    assert_eq!(counter_value(&ctx), Value::Number(2000.0));
    assert_eq!(ctx.active_tasks(), 0);
}

#[test]
fn test_unlocked_increments_do_not_crash() {
    let ctx =
        Context::new(counter_program(false), policy(&["thread.spawn"])).expect("valid program");
    ctx.run(vec![]).expect("top level runs");
    let work = ctx.global("work").expect("hoisted");

    let handles: Vec<_> = (0..2)
        .map(|_| ctx.spawn(&work, vec![]).expect("spawn"))
        .collect();
    for handle in &handles {
        assert!(handle.join().is_ok());
    }

    let n = counter_value(&ctx).as_number().expect("still a number");
    assert!((1.0..=2000.0).contains(&n), "unexpected count {n}");
}

#[test]
fn test_script_spawned_workers_share_the_heap() {
    // function main() {
    //   let a = spawn(work); let b = spawn(work); join(a); join(b); return counter.n;
    // }
    let program = program(|b| {
        let zero = b.num(0.0);
        let obj = b.object(vec![("n", zero)]);
        let let_counter = b.let_("counter", obj);
        let inc = increment(b);
        let counter = b.ident("counter");
        let inner = b.block(vec![inc]);
        let locked = b.lock(counter, inner);
        let body = b.block(vec![locked]);
        let lp = repeat(b, 1000.0, body);
        let work = b.fn_decl("work", vec![], vec![lp]);

        let spawn_a = spawn_work(b);
        let let_a = b.let_("a", spawn_a);
        let spawn_b = spawn_work(b);
        let let_b = b.let_("b", spawn_b);
        let a = b.ident("a");
        let join_a = b.call_named("join", vec![a]);
        let join_a = b.expr_stmt(join_a);
        let bb = b.ident("b");
        let join_b = b.call_named("join", vec![bb]);
        let join_b = b.expr_stmt(join_b);
        let counter = b.ident("counter");
        let n = b.member(counter, "n");
        let ret = b.return_(Some(n));
        let main = b.fn_decl("main", vec![], vec![let_a, let_b, join_a, join_b, ret]);
        vec![let_counter, work, main]
    });

    let ctx = Context::new(program, policy(&["thread.spawn"])).expect("valid program");
    assert_eq!(ctx.run(vec![]).ok(), Some(Value::Number(2000.0)));
}

fn spawn_work(b: &mut AstBuilder) -> ExprId {
    let work = b.ident("work");
    b.call_named("spawn", vec![work])
}

/// `function spin() { while (true) {} }`
fn spin_program(wrap_in_try: bool) -> lark_ir::Program {
    program(|b| {
        let t = b.bool(true);
        let empty = b.block(vec![]);
        let lp = b.while_(t, empty);
        let body = if wrap_in_try {
            let guarded = b.block(vec![lp]);
            let caught = b.str("caught");
            let ret = b.return_(Some(caught));
            let handler = b.block(vec![ret]);
            b.try_catch(guarded, Some("e"), handler)
        } else {
            lp
        };
        let spin = b.fn_decl("spin", vec![], vec![body]);
        vec![spin]
    })
}

#[test]
fn test_cancel_stops_at_statement_boundary() {
    let ctx = Context::new(spin_program(false), policy(&["thread.spawn"])).expect("valid program");
    let spin = ctx.global("spin").expect("hoisted");
    let handle = ctx.spawn(&spin, vec![]).expect("spawn");

    assert!(handle.join_timeout(Duration::from_millis(20)).is_none());
    assert!(handle.cancel());
    assert_eq!(handle.join().err().map(|e| e.kind), Some(EvalErrorKind::Cancelled));
    // Every join observes the same outcome.
    assert_eq!(handle.join().err().map(|e| e.kind), Some(EvalErrorKind::Cancelled));
}

#[test]
fn test_cancellation_is_not_catchable() {
    let ctx = Context::new(spin_program(true), policy(&["thread.spawn"])).expect("valid program");
    let spin = ctx.global("spin").expect("hoisted");
    let handle = ctx.spawn(&spin, vec![]).expect("spawn");

    std::thread::sleep(Duration::from_millis(10));
    handle.cancel();
    assert!(handle.join().err().is_some_and(|e| e.is_cancelled()));
}

#[test]
fn test_cancel_all_reaches_every_worker() {
    let ctx = Context::new(spin_program(false), policy(&["thread.spawn"])).expect("valid program");
    let spin = ctx.global("spin").expect("hoisted");
    let handles: Vec<_> = (0..3)
        .map(|_| ctx.spawn(&spin, vec![]).expect("spawn"))
        .collect();

    assert_eq!(ctx.cancel_all(), 3);
    for handle in handles {
        assert!(handle.join().err().is_some_and(|e| e.is_cancelled()));
    }
    assert_eq!(ctx.active_tasks(), 0);
}

#[test]
fn test_cancel_waits_for_native_call() {
    let started = Arc::new(Barrier::new(2));
    let release = Arc::new(Barrier::new(2));
    let returned = Arc::new(AtomicBool::new(false));

    let blocking = {
        let started = Arc::clone(&started);
        let release = Arc::clone(&release);
        let returned = Arc::clone(&returned);
        NativeBinding::new("block", move |_, _| {
            started.wait();
            release.wait();
            returned.store(true, Ordering::SeqCst);
            Ok(HostValue::Number(1.0))
        })
    };

    // function work() { block(); return "finished"; }
    let program = program(|b| {
        let call = b.call_named("block", vec![]);
        let call = b.expr_stmt(call);
        let done = b.str("finished");
        let ret = b.return_(Some(done));
        let work = b.fn_decl("work", vec![], vec![call, ret]);
        vec![work]
    });
    let ctx = Context::builder(program)
        .policy(policy(&["thread.spawn", "native.call:block"]))
        .native(blocking)
        .build()
        .expect("valid context");

    let work = ctx.global("work").expect("hoisted");
    let handle = ctx.spawn(&work, vec![]).expect("spawn");

    started.wait();
    assert!(handle.cancel());
    assert!(handle.join_timeout(Duration::from_millis(30)).is_none());
    assert!(!returned.load(Ordering::SeqCst));

    release.wait();
    assert_eq!(handle.join().err().map(|e| e.kind), Some(EvalErrorKind::Cancelled));
    assert!(returned.load(Ordering::SeqCst));
}

/// `let g = 1; function rebind() { g = 2; return g; }`
fn rebind_program() -> lark_ir::Program {
    program(|b| {
        let one = b.num(1.0);
        let let_g = b.let_("g", one);
        let two = b.num(2.0);
        let assign = b.assign_var("g", two);
        let assign = b.expr_stmt(assign);
        let g = b.ident("g");
        let ret = b.return_(Some(g));
        let rebind = b.fn_decl("rebind", vec![], vec![assign, ret]);
        vec![let_g, rebind]
    })
}

fn rebind_in_worker(sharing: GlobalSharing) -> (Value, Option<Value>) {
    let ctx = Context::builder(rebind_program())
        .policy(policy(&["thread.spawn"]))
        .config(RuntimeConfig::default().with_global_sharing(sharing))
        .build()
        .expect("valid context");
    ctx.run(vec![]).expect("top level runs");
    let rebind = ctx.global("rebind").expect("hoisted");
    let seen = ctx.spawn(&rebind, vec![]).expect("spawn").join().expect("joins");
    (seen, ctx.global("g"))
}

#[test]
fn test_shared_globals_see_worker_rebinding() {
    let (seen, after) = rebind_in_worker(GlobalSharing::Shared);
    assert_eq!(seen, Value::Number(2.0));
    assert_eq!(after, Some(Value::Number(2.0)));
}

#[test]
fn test_isolated_globals_keep_rebinding_private() {
    let (seen, after) = rebind_in_worker(GlobalSharing::Isolated);
    assert_eq!(seen, Value::Number(2.0));
    assert_eq!(after, Some(Value::Number(1.0)));
}

#[test]
fn test_isolated_workers_still_share_objects() {
    // let box = { v: 0 }; function fill() { box.v = 9; }
    let program = program(|b| {
        let zero = b.num(0.0);
        let obj = b.object(vec![("v", zero)]);
        let let_box = b.let_("box", obj);
        let bx = b.ident("box");
        let target = b.member(bx, "v");
        let nine = b.num(9.0);
        let assign = b.assign(target, nine);
        let assign = b.expr_stmt(assign);
        let fill = b.fn_decl("fill", vec![], vec![assign]);
        vec![let_box, fill]
    });
    let ctx = Context::builder(program)
        .policy(policy(&["thread.spawn"]))
        .config(RuntimeConfig::default().with_global_sharing(GlobalSharing::Isolated))
        .build()
        .expect("valid context");
    ctx.run(vec![]).expect("top level runs");
    let fill = ctx.global("fill").expect("hoisted");
    ctx.spawn(&fill, vec![]).expect("spawn").join().expect("joins");

    let bx = ctx.global("box").and_then(|v| v.as_object().cloned()).expect("object");
    assert_eq!(ctx.get_property(&bx, "v").ok(), Some(Value::Number(9.0)));
}

#[test]
fn test_lock_timeout_is_reported() {
    let started = Arc::new(Barrier::new(2));
    let release = Arc::new(Barrier::new(2));
    let blocking = {
        let started = Arc::clone(&started);
        let release = Arc::clone(&release);
        NativeBinding::new("block", move |_, _| {
            started.wait();
            release.wait();
            Ok(HostValue::Null)
        })
    };

    // let o = {};
    // function hold() { lock (o) { block(); } }
    // function grab() { lock (o) { return 1; } }
    let program = program(|b| {
        let obj = b.object(vec![]);
        let let_o = b.let_("o", obj);

        let call = b.call_named("block", vec![]);
        let call = b.expr_stmt(call);
        let body = b.block(vec![call]);
        let o = b.ident("o");
        let locked = b.lock(o, body);
        let hold = b.fn_decl("hold", vec![], vec![locked]);

        let one = b.num(1.0);
        let ret = b.return_(Some(one));
        let body = b.block(vec![ret]);
        let o = b.ident("o");
        let locked = b.lock(o, body);
        let grab = b.fn_decl("grab", vec![], vec![locked]);
        vec![let_o, hold, grab]
    });
    let ctx = Context::builder(program)
        .policy(policy(&["thread.spawn", "native.call:block"]))
        .config(RuntimeConfig::default().with_lock_timeout_ms(20))
        .native(blocking)
        .build()
        .expect("valid context");
    ctx.run(vec![]).expect("top level runs");

    let hold = ctx.global("hold").expect("hoisted");
    let grab = ctx.global("grab").expect("hoisted");
    let holder = ctx.spawn(&hold, vec![]).expect("spawn");
    started.wait();

    let contender = ctx.spawn(&grab, vec![]).expect("spawn");
    assert_eq!(
        contender.join().err().map(|e| e.kind),
        Some(EvalErrorKind::LockTimeout { timeout_ms: 20 })
    );

    release.wait();
    assert!(holder.join().is_ok());
    assert_eq!(ctx.spawn(&grab, vec![]).expect("spawn").join().ok(), Some(Value::Number(1.0)));
}

#[test]
fn test_script_that_cancels_its_worker_can_handle_the_join() {
    // function main() {
    //   let h = spawn(spin); cancel(h);
    //   try { join(h); } catch (e) { return e.kind; }
    // }
    let program = program(|b| {
        let t = b.bool(true);
        let empty = b.block(vec![]);
        let lp = b.while_(t, empty);
        let spin = b.fn_decl("spin", vec![], vec![lp]);

        let f = b.ident("spin");
        let spawned = b.call_named("spawn", vec![f]);
        let let_h = b.let_("h", spawned);
        let h = b.ident("h");
        let cancel = b.call_named("cancel", vec![h]);
        let cancel = b.expr_stmt(cancel);
        let h = b.ident("h");
        let join = b.call_named("join", vec![h]);
        let join = b.expr_stmt(join);
        let body = b.block(vec![join]);
        let e = b.ident("e");
        let kind = b.member(e, "kind");
        let ret = b.return_(Some(kind));
        let handler = b.block(vec![ret]);
        let guarded = b.try_catch(body, Some("e"), handler);
        let main = b.fn_decl("main", vec![], vec![let_h, cancel, guarded]);
        vec![spin, main]
    });
    let ctx = Context::new(program, policy(&["thread.spawn"])).expect("valid program");

    assert_eq!(ctx.run(vec![]).unwrap(), Value::str("TaskCancelledError"));
    assert_eq!(ctx.active_tasks(), 0);
}

#[test]
fn test_workers_push_into_a_shared_array() {
    // let out = [];
    // function fill() { for (let i = 0; i < 100; i = i + 1) { push(out, i); } }
    let program = program(|b| {
        let list = b.array(vec![]);
        let let_out = b.let_("out", list);
        let out = b.ident("out");
        let i = b.ident("i");
        let push = b.call_named("push", vec![out, i]);
        let push = b.expr_stmt(push);
        let body = b.block(vec![push]);
        let lp = repeat(b, 100.0, body);
        let fill = b.fn_decl("fill", vec![], vec![lp]);
        vec![let_out, fill]
    });
    let ctx = Context::new(program, policy(&["thread.spawn"])).expect("valid program");
    ctx.run(vec![]).expect("top level runs");
    let fill = ctx.global("fill").expect("hoisted");

    let handles: Vec<_> = (0..4)
        .map(|_| ctx.spawn(&fill, vec![]).expect("spawn"))
        .collect();
    for handle in &handles {
        assert!(handle.join().is_ok());
    }

    let out = ctx.global("out").expect("bound");
    assert_eq!(out.as_array().map(|a| a.len()), Some(400));
}
