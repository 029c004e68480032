//! How failures surface to the host.

use lark_eval::{Context, EvalErrorKind, RuntimeConfig, Value};
use lark_ir::{BinaryOp, Span, TypeHint};
use pretty_assertions::assert_eq;

use super::{policy, program};

#[test]
fn test_hinted_parameter_fails_at_call_site() {
    // function square(x: Number) { return x * x; }
    // ...
    // square("four");    <- call at 100..114
    let program = program(|b| {
        b.at(Span::new(15, 24));
        let param = b.param_hinted("x", TypeHint::Number);
        b.at(Span::new(30, 45));
        let x = b.ident("x");
        let x2 = b.ident("x");
        let product = b.binary(BinaryOp::Mul, x, x2);
        let ret = b.return_(Some(product));
        b.at(Span::new(0, 50));
        let square = b.fn_decl("square", vec![param], vec![ret]);

        b.at(Span::new(107, 113));
        let four = b.str("four");
        b.at(Span::new(100, 114));
        let call = b.call_named("square", vec![four]);
        let stmt = b.expr_stmt(call);
        vec![square, stmt]
    });
    let ctx = Context::new(program, policy(&[])).expect("valid program");
    let error = ctx.run(vec![]).expect_err("argument is not a number");

    assert_eq!(
        error.kind,
        EvalErrorKind::TypeMismatch {
            expected: "Number".to_string(),
            actual: "String".to_string(),
        }
    );
    assert_eq!(error.span, Some(Span::new(100, 114)));
    let note = error.notes.first().expect("parameter note");
    assert_eq!(note.message, "in argument for parameter `x`");
    assert_eq!(note.span, Some(Span::new(15, 24)));
}

/// `function down(n) { return down(n + 1); }`
/// `function main(deep) { if (deep) return down(0); return "fine"; }`
fn recursion_program() -> lark_ir::Program {
    program(|b| {
        let n = b.ident("n");
        let one = b.num(1.0);
        let next = b.binary(BinaryOp::Add, n, one);
        let call = b.call_named("down", vec![next]);
        let ret = b.return_(Some(call));
        let param = b.param("n");
        let down = b.fn_decl("down", vec![param], vec![ret]);

        let deep = b.ident("deep");
        let zero = b.num(0.0);
        let recurse = b.call_named("down", vec![zero]);
        let ret_recurse = b.return_(Some(recurse));
        let branch = b.if_(deep, ret_recurse, None);
        let fine = b.str("fine");
        let ret_fine = b.return_(Some(fine));
        let param = b.param("deep");
        let main = b.fn_decl("main", vec![param], vec![branch, ret_fine]);
        vec![down, main]
    })
}

#[test]
fn test_stack_overflow_leaves_context_usable() {
    let ctx = Context::builder(recursion_program())
        .config(RuntimeConfig::default().with_max_call_depth(64))
        .build()
        .expect("valid context");

    let error = ctx.run(vec![Value::Bool(true)]).expect_err("unbounded recursion");
    assert_eq!(error.kind, EvalErrorKind::StackOverflow { depth: 64 });
    let backtrace = error.backtrace.expect("backtrace");
    assert_eq!(backtrace.len(), 64);
    assert_eq!(backtrace.names().next(), Some("down"));

    assert_eq!(ctx.run(vec![Value::Bool(false)]).ok(), Some(Value::str("fine")));
}

#[test]
fn test_default_depth_limit_fires_before_native_stack_runs_out() {
    let ctx = Context::new(recursion_program(), policy(&[])).expect("valid program");
    let error = ctx.run(vec![Value::Bool(true)]).expect_err("unbounded recursion");
    assert_eq!(
        error.kind,
        EvalErrorKind::StackOverflow {
            depth: RuntimeConfig::DEFAULT_MAX_CALL_DEPTH
        }
    );
}

#[test]
fn test_stack_overflow_is_catchable_by_script() {
    // function main() { try { down(0); } catch (e) { return e.kind; } }
    let program = program(|b| {
        let n = b.ident("n");
        let one = b.num(1.0);
        let next = b.binary(BinaryOp::Add, n, one);
        let call = b.call_named("down", vec![next]);
        let ret = b.return_(Some(call));
        let param = b.param("n");
        let down = b.fn_decl("down", vec![param], vec![ret]);

        let zero = b.num(0.0);
        let recurse = b.call_named("down", vec![zero]);
        let recurse = b.expr_stmt(recurse);
        let body = b.block(vec![recurse]);
        let e = b.ident("e");
        let kind = b.member(e, "kind");
        let ret_kind = b.return_(Some(kind));
        let handler = b.block(vec![ret_kind]);
        let guarded = b.try_catch(body, Some("e"), handler);
        let main = b.fn_decl("main", vec![], vec![guarded]);
        vec![down, main]
    });
    let ctx = Context::builder(program)
        .config(RuntimeConfig::default().with_max_call_depth(32))
        .build()
        .expect("valid context");

    assert_eq!(ctx.run(vec![]).ok(), Some(Value::str("StackOverflowError")));
}

#[test]
fn test_type_errors_are_never_downgraded_to_null() {
    // 1 - "one";
    let program = program(|b| {
        let one = b.num(1.0);
        let text = b.str("one");
        b.at(Span::new(0, 9));
        let diff = b.binary(BinaryOp::Sub, one, text);
        vec![b.expr_stmt(diff)]
    });
    let error = Context::new(program, policy(&[]))
        .expect("valid program")
        .run(vec![])
        .expect_err("mixed operands");
    assert_eq!(error.kind_name(), "TypeMismatchError");
    assert_eq!(error.span, Some(Span::new(0, 9)));
    let notes: Vec<&str> = error.notes.iter().map(|n| n.message.as_str()).collect();
    assert_eq!(notes, vec!["in operands of `-`"]);
}

#[test]
fn test_division_by_zero_follows_float_semantics() {
    let program = program(|b| {
        let one = b.num(1.0);
        let zero = b.num(0.0);
        let div = b.binary(BinaryOp::Div, one, zero);
        vec![b.expr_stmt(div)]
    });
    let value = Context::new(program, policy(&[]))
        .expect("valid program")
        .run(vec![]);
    assert_eq!(value.ok(), Some(Value::Number(f64::INFINITY)));
}
