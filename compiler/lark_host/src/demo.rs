//! Built-in demonstration program.
//!
//! ```text
//! let counter = { n: 0 };
//!
//! function work(times) {
//!     for (let i = 0; i < times; i = i + 1) {
//!         lock (counter) { counter.n = counter.n + 1; }
//!     }
//! }
//!
//! function main(workers, times) {
//!     let tasks = [];
//!     for (let w = 0; w < workers; w = w + 1) { push(tasks, spawn(work, times)); }
//!     for (let w = 0; w < workers; w = w + 1) { join(tasks[w]); }
//!     print("counter = " + counter.n);
//!     return counter.n;
//! }
//! ```
//!
//! Running it needs `thread.spawn` and `native.call:print`.

use lark_eval::{HostValue, NativeBinding, NativeFault, NativeScope};
use lark_ir::{AstBuilder, BinaryOp, ExprId, Program, StmtId};

fn render(scope: &NativeScope<'_>, value: &HostValue, line: &mut String) -> Result<(), NativeFault> {
    match value {
        HostValue::Null => line.push_str("null"),
        HostValue::Bool(b) => line.push_str(&b.to_string()),
        HostValue::Number(n) => line.push_str(&n.to_string()),
        HostValue::Bytes(_) => match value.as_str() {
            Some(text) => line.push_str(text),
            None => return Err(NativeFault::new(NativeFault::CONVERSION, "text is not UTF-8")),
        },
        HostValue::Object(_) => line.push_str("[object]"),
        HostValue::Array(array) => {
            line.push('[');
            for (i, element) in scope.elements(array)?.iter().enumerate() {
                if i > 0 {
                    line.push_str(", ");
                }
                render(scope, element, line)?;
            }
            line.push(']');
        }
        HostValue::Function(f) => line.push_str(f.name().unwrap_or("<anonymous>")),
    }
    Ok(())
}

/// `print(...)`, guarded by `native.call:print`.
pub fn print_native() -> NativeBinding {
    NativeBinding::new("print", |scope, args| {
        let mut line = String::new();
        for arg in args {
            render(scope, arg, &mut line)?;
        }
        tracing::debug!(native = scope.name(), "print");
        println!("{line}");
        Ok(HostValue::Null)
    })
}

/// `for (let <var> = 0; <var> < <limit>; <var> = <var> + 1) body`
fn count_up(b: &mut AstBuilder, var: &str, limit: &str, body: StmtId) -> StmtId {
    let zero = b.num(0.0);
    let init = b.let_(var, zero);
    let v = b.ident(var);
    let limit = b.ident(limit);
    let cond = b.binary(BinaryOp::Lt, v, limit);
    let v = b.ident(var);
    let one = b.num(1.0);
    let next = b.binary(BinaryOp::Add, v, one);
    let update = b.assign_var(var, next);
    b.for_(Some(init), Some(cond), Some(update), body)
}

fn counter_n(b: &mut AstBuilder) -> ExprId {
    let counter = b.ident("counter");
    b.member(counter, "n")
}

fn work(b: &mut AstBuilder) -> StmtId {
    let counter = b.ident("counter");
    let target = b.member(counter, "n");
    let n = counter_n(b);
    let one = b.num(1.0);
    let sum = b.binary(BinaryOp::Add, n, one);
    let assign = b.assign(target, sum);
    let inc = b.expr_stmt(assign);
    let inner = b.block(vec![inc]);
    let counter = b.ident("counter");
    let locked = b.lock(counter, inner);
    let body = b.block(vec![locked]);
    let lp = count_up(b, "i", "times", body);
    let times = b.param("times");
    b.fn_decl("work", vec![times], vec![lp])
}

fn entry(b: &mut AstBuilder) -> StmtId {
    let tasks = b.array(vec![]);
    let let_tasks = b.let_("tasks", tasks);

    let tasks = b.ident("tasks");
    let worker = b.ident("work");
    let times = b.ident("times");
    let handle = b.call_named("spawn", vec![worker, times]);
    let store = b.call_named("push", vec![tasks, handle]);
    let store = b.expr_stmt(store);
    let body = b.block(vec![store]);
    let spawn_all = count_up(b, "w", "workers", body);

    let tasks = b.ident("tasks");
    let w = b.ident("w");
    let slot = b.index(tasks, w);
    let joined = b.call_named("join", vec![slot]);
    let joined = b.expr_stmt(joined);
    let body = b.block(vec![joined]);
    let join_all = count_up(b, "w", "workers", body);

    let label = b.str("counter = ");
    let n = counter_n(b);
    let line = b.binary(BinaryOp::Add, label, n);
    let print = b.call_named("print", vec![line]);
    let print = b.expr_stmt(print);

    let n = counter_n(b);
    let ret = b.return_(Some(n));

    let workers = b.param("workers");
    let times = b.param("times");
    b.fn_decl(
        "main",
        vec![workers, times],
        vec![let_tasks, spawn_all, join_all, print, ret],
    )
}

pub fn counter_program() -> Program {
    let mut b = AstBuilder::new();
    let zero = b.num(0.0);
    let counter = b.object(vec![("n", zero)]);
    let let_counter = b.let_("counter", counter);
    let work = work(&mut b);
    let main = entry(&mut b);
    b.finish(vec![let_counter, work, main])
}
