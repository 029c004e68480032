//! Tree-walking evaluator.
//!
//! One [`Interpreter`] runs on one thread. It owns its local frames and
//! call stack; everything it shares with other evaluators of the same
//! context (heap objects, globals in shared mode, the native registry) is
//! reached through the context and synchronized there.
//!
//! - `expr` evaluates expression nodes to values.
//! - `stmt` executes statements to a [`Flow`] signal.
//! - `call` applies script functions, natives and intrinsics.
//! - `members` reads and writes object properties and array elements.
//! - `operators` holds the pure unary and binary operator rules.

mod call;
mod expr;
mod members;
mod operators;
mod stmt;

use std::sync::Arc;

use lark_ir::{Mutability, Name, SharedArena, Span, TypeHint};
use lark_value::{
    cancelled, immutable_binding, lock_timeout, EvalError, EvalErrorKind, EvalResult,
    MonitorGuard, ObjectRef, ScopeRef, Value,
};

use crate::context::ContextInner;
use crate::diagnostics::CallStack;
use crate::environment::Environment;
use crate::scheduler::CancelToken;

pub(crate) use members::property_key;
pub(crate) use operators::{eval_binary, eval_unary};

/// Control signal produced by a statement. Raised errors travel in the
/// `Err` side of the surrounding `Result`.
#[derive(Clone, Debug)]
pub(crate) enum Flow {
    Normal,
    /// Value and span of the `return` statement.
    Return(Value, Span),
    Break,
    Continue,
}

pub(crate) struct Interpreter {
    pub(crate) ctx: Arc<ContextInner>,
    pub(crate) env: Environment,
    pub(crate) this: Value,
    pub(crate) arena: SharedArena,
    pub(crate) call_stack: CallStack,
    cancel: Option<CancelToken>,
    /// Depth of monitor-holding sections; cancellation is not honored
    /// while positive.
    no_preempt: u32,
}

impl Interpreter {
    pub(crate) fn new(ctx: Arc<ContextInner>, globals: ScopeRef, cancel: Option<CancelToken>) -> Self {
        let arena = ctx.program.arena.clone();
        let call_stack = CallStack::new(ctx.config.max_call_depth);
        Interpreter {
            ctx,
            env: Environment::new(globals),
            this: Value::Null,
            arena,
            call_stack,
            cancel,
            no_preempt: 0,
        }
    }

    /// Execute the top-level statements, then `main(args...)` if defined.
    #[tracing::instrument(level = "debug", skip_all)]
    pub(crate) fn run_program(&mut self, args: Vec<Value>) -> EvalResult {
        let program = self.ctx.program.clone();
        let mut last = Value::Null;

        for &id in program.body.iter() {
            let stmt = program.arena.stmt(id);
            match stmt.kind {
                // Hoisted when the context was built.
                lark_ir::StmtKind::Function(_) => {}
                lark_ir::StmtKind::Expr(expr) => {
                    self.check_cancel(stmt.span)?;
                    last = self.eval_expr(expr)?;
                }
                _ => {
                    if let Flow::Return(value, _) = self.exec_stmt(id)? {
                        return Ok(value);
                    }
                }
            }
        }

        match self.env.lookup(self.ctx.names.main) {
            Some(main) if main.is_callable() => {
                self.call_value(&main, Value::Null, &args, Span::DUMMY)
            }
            _ => Ok(last),
        }
    }

    /// Entry of a spawned task.
    pub(crate) fn run_entry(&mut self, entry: &Value, args: &[Value]) -> EvalResult {
        let result = self.call_value(entry, Value::Null, args, Span::DUMMY);
        if self.cancel_requested() {
            return Err(cancelled());
        }
        result
    }

    // Names

    pub(crate) fn name_str(&self, name: Name) -> &'static str {
        self.ctx.program.interner.lookup(name)
    }

    /// Declare `name` in the innermost frame. Redeclaring a constant of
    /// the same frame raises `ImmutableBindingError`.
    pub(crate) fn declare(
        &self,
        name: Name,
        value: Value,
        mutability: Mutability,
        hint: Option<TypeHint>,
        span: Span,
    ) -> Result<(), EvalError> {
        self.env
            .define(name, value, mutability, hint)
            .map_err(|_| immutable_binding(self.name_str(name)).with_span(span))
    }

    // Cancellation

    pub(crate) fn cancel_requested(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancelToken::is_cancelled)
    }

    /// Statement-boundary safe point.
    #[inline]
    pub(crate) fn check_cancel(&self, span: Span) -> Result<(), EvalError> {
        if self.no_preempt == 0 && self.cancel_requested() {
            tracing::debug!("stopping at safe point after cancellation");
            return Err(cancelled().with_span(span));
        }
        Ok(())
    }

    // Objects

    /// Take `obj`'s monitor, honoring the configured timeout.
    pub(crate) fn lock_monitor<'o>(
        &self,
        obj: &'o ObjectRef,
        span: Span,
    ) -> Result<MonitorGuard<'o>, EvalError> {
        let timeout = self.ctx.config.lock_timeout();
        obj.lock_monitor(timeout).ok_or_else(|| {
            let timeout_ms = timeout.map_or(0, |t| u64::try_from(t.as_millis()).unwrap_or(u64::MAX));
            tracing::warn!(object = obj.id().raw(), timeout_ms, "object lock timed out");
            lock_timeout(timeout_ms).with_span(span)
        })
    }

    /// Run `f` with cancellation deferred.
    pub(crate) fn non_preemptible<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        self.no_preempt += 1;
        let result = f(self);
        self.no_preempt -= 1;
        result
    }

    /// Value bound by a `catch` clause.
    pub(crate) fn error_value(&self, err: &EvalError) -> Value {
        if let (EvalErrorKind::User { .. }, Some(payload)) = (&err.kind, &err.payload) {
            return payload.clone();
        }
        let obj = self.ctx.heap.alloc(None);
        obj.set_own("kind", Value::str(err.kind_name()));
        obj.set_own("message", Value::str(&err.message()));
        let (start, end) = match err.span {
            Some(span) => (Value::Number(f64::from(span.start)), Value::Number(f64::from(span.end))),
            None => (Value::Null, Value::Null),
        };
        obj.set_own("start", start);
        obj.set_own("end", end);
        Value::Object(obj)
    }
}
