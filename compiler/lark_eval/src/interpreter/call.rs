//! Function application.

use lark_ir::{Mutability, Span};
use lark_value::{
    capability_denied, check_hint, not_callable, unknown_native, EvalNote, EvalResult,
    FunctionRef, NativeFunctionRef, Value,
};

use super::{Flow, Interpreter};
use crate::diagnostics::CallFrame;
use crate::native::NativeImpl;
use crate::stack::ensure_sufficient_stack;

impl Interpreter {
    /// Apply any callable value. Missing arguments are `null`; extra
    /// arguments are ignored by script functions.
    pub(crate) fn call_value(&mut self, callee: &Value, this: Value, args: &[Value], span: Span) -> EvalResult {
        match callee {
            Value::Function(function) => self.call_function(function, this, args, span),
            Value::Native(native) => self.call_native_ref(native, args, span),
            other => Err(not_callable(other.type_name()).with_span(span)),
        }
    }

    fn call_function(&mut self, function: &FunctionRef, this: Value, args: &[Value], span: Span) -> EvalResult {
        let name = function.name_str().unwrap_or("<anonymous>");
        self.call_stack
            .push(CallFrame {
                name,
                call_span: Some(span),
            })
            .map_err(|e| {
                tracing::debug!(function = name, depth = self.call_stack.depth(), "call depth limit reached");
                e.with_span(span).with_backtrace(self.call_stack.capture())
            })?;

        let result = self.apply(function, this, args, span);
        let result = result.map_err(|e| {
            if e.backtrace.is_some() {
                e
            } else {
                let backtrace = self.call_stack.capture();
                e.with_backtrace(backtrace)
            }
        });

        self.call_stack.pop();
        result
    }

    /// Bind parameters in a fresh frame over the captured scope and run
    /// the body.
    fn apply(&mut self, function: &FunctionRef, this: Value, args: &[Value], span: Span) -> EvalResult {
        let decl = function.arena.function(function.function);

        let saved_locals = self.env.enter_call(function.scope.as_ref());
        let saved_this = std::mem::replace(&mut self.this, this);
        let saved_arena = std::mem::replace(&mut self.arena, function.arena.clone());

        let mut outcome = Ok(Flow::Normal);
        for (i, param) in decl.params.iter().enumerate() {
            let value = args.get(i).cloned().unwrap_or(Value::Null);
            if let Err(err) = check_hint(param.hint, &value, span) {
                let note = format!("in argument for parameter `{}`", self.name_str(param.name));
                outcome = Err(err.with_note(EvalNote::with_span(note, param.span)));
                break;
            }
            let declared = self.declare(param.name, value, Mutability::Mutable, param.hint, param.span);
            if let Err(err) = declared {
                outcome = Err(err);
                break;
            }
        }

        if outcome.is_ok() {
            outcome = ensure_sufficient_stack(|| self.exec_block(&decl.body));
        }

        self.arena = saved_arena;
        self.this = saved_this;
        self.env.exit_call(saved_locals);

        let (value, return_span) = match outcome? {
            Flow::Return(value, at) => (value, at),
            Flow::Normal | Flow::Break | Flow::Continue => (Value::Null, decl.span),
        };
        check_hint(decl.return_hint, &value, return_span)?;
        Ok(value)
    }

    /// Dispatch through the native registry, checking the entry's
    /// capability first.
    #[tracing::instrument(level = "trace", skip_all, fields(native = native.symbol()))]
    fn call_native_ref(&mut self, native: &NativeFunctionRef, args: &[Value], span: Span) -> EvalResult {
        let Some(entry) = self.ctx.natives.get(native.id()) else {
            return Err(unknown_native(native.symbol()).with_span(span));
        };

        if let Some(capability) = &entry.capability {
            if let Err(denied) = self.ctx.policy.check(capability) {
                return Err(capability_denied(&denied.capability).with_span(span));
            }
        }

        match entry.imp {
            NativeImpl::Host(func) => self.call_host(&entry.name, &*func, args, span),
            NativeImpl::Intrinsic(intrinsic) => self
                .call_intrinsic(intrinsic, args, span)
                .map_err(|e| e.or_span(span)),
        }
    }
}
