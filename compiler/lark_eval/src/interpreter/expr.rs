//! Expression evaluation.

use std::sync::Arc;

use lark_ir::{BinaryOp, ExprId, ExprKind, FunctionId, Span};
use lark_value::{
    immutable_binding, invalid_assignment_target, type_mismatch, undefined_variable, AssignError,
    EvalError, EvalNote, EvalResult, FunctionValue, PropertyKey, Value,
};
use smallvec::SmallVec;

use super::{eval_binary, eval_unary, Interpreter};
use crate::stack::ensure_sufficient_stack;

/// Most calls pass a handful of arguments.
pub(crate) type ArgVec = SmallVec<[Value; 4]>;

impl Interpreter {
    pub(crate) fn eval_expr(&mut self, id: ExprId) -> EvalResult {
        ensure_sufficient_stack(|| self.eval_expr_inner(id))
    }

    fn eval_expr_inner(&mut self, id: ExprId) -> EvalResult {
        let arena = self.arena.clone();
        let expr = arena.expr(id);
        let span = expr.span;

        match &expr.kind {
            ExprKind::Null => Ok(Value::Null),
            ExprKind::Bool(b) => Ok(Value::Bool(*b)),
            ExprKind::Number(n) => Ok(Value::Number(*n)),
            ExprKind::Str(s) => Ok(Value::Str(Arc::clone(s))),
            ExprKind::Ident(name) => self
                .env
                .lookup(*name)
                .ok_or_else(|| undefined_variable(self.name_str(*name)).with_span(span)),
            ExprKind::This => Ok(self.this.clone()),

            ExprKind::Unary { op, operand } => {
                let value = self.eval_expr(*operand)?;
                eval_unary(*op, &value).map_err(|e| operator_error(e, op.as_symbol(), span))
            }
            ExprKind::Binary { op, left, right } => self.eval_binary_expr(*op, *left, *right, span),

            ExprKind::Assign { target, value } => self.eval_assign(*target, *value, span),

            ExprKind::Member { object, property } => {
                let target = self.eval_expr(*object)?;
                self.read_member(&target, self.name_str(*property), span)
            }
            ExprKind::Index { object, key } => {
                let target = self.eval_expr(*object)?;
                let key = self.eval_expr(*key)?;
                self.read_index(&target, &key, span)
            }

            ExprKind::Call { callee, args } => self.eval_call(*callee, args, span),

            ExprKind::Object {
                prototype,
                properties,
            } => {
                let proto = match prototype {
                    Some(p) => match self.eval_expr(*p)? {
                        Value::Object(obj) => Some(obj),
                        Value::Null => None,
                        other => {
                            return Err(type_mismatch("Object", other.type_name()).with_span(span))
                        }
                    },
                    None => None,
                };
                let obj = self.ctx.heap.alloc(proto);
                for (name, value) in properties {
                    let value = self.eval_expr(*value)?;
                    obj.set_own(self.name_str(*name), value);
                }
                Ok(Value::Object(obj))
            }

            ExprKind::Array(elements) => {
                let mut values = Vec::with_capacity(elements.len());
                for element in elements {
                    values.push(self.eval_expr(*element)?);
                }
                Ok(Value::Array(self.ctx.heap.alloc_array(values)))
            }

            ExprKind::Function(function) => Ok(self.make_closure(*function)),
        }
    }

    /// A closure over the current local frame.
    pub(crate) fn make_closure(&self, function: FunctionId) -> Value {
        let name = self
            .arena
            .function(function)
            .name
            .map(|n| (n, self.name_str(n)));
        Value::Function(Arc::new(FunctionValue::new(
            self.ctx.heap.id(),
            self.arena.clone(),
            function,
            self.env.current(),
            name,
        )))
    }

    fn eval_binary_expr(&mut self, op: BinaryOp, left: ExprId, right: ExprId, span: Span) -> EvalResult {
        let lhs = self.eval_expr(left)?;
        if op.is_short_circuit() {
            let decided = match op {
                BinaryOp::And => !lhs.is_truthy(),
                _ => lhs.is_truthy(),
            };
            if decided {
                return Ok(Value::Bool(lhs.is_truthy()));
            }
            let rhs = self.eval_expr(right)?;
            return Ok(Value::Bool(rhs.is_truthy()));
        }
        let rhs = self.eval_expr(right)?;
        eval_binary(op, &lhs, &rhs).map_err(|e| operator_error(e, op.as_symbol(), span))
    }

    fn eval_assign(&mut self, target: ExprId, value: ExprId, span: Span) -> EvalResult {
        let arena = self.arena.clone();
        match &arena.expr(target).kind {
            ExprKind::Ident(name) => {
                let value = self.eval_expr(value)?;
                match self.env.assign(*name, value.clone()) {
                    Ok(()) => Ok(value),
                    Err(AssignError::Unbound) => {
                        Err(undefined_variable(self.name_str(*name)).with_span(span))
                    }
                    Err(AssignError::Immutable) => {
                        Err(immutable_binding(self.name_str(*name)).with_span(span))
                    }
                    Err(AssignError::Hint(hint)) => {
                        Err(type_mismatch(hint.as_str(), value.type_name()).with_span(span))
                    }
                }
            }
            ExprKind::Member { object, property } => {
                let target = self.eval_expr(*object)?;
                let value = self.eval_expr(value)?;
                let key = PropertyKey::Static(self.name_str(*property));
                self.write_member(&target, key, value.clone(), span)?;
                Ok(value)
            }
            ExprKind::Index { object, key } => {
                let target = self.eval_expr(*object)?;
                let key = self.eval_expr(*key)?;
                let value = self.eval_expr(value)?;
                self.write_index(&target, &key, value.clone(), span)?;
                Ok(value)
            }
            _ => Err(invalid_assignment_target().with_span(span)),
        }
    }

    /// Calls through a member or index expression bind `this` to the
    /// receiver.
    fn eval_call(&mut self, callee: ExprId, args: &[ExprId], span: Span) -> EvalResult {
        let arena = self.arena.clone();
        let (function, this) = match &arena.expr(callee).kind {
            ExprKind::Member { object, property } => {
                let receiver = self.eval_expr(*object)?;
                let key = self.name_str(*property);
                (self.read_member(&receiver, key, span)?, receiver)
            }
            ExprKind::Index { object, key } => {
                let receiver = self.eval_expr(*object)?;
                let key = self.eval_expr(*key)?;
                (self.read_index(&receiver, &key, span)?, receiver)
            }
            _ => (self.eval_expr(callee)?, Value::Null),
        };

        let mut values = ArgVec::with_capacity(args.len());
        for arg in args {
            values.push(self.eval_expr(*arg)?);
        }
        self.call_value(&function, this, &values, span)
    }
}

#[cold]
fn operator_error(error: EvalError, symbol: &str, span: Span) -> EvalError {
    error
        .or_span(span)
        .with_note(EvalNote::new(format!("in operands of `{symbol}`")))
}
