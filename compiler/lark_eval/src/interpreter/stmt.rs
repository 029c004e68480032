//! Statement execution.

use lark_ir::{ExprId, FunctionId, Mutability, Span, StmtId, StmtKind};
use lark_value::{check_hint, user_error, EvalError, Value};

use super::{Flow, Interpreter};
use crate::stack::ensure_sufficient_stack;

type ExecResult = Result<Flow, EvalError>;

impl Interpreter {
    pub(crate) fn exec_stmt(&mut self, id: StmtId) -> ExecResult {
        ensure_sufficient_stack(|| self.exec_stmt_inner(id))
    }

    fn exec_stmt_inner(&mut self, id: StmtId) -> ExecResult {
        let arena = self.arena.clone();
        let stmt = arena.stmt(id);
        let span = stmt.span;
        self.check_cancel(span)?;

        match &stmt.kind {
            StmtKind::Expr(expr) => {
                self.eval_expr(*expr)?;
                Ok(Flow::Normal)
            }

            StmtKind::Let {
                name,
                mutability,
                hint,
                init,
            } => {
                let value = match init {
                    Some(init) => {
                        let value = self.eval_expr(*init)?;
                        check_hint(*hint, &value, span)?;
                        value
                    }
                    None => Value::Null,
                };
                self.declare(*name, value, *mutability, *hint, span)?;
                Ok(Flow::Normal)
            }

            StmtKind::Block(stmts) => {
                self.env.push_scope();
                let result = self.exec_block(stmts);
                self.env.pop_scope();
                result
            }

            StmtKind::If {
                cond,
                then_branch,
                else_branch,
            } => {
                if self.eval_expr(*cond)?.is_truthy() {
                    self.exec_stmt(*then_branch)
                } else if let Some(else_branch) = else_branch {
                    self.exec_stmt(*else_branch)
                } else {
                    Ok(Flow::Normal)
                }
            }

            StmtKind::While { cond, body } => {
                while self.eval_expr(*cond)?.is_truthy() {
                    match self.exec_stmt(*body)? {
                        Flow::Break => break,
                        Flow::Normal | Flow::Continue => {}
                        ret @ Flow::Return(..) => return Ok(ret),
                    }
                }
                Ok(Flow::Normal)
            }

            StmtKind::For {
                init,
                cond,
                update,
                body,
            } => {
                self.env.push_scope();
                let result = self.exec_for(*init, *cond, *update, *body);
                self.env.pop_scope();
                result
            }

            StmtKind::Break => Ok(Flow::Break),
            StmtKind::Continue => Ok(Flow::Continue),
            StmtKind::Return(value) => {
                let value = match value {
                    Some(expr) => self.eval_expr(*expr)?,
                    None => Value::Null,
                };
                Ok(Flow::Return(value, span))
            }

            StmtKind::Throw(value) => {
                let payload = self.eval_expr(*value)?;
                Err(user_error(payload).with_span(span))
            }

            StmtKind::Try {
                body,
                binding,
                handler,
            } => match self.exec_stmt(*body) {
                Err(err) if err.is_catchable() => {
                    tracing::trace!(kind = err.kind_name(), "caught error");
                    self.env.push_scope();
                    if let Some(binding) = binding {
                        let value = self.error_value(&err);
                        let bound = self.declare(*binding, value, Mutability::Mutable, None, span);
                        if let Err(err) = bound {
                            self.env.pop_scope();
                            return Err(err);
                        }
                    }
                    let result = self.exec_stmt(*handler);
                    self.env.pop_scope();
                    result
                }
                other => other,
            },

            StmtKind::Lock { object, body } => {
                let target = self.eval_expr(*object)?;
                let obj = Self::expect_object(&target, span)?;
                let _monitor = self.lock_monitor(&obj, span)?;
                self.non_preemptible(|interp| interp.exec_stmt(*body))
            }

            StmtKind::Function(function) => {
                self.define_function(*function, span)?;
                Ok(Flow::Normal)
            }
        }
    }

    /// Run a block body: hoist its function declarations, then execute the
    /// rest in order.
    pub(crate) fn exec_block(&mut self, stmts: &[StmtId]) -> ExecResult {
        let arena = self.arena.clone();
        for &id in stmts {
            let stmt = arena.stmt(id);
            if let StmtKind::Function(function) = stmt.kind {
                self.define_function(function, stmt.span)?;
            }
        }
        for &id in stmts {
            if matches!(arena.stmt(id).kind, StmtKind::Function(_)) {
                continue;
            }
            match self.exec_stmt(id)? {
                Flow::Normal => {}
                flow => return Ok(flow),
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_for(
        &mut self,
        init: Option<StmtId>,
        cond: Option<ExprId>,
        update: Option<ExprId>,
        body: StmtId,
    ) -> ExecResult {
        if let Some(init) = init {
            self.exec_stmt(init)?;
        }
        loop {
            if let Some(cond) = cond {
                if !self.eval_expr(cond)?.is_truthy() {
                    break;
                }
            }
            match self.exec_stmt(body)? {
                Flow::Break => break,
                Flow::Normal | Flow::Continue => {}
                ret @ Flow::Return(..) => return Ok(ret),
            }
            if let Some(update) = update {
                self.eval_expr(update)?;
            }
        }
        Ok(Flow::Normal)
    }

    fn define_function(&mut self, function: FunctionId, span: Span) -> Result<(), EvalError> {
        let closure = self.make_closure(function);
        match self.arena.function(function).name {
            Some(name) => self.declare(name, closure, Mutability::Mutable, None, span),
            None => Ok(()),
        }
    }
}
