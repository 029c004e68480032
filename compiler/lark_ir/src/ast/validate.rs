//! Structural check run before a program is executed.
//!
//! Node ids are plain indices, so a [`Program`] assembled by hand (or from
//! pieces of two builders) can name nodes its arena does not hold. Every id
//! and name stored anywhere in the arena is checked once here; evaluators
//! then index the arena without further checks.

use std::fmt;

use super::{ExprArena, ExprId, ExprKind, FunctionId, Program, StmtId, StmtKind};
use crate::{Name, StringInterner};

/// Why a [`Program`] was refused.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InvalidProgram {
    /// An expression id past the end of the arena.
    DanglingExpr { id: u32 },
    DanglingStmt { id: u32 },
    DanglingFunction { id: u32 },
    /// A name the program's interner never produced.
    ForeignName { raw: u32 },
}

impl fmt::Display for InvalidProgram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvalidProgram::DanglingExpr { id } => {
                write!(f, "expression {id} is not in the program's arena")
            }
            InvalidProgram::DanglingStmt { id } => {
                write!(f, "statement {id} is not in the program's arena")
            }
            InvalidProgram::DanglingFunction { id } => {
                write!(f, "function {id} is not in the program's arena")
            }
            InvalidProgram::ForeignName { raw } => {
                write!(f, "name {raw:#x} does not belong to the program's interner")
            }
        }
    }
}

impl std::error::Error for InvalidProgram {}

struct Checker<'a> {
    arena: &'a ExprArena,
    interner: &'a StringInterner,
}

impl Checker<'_> {
    #[expect(
        clippy::cast_possible_truncation,
        reason = "ids are built from u32 indices"
    )]
    fn expr(&self, id: ExprId) -> Result<(), InvalidProgram> {
        if id.index() < self.arena.exprs.len() {
            Ok(())
        } else {
            Err(InvalidProgram::DanglingExpr { id: id.index() as u32 })
        }
    }

    #[expect(
        clippy::cast_possible_truncation,
        reason = "ids are built from u32 indices"
    )]
    fn stmt(&self, id: StmtId) -> Result<(), InvalidProgram> {
        if id.index() < self.arena.stmts.len() {
            Ok(())
        } else {
            Err(InvalidProgram::DanglingStmt { id: id.index() as u32 })
        }
    }

    #[expect(
        clippy::cast_possible_truncation,
        reason = "ids are built from u32 indices"
    )]
    fn function(&self, id: FunctionId) -> Result<(), InvalidProgram> {
        if id.index() < self.arena.functions.len() {
            Ok(())
        } else {
            Err(InvalidProgram::DanglingFunction { id: id.index() as u32 })
        }
    }

    fn name(&self, name: Name) -> Result<(), InvalidProgram> {
        if self.interner.contains(name) {
            Ok(())
        } else {
            Err(InvalidProgram::ForeignName { raw: name.raw() })
        }
    }

    fn expr_kind(&self, kind: &ExprKind) -> Result<(), InvalidProgram> {
        match kind {
            ExprKind::Null
            | ExprKind::Bool(_)
            | ExprKind::Number(_)
            | ExprKind::Str(_)
            | ExprKind::This => Ok(()),
            ExprKind::Ident(name) => self.name(*name),
            ExprKind::Unary { operand, .. } => self.expr(*operand),
            ExprKind::Binary { left, right, .. } => {
                self.expr(*left)?;
                self.expr(*right)
            }
            ExprKind::Assign { target, value } => {
                self.expr(*target)?;
                self.expr(*value)
            }
            ExprKind::Member { object, property } => {
                self.expr(*object)?;
                self.name(*property)
            }
            ExprKind::Index { object, key } => {
                self.expr(*object)?;
                self.expr(*key)
            }
            ExprKind::Call { callee, args } => {
                self.expr(*callee)?;
                args.iter().try_for_each(|arg| self.expr(*arg))
            }
            ExprKind::Object {
                prototype,
                properties,
            } => {
                if let Some(prototype) = prototype {
                    self.expr(*prototype)?;
                }
                properties.iter().try_for_each(|(name, value)| {
                    self.name(*name)?;
                    self.expr(*value)
                })
            }
            ExprKind::Array(elements) => elements.iter().try_for_each(|e| self.expr(*e)),
            ExprKind::Function(function) => self.function(*function),
        }
    }

    fn stmt_kind(&self, kind: &StmtKind) -> Result<(), InvalidProgram> {
        match kind {
            StmtKind::Break | StmtKind::Continue | StmtKind::Return(None) => Ok(()),
            StmtKind::Expr(expr) | StmtKind::Throw(expr) | StmtKind::Return(Some(expr)) => {
                self.expr(*expr)
            }
            StmtKind::Let { name, init, .. } => {
                self.name(*name)?;
                init.map_or(Ok(()), |init| self.expr(init))
            }
            StmtKind::Block(stmts) => stmts.iter().try_for_each(|s| self.stmt(*s)),
            StmtKind::If {
                cond,
                then_branch,
                else_branch,
            } => {
                self.expr(*cond)?;
                self.stmt(*then_branch)?;
                else_branch.map_or(Ok(()), |s| self.stmt(s))
            }
            StmtKind::While { cond, body } => {
                self.expr(*cond)?;
                self.stmt(*body)
            }
            StmtKind::For {
                init,
                cond,
                update,
                body,
            } => {
                init.map_or(Ok(()), |s| self.stmt(s))?;
                cond.map_or(Ok(()), |e| self.expr(e))?;
                update.map_or(Ok(()), |e| self.expr(e))?;
                self.stmt(*body)
            }
            StmtKind::Try {
                body,
                binding,
                handler,
            } => {
                self.stmt(*body)?;
                binding.map_or(Ok(()), |name| self.name(name))?;
                self.stmt(*handler)
            }
            StmtKind::Lock { object, body } => {
                self.expr(*object)?;
                self.stmt(*body)
            }
            StmtKind::Function(function) => self.function(*function),
        }
    }
}

impl Program {
    /// Check that every node id and name the program stores resolves in
    /// its own arena and interner.
    pub fn validate(&self) -> Result<(), InvalidProgram> {
        let checker = Checker {
            arena: &self.arena,
            interner: &self.interner,
        };
        for expr in &checker.arena.exprs {
            checker.expr_kind(&expr.kind)?;
        }
        for stmt in &checker.arena.stmts {
            checker.stmt_kind(&stmt.kind)?;
        }
        for function in &checker.arena.functions {
            if let Some(name) = function.name {
                checker.name(name)?;
            }
            for param in &function.params {
                checker.name(param.name)?;
            }
            function.body.iter().try_for_each(|s| checker.stmt(*s))?;
        }
        self.body.iter().try_for_each(|s| checker.stmt(*s))
    }
}
