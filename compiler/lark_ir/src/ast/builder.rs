//! Programmatic construction of syntax trees.
//!
//! Parsers drive the builder with the span of each node they recognize;
//! hosts and tests that generate code can leave the span at
//! [`Span::DUMMY`]. Every constructor stamps the builder's *current* span,
//! set with [`AstBuilder::at`].

use std::sync::Arc;

use super::{
    Expr, ExprArena, ExprId, ExprKind, Function, FunctionId, Mutability, Param, Program,
    SharedArena, Stmt, StmtId, StmtKind,
};
use crate::{BinaryOp, Name, SharedInterner, Span, TypeHint, UnaryOp};

pub struct AstBuilder {
    arena: ExprArena,
    interner: SharedInterner,
    span: Span,
}

impl AstBuilder {
    pub fn new() -> Self {
        Self::with_interner(SharedInterner::new())
    }

    pub fn with_interner(interner: SharedInterner) -> Self {
        AstBuilder {
            arena: ExprArena::new(),
            interner,
            span: Span::DUMMY,
        }
    }

    /// Set the span stamped on nodes created from now on.
    pub fn at(&mut self, span: Span) -> &mut Self {
        self.span = span;
        self
    }

    pub fn name(&self, s: &str) -> Name {
        self.interner.intern(s)
    }

    pub fn interner(&self) -> &SharedInterner {
        &self.interner
    }

    /// Freeze the arena into a program with the given top-level statements.
    pub fn finish(self, body: Vec<StmtId>) -> Program {
        Program {
            arena: SharedArena::new(self.arena),
            body: Arc::from(body),
            interner: self.interner,
        }
    }

    pub fn expr(&mut self, kind: ExprKind) -> ExprId {
        let span = self.span;
        self.arena.alloc_expr(Expr { kind, span })
    }

    pub fn stmt(&mut self, kind: StmtKind) -> StmtId {
        let span = self.span;
        self.arena.alloc_stmt(Stmt { kind, span })
    }

    // Expressions

    pub fn null(&mut self) -> ExprId {
        self.expr(ExprKind::Null)
    }

    pub fn bool(&mut self, value: bool) -> ExprId {
        self.expr(ExprKind::Bool(value))
    }

    pub fn num(&mut self, value: f64) -> ExprId {
        self.expr(ExprKind::Number(value))
    }

    pub fn str(&mut self, value: &str) -> ExprId {
        self.expr(ExprKind::Str(Arc::from(value)))
    }

    pub fn ident(&mut self, name: &str) -> ExprId {
        let name = self.name(name);
        self.expr(ExprKind::Ident(name))
    }

    pub fn this(&mut self) -> ExprId {
        self.expr(ExprKind::This)
    }

    pub fn unary(&mut self, op: UnaryOp, operand: ExprId) -> ExprId {
        self.expr(ExprKind::Unary { op, operand })
    }

    pub fn binary(&mut self, op: BinaryOp, left: ExprId, right: ExprId) -> ExprId {
        self.expr(ExprKind::Binary { op, left, right })
    }

    pub fn assign(&mut self, target: ExprId, value: ExprId) -> ExprId {
        self.expr(ExprKind::Assign { target, value })
    }

    /// `name = value` for a plain identifier.
    pub fn assign_var(&mut self, name: &str, value: ExprId) -> ExprId {
        let target = self.ident(name);
        self.assign(target, value)
    }

    pub fn member(&mut self, object: ExprId, property: &str) -> ExprId {
        let property = self.name(property);
        self.expr(ExprKind::Member { object, property })
    }

    pub fn index(&mut self, object: ExprId, key: ExprId) -> ExprId {
        self.expr(ExprKind::Index { object, key })
    }

    pub fn call(&mut self, callee: ExprId, args: Vec<ExprId>) -> ExprId {
        self.expr(ExprKind::Call { callee, args })
    }

    /// `name(args...)` for a global or local function binding.
    pub fn call_named(&mut self, name: &str, args: Vec<ExprId>) -> ExprId {
        let callee = self.ident(name);
        self.call(callee, args)
    }

    /// `object.method(args...)`, binding `this` to `object`.
    pub fn method_call(&mut self, object: ExprId, method: &str, args: Vec<ExprId>) -> ExprId {
        let callee = self.member(object, method);
        self.call(callee, args)
    }

    pub fn object(&mut self, properties: Vec<(&str, ExprId)>) -> ExprId {
        let properties = self.intern_props(properties);
        self.expr(ExprKind::Object {
            prototype: None,
            properties,
        })
    }

    pub fn object_with_proto(
        &mut self,
        prototype: ExprId,
        properties: Vec<(&str, ExprId)>,
    ) -> ExprId {
        let properties = self.intern_props(properties);
        self.expr(ExprKind::Object {
            prototype: Some(prototype),
            properties,
        })
    }

    /// `[elements...]`
    pub fn array(&mut self, elements: Vec<ExprId>) -> ExprId {
        self.expr(ExprKind::Array(elements))
    }

    fn intern_props(&self, properties: Vec<(&str, ExprId)>) -> Vec<(Name, ExprId)> {
        properties
            .into_iter()
            .map(|(key, value)| (self.name(key), value))
            .collect()
    }

    // Functions

    pub fn param(&self, name: &str) -> Param {
        Param {
            name: self.name(name),
            hint: None,
            span: self.span,
        }
    }

    pub fn param_hinted(&self, name: &str, hint: TypeHint) -> Param {
        Param {
            name: self.name(name),
            hint: Some(hint),
            span: self.span,
        }
    }

    pub fn function(
        &mut self,
        name: Option<&str>,
        params: Vec<Param>,
        return_hint: Option<TypeHint>,
        body: Vec<StmtId>,
    ) -> FunctionId {
        let name = name.map(|n| self.name(n));
        let span = self.span;
        self.arena.alloc_function(Function {
            name,
            params,
            return_hint,
            body,
            span,
        })
    }

    /// Anonymous function literal.
    pub fn lambda(&mut self, params: Vec<Param>, body: Vec<StmtId>) -> ExprId {
        let function = self.function(None, params, None, body);
        self.expr(ExprKind::Function(function))
    }

    /// Named function declaration statement.
    pub fn fn_decl(&mut self, name: &str, params: Vec<Param>, body: Vec<StmtId>) -> StmtId {
        let function = self.function(Some(name), params, None, body);
        self.stmt(StmtKind::Function(function))
    }

    pub fn fn_decl_hinted(
        &mut self,
        name: &str,
        params: Vec<Param>,
        return_hint: Option<TypeHint>,
        body: Vec<StmtId>,
    ) -> StmtId {
        let function = self.function(Some(name), params, return_hint, body);
        self.stmt(StmtKind::Function(function))
    }

    // Statements

    pub fn expr_stmt(&mut self, expr: ExprId) -> StmtId {
        self.stmt(StmtKind::Expr(expr))
    }

    pub fn let_(&mut self, name: &str, init: ExprId) -> StmtId {
        self.binding(name, Mutability::Mutable, None, Some(init))
    }

    pub fn let_hinted(&mut self, name: &str, hint: TypeHint, init: Option<ExprId>) -> StmtId {
        self.binding(name, Mutability::Mutable, Some(hint), init)
    }

    pub fn const_(&mut self, name: &str, init: ExprId) -> StmtId {
        self.binding(name, Mutability::Immutable, None, Some(init))
    }

    pub fn binding(
        &mut self,
        name: &str,
        mutability: Mutability,
        hint: Option<TypeHint>,
        init: Option<ExprId>,
    ) -> StmtId {
        let name = self.name(name);
        self.stmt(StmtKind::Let {
            name,
            mutability,
            hint,
            init,
        })
    }

    pub fn block(&mut self, stmts: Vec<StmtId>) -> StmtId {
        self.stmt(StmtKind::Block(stmts))
    }

    pub fn if_(&mut self, cond: ExprId, then_branch: StmtId, else_branch: Option<StmtId>) -> StmtId {
        self.stmt(StmtKind::If {
            cond,
            then_branch,
            else_branch,
        })
    }

    pub fn while_(&mut self, cond: ExprId, body: StmtId) -> StmtId {
        self.stmt(StmtKind::While { cond, body })
    }

    pub fn for_(
        &mut self,
        init: Option<StmtId>,
        cond: Option<ExprId>,
        update: Option<ExprId>,
        body: StmtId,
    ) -> StmtId {
        self.stmt(StmtKind::For {
            init,
            cond,
            update,
            body,
        })
    }

    pub fn break_(&mut self) -> StmtId {
        self.stmt(StmtKind::Break)
    }

    pub fn continue_(&mut self) -> StmtId {
        self.stmt(StmtKind::Continue)
    }

    pub fn return_(&mut self, value: Option<ExprId>) -> StmtId {
        self.stmt(StmtKind::Return(value))
    }

    pub fn throw(&mut self, value: ExprId) -> StmtId {
        self.stmt(StmtKind::Throw(value))
    }

    pub fn try_catch(&mut self, body: StmtId, binding: Option<&str>, handler: StmtId) -> StmtId {
        let binding = binding.map(|b| self.name(b));
        self.stmt(StmtKind::Try {
            body,
            binding,
            handler,
        })
    }

    pub fn lock(&mut self, object: ExprId, body: StmtId) -> StmtId {
        self.stmt(StmtKind::Lock { object, body })
    }
}

impl Default for AstBuilder {
    fn default() -> Self {
        Self::new()
    }
}
