//! Arena-allocated syntax tree.
//!
//! Nodes refer to each other by index ([`ExprId`], [`StmtId`],
//! [`FunctionId`]) into one [`ExprArena`]. The arena is frozen once the
//! program is built and shared between threads as a [`SharedArena`]:
//! every evaluator of a context walks the same nodes without copying.

mod builder;
mod validate;

pub use builder::AstBuilder;
pub use validate::InvalidProgram;

use std::fmt;
use std::sync::Arc;

use crate::{BinaryOp, Name, SharedInterner, Span, TypeHint, UnaryOp};

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(u32);

        impl $name {
            #[inline]
            pub const fn new(index: u32) -> Self {
                $name(index)
            }

            #[inline]
            pub const fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }
    };
}

define_id!(
    /// Index of an expression node.
    ExprId
);
define_id!(
    /// Index of a statement node.
    StmtId
);
define_id!(
    /// Index of a function literal or declaration.
    FunctionId
);

/// Whether a binding can be reassigned.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mutability {
    /// `let x = ...`
    Mutable,
    /// `const x = ...`
    Immutable,
}

impl Mutability {
    #[inline]
    pub fn is_mutable(self) -> bool {
        matches!(self, Mutability::Mutable)
    }
}

#[derive(Clone, Debug)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub enum ExprKind {
    Null,
    Bool(bool),
    Number(f64),
    Str(Arc<str>),
    Ident(Name),
    This,
    Unary {
        op: UnaryOp,
        operand: ExprId,
    },
    Binary {
        op: BinaryOp,
        left: ExprId,
        right: ExprId,
    },
    /// `target = value`; `target` is an `Ident`, `Member` or `Index` node.
    Assign {
        target: ExprId,
        value: ExprId,
    },
    /// `object.property`
    Member {
        object: ExprId,
        property: Name,
    },
    /// `object[key]`, key converted to a string.
    Index {
        object: ExprId,
        key: ExprId,
    },
    /// A call whose callee is a `Member`/`Index` node binds `this`.
    Call {
        callee: ExprId,
        args: Vec<ExprId>,
    },
    /// `{ k: v, ... }` with an optional explicit prototype.
    Object {
        prototype: Option<ExprId>,
        properties: Vec<(Name, ExprId)>,
    },
    /// `[a, b, ...]`
    Array(Vec<ExprId>),
    /// Function literal (closure).
    Function(FunctionId),
}

#[derive(Clone, Debug)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub enum StmtKind {
    Expr(ExprId),
    Let {
        name: Name,
        mutability: Mutability,
        hint: Option<TypeHint>,
        init: Option<ExprId>,
    },
    Block(Vec<StmtId>),
    If {
        cond: ExprId,
        then_branch: StmtId,
        else_branch: Option<StmtId>,
    },
    While {
        cond: ExprId,
        body: StmtId,
    },
    /// C-style `for (init; cond; update) body`.
    For {
        init: Option<StmtId>,
        cond: Option<ExprId>,
        update: Option<ExprId>,
        body: StmtId,
    },
    Break,
    Continue,
    Return(Option<ExprId>),
    /// Raise a user error carrying the value as payload.
    Throw(ExprId),
    Try {
        body: StmtId,
        binding: Option<Name>,
        handler: StmtId,
    },
    /// `lock (object) body`: holds the object's monitor for the body.
    Lock {
        object: ExprId,
        body: StmtId,
    },
    /// Named function declaration, hoisted to the top of its block.
    Function(FunctionId),
}

/// A function parameter with its optional hint.
#[derive(Clone, Debug)]
pub struct Param {
    pub name: Name,
    pub hint: Option<TypeHint>,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub struct Function {
    pub name: Option<Name>,
    pub params: Vec<Param>,
    pub return_hint: Option<TypeHint>,
    pub body: Vec<StmtId>,
    pub span: Span,
}

/// Storage for every node of one program.
#[derive(Default, Debug)]
pub struct ExprArena {
    exprs: Vec<Expr>,
    stmts: Vec<Stmt>,
    functions: Vec<Function>,
}

impl ExprArena {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn expr(&self, id: ExprId) -> &Expr {
        &self.exprs[id.index()]
    }

    #[inline]
    pub fn stmt(&self, id: StmtId) -> &Stmt {
        &self.stmts[id.index()]
    }

    #[inline]
    pub fn function(&self, id: FunctionId) -> &Function {
        &self.functions[id.index()]
    }

    pub fn alloc_expr(&mut self, expr: Expr) -> ExprId {
        let id = ExprId::new(next_index(self.exprs.len()));
        self.exprs.push(expr);
        id
    }

    pub fn alloc_stmt(&mut self, stmt: Stmt) -> StmtId {
        let id = StmtId::new(next_index(self.stmts.len()));
        self.stmts.push(stmt);
        id
    }

    pub fn alloc_function(&mut self, function: Function) -> FunctionId {
        let id = FunctionId::new(next_index(self.functions.len()));
        self.functions.push(function);
        id
    }
}

#[inline]
fn next_index(len: usize) -> u32 {
    u32::try_from(len).unwrap_or_else(|_| panic!("syntax arena exceeded u32::MAX nodes"))
}

/// Frozen arena shared by every evaluator of a context.
#[derive(Clone, Debug)]
pub struct SharedArena(Arc<ExprArena>);

impl SharedArena {
    pub fn new(arena: ExprArena) -> Self {
        SharedArena(Arc::new(arena))
    }
}

impl std::ops::Deref for SharedArena {
    type Target = ExprArena;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// A parsed program: top-level statements plus the arena and interner they
/// were built against.
#[derive(Clone, Debug)]
pub struct Program {
    pub arena: SharedArena,
    pub body: Arc<[StmtId]>,
    pub interner: SharedInterner,
}

impl Program {
    /// Iterate over top-level function declarations.
    pub fn declarations(&self) -> impl Iterator<Item = FunctionId> + '_ {
        self.body
            .iter()
            .filter_map(|id| match self.arena.stmt(*id).kind {
                StmtKind::Function(f) => Some(f),
                _ => None,
            })
    }
}
