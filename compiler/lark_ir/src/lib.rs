//! Lark IR - syntax tree and shared identifiers for the Lark runtime.
//!
//! The parser lives outside the runtime core. It hands the core a
//! [`Program`]: an arena of expression, statement and function nodes plus
//! the [`SharedInterner`] that owns every identifier in it.
//!
//! # Contents
//!
//! - [`Span`]: byte range of a node in the original source
//! - [`Name`], [`StringInterner`], [`SharedInterner`]: interned identifiers
//! - [`ast`]: arena-allocated nodes and the [`AstBuilder`] used to create them
//! - [`TypeHint`]: optional gradual type annotations
//! - [`BinaryOp`], [`UnaryOp`]: operator tags

pub mod ast;
mod interner;
mod name;
mod operators;
mod span;
mod type_hint;

pub use ast::{
    AstBuilder, Expr, ExprArena, ExprId, ExprKind, Function, FunctionId, InvalidProgram,
    Mutability, Param, Program, SharedArena, Stmt, StmtId, StmtKind,
};
pub use interner::{InternError, SharedInterner, StringInterner};
pub use name::Name;
pub use operators::{BinaryOp, UnaryOp};
pub use span::Span;
pub use type_hint::TypeHint;
