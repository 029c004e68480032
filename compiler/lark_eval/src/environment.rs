//! Per-evaluator view of the binding environment.
//!
//! Local frames are a stack owned by one evaluator. The innermost frame's
//! parent chain covers every enclosing local frame, so capturing it is
//! enough for a closure. Globals sit beside the chain rather than at its
//! root: an evaluator in isolated mode swaps in its own global table
//! without touching closures created elsewhere.

use lark_ir::{Mutability, Name, TypeHint};
use lark_value::{AssignError, ScopeRef, Value};

pub struct Environment {
    /// Local frames, innermost last. Empty at top level.
    locals: Vec<ScopeRef>,
    globals: ScopeRef,
}

/// Local frames of a caller, restored when the callee returns.
#[must_use]
pub struct SavedLocals(Vec<ScopeRef>);

impl Environment {
    pub fn new(globals: ScopeRef) -> Self {
        Environment {
            locals: Vec::new(),
            globals,
        }
    }

    pub fn globals(&self) -> &ScopeRef {
        &self.globals
    }

    /// Innermost local frame, for closure capture. `None` at top level.
    pub fn current(&self) -> Option<ScopeRef> {
        self.locals.last().cloned()
    }

    #[inline]
    pub fn push_scope(&mut self) {
        let scope = match self.locals.last() {
            Some(parent) => parent.child(),
            None => ScopeRef::root(),
        };
        self.locals.push(scope);
    }

    #[inline]
    pub fn pop_scope(&mut self) {
        self.locals.pop();
    }

    /// Switch to a callee's frames: one fresh frame whose parent is the
    /// scope the callee captured.
    pub fn enter_call(&mut self, captured: Option<&ScopeRef>) -> SavedLocals {
        let frame = match captured {
            Some(scope) => scope.child(),
            None => ScopeRef::root(),
        };
        SavedLocals(std::mem::replace(&mut self.locals, vec![frame]))
    }

    pub fn exit_call(&mut self, saved: SavedLocals) {
        self.locals = saved.0;
    }

    /// Declare in the innermost frame, or in the globals at top level.
    pub fn define(
        &self,
        name: Name,
        value: Value,
        mutability: Mutability,
        hint: Option<TypeHint>,
    ) -> Result<(), AssignError> {
        self.locals
            .last()
            .unwrap_or(&self.globals)
            .define(name, value, mutability, hint)
    }

    pub fn lookup(&self, name: Name) -> Option<Value> {
        self.locals
            .last()
            .and_then(|scope| scope.lookup(name))
            .or_else(|| self.globals.lookup(name))
    }

    pub fn assign(&self, name: Name, value: Value) -> Result<(), AssignError> {
        match self.locals.last() {
            Some(scope) => match scope.assign(name, value.clone()) {
                Err(AssignError::Unbound) => self.globals.assign(name, value),
                other => other,
            },
            None => self.globals.assign(name, value),
        }
    }
}
