//! Lexical scopes.
//!
//! A [`ScopeRef`] is one frame of the lexical chain. Frames are created by
//! calls and blocks and captured by closures; a frame lives as long as the
//! longest-held closure that captured it. The same type backs a context's
//! global table, which is the root every top-level function resolves
//! against.

use std::fmt;
use std::sync::Arc;

use lark_ir::{Mutability, Name, TypeHint};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::hint::hint_accepts;
use crate::value::Value;

#[derive(Clone)]
struct Binding {
    value: Value,
    mutability: Mutability,
    hint: Option<TypeHint>,
}

/// Why an assignment was refused.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AssignError {
    /// No frame in the chain binds the name.
    Unbound,
    Immutable,
    /// The binding's hint rejects the value; the binding is unchanged.
    Hint(TypeHint),
}

pub struct Scope {
    bindings: Mutex<FxHashMap<Name, Binding>>,
    parent: Option<ScopeRef>,
}

#[derive(Clone)]
pub struct ScopeRef(Arc<Scope>);

impl ScopeRef {
    /// A frame with no parent.
    pub fn root() -> Self {
        ScopeRef(Arc::new(Scope {
            bindings: Mutex::new(FxHashMap::default()),
            parent: None,
        }))
    }

    pub fn child(&self) -> Self {
        ScopeRef(Arc::new(Scope {
            bindings: Mutex::new(FxHashMap::default()),
            parent: Some(self.clone()),
        }))
    }

    pub fn parent(&self) -> Option<&ScopeRef> {
        self.0.parent.as_ref()
    }

    #[inline]
    pub fn ptr_eq(&self, other: &ScopeRef) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Declare `name` in this frame, shadowing outer frames. A mutable
    /// binding of the same name here is replaced; an immutable one is kept
    /// and the declaration fails with [`AssignError::Immutable`].
    pub fn define(
        &self,
        name: Name,
        value: Value,
        mutability: Mutability,
        hint: Option<TypeHint>,
    ) -> Result<(), AssignError> {
        let mut bindings = self.0.bindings.lock();
        if bindings
            .get(&name)
            .is_some_and(|existing| !existing.mutability.is_mutable())
        {
            return Err(AssignError::Immutable);
        }
        bindings.insert(
            name,
            Binding {
                value,
                mutability,
                hint,
            },
        );
        Ok(())
    }

    /// Bind `name` as a mutable, unhinted slot, replacing whatever this
    /// frame held under that name. Only the host binds this way.
    pub fn bind(&self, name: Name, value: Value) {
        self.0.bindings.lock().insert(
            name,
            Binding {
                value,
                mutability: Mutability::Mutable,
                hint: None,
            },
        );
    }

    /// Whether this frame itself binds `name`.
    pub fn binds(&self, name: Name) -> bool {
        self.0.bindings.lock().contains_key(&name)
    }

    /// Resolve `name` through the chain.
    pub fn lookup(&self, name: Name) -> Option<Value> {
        let mut scope = Some(self);
        while let Some(frame) = scope {
            if let Some(binding) = frame.0.bindings.lock().get(&name) {
                return Some(binding.value.clone());
            }
            scope = frame.parent();
        }
        None
    }

    /// Assign to the nearest binding of `name`. The hint check and the
    /// store happen under the frame's lock.
    pub fn assign(&self, name: Name, value: Value) -> Result<(), AssignError> {
        let mut scope = Some(self);
        while let Some(frame) = scope {
            let mut bindings = frame.0.bindings.lock();
            if let Some(binding) = bindings.get_mut(&name) {
                if !binding.mutability.is_mutable() {
                    return Err(AssignError::Immutable);
                }
                if let Some(hint) = binding.hint {
                    if !hint_accepts(Some(hint), &value) {
                        return Err(AssignError::Hint(hint));
                    }
                }
                binding.value = value;
                return Ok(());
            }
            drop(bindings);
            scope = frame.parent();
        }
        Err(AssignError::Unbound)
    }

    /// Copy of this frame's bindings in a fresh parentless frame. Values
    /// are cloned as handles: objects stay shared.
    pub fn snapshot(&self) -> ScopeRef {
        let bindings = self.0.bindings.lock().clone();
        ScopeRef(Arc::new(Scope {
            bindings: Mutex::new(bindings),
            parent: None,
        }))
    }

    /// Names bound in this frame, unordered.
    pub fn names(&self) -> Vec<Name> {
        self.0.bindings.lock().keys().copied().collect()
    }
}

impl fmt::Debug for ScopeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let depth = std::iter::successors(Some(self), |s| s.parent()).count();
        write!(f, "ScopeRef(depth={depth})")
    }
}

#[cfg(test)]
mod tests;
