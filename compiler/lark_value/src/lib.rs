//! Lark Value - runtime values, the shared object heap and the error
//! taxonomy.
//!
//! Everything in this crate is `Send + Sync`: one context's heap is read
//! and written by several evaluator threads at once.
//!
//! # Synchronization
//!
//! - Each object guards its property table, and each array its element
//!   list, with its own short mutex, so single reads and writes are
//!   linearizable.
//! - Each object also carries a reentrant *monitor*, taken only by the
//!   script-level lock primitive.
//! - Prototype relinking is serialized heap-wide so concurrent
//!   `set_prototype` calls cannot jointly close a cycle.

mod array;
mod errors;
mod hint;
mod key;
mod object;
mod scope;
mod value;

pub use array::ArrayRef;
pub use errors::{
    cancelled, capability_denied, cyclic_prototype, immutable_binding, index_out_of_range,
    internal, invalid_assignment_target, lock_timeout, native_invocation, not_an_object,
    not_callable, read_only_property, stack_overflow, task_cancelled, type_mismatch,
    undefined_variable, unknown_native, user_error, BacktraceFrame, EvalBacktrace, EvalError,
    EvalErrorKind, EvalNote, EvalResult,
};
pub use hint::{check_hint, hint_accepts};
pub use key::PropertyKey;
pub use object::{
    CyclicPrototypeError, Heap, HeapId, HostData, MonitorGuard, ObjectId, ObjectRef, Property,
    PropertyLookup, WriteTarget,
};
pub use scope::{AssignError, Scope, ScopeRef};
pub use value::{FunctionRef, FunctionValue, NativeFunctionRef, NativeId, Value, ValueTag};
