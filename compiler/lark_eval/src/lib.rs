//! Lark Eval - concurrent tree-walking evaluator for the Lark runtime.
//!
//! A [`Context`] holds one loaded program. Its object heap and global
//! bindings are shared by every evaluator attached to it; each evaluator
//! runs on its own thread with its own local frames.
//!
//! ```text
//! Context ──┬── Heap (objects, arrays, prototype links)
//!           ├── globals
//!           ├── SandboxPolicy (read-only)
//!           ├── native registry
//!           └── Scheduler ── lark-worker-1, lark-worker-2, ...
//! ```
//!
//! The host runs the program with [`Context::run`], starts further
//! evaluators with [`Context::spawn`], and exposes host functions through
//! [`NativeBinding`]s.

mod config;
mod context;
mod diagnostics;
mod environment;
mod interpreter;
mod intrinsics;
mod native;
mod scheduler;
mod stack;

pub use config::{ConfigError, GlobalSharing, RuntimeConfig};
pub use context::{Context, ContextBuilder, ContextError};
pub use diagnostics::{CallFrame, CallStack};
pub use native::{
    ArrayHandle, CallableHandle, HostFn, HostValue, NativeBinding, NativeFault, NativeScope,
    ObjectHandle,
};
pub use scheduler::{CancelToken, TaskHandle, TaskId, TaskOutcome};
pub use stack::ensure_sufficient_stack;

pub use lark_sandbox::{PolicyError, SandboxPolicy};
pub use lark_value::{ArrayRef, EvalError, EvalErrorKind, EvalResult, ObjectRef, Value};
