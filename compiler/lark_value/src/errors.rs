//! Runtime error taxonomy.
//!
//! `EvalErrorKind` is the structured category; `EvalError` wraps it with
//! the source span, notes, a script backtrace and, for errors raised by
//! `throw`, the payload value. Factory functions are the public way to
//! build errors: they are `#[cold]` so the happy path stays tight.

use std::fmt;

use lark_ir::Span;

use crate::value::Value;

/// Result of evaluating an expression.
pub type EvalResult<T = Value> = Result<T, EvalError>;

/// Typed error category.
///
/// `Display` yields the human-readable message; [`EvalError::kind_name`]
/// yields the stable name scripts see in a caught error's `kind` field.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum EvalErrorKind {
    #[error("type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },

    #[error("prototype assignment would create a cycle")]
    CyclicPrototype,

    #[error("capability denied: {capability}")]
    CapabilityDenied { capability: String },

    #[error("maximum call depth exceeded (limit: {depth})")]
    StackOverflow { depth: usize },

    #[error("native call `{name}` failed: {reason}")]
    NativeInvocation { name: String, reason: String },

    #[error("task was cancelled")]
    Cancelled,

    /// A joined task was cancelled. Unlike [`Cancelled`](Self::Cancelled),
    /// the joiner itself keeps running and may catch this.
    #[error("joined task {task} was cancelled")]
    TaskCancelled { task: u64 },

    #[error("uncaught error: {message}")]
    User { message: String },

    #[error("undefined variable: {name}")]
    UndefinedVariable { name: String },

    #[error("cannot assign to constant: {name}")]
    ImmutableBinding { name: String },

    #[error("{type_name} is not callable")]
    NotCallable { type_name: String },

    #[error("{type_name} is not an object")]
    NotAnObject { type_name: String },

    #[error("invalid assignment target")]
    InvalidAssignmentTarget,

    #[error("property `{name}` is read-only")]
    ReadOnlyProperty { name: String },

    #[error("index {index} is out of range for an array of length {length}")]
    IndexOutOfRange { index: String, length: usize },

    #[error("could not acquire object lock within {timeout_ms}ms")]
    LockTimeout { timeout_ms: u64 },

    #[error("no native function named `{name}`")]
    UnknownNative { name: String },

    #[error("internal error: {message}")]
    Internal { message: String },
}

impl EvalErrorKind {
    /// Stable name of the kind, as bound to `kind` in a caught error.
    pub fn name(&self) -> &'static str {
        match self {
            Self::TypeMismatch { .. } => "TypeMismatchError",
            Self::CyclicPrototype => "CyclicPrototypeError",
            Self::CapabilityDenied { .. } => "CapabilityDeniedError",
            Self::StackOverflow { .. } => "StackOverflowError",
            Self::NativeInvocation { .. } => "NativeInvocationError",
            Self::Cancelled => "CancelledError",
            Self::TaskCancelled { .. } => "TaskCancelledError",
            Self::User { .. } => "UserError",
            Self::UndefinedVariable { .. } => "UndefinedVariableError",
            Self::ImmutableBinding { .. } => "ImmutableBindingError",
            Self::NotCallable { .. } => "NotCallableError",
            Self::NotAnObject { .. } => "NotAnObjectError",
            Self::InvalidAssignmentTarget => "InvalidAssignmentTargetError",
            Self::ReadOnlyProperty { .. } => "ReadOnlyPropertyError",
            Self::IndexOutOfRange { .. } => "IndexOutOfRangeError",
            Self::LockTimeout { .. } => "LockTimeoutError",
            Self::UnknownNative { .. } => "UnknownNativeError",
            Self::Internal { .. } => "InternalError",
        }
    }
}

/// Secondary information attached to an error.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EvalNote {
    pub message: String,
    pub span: Option<Span>,
}

impl EvalNote {
    pub fn new(message: impl Into<String>) -> Self {
        EvalNote {
            message: message.into(),
            span: None,
        }
    }

    pub fn with_span(message: impl Into<String>, span: Span) -> Self {
        EvalNote {
            message: message.into(),
            span: Some(span),
        }
    }
}

/// One script call in a backtrace.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BacktraceFrame {
    /// Function name, or `<anonymous>`.
    pub name: String,
    /// Call-site span.
    pub span: Option<Span>,
}

/// Snapshot of the script call stack where an error was raised,
/// innermost call first.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EvalBacktrace {
    frames: Vec<BacktraceFrame>,
}

impl EvalBacktrace {
    pub fn new(frames: Vec<BacktraceFrame>) -> Self {
        EvalBacktrace { frames }
    }

    pub fn frames(&self) -> &[BacktraceFrame] {
        &self.frames
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Function names, innermost first.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.frames.iter().map(|f| f.name.as_str())
    }
}

impl fmt::Display for EvalBacktrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.frames.is_empty() {
            return Ok(());
        }
        writeln!(f, "script backtrace:")?;
        for (i, frame) in self.frames.iter().enumerate() {
            write!(f, "  {i}: {}", frame.name)?;
            if let Some(span) = frame.span {
                write!(f, " at {span}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// Evaluation error.
#[derive(Clone, Debug)]
pub struct EvalError {
    pub kind: EvalErrorKind,
    /// Where the error was raised.
    pub span: Option<Span>,
    pub notes: Vec<EvalNote>,
    /// Captured by the evaluator as the error leaves the innermost call.
    pub backtrace: Option<EvalBacktrace>,
    /// Value passed to `throw`.
    pub payload: Option<Value>,
}

impl EvalError {
    pub fn from_kind(kind: EvalErrorKind) -> Self {
        EvalError {
            kind,
            span: None,
            notes: Vec::new(),
            backtrace: None,
            payload: None,
        }
    }

    pub fn message(&self) -> String {
        self.kind.to_string()
    }

    pub fn kind_name(&self) -> &'static str {
        self.kind.name()
    }

    #[must_use]
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    /// Attach a span unless one is already set.
    #[must_use]
    pub fn or_span(mut self, span: Span) -> Self {
        if self.span.is_none() {
            self.span = Some(span);
        }
        self
    }

    #[must_use]
    pub fn with_note(mut self, note: EvalNote) -> Self {
        self.notes.push(note);
        self
    }

    #[must_use]
    pub fn with_backtrace(mut self, backtrace: EvalBacktrace) -> Self {
        self.backtrace = Some(backtrace);
        self
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        matches!(self.kind, EvalErrorKind::Cancelled)
    }

    /// Whether a script `try` may handle this error. Cancellation always
    /// reaches the host.
    #[inline]
    pub fn is_catchable(&self) -> bool {
        !self.is_cancelled()
    }
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind.name(), self.kind)?;
        if let Some(span) = self.span {
            write!(f, " at {span}")?;
        }
        for note in &self.notes {
            write!(f, "\n  note: {}", note.message)?;
        }
        Ok(())
    }
}

impl std::error::Error for EvalError {}

impl From<EvalErrorKind> for EvalError {
    fn from(kind: EvalErrorKind) -> Self {
        EvalError::from_kind(kind)
    }
}

// Type errors

#[cold]
pub fn type_mismatch(expected: &str, actual: &str) -> EvalError {
    EvalError::from_kind(EvalErrorKind::TypeMismatch {
        expected: expected.to_string(),
        actual: actual.to_string(),
    })
}

#[cold]
pub fn not_callable(type_name: &str) -> EvalError {
    EvalError::from_kind(EvalErrorKind::NotCallable {
        type_name: type_name.to_string(),
    })
}

#[cold]
pub fn not_an_object(type_name: &str) -> EvalError {
    EvalError::from_kind(EvalErrorKind::NotAnObject {
        type_name: type_name.to_string(),
    })
}

// Object model

#[cold]
pub fn cyclic_prototype() -> EvalError {
    EvalError::from_kind(EvalErrorKind::CyclicPrototype)
}

#[cold]
pub fn read_only_property(name: &str) -> EvalError {
    EvalError::from_kind(EvalErrorKind::ReadOnlyProperty {
        name: name.to_string(),
    })
}

/// `index` is the offending key in display form; it may not be a number.
#[cold]
pub fn index_out_of_range(index: &str, length: usize) -> EvalError {
    EvalError::from_kind(EvalErrorKind::IndexOutOfRange {
        index: index.to_string(),
        length,
    })
}

#[cold]
pub fn lock_timeout(timeout_ms: u64) -> EvalError {
    EvalError::from_kind(EvalErrorKind::LockTimeout { timeout_ms })
}

// Bindings

#[cold]
pub fn undefined_variable(name: &str) -> EvalError {
    EvalError::from_kind(EvalErrorKind::UndefinedVariable {
        name: name.to_string(),
    })
}

#[cold]
pub fn immutable_binding(name: &str) -> EvalError {
    EvalError::from_kind(EvalErrorKind::ImmutableBinding {
        name: name.to_string(),
    })
}

#[cold]
pub fn invalid_assignment_target() -> EvalError {
    EvalError::from_kind(EvalErrorKind::InvalidAssignmentTarget)
}

// Calls

#[cold]
pub fn stack_overflow(depth: usize) -> EvalError {
    EvalError::from_kind(EvalErrorKind::StackOverflow { depth })
}

#[cold]
pub fn capability_denied(capability: &str) -> EvalError {
    EvalError::from_kind(EvalErrorKind::CapabilityDenied {
        capability: capability.to_string(),
    })
}

#[cold]
pub fn native_invocation(name: &str, reason: impl Into<String>) -> EvalError {
    EvalError::from_kind(EvalErrorKind::NativeInvocation {
        name: name.to_string(),
        reason: reason.into(),
    })
}

#[cold]
pub fn unknown_native(name: &str) -> EvalError {
    EvalError::from_kind(EvalErrorKind::UnknownNative {
        name: name.to_string(),
    })
}

// Scheduling

#[cold]
pub fn cancelled() -> EvalError {
    EvalError::from_kind(EvalErrorKind::Cancelled)
}

#[cold]
pub fn task_cancelled(task: u64) -> EvalError {
    EvalError::from_kind(EvalErrorKind::TaskCancelled { task })
}

#[cold]
pub fn internal(message: impl Into<String>) -> EvalError {
    EvalError::from_kind(EvalErrorKind::Internal {
        message: message.into(),
    })
}

/// Error raised by `throw`, carrying its operand.
#[cold]
pub fn user_error(payload: Value) -> EvalError {
    let mut err = EvalError::from_kind(EvalErrorKind::User {
        message: payload.to_string(),
    });
    err.payload = Some(payload);
    err
}
