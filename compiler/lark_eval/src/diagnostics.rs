//! Script call stack tracking.
//!
//! Each evaluator owns one [`CallStack`]. It enforces the configured call
//! depth and is snapshotted into an [`EvalBacktrace`] when an error leaves
//! the innermost call.

use lark_ir::Span;
use lark_value::{stack_overflow, BacktraceFrame, EvalBacktrace, EvalError};

/// One active script call.
#[derive(Clone, Debug)]
pub struct CallFrame {
    /// Function name, or `<anonymous>`.
    pub name: &'static str,
    /// Span of the call expression.
    pub call_span: Option<Span>,
}

#[derive(Clone, Debug)]
pub struct CallStack {
    frames: Vec<CallFrame>,
    max_depth: usize,
}

impl CallStack {
    pub fn new(max_depth: usize) -> Self {
        CallStack {
            frames: Vec::new(),
            max_depth,
        }
    }

    /// Push a frame, or fail with `StackOverflowError` if the stack is
    /// already at the limit. The frame is not pushed on overflow.
    pub fn push(&mut self, frame: CallFrame) -> Result<(), EvalError> {
        if self.frames.len() >= self.max_depth {
            return Err(stack_overflow(self.max_depth));
        }
        self.frames.push(frame);
        Ok(())
    }

    pub fn pop(&mut self) {
        debug_assert!(!self.frames.is_empty(), "CallStack::pop on empty stack");
        self.frames.pop();
    }

    #[inline]
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Snapshot the stack, innermost call first.
    pub fn capture(&self) -> EvalBacktrace {
        EvalBacktrace::new(
            self.frames
                .iter()
                .rev()
                .map(|frame| BacktraceFrame {
                    name: frame.name.to_string(),
                    span: frame.call_span,
                })
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests;
