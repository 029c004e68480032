//! Lark Sandbox - explicit capability allow-lists.
//!
//! A [`SandboxPolicy`] names every operation a context may perform that
//! reaches outside the script: native calls and spawning evaluators. It is
//! built once, shared behind an `Arc`, and never mutated afterwards.
//!
//! Capability names are dot-separated segments with an optional
//! `:<symbol>` suffix:
//!
//! ```text
//! thread.spawn
//! filesystem.read
//! native.call:fs.open
//! native.call:*        grant only: every symbol of native.call
//! ```

mod capability;
mod policy;

pub use capability::{native_call, Capability, NATIVE_CALL, THREAD_SPAWN};
pub use policy::{CapabilityDenied, PolicyBuilder, PolicyDescriptor, SandboxPolicy};

/// Error building or loading a policy.
#[derive(Debug, thiserror::Error)]
pub enum PolicyError {
    #[error("invalid capability `{name}`: {reason}")]
    InvalidCapability { name: String, reason: &'static str },

    #[error("a bare `*` grant is not allowed; list capabilities explicitly")]
    GrantAll,

    #[error("malformed policy descriptor: {0}")]
    Descriptor(#[from] serde_json::Error),
}
