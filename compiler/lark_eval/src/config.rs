//! Runtime configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Whether spawned evaluators share the context's global bindings.
///
/// Objects are shared in both modes; only the binding table differs.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GlobalSharing {
    /// Every evaluator reads and rebinds the same globals.
    #[default]
    Shared,
    /// A spawned evaluator gets a copy of the globals taken at spawn time.
    Isolated,
}

/// Tunables for one context.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuntimeConfig {
    /// Script call depth at which a call fails with `StackOverflowError`.
    pub max_call_depth: usize,
    /// How long `lock` and `atomicUpdate` wait for an object's monitor.
    /// `None` waits forever.
    pub lock_timeout_ms: Option<u64>,
    pub global_sharing: GlobalSharing,
    /// Stack size of worker threads; `None` uses the platform default.
    pub worker_stack_size: Option<usize>,
}

impl RuntimeConfig {
    pub const DEFAULT_MAX_CALL_DEPTH: usize = 200;

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: RuntimeConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_call_depth == 0 {
            return Err(ConfigError::Invalid {
                field: "max_call_depth",
                reason: "must be at least 1",
            });
        }
        if self.worker_stack_size == Some(0) {
            return Err(ConfigError::Invalid {
                field: "worker_stack_size",
                reason: "must be positive when set",
            });
        }
        Ok(())
    }

    pub fn lock_timeout(&self) -> Option<Duration> {
        self.lock_timeout_ms.map(Duration::from_millis)
    }

    #[must_use]
    pub fn with_max_call_depth(mut self, depth: usize) -> Self {
        self.max_call_depth = depth;
        self
    }

    #[must_use]
    pub fn with_lock_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.lock_timeout_ms = Some(timeout_ms);
        self
    }

    #[must_use]
    pub fn with_global_sharing(mut self, sharing: GlobalSharing) -> Self {
        self.global_sharing = sharing;
        self
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        RuntimeConfig {
            max_call_depth: Self::DEFAULT_MAX_CALL_DEPTH,
            lock_timeout_ms: None,
            global_sharing: GlobalSharing::Shared,
            worker_stack_size: None,
        }
    }
}

/// Error loading a [`RuntimeConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("malformed runtime configuration: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid `{field}`: {reason}")]
    Invalid {
        field: &'static str,
        reason: &'static str,
    },
}
