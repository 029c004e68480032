//! Immutable allow-list policies.

use std::fmt;

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use crate::capability::Capability;
use crate::PolicyError;

/// Serialized form of a policy: `{ "allow": ["thread.spawn", ...] }`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PolicyDescriptor {
    #[serde(default)]
    pub allow: Vec<String>,
}

/// A denied operation.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("capability denied: {capability}")]
pub struct CapabilityDenied {
    pub capability: String,
}

/// Capability allow-list. Anything not granted is denied.
#[derive(Clone, Default)]
pub struct SandboxPolicy {
    grants: FxHashSet<Capability>,
}

impl SandboxPolicy {
    /// A policy that grants nothing.
    pub fn deny_all() -> Self {
        SandboxPolicy::default()
    }

    pub fn builder() -> PolicyBuilder {
        PolicyBuilder::default()
    }

    pub fn from_descriptor(descriptor: &PolicyDescriptor) -> Result<Self, PolicyError> {
        descriptor
            .allow
            .iter()
            .fold(Self::builder(), |b, name| b.allow(name.as_str()))
            .build()
    }

    pub fn from_json(json: &str) -> Result<Self, PolicyError> {
        let descriptor: PolicyDescriptor = serde_json::from_str(json)?;
        Self::from_descriptor(&descriptor)
    }

    pub fn to_descriptor(&self) -> PolicyDescriptor {
        PolicyDescriptor {
            allow: self.capabilities().into_iter().map(str::to_string).collect(),
        }
    }

    /// Whether `capability` is granted. Malformed names are never granted.
    pub fn permits(&self, capability: &str) -> bool {
        match Capability::parse(capability) {
            Ok(requested) => {
                self.grants.contains(&requested)
                    || self.grants.iter().any(|grant| grant.covers(&requested))
            }
            Err(_) => false,
        }
    }

    /// Like [`permits`](Self::permits), but reports and logs the denial.
    pub fn check(&self, capability: &str) -> Result<(), CapabilityDenied> {
        if self.permits(capability) {
            Ok(())
        } else {
            tracing::warn!(capability, "sandbox denied operation");
            Err(CapabilityDenied {
                capability: capability.to_string(),
            })
        }
    }

    /// Granted capability names, sorted.
    pub fn capabilities(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.grants.iter().map(Capability::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn is_empty(&self) -> bool {
        self.grants.is_empty()
    }
}

impl fmt::Debug for SandboxPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.capabilities()).finish()
    }
}

/// Collects grants; names are validated in [`build`](Self::build).
#[derive(Default)]
#[must_use]
pub struct PolicyBuilder {
    grants: Vec<String>,
}

impl PolicyBuilder {
    pub fn allow(mut self, capability: impl Into<String>) -> Self {
        self.grants.push(capability.into());
        self
    }

    pub fn build(self) -> Result<SandboxPolicy, PolicyError> {
        let grants = self
            .grants
            .iter()
            .map(|name| Capability::parse(name))
            .collect::<Result<FxHashSet<_>, _>>()?;
        tracing::debug!(grants = grants.len(), "built sandbox policy");
        Ok(SandboxPolicy { grants })
    }
}
