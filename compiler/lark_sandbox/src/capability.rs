//! Capability names.

use std::fmt;

use crate::PolicyError;

/// Permission to spawn a concurrent evaluator.
pub const THREAD_SPAWN: &str = "thread.spawn";

/// Base capability of per-symbol native call grants.
pub const NATIVE_CALL: &str = "native.call";

/// `native.call:<symbol>`
pub fn native_call(symbol: &str) -> String {
    format!("{NATIVE_CALL}:{symbol}")
}

/// A validated capability name.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Capability {
    name: String,
    /// Byte offset of `:` when a symbol is present.
    colon: Option<usize>,
}

impl Capability {
    pub fn parse(name: &str) -> Result<Capability, PolicyError> {
        let invalid = |reason| PolicyError::InvalidCapability {
            name: name.to_string(),
            reason,
        };

        if name == "*" {
            return Err(PolicyError::GrantAll);
        }
        if name.is_empty() {
            return Err(invalid("empty name"));
        }
        if name.chars().any(char::is_whitespace) {
            return Err(invalid("contains whitespace"));
        }

        let colon = name.find(':');
        let (base, symbol) = match colon {
            Some(at) => (&name[..at], Some(&name[at + 1..])),
            None => (name, None),
        };

        for segment in base.split('.') {
            if segment.is_empty() {
                return Err(invalid("empty segment"));
            }
            if !segment
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
            {
                return Err(invalid("segments may only use ASCII letters, digits, `_` and `-`"));
            }
        }

        if let Some(symbol) = symbol {
            if symbol.is_empty() {
                return Err(invalid("empty symbol after `:`"));
            }
            if symbol.contains(':') {
                return Err(invalid("more than one `:`"));
            }
        }

        Ok(Capability {
            name: name.to_string(),
            colon,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.name
    }

    /// Dotted part before any `:`.
    pub fn base(&self) -> &str {
        match self.colon {
            Some(at) => &self.name[..at],
            None => &self.name,
        }
    }

    pub fn symbol(&self) -> Option<&str> {
        self.colon.map(|at| &self.name[at + 1..])
    }

    pub fn is_wildcard(&self) -> bool {
        self.symbol() == Some("*")
    }

    /// Whether holding `self` as a grant permits `requested`.
    pub fn covers(&self, requested: &Capability) -> bool {
        if self.name == requested.name {
            return true;
        }
        self.is_wildcard() && requested.symbol().is_some() && self.base() == requested.base()
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl fmt::Debug for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Capability({})", self.name)
    }
}
