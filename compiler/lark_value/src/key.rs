//! Property keys.

use std::borrow::Borrow;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Name of an object property.
///
/// Member names written in source borrow the interner's storage. Keys
/// computed while a script runs (`o[k]`) own their text and are freed with
/// the last property table holding them. Equality and hashing look only at
/// the text, so both forms address the same slot, and tables can be
/// queried with a plain `&str`.
#[derive(Clone)]
pub enum PropertyKey {
    Static(&'static str),
    Owned(Arc<str>),
}

impl PropertyKey {
    pub fn owned(key: &str) -> Self {
        PropertyKey::Owned(Arc::from(key))
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        match self {
            PropertyKey::Static(s) => s,
            PropertyKey::Owned(s) => s,
        }
    }
}

impl PartialEq for PropertyKey {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl Eq for PropertyKey {}

impl Hash for PropertyKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_str().hash(state);
    }
}

impl Borrow<str> for PropertyKey {
    fn borrow(&self) -> &str {
        self.as_str()
    }
}

impl From<&'static str> for PropertyKey {
    fn from(key: &'static str) -> Self {
        PropertyKey::Static(key)
    }
}

impl From<Arc<str>> for PropertyKey {
    fn from(key: Arc<str>) -> Self {
        PropertyKey::Owned(key)
    }
}

impl fmt::Debug for PropertyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.as_str())
    }
}

impl fmt::Display for PropertyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
