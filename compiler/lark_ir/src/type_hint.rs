//! Gradual type hints.

use std::fmt;

/// Optional annotation on a binding, parameter or function return.
///
/// Hints are checked where a value flows into the annotated slot, never
/// ahead of time. An absent hint and `Any` both accept every value.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TypeHint {
    Any,
    Number,
    String,
    Boolean,
    Object,
    Array,
    /// Script closures and native functions alike.
    Function,
}

impl TypeHint {
    pub fn as_str(self) -> &'static str {
        match self {
            TypeHint::Any => "Any",
            TypeHint::Number => "Number",
            TypeHint::String => "String",
            TypeHint::Boolean => "Boolean",
            TypeHint::Object => "Object",
            TypeHint::Array => "Array",
            TypeHint::Function => "Function",
        }
    }

    /// Parse the hint spelling a parser would see in source.
    pub fn from_name(name: &str) -> Option<TypeHint> {
        Some(match name {
            "Any" => TypeHint::Any,
            "Number" => TypeHint::Number,
            "String" => TypeHint::String,
            "Boolean" => TypeHint::Boolean,
            "Object" => TypeHint::Object,
            "Array" => TypeHint::Array,
            "Function" => TypeHint::Function,
            _ => return None,
        })
    }
}

impl fmt::Display for TypeHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
