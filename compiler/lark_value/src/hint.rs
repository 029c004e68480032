//! Gradual hint checks.

use lark_ir::{Span, TypeHint};

use crate::errors::{type_mismatch, EvalError};
use crate::value::Value;

/// Whether `value` fits `hint`. An absent hint accepts everything, as does
/// `Any`; `null` fits nothing else.
pub fn hint_accepts(hint: Option<TypeHint>, value: &Value) -> bool {
    let Some(hint) = hint else {
        return true;
    };
    match hint {
        TypeHint::Any => true,
        TypeHint::Number => matches!(value, Value::Number(_)),
        TypeHint::String => matches!(value, Value::Str(_)),
        TypeHint::Boolean => matches!(value, Value::Bool(_)),
        TypeHint::Object => matches!(value, Value::Object(_)),
        TypeHint::Array => matches!(value, Value::Array(_)),
        TypeHint::Function => value.is_callable(),
    }
}

/// Check `value` against `hint`, raising a `TypeMismatchError` located at
/// `span` on failure.
pub fn check_hint(hint: Option<TypeHint>, value: &Value, span: Span) -> Result<(), EvalError> {
    match hint {
        Some(expected) if !hint_accepts(hint, value) => {
            Err(type_mismatch(expected.as_str(), value.type_name()).with_span(span))
        }
        _ => Ok(()),
    }
}
