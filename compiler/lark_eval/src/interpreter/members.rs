//! Property and element access.
//!
//! Objects carry named properties along a prototype chain. Arrays carry
//! numbered elements and a single read-only `length`; any other named
//! member of an array is an error rather than a silent `null`.

use lark_ir::Span;
use lark_value::{
    index_out_of_range, not_an_object, read_only_property, type_mismatch, ArrayRef, EvalError,
    EvalResult, ObjectRef, PropertyKey, PropertyLookup, Value, WriteTarget,
};

use super::Interpreter;

/// Largest index an `f64` still represents exactly.
const MAX_INDEX: f64 = 9_007_199_254_740_991.0;

impl Interpreter {
    pub(crate) fn expect_object(value: &Value, span: Span) -> Result<ObjectRef, EvalError> {
        match value {
            Value::Object(obj) => Ok(obj.clone()),
            other => Err(not_an_object(other.type_name()).with_span(span)),
        }
    }

    /// Read through the prototype chain, invoking getters with `obj` as
    /// `this`. Missing properties read as `null`.
    pub(crate) fn get_property(&mut self, obj: &ObjectRef, key: &str, span: Span) -> EvalResult {
        match obj.lookup(key) {
            PropertyLookup::Data(value) => Ok(value),
            PropertyLookup::Accessor {
                getter: Some(getter),
            } => self.call_value(&getter, Value::Object(obj.clone()), &[], span),
            PropertyLookup::Accessor { getter: None } | PropertyLookup::NotFound => Ok(Value::Null),
        }
    }

    /// Write an own data property, or call the setter an accessor on the
    /// chain provides.
    pub(crate) fn set_property(
        &mut self,
        obj: &ObjectRef,
        key: PropertyKey,
        value: Value,
        span: Span,
    ) -> Result<(), EvalError> {
        match obj.resolve_write(key.as_str()) {
            WriteTarget::Own => {
                if obj.set_own(key.clone(), value) {
                    Ok(())
                } else {
                    Err(read_only_property(key.as_str()).with_span(span))
                }
            }
            WriteTarget::Setter(setter) => self
                .call_value(&setter, Value::Object(obj.clone()), &[value], span)
                .map(|_| ()),
            WriteTarget::ReadOnly => Err(read_only_property(key.as_str()).with_span(span)),
        }
    }

    /// `target.key`
    pub(crate) fn read_member(&mut self, target: &Value, key: &str, span: Span) -> EvalResult {
        match target {
            Value::Object(obj) => self.get_property(obj, key, span),
            Value::Array(array) if key == "length" => Ok(array_length(array)),
            other => Err(not_an_object(other.type_name()).with_span(span)),
        }
    }

    /// `target.key = value`
    pub(crate) fn write_member(
        &mut self,
        target: &Value,
        key: PropertyKey,
        value: Value,
        span: Span,
    ) -> Result<(), EvalError> {
        match target {
            Value::Object(obj) => self.set_property(obj, key, value, span),
            Value::Array(_) if key.as_str() == "length" => {
                Err(read_only_property("length").with_span(span))
            }
            other => Err(not_an_object(other.type_name()).with_span(span)),
        }
    }

    /// `target[key]`. Out-of-range array reads give `null`.
    pub(crate) fn read_index(&mut self, target: &Value, key: &Value, span: Span) -> EvalResult {
        match target {
            Value::Array(array) => {
                let element = element_index(key, span)?.and_then(|i| array.get(i));
                Ok(element.unwrap_or(Value::Null))
            }
            _ => {
                let key = property_key(key);
                self.read_member(target, key.as_str(), span)
            }
        }
    }

    /// `target[key] = value`. An array grows by one when written at its
    /// length; writes further out are refused.
    pub(crate) fn write_index(
        &mut self,
        target: &Value,
        key: &Value,
        value: Value,
        span: Span,
    ) -> Result<(), EvalError> {
        match target {
            Value::Array(array) => {
                let refused = || index_out_of_range(&key.to_string(), array.len()).with_span(span);
                let index = element_index(key, span)?.ok_or_else(refused)?;
                array
                    .set(index, value)
                    .map_err(|length| index_out_of_range(&key.to_string(), length).with_span(span))
            }
            _ => self.write_member(target, property_key(key), value, span),
        }
    }
}

/// Computed keys use the value's display form. Nothing is interned, so the
/// key lives only as long as the tables holding it.
pub(crate) fn property_key(key: &Value) -> PropertyKey {
    match key {
        Value::Str(s) => PropertyKey::from(s.clone()),
        other => PropertyKey::owned(&other.to_string()),
    }
}

#[expect(
    clippy::cast_precision_loss,
    reason = "array lengths stay far below 2^53"
)]
fn array_length(array: &ArrayRef) -> Value {
    Value::Number(array.len() as f64)
}

/// Element position named by `key`, or `None` for a number that is not a
/// non-negative integer.
#[expect(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    reason = "checked to be a non-negative integer no larger than 2^53"
)]
fn element_index(key: &Value, span: Span) -> Result<Option<usize>, EvalError> {
    match key {
        Value::Number(n) if n.fract() == 0.0 && (0.0..=MAX_INDEX).contains(n) => {
            Ok(Some(*n as usize))
        }
        Value::Number(_) => Ok(None),
        other => Err(type_mismatch("Number", other.type_name()).with_span(span)),
    }
}
