//! Operator semantics on already-evaluated operands.
//!
//! `&&` and `||` never reach [`eval_binary`]: they short-circuit in the
//! expression evaluator.

use std::cmp::Ordering;
use std::sync::Arc;

use lark_ir::{BinaryOp, UnaryOp};
use lark_value::{internal, type_mismatch, EvalResult, Value};

pub(crate) fn eval_unary(op: UnaryOp, operand: &Value) -> EvalResult {
    match op {
        UnaryOp::Neg => match operand {
            Value::Number(n) => Ok(Value::Number(-n)),
            other => Err(type_mismatch("Number", other.type_name())),
        },
        UnaryOp::Not => Ok(Value::Bool(!operand.is_truthy())),
    }
}

pub(crate) fn eval_binary(op: BinaryOp, left: &Value, right: &Value) -> EvalResult {
    match op {
        BinaryOp::Add => add(left, right),
        BinaryOp::Sub => arith(left, right, |a, b| a - b),
        BinaryOp::Mul => arith(left, right, |a, b| a * b),
        BinaryOp::Div => arith(left, right, |a, b| a / b),
        BinaryOp::Mod => arith(left, right, |a, b| a % b),
        BinaryOp::Eq => Ok(Value::Bool(left == right)),
        BinaryOp::NotEq => Ok(Value::Bool(left != right)),
        BinaryOp::Lt => compare(left, right, Ordering::is_lt),
        BinaryOp::LtEq => compare(left, right, Ordering::is_le),
        BinaryOp::Gt => compare(left, right, Ordering::is_gt),
        BinaryOp::GtEq => compare(left, right, Ordering::is_ge),
        BinaryOp::And | BinaryOp::Or => Err(internal("logical operator reached eager evaluation")),
    }
}

/// Numbers add; if either side is a string the display forms concatenate.
fn add(left: &Value, right: &Value) -> EvalResult {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),
        (Value::Str(_), _) | (_, Value::Str(_)) => {
            let mut joined = left.to_string();
            joined.push_str(&right.to_string());
            Ok(Value::Str(Arc::from(joined)))
        }
        (Value::Number(_), other) | (other, _) => {
            Err(type_mismatch("Number or String", other.type_name()))
        }
    }
}

fn arith(left: &Value, right: &Value, f: impl FnOnce(f64, f64) -> f64) -> EvalResult {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => Ok(Value::Number(f(*a, *b))),
        (Value::Number(_), other) | (other, _) => Err(type_mismatch("Number", other.type_name())),
    }
}

/// Ordering on two numbers or two strings. Comparisons involving NaN are
/// false.
fn compare(left: &Value, right: &Value, test: impl FnOnce(Ordering) -> bool) -> EvalResult {
    let ordering = match (left, right) {
        (Value::Number(a), Value::Number(b)) => a.partial_cmp(b),
        (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
        (Value::Str(_), other) => return Err(type_mismatch("String", other.type_name())),
        (Value::Number(_), other) | (other, _) => {
            return Err(type_mismatch("Number", other.type_name()))
        }
    };
    Ok(Value::Bool(ordering.is_some_and(test)))
}
