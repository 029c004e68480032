use super::*;
use crate::object::Heap;
use pretty_assertions::assert_eq;

#[test]
fn test_truthiness() {
    assert!(!Value::Null.is_truthy());
    assert!(!Value::Bool(false).is_truthy());
    assert!(!Value::Number(0.0).is_truthy());
    assert!(!Value::Number(f64::NAN).is_truthy());
    assert!(!Value::str("").is_truthy());

    assert!(Value::Number(-1.0).is_truthy());
    assert!(Value::str("0").is_truthy());
    assert!(Value::Object(Heap::new().alloc(None)).is_truthy());
}

#[test]
fn test_strict_equality_never_crosses_tags() {
    assert_ne!(Value::Number(1.0), Value::Bool(true));
    assert_ne!(Value::str("1"), Value::Number(1.0));
    assert_ne!(Value::Null, Value::Bool(false));
    assert_eq!(Value::str("abc"), Value::str("abc"));
}

#[test]
fn test_nan_is_not_equal_to_itself() {
    assert_ne!(Value::Number(f64::NAN), Value::Number(f64::NAN));
}

#[test]
fn test_objects_compare_by_identity() {
    let heap = Heap::new();
    let a = heap.alloc(None);
    let b = heap.alloc(None);
    assert_eq!(Value::Object(a.clone()), Value::Object(a.clone()));
    assert_ne!(Value::Object(a), Value::Object(b));
}

#[test]
fn test_arrays_compare_by_identity_and_report_their_heap() {
    let heap = Heap::new();
    let a = heap.alloc_array(vec![Value::Number(1.0)]);
    let b = heap.alloc_array(vec![Value::Number(1.0)]);
    assert_eq!(Value::Array(a.clone()), Value::Array(a.clone()));
    assert_ne!(Value::Array(a.clone()), Value::Array(b));
    assert_eq!(Value::Array(a.clone()).type_name(), "Array");
    assert_eq!(Value::Array(a).heap_id(), Some(heap.id()));
    assert_eq!(Value::Number(1.0).heap_id(), None);
}

#[test]
fn test_number_display() {
    assert_eq!(Value::Number(3.0).to_string(), "3");
    assert_eq!(Value::Number(-0.5).to_string(), "-0.5");
    assert_eq!(Value::Number(f64::INFINITY).to_string(), "Infinity");
    assert_eq!(Value::Number(f64::NAN).to_string(), "NaN");
}

#[test]
fn test_tags() {
    assert_eq!(Value::Null.type_name(), "Null");
    assert_eq!(Value::str("x").type_name(), "String");
    let native = NativeFunctionRef::new(NativeId(3), Heap::new().id(), "fs.read");
    assert_eq!(Value::Native(native.clone()).tag(), ValueTag::NativeFunction);
    assert!(Value::Native(native).is_callable());
}

#[test]
fn test_values_are_send_and_sync() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<Value>();
    assert_send_sync::<FunctionValue>();
}
