#![allow(clippy::unwrap_used, reason = "test code: panics provide clear failure messages")]

use super::*;
use lark_ir::StringInterner;

#[test]
fn test_child_sees_parent() {
    let interner = StringInterner::new();
    let x = interner.intern("x");
    let root = ScopeRef::root();
    root.define(x, Value::Number(1.0), Mutability::Mutable, None).unwrap();
    let child = root.child();

    assert_eq!(child.lookup(x), Some(Value::Number(1.0)));
    assert!(!child.binds(x));
}

#[test]
fn test_shadowing_does_not_touch_parent() {
    let interner = StringInterner::new();
    let x = interner.intern("x");
    let root = ScopeRef::root();
    root.define(x, Value::Number(1.0), Mutability::Mutable, None).unwrap();
    let child = root.child();
    child.define(x, Value::Number(2.0), Mutability::Mutable, None).unwrap();

    assert_eq!(child.lookup(x), Some(Value::Number(2.0)));
    assert_eq!(root.lookup(x), Some(Value::Number(1.0)));
}

#[test]
fn test_assign_reaches_nearest_binding() {
    let interner = StringInterner::new();
    let x = interner.intern("x");
    let root = ScopeRef::root();
    root.define(x, Value::Number(1.0), Mutability::Mutable, None).unwrap();
    let child = root.child();

    assert_eq!(child.assign(x, Value::Number(5.0)), Ok(()));
    assert_eq!(root.lookup(x), Some(Value::Number(5.0)));
}

#[test]
fn test_assign_errors() {
    let interner = StringInterner::new();
    let (c, h, missing) = (
        interner.intern("c"),
        interner.intern("h"),
        interner.intern("missing"),
    );
    let scope = ScopeRef::root();
    scope.define(c, Value::Null, Mutability::Immutable, None).unwrap();
    scope
        .define(h, Value::Number(0.0), Mutability::Mutable, Some(TypeHint::Number))
        .unwrap();

    assert_eq!(scope.assign(c, Value::Null), Err(AssignError::Immutable));
    assert_eq!(
        scope.assign(h, Value::str("no")),
        Err(AssignError::Hint(TypeHint::Number))
    );
    assert_eq!(scope.lookup(h), Some(Value::Number(0.0)));
    assert_eq!(scope.assign(missing, Value::Null), Err(AssignError::Unbound));
}

#[test]
fn test_snapshot_is_independent() {
    let interner = StringInterner::new();
    let g = interner.intern("g");
    let globals = ScopeRef::root();
    globals.define(g, Value::Number(1.0), Mutability::Mutable, None).unwrap();

    let copy = globals.snapshot();
    assert_eq!(copy.assign(g, Value::Number(2.0)), Ok(()));
    assert_eq!(globals.lookup(g), Some(Value::Number(1.0)));
    assert_eq!(copy.lookup(g), Some(Value::Number(2.0)));
    assert!(copy.parent().is_none());
}

#[test]
fn test_const_cannot_be_redeclared_in_its_frame() {
    let interner = StringInterner::new();
    let k = interner.intern("k");
    let frame = ScopeRef::root();
    frame.define(k, Value::Number(1.0), Mutability::Immutable, None).unwrap();

    assert_eq!(
        frame.define(k, Value::Number(2.0), Mutability::Mutable, None),
        Err(AssignError::Immutable)
    );
    assert_eq!(frame.lookup(k), Some(Value::Number(1.0)));

    let inner = frame.child();
    assert_eq!(inner.define(k, Value::Number(3.0), Mutability::Mutable, None), Ok(()));
}

#[test]
fn test_host_bind_replaces_any_binding() {
    let interner = StringInterner::new();
    let k = interner.intern("k");
    let globals = ScopeRef::root();
    globals.define(k, Value::Null, Mutability::Immutable, None).unwrap();
    globals.bind(k, Value::Bool(true));
    assert_eq!(globals.assign(k, Value::Bool(false)), Ok(()));
}
