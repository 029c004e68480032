use super::*;
use lark_value::EvalErrorKind;
use pretty_assertions::assert_eq;

fn frame(name: &'static str) -> CallFrame {
    CallFrame {
        name,
        call_span: None,
    }
}

#[test]
fn test_push_fails_at_limit_without_pushing() {
    let mut stack = CallStack::new(2);
    assert!(stack.push(frame("a")).is_ok());
    assert!(stack.push(frame("b")).is_ok());

    let err = stack.push(frame("c")).err();
    assert_eq!(
        err.map(|e| e.kind),
        Some(EvalErrorKind::StackOverflow { depth: 2 })
    );
    assert_eq!(stack.depth(), 2);
}

#[test]
fn test_capture_is_innermost_first() {
    let mut stack = CallStack::new(10);
    let _ = stack.push(frame("outer"));
    let _ = stack.push(CallFrame {
        name: "inner",
        call_span: Some(Span::new(3, 7)),
    });

    let bt = stack.capture();
    assert_eq!(bt.names().collect::<Vec<_>>(), vec!["inner", "outer"]);
    assert_eq!(bt.frames()[0].span, Some(Span::new(3, 7)));

    stack.pop();
    assert_eq!(stack.depth(), 1);
}
