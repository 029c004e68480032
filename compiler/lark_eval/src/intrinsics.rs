//! Core intrinsics.
//!
//! Intrinsics are natives implemented by the runtime itself. They live in
//! the same registry as host functions and go through the same capability
//! check, so `spawn` is denied exactly like any other privileged call.

use std::sync::Arc;

use lark_ir::Span;
use lark_sandbox::THREAD_SPAWN;
use lark_value::{
    read_only_property, task_cancelled, type_mismatch, ArrayRef, EvalError, EvalResult,
    ObjectRef, Value,
};

use crate::interpreter::{property_key, Interpreter};
use crate::scheduler::TaskHandle;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub(crate) enum Intrinsic {
    GetPrototype,
    SetPrototype,
    Create,
    HasOwnProperty,
    Keys,
    DefineAccessor,
    DefineConst,
    Push,
    TypeOf,
    AtomicUpdate,
    Spawn,
    Join,
    Cancel,
}

impl Intrinsic {
    pub(crate) const ALL: [Intrinsic; 13] = [
        Intrinsic::GetPrototype,
        Intrinsic::SetPrototype,
        Intrinsic::Create,
        Intrinsic::HasOwnProperty,
        Intrinsic::Keys,
        Intrinsic::DefineAccessor,
        Intrinsic::DefineConst,
        Intrinsic::Push,
        Intrinsic::TypeOf,
        Intrinsic::AtomicUpdate,
        Intrinsic::Spawn,
        Intrinsic::Join,
        Intrinsic::Cancel,
    ];

    /// Global name the intrinsic is bound to.
    pub(crate) fn name(self) -> &'static str {
        match self {
            Intrinsic::GetPrototype => "getPrototype",
            Intrinsic::SetPrototype => "setPrototype",
            Intrinsic::Create => "create",
            Intrinsic::HasOwnProperty => "hasOwnProperty",
            Intrinsic::Keys => "keys",
            Intrinsic::DefineAccessor => "defineAccessor",
            Intrinsic::DefineConst => "defineConst",
            Intrinsic::Push => "push",
            Intrinsic::TypeOf => "typeOf",
            Intrinsic::AtomicUpdate => "atomicUpdate",
            Intrinsic::Spawn => "spawn",
            Intrinsic::Join => "join",
            Intrinsic::Cancel => "cancel",
        }
    }

    pub(crate) fn capability(self) -> Option<&'static str> {
        match self {
            Intrinsic::Spawn => Some(THREAD_SPAWN),
            _ => None,
        }
    }
}

fn arg(args: &[Value], index: usize) -> Value {
    args.get(index).cloned().unwrap_or(Value::Null)
}

/// `null` or an object.
fn optional_object(value: &Value, span: Span) -> Result<Option<ObjectRef>, EvalError> {
    match value {
        Value::Null => Ok(None),
        Value::Object(obj) => Ok(Some(obj.clone())),
        other => Err(type_mismatch("Object", other.type_name()).with_span(span)),
    }
}

fn expect_array(value: &Value, span: Span) -> Result<ArrayRef, EvalError> {
    match value {
        Value::Array(array) => Ok(array.clone()),
        other => Err(type_mismatch("Array", other.type_name()).with_span(span)),
    }
}

/// `null` or a callable.
fn optional_callable(value: Value, span: Span) -> Result<Option<Value>, EvalError> {
    match value {
        Value::Null => Ok(None),
        callable if callable.is_callable() => Ok(Some(callable)),
        other => Err(type_mismatch("Function", other.type_name()).with_span(span)),
    }
}

impl Interpreter {
    pub(crate) fn call_intrinsic(&mut self, intrinsic: Intrinsic, args: &[Value], span: Span) -> EvalResult {
        match intrinsic {
            Intrinsic::GetPrototype => {
                let obj = Self::expect_object(&arg(args, 0), span)?;
                Ok(obj.prototype().map_or(Value::Null, Value::Object))
            }

            Intrinsic::SetPrototype => {
                let obj = Self::expect_object(&arg(args, 0), span)?;
                let prototype = optional_object(&arg(args, 1), span)?;
                self.ctx
                    .heap
                    .set_prototype(&obj, prototype)
                    .map_err(|e| EvalError::from(e).with_span(span))?;
                Ok(Value::Object(obj))
            }

            Intrinsic::Create => {
                let prototype = optional_object(&arg(args, 0), span)?;
                Ok(Value::Object(self.ctx.heap.alloc(prototype)))
            }

            Intrinsic::HasOwnProperty => {
                let obj = Self::expect_object(&arg(args, 0), span)?;
                let key = property_key(&arg(args, 1));
                Ok(Value::Bool(obj.has_own(key.as_str())))
            }

            Intrinsic::Keys => {
                let obj = Self::expect_object(&arg(args, 0), span)?;
                let keys = obj
                    .own_keys()
                    .iter()
                    .map(|key| Value::str(key.as_str()))
                    .collect();
                Ok(Value::Array(self.ctx.heap.alloc_array(keys)))
            }

            Intrinsic::DefineAccessor => {
                let obj = Self::expect_object(&arg(args, 0), span)?;
                let key = property_key(&arg(args, 1));
                let getter = optional_callable(arg(args, 2), span)?;
                let setter = optional_callable(arg(args, 3), span)?;
                if obj.define_accessor(key.clone(), getter, setter) {
                    Ok(Value::Null)
                } else {
                    Err(read_only_property(key.as_str()).with_span(span))
                }
            }

            Intrinsic::DefineConst => {
                let obj = Self::expect_object(&arg(args, 0), span)?;
                let key = property_key(&arg(args, 1));
                let value = arg(args, 2);
                if obj.define_const(key.clone(), value.clone()) {
                    Ok(value)
                } else {
                    Err(read_only_property(key.as_str()).with_span(span))
                }
            }

            Intrinsic::Push => {
                let array = expect_array(&arg(args, 0), span)?;
                #[expect(
                    clippy::cast_precision_loss,
                    reason = "array lengths stay far below 2^53"
                )]
                let length = array.push(arg(args, 1)) as f64;
                Ok(Value::Number(length))
            }

            Intrinsic::TypeOf => Ok(Value::str(arg(args, 0).type_name())),

            Intrinsic::AtomicUpdate => {
                let obj = Self::expect_object(&arg(args, 0), span)?;
                let key = property_key(&arg(args, 1));
                let update = arg(args, 2);
                if !update.is_callable() {
                    return Err(type_mismatch("Function", update.type_name()).with_span(span));
                }

                let _monitor = self.lock_monitor(&obj, span)?;
                self.non_preemptible(|interp| {
                    let old = interp.get_property(&obj, key.as_str(), span)?;
                    let new = interp.call_value(&update, Value::Null, &[old], span)?;
                    interp.set_property(&obj, key, new.clone(), span)?;
                    Ok(new)
                })
            }

            Intrinsic::Spawn => {
                let entry = arg(args, 0);
                let rest = args.get(1..).unwrap_or_default().to_vec();
                let globals = self.env.globals().clone();
                let handle = self
                    .ctx
                    .spawn_task(&globals, entry, rest)
                    .map_err(|e| e.or_span(span))?;
                Ok(Value::Object(self.task_object(handle)))
            }

            // The joined task's cancellation is its outcome, not ours: it
            // surfaces as a catchable error in the joiner.
            Intrinsic::Join => {
                let handle = self.task_handle(&arg(args, 0), span)?;
                handle.join().map_err(|e| {
                    if e.is_cancelled() {
                        task_cancelled(handle.id().raw()).with_span(span)
                    } else {
                        e
                    }
                })
            }

            Intrinsic::Cancel => {
                let handle = self.task_handle(&arg(args, 0), span)?;
                Ok(Value::Bool(handle.cancel()))
            }
        }
    }

    /// Script-visible task handle: an object carrying the [`TaskHandle`].
    fn task_object(&self, handle: TaskHandle) -> ObjectRef {
        #[expect(
            clippy::cast_precision_loss,
            reason = "task ids stay far below 2^52"
        )]
        let id = handle.id().raw() as f64;
        let obj = self.ctx.heap.alloc_with_host(None, Arc::new(handle));
        obj.define_const("id", Value::Number(id));
        obj
    }

    fn task_handle(&self, value: &Value, span: Span) -> Result<TaskHandle, EvalError> {
        value
            .as_object()
            .and_then(|obj| obj.host_as::<TaskHandle>())
            .cloned()
            .ok_or_else(|| type_mismatch("TaskHandle", value.type_name()).with_span(span))
    }
}
