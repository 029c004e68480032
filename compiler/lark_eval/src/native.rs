//! Native binding layer.
//!
//! Host functions never see [`Value`]s directly. Arguments are marshaled
//! into [`HostValue`]s and results back:
//!
//! | script          | host                                  |
//! |-----------------|---------------------------------------|
//! | `null`          | [`HostValue::Null`]                   |
//! | Boolean         | [`HostValue::Bool`]                   |
//! | Number          | [`HostValue::Number`] (`f64`)         |
//! | String          | [`HostValue::Bytes`] (UTF-8)          |
//! | Object          | [`HostValue::Object`] ([`ObjectHandle`]) |
//! | Array           | [`HostValue::Array`] ([`ArrayHandle`]) |
//! | Function/native | [`HostValue::Function`] ([`CallableHandle`]) |
//!
//! Handles keep the identity of what they wrap, and remember the heap they
//! came from: a handle from another context is a conversion failure.
//!
//! Every host function needs a capability. Unless the binding names one
//! with [`NativeBinding::requires`], it is `native.call:<name>`.
//!
//! Host functions run on the calling evaluator's thread. A
//! [`NativeScope`] gives them the accessor callbacks and lets them call
//! back into script code on that same evaluator.

use std::collections::hash_map::Entry;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use lark_ir::Span;
use lark_sandbox::native_call;
use lark_value::{
    native_invocation, ArrayRef, EvalError, EvalResult, HeapId, NativeFunctionRef, NativeId,
    ObjectId, ObjectRef, PropertyKey, Value,
};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::interpreter::Interpreter;
use crate::intrinsics::Intrinsic;

/// Signature of a host function.
pub type HostFn =
    dyn Fn(&mut NativeScope<'_>, &[HostValue]) -> Result<HostValue, NativeFault> + Send + Sync;

/// A value on the host side of the boundary.
#[derive(Clone, Debug)]
pub enum HostValue {
    Null,
    Bool(bool),
    Number(f64),
    /// UTF-8 text with explicit length.
    Bytes(Vec<u8>),
    Object(ObjectHandle),
    Array(ArrayHandle),
    Function(CallableHandle),
}

impl HostValue {
    pub fn string(s: &str) -> Self {
        HostValue::Bytes(s.as_bytes().to_vec())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, HostValue::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            HostValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            HostValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// The bytes as text, if they are valid UTF-8.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            HostValue::Bytes(bytes) => std::str::from_utf8(bytes).ok(),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ObjectHandle> {
        match self {
            HostValue::Object(handle) => Some(handle),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&ArrayHandle> {
        match self {
            HostValue::Array(handle) => Some(handle),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&CallableHandle> {
        match self {
            HostValue::Function(handle) => Some(handle),
            _ => None,
        }
    }
}

impl From<f64> for HostValue {
    fn from(n: f64) -> Self {
        HostValue::Number(n)
    }
}

impl From<bool> for HostValue {
    fn from(b: bool) -> Self {
        HostValue::Bool(b)
    }
}

impl From<&str> for HostValue {
    fn from(s: &str) -> Self {
        HostValue::string(s)
    }
}

/// Opaque handle to a script object. Read and write it through the
/// [`NativeScope`] it was received in.
#[derive(Clone, Debug)]
pub struct ObjectHandle(ObjectRef);

impl ObjectHandle {
    pub fn id(&self) -> ObjectId {
        self.0.id()
    }

    /// Identity comparison.
    pub fn same_object(&self, other: &ObjectHandle) -> bool {
        self.0.ptr_eq(&other.0)
    }
}

/// Opaque handle to a script array.
#[derive(Clone, Debug)]
pub struct ArrayHandle(ArrayRef);

impl ArrayHandle {
    pub fn id(&self) -> ObjectId {
        self.0.id()
    }

    pub fn same_array(&self, other: &ArrayHandle) -> bool {
        self.0.ptr_eq(&other.0)
    }
}

/// Handle to a script function or registered native.
#[derive(Clone, Debug)]
pub struct CallableHandle {
    value: Value,
}

impl CallableHandle {
    /// Name of the function, when it has one.
    pub fn name(&self) -> Option<&str> {
        match &self.value {
            Value::Function(f) => f.name_str(),
            Value::Native(n) => Some(n.symbol()),
            _ => None,
        }
    }
}

/// Error code returned by a host function.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("native fault {code}: {message}")]
pub struct NativeFault {
    pub code: i32,
    pub message: String,
}

impl NativeFault {
    /// A script callback made through [`NativeScope`] raised an error.
    /// Returning the fault with this code re-raises the original error.
    pub const SCRIPT_ERROR: i32 = -1;
    /// An argument could not be converted.
    pub const CONVERSION: i32 = -2;

    pub fn new(code: i32, message: impl Into<String>) -> Self {
        NativeFault {
            code,
            message: message.into(),
        }
    }
}

/// A host function to register with a context.
#[derive(Clone)]
pub struct NativeBinding {
    name: String,
    capability: String,
    func: Arc<HostFn>,
}

impl NativeBinding {
    /// A binding guarded by `native.call:<name>`.
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&mut NativeScope<'_>, &[HostValue]) -> Result<HostValue, NativeFault>
            + Send
            + Sync
            + 'static,
    {
        let name = name.into();
        NativeBinding {
            capability: native_call(&name),
            name,
            func: Arc::new(func),
        }
    }

    /// Require `capability` instead of the default before every
    /// invocation.
    #[must_use]
    pub fn requires(mut self, capability: impl Into<String>) -> Self {
        self.capability = capability.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn capability(&self) -> &str {
        &self.capability
    }

    pub(crate) fn into_parts(self) -> (String, String, Arc<HostFn>) {
        (self.name, self.capability, self.func)
    }
}

impl std::fmt::Debug for NativeBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeBinding")
            .field("name", &self.name)
            .field("capability", &self.capability)
            .finish_non_exhaustive()
    }
}

#[derive(Clone)]
pub(crate) enum NativeImpl {
    Host(Arc<HostFn>),
    Intrinsic(Intrinsic),
}

#[derive(Clone)]
pub(crate) struct NativeEntry {
    pub(crate) name: Arc<str>,
    /// `None` only for intrinsics that need no grant.
    pub(crate) capability: Option<String>,
    pub(crate) imp: NativeImpl,
}

#[derive(Default)]
struct RegistryTable {
    entries: Vec<NativeEntry>,
    by_name: FxHashMap<Arc<str>, NativeId>,
}

/// Every native callable of one context, addressed by [`NativeId`].
pub(crate) struct NativeRegistry {
    /// Heap of the owning context; references handed out carry it.
    owner: HeapId,
    table: RwLock<RegistryTable>,
}

impl NativeRegistry {
    pub(crate) fn new(owner: HeapId) -> Self {
        NativeRegistry {
            owner,
            table: RwLock::default(),
        }
    }

    /// Register under `name`. Re-registering a name replaces the entry in
    /// place, so existing references see the new function.
    pub(crate) fn insert(
        &self,
        name: &str,
        capability: Option<String>,
        imp: NativeImpl,
    ) -> NativeFunctionRef {
        let mut table = self.table.write();
        let entry = NativeEntry {
            name: Arc::from(name),
            capability,
            imp,
        };
        let next = NativeId(u32::try_from(table.entries.len()).unwrap_or(u32::MAX));
        let id = match table.by_name.entry(Arc::clone(&entry.name)) {
            Entry::Occupied(slot) => *slot.get(),
            Entry::Vacant(slot) => *slot.insert(next),
        };
        if id == next {
            table.entries.push(entry);
        } else {
            tracing::debug!(native = name, "replaced native binding");
            table.entries[id.0 as usize] = entry;
        }
        NativeFunctionRef::new(id, self.owner, name)
    }

    pub(crate) fn get(&self, id: NativeId) -> Option<NativeEntry> {
        self.table.read().entries.get(id.0 as usize).cloned()
    }

    pub(crate) fn lookup(&self, name: &str) -> Option<NativeFunctionRef> {
        let table = self.table.read();
        table
            .by_name
            .get(name)
            .map(|id| NativeFunctionRef::new(*id, self.owner, name))
    }

    pub(crate) fn len(&self) -> usize {
        self.table.read().entries.len()
    }
}

impl Interpreter {
    pub(crate) fn host_value(&self, value: &Value) -> HostValue {
        match value {
            Value::Null => HostValue::Null,
            Value::Bool(b) => HostValue::Bool(*b),
            Value::Number(n) => HostValue::Number(*n),
            Value::Str(s) => HostValue::string(s),
            Value::Object(obj) => HostValue::Object(ObjectHandle(obj.clone())),
            Value::Array(array) => HostValue::Array(ArrayHandle(array.clone())),
            Value::Function(_) | Value::Native(_) => HostValue::Function(CallableHandle {
                value: value.clone(),
            }),
        }
    }

    /// Convert a host result back. `native` names the function for the
    /// error message.
    pub(crate) fn script_value(&self, native: &str, value: HostValue) -> EvalResult {
        match value {
            HostValue::Null => Ok(Value::Null),
            HostValue::Bool(b) => Ok(Value::Bool(b)),
            HostValue::Number(n) => Ok(Value::Number(n)),
            HostValue::Bytes(bytes) => match String::from_utf8(bytes) {
                Ok(s) => Ok(Value::Str(Arc::from(s))),
                Err(e) => Err(native_invocation(
                    native,
                    format!("string is not valid UTF-8: {}", e.utf8_error()),
                )),
            },
            HostValue::Object(ObjectHandle(obj)) => {
                if self.ctx.heap.owns(&obj) {
                    Ok(Value::Object(obj))
                } else {
                    Err(native_invocation(native, "object handle belongs to another context"))
                }
            }
            HostValue::Array(ArrayHandle(array)) => {
                if self.ctx.heap.owns_array(&array) {
                    Ok(Value::Array(array))
                } else {
                    Err(native_invocation(native, "array handle belongs to another context"))
                }
            }
            HostValue::Function(callable) => {
                if callable.value.heap_id() == Some(self.ctx.heap.id()) {
                    Ok(callable.value)
                } else {
                    Err(native_invocation(native, "function handle belongs to another context"))
                }
            }
        }
    }

    /// Marshal, invoke and unmarshal. Panics in host code are contained
    /// and reported as `NativeInvocationError`.
    pub(crate) fn call_host(&mut self, name: &str, func: &HostFn, args: &[Value], span: Span) -> EvalResult {
        let host_args: Vec<HostValue> = args.iter().map(|v| self.host_value(v)).collect();

        let mut scope = NativeScope {
            interp: self,
            name,
            raised: None,
        };
        let result = panic::catch_unwind(AssertUnwindSafe(|| func(&mut scope, &host_args)));
        let raised = scope.raised.take();

        match result {
            Ok(Ok(value)) => self.script_value(name, value).map_err(|e| e.with_span(span)),
            Ok(Err(fault)) => match raised {
                Some(err) if fault.code == NativeFault::SCRIPT_ERROR || err.is_cancelled() => Err(err),
                _ => {
                    tracing::debug!(native = name, code = fault.code, "native function failed");
                    Err(native_invocation(name, fault.to_string()).with_span(span))
                }
            },
            Err(_) => {
                tracing::warn!(native = name, "native function panicked");
                Err(native_invocation(name, "host function panicked").with_span(span))
            }
        }
    }
}

/// The context a host function runs in.
///
/// Object access goes through the evaluator, so getters and setters run
/// and prototype lookups apply exactly as they do for script code.
pub struct NativeScope<'a> {
    interp: &'a mut Interpreter,
    name: &'a str,
    /// Last error raised by a script callback.
    raised: Option<EvalError>,
}

impl NativeScope<'_> {
    /// Name the function was registered under.
    pub fn name(&self) -> &str {
        self.name
    }

    /// Whether the calling evaluator has been asked to stop. The request
    /// takes effect once the native call returns.
    pub fn is_cancel_requested(&self) -> bool {
        self.interp.cancel_requested()
    }

    /// Call a script function or native on the current evaluator.
    ///
    /// On failure the fault carries [`NativeFault::SCRIPT_ERROR`];
    /// returning it from the host function re-raises the script error.
    pub fn call(&mut self, callee: &CallableHandle, args: &[HostValue]) -> Result<HostValue, NativeFault> {
        let callee = self.admit(HostValue::Function(callee.clone()))?;
        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            values.push(self.admit(arg.clone())?);
        }
        match self.interp.call_value(&callee, Value::Null, &values, Span::DUMMY) {
            Ok(value) => Ok(self.interp.host_value(&value)),
            Err(err) => Err(self.raise(err)),
        }
    }

    /// Read a property, walking the prototype chain.
    pub fn get(&mut self, obj: &ObjectHandle, key: &str) -> Result<HostValue, NativeFault> {
        let target = self.owned(obj)?;
        match self.interp.get_property(&target, key, Span::DUMMY) {
            Ok(value) => Ok(self.interp.host_value(&value)),
            Err(err) => Err(self.raise(err)),
        }
    }

    /// Write a property on the object itself, or through a setter.
    pub fn set(&mut self, obj: &ObjectHandle, key: &str, value: HostValue) -> Result<(), NativeFault> {
        let target = self.owned(obj)?;
        let value = self.admit(value)?;
        self.interp
            .set_property(&target, PropertyKey::owned(key), value, Span::DUMMY)
            .map_err(|e| self.raise(e))
    }

    pub fn prototype(&self, obj: &ObjectHandle) -> Option<ObjectHandle> {
        obj.0.prototype().map(ObjectHandle)
    }

    /// Own property names, in insertion order.
    pub fn keys(&self, obj: &ObjectHandle) -> Vec<String> {
        obj.0.own_keys().iter().map(ToString::to_string).collect()
    }

    pub fn new_object(&self, prototype: Option<&ObjectHandle>) -> ObjectHandle {
        ObjectHandle(self.interp.ctx.heap.alloc(prototype.map(|p| p.0.clone())))
    }

    /// Snapshot of the elements.
    pub fn elements(&self, array: &ArrayHandle) -> Result<Vec<HostValue>, NativeFault> {
        let array = self.owned_array(array)?;
        Ok(array.to_vec().iter().map(|v| self.interp.host_value(v)).collect())
    }

    pub fn new_array(&self, elements: Vec<HostValue>) -> Result<ArrayHandle, NativeFault> {
        let values = elements
            .into_iter()
            .map(|value| self.admit(value))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ArrayHandle(self.interp.ctx.heap.alloc_array(values)))
    }

    /// Append and return the new length.
    pub fn push(&self, array: &ArrayHandle, value: HostValue) -> Result<usize, NativeFault> {
        let array = self.owned_array(array)?;
        let value = self.admit(value)?;
        Ok(array.push(value))
    }

    fn owned(&self, obj: &ObjectHandle) -> Result<ObjectRef, NativeFault> {
        if self.interp.ctx.heap.owns(&obj.0) {
            Ok(obj.0.clone())
        } else {
            Err(NativeFault::new(
                NativeFault::CONVERSION,
                "object handle belongs to another context",
            ))
        }
    }

    fn owned_array(&self, array: &ArrayHandle) -> Result<ArrayRef, NativeFault> {
        if self.interp.ctx.heap.owns_array(&array.0) {
            Ok(array.0.clone())
        } else {
            Err(NativeFault::new(
                NativeFault::CONVERSION,
                "array handle belongs to another context",
            ))
        }
    }

    fn admit(&self, value: HostValue) -> Result<Value, NativeFault> {
        self.interp
            .script_value(self.name, value)
            .map_err(|e| NativeFault::new(NativeFault::CONVERSION, e.message()))
    }

    fn raise(&mut self, err: EvalError) -> NativeFault {
        let fault = NativeFault::new(
            NativeFault::SCRIPT_ERROR,
            format!("{}: {}", err.kind_name(), err.message()),
        );
        self.raised = Some(err);
        fault
    }
}
