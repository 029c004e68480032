//! Runtime values.

use std::fmt;
use std::sync::Arc;

use lark_ir::{FunctionId, Name, SharedArena};

use crate::array::ArrayRef;
use crate::object::{HeapId, ObjectRef};
use crate::scope::ScopeRef;

/// Runtime tag of a [`Value`], reported by type errors and `typeOf`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ValueTag {
    Null,
    Boolean,
    Number,
    String,
    Object,
    Array,
    Function,
    NativeFunction,
}

impl ValueTag {
    pub fn as_str(self) -> &'static str {
        match self {
            ValueTag::Null => "Null",
            ValueTag::Boolean => "Boolean",
            ValueTag::Number => "Number",
            ValueTag::String => "String",
            ValueTag::Object => "Object",
            ValueTag::Array => "Array",
            ValueTag::Function => "Function",
            ValueTag::NativeFunction => "NativeFunction",
        }
    }
}

impl fmt::Display for ValueTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A script value.
///
/// Scalars are copied by value. `Object`, `Array` and `Function` are
/// handles into the shared heap: cloning one clones the handle, not the
/// referent.
#[derive(Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Number(f64),
    Str(Arc<str>),
    Object(ObjectRef),
    Array(ArrayRef),
    Function(FunctionRef),
    Native(NativeFunctionRef),
}

impl Value {
    pub fn str(s: &str) -> Self {
        Value::Str(Arc::from(s))
    }

    pub fn tag(&self) -> ValueTag {
        match self {
            Value::Null => ValueTag::Null,
            Value::Bool(_) => ValueTag::Boolean,
            Value::Number(_) => ValueTag::Number,
            Value::Str(_) => ValueTag::String,
            Value::Object(_) => ValueTag::Object,
            Value::Array(_) => ValueTag::Array,
            Value::Function(_) => ValueTag::Function,
            Value::Native(_) => ValueTag::NativeFunction,
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.tag().as_str()
    }

    /// `null`, `false`, `0`, `NaN` and `""` are falsy; everything else is truthy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::Str(s) => !s.is_empty(),
            Value::Object(_) | Value::Array(_) | Value::Function(_) | Value::Native(_) => true,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_callable(&self) -> bool {
        matches!(self, Value::Function(_) | Value::Native(_))
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&ArrayRef> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Heap that allocated the referent; `None` for scalars.
    pub fn heap_id(&self) -> Option<HeapId> {
        match self {
            Value::Object(o) => Some(o.heap_id()),
            Value::Array(a) => Some(a.heap_id()),
            Value::Function(f) => Some(f.heap),
            Value::Native(n) => Some(n.owner()),
            Value::Null | Value::Bool(_) | Value::Number(_) | Value::Str(_) => None,
        }
    }

    /// Text used for string concatenation and computed property keys.
    pub fn to_display_string(&self) -> String {
        self.to_string()
    }
}

/// Strict equality: different tags are never equal, strings compare by
/// content, objects, arrays and functions by identity.
impl PartialEq for Value {
    #[allow(clippy::float_cmp)]
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            (Value::Array(a), Value::Array(b)) => a.ptr_eq(b),
            (Value::Function(a), Value::Function(b)) => Arc::ptr_eq(a, b),
            (Value::Native(a), Value::Native(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) => fmt_number(*n, f),
            Value::Str(s) => f.write_str(s),
            Value::Object(o) => write!(f, "[object #{}]", o.id().raw()),
            Value::Array(a) => write!(f, "[array #{}]", a.id().raw()),
            Value::Function(func) => match func.name_str() {
                Some(name) => write!(f, "[function {name}]"),
                None => f.write_str("[function]"),
            },
            Value::Native(native) => write!(f, "[native {}]", native.symbol()),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => write!(f, "Str({s:?})"),
            Value::Number(n) => write!(f, "Number({n})"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            other => write!(f, "{other}"),
        }
    }
}

/// Integral numbers print without a fractional part.
fn fmt_number(n: f64, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if n.is_nan() {
        f.write_str("NaN")
    } else if n.is_infinite() {
        f.write_str(if n > 0.0 { "Infinity" } else { "-Infinity" })
    } else if n.fract() == 0.0 && n.abs() < 1e15 {
        write!(f, "{n:.0}")
    } else {
        write!(f, "{n}")
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::str(s)
    }
}

impl From<ObjectRef> for Value {
    fn from(o: ObjectRef) -> Self {
        Value::Object(o)
    }
}

impl From<ArrayRef> for Value {
    fn from(a: ArrayRef) -> Self {
        Value::Array(a)
    }
}

/// Shared handle to a closure.
pub type FunctionRef = Arc<FunctionValue>;

/// A closure: a function node plus the lexical scope it was created in.
pub struct FunctionValue {
    /// Heap of the context that created the closure.
    pub heap: HeapId,
    /// Arena the function body lives in.
    pub arena: SharedArena,
    pub function: FunctionId,
    /// Innermost local scope at creation; `None` for top-level functions,
    /// whose free names resolve against the context globals.
    pub scope: Option<ScopeRef>,
    /// Declared or inferred name, for backtraces.
    pub name: Option<Name>,
    name_str: Option<&'static str>,
}

impl FunctionValue {
    pub fn new(
        heap: HeapId,
        arena: SharedArena,
        function: FunctionId,
        scope: Option<ScopeRef>,
        name: Option<(Name, &'static str)>,
    ) -> Self {
        FunctionValue {
            heap,
            arena,
            function,
            scope,
            name: name.map(|(n, _)| n),
            name_str: name.map(|(_, s)| s),
        }
    }

    pub fn name_str(&self) -> Option<&'static str> {
        self.name_str
    }
}

impl fmt::Debug for FunctionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionValue")
            .field("function", &self.function)
            .field("name", &self.name_str)
            .finish_non_exhaustive()
    }
}

/// Registry slot of a native function.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct NativeId(pub u32);

/// Reference to a registered native function.
///
/// The callable itself stays in the owning context's native registry; the
/// value only names it, so invoking it always goes back through the
/// registry and its capability check. `owner` is the heap of that context.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct NativeFunctionRef {
    id: NativeId,
    owner: HeapId,
    symbol: Arc<str>,
}

impl NativeFunctionRef {
    pub fn new(id: NativeId, owner: HeapId, symbol: &str) -> Self {
        NativeFunctionRef {
            id,
            owner,
            symbol: Arc::from(symbol),
        }
    }

    pub fn id(&self) -> NativeId {
        self.id
    }

    pub fn owner(&self) -> HeapId {
        self.owner
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }
}

#[cfg(test)]
mod tests;
