//! Shared execution context.
//!
//! A [`Context`] is one loaded program plus everything its evaluators
//! share: the object heap, the global bindings, the sandbox policy, the
//! native registry and the scheduler. It is cheap to clone and safe to use
//! from any thread. Every evaluator, the host's own [`Context::run`]
//! included, holds the same [`ContextInner`] through an `Arc`.

use std::fmt;
use std::sync::Arc;

use lark_ir::{InvalidProgram, Name, Program};
use lark_sandbox::{Capability, PolicyError, SandboxPolicy, THREAD_SPAWN};
use lark_value::{
    capability_denied, native_invocation, not_callable, unknown_native, ArrayRef,
    CyclicPrototypeError, EvalError, EvalResult, FunctionValue, Heap, ObjectRef, PropertyKey,
    ScopeRef, Value,
};

use crate::config::{ConfigError, GlobalSharing, RuntimeConfig};
use crate::interpreter::Interpreter;
use crate::intrinsics::Intrinsic;
use crate::native::{NativeBinding, NativeImpl, NativeRegistry};
use crate::scheduler::{Scheduler, TaskHandle};

/// Names the runtime itself looks up.
pub(crate) struct WellKnownNames {
    pub(crate) main: Name,
}

impl WellKnownNames {
    fn new(program: &Program) -> Self {
        WellKnownNames {
            main: program.interner.intern("main"),
        }
    }
}

pub(crate) struct ContextInner {
    pub(crate) program: Program,
    pub(crate) heap: Heap,
    pub(crate) globals: ScopeRef,
    pub(crate) policy: Arc<SandboxPolicy>,
    pub(crate) config: RuntimeConfig,
    pub(crate) natives: NativeRegistry,
    pub(crate) scheduler: Scheduler,
    pub(crate) names: WellKnownNames,
}

impl ContextInner {
    /// Start an evaluator for `entry(args...)` on a worker thread.
    ///
    /// `globals` is the spawning evaluator's global table; isolated mode
    /// hands the worker a snapshot of it.
    #[tracing::instrument(level = "debug", skip_all)]
    pub(crate) fn spawn_task(
        self: &Arc<Self>,
        globals: &ScopeRef,
        entry: Value,
        args: Vec<Value>,
    ) -> Result<TaskHandle, EvalError> {
        self.policy
            .check(THREAD_SPAWN)
            .map_err(|denied| capability_denied(&denied.capability))?;
        if !entry.is_callable() {
            return Err(not_callable(entry.type_name()));
        }

        let globals = match self.config.global_sharing {
            GlobalSharing::Shared => globals.clone(),
            GlobalSharing::Isolated => globals.snapshot(),
        };
        let ctx = Arc::clone(self);
        let handle = self
            .scheduler
            .start(self.config.worker_stack_size, move |token| {
                Interpreter::new(ctx, globals, Some(token.clone())).run_entry(&entry, &args)
            })?;

        tracing::debug!(task = %handle.id(), "spawned evaluator");
        Ok(handle)
    }

    fn bind_native(&self, name: &str, capability: Option<String>, imp: NativeImpl) {
        let native = self.natives.insert(name, capability, imp);
        let global = self.program.interner.intern(name);
        self.globals.bind(global, Value::Native(native));
    }

    /// Bind every top-level function declaration as a global.
    fn hoist_declarations(&self) {
        for function in self.program.declarations() {
            let Some(name) = self.program.arena.function(function).name else {
                continue;
            };
            let closure = FunctionValue::new(
                self.heap.id(),
                self.program.arena.clone(),
                function,
                None,
                Some((name, self.program.interner.lookup(name))),
            );
            self.globals.bind(name, Value::Function(Arc::new(closure)));
        }
    }

    fn interpreter(self: &Arc<Self>) -> Interpreter {
        Interpreter::new(Arc::clone(self), self.globals.clone(), None)
    }
}

/// Error building a [`Context`].
#[derive(Debug, thiserror::Error)]
pub enum ContextError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("program is malformed: {0}")]
    Program(#[from] InvalidProgram),

    #[error("native `{native}` requires an invalid capability: {source}")]
    Capability {
        native: String,
        #[source]
        source: PolicyError,
    },
}

/// A loaded program that any number of threads may execute.
#[derive(Clone)]
pub struct Context {
    inner: Arc<ContextInner>,
}

impl Context {
    /// A context with the default configuration and no host natives.
    /// Fails only when `program` refers to nodes or names it does not
    /// hold.
    pub fn new(program: Program, policy: SandboxPolicy) -> Result<Self, ContextError> {
        program.validate()?;
        Ok(Self::assemble(
            program,
            Arc::new(policy),
            RuntimeConfig::default(),
            Vec::new(),
        ))
    }

    pub fn builder(program: Program) -> ContextBuilder {
        ContextBuilder {
            program,
            policy: Arc::new(SandboxPolicy::deny_all()),
            config: RuntimeConfig::default(),
            natives: Vec::new(),
        }
    }

    /// Registration order decides which binding a global name ends up
    /// with: intrinsics, then host natives, then script declarations.
    fn assemble(
        program: Program,
        policy: Arc<SandboxPolicy>,
        config: RuntimeConfig,
        natives: Vec<NativeBinding>,
    ) -> Self {
        let names = WellKnownNames::new(&program);
        let heap = Heap::new();
        let natives_owner = heap.id();
        let inner = Arc::new(ContextInner {
            program,
            heap,
            globals: ScopeRef::root(),
            policy,
            config,
            natives: NativeRegistry::new(natives_owner),
            scheduler: Scheduler::new(),
            names,
        });

        for intrinsic in Intrinsic::ALL {
            inner.bind_native(
                intrinsic.name(),
                intrinsic.capability().map(str::to_string),
                NativeImpl::Intrinsic(intrinsic),
            );
        }
        for binding in natives {
            let (name, capability, func) = binding.into_parts();
            inner.bind_native(&name, Some(capability), NativeImpl::Host(func));
        }
        inner.hoist_declarations();

        tracing::debug!(
            natives = inner.natives.len(),
            policy = ?inner.policy,
            "context created"
        );
        Context { inner }
    }

    /// Run the program on the calling thread.
    ///
    /// Top-level statements execute in order. If the program defines
    /// `main`, it is then called with `args` and its result returned;
    /// otherwise the value of the last top-level expression statement is.
    pub fn run(&self, args: Vec<Value>) -> EvalResult {
        for arg in &args {
            self.admit(arg)?;
        }
        self.inner.interpreter().run_program(args)
    }

    /// Run `entry(args...)` on a new evaluator thread. Requires the
    /// `thread.spawn` capability.
    pub fn spawn(&self, entry: &Value, args: Vec<Value>) -> Result<TaskHandle, EvalError> {
        self.admit(entry)?;
        for arg in &args {
            self.admit(arg)?;
        }
        self.inner
            .spawn_task(&self.inner.globals, entry.clone(), args)
    }

    /// Register a host function and bind it as a global, replacing any
    /// existing binding of that name.
    pub fn register_native(&self, binding: NativeBinding) -> Result<(), PolicyError> {
        Capability::parse(binding.capability())?;
        let (name, capability, func) = binding.into_parts();
        self.inner
            .bind_native(&name, Some(capability), NativeImpl::Host(func));
        Ok(())
    }

    /// Call a registered native by name from the host.
    pub fn invoke_native(&self, name: &str, args: &[Value]) -> EvalResult {
        let native = self
            .inner
            .natives
            .lookup(name)
            .ok_or_else(|| unknown_native(name))?;
        for arg in args {
            self.admit(arg)?;
        }
        self.inner
            .interpreter()
            .call_value(&Value::Native(native), Value::Null, args, lark_ir::Span::DUMMY)
    }

    /// Current value of a global binding. A name the program never
    /// mentions cannot be bound, and is not interned by asking.
    pub fn global(&self, name: &str) -> Option<Value> {
        let name = self.inner.program.interner.get(name)?;
        self.inner.globals.lookup(name)
    }

    pub fn new_object(&self, prototype: Option<ObjectRef>) -> ObjectRef {
        self.inner.heap.alloc(prototype)
    }

    /// A new array on this context's heap holding `elements`.
    pub fn new_array(&self, elements: Vec<Value>) -> Result<ArrayRef, EvalError> {
        for element in &elements {
            self.admit(element)?;
        }
        Ok(self.inner.heap.alloc_array(elements))
    }

    /// Read a property through the prototype chain, running getters.
    pub fn get_property(&self, obj: &ObjectRef, key: &str) -> EvalResult {
        self.admit_object(obj)?;
        self.inner
            .interpreter()
            .get_property(obj, key, lark_ir::Span::DUMMY)
    }

    /// Write a property on `obj` itself, or through a setter on its chain.
    pub fn set_property(&self, obj: &ObjectRef, key: &str, value: Value) -> Result<(), EvalError> {
        self.admit_object(obj)?;
        self.admit(&value)?;
        self.inner.interpreter().set_property(
            obj,
            PropertyKey::owned(key),
            value,
            lark_ir::Span::DUMMY,
        )
    }

    pub fn set_prototype(
        &self,
        obj: &ObjectRef,
        prototype: Option<ObjectRef>,
    ) -> Result<(), CyclicPrototypeError> {
        self.inner.heap.set_prototype(obj, prototype)
    }

    pub fn policy(&self) -> &SandboxPolicy {
        &self.inner.policy
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.inner.config
    }

    pub fn heap(&self) -> &Heap {
        &self.inner.heap
    }

    /// Number of spawned evaluators still running.
    pub fn active_tasks(&self) -> usize {
        self.inner.scheduler.active()
    }

    /// Request cancellation of every running evaluator.
    pub fn cancel_all(&self) -> usize {
        self.inner.scheduler.cancel_all()
    }

    /// Heap values (objects, arrays, closures and native references)
    /// from another context never enter this one.
    fn admit(&self, value: &Value) -> Result<(), EvalError> {
        match value.heap_id() {
            Some(heap) if heap != self.inner.heap.id() => Err(native_invocation(
                "<host>",
                format!("{} value belongs to another context", value.type_name()),
            )),
            _ => Ok(()),
        }
    }

    fn admit_object(&self, obj: &ObjectRef) -> Result<(), EvalError> {
        self.admit(&Value::Object(obj.clone()))
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("heap", &self.inner.heap)
            .field("policy", &self.inner.policy)
            .field("active_tasks", &self.inner.scheduler.active())
            .finish_non_exhaustive()
    }
}

/// Configures a [`Context`] before it is created.
#[must_use]
pub struct ContextBuilder {
    program: Program,
    policy: Arc<SandboxPolicy>,
    config: RuntimeConfig,
    natives: Vec<NativeBinding>,
}

impl ContextBuilder {
    pub fn policy(mut self, policy: impl Into<Arc<SandboxPolicy>>) -> Self {
        self.policy = policy.into();
        self
    }

    pub fn config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    pub fn native(mut self, binding: NativeBinding) -> Self {
        self.natives.push(binding);
        self
    }

    /// Validate the configuration, the program and every native's
    /// capability name, then create the context.
    pub fn build(self) -> Result<Context, ContextError> {
        self.config.validate()?;
        self.program.validate()?;
        for binding in &self.natives {
            Capability::parse(binding.capability()).map_err(|source| ContextError::Capability {
                native: binding.name().to_string(),
                source,
            })?;
        }
        Ok(Context::assemble(
            self.program,
            self.policy,
            self.config,
            self.natives,
        ))
    }
}
