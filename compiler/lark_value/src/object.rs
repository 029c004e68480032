//! Shared object heap.
//!
//! An object is a property table plus one prototype link, behind an
//! [`ObjectRef`] handle that any evaluator thread may hold. Lock
//! discipline:
//!
//! - `state` (property table and prototype) is held only for the duration
//!   of a single read or write, and never while another object's state is
//!   held. Chain walks clone the next link and release before moving on.
//! - `monitor` is the script-level lock. It is reentrant so a script may
//!   nest `lock (o)` blocks on the same object.
//! - The heap's relink guard serializes every prototype change, so the
//!   reachability check and the link store happen as one step.

use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use indexmap::IndexMap;
use parking_lot::{Mutex, ReentrantMutex, ReentrantMutexGuard};
use rustc_hash::FxBuildHasher;

use crate::array::{ArrayCell, ArrayRef};
use crate::errors::{cyclic_prototype, EvalError};
use crate::key::PropertyKey;
use crate::value::Value;

/// Opaque host payload carried by an object.
pub type HostData = Arc<dyn Any + Send + Sync>;

/// Guard for an object's monitor.
pub type MonitorGuard<'a> = ReentrantMutexGuard<'a, ()>;

/// Unique, monotonically increasing object id within a heap.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(u64);

impl ObjectId {
    pub fn raw(self) -> u64 {
        self.0
    }
}

/// Identity of a heap, used to reject handles that cross contexts.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct HeapId(u64);

static NEXT_HEAP_ID: AtomicU64 = AtomicU64::new(1);

/// A property slot.
#[derive(Clone, Debug)]
pub enum Property {
    /// A read-only slot refuses every later write, own or inherited.
    Data { value: Value, writable: bool },
    /// Getter and setter are script or native functions; either may be
    /// absent.
    Accessor {
        getter: Option<Value>,
        setter: Option<Value>,
    },
}

impl Property {
    fn is_read_only(&self) -> bool {
        matches!(self, Property::Data { writable: false, .. })
    }
}

/// Result of a chain lookup.
#[derive(Clone, Debug)]
pub enum PropertyLookup {
    NotFound,
    Data(Value),
    /// Found an accessor; the caller invokes the getter with the original
    /// receiver as `this`.
    Accessor { getter: Option<Value> },
}

/// Where a write to a property name lands.
#[derive(Clone, Debug)]
pub enum WriteTarget {
    /// Store a data property on the receiver.
    Own,
    /// An accessor on the chain has a setter: call it with the receiver.
    Setter(Value),
    /// A read-only data property, or an accessor without a setter, is
    /// first on the chain.
    ReadOnly,
}

/// Error from [`Heap::set_prototype`]. Both links are unchanged.
#[derive(Copy, Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("prototype assignment would create a cycle")]
pub struct CyclicPrototypeError;

impl From<CyclicPrototypeError> for EvalError {
    fn from(_: CyclicPrototypeError) -> Self {
        cyclic_prototype()
    }
}

type PropertyMap = IndexMap<PropertyKey, Property, FxBuildHasher>;

struct ObjectState {
    properties: PropertyMap,
    prototype: Option<ObjectRef>,
}

struct ObjectCell {
    id: ObjectId,
    heap: HeapId,
    state: Mutex<ObjectState>,
    monitor: ReentrantMutex<()>,
    host: Option<HostData>,
}

/// Handle to a heap object. Cloning shares the object; equality is
/// identity.
#[derive(Clone)]
pub struct ObjectRef(Arc<ObjectCell>);

impl ObjectRef {
    pub fn id(&self) -> ObjectId {
        self.0.id
    }

    pub fn heap_id(&self) -> HeapId {
        self.0.heap
    }

    #[inline]
    pub fn ptr_eq(&self, other: &ObjectRef) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub fn prototype(&self) -> Option<ObjectRef> {
        self.0.state.lock().prototype.clone()
    }

    pub fn host_data(&self) -> Option<&HostData> {
        self.0.host.as_ref()
    }

    /// Downcast the host payload.
    pub fn host_as<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.0.host.as_ref().and_then(|h| h.downcast_ref::<T>())
    }

    pub fn has_own(&self, key: &str) -> bool {
        self.0.state.lock().properties.contains_key(key)
    }

    /// Own property keys in insertion order.
    pub fn own_keys(&self) -> Vec<PropertyKey> {
        self.0.state.lock().properties.keys().cloned().collect()
    }

    /// Walk own properties, then the prototype chain.
    pub fn lookup(&self, key: &str) -> PropertyLookup {
        let mut current = Some(self.clone());
        while let Some(obj) = current {
            let next = {
                let state = obj.0.state.lock();
                match state.properties.get(key) {
                    Some(Property::Data { value, .. }) => {
                        return PropertyLookup::Data(value.clone())
                    }
                    Some(Property::Accessor { getter, .. }) => {
                        return PropertyLookup::Accessor {
                            getter: getter.clone(),
                        }
                    }
                    None => state.prototype.clone(),
                }
            };
            current = next;
        }
        PropertyLookup::NotFound
    }

    /// Data value of `key` on the chain. Accessors and missing keys
    /// yield `None`.
    pub fn get(&self, key: &str) -> Option<Value> {
        match self.lookup(key) {
            PropertyLookup::Data(v) => Some(v),
            PropertyLookup::Accessor { .. } | PropertyLookup::NotFound => None,
        }
    }

    /// Decide where a write to `key` goes. The first property found on the
    /// chain wins: writable data properties are shadowed by an own write,
    /// accessors redirect to their setter, read-only slots refuse.
    pub fn resolve_write(&self, key: &str) -> WriteTarget {
        let mut current = Some(self.clone());
        while let Some(obj) = current {
            let next = {
                let state = obj.0.state.lock();
                match state.properties.get(key) {
                    Some(Property::Data { writable: true, .. }) => return WriteTarget::Own,
                    Some(Property::Accessor {
                        setter: Some(setter),
                        ..
                    }) => return WriteTarget::Setter(setter.clone()),
                    Some(
                        Property::Data {
                            writable: false, ..
                        }
                        | Property::Accessor { setter: None, .. },
                    ) => return WriteTarget::ReadOnly,
                    None => state.prototype.clone(),
                }
            };
            current = next;
        }
        WriteTarget::Own
    }

    /// Store a writable data property on this object, replacing any own
    /// slot. Returns `false`, leaving the object unchanged, when the own
    /// slot is read-only.
    pub fn set_own(&self, key: impl Into<PropertyKey>, value: Value) -> bool {
        self.replace_own(key.into(), Property::Data { value, writable: true })
    }

    /// Define a read-only data property. Fails like
    /// [`set_own`](Self::set_own) when a read-only slot is already there.
    pub fn define_const(&self, key: impl Into<PropertyKey>, value: Value) -> bool {
        self.replace_own(key.into(), Property::Data { value, writable: false })
    }

    pub fn define_accessor(
        &self,
        key: impl Into<PropertyKey>,
        getter: Option<Value>,
        setter: Option<Value>,
    ) -> bool {
        self.replace_own(key.into(), Property::Accessor { getter, setter })
    }

    fn replace_own(&self, key: PropertyKey, property: Property) -> bool {
        let mut state = self.0.state.lock();
        if state.properties.get(&key).is_some_and(Property::is_read_only) {
            return false;
        }
        state.properties.insert(key, property);
        true
    }

    /// Remove an own property, keeping the order of the others. Read-only
    /// properties stay.
    pub fn delete_own(&self, key: &str) -> bool {
        let mut state = self.0.state.lock();
        if state.properties.get(key).is_some_and(Property::is_read_only) {
            return false;
        }
        state.properties.shift_remove(key).is_some()
    }

    /// Acquire the monitor, waiting at most `timeout` if one is given.
    /// Returns `None` on timeout.
    pub fn lock_monitor(&self, timeout: Option<Duration>) -> Option<MonitorGuard<'_>> {
        match timeout {
            Some(limit) => self.0.monitor.try_lock_for(limit),
            None => Some(self.0.monitor.lock()),
        }
    }
}

impl PartialEq for ObjectRef {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for ObjectRef {}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectRef(#{})", self.0.id.0)
    }
}

/// Allocator and prototype-link authority for one context.
pub struct Heap {
    id: HeapId,
    next_object: AtomicU64,
    relink: Mutex<()>,
}

impl Heap {
    pub fn new() -> Self {
        Heap {
            id: HeapId(NEXT_HEAP_ID.fetch_add(1, Ordering::Relaxed)),
            next_object: AtomicU64::new(1),
            relink: Mutex::new(()),
        }
    }

    pub fn id(&self) -> HeapId {
        self.id
    }

    /// Whether `obj` was allocated by this heap.
    pub fn owns(&self, obj: &ObjectRef) -> bool {
        obj.heap_id() == self.id
    }

    pub fn owns_array(&self, array: &ArrayRef) -> bool {
        array.heap_id() == self.id
    }

    /// Number of objects and arrays allocated so far.
    pub fn allocated(&self) -> u64 {
        self.next_object.load(Ordering::Relaxed) - 1
    }

    pub fn alloc(&self, prototype: Option<ObjectRef>) -> ObjectRef {
        self.alloc_cell(prototype, None)
    }

    /// Allocate an object carrying an immutable host payload.
    pub fn alloc_with_host(&self, prototype: Option<ObjectRef>, host: HostData) -> ObjectRef {
        self.alloc_cell(prototype, Some(host))
    }

    pub fn alloc_array(&self, elements: Vec<Value>) -> ArrayRef {
        ArrayRef(Arc::new(ArrayCell {
            id: self.next_id(),
            heap: self.id,
            elements: Mutex::new(elements),
        }))
    }

    fn next_id(&self) -> ObjectId {
        ObjectId(self.next_object.fetch_add(1, Ordering::Relaxed))
    }

    fn alloc_cell(&self, prototype: Option<ObjectRef>, host: Option<HostData>) -> ObjectRef {
        let id = self.next_id();
        ObjectRef(Arc::new(ObjectCell {
            id,
            heap: self.id,
            state: Mutex::new(ObjectState {
                properties: PropertyMap::default(),
                prototype,
            }),
            monitor: ReentrantMutex::new(()),
            host,
        }))
    }

    /// Relink `obj`'s prototype.
    ///
    /// Fails if `prototype` is `obj` or reaches `obj` through its own
    /// chain.
    pub fn set_prototype(
        &self,
        obj: &ObjectRef,
        prototype: Option<ObjectRef>,
    ) -> Result<(), CyclicPrototypeError> {
        let _relink = self.relink.lock();

        let mut current = prototype.clone();
        while let Some(link) = current {
            if link.ptr_eq(obj) {
                tracing::debug!(object = obj.id().raw(), "rejected cyclic prototype");
                return Err(CyclicPrototypeError);
            }
            current = link.prototype();
        }

        tracing::trace!(
            object = obj.id().raw(),
            prototype = prototype.as_ref().map(|p| p.id().raw()),
            "relinked prototype"
        );
        obj.0.state.lock().prototype = prototype;
        Ok(())
    }
}

impl Default for Heap {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Heap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Heap")
            .field("id", &self.id.0)
            .field("allocated", &self.allocated())
            .finish()
    }
}
