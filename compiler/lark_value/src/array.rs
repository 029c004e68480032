//! Arrays.
//!
//! An array is a growable list of values behind an [`ArrayRef`] handle.
//! Like an object it lives on a context's heap and is shared by handle;
//! unlike an object it has no named properties and no prototype. Its
//! element list is guarded by one short mutex, so single reads, writes
//! and pushes are linearizable.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::object::{HeapId, ObjectId};
use crate::value::Value;

pub(crate) struct ArrayCell {
    pub(crate) id: ObjectId,
    pub(crate) heap: HeapId,
    pub(crate) elements: Mutex<Vec<Value>>,
}

/// Handle to a heap array. Cloning shares the array; equality is
/// identity.
#[derive(Clone)]
pub struct ArrayRef(pub(crate) Arc<ArrayCell>);

impl ArrayRef {
    pub fn id(&self) -> ObjectId {
        self.0.id
    }

    pub fn heap_id(&self) -> HeapId {
        self.0.heap
    }

    #[inline]
    pub fn ptr_eq(&self, other: &ArrayRef) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub fn len(&self) -> usize {
        self.0.elements.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, index: usize) -> Option<Value> {
        self.0.elements.lock().get(index).cloned()
    }

    /// Store at `index`. Writing one past the end appends; anything further
    /// out is refused with the current length.
    pub fn set(&self, index: usize, value: Value) -> Result<(), usize> {
        let mut elements = self.0.elements.lock();
        let len = elements.len();
        match index.cmp(&len) {
            std::cmp::Ordering::Less => {
                elements[index] = value;
                Ok(())
            }
            std::cmp::Ordering::Equal => {
                elements.push(value);
                Ok(())
            }
            std::cmp::Ordering::Greater => Err(len),
        }
    }

    /// Append and return the new length.
    pub fn push(&self, value: Value) -> usize {
        let mut elements = self.0.elements.lock();
        elements.push(value);
        elements.len()
    }

    /// Copy of the elements, as handles.
    pub fn to_vec(&self) -> Vec<Value> {
        self.0.elements.lock().clone()
    }
}

impl PartialEq for ArrayRef {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for ArrayRef {}

impl fmt::Debug for ArrayRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ArrayRef(#{})", self.0.id.raw())
    }
}
