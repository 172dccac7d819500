//! Scope records and shared record handles.
//!
//! A record is shared between the loop machinery, which treats it as the
//! live iteration environment, and every closure created while it was live.
//! Closures may outlive the loop, so records are reference counted
//! ([`ScopeRef`]) rather than owned by a per-activation arena.

use std::cell::{Ref, RefCell, RefMut};
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::IterationScopeError;
use crate::schema::{PARENT_SLOT, ScopeSchema, SlotKind};
use crate::value::ScopeValue;

/// Arguments of the function activation a record belongs to. Shared by
/// reference between all iteration records of one activation.
pub type Arguments = Rc<[ScopeValue]>;

// ---------------------------------------------------------------------------
// ScopeRecord
// ---------------------------------------------------------------------------

/// Slot storage for one scope, laid out by its [`ScopeSchema`].
#[derive(Debug, Clone)]
pub struct ScopeRecord {
    schema: Arc<ScopeSchema>,
    slots: Vec<ScopeValue>,
    arguments: Arguments,
}

impl ScopeRecord {
    /// Allocate a record with `parent` in slot 0 and every binding in the
    /// TDZ.
    pub fn new(schema: Arc<ScopeSchema>, parent: ScopeValue, arguments: Arguments) -> Self {
        let mut slots = Vec::with_capacity(schema.len());
        slots.push(parent);
        slots.resize(schema.len(), ScopeValue::Tdz);
        Self {
            schema,
            slots,
            arguments,
        }
    }

    pub fn schema(&self) -> &Arc<ScopeSchema> {
        &self.schema
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn arguments(&self) -> &Arguments {
        &self.arguments
    }

    pub fn parent(&self) -> Option<&ScopeValue> {
        self.slots.get(PARENT_SLOT)
    }

    pub fn get(&self, index: usize) -> Option<&ScopeValue> {
        self.slots.get(index)
    }

    pub fn slot_mut(&mut self, index: usize) -> Option<&mut ScopeValue> {
        self.slots.get_mut(index)
    }

    pub fn get_by_name(&self, name: &str) -> Option<&ScopeValue> {
        self.schema.index_of(name).and_then(|index| self.slots.get(index))
    }

    /// Whether this record was laid out by `schema` (same instance or same
    /// content hash) and carries exactly one value per slot.
    pub fn conforms_to(&self, schema: &Arc<ScopeSchema>) -> bool {
        let same_layout = Arc::ptr_eq(&self.schema, schema)
            || self.schema.content_hash() == schema.content_hash();
        same_layout && self.slots.len() == schema.len()
    }

    pub fn snapshot(&self) -> RecordSnapshot {
        let slots = self
            .schema
            .slots()
            .iter()
            .zip(&self.slots)
            .map(|(descriptor, value)| SlotSnapshot {
                name: descriptor.name.clone(),
                kind: descriptor.kind,
                value: value.to_string(),
            })
            .collect();
        RecordSnapshot {
            schema_hash: self.schema.content_hash().to_string(),
            argument_count: self.arguments.len(),
            slots,
        }
    }
}

// ---------------------------------------------------------------------------
// Snapshots
// ---------------------------------------------------------------------------

/// Rendered view of a record for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordSnapshot {
    pub schema_hash: String,
    pub argument_count: usize,
    pub slots: Vec<SlotSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotSnapshot {
    pub name: String,
    pub kind: SlotKind,
    pub value: String,
}

// ---------------------------------------------------------------------------
// ScopeRef
// ---------------------------------------------------------------------------

/// Shared handle to a [`ScopeRecord`]. Cloning the handle aliases the
/// record; equality is identity.
#[derive(Clone)]
pub struct ScopeRef(Rc<RefCell<ScopeRecord>>);

impl ScopeRef {
    pub fn new(record: ScopeRecord) -> Self {
        Self(Rc::new(RefCell::new(record)))
    }

    /// A record with no enclosing scope (`null` in slot 0), e.g. the
    /// function scope a loop runs in.
    pub fn root(schema: Arc<ScopeSchema>) -> Self {
        Self::new(ScopeRecord::new(schema, ScopeValue::Null, Rc::from([])))
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn as_ptr(&self) -> *const () {
        Rc::as_ptr(&self.0).cast()
    }

    /// Number of live handles (loop machinery plus capturing closures).
    pub fn holder_count(&self) -> usize {
        Rc::strong_count(&self.0)
    }

    pub fn borrow(&self) -> Result<Ref<'_, ScopeRecord>, IterationScopeError> {
        self.0
            .try_borrow()
            .map_err(|_| IterationScopeError::RecordBusy)
    }

    pub fn borrow_mut(&self) -> Result<RefMut<'_, ScopeRecord>, IterationScopeError> {
        self.0
            .try_borrow_mut()
            .map_err(|_| IterationScopeError::RecordBusy)
    }

    /// Read a binding by name.
    pub fn get(&self, name: &str) -> Result<ScopeValue, IterationScopeError> {
        let record = self.borrow()?;
        record
            .get_by_name(name)
            .cloned()
            .ok_or_else(|| IterationScopeError::UnknownBinding {
                name: name.to_string(),
            })
    }

    /// Assign a binding by name. The parent link cannot be assigned.
    pub fn set(&self, name: &str, value: ScopeValue) -> Result<(), IterationScopeError> {
        let mut record = self.borrow_mut()?;
        let index = record
            .schema
            .index_of(name)
            .ok_or_else(|| IterationScopeError::UnknownBinding {
                name: name.to_string(),
            })?;
        record.slots[index] = value;
        Ok(())
    }

    /// Clone of slot 0.
    pub fn parent(&self) -> Result<ScopeValue, IterationScopeError> {
        let record = self.borrow()?;
        record
            .parent()
            .cloned()
            .ok_or(IterationScopeError::MissingSlot { index: PARENT_SLOT })
    }

    pub fn snapshot(&self) -> Result<RecordSnapshot, IterationScopeError> {
        Ok(self.borrow()?.snapshot())
    }
}

impl PartialEq for ScopeRef {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for ScopeRef {}

// Parent chains can be long; print identity only.
impl fmt::Debug for ScopeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ScopeRef({:p})", self.as_ptr())
    }
}
