//! Slot read/write accessors.
//!
//! Scope analysis emits one read and one write accessor per schema slot,
//! index-aligned with the schema. Each accessor keeps a value profile of
//! what it has moved so far; the profile is specialization state and is
//! reset when an operator is duplicated for another compilation context.

use std::cell::Cell;

use serde::{Deserialize, Serialize};

use crate::error::IterationScopeError;
use crate::record::ScopeRecord;
use crate::schema::ScopeSchema;
use crate::value::{ScopeValue, ValueKind};

// ---------------------------------------------------------------------------
// ValueProfile
// ---------------------------------------------------------------------------

/// Kinds of values an accessor has observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueProfile {
    /// Nothing observed since creation or the last uninitialized clone.
    #[default]
    Uninitialized,
    /// Every observed value had this kind.
    Monomorphic(ValueKind),
    /// More than one kind observed.
    Generic,
}

impl ValueProfile {
    pub fn observe(self, kind: ValueKind) -> Self {
        match self {
            Self::Uninitialized => Self::Monomorphic(kind),
            Self::Monomorphic(seen) if seen == kind => self,
            Self::Monomorphic(_) | Self::Generic => Self::Generic,
        }
    }
}

// ---------------------------------------------------------------------------
// ReadSlot / WriteSlot
// ---------------------------------------------------------------------------

/// Reads one slot of a record.
#[derive(Debug)]
pub struct ReadSlot {
    index: usize,
    profile: Cell<ValueProfile>,
}

impl ReadSlot {
    pub fn new(index: usize) -> Self {
        Self {
            index,
            profile: Cell::new(ValueProfile::Uninitialized),
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn profile(&self) -> ValueProfile {
        self.profile.get()
    }

    pub fn execute(&self, record: &ScopeRecord) -> Result<ScopeValue, IterationScopeError> {
        let value = record
            .get(self.index)
            .cloned()
            .ok_or(IterationScopeError::MissingSlot { index: self.index })?;
        self.profile.set(self.profile.get().observe(value.kind()));
        Ok(value)
    }

    /// Same slot, fresh profile.
    pub fn clone_uninitialized(&self) -> Self {
        Self::new(self.index)
    }
}

/// Writes one slot of a record.
#[derive(Debug)]
pub struct WriteSlot {
    index: usize,
    profile: Cell<ValueProfile>,
}

impl WriteSlot {
    pub fn new(index: usize) -> Self {
        Self {
            index,
            profile: Cell::new(ValueProfile::Uninitialized),
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn profile(&self) -> ValueProfile {
        self.profile.get()
    }

    pub fn execute(
        &self,
        record: &mut ScopeRecord,
        value: ScopeValue,
    ) -> Result<(), IterationScopeError> {
        let slot = record
            .slot_mut(self.index)
            .ok_or(IterationScopeError::MissingSlot { index: self.index })?;
        self.profile.set(self.profile.get().observe(value.kind()));
        *slot = value;
        Ok(())
    }

    pub fn clone_uninitialized(&self) -> Self {
        Self::new(self.index)
    }
}

// ---------------------------------------------------------------------------
// SlotAccessors
// ---------------------------------------------------------------------------

/// Matched read/write accessor lists.
#[derive(Debug)]
pub struct SlotAccessors {
    pub reads: Vec<ReadSlot>,
    pub writes: Vec<WriteSlot>,
}

impl SlotAccessors {
    /// One accessor pair per slot of `schema`, parent link included.
    pub fn for_schema(schema: &ScopeSchema) -> Self {
        Self {
            reads: (0..schema.len()).map(ReadSlot::new).collect(),
            writes: (0..schema.len()).map(WriteSlot::new).collect(),
        }
    }

    pub fn into_parts(self) -> (Vec<ReadSlot>, Vec<WriteSlot>) {
        (self.reads, self.writes)
    }

    pub fn clone_uninitialized(&self) -> Self {
        Self {
            reads: self.reads.iter().map(ReadSlot::clone_uninitialized).collect(),
            writes: self
                .writes
                .iter()
                .map(WriteSlot::clone_uninitialized)
                .collect(),
        }
    }
}
