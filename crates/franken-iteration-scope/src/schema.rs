//! Slot layout of a loop-header scope.
//!
//! A [`ScopeSchema`] is produced once by scope analysis and shared read-only
//! by every iteration of the loop it describes. Slot 0 is always the link to
//! the enclosing scope; slots `1..n` hold the bindings declared in the loop
//! header.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Index of the parent-scope link in every scope record.
pub const PARENT_SLOT: usize = 0;

/// Unique binding id assigned by scope resolution.
pub type BindingId = u32;

/// What a slot stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotKind {
    /// Reference to the enclosing scope record.
    ParentLink,
    Let,
    Const,
}

/// One slot of a scope schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotDescriptor {
    /// Human-readable name (for diagnostics).
    pub name: String,
    /// Binding id from scope resolution; `None` for the parent link.
    pub binding_id: Option<BindingId>,
    pub kind: SlotKind,
}

impl SlotDescriptor {
    pub fn parent_link() -> Self {
        Self {
            name: "<parent>".to_string(),
            binding_id: None,
            kind: SlotKind::ParentLink,
        }
    }

    pub fn binding(name: impl Into<String>, binding_id: BindingId, kind: SlotKind) -> Self {
        Self {
            name: name.into(),
            binding_id: Some(binding_id),
            kind,
        }
    }
}

// ---------------------------------------------------------------------------
// SchemaError
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
pub enum SchemaError {
    #[error("scope schema has no slots")]
    Empty,
    #[error("slot 0 must be the parent link, found {found:?} '{name}'")]
    MissingParentLink { name: String, found: SlotKind },
    #[error("parent link declared at slot {index}; only slot 0 may hold it")]
    MisplacedParentLink { index: usize },
    #[error("binding '{name}' declared twice in one loop header")]
    DuplicateBinding { name: String },
}

impl SchemaError {
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Empty => "FE-ITER-0101",
            Self::MissingParentLink { .. } => "FE-ITER-0102",
            Self::MisplacedParentLink { .. } => "FE-ITER-0103",
            Self::DuplicateBinding { .. } => "FE-ITER-0104",
        }
    }
}

// ---------------------------------------------------------------------------
// ScopeSchema
// ---------------------------------------------------------------------------

/// Immutable, validated slot layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<SlotDescriptor>", into = "Vec<SlotDescriptor>")]
pub struct ScopeSchema {
    slots: Vec<SlotDescriptor>,
    content_hash: String,
}

impl ScopeSchema {
    /// Validate a full slot list, including the parent link at slot 0.
    pub fn new(slots: Vec<SlotDescriptor>) -> Result<Self, SchemaError> {
        let first = slots.first().ok_or(SchemaError::Empty)?;
        if first.kind != SlotKind::ParentLink {
            return Err(SchemaError::MissingParentLink {
                name: first.name.clone(),
                found: first.kind,
            });
        }
        let mut seen = BTreeSet::new();
        for (index, slot) in slots.iter().enumerate().skip(1) {
            if slot.kind == SlotKind::ParentLink {
                return Err(SchemaError::MisplacedParentLink { index });
            }
            if !seen.insert(slot.name.as_str()) {
                return Err(SchemaError::DuplicateBinding {
                    name: slot.name.clone(),
                });
            }
        }
        let content_hash = hash_slots(&slots);
        Ok(Self {
            slots,
            content_hash,
        })
    }

    /// Build the schema for a loop header from its declared bindings; the
    /// parent link is prepended.
    pub fn loop_header<I, S>(bindings: I) -> Result<Self, SchemaError>
    where
        I: IntoIterator<Item = (S, BindingId, SlotKind)>,
        S: Into<String>,
    {
        let mut slots = vec![SlotDescriptor::parent_link()];
        slots.extend(
            bindings
                .into_iter()
                .map(|(name, id, kind)| SlotDescriptor::binding(name, id, kind)),
        );
        Self::new(slots)
    }

    /// Number of slots, parent link included.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Always false; a valid schema holds at least the parent link.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn slot(&self, index: usize) -> Option<&SlotDescriptor> {
        self.slots.get(index)
    }

    pub fn slots(&self) -> &[SlotDescriptor] {
        &self.slots
    }

    /// Slots declared by the loop header (everything after the parent link).
    pub fn bindings(&self) -> &[SlotDescriptor] {
        &self.slots[PARENT_SLOT + 1..]
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.slots
            .iter()
            .enumerate()
            .skip(1)
            .find(|(_, slot)| slot.name == name)
            .map(|(index, _)| index)
    }

    /// `sha256:<hex>` over a length-prefixed binary encoding of the slot
    /// list: per slot a kind byte, the big-endian binding id (`u64::MAX` for
    /// the parent link), then the name length and name bytes.
    pub fn content_hash(&self) -> &str {
        &self.content_hash
    }
}

impl TryFrom<Vec<SlotDescriptor>> for ScopeSchema {
    type Error = SchemaError;

    fn try_from(slots: Vec<SlotDescriptor>) -> Result<Self, Self::Error> {
        Self::new(slots)
    }
}

impl From<ScopeSchema> for Vec<SlotDescriptor> {
    fn from(schema: ScopeSchema) -> Self {
        schema.slots
    }
}

fn hash_slots(slots: &[SlotDescriptor]) -> String {
    let mut hasher = Sha256::new();
    for slot in slots {
        let kind = match slot.kind {
            SlotKind::ParentLink => 0u8,
            SlotKind::Let => 1,
            SlotKind::Const => 2,
        };
        hasher.update([kind]);
        hasher.update(slot.binding_id.map_or(u64::MAX, u64::from).to_be_bytes());
        hasher.update((slot.name.len() as u64).to_be_bytes());
        hasher.update(slot.name.as_bytes());
    }
    format!("sha256:{}", hex::encode(hasher.finalize()))
}
