//! Runtime values held in scope record slots.
//!
//! Values are dynamically typed. Primitive values are copied by value;
//! object, closure, and scope references are copied by reference, so two
//! slots holding the same [`ScopeValue::Scope`] alias one record.

use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::record::ScopeRef;

// ---------------------------------------------------------------------------
// Handles
// ---------------------------------------------------------------------------

/// Opaque handle to an object on the host heap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObjectHandle(pub u64);

/// Opaque handle to a closure owned by the host closure store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ClosureHandle(pub u32);

// ---------------------------------------------------------------------------
// ScopeValue
// ---------------------------------------------------------------------------

/// Value stored in a scope record slot.
///
/// Numbers use the engine's fixed-point millionths convention
/// (`1_000_000` = 1.0).
#[derive(Debug, Clone)]
pub enum ScopeValue {
    /// JavaScript `undefined`.
    Undefined,
    /// JavaScript `null`.
    Null,
    Bool(bool),
    /// Fixed-point millionths integer.
    Number(i64),
    /// Immutable string, shared between copies.
    Str(Rc<str>),
    ObjectRef(ObjectHandle),
    ClosureRef(ClosureHandle),
    /// Reference to another scope record; slot 0 of every record holds one.
    Scope(ScopeRef),
    /// Temporal Dead Zone sentinel for a binding not yet initialized.
    Tdz,
}

impl ScopeValue {
    /// Convenience constructor for whole numbers.
    pub fn int(n: i64) -> Self {
        Self::Number(n.saturating_mul(1_000_000))
    }

    pub fn str(s: &str) -> Self {
        Self::Str(Rc::from(s))
    }

    pub fn as_scope(&self) -> Option<&ScopeRef> {
        match self {
            Self::Scope(scope) => Some(scope),
            _ => None,
        }
    }

    pub fn kind(&self) -> ValueKind {
        match self {
            Self::Undefined | Self::Null => ValueKind::Nullish,
            Self::Bool(_) => ValueKind::Boolean,
            Self::Number(_) => ValueKind::Number,
            Self::Str(_) => ValueKind::String,
            Self::ObjectRef(_) | Self::ClosureRef(_) | Self::Scope(_) => ValueKind::Reference,
            Self::Tdz => ValueKind::Uninitialized,
        }
    }
}

/// Scope references compare by record identity, never by content.
impl PartialEq for ScopeValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Undefined, Self::Undefined)
            | (Self::Null, Self::Null)
            | (Self::Tdz, Self::Tdz) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Number(a), Self::Number(b)) => a == b,
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::ObjectRef(a), Self::ObjectRef(b)) => a == b,
            (Self::ClosureRef(a), Self::ClosureRef(b)) => a == b,
            (Self::Scope(a), Self::Scope(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl Eq for ScopeValue {}

impl fmt::Display for ScopeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Undefined => f.write_str("undefined"),
            Self::Null => f.write_str("null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Number(n) => write!(f, "{n}"),
            Self::Str(s) => write!(f, "\"{s}\""),
            Self::ObjectRef(h) => write!(f, "ObjectRef({})", h.0),
            Self::ClosureRef(h) => write!(f, "ClosureRef({})", h.0),
            Self::Scope(scope) => write!(f, "Scope({:p})", scope.as_ptr()),
            Self::Tdz => f.write_str("<TDZ>"),
        }
    }
}

// ---------------------------------------------------------------------------
// ValueKind
// ---------------------------------------------------------------------------

/// Coarse classification of a value, used by accessor value profiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueKind {
    Nullish,
    Boolean,
    Number,
    String,
    Reference,
    Uninitialized,
}
