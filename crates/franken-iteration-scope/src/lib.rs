#![forbid(unsafe_code)]

//! Per-iteration lexical environments for `for (let ...; ...; ...)` loops.
//!
//! Scope analysis hands this crate a [`ScopeSchema`] and matched slot
//! accessors for each loop-header scope; the loop executor calls the
//! resulting [`IterationScope`] at every iteration boundary.

pub mod accessor;
pub mod config;
pub mod error;
pub mod events;
pub mod iteration_scope;
pub mod record;
pub mod schema;
pub mod value;

pub use accessor::{ReadSlot, SlotAccessors, ValueProfile, WriteSlot};
pub use config::{ConfigError, IterationScopeConfig, ParentLinkCheck};
pub use error::{IterationScopeError, RecordRole};
pub use events::{IterationScopeContext, IterationScopeEvent};
pub use iteration_scope::IterationScope;
pub use record::{Arguments, RecordSnapshot, ScopeRecord, ScopeRef, SlotSnapshot};
pub use schema::{BindingId, PARENT_SLOT, ScopeSchema, SchemaError, SlotDescriptor, SlotKind};
pub use value::{ClosureHandle, ObjectHandle, ScopeValue, ValueKind};
