//! Internal contract failures of the iteration-scope operator.
//!
//! None of these surface as language-level exceptions. Each indicates a
//! defect in scope analysis or in the loop-execution code calling the
//! operator.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::schema::SchemaError;

/// Which argument of an operation a failure refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordRole {
    Source,
    Destination,
}

impl fmt::Display for RecordRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Source => f.write_str("source"),
            Self::Destination => f.write_str("destination"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
pub enum IterationScopeError {
    #[error("accessor arity mismatch: {reads} reads vs {writes} writes")]
    ArityMismatch { reads: usize, writes: usize },
    #[error("schema has {schema_slots} slots but {accessors} accessor pairs were supplied")]
    SchemaLengthMismatch { schema_slots: usize, accessors: usize },
    #[error(
        "accessor pair at position {position} targets slots read={read_index} write={write_index}"
    )]
    AccessorMisaligned {
        position: usize,
        read_index: usize,
        write_index: usize,
    },
    #[error("schema has {slots} slots, above the configured limit of {max_slots}")]
    SchemaTooLarge { slots: usize, max_slots: usize },
    #[error(
        "parent link diverged: destination holds {destination_parent}, source holds {source_parent}"
    )]
    ParentLinkDiverged {
        destination_parent: String,
        source_parent: String,
    },
    #[error("{role} record does not conform to schema {expected_hash} ({found_slots} slots)")]
    NonConformantRecord {
        role: RecordRole,
        expected_hash: String,
        found_slots: usize,
    },
    #[error("slot {index} missing from record")]
    MissingSlot { index: usize },
    #[error("binding '{name}' is not part of this scope")]
    UnknownBinding { name: String },
    #[error("scope record is already borrowed")]
    RecordBusy,
    #[error(transparent)]
    Schema(#[from] SchemaError),
}

impl IterationScopeError {
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::ArityMismatch { .. } => "FE-ITER-0001",
            Self::SchemaLengthMismatch { .. } => "FE-ITER-0002",
            Self::AccessorMisaligned { .. } => "FE-ITER-0003",
            Self::SchemaTooLarge { .. } => "FE-ITER-0004",
            Self::ParentLinkDiverged { .. } => "FE-ITER-0005",
            Self::NonConformantRecord { .. } => "FE-ITER-0006",
            Self::MissingSlot { .. } => "FE-ITER-0007",
            Self::UnknownBinding { .. } => "FE-ITER-0008",
            Self::RecordBusy => "FE-ITER-0009",
            Self::Schema(inner) => inner.error_code(),
        }
    }

    /// Failures detected while building an operator, as opposed to while
    /// running one.
    pub fn is_construction_failure(&self) -> bool {
        matches!(
            self,
            Self::ArityMismatch { .. }
                | Self::SchemaLengthMismatch { .. }
                | Self::AccessorMisaligned { .. }
                | Self::SchemaTooLarge { .. }
                | Self::Schema(_)
        )
    }
}
