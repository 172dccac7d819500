//! Operator configuration.

use serde::{Deserialize, Serialize};

/// When `copy_into` verifies that destination and source share one parent
/// link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParentLinkCheck {
    /// Checked only when `debug_assertions` are enabled.
    #[default]
    DebugOnly,
    Always,
    Never,
}

impl ParentLinkCheck {
    pub fn enabled(self) -> bool {
        match self {
            Self::DebugOnly => cfg!(debug_assertions),
            Self::Always => true,
            Self::Never => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IterationScopeConfig {
    pub parent_link_check: ParentLinkCheck,
    /// Emit an event for every materialize/copy, not only for failures.
    /// The log then grows by one entry per iteration until
    /// `IterationScope::drain_events` empties it; drain it on long loops.
    pub trace_copies: bool,
    /// Largest schema accepted at operator construction.
    pub max_slots: usize,
}

impl Default for IterationScopeConfig {
    fn default() -> Self {
        Self {
            parent_link_check: ParentLinkCheck::DebugOnly,
            trace_copies: false,
            max_slots: 1024,
        }
    }
}

impl IterationScopeConfig {
    /// Configuration that checks every precondition and traces every copy.
    pub fn strict() -> Self {
        Self {
            parent_link_check: ParentLinkCheck::Always,
            trace_copies: true,
            ..Self::default()
        }
    }

    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        toml::from_str(input).map_err(|err| ConfigError::Parse {
            detail: err.to_string(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid iteration scope config: {detail}")]
    Parse { detail: String },
}

impl ConfigError {
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Parse { .. } => "FE-ITER-0201",
        }
    }
}
