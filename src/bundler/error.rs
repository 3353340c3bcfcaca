//! Build-time error types

use thiserror::Error;

/// Errors that abort a build before any output is written
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    /// The module graph has a dependency cycle, so no partition exists
    #[error("module graph contains a cycle: {}", cycle.join(" -> "))]
    GraphCycle { cycle: Vec<String> },

    /// A cache group or threshold is malformed
    #[error("invalid split rule '{rule}': {reason}")]
    InvalidRule { rule: String, reason: String },

    /// A dependency specifier names a module that is not in the graph
    #[error("module '{from}' depends on unknown module '{specifier}'")]
    UnknownModule { from: String, specifier: String },

    /// The same module id was declared twice
    #[error("module '{0}' is declared more than once")]
    DuplicateModule(String),

    /// An entry points at a module that is not in the graph
    #[error("entry '{name}' points to unknown module '{module}'")]
    UnknownEntry { name: String, module: String },

    /// The same logical asset name was registered twice
    #[error("asset '{0}' is registered more than once")]
    DuplicateAsset(String),

    /// Two assets with different contents would be written to the same file
    #[error("assets '{first}' and '{second}' would both be written to '{file}'")]
    OutputCollision { file: String, first: String, second: String },
}

impl BuildError {
    pub(crate) fn invalid_rule(rule: impl Into<String>, reason: impl Into<String>) -> Self {
        BuildError::InvalidRule {
            rule: rule.into(),
            reason: reason.into(),
        }
    }
}
