//! Error and warning types.
//!
//! Errors returned by a [`NativeEngine`](crate::engine::NativeEngine) never
//! escape the [`StyleContainer`](crate::renderer::StyleContainer): the adapter
//! turns them into boolean results or [`Warning`]s. Only configuration loading
//! and declaration building surface errors to callers.

use std::path::PathBuf;

use thiserror::Error;

use crate::engine::NodeId;

/// Failure reported by a native engine call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// The engine refused a property name or value.
    #[error("unsupported property \"{property}\"")]
    UnsupportedProperty { property: String },

    /// The engine could not parse the rule text handed to `insert_rule`.
    #[error("failed to parse rule \"{text}\": {reason}")]
    UnsupportedRuleText { text: String, reason: String },

    /// A rule index was outside the native rule list.
    #[error("index {index} is out of range for a rule list of length {len}")]
    IndexOutOfRange { index: usize, len: usize },

    /// The node has no materialized rule list (not a container, or not connected).
    #[error("node {node:?} has no style sheet")]
    NoStyleSheet { node: NodeId },

    /// The rule handle does not refer to a live native rule.
    #[error("unknown native rule")]
    UnknownRule,
}

/// Error returned when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config \"{}\": {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Error returned when style data cannot be turned into a declaration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeclarationError {
    /// The value at `path` has a kind that has no CSS text form.
    #[error("unsupported value at \"{path}\": {kind}")]
    UnsupportedValue { path: String, kind: &'static str },
}

/// Category of a non-fatal [`Warning`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WarningKind {
    /// A named insertion marker was not found in the host area.
    InsertionPointNotFound,
    /// A node insertion point has no parent.
    InsertionPointDetached,
    /// The engine rejected rule text on insertion.
    UnsupportedRuleText,
    /// The engine refused to remove a property.
    RemovePropertyFailed,
    /// A declaration could not be turned into any rule kind.
    UnknownRule,
    /// The document has no host area to place containers in.
    NoHostArea,
}

/// A locally absorbed failure, kept for inspection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Warning {
    pub kind: WarningKind,
    pub message: String,
}

impl Warning {
    pub fn new(kind: WarningKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

/// Log of warnings absorbed by a context.
///
/// Every warning is also emitted through `tracing::warn!`.
#[derive(Debug, Clone, Default)]
pub struct Warnings {
    entries: Vec<Warning>,
}

impl Warnings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emit(&mut self, kind: WarningKind, message: impl Into<String>) {
        let warning = Warning::new(kind, message);
        tracing::warn!(kind = ?warning.kind, "{}", warning.message);
        self.entries.push(warning);
    }

    pub fn as_slice(&self) -> &[Warning] {
        &self.entries
    }

    /// Drains the log.
    pub fn take(&mut self) -> Vec<Warning> {
        std::mem::take(&mut self.entries)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_property_display() {
        let err = EngineError::UnsupportedProperty {
            property: "colr".to_string(),
        };
        assert_eq!(err.to_string(), "unsupported property \"colr\"");
    }

    #[test]
    fn test_rule_text_display_includes_reason() {
        let err = EngineError::UnsupportedRuleText {
            text: "a {".to_string(),
            reason: "unbalanced block".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("a {"));
        assert!(msg.contains("unbalanced block"));
    }

    #[test]
    fn test_warning_display() {
        let warning = Warning::new(WarningKind::InsertionPointNotFound, "missing \"x\"");
        assert_eq!(warning.to_string(), "InsertionPointNotFound: missing \"x\"");
    }

    #[test]
    fn test_warnings_take_drains() {
        let mut warnings = Warnings::new();
        warnings.emit(WarningKind::NoHostArea, "no head");
        assert_eq!(warnings.len(), 1);
        let taken = warnings.take();
        assert_eq!(taken[0].kind, WarningKind::NoHostArea);
        assert!(warnings.is_empty());
    }
}
