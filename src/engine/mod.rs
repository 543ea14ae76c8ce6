//! The native rendering engine boundary.
//!
//! Everything this crate knows about the host document goes through the
//! [`NativeEngine`] trait: creating and placing container elements, walking the
//! host area for marker comments, and reading or mutating the rule list the
//! engine materializes for each container.
//!
//! Handles ([`NodeId`], [`CssRuleId`]) are opaque to the crate. The engine
//! decides what they point at and when they stop being valid; a stale handle
//! must produce an [`EngineError`] rather than a panic.
//!
//! [`MemoryDocument`] is an in-process implementation used by the tests and by
//! headless callers that only need the serialized text.

pub(crate) mod css_text;
mod memory;

pub use memory::{EngineQuirks, MemoryDocument};

use crate::error::EngineError;

/// Handle to a node in the host document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

/// Handle to a rule materialized by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CssRuleId(pub usize);

/// Owner of a native rule list: a container's sheet, or a grouping rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuleParent {
    Sheet(NodeId),
    Rule(CssRuleId),
}

/// What kind of rule the engine materialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CssRuleKind {
    /// A plain style rule with selector text.
    Style,
    /// An `@keyframes` block.
    Keyframes,
    /// A grouping rule such as `@media` or `@supports`.
    Grouping,
    /// Anything else (`@import`, keyframe steps, `@font-face`, ...).
    Other,
}

/// Capabilities the crate needs from a native rendering engine.
pub trait NativeEngine {
    /// The designated host area (the document head), if the document has one.
    fn host_area(&self) -> Option<NodeId>;

    /// Creates a detached, empty style container element.
    fn create_container(&mut self) -> NodeId;

    fn set_attribute(&mut self, node: NodeId, name: &str, value: &str);

    fn attribute(&self, node: NodeId, name: &str) -> Option<String>;

    fn parent_node(&self, node: NodeId) -> Option<NodeId>;

    fn next_sibling(&self, node: NodeId) -> Option<NodeId>;

    fn child_nodes(&self, node: NodeId) -> Vec<NodeId>;

    /// Text of a comment-like marker node; `None` for every other node kind.
    fn comment_text(&self, node: NodeId) -> Option<String>;

    /// Inserts `node` under `parent` before `reference`, or at the end when
    /// `reference` is `None`. A node that already has a parent is moved.
    fn insert_before(&mut self, parent: NodeId, node: NodeId, reference: Option<NodeId>);

    fn remove_child(&mut self, parent: NodeId, node: NodeId);

    /// Replaces the container's entire text content.
    fn set_text_content(&mut self, node: NodeId, text: &str);

    fn text_content(&self, node: NodeId) -> String;

    /// The live native rule list of a container sheet or grouping rule.
    fn css_rules(&self, parent: RuleParent) -> Result<Vec<CssRuleId>, EngineError>;

    fn rule_kind(&self, rule: CssRuleId) -> Result<CssRuleKind, EngineError>;

    /// Structured name of a keyframes rule. Engines may not expose it.
    fn keyframes_name(&self, rule: CssRuleId) -> Option<String>;

    fn selector_text(&self, rule: CssRuleId) -> Option<String>;

    /// Rewrites a rule's selector. Engines may silently ignore the write.
    fn set_selector_text(&mut self, rule: CssRuleId, selector: &str);

    /// The engine's own serialization of the rule.
    fn css_text(&self, rule: CssRuleId) -> Result<String, EngineError>;

    fn property_value(&self, rule: CssRuleId, property: &str) -> Result<String, EngineError>;

    fn set_property(
        &mut self,
        rule: CssRuleId,
        property: &str,
        value: &str,
        important: bool,
    ) -> Result<(), EngineError>;

    fn remove_property(&mut self, rule: CssRuleId, property: &str) -> Result<(), EngineError>;

    /// Parses `text` as exactly one rule and inserts it at `index`.
    fn insert_rule(
        &mut self,
        parent: RuleParent,
        text: &str,
        index: usize,
    ) -> Result<CssRuleId, EngineError>;

    fn delete_rule(&mut self, parent: RuleParent, index: usize) -> Result<(), EngineError>;
}
