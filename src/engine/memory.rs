//! In-memory document implementing [`NativeEngine`].
//!
//! The document is a small node tree (`html > head, body`) plus a rule object
//! model. Style containers only carry a rule list while they are connected to
//! the tree, and connecting a container rebuilds its rules from its text
//! content. Rules inserted one by one therefore do not survive a
//! detach/reattach cycle, which is how browser engines behave as well.
//!
//! [`EngineQuirks`] switch on the less cooperative behaviors some engines
//! show: no structured keyframes name, refused properties, ignored selector
//! rewrites.

use std::collections::HashMap;

use super::css_text::{self, ParsedDeclaration, ParsedRule};
use super::{CssRuleId, CssRuleKind, NativeEngine, NodeId, RuleParent};
use crate::error::EngineError;

/// Engine behaviors that can be toggled for testing.
#[derive(Debug, Clone, Default)]
pub struct EngineQuirks {
    /// Do not expose the structured name of keyframes rules.
    pub hide_keyframes_name: bool,
    /// Property names the engine refuses to read or write.
    pub unsupported_properties: Vec<String>,
    /// Selector fragments the engine silently refuses to accept on rewrite.
    pub unsupported_selectors: Vec<String>,
    /// Report no host area, like a document without a head.
    pub no_host_area: bool,
}

#[derive(Debug, Clone)]
enum NodeKind {
    Document,
    Element {
        tag: String,
        attributes: Vec<(String, String)>,
        text: String,
    },
    Comment(String),
}

#[derive(Debug, Clone)]
struct Node {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

#[derive(Debug, Clone)]
struct NativeRule {
    kind: CssRuleKind,
    header: String,
    name: Option<String>,
    declarations: Vec<ParsedDeclaration>,
    children: Vec<CssRuleId>,
    statement: bool,
    alive: bool,
}

/// A document held entirely in memory.
#[derive(Debug, Clone)]
pub struct MemoryDocument {
    nodes: Vec<Node>,
    rules: Vec<NativeRule>,
    sheets: HashMap<NodeId, Vec<CssRuleId>>,
    head: NodeId,
    body: NodeId,
    quirks: EngineQuirks,
}

const ROOT: NodeId = NodeId(0);

impl MemoryDocument {
    /// Creates a document with an empty head and body.
    pub fn new() -> Self {
        Self::with_quirks(EngineQuirks::default())
    }

    pub fn with_quirks(quirks: EngineQuirks) -> Self {
        let mut doc = Self {
            nodes: vec![Node {
                kind: NodeKind::Document,
                parent: None,
                children: Vec::new(),
            }],
            rules: Vec::new(),
            sheets: HashMap::new(),
            head: ROOT,
            body: ROOT,
            quirks,
        };
        let html = doc.create_element("html");
        doc.insert_before(ROOT, html, None);
        let head = doc.create_element("head");
        doc.insert_before(html, head, None);
        let body = doc.create_element("body");
        doc.insert_before(html, body, None);
        doc.head = head;
        doc.body = body;
        doc
    }

    pub fn quirks_mut(&mut self) -> &mut EngineQuirks {
        &mut self.quirks
    }

    pub fn head(&self) -> NodeId {
        self.head
    }

    pub fn body(&self) -> NodeId {
        self.body
    }

    /// Creates a detached element.
    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.alloc(NodeKind::Element {
            tag: tag.to_ascii_lowercase(),
            attributes: Vec::new(),
            text: String::new(),
        })
    }

    /// Creates a detached comment node.
    pub fn create_comment(&mut self, text: &str) -> NodeId {
        self.alloc(NodeKind::Comment(text.to_string()))
    }

    /// Appends a comment to `parent` and returns it.
    pub fn append_comment(&mut self, parent: NodeId, text: &str) -> NodeId {
        let comment = self.create_comment(text);
        self.insert_before(parent, comment, None);
        comment
    }

    /// Element tag name, or `None` for non-element nodes.
    pub fn tag_name(&self, node: NodeId) -> Option<&str> {
        match &self.nodes.get(node.0)?.kind {
            NodeKind::Element { tag, .. } => Some(tag),
            _ => None,
        }
    }

    pub fn is_connected(&self, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ROOT {
                return true;
            }
            current = self.nodes.get(id.0).and_then(|n| n.parent);
        }
        false
    }

    /// The engine's serialization of every rule a container materialized,
    /// one rule per line. Empty when the container is not connected.
    pub fn materialized_text(&self, node: NodeId) -> String {
        self.sheets
            .get(&node)
            .map(|rules| {
                rules
                    .iter()
                    .map(|id| self.serialize_rule(*id))
                    .collect::<Vec<_>>()
                    .join("\n")
            })
            .unwrap_or_default()
    }

    fn alloc(&mut self, kind: NodeKind) -> NodeId {
        self.nodes.push(Node {
            kind,
            parent: None,
            children: Vec::new(),
        });
        NodeId(self.nodes.len() - 1)
    }

    fn is_container(&self, node: NodeId) -> bool {
        self.tag_name(node) == Some("style")
    }

    fn subtree(&self, node: NodeId) -> Vec<NodeId> {
        let mut out = vec![node];
        let mut i = 0;
        while i < out.len() {
            if let Some(n) = self.nodes.get(out[i].0) {
                out.extend(n.children.iter().copied());
            }
            i += 1;
        }
        out
    }

    fn connect_sheets(&mut self, node: NodeId) {
        for id in self.subtree(node) {
            if self.is_container(id) {
                self.rebuild_sheet(id);
            }
        }
    }

    fn disconnect_sheets(&mut self, node: NodeId) {
        for id in self.subtree(node) {
            if let Some(rules) = self.sheets.remove(&id) {
                for rule in rules {
                    self.kill_rule(rule);
                }
            }
        }
    }

    /// Rebuilds a connected container's rules from its text. Rules the text
    /// does not parse into are dropped, as engines do.
    fn rebuild_sheet(&mut self, node: NodeId) {
        if let Some(old) = self.sheets.remove(&node) {
            for rule in old {
                self.kill_rule(rule);
            }
        }
        let text = self.text_content(node);
        let parsed = css_text::parse_rule_list(&text).unwrap_or_default();
        let ids = parsed.into_iter().map(|rule| self.materialize(rule)).collect();
        self.sheets.insert(node, ids);
    }

    fn materialize(&mut self, parsed: ParsedRule) -> CssRuleId {
        let children = parsed
            .children
            .into_iter()
            .map(|child| self.materialize(child))
            .collect();
        self.rules.push(NativeRule {
            kind: parsed.kind,
            header: parsed.header,
            name: parsed.name,
            declarations: parsed.declarations,
            children,
            statement: parsed.statement,
            alive: true,
        });
        CssRuleId(self.rules.len() - 1)
    }

    fn kill_rule(&mut self, rule: CssRuleId) {
        let children = match self.rules.get_mut(rule.0) {
            Some(r) => {
                r.alive = false;
                std::mem::take(&mut r.children)
            }
            None => return,
        };
        for child in children {
            self.kill_rule(child);
        }
    }

    fn rule(&self, rule: CssRuleId) -> Result<&NativeRule, EngineError> {
        match self.rules.get(rule.0) {
            Some(r) if r.alive => Ok(r),
            _ => Err(EngineError::UnknownRule),
        }
    }

    fn rule_mut(&mut self, rule: CssRuleId) -> Result<&mut NativeRule, EngineError> {
        match self.rules.get_mut(rule.0) {
            Some(r) if r.alive => Ok(r),
            _ => Err(EngineError::UnknownRule),
        }
    }

    fn list(&self, parent: RuleParent) -> Result<&Vec<CssRuleId>, EngineError> {
        match parent {
            RuleParent::Sheet(node) => self
                .sheets
                .get(&node)
                .ok_or(EngineError::NoStyleSheet { node }),
            RuleParent::Rule(rule) => {
                let r = self.rule(rule)?;
                match r.kind {
                    CssRuleKind::Keyframes | CssRuleKind::Grouping => Ok(&r.children),
                    _ => Err(EngineError::UnknownRule),
                }
            }
        }
    }

    fn list_mut(&mut self, parent: RuleParent) -> Result<&mut Vec<CssRuleId>, EngineError> {
        match parent {
            RuleParent::Sheet(node) => self
                .sheets
                .get_mut(&node)
                .ok_or(EngineError::NoStyleSheet { node }),
            RuleParent::Rule(rule) => {
                let r = self.rule_mut(rule)?;
                match r.kind {
                    CssRuleKind::Keyframes | CssRuleKind::Grouping => Ok(&mut r.children),
                    _ => Err(EngineError::UnknownRule),
                }
            }
        }
    }

    fn check_property(&self, property: &str) -> Result<(), EngineError> {
        let valid = !property.is_empty()
            && property
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-')
            && !self
                .quirks
                .unsupported_properties
                .iter()
                .any(|p| p == property);
        if valid {
            Ok(())
        } else {
            Err(EngineError::UnsupportedProperty {
                property: property.to_string(),
            })
        }
    }

    fn serialize_rule(&self, id: CssRuleId) -> String {
        let Some(rule) = self.rules.get(id.0) else {
            return String::new();
        };
        if rule.statement {
            return rule.header.clone();
        }
        match rule.kind {
            CssRuleKind::Keyframes | CssRuleKind::Grouping => {
                let children = rule
                    .children
                    .iter()
                    .map(|c| self.serialize_rule(*c))
                    .collect::<Vec<_>>();
                if children.is_empty() {
                    format!("{} {{ }}", rule.header)
                } else {
                    format!("{} {{ {} }}", rule.header, children.join(" "))
                }
            }
            CssRuleKind::Style | CssRuleKind::Other => {
                let body = rule
                    .declarations
                    .iter()
                    .map(|d| {
                        if d.important {
                            format!("{}: {} !important;", d.name, d.value)
                        } else {
                            format!("{}: {};", d.name, d.value)
                        }
                    })
                    .collect::<Vec<_>>();
                if body.is_empty() {
                    format!("{} {{ }}", rule.header)
                } else {
                    format!("{} {{ {} }}", rule.header, body.join(" "))
                }
            }
        }
    }
}

impl Default for MemoryDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl NativeEngine for MemoryDocument {
    fn host_area(&self) -> Option<NodeId> {
        (!self.quirks.no_host_area).then_some(self.head)
    }

    fn create_container(&mut self) -> NodeId {
        self.create_element("style")
    }

    fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) {
        if let Some(Node {
            kind: NodeKind::Element { attributes, .. },
            ..
        }) = self.nodes.get_mut(node.0)
        {
            match attributes.iter_mut().find(|(n, _)| n == name) {
                Some(attr) => attr.1 = value.to_string(),
                None => attributes.push((name.to_string(), value.to_string())),
            }
        }
    }

    fn attribute(&self, node: NodeId, name: &str) -> Option<String> {
        match &self.nodes.get(node.0)?.kind {
            NodeKind::Element { attributes, .. } => attributes
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, v)| v.clone()),
            _ => None,
        }
    }

    fn parent_node(&self, node: NodeId) -> Option<NodeId> {
        self.nodes.get(node.0)?.parent
    }

    fn next_sibling(&self, node: NodeId) -> Option<NodeId> {
        let parent = self.parent_node(node)?;
        let siblings = &self.nodes[parent.0].children;
        let pos = siblings.iter().position(|c| *c == node)?;
        siblings.get(pos + 1).copied()
    }

    fn child_nodes(&self, node: NodeId) -> Vec<NodeId> {
        self.nodes
            .get(node.0)
            .map(|n| n.children.clone())
            .unwrap_or_default()
    }

    fn comment_text(&self, node: NodeId) -> Option<String> {
        match &self.nodes.get(node.0)?.kind {
            NodeKind::Comment(text) => Some(text.clone()),
            _ => None,
        }
    }

    fn insert_before(&mut self, parent: NodeId, node: NodeId, reference: Option<NodeId>) {
        if parent.0 >= self.nodes.len() || node.0 >= self.nodes.len() || parent == node {
            return;
        }
        if let Some(old_parent) = self.parent_node(node) {
            self.remove_child(old_parent, node);
        }
        let children = &mut self.nodes[parent.0].children;
        let pos = reference
            .and_then(|r| children.iter().position(|c| *c == r))
            .unwrap_or(children.len());
        children.insert(pos, node);
        self.nodes[node.0].parent = Some(parent);
        if self.is_connected(node) {
            self.connect_sheets(node);
        }
    }

    fn remove_child(&mut self, parent: NodeId, node: NodeId) {
        if self.parent_node(node) != Some(parent) {
            return;
        }
        let was_connected = self.is_connected(node);
        self.nodes[parent.0].children.retain(|c| *c != node);
        self.nodes[node.0].parent = None;
        if was_connected {
            self.disconnect_sheets(node);
        }
    }

    fn set_text_content(&mut self, node: NodeId, value: &str) {
        let changed = match self.nodes.get_mut(node.0) {
            Some(Node {
                kind: NodeKind::Element { text, .. },
                ..
            }) => {
                *text = value.to_string();
                true
            }
            Some(Node {
                kind: NodeKind::Comment(text),
                ..
            }) => {
                *text = value.to_string();
                false
            }
            _ => false,
        };
        if changed && self.is_container(node) && self.is_connected(node) {
            self.rebuild_sheet(node);
        }
    }

    fn text_content(&self, node: NodeId) -> String {
        match self.nodes.get(node.0).map(|n| &n.kind) {
            Some(NodeKind::Element { text, .. }) => text.clone(),
            Some(NodeKind::Comment(text)) => text.clone(),
            _ => String::new(),
        }
    }

    fn css_rules(&self, parent: RuleParent) -> Result<Vec<CssRuleId>, EngineError> {
        self.list(parent).cloned()
    }

    fn rule_kind(&self, rule: CssRuleId) -> Result<CssRuleKind, EngineError> {
        Ok(self.rule(rule)?.kind)
    }

    fn keyframes_name(&self, rule: CssRuleId) -> Option<String> {
        if self.quirks.hide_keyframes_name {
            return None;
        }
        self.rule(rule).ok()?.name.clone()
    }

    fn selector_text(&self, rule: CssRuleId) -> Option<String> {
        let r = self.rule(rule).ok()?;
        (r.kind == CssRuleKind::Style).then(|| r.header.clone())
    }

    fn set_selector_text(&mut self, rule: CssRuleId, selector: &str) {
        if self
            .quirks
            .unsupported_selectors
            .iter()
            .any(|s| selector.contains(s.as_str()))
        {
            return;
        }
        let Some(canonical) = css_text::canonical_selector(selector) else {
            return;
        };
        if let Ok(r) = self.rule_mut(rule) {
            if r.kind == CssRuleKind::Style {
                r.header = canonical;
            }
        }
    }

    fn css_text(&self, rule: CssRuleId) -> Result<String, EngineError> {
        self.rule(rule)?;
        Ok(self.serialize_rule(rule))
    }

    fn property_value(&self, rule: CssRuleId, property: &str) -> Result<String, EngineError> {
        self.check_property(property)?;
        let r = self.rule(rule)?;
        Ok(r.declarations
            .iter()
            .find(|d| d.name == property)
            .map(|d| d.value.clone())
            .unwrap_or_default())
    }

    fn set_property(
        &mut self,
        rule: CssRuleId,
        property: &str,
        value: &str,
        important: bool,
    ) -> Result<(), EngineError> {
        self.check_property(property)?;
        let r = self.rule_mut(rule)?;
        let value = value.trim();
        if value.is_empty() {
            r.declarations.retain(|d| d.name != property);
            return Ok(());
        }
        match r.declarations.iter_mut().find(|d| d.name == property) {
            Some(d) => {
                d.value = value.to_string();
                d.important = important;
            }
            None => r.declarations.push(ParsedDeclaration {
                name: property.to_string(),
                value: value.to_string(),
                important,
            }),
        }
        Ok(())
    }

    fn remove_property(&mut self, rule: CssRuleId, property: &str) -> Result<(), EngineError> {
        self.check_property(property)?;
        self.rule_mut(rule)?
            .declarations
            .retain(|d| d.name != property);
        Ok(())
    }

    fn insert_rule(
        &mut self,
        parent: RuleParent,
        text: &str,
        index: usize,
    ) -> Result<CssRuleId, EngineError> {
        let in_keyframes = match parent {
            RuleParent::Rule(rule) => self.rule(rule)?.kind == CssRuleKind::Keyframes,
            RuleParent::Sheet(_) => false,
        };
        let len = self.list(parent)?.len();
        if index > len {
            return Err(EngineError::IndexOutOfRange { index, len });
        }
        let parsed = css_text::parse_single_rule(text, in_keyframes).map_err(|reason| {
            EngineError::UnsupportedRuleText {
                text: text.to_string(),
                reason,
            }
        })?;
        let id = self.materialize(parsed);
        self.list_mut(parent)?.insert(index, id);
        Ok(id)
    }

    fn delete_rule(&mut self, parent: RuleParent, index: usize) -> Result<(), EngineError> {
        let list = self.list_mut(parent)?;
        let len = list.len();
        if index >= len {
            return Err(EngineError::IndexOutOfRange { index, len });
        }
        let id = list.remove(index);
        self.kill_rule(id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connected_container(doc: &mut MemoryDocument, text: &str) -> NodeId {
        let style = doc.create_container();
        doc.set_text_content(style, text);
        let head = doc.head();
        doc.insert_before(head, style, None);
        style
    }

    #[test]
    fn test_new_document_has_head() {
        let doc = MemoryDocument::new();
        assert_eq!(doc.host_area(), Some(doc.head()));
        assert_eq!(doc.tag_name(doc.head()), Some("head"));
        assert!(doc.is_connected(doc.body()));
    }

    #[test]
    fn test_detached_container_has_no_rules() {
        let mut doc = MemoryDocument::new();
        let style = doc.create_container();
        doc.set_text_content(style, ".a { color: red }");
        assert!(matches!(
            doc.css_rules(RuleParent::Sheet(style)),
            Err(EngineError::NoStyleSheet { .. })
        ));
    }

    #[test]
    fn test_connecting_container_materializes_text() {
        let mut doc = MemoryDocument::new();
        let style = connected_container(&mut doc, ".a { color: red }\n.b { color: blue }");
        let rules = doc.css_rules(RuleParent::Sheet(style)).unwrap();
        assert_eq!(rules.len(), 2);
        assert_eq!(doc.selector_text(rules[1]).as_deref(), Some(".b"));
        assert_eq!(doc.property_value(rules[0], "color").unwrap(), "red");
    }

    #[test]
    fn test_reconnect_drops_inserted_rules() {
        let mut doc = MemoryDocument::new();
        let style = connected_container(&mut doc, ".a { color: red }");
        let sheet = RuleParent::Sheet(style);
        doc.insert_rule(sheet, ".b { color: blue }", 1).unwrap();
        assert_eq!(doc.css_rules(sheet).unwrap().len(), 2);

        let head = doc.head();
        doc.remove_child(head, style);
        doc.insert_before(head, style, None);
        assert_eq!(doc.css_rules(sheet).unwrap().len(), 1);
    }

    #[test]
    fn test_insert_rule_rejects_bad_text() {
        let mut doc = MemoryDocument::new();
        let style = connected_container(&mut doc, "");
        let err = doc
            .insert_rule(RuleParent::Sheet(style), "color: red", 0)
            .unwrap_err();
        assert!(matches!(err, EngineError::UnsupportedRuleText { .. }));
        let err = doc
            .insert_rule(RuleParent::Sheet(style), ".a {}", 3)
            .unwrap_err();
        assert_eq!(err, EngineError::IndexOutOfRange { index: 3, len: 0 });
    }

    #[test]
    fn test_deleted_rule_handle_goes_stale() {
        let mut doc = MemoryDocument::new();
        let style = connected_container(&mut doc, ".a { color: red }");
        let sheet = RuleParent::Sheet(style);
        let rule = doc.css_rules(sheet).unwrap()[0];
        doc.delete_rule(sheet, 0).unwrap();
        assert_eq!(doc.css_text(rule), Err(EngineError::UnknownRule));
    }

    #[test]
    fn test_keyframes_name_quirk() {
        let mut doc = MemoryDocument::with_quirks(EngineQuirks {
            hide_keyframes_name: true,
            ..EngineQuirks::default()
        });
        let style = connected_container(&mut doc, "@keyframes pulse { from { opacity: 0 } }");
        let rule = doc.css_rules(RuleParent::Sheet(style)).unwrap()[0];
        assert_eq!(doc.rule_kind(rule).unwrap(), CssRuleKind::Keyframes);
        assert_eq!(doc.keyframes_name(rule), None);
        assert!(doc.css_text(rule).unwrap().starts_with("@keyframes pulse {"));
    }

    #[test]
    fn test_unsupported_property_is_an_error() {
        let mut doc = MemoryDocument::with_quirks(EngineQuirks {
            unsupported_properties: vec!["zoom".to_string()],
            ..EngineQuirks::default()
        });
        let style = connected_container(&mut doc, ".a { color: red }");
        let rule = doc.css_rules(RuleParent::Sheet(style)).unwrap()[0];
        assert!(doc.set_property(rule, "zoom", "2", false).is_err());
        assert!(doc.set_property(rule, "not valid", "2", false).is_err());
        doc.set_property(rule, "color", "blue", true).unwrap();
        assert_eq!(doc.css_text(rule).unwrap(), ".a { color: blue !important; }");
    }

    #[test]
    fn test_selector_rewrite_can_be_ignored() {
        let mut doc = MemoryDocument::with_quirks(EngineQuirks {
            unsupported_selectors: vec![":fancy".to_string()],
            ..EngineQuirks::default()
        });
        let style = connected_container(&mut doc, ".a { color: red }");
        let rule = doc.css_rules(RuleParent::Sheet(style)).unwrap()[0];
        doc.set_selector_text(rule, ".b:fancy");
        assert_eq!(doc.selector_text(rule).as_deref(), Some(".a"));
        doc.set_selector_text(rule, ".b");
        assert_eq!(doc.selector_text(rule).as_deref(), Some(".b"));
    }

    #[test]
    fn test_next_sibling_and_comments() {
        let mut doc = MemoryDocument::new();
        let head = doc.head();
        let first = doc.append_comment(head, " marker ");
        let second = doc.create_container();
        doc.insert_before(head, second, None);
        assert_eq!(doc.next_sibling(first), Some(second));
        assert_eq!(doc.next_sibling(second), None);
        assert_eq!(doc.comment_text(first).as_deref(), Some(" marker "));
        assert_eq!(doc.comment_text(second), None);
    }
}
