//! At-rules holding a nested rule list.

use super::declaration::Declaration;
use super::RuleOptions;
use crate::config::ToCssOptions;
use crate::engine::CssRuleId;
use crate::rules::{RuleList, RuleScope};

/// Which at-rule a [`ContainerRule`] is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AtKind {
    /// `@keyframes`; children are frame steps.
    Keyframes,
    /// `@media`, `@supports` and the like; children are ordinary rules.
    Conditional,
}

#[derive(Debug, Clone)]
pub struct ContainerRule {
    key: String,
    at: AtKind,
    header: String,
    pub(crate) rules: RuleList,
    pub(crate) renderable: Option<CssRuleId>,
}

impl ContainerRule {
    pub(crate) fn new(
        key: impl Into<String>,
        at: AtKind,
        header: impl Into<String>,
        declaration: &Declaration,
        scope: &mut RuleScope<'_>,
    ) -> Self {
        let mut rules = RuleList::nested(at == AtKind::Keyframes);
        for (name, nested) in declaration.entries() {
            rules.add(name, nested, RuleOptions::default(), scope);
        }
        Self {
            key: key.into(),
            at,
            header: header.into(),
            rules,
            renderable: None,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn at(&self) -> AtKind {
        self.at
    }

    /// The at-rule prelude, e.g. `@media print` or `@keyframes pulse`.
    pub fn header(&self) -> &str {
        &self.header
    }

    pub fn rules(&self) -> &RuleList {
        &self.rules
    }

    pub fn rules_mut(&mut self) -> &mut RuleList {
        &mut self.rules
    }

    pub fn renderable(&self) -> Option<CssRuleId> {
        self.renderable
    }

    /// Serializes the rule. Without `children` only an empty shell is
    /// produced, for engines that take nested rules one at a time.
    pub fn to_css(&self, options: &ToCssOptions, children: bool) -> String {
        let indent = options.indent_str();
        if !children {
            return format!("{}{}{}{{}}", indent, self.header, options.space());
        }
        let body = self.rules.to_css(&options.nested());
        if body.is_empty() && !options.allow_empty {
            return String::new();
        }
        let br = options.linebreak();
        if body.is_empty() {
            return format!("{}{}{}{{{}{}}}", indent, self.header, options.space(), br, indent);
        }
        format!(
            "{}{}{}{{{}{}{}{}}}",
            indent,
            self.header,
            options.space(),
            br,
            body,
            br,
            indent
        )
    }
}
