//! Abstract rules.
//!
//! A [`Rule`] is one of three variants:
//!
//! - [`StyleRule`]: a selector and properties (`.button-0-1 { color: red }`).
//! - [`ContainerRule`]: an at-rule with nested rules (`@media`, `@keyframes`).
//! - [`OpaqueRule`]: a statement with no selector or body (`@import ...;`).
//!
//! Rules are built from a [`Declaration`] by `create_rule`, which asks the
//! plugins first and falls back to the construction rules below.
//!
//! | Name | Declaration | Rule |
//! |------|-------------|------|
//! | `@keyframes name` | block | keyframes container, children are frame steps |
//! | `@media ...`, `@supports ...`, `@container ...`, `@layer ...` | block | conditional container |
//! | other `@name` | value | opaque `"{name} {value};"` |
//! | other `@name` | block | style rule with the name as selector |
//! | anything else | block | style rule with a class selector |

mod container;
mod declaration;
mod style;

pub use container::{AtKind, ContainerRule};
pub use declaration::{Declaration, DynamicValue, PropValue};
pub use style::{Property, StyleRule};

use crate::config::ToCssOptions;
use crate::engine::CssRuleId;
use crate::error::WarningKind;
use crate::naming;
use crate::rules::RuleScope;

/// Options for adding a rule to a [`RuleList`](crate::RuleList).
#[derive(Debug, Clone, Default)]
pub struct RuleOptions {
    /// Explicit selector for a style rule, skipping class generation.
    pub selector: Option<String>,
    /// Position in the list; appended when absent or past the end.
    pub index: Option<usize>,
}

impl RuleOptions {
    pub fn selector(mut self, selector: impl Into<String>) -> Self {
        self.selector = Some(selector.into());
        self
    }

    pub fn index(mut self, index: usize) -> Self {
        self.index = Some(index);
        self
    }
}

/// An at-statement kept as text.
#[derive(Debug, Clone)]
pub struct OpaqueRule {
    key: String,
    text: String,
    pub(crate) renderable: Option<CssRuleId>,
}

impl OpaqueRule {
    pub fn new(key: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            text: text.into(),
            renderable: None,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn to_css(&self, options: &ToCssOptions) -> String {
        format!("{}{}", options.indent_str(), self.text)
    }
}

/// A rule owned by a [`RuleList`](crate::RuleList).
#[derive(Debug, Clone)]
pub enum Rule {
    Style(StyleRule),
    Container(ContainerRule),
    Opaque(OpaqueRule),
}

impl Rule {
    pub fn key(&self) -> &str {
        match self {
            Rule::Style(rule) => rule.key(),
            Rule::Container(rule) => rule.key(),
            Rule::Opaque(rule) => rule.key(),
        }
    }

    /// Selector of a style rule.
    pub fn selector(&self) -> Option<&str> {
        match self {
            Rule::Style(rule) => Some(rule.selector()),
            _ => None,
        }
    }

    /// The native rule this rule is bound to, if linked or inserted.
    pub fn renderable(&self) -> Option<CssRuleId> {
        match self {
            Rule::Style(rule) => rule.renderable,
            Rule::Container(rule) => rule.renderable,
            Rule::Opaque(rule) => rule.renderable,
        }
    }

    pub(crate) fn set_renderable(&mut self, native: Option<CssRuleId>) {
        match self {
            Rule::Style(rule) => rule.renderable = native,
            Rule::Container(rule) => rule.renderable = native,
            Rule::Opaque(rule) => rule.renderable = native,
        }
    }

    pub fn to_css(&self, options: &ToCssOptions) -> String {
        match self {
            Rule::Style(rule) => rule.to_css(options),
            Rule::Container(rule) => rule.to_css(options, true),
            Rule::Opaque(rule) => rule.to_css(options),
        }
    }

    pub fn as_style(&self) -> Option<&StyleRule> {
        match self {
            Rule::Style(rule) => Some(rule),
            _ => None,
        }
    }

    pub fn as_style_mut(&mut self) -> Option<&mut StyleRule> {
        match self {
            Rule::Style(rule) => Some(rule),
            _ => None,
        }
    }

    pub fn as_container(&self) -> Option<&ContainerRule> {
        match self {
            Rule::Container(rule) => Some(rule),
            _ => None,
        }
    }

    pub(crate) fn as_container_mut(&mut self) -> Option<&mut ContainerRule> {
        match self {
            Rule::Container(rule) => Some(rule),
            _ => None,
        }
    }
}

const CONDITIONAL_AT_RULES: [&str; 4] = ["@media", "@supports", "@container", "@layer"];

fn has_at_prefix(name: &str, prefix: &str) -> bool {
    name.strip_prefix(prefix)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with(char::is_whitespace))
}

/// Builds a rule from a declaration.
///
/// `key` is the registry key and `name` the name the rule was added under;
/// they differ when the name was already taken. At-rule preludes come from
/// `name`, class names from `key`. `in_keyframes` is set for frame steps.
/// Returns `None` (after a warning) when no rule kind fits.
pub(crate) fn create_rule(
    key: &str,
    name: &str,
    declaration: &Declaration,
    options: &RuleOptions,
    in_keyframes: bool,
    scope: &mut RuleScope<'_>,
) -> Option<Rule> {
    if let Some(rule) = scope.plugins.on_create_rule(key, declaration, options) {
        return Some(rule);
    }

    let name = name.trim();
    if let Declaration::Value(value) = declaration {
        return match value.as_static() {
            Some(value) if name.starts_with('@') => {
                Some(Rule::Opaque(OpaqueRule::new(key, format!("{} {};", name, value))))
            }
            _ => {
                scope.warnings.emit(
                    WarningKind::UnknownRule,
                    format!("unknown rule \"{}\"", key),
                );
                None
            }
        };
    }

    if in_keyframes {
        return Some(Rule::Style(StyleRule::new(key, name, None, declaration)));
    }

    if has_at_prefix(name, "@keyframes") {
        let frames = name["@keyframes".len()..].trim();
        if frames.is_empty() {
            scope.warnings.emit(
                WarningKind::UnknownRule,
                format!("keyframes rule \"{}\" has no name", key),
            );
            return None;
        }
        let header = format!("@keyframes {}", frames);
        return Some(Rule::Container(ContainerRule::new(
            key,
            AtKind::Keyframes,
            header,
            declaration,
            scope,
        )));
    }

    if CONDITIONAL_AT_RULES.iter().any(|at| has_at_prefix(name, at)) {
        return Some(Rule::Container(ContainerRule::new(
            key,
            AtKind::Conditional,
            name,
            declaration,
            scope,
        )));
    }

    if name.starts_with('@') {
        return Some(Rule::Style(StyleRule::new(key, name, None, declaration)));
    }

    let (selector, class_name) = match &options.selector {
        Some(selector) => (selector.clone(), None),
        None => {
            let class_name = match scope.classes.get(key) {
                Some(existing) => existing.clone(),
                None => {
                    let generated = scope.generate_id.generate_id(key, scope.sheet);
                    scope.classes.insert(key.to_string(), generated.clone());
                    generated
                }
            };
            (format!(".{}", naming::escape(&class_name)), Some(class_name))
        }
    };
    Some(Rule::Style(StyleRule::new(key, selector, class_name, declaration)))
}

/// Formats a block whose lines are single declarations.
pub(crate) fn block(header: &str, lines: &[String], options: &ToCssOptions) -> String {
    let indent = options.indent_str();
    let inner = options.nested().indent_str();
    let br = options.linebreak();
    let mut out = format!("{}{}{}{{{}", indent, header, options.space(), br);
    for line in lines {
        out.push_str(&inner);
        out.push_str(line);
        out.push_str(br);
    }
    out.push_str(&indent);
    out.push('}');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Warnings;
    use crate::naming::ClassNameGenerator;
    use crate::plugins::Plugins;
    use crate::registry::{SheetId, SheetMeta};
    use std::collections::HashMap;

    struct Env {
        plugins: Plugins,
        generator: ClassNameGenerator,
        classes: HashMap<String, String>,
        meta: SheetMeta,
        warnings: Warnings,
    }

    impl Env {
        fn new() -> Self {
            Self {
                plugins: Plugins::new(),
                generator: ClassNameGenerator::default(),
                classes: HashMap::new(),
                meta: SheetMeta {
                    id: SheetId(0),
                    meta: None,
                    class_name_prefix: None,
                },
                warnings: Warnings::new(),
            }
        }

        fn create(&mut self, key: &str, declaration: &Declaration, options: &RuleOptions) -> Option<Rule> {
            let mut scope = RuleScope {
                plugins: &self.plugins,
                generate_id: &self.generator,
                classes: &mut self.classes,
                sheet: &self.meta,
                warnings: &mut self.warnings,
            };
            create_rule(key, key, declaration, options, false, &mut scope)
        }
    }

    #[test]
    fn test_style_rule_gets_generated_class() {
        let mut env = Env::new();
        let rule = env
            .create("button", &Declaration::new().set("color", "red"), &RuleOptions::default())
            .unwrap();
        assert_eq!(rule.selector(), Some(".button-0-1"));
        assert_eq!(env.classes.get("button").map(String::as_str), Some("button-0-1"));
    }

    #[test]
    fn test_existing_class_is_reused() {
        let mut env = Env::new();
        env.classes.insert("button".to_string(), "shared".to_string());
        let rule = env
            .create("button", &Declaration::new(), &RuleOptions::default())
            .unwrap();
        assert_eq!(rule.selector(), Some(".shared"));
    }

    #[test]
    fn test_explicit_selector() {
        let mut env = Env::new();
        let rule = env
            .create("x", &Declaration::new(), &RuleOptions::default().selector("a > b"))
            .unwrap();
        assert_eq!(rule.selector(), Some("a > b"));
        assert!(env.classes.is_empty());
    }

    #[test]
    fn test_at_rules() {
        let mut env = Env::new();
        let import = env
            .create("@import", &Declaration::value("url(a.css)"), &RuleOptions::default())
            .unwrap();
        assert_eq!(import.to_css(&ToCssOptions::default()), "@import url(a.css);");

        let font = env
            .create(
                "@font-face",
                &Declaration::new().set("font-family", "X"),
                &RuleOptions::default(),
            )
            .unwrap();
        assert_eq!(font.selector(), Some("@font-face"));

        let media = env
            .create("@media print", &Declaration::new(), &RuleOptions::default())
            .unwrap();
        assert_eq!(media.as_container().map(|c| c.at()), Some(AtKind::Conditional));

        let frames = env
            .create("@keyframes pulse", &Declaration::new(), &RuleOptions::default())
            .unwrap();
        assert_eq!(frames.as_container().map(|c| c.header()), Some("@keyframes pulse"));
    }

    #[test]
    fn test_media_prefix_needs_boundary() {
        assert!(has_at_prefix("@media print", "@media"));
        assert!(!has_at_prefix("@mediafoo", "@media"));
    }

    #[test]
    fn test_plain_value_is_unknown() {
        let mut env = Env::new();
        assert!(env
            .create("color", &Declaration::value("red"), &RuleOptions::default())
            .is_none());
        assert_eq!(env.warnings.as_slice()[0].kind, WarningKind::UnknownRule);
    }
}
