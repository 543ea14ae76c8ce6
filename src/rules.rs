//! The ordered rule registry of a sheet.
//!
//! A [`RuleList`] keeps its rules in insertion order and indexes them twice:
//! by key, and, for style rules, by current selector. The order decides
//! serialization and native insertion; the maps serve lookups and linking.
//!
//! Passes that call back into plugins ([`RuleList::process`],
//! [`RuleList::update_all`]) walk a snapshot of the keys, so a callback that
//! adds or removes rules neither skips nor repeats an entry. Rules removed
//! during the pass are skipped, rules added during the pass are not visited.

use std::collections::HashMap;

use serde_json::Value;

use crate::config::ToCssOptions;
use crate::engine::CssRuleId;
use crate::error::Warnings;
use crate::naming::GenerateId;
use crate::plugins::Plugins;
use crate::registry::SheetMeta;
use crate::rule::{create_rule, AtKind, Declaration, Rule, RuleOptions};

/// Everything rule construction needs from the owning sheet and context.
pub struct RuleScope<'a> {
    pub(crate) plugins: &'a Plugins,
    pub(crate) generate_id: &'a dyn GenerateId,
    pub(crate) classes: &'a mut HashMap<String, String>,
    pub(crate) sheet: &'a SheetMeta,
    pub(crate) warnings: &'a mut Warnings,
}

impl RuleScope<'_> {
    /// The sheet the rules belong to.
    pub fn sheet(&self) -> &SheetMeta {
        self.sheet
    }

    /// Class name already assigned to a rule key.
    pub fn class_name(&self, key: &str) -> Option<&str> {
        self.classes.get(key).map(String::as_str)
    }
}

/// A property whose value changed during an update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyChange {
    /// Native rule to mirror the change into, if the rule is bound.
    pub renderable: Option<CssRuleId>,
    pub property: String,
    /// New value; `None` removes the property.
    pub value: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct RuleList {
    index: Vec<String>,
    map: HashMap<String, Rule>,
    selectors: HashMap<String, String>,
    counter: usize,
    keyframes: bool,
}

impl RuleList {
    pub fn new() -> Self {
        Self::default()
    }

    /// A list nested in a container rule. Entries of a keyframes list are
    /// frame steps.
    pub(crate) fn nested(keyframes: bool) -> Self {
        Self {
            keyframes,
            ..Self::default()
        }
    }

    /// Creates a rule and registers it.
    ///
    /// A name already in use is registered as `{name}-d{n}`. Returns `None`
    /// when no rule could be built from the declaration.
    pub fn add(
        &mut self,
        name: &str,
        declaration: &Declaration,
        options: RuleOptions,
        scope: &mut RuleScope<'_>,
    ) -> Option<&Rule> {
        let key = if self.map.contains_key(name) {
            let key = format!("{}-d{}", name, self.counter);
            self.counter += 1;
            key
        } else {
            name.to_string()
        };
        let rule = create_rule(&key, name, declaration, &options, self.keyframes, scope)?;
        self.register(rule, options.index)
    }

    /// Registers a built rule at `index` (clamped), or at the end.
    pub fn register(&mut self, rule: Rule, index: Option<usize>) -> Option<&Rule> {
        let key = rule.key().to_string();
        if self.map.contains_key(&key) {
            self.remove(&key);
        }
        if let Some(selector) = rule.selector() {
            self.selectors.insert(selector.to_string(), key.clone());
        }
        let at = index.map_or(self.index.len(), |i| i.min(self.index.len()));
        self.index.insert(at, key.clone());
        self.map.insert(key.clone(), rule);
        self.map.get(&key)
    }

    /// Replaces the rule under `name`, keeping its position. Behaves like
    /// [`add`](Self::add) when there is no such rule.
    pub fn replace(
        &mut self,
        name: &str,
        declaration: &Declaration,
        options: RuleOptions,
        scope: &mut RuleScope<'_>,
    ) -> Option<&Rule> {
        let position = self.index_of(name);
        if self.remove(name).is_some() {
            scope.classes.remove(name);
        }
        let options = RuleOptions {
            index: position.or(options.index),
            ..options
        };
        self.add(name, declaration, options, scope)
    }

    pub fn get(&self, key: &str) -> Option<&Rule> {
        self.map.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Rule> {
        self.map.get_mut(key)
    }

    pub fn get_by_selector(&self, selector: &str) -> Option<&Rule> {
        self.selectors.get(selector).and_then(|key| self.map.get(key))
    }

    /// Unregisters a rule. Removing a missing key is a no-op.
    pub fn remove(&mut self, key: &str) -> Option<Rule> {
        let rule = self.map.remove(key)?;
        self.index.retain(|k| k != key);
        if let Some(selector) = rule.selector() {
            self.release_selector(selector, key);
        }
        Some(rule)
    }

    /// Drops `key`'s claim on `selector`. Another rule still using the
    /// selector takes the entry over, the first one in order.
    fn release_selector(&mut self, selector: &str, key: &str) {
        if self.selectors.get(selector).map(String::as_str) != Some(key) {
            return;
        }
        let holder = self
            .index
            .iter()
            .filter(|k| k.as_str() != key)
            .find(|k| self.map.get(k.as_str()).and_then(Rule::selector) == Some(selector))
            .cloned();
        match holder {
            Some(holder) => {
                self.selectors.insert(selector.to_string(), holder);
            }
            None => {
                self.selectors.remove(selector);
            }
        }
    }

    pub fn index_of(&self, key: &str) -> Option<usize> {
        self.index.iter().position(|k| k == key)
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Rules in order.
    pub fn iter(&self) -> impl Iterator<Item = &Rule> {
        self.index.iter().filter_map(|key| self.map.get(key))
    }

    /// Keys in order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.index.iter().map(String::as_str)
    }

    /// Changes a style rule's selector and keeps the selector index in sync.
    pub fn set_selector(&mut self, key: &str, selector: &str) -> bool {
        let Some(style) = self.map.get_mut(key).and_then(Rule::as_style_mut) else {
            return false;
        };
        let old = style.selector().to_string();
        style.set_selector_text(selector.to_string());
        self.release_selector(&old, key);
        self.selectors.insert(selector.to_string(), key.to_string());
        true
    }

    /// Runs the plugins' processing hooks over every rule.
    pub fn process(&mut self, scope: &mut RuleScope<'_>) {
        let keys = self.index.clone();
        for key in &keys {
            self.process_rule(key, scope);
        }
    }

    /// Runs the plugins' processing hooks over one rule, then over the rules
    /// nested in it.
    pub fn process_rule(&mut self, key: &str, scope: &mut RuleScope<'_>) {
        if !self.map.contains_key(key) {
            return;
        }
        let plugins = scope.plugins;
        plugins.on_process_rule(self, key, scope);
        match self.map.get_mut(key) {
            Some(Rule::Style(style)) => plugins.on_process_style(style),
            Some(Rule::Container(container)) => container.rules.process(scope),
            _ => {}
        }
    }

    /// Re-evaluates the dynamic values of the rule under `key`.
    pub fn update_one(&mut self, key: &str, data: &Value, plugins: &Plugins) -> Vec<PropertyChange> {
        match self.map.get_mut(key) {
            Some(rule) => update_rule(rule, data, plugins),
            None => Vec::new(),
        }
    }

    /// Re-evaluates the dynamic values of every rule.
    pub fn update_all(&mut self, data: &Value, plugins: &Plugins) -> Vec<PropertyChange> {
        let keys = self.index.clone();
        let mut changes = Vec::new();
        for key in &keys {
            changes.extend(self.update_one(key, data, plugins));
        }
        changes
    }

    /// Registry key matching a key read from a native rule: a selector of a
    /// style rule, or a rule key.
    pub(crate) fn lookup_native(&self, native_key: &str) -> Option<String> {
        if let Some(key) = self.selectors.get(native_key) {
            return Some(key.clone());
        }
        self.map.contains_key(native_key).then(|| native_key.to_string())
    }

    /// Selectors of every style rule, including rules nested in conditional
    /// group rules. Keyframe steps are left out.
    pub(crate) fn style_selectors(&self) -> Vec<String> {
        let mut selectors = Vec::new();
        for rule in self.iter() {
            match rule {
                Rule::Style(style) => selectors.push(style.selector().to_string()),
                Rule::Container(container) if container.at() == AtKind::Conditional => {
                    selectors.extend(container.rules().style_selectors());
                }
                _ => {}
            }
        }
        selectors
    }

    /// Drops every native binding, including nested ones.
    pub fn unlink(&mut self) {
        for rule in self.map.values_mut() {
            rule.set_renderable(None);
            if let Some(container) = rule.as_container_mut() {
                container.rules.unlink();
            }
        }
    }

    /// Serializes every rule in order. Rules that serialize to nothing are
    /// skipped and leave no separator behind.
    pub fn to_css(&self, options: &ToCssOptions) -> String {
        let separator = options.rule_separator();
        let mut out = String::new();
        for rule in self.iter() {
            let css = rule.to_css(options);
            if css.is_empty() {
                continue;
            }
            if !out.is_empty() {
                out.push_str(separator);
            }
            out.push_str(&css);
        }
        out
    }

    #[cfg(test)]
    pub(crate) fn check_invariants(&self) -> Result<(), String> {
        if self.index.len() != self.map.len() {
            return Err(format!(
                "index has {} keys, map has {}",
                self.index.len(),
                self.map.len()
            ));
        }
        for key in &self.index {
            if self.index.iter().filter(|k| *k == key).count() != 1 {
                return Err(format!("key {} is listed twice", key));
            }
            let rule = self.map.get(key).ok_or_else(|| format!("key {} not in map", key))?;
            if let Some(selector) = rule.selector() {
                let indexed = self
                    .get_by_selector(selector)
                    .ok_or_else(|| format!("selector {} not indexed", selector))?;
                if indexed.selector() != Some(selector) {
                    return Err(format!("selector {} points at the wrong rule", selector));
                }
            }
        }
        for (selector, key) in &self.selectors {
            let rule = self
                .map
                .get(key)
                .ok_or_else(|| format!("selector {} points at missing key {}", selector, key))?;
            if rule.selector() != Some(selector.as_str()) {
                return Err(format!("stale selector entry {}", selector));
            }
        }
        Ok(())
    }
}

fn update_rule(rule: &mut Rule, data: &Value, plugins: &Plugins) -> Vec<PropertyChange> {
    plugins.on_update(data, rule);
    match rule {
        Rule::Style(style) => {
            let renderable = style.renderable();
            style
                .regenerate(data)
                .into_iter()
                .map(|(property, value)| PropertyChange {
                    renderable,
                    property,
                    value,
                })
                .collect()
        }
        Rule::Container(container) => container.rules.update_all(data, plugins),
        Rule::Opaque(_) => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::naming::ClassNameGenerator;
    use crate::plugins::Plugin;
    use crate::registry::SheetId;
    use proptest::prelude::*;
    use serde_json::json;

    struct Env {
        plugins: Plugins,
        generator: ClassNameGenerator,
        classes: HashMap<String, String>,
        meta: SheetMeta,
        warnings: Warnings,
    }

    impl Env {
        fn new() -> Self {
            Self::with_plugins(Plugins::new())
        }

        fn with_plugins(plugins: Plugins) -> Self {
            Self {
                plugins,
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

        fn scope(&mut self) -> RuleScope<'_> {
            RuleScope {
                plugins: &self.plugins,
                generate_id: &self.generator,
                classes: &mut self.classes,
                sheet: &self.meta,
                warnings: &mut self.warnings,
            }
        }
    }

    fn red() -> Declaration {
        Declaration::new().set("color", "red")
    }

    #[test]
    fn test_add_appends_and_indexes() {
        let mut env = Env::new();
        let mut list = RuleList::new();
        list.add("a", &red(), RuleOptions::default(), &mut env.scope());
        list.add("b", &red(), RuleOptions::default(), &mut env.scope());
        assert_eq!(list.keys().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(list.get_by_selector(".b-0-2").map(Rule::key), Some("b"));
        list.check_invariants().unwrap();
    }

    #[test]
    fn test_add_at_index() {
        let mut env = Env::new();
        let mut list = RuleList::new();
        list.add("a", &red(), RuleOptions::default(), &mut env.scope());
        list.add("b", &red(), RuleOptions::default().index(0), &mut env.scope());
        list.add("c", &red(), RuleOptions::default().index(99), &mut env.scope());
        assert_eq!(list.keys().collect::<Vec<_>>(), vec!["b", "a", "c"]);
    }

    #[test]
    fn test_duplicate_names_are_suffixed() {
        let mut env = Env::new();
        let mut list = RuleList::new();
        list.add("a", &red(), RuleOptions::default(), &mut env.scope());
        list.add("a", &red(), RuleOptions::default(), &mut env.scope());
        list.add("a", &red(), RuleOptions::default(), &mut env.scope());
        assert_eq!(list.keys().collect::<Vec<_>>(), vec!["a", "a-d0", "a-d1"]);
        list.check_invariants().unwrap();
    }

    #[test]
    fn test_remove_is_idempotent() {
        let mut env = Env::new();
        let mut list = RuleList::new();
        list.add("a", &red(), RuleOptions::default(), &mut env.scope());
        assert!(list.remove("a").is_some());
        assert!(list.remove("a").is_none());
        assert!(list.is_empty());
        assert_eq!(list.get_by_selector(".a-0-1").map(Rule::key), None);
    }

    #[test]
    fn test_replace_keeps_position() {
        let mut env = Env::new();
        let mut list = RuleList::new();
        for name in ["a", "b", "c"] {
            list.add(name, &red(), RuleOptions::default(), &mut env.scope());
        }
        let blue = Declaration::new().set("color", "blue");
        list.replace("b", &blue, RuleOptions::default(), &mut env.scope());
        assert_eq!(list.keys().collect::<Vec<_>>(), vec!["a", "b", "c"]);
        let rule = list.get("b").and_then(Rule::as_style).unwrap();
        assert_eq!(rule.prop("color"), Some("blue"));
        assert_eq!(rule.selector(), ".b-0-4");
        list.check_invariants().unwrap();
    }

    #[test]
    fn test_to_css_skips_empty_rules() {
        let mut env = Env::new();
        let mut list = RuleList::new();
        list.add("a", &Declaration::new(), RuleOptions::default(), &mut env.scope());
        list.add("b", &red(), RuleOptions::default(), &mut env.scope());
        let b = list.get("b").unwrap().to_css(&ToCssOptions::default());
        assert_eq!(list.to_css(&ToCssOptions::default()), b);
        assert_eq!(b, ".b-0-2 {\n  color: red;\n}");
    }

    #[test]
    fn test_to_css_joins_with_blank_line() {
        let mut env = Env::new();
        let mut list = RuleList::new();
        list.add("a", &red(), RuleOptions::default().selector(".a"), &mut env.scope());
        list.add("b", &red(), RuleOptions::default().selector(".b"), &mut env.scope());
        assert_eq!(
            list.to_css(&ToCssOptions::default()),
            ".a {\n  color: red;\n}\n\n.b {\n  color: red;\n}"
        );
        assert_eq!(
            list.to_css(&ToCssOptions::compact()),
            ".a{color:red;}.b{color:red;}"
        );
    }

    #[test]
    fn test_nested_serialization() {
        let mut env = Env::new();
        let mut list = RuleList::new();
        let frames = Declaration::new()
            .nest("from", Declaration::new().set("opacity", 0))
            .nest("to", Declaration::new().set("opacity", 1));
        list.add("@keyframes pulse", &frames, RuleOptions::default(), &mut env.scope());
        let media = Declaration::new().nest("a", red());
        list.add("@media print", &media, RuleOptions::default(), &mut env.scope());
        assert_eq!(
            list.to_css(&ToCssOptions::default()),
            "@keyframes pulse {\n  from {\n    opacity: 0;\n  }\n  to {\n    opacity: 1;\n  }\n}\n\n\
             @media print {\n  .a-0-1 {\n    color: red;\n  }\n}"
        );
        let container = list.get("@media print").and_then(Rule::as_container).unwrap();
        assert_eq!(
            container.to_css(&ToCssOptions::default(), false),
            "@media print {}"
        );
    }

    #[test]
    fn test_empty_container_is_skipped() {
        let mut env = Env::new();
        let mut list = RuleList::new();
        list.add("@media print", &Declaration::new(), RuleOptions::default(), &mut env.scope());
        assert_eq!(list.to_css(&ToCssOptions::default()), "");
    }

    #[test]
    fn test_update_one_touches_only_named_rule() {
        let mut env = Env::new();
        let mut list = RuleList::new();
        let color = |d: &Value| d.get("color").and_then(Value::as_str).map(String::from);
        list.add("btn", &Declaration::new().dynamic("color", color), RuleOptions::default(), &mut env.scope());
        list.add("other", &Declaration::new().dynamic("color", color), RuleOptions::default(), &mut env.scope());
        let changes = list.update_one("btn", &json!({"color": "blue"}), &env.plugins);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].value.as_deref(), Some("blue"));
        assert_eq!(list.get("other").and_then(Rule::as_style).unwrap().prop("color"), None);
        assert_eq!(list.update_all(&json!({"color": "red"}), &env.plugins).len(), 2);
    }

    #[test]
    fn test_update_all_reaches_nested_rules() {
        let mut env = Env::new();
        let mut list = RuleList::new();
        let width = |d: &Value| d.get("w").map(|w| w.to_string());
        let media = Declaration::new().nest("a", Declaration::new().dynamic("width", width));
        list.add("@media print", &media, RuleOptions::default(), &mut env.scope());
        let changes = list.update_all(&json!({"w": 3}), &env.plugins);
        assert_eq!(changes[0].value.as_deref(), Some("3"));
    }

    #[test]
    fn test_set_selector_reindexes() {
        let mut env = Env::new();
        let mut list = RuleList::new();
        list.add("a", &red(), RuleOptions::default().selector(".a"), &mut env.scope());
        assert!(list.set_selector("a", ".z"));
        assert!(list.get_by_selector(".a").is_none());
        assert_eq!(list.get_by_selector(".z").map(Rule::key), Some("a"));
        assert!(!list.set_selector("missing", ".y"));
        list.check_invariants().unwrap();
    }

    #[test]
    fn test_shared_selector_survives_removal() {
        let mut env = Env::new();
        let mut list = RuleList::new();
        list.add("a", &red(), RuleOptions::default().selector(".same"), &mut env.scope());
        list.add("b", &red(), RuleOptions::default().selector(".same"), &mut env.scope());
        assert_eq!(list.get_by_selector(".same").map(Rule::key), Some("b"));

        list.remove("b");
        assert_eq!(list.get_by_selector(".same").map(Rule::key), Some("a"));
        list.check_invariants().unwrap();

        list.add("c", &red(), RuleOptions::default().selector(".same"), &mut env.scope());
        assert!(list.set_selector("c", ".other"));
        assert_eq!(list.get_by_selector(".same").map(Rule::key), Some("a"));
        list.check_invariants().unwrap();
    }

    #[test]
    fn test_style_selectors_include_conditional_children() {
        let mut env = Env::new();
        let mut list = RuleList::new();
        let media = Declaration::new().nest("inner", red());
        let frames = Declaration::new().nest("from", Declaration::new().set("opacity", 0));
        list.add("a", &red(), RuleOptions::default().selector("ul>li"), &mut env.scope());
        list.add("@media print", &media, RuleOptions::default(), &mut env.scope());
        list.add("@keyframes fade", &frames, RuleOptions::default(), &mut env.scope());
        assert_eq!(list.style_selectors(), vec!["ul>li".to_string(), ".inner-0-1".to_string()]);
    }

    struct Expander;

    impl Plugin for Expander {
        fn on_process_rule(&self, rules: &mut RuleList, key: &str, scope: &mut RuleScope<'_>) {
            if key == "a" {
                rules.remove("b");
                rules.add("late", &red(), RuleOptions::default(), scope);
            }
        }

        fn on_process_style(&self, rule: &mut crate::rule::StyleRule) {
            rule.set_prop("processed", Some("yes"));
        }
    }

    #[test]
    fn test_process_walks_a_snapshot() {
        let mut plugins = Plugins::new();
        plugins.push(Expander);
        let mut env = Env::with_plugins(plugins);
        let mut list = RuleList::new();
        for name in ["a", "b", "c"] {
            list.add(name, &red(), RuleOptions::default(), &mut env.scope());
        }
        list.process(&mut env.scope());
        assert_eq!(list.keys().collect::<Vec<_>>(), vec!["a", "c", "late"]);
        let processed = |key: &str| {
            list.get(key)
                .and_then(Rule::as_style)
                .and_then(|r| r.prop("processed"))
                .is_some()
        };
        assert!(processed("a"));
        assert!(processed("c"));
        assert!(!processed("late"));
        list.check_invariants().unwrap();
    }

    #[derive(Debug, Clone)]
    enum Op {
        Add(u8),
        AddAt(u8, usize),
        Remove(u8),
        Retarget(u8, u8),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0u8..6).prop_map(Op::Add),
            (0u8..6, 0usize..8).prop_map(|(n, i)| Op::AddAt(n, i)),
            (0u8..6).prop_map(Op::Remove),
            (0u8..6, 0u8..3).prop_map(|(n, s)| Op::Retarget(n, s)),
        ]
    }

    proptest! {
        #[test]
        fn prop_registry_stays_consistent(ops in proptest::collection::vec(op(), 0..40)) {
            let mut env = Env::new();
            let mut list = RuleList::new();
            for op in ops {
                match op {
                    Op::Add(n) => {
                        list.add(&format!("r{}", n), &red(), RuleOptions::default(), &mut env.scope());
                    }
                    Op::AddAt(n, i) => {
                        list.add(&format!("r{}", n), &red(), RuleOptions::default().index(i), &mut env.scope());
                    }
                    Op::Remove(n) => {
                        list.remove(&format!("r{}", n));
                    }
                    Op::Retarget(n, s) => {
                        list.set_selector(&format!("r{}", n), &format!(".shared-{}", s));
                    }
                }
                prop_assert_eq!(list.check_invariants(), Ok(()));
                prop_assert_eq!(list.len(), list.iter().count());
            }
        }
    }
}
