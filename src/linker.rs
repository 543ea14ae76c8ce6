//! Binding native rules back to the rules that produced them.
//!
//! After the engine has parsed a deployed sheet, each native rule is given a
//! key:
//!
//! - style rules: their selector text;
//! - keyframes rules: `@keyframes {name}`, with the name taken from the
//!   engine if it exposes one, or scanned out of the rule's text otherwise;
//! - everything else: the rule text up to the opening brace.
//!
//! The key is looked up among the registry's selectors, then among its keys.
//! Native rules without a match are left alone. Engines rewrite selectors
//! (`.a\3A b` reads back as `.a\:b`, `ul>li` as `ul > li`), so with escape
//! compensation every selector is first round-tripped through a
//! [`SelectorProbe`] to learn the form the engine will report.

use std::collections::{HashMap, HashSet};

use crate::engine::{CssRuleId, CssRuleKind, NativeEngine, NodeId, RuleParent};
use crate::renderer::SelectorProbe;
use crate::rules::RuleList;

/// Key identifying a native rule, or `None` when nothing can be derived.
pub fn native_key<E: NativeEngine + ?Sized>(engine: &E, rule: CssRuleId) -> Option<String> {
    match engine.rule_kind(rule).ok()? {
        CssRuleKind::Style => engine.selector_text(rule),
        CssRuleKind::Keyframes => {
            if let Some(name) = engine.keyframes_name(rule) {
                return Some(format!("@keyframes {}", name));
            }
            let text = engine.css_text(rule).ok()?;
            keyframes_name_from_text(&text).map(|name| format!("@keyframes {}", name))
        }
        CssRuleKind::Grouping | CssRuleKind::Other => {
            let text = engine.css_text(rule).ok()?;
            let (head, _) = text.split_once('{')?;
            let head = head.trim();
            (!head.is_empty()).then(|| head.to_string())
        }
    }
}

/// Extracts `name` from `@keyframes name { ... }`, including vendor-prefixed
/// forms.
fn keyframes_name_from_text(text: &str) -> Option<&str> {
    let start = text.find("keyframes")? + "keyframes".len();
    let rest = &text[start..];
    let end = rest.find('{')?;
    let name = rest[..end].trim();
    (!name.is_empty()).then_some(name)
}

/// Maps the engine's form of each style selector in `rules`, nested ones
/// included, to the selector as written. Only rewritten selectors are kept.
pub fn unescaped_selectors<E: NativeEngine + ?Sized>(
    engine: &mut E,
    host: Option<NodeId>,
    rules: &RuleList,
) -> HashMap<String, String> {
    let selectors = rules.style_selectors();
    let mut map = HashMap::new();
    if selectors.is_empty() {
        return map;
    }
    let written: HashSet<&str> = selectors.iter().map(String::as_str).collect();
    let mut probe = SelectorProbe::new(host);
    for selector in &selectors {
        let Some(normalized) = probe.probe(engine, selector) else {
            continue;
        };
        // A form some other rule uses verbatim belongs to that rule.
        if normalized != *selector && !written.contains(normalized.as_str()) {
            map.insert(normalized, selector.clone());
        }
    }
    probe.finish(engine);
    map
}

/// Binds native rules to the rules in `rules`, recursing into grouping and
/// keyframes rules. `unescaped` comes from [`unescaped_selectors`]. Returns
/// the number of bindings made.
pub fn link<E: NativeEngine + ?Sized>(
    engine: &E,
    rules: &mut RuleList,
    natives: &[CssRuleId],
    unescaped: &HashMap<String, String>,
) -> usize {
    let mut linked = 0;
    for native in natives {
        let Some(native_key) = native_key(engine, *native) else {
            continue;
        };
        let lookup = unescaped.get(&native_key).unwrap_or(&native_key);
        let Some(key) = rules.lookup_native(lookup) else {
            tracing::trace!(native = %native_key, "no rule for native rule");
            continue;
        };
        let Some(rule) = rules.get_mut(&key) else {
            continue;
        };
        rule.set_renderable(Some(*native));
        linked += 1;
        if let Some(container) = rule.as_container_mut() {
            if let Ok(children) = engine.css_rules(RuleParent::Rule(*native)) {
                linked += link(engine, &mut container.rules, &children, unescaped);
            }
        }
    }
    tracing::debug!(natives = natives.len(), linked, "linked rules");
    linked
}
