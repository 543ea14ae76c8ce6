//! Plugin hooks.
//!
//! Plugins run in registration order. Every hook has a default that does
//! nothing, so a plugin only implements what it needs:
//!
//! ```rust
//! use rulesheet::{Plugin, StyleRule};
//!
//! struct Important;
//!
//! impl Plugin for Important {
//!     fn on_process_style(&self, rule: &mut StyleRule) {
//!         let names: Vec<String> = rule.props().iter().map(|p| p.name().to_string()).collect();
//!         for name in names {
//!             let value = rule.prop(&name).map(|v| format!("{} !important", v));
//!             if let Some(value) = value {
//!                 rule.set_prop(&name, Some(&value));
//!             }
//!         }
//!     }
//! }
//! ```

use std::fmt;

use serde_json::Value;

use crate::rule::{Declaration, Rule, RuleOptions, StyleRule};
use crate::rules::{RuleList, RuleScope};

pub trait Plugin {
    /// Builds a rule instead of the default construction. The first plugin
    /// returning `Some` wins.
    fn on_create_rule(&self, _key: &str, _declaration: &Declaration, _options: &RuleOptions) -> Option<Rule> {
        None
    }

    /// Called once per rule when its list is processed. The plugin gets the
    /// live list and may add or remove rules.
    fn on_process_rule(&self, _rules: &mut RuleList, _key: &str, _scope: &mut RuleScope<'_>) {}

    /// Called for style rules after `on_process_rule`.
    fn on_process_style(&self, _rule: &mut StyleRule) {}

    /// Called before a rule's dynamic values are re-evaluated.
    fn on_update(&self, _data: &Value, _rule: &mut Rule) {}
}

/// The ordered plugin pipeline of a context.
#[derive(Default)]
pub struct Plugins {
    plugins: Vec<Box<dyn Plugin>>,
}

impl fmt::Debug for Plugins {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Plugins")
            .field("len", &self.plugins.len())
            .finish()
    }
}

impl Plugins {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, plugin: impl Plugin + 'static) {
        self.plugins.push(Box::new(plugin));
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    pub(crate) fn on_create_rule(
        &self,
        key: &str,
        declaration: &Declaration,
        options: &RuleOptions,
    ) -> Option<Rule> {
        self.plugins
            .iter()
            .find_map(|p| p.on_create_rule(key, declaration, options))
    }

    pub(crate) fn on_process_rule(&self, rules: &mut RuleList, key: &str, scope: &mut RuleScope<'_>) {
        for plugin in &self.plugins {
            plugin.on_process_rule(rules, key, scope);
        }
    }

    pub(crate) fn on_process_style(&self, rule: &mut StyleRule) {
        for plugin in &self.plugins {
            plugin.on_process_style(rule);
        }
    }

    pub(crate) fn on_update(&self, data: &Value, rule: &mut Rule) {
        for plugin in &self.plugins {
            plugin.on_update(data, rule);
        }
    }
}
