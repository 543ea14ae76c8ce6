//! Style rules: a selector and an ordered list of properties.

use serde_json::Value;

use super::block;
use super::declaration::{Declaration, PropValue};
use crate::config::ToCssOptions;
use crate::engine::CssRuleId;

/// One property of a style rule.
#[derive(Debug, Clone)]
pub struct Property {
    name: String,
    source: PropValue,
    value: Option<String>,
}

impl Property {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current value; `None` while unset (a dynamic value before the first
    /// update, or one that evaluated to nothing).
    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    pub fn is_dynamic(&self) -> bool {
        self.source.is_dynamic()
    }
}

/// A rule with a selector.
#[derive(Debug, Clone)]
pub struct StyleRule {
    key: String,
    selector: String,
    class_name: Option<String>,
    props: Vec<Property>,
    pub(crate) renderable: Option<CssRuleId>,
}

impl StyleRule {
    /// Builds a rule from the property entries of `declaration`. Nested
    /// blocks are not properties and are skipped.
    pub fn new(
        key: impl Into<String>,
        selector: impl Into<String>,
        class_name: Option<String>,
        declaration: &Declaration,
    ) -> Self {
        let key = key.into();
        let mut props = Vec::new();
        for (name, entry) in declaration.entries() {
            match entry {
                Declaration::Value(source) => props.push(Property {
                    name: name.clone(),
                    value: source.as_static().map(String::from),
                    source: source.clone(),
                }),
                Declaration::Block(_) => {
                    tracing::debug!(rule = %key, entry = %name, "skipping nested block in style rule");
                }
            }
        }
        Self {
            key,
            selector: selector.into(),
            class_name,
            props,
            renderable: None,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn selector(&self) -> &str {
        &self.selector
    }

    pub(crate) fn set_selector_text(&mut self, selector: String) {
        self.selector = selector;
    }

    /// Generated class name, when the selector came from the generator or
    /// the sheet's class map.
    pub fn class_name(&self) -> Option<&str> {
        self.class_name.as_deref()
    }

    pub fn renderable(&self) -> Option<CssRuleId> {
        self.renderable
    }

    pub fn props(&self) -> &[Property] {
        &self.props
    }

    /// Current value of a property.
    pub fn prop(&self, name: &str) -> Option<&str> {
        self.props
            .iter()
            .find(|p| p.name == name)
            .and_then(|p| p.value.as_deref())
    }

    /// Sets a property to a fixed value, or removes it with `None`.
    ///
    /// Returns `true` when the current value changed.
    pub fn set_prop(&mut self, name: &str, value: Option<&str>) -> bool {
        match (self.props.iter().position(|p| p.name == name), value) {
            (Some(pos), Some(value)) => {
                let prop = &mut self.props[pos];
                let changed = prop.value.as_deref() != Some(value);
                prop.source = PropValue::Static(value.to_string());
                prop.value = Some(value.to_string());
                changed
            }
            (Some(pos), None) => self.props.remove(pos).value.is_some(),
            (None, Some(value)) => {
                self.props.push(Property {
                    name: name.to_string(),
                    source: PropValue::Static(value.to_string()),
                    value: Some(value.to_string()),
                });
                true
            }
            (None, None) => false,
        }
    }

    /// Re-evaluates dynamic properties against `data` and returns the ones
    /// whose value changed.
    pub fn regenerate(&mut self, data: &Value) -> Vec<(String, Option<String>)> {
        let mut changed = Vec::new();
        for prop in &mut self.props {
            if let PropValue::Dynamic(f) = &prop.source {
                let next = f.evaluate(data);
                if next != prop.value {
                    prop.value = next.clone();
                    changed.push((prop.name.clone(), next));
                }
            }
        }
        changed
    }

    /// `true` when no property currently has a value.
    pub fn is_empty(&self) -> bool {
        self.props.iter().all(|p| p.value.is_none())
    }

    pub fn to_css(&self, options: &ToCssOptions) -> String {
        if self.is_empty() && !options.allow_empty {
            return String::new();
        }
        let sep = options.space();
        let lines: Vec<String> = self
            .props
            .iter()
            .filter_map(|p| {
                p.value
                    .as_deref()
                    .map(|v| format!("{}:{}{};", p.name, sep, v))
            })
            .collect();
        block(&self.selector, &lines, options)
    }
}
