//! The style container adapter.
//!
//! A [`StyleContainer`] wraps one container element and is the only place
//! that calls mutating [`NativeEngine`] methods for a sheet. Engine errors
//! stop here: property and selector writes report `false`, rejected rule
//! text becomes a [`WarningKind::UnsupportedRuleText`] warning and `None`.
//!
//! The adapter tracks the native rules it inserted at the top level of the
//! container, in native order, so rules can be found again by handle for
//! deletion and replacement. A full [`deploy`](StyleContainer::deploy)
//! rebuilds that list from what the engine materialized.

use crate::config::{ContextConfig, SheetOptions, ToCssOptions};
use crate::engine::css_text::split_important;
use crate::engine::{CssRuleId, NativeEngine, NodeId, RuleParent};
use crate::error::{WarningKind, Warnings};
use crate::insertion::Placement;
use crate::rule::Rule;

#[derive(Debug, Clone)]
pub struct StyleContainer {
    element: NodeId,
    owned: bool,
    has_inserted_rules: bool,
    css_rules: Vec<CssRuleId>,
}

impl StyleContainer {
    /// Wraps `options.element`, or creates and tags a new container.
    pub fn new<E: NativeEngine + ?Sized>(
        engine: &mut E,
        options: &SheetOptions,
        config: &ContextConfig,
    ) -> Self {
        let (element, owned) = match options.element {
            Some(element) => (element, false),
            None => (engine.create_container(), true),
        };
        if owned {
            engine.set_attribute(element, "data-jss", "");
        }
        if let Some(media) = &options.media {
            engine.set_attribute(element, "media", media);
        }
        if let Some(meta) = &options.meta {
            engine.set_attribute(element, "data-meta", meta);
        }
        if let Some(nonce) = &config.nonce {
            engine.set_attribute(element, "nonce", nonce);
        }
        Self {
            element,
            owned,
            has_inserted_rules: false,
            css_rules: Vec::new(),
        }
    }

    pub fn element(&self) -> NodeId {
        self.element
    }

    /// `true` when the container was created here rather than supplied.
    pub fn is_owned(&self) -> bool {
        self.owned
    }

    /// `true` when rules were inserted one by one since the last deploy.
    pub fn has_inserted_rules(&self) -> bool {
        self.has_inserted_rules
    }

    pub fn property_value<E: NativeEngine + ?Sized>(
        &self,
        engine: &E,
        rule: CssRuleId,
        property: &str,
    ) -> Option<String> {
        engine.property_value(rule, property).ok()
    }

    /// Sets a property. A trailing `!important` becomes the important flag.
    pub fn set_property<E: NativeEngine + ?Sized>(
        &self,
        engine: &mut E,
        rule: CssRuleId,
        property: &str,
        value: &str,
    ) -> bool {
        let (value, important) = split_important(value);
        match engine.set_property(rule, property, value, important) {
            Ok(()) => true,
            Err(err) => {
                tracing::debug!(property, error = %err, "engine refused property");
                false
            }
        }
    }

    pub fn remove_property<E: NativeEngine + ?Sized>(
        &self,
        engine: &mut E,
        rule: CssRuleId,
        property: &str,
        warnings: &mut Warnings,
    ) -> bool {
        match engine.remove_property(rule, property) {
            Ok(()) => true,
            Err(err) => {
                warnings.emit(
                    WarningKind::RemovePropertyFailed,
                    format!("failed to remove property \"{}\": {}", property, err),
                );
                false
            }
        }
    }

    /// Rewrites a native rule's selector. Returns `false` when the engine
    /// did not take the new text.
    pub fn set_selector<E: NativeEngine + ?Sized>(
        &self,
        engine: &mut E,
        rule: CssRuleId,
        selector: &str,
    ) -> bool {
        engine.set_selector_text(rule, selector);
        engine.selector_text(rule).as_deref() == Some(selector)
    }

    /// Inserts the container at `placement`.
    ///
    /// Does nothing when the container already has a parent or there is no
    /// placement. Returns `true` when the caller must redeploy because rules
    /// were inserted one by one before the last detach.
    pub fn attach<E: NativeEngine + ?Sized>(
        &mut self,
        engine: &mut E,
        placement: Option<Placement>,
        deployed: bool,
    ) -> bool {
        if engine.parent_node(self.element).is_some() {
            return false;
        }
        let Some(placement) = placement else {
            return false;
        };
        engine.insert_before(placement.parent, self.element, placement.reference);
        if self.has_inserted_rules && deployed {
            self.has_inserted_rules = false;
            return true;
        }
        false
    }

    /// Removes the container from its parent.
    ///
    /// With `link`, the tracked rules are dropped and the text is reset,
    /// and `true` is returned: the content must be deployed again.
    pub fn detach<E: NativeEngine + ?Sized>(&mut self, engine: &mut E, link: bool) -> bool {
        let Some(parent) = engine.parent_node(self.element) else {
            return false;
        };
        engine.remove_child(parent, self.element);
        if link {
            self.css_rules.clear();
            engine.set_text_content(self.element, "\n");
            return true;
        }
        false
    }

    /// Replaces the container's text and refreshes the tracked rules.
    pub fn deploy<E: NativeEngine + ?Sized>(&mut self, engine: &mut E, text: &str) {
        engine.set_text_content(self.element, &format!("\n{}\n", text));
        self.css_rules = engine
            .css_rules(RuleParent::Sheet(self.element))
            .unwrap_or_default();
        self.has_inserted_rules = false;
        tracing::debug!(
            element = self.element.0,
            rules = self.css_rules.len(),
            "deployed container"
        );
    }

    /// The container's live native rules, empty while it is not connected.
    pub fn rules<E: NativeEngine + ?Sized>(&self, engine: &E) -> Vec<CssRuleId> {
        engine
            .css_rules(RuleParent::Sheet(self.element))
            .unwrap_or_default()
    }

    /// Inserts `rule` at `index` (clamped to the native list), binding it and
    /// any nested rules to their native counterparts.
    pub fn insert_rule<E: NativeEngine + ?Sized>(
        &mut self,
        engine: &mut E,
        rule: &mut Rule,
        index: Option<usize>,
        format: &ToCssOptions,
        warnings: &mut Warnings,
    ) -> Option<CssRuleId> {
        let parent = RuleParent::Sheet(self.element);
        let len = match engine.css_rules(parent) {
            Ok(rules) => rules.len(),
            Err(err) => {
                tracing::debug!(error = %err, "container has no rule list");
                return None;
            }
        };
        let at = index.map_or(len, |i| i.min(len));
        let native = insert_into(engine, parent, rule, at, format, warnings)?;
        let tracked = at.min(self.css_rules.len());
        self.css_rules.insert(tracked, native);
        self.has_inserted_rules = true;
        Some(native)
    }

    /// Deletes a tracked native rule. Returns `false` for unknown handles.
    pub fn delete_rule<E: NativeEngine + ?Sized>(&mut self, engine: &mut E, native: CssRuleId) -> bool {
        let Some(index) = self.index_of(native) else {
            return false;
        };
        if let Err(err) = engine.delete_rule(RuleParent::Sheet(self.element), index) {
            tracing::debug!(error = %err, "engine failed to delete rule");
            return false;
        }
        self.css_rules.remove(index);
        true
    }

    /// Replaces a tracked native rule with `rule` at the same position.
    pub fn replace_rule<E: NativeEngine + ?Sized>(
        &mut self,
        engine: &mut E,
        native: CssRuleId,
        rule: &mut Rule,
        format: &ToCssOptions,
        warnings: &mut Warnings,
    ) -> Option<CssRuleId> {
        let index = self.index_of(native)?;
        if !self.delete_rule(engine, native) {
            return None;
        }
        self.insert_rule(engine, rule, Some(index), format, warnings)
    }

    /// Position of a native rule among the tracked ones.
    pub fn index_of(&self, native: CssRuleId) -> Option<usize> {
        self.css_rules.iter().position(|r| *r == native)
    }
}

fn insert_into<E: NativeEngine + ?Sized>(
    engine: &mut E,
    parent: RuleParent,
    rule: &mut Rule,
    index: usize,
    format: &ToCssOptions,
    warnings: &mut Warnings,
) -> Option<CssRuleId> {
    if let Rule::Container(container) = rule {
        let shell = container.to_css(format, false);
        let native = insert_text(engine, parent, &shell, index, warnings)?;
        container.renderable = Some(native);
        let inner = RuleParent::Rule(native);
        let keys: Vec<String> = container.rules.keys().map(String::from).collect();
        for key in keys {
            let len = engine.css_rules(inner).map_or(0, |rules| rules.len());
            if let Some(child) = container.rules.get_mut(&key) {
                insert_into(engine, inner, child, len, format, warnings);
            }
        }
        return Some(native);
    }

    let text = rule.to_css(format);
    if text.is_empty() {
        return None;
    }
    let native = insert_text(engine, parent, &text, index, warnings)?;
    rule.set_renderable(Some(native));
    Some(native)
}

fn insert_text<E: NativeEngine + ?Sized>(
    engine: &mut E,
    parent: RuleParent,
    text: &str,
    index: usize,
    warnings: &mut Warnings,
) -> Option<CssRuleId> {
    match engine.insert_rule(parent, text, index) {
        Ok(native) => {
            tracing::trace!(index, "inserted rule");
            Some(native)
        }
        Err(err) => {
            warnings.emit(WarningKind::UnsupportedRuleText, err.to_string());
            None
        }
    }
}

/// Reads back how the engine normalizes selector text.
///
/// Selectors are written into a scratch container appended to the host
/// area, and the first rule's selector is read back. The scratch container
/// is created on first use and removed by [`finish`](Self::finish).
#[derive(Debug)]
pub struct SelectorProbe {
    host: Option<NodeId>,
    scratch: Option<NodeId>,
}

impl SelectorProbe {
    pub fn new(host: Option<NodeId>) -> Self {
        Self {
            host,
            scratch: None,
        }
    }

    /// The engine's form of `selector`, or `None` when it cannot be probed.
    pub fn probe<E: NativeEngine + ?Sized>(&mut self, engine: &mut E, selector: &str) -> Option<String> {
        let host = self.host?;
        let scratch = match self.scratch {
            Some(scratch) => scratch,
            None => {
                let scratch = engine.create_container();
                engine.insert_before(host, scratch, None);
                self.scratch = Some(scratch);
                scratch
            }
        };
        engine.set_text_content(scratch, &format!("{} {{}}", selector));
        let first = *engine.css_rules(RuleParent::Sheet(scratch)).ok()?.first()?;
        engine.selector_text(first)
    }

    /// Removes the scratch container.
    pub fn finish<E: NativeEngine + ?Sized>(self, engine: &mut E) {
        if let Some(scratch) = self.scratch {
            if let Some(parent) = engine.parent_node(scratch) {
                engine.remove_child(parent, scratch);
            }
        }
    }
}
