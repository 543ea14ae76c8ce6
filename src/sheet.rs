//! Style sheets: a rule list plus the container that renders it.
//!
//! A sheet goes through three states:
//!
//! - **detached**: rules live only in the [`RuleList`]; adding rules marks
//!   the sheet as not deployed.
//! - **attached, deployed**: the container is in the document and holds the
//!   serialized rules. New rules are inserted into the engine one at a time.
//! - **attached, linked**: with [`SheetOptions::link`], every rule is bound
//!   to its native counterpart, so property updates go straight to the
//!   engine.
//!
//! Engines drop rules that were inserted one at a time when a container
//! leaves the document. The container remembers whether that happened, and
//! the next attach redeploys the whole sheet.

use std::collections::HashMap;

use serde_json::Value;

use crate::config::{SheetOptions, ToCssOptions};
use crate::context::StyleContext;
use crate::engine::{NativeEngine, NodeId};
use crate::insertion::{self, InsertionPoint};
use crate::linker;
use crate::registry::{SheetId, SheetMeta, SheetRecord};
use crate::renderer::StyleContainer;
use crate::rule::{Declaration, Rule, RuleOptions};
use crate::rules::{PropertyChange, RuleList};

#[derive(Debug)]
pub struct StyleSheet {
    meta: SheetMeta,
    options: SheetOptions,
    index: i32,
    insertion_point: Option<InsertionPoint>,
    rules: RuleList,
    classes: HashMap<String, String>,
    renderer: StyleContainer,
    attached: bool,
    deployed: bool,
}

impl StyleSheet {
    /// Creates a sheet, registers it with the context and builds its rules
    /// from the top-level entries of `styles`.
    pub fn new<E: NativeEngine>(
        ctx: &mut StyleContext<E>,
        styles: &Declaration,
        options: SheetOptions,
    ) -> Self {
        let id = ctx.next_sheet_id();
        let index = options.index.unwrap_or_else(|| ctx.registry.next_index());
        let insertion_point = options
            .insertion_point
            .clone()
            .or_else(|| ctx.config.insertion_point.clone());
        let renderer = StyleContainer::new(&mut ctx.engine, &options, &ctx.config);
        ctx.registry.register(SheetRecord {
            id,
            index,
            insertion_point: insertion_point.clone(),
            element: renderer.element(),
            attached: false,
        });

        let meta = SheetMeta {
            id,
            meta: options.meta.clone(),
            class_name_prefix: options.class_name_prefix.clone(),
        };
        let mut classes = HashMap::new();
        let mut rules = RuleList::new();
        {
            let mut scope = ctx.rule_scope(&mut classes, &meta);
            for (name, declaration) in styles.entries() {
                rules.add(name, declaration, RuleOptions::default(), &mut scope);
            }
            rules.process(&mut scope);
        }
        tracing::debug!(sheet = id.0, index, rules = rules.len(), "created sheet");

        Self {
            meta,
            options,
            index,
            insertion_point,
            rules,
            classes,
            renderer,
            attached: false,
            deployed: false,
        }
    }

    /// Builds a sheet from JSON style data.
    pub fn from_json<E: NativeEngine>(
        ctx: &mut StyleContext<E>,
        styles: &Value,
        options: SheetOptions,
    ) -> Result<Self, crate::error::DeclarationError> {
        let styles = Declaration::from_json(styles)?;
        Ok(Self::new(ctx, &styles, options))
    }

    pub fn id(&self) -> SheetId {
        self.meta.id
    }

    pub fn index(&self) -> i32 {
        self.index
    }

    pub fn insertion_point(&self) -> Option<&InsertionPoint> {
        self.insertion_point.as_ref()
    }

    pub fn options(&self) -> &SheetOptions {
        &self.options
    }

    pub fn element(&self) -> NodeId {
        self.renderer.element()
    }

    pub fn is_attached(&self) -> bool {
        self.attached
    }

    pub fn is_deployed(&self) -> bool {
        self.deployed
    }

    pub fn rules(&self) -> &RuleList {
        &self.rules
    }

    /// Rule key to generated class name.
    pub fn classes(&self) -> &HashMap<String, String> {
        &self.classes
    }

    /// Places the container in the document and deploys it if needed.
    pub fn attach<E: NativeEngine>(&mut self, ctx: &mut StyleContext<E>) -> &mut Self {
        if self.attached {
            return self;
        }
        let host = ctx.host_area();
        let placement = insertion::resolve(
            &ctx.engine,
            &ctx.registry,
            host,
            self.meta.id,
            self.index,
            self.insertion_point.as_ref(),
            &mut ctx.warnings,
        );
        let redeploy = self.renderer.attach(&mut ctx.engine, placement, self.deployed);
        if ctx.engine.parent_node(self.renderer.element()).is_none() {
            tracing::debug!(sheet = self.meta.id.0, "container has no place in the document");
            return self;
        }
        self.attached = true;
        ctx.registry.set_attached(self.meta.id, true);
        if redeploy || !self.deployed {
            self.deploy(ctx);
        } else if self.options.link {
            self.link(ctx);
        }
        self
    }

    /// Removes the container from the document.
    pub fn detach<E: NativeEngine>(&mut self, ctx: &mut StyleContext<E>) -> &mut Self {
        if !self.attached {
            return self;
        }
        if self.renderer.detach(&mut ctx.engine, self.options.link) {
            self.rules.unlink();
            self.deployed = false;
        }
        self.attached = false;
        ctx.registry.set_attached(self.meta.id, false);
        self
    }

    /// Writes the serialized rules into the container, replacing its
    /// content, and relinks when the sheet is linked.
    pub fn deploy<E: NativeEngine>(&mut self, ctx: &mut StyleContext<E>) -> &mut Self {
        let format = ToCssOptions {
            allow_empty: self.options.link,
            ..ctx.config.format
        };
        let text = self.rules.to_css(&format);
        self.renderer.deploy(&mut ctx.engine, &text);
        self.rules.unlink();
        self.deployed = true;
        if self.options.link {
            self.link(ctx);
        }
        self
    }

    /// Binds rules to the native rules of the container. Returns the number
    /// of rules bound.
    pub fn link<E: NativeEngine>(&mut self, ctx: &mut StyleContext<E>) -> usize {
        let natives = self.renderer.rules(&ctx.engine);
        let unescaped = if ctx.config.escape_compensation {
            let host = ctx.host_area();
            linker::unescaped_selectors(&mut ctx.engine, host, &self.rules)
        } else {
            HashMap::new()
        };
        linker::link(&ctx.engine, &mut self.rules, &natives, &unescaped)
    }

    /// Adds a rule and, on a deployed sheet, inserts it into the engine.
    pub fn add_rule<E: NativeEngine>(
        &mut self,
        ctx: &mut StyleContext<E>,
        name: &str,
        declaration: &Declaration,
        options: RuleOptions,
    ) -> Option<&Rule> {
        let key = {
            let mut scope = ctx.rule_scope(&mut self.classes, &self.meta);
            let key = self.rules.add(name, declaration, options, &mut scope)?.key().to_string();
            self.rules.process_rule(&key, &mut scope);
            key
        };
        if self.attached {
            if self.deployed {
                self.insert_native(ctx, &key);
            }
        } else {
            self.deployed = false;
        }
        self.rules.get(&key)
    }

    /// Replaces a rule in place. Adds it when there is no rule under `name`.
    pub fn replace_rule<E: NativeEngine>(
        &mut self,
        ctx: &mut StyleContext<E>,
        name: &str,
        declaration: &Declaration,
        options: RuleOptions,
    ) -> Option<&Rule> {
        let Some(old) = self.rules.get(name) else {
            return self.add_rule(ctx, name, declaration, options);
        };
        let old_native = old.renderable();
        let key = {
            let mut scope = ctx.rule_scope(&mut self.classes, &self.meta);
            let key = self
                .rules
                .replace(name, declaration, options, &mut scope)
                .map(|rule| rule.key().to_string());
            if let Some(key) = &key {
                self.rules.process_rule(key, &mut scope);
            }
            key
        };
        if !self.attached {
            self.deployed = false;
            return key.and_then(|key| self.rules.get(&key));
        }
        if !self.deployed {
            return key.and_then(|key| self.rules.get(&key));
        }
        let format = ctx.config.format;
        match (&key, old_native) {
            (None, Some(native)) => {
                self.renderer.delete_rule(&mut ctx.engine, native);
            }
            (Some(key), Some(native)) => {
                if let Some(rule) = self.rules.get_mut(key) {
                    self.renderer
                        .replace_rule(&mut ctx.engine, native, rule, &format, &mut ctx.warnings);
                }
            }
            (Some(key), None) => self.insert_native(ctx, key),
            (None, None) => {}
        }
        key.and_then(|key| self.rules.get(&key))
    }

    /// Deletes a rule. On an attached sheet only rules bound to a native
    /// rule can be deleted.
    pub fn delete_rule<E: NativeEngine>(&mut self, ctx: &mut StyleContext<E>, name: &str) -> bool {
        let Some(rule) = self.rules.get(name) else {
            return false;
        };
        let native = rule.renderable();
        if self.attached && native.is_none() {
            return false;
        }
        if let Some(Rule::Style(_)) = self.rules.remove(name) {
            self.classes.remove(name);
        }
        match native {
            Some(native) if self.attached => self.renderer.delete_rule(&mut ctx.engine, native),
            _ => true,
        }
    }

    pub fn get_rule(&self, name: &str) -> Option<&Rule> {
        self.rules.get(name)
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.rules.index_of(name)
    }

    /// Re-evaluates the dynamic values of one rule and mirrors the changes
    /// into the engine. Returns the number of changed properties.
    pub fn update_one<E: NativeEngine>(
        &mut self,
        ctx: &mut StyleContext<E>,
        key: &str,
        data: &Value,
    ) -> usize {
        let changes = self.rules.update_one(key, data, &ctx.plugins);
        self.apply_changes(ctx, &changes);
        changes.len()
    }

    /// Re-evaluates the dynamic values of every rule.
    pub fn update_all<E: NativeEngine>(&mut self, ctx: &mut StyleContext<E>, data: &Value) -> usize {
        let changes = self.rules.update_all(data, &ctx.plugins);
        self.apply_changes(ctx, &changes);
        changes.len()
    }

    /// Sets or removes a property of a style rule, in the engine too when
    /// the rule is bound. Returns `false` when there is no such style rule.
    pub fn set_prop<E: NativeEngine>(
        &mut self,
        ctx: &mut StyleContext<E>,
        key: &str,
        property: &str,
        value: Option<&str>,
    ) -> bool {
        let Some(style) = self.rules.get_mut(key).and_then(Rule::as_style_mut) else {
            return false;
        };
        if !style.set_prop(property, value) {
            return true;
        }
        let change = PropertyChange {
            renderable: style.renderable(),
            property: property.to_string(),
            value: value.map(String::from),
        };
        if change.renderable.is_none() && self.attached {
            tracing::debug!(rule = key, "rule is not linked, property change stays local");
        }
        self.apply_changes(ctx, std::slice::from_ref(&change));
        true
    }

    /// Changes a style rule's selector. A bound native rule is rewritten;
    /// when the engine ignores the rewrite the native rule is replaced.
    pub fn set_selector<E: NativeEngine>(
        &mut self,
        ctx: &mut StyleContext<E>,
        key: &str,
        selector: &str,
    ) -> bool {
        if !self.rules.set_selector(key, selector) {
            return false;
        }
        let Some(rule) = self.rules.get_mut(key) else {
            return false;
        };
        let Some(native) = rule.renderable() else {
            return true;
        };
        if !self.renderer.set_selector(&mut ctx.engine, native, selector) {
            let format = ctx.config.format;
            self.renderer
                .replace_rule(&mut ctx.engine, native, rule, &format, &mut ctx.warnings);
        }
        true
    }

    /// Reads a property from the native rule bound to `key`.
    pub fn native_property<E: NativeEngine>(
        &self,
        ctx: &StyleContext<E>,
        key: &str,
        property: &str,
    ) -> Option<String> {
        let native = self.rules.get(key)?.renderable()?;
        self.renderer.property_value(&ctx.engine, native, property)
    }

    pub fn to_css(&self, options: &ToCssOptions) -> String {
        self.rules.to_css(options)
    }

    fn insert_native<E: NativeEngine>(&mut self, ctx: &mut StyleContext<E>, key: &str) {
        let index = self.native_index(&ctx.engine, &ctx.config.format, key);
        let format = ctx.config.format;
        if let Some(rule) = self.rules.get_mut(key) {
            self.renderer
                .insert_rule(&mut ctx.engine, rule, index, &format, &mut ctx.warnings);
        }
    }

    /// Native position for the rule under `key`: right after the closest
    /// earlier rule that has a native counterpart. Rules that render nothing
    /// or were rejected by the engine take no slot.
    fn native_index<E: NativeEngine>(&self, engine: &E, format: &ToCssOptions, key: &str) -> Option<usize> {
        let position = self.rules.index_of(key)?;
        let natives = self.renderer.rules(engine);
        let format = ToCssOptions {
            allow_empty: self.options.link,
            ..*format
        };
        let earlier: Vec<&str> = self.rules.keys().take(position).collect();
        let mut deployed = 0;
        for rule in earlier.iter().rev().filter_map(|k| self.rules.get(k)) {
            if let Some(at) = rule
                .renderable()
                .and_then(|native| natives.iter().position(|n| *n == native))
            {
                return Some(at + 1 + deployed);
            }
            // Unlinked sheets keep no bindings for deployed rules.
            if !self.options.link && !rule.to_css(&format).is_empty() {
                deployed += 1;
            }
        }
        Some(deployed)
    }

    fn apply_changes<E: NativeEngine>(&self, ctx: &mut StyleContext<E>, changes: &[PropertyChange]) {
        for change in changes {
            let Some(native) = change.renderable else {
                continue;
            };
            match &change.value {
                Some(value) => {
                    self.renderer
                        .set_property(&mut ctx.engine, native, &change.property, value);
                }
                None => {
                    self.renderer.remove_property(
                        &mut ctx.engine,
                        native,
                        &change.property,
                        &mut ctx.warnings,
                    );
                }
            }
        }
    }
}
