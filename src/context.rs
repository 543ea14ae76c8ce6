//! The long-lived context shared by every sheet.

use std::collections::HashMap;

use once_cell::unsync::OnceCell;

use crate::config::ContextConfig;
use crate::engine::{NativeEngine, NodeId};
use crate::error::{Warning, Warnings};
use crate::naming::{ClassNameGenerator, GenerateId};
use crate::plugins::{Plugin, Plugins};
use crate::registry::{SheetId, SheetMeta, SheetsRegistry};
use crate::rules::RuleScope;

/// Owns the engine, the registry of sheets, the plugin pipeline and the
/// warning log.
///
/// Sheets borrow the context for every operation that touches the document,
/// so all sheets of a document must be created from the same context.
///
/// The host area is looked up on first use and cached. It is never checked
/// again; replacing the host area afterwards leaves the context pointing at
/// the old one.
pub struct StyleContext<E: NativeEngine> {
    pub(crate) engine: E,
    pub(crate) registry: SheetsRegistry,
    host: OnceCell<Option<NodeId>>,
    pub(crate) plugins: Plugins,
    generate_id: Box<dyn GenerateId>,
    pub(crate) config: ContextConfig,
    pub(crate) warnings: Warnings,
    next_sheet: usize,
}

impl<E: NativeEngine> std::fmt::Debug for StyleContext<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StyleContext")
            .field("registry", &self.registry)
            .field("host", &self.host.get())
            .field("plugins", &self.plugins)
            .field("config", &self.config)
            .field("warnings", &self.warnings)
            .finish_non_exhaustive()
    }
}

impl<E: NativeEngine> StyleContext<E> {
    pub fn new(engine: E) -> Self {
        Self::with_config(engine, ContextConfig::default())
    }

    pub fn with_config(engine: E, config: ContextConfig) -> Self {
        let generator =
            ClassNameGenerator::new(config.class_name_prefix.clone(), config.minify_class_names);
        Self {
            engine,
            registry: SheetsRegistry::new(),
            host: OnceCell::new(),
            plugins: Plugins::new(),
            generate_id: Box::new(generator),
            config,
            warnings: Warnings::new(),
            next_sheet: 0,
        }
    }

    /// Appends a plugin to the pipeline.
    pub fn use_plugin(&mut self, plugin: impl Plugin + 'static) -> &mut Self {
        self.plugins.push(plugin);
        self
    }

    /// Replaces the class name generator.
    pub fn set_generate_id(&mut self, generate_id: impl GenerateId + 'static) -> &mut Self {
        self.generate_id = Box::new(generate_id);
        self
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    pub fn registry(&self) -> &SheetsRegistry {
        &self.registry
    }

    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    pub fn host_area(&self) -> Option<NodeId> {
        *self.host.get_or_init(|| self.engine.host_area())
    }

    /// Warnings absorbed so far.
    pub fn warnings(&self) -> &[Warning] {
        self.warnings.as_slice()
    }

    pub fn take_warnings(&mut self) -> Vec<Warning> {
        self.warnings.take()
    }

    pub fn into_engine(self) -> E {
        self.engine
    }

    pub(crate) fn next_sheet_id(&mut self) -> SheetId {
        let id = SheetId(self.next_sheet);
        self.next_sheet += 1;
        id
    }

    pub(crate) fn rule_scope<'a>(
        &'a mut self,
        classes: &'a mut HashMap<String, String>,
        sheet: &'a SheetMeta,
    ) -> RuleScope<'a> {
        RuleScope {
            plugins: &self.plugins,
            generate_id: self.generate_id.as_ref(),
            classes,
            sheet,
            warnings: &mut self.warnings,
        }
    }
}
