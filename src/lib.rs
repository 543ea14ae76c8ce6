//! # Rulesheet - Style Sheets Synchronized With a Native Engine
//!
//! Rulesheet keeps ordered collections of style rules ("sheets") in step with
//! a native rendering engine that materializes CSS. It places each sheet's
//! container in the host document relative to the other sheets, deploys the
//! serialized rules, and binds the engine's parsed rules back to the rules
//! that produced them so later updates can go straight to the engine.
//!
//! ## Quick Start
//!
//! ```rust
//! use rulesheet::{Declaration, MemoryDocument, SheetOptions, StyleContext, StyleSheet};
//!
//! let mut ctx = StyleContext::new(MemoryDocument::new());
//! let styles = Declaration::new()
//!     .nest("button", Declaration::new().set("color", "red"));
//!
//! let mut sheet = StyleSheet::new(&mut ctx, &styles, SheetOptions::new());
//! sheet.attach(&mut ctx);
//!
//! assert_eq!(sheet.classes()["button"], "button-0-1");
//! assert_eq!(
//!     ctx.engine().materialized_text(sheet.element()),
//!     ".button-0-1 { color: red; }"
//! );
//! ```
//!
//! ## Concepts
//!
//! - [`StyleContext`]: owns the engine and the registry of every sheet.
//!   All sheets of a document share one context.
//! - [`StyleSheet`]: a [`RuleList`] plus the [`StyleContainer`] it renders
//!   into.
//! - [`NativeEngine`]: the boundary to the rendering engine.
//!   [`MemoryDocument`] implements it in memory.
//! - [`InsertionPoint`]: a marker comment or node that a group of sheets is
//!   placed after. Sheets with the same insertion point are ordered by
//!   [`SheetOptions::index`].
//!
//! ## Failure Handling
//!
//! Engine failures never surface as errors. Refused property and selector
//! writes return `false`, rejected rule text and missing insertion points
//! become [`Warning`]s, logged through `tracing` and kept in
//! [`StyleContext::warnings`].

pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod insertion;
pub mod linker;
pub mod naming;
pub mod plugins;
pub mod registry;
pub mod renderer;
pub mod rule;
pub mod rules;
pub mod sheet;

pub use config::{ContextConfig, SheetOptions, ToCssOptions};
pub use context::StyleContext;
pub use engine::{
    CssRuleId, CssRuleKind, EngineQuirks, MemoryDocument, NativeEngine, NodeId, RuleParent,
};
pub use error::{ConfigError, DeclarationError, EngineError, Warning, WarningKind, Warnings};
pub use insertion::{InsertionPoint, Placement, DEFAULT_MARKER};
pub use naming::{ClassNameGenerator, GenerateId};
pub use plugins::{Plugin, Plugins};
pub use registry::{SheetId, SheetMeta, SheetRecord, SheetsRegistry};
pub use renderer::{SelectorProbe, StyleContainer};
pub use rule::{
    AtKind, ContainerRule, Declaration, DynamicValue, OpaqueRule, PropValue, Property, Rule,
    RuleOptions, StyleRule,
};
pub use rules::{PropertyChange, RuleList, RuleScope};
pub use sheet::StyleSheet;
