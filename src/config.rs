//! Configuration for contexts, sheets and serialization.
//!
//! [`ContextConfig`] and [`SheetOptions`] deserialize from YAML so an
//! application can keep its styling setup next to its other settings:
//!
//! ```yaml
//! nonce: abc123
//! insertion_point: app-styles
//! class_name_prefix: app-
//! format:
//!   format: false
//! ```
//!
//! Node references (an external container element, a node insertion point)
//! cannot come from a file and are set through the builder methods.

use std::path::Path;

use serde::{Deserialize, Deserializer};

use crate::engine::NodeId;
use crate::error::ConfigError;
use crate::insertion::InsertionPoint;

/// Controls how rules are serialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ToCssOptions {
    /// Indentation level of the outermost rules.
    pub indent: usize,
    /// `false` produces compact output without line breaks or indentation.
    pub format: bool,
    /// Serialize rules without properties as empty blocks instead of skipping
    /// them. Linked sheets need this so every rule gets a native counterpart.
    #[serde(skip)]
    pub allow_empty: bool,
}

impl Default for ToCssOptions {
    fn default() -> Self {
        Self {
            indent: 0,
            format: true,
            allow_empty: false,
        }
    }
}

impl ToCssOptions {
    /// Compact output.
    pub fn compact() -> Self {
        Self {
            format: false,
            ..Self::default()
        }
    }

    pub(crate) fn nested(&self) -> Self {
        Self {
            indent: self.indent + 1,
            ..*self
        }
    }

    pub(crate) fn indent_str(&self) -> String {
        if self.format {
            "  ".repeat(self.indent)
        } else {
            String::new()
        }
    }

    pub(crate) fn linebreak(&self) -> &'static str {
        if self.format {
            "\n"
        } else {
            ""
        }
    }

    /// Text placed between two serialized rules: a blank line at the top
    /// level, a line break inside a block.
    pub(crate) fn rule_separator(&self) -> &'static str {
        match (self.format, self.indent) {
            (false, _) => "",
            (true, 0) => "\n\n",
            (true, _) => "\n",
        }
    }

    pub(crate) fn space(&self) -> &'static str {
        if self.format {
            " "
        } else {
            ""
        }
    }
}

fn deserialize_marker<'de, D>(deserializer: D) -> Result<Option<InsertionPoint>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.map(InsertionPoint::Marker))
}

/// Settings shared by every sheet created in a [`StyleContext`](crate::StyleContext).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    /// CSP nonce set on every owned container.
    pub nonce: Option<String>,
    /// Insertion point for sheets that do not name one.
    #[serde(deserialize_with = "deserialize_marker")]
    pub insertion_point: Option<InsertionPoint>,
    /// Map engine-rewritten selectors back to their originals when linking.
    pub escape_compensation: bool,
    /// Prefix for every generated class name.
    pub class_name_prefix: String,
    /// Generate short class names without the rule key.
    pub minify_class_names: bool,
    /// Serialization used when deploying sheets.
    pub format: ToCssOptions,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            nonce: None,
            insertion_point: None,
            escape_compensation: true,
            class_name_prefix: String::new(),
            minify_class_names: false,
            format: ToCssOptions::default(),
        }
    }
}

impl ContextConfig {
    /// Parses a configuration from YAML text.
    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(text)?)
    }

    /// Reads and parses a YAML configuration file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&text)
    }
}

/// Options for a single [`StyleSheet`](crate::StyleSheet).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SheetOptions {
    /// Priority among sheets sharing an insertion point. When absent the
    /// sheet goes one above the highest index registered so far.
    pub index: Option<i32>,
    /// Value for the container's `media` attribute.
    pub media: Option<String>,
    /// Value for the container's `data-meta` attribute; also handed to the
    /// class name generator.
    pub meta: Option<String>,
    /// Bind rules to their native counterparts after deploying, so updates
    /// reach the engine directly.
    pub link: bool,
    #[serde(deserialize_with = "deserialize_marker")]
    pub insertion_point: Option<InsertionPoint>,
    /// Use an existing element as the container instead of creating one.
    #[serde(skip)]
    pub element: Option<NodeId>,
    /// Prefix for class names generated for this sheet.
    pub class_name_prefix: Option<String>,
}

impl SheetOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn index(mut self, index: i32) -> Self {
        self.index = Some(index);
        self
    }

    pub fn media(mut self, media: impl Into<String>) -> Self {
        self.media = Some(media.into());
        self
    }

    pub fn meta(mut self, meta: impl Into<String>) -> Self {
        self.meta = Some(meta.into());
        self
    }

    pub fn link(mut self, link: bool) -> Self {
        self.link = link;
        self
    }

    pub fn insertion_point(mut self, point: impl Into<InsertionPoint>) -> Self {
        self.insertion_point = Some(point.into());
        self
    }

    pub fn element(mut self, element: NodeId) -> Self {
        self.element = Some(element);
        self
    }

    pub fn class_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.class_name_prefix = Some(prefix.into());
        self
    }
}
