//! Style declarations: the input rules are built from.

use std::fmt;
use std::rc::Rc;

use serde_json::Value;

use crate::error::DeclarationError;

/// A property value computed from update data.
///
/// Returning `None` unsets the property.
#[derive(Clone)]
pub struct DynamicValue(Rc<dyn Fn(&Value) -> Option<String>>);

impl DynamicValue {
    pub fn new(f: impl Fn(&Value) -> Option<String> + 'static) -> Self {
        Self(Rc::new(f))
    }

    pub fn evaluate(&self, data: &Value) -> Option<String> {
        (self.0)(data)
    }
}

impl fmt::Debug for DynamicValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DynamicValue(..)")
    }
}

/// A property value: fixed text, or a function of update data.
#[derive(Debug, Clone)]
pub enum PropValue {
    Static(String),
    Dynamic(DynamicValue),
}

impl PropValue {
    pub fn is_dynamic(&self) -> bool {
        matches!(self, PropValue::Dynamic(_))
    }

    /// The static text, if this value is not dynamic.
    pub fn as_static(&self) -> Option<&str> {
        match self {
            PropValue::Static(s) => Some(s),
            PropValue::Dynamic(_) => None,
        }
    }
}

impl From<&str> for PropValue {
    fn from(s: &str) -> Self {
        PropValue::Static(s.to_string())
    }
}

impl From<String> for PropValue {
    fn from(s: String) -> Self {
        PropValue::Static(s)
    }
}

impl From<i32> for PropValue {
    fn from(n: i32) -> Self {
        PropValue::Static(n.to_string())
    }
}

impl From<i64> for PropValue {
    fn from(n: i64) -> Self {
        PropValue::Static(n.to_string())
    }
}

impl From<f64> for PropValue {
    fn from(n: f64) -> Self {
        PropValue::Static(n.to_string())
    }
}

impl From<DynamicValue> for PropValue {
    fn from(d: DynamicValue) -> Self {
        PropValue::Dynamic(d)
    }
}

/// A style declaration.
///
/// A block maps names to nested declarations, in order. What a name means
/// depends on where the block is used: at the top of a sheet names are rule
/// names, inside a style rule they are properties, inside `@keyframes` they
/// are frame steps.
///
/// # Example
///
/// ```rust
/// use rulesheet::Declaration;
///
/// let styles = Declaration::new()
///     .nest("button", Declaration::new().set("color", "red").set("margin", 0))
///     .nest(
///         "@keyframes pulse",
///         Declaration::new()
///             .nest("from", Declaration::new().set("opacity", 0))
///             .nest("to", Declaration::new().set("opacity", 1)),
///     );
/// assert_eq!(styles.entries().len(), 2);
/// ```
#[derive(Debug, Clone)]
pub enum Declaration {
    Value(PropValue),
    Block(Vec<(String, Declaration)>),
}

impl Declaration {
    /// Creates an empty block.
    pub fn new() -> Self {
        Declaration::Block(Vec::new())
    }

    /// Creates a plain value declaration, used for at-statements like `@import`.
    pub fn value(value: impl Into<PropValue>) -> Self {
        Declaration::Value(value.into())
    }

    /// Sets a property, replacing an earlier entry of the same name.
    pub fn set(self, name: &str, value: impl Into<PropValue>) -> Self {
        self.entry(name, Declaration::Value(value.into()))
    }

    /// Sets a property computed from update data.
    pub fn dynamic(self, name: &str, f: impl Fn(&Value) -> Option<String> + 'static) -> Self {
        self.set(name, DynamicValue::new(f))
    }

    /// Adds a nested block.
    pub fn nest(self, name: &str, declaration: Declaration) -> Self {
        self.entry(name, declaration)
    }

    fn entry(self, name: &str, declaration: Declaration) -> Self {
        let mut entries = match self {
            Declaration::Block(entries) => entries,
            Declaration::Value(_) => Vec::new(),
        };
        match entries.iter_mut().find(|(n, _)| n == name) {
            Some(slot) => slot.1 = declaration,
            None => entries.push((name.to_string(), declaration)),
        }
        Declaration::Block(entries)
    }

    /// Block entries in order; empty for a plain value.
    pub fn entries(&self) -> &[(String, Declaration)] {
        match self {
            Declaration::Block(entries) => entries,
            Declaration::Value(_) => &[],
        }
    }

    pub fn is_block(&self) -> bool {
        matches!(self, Declaration::Block(_))
    }

    pub fn as_value(&self) -> Option<&PropValue> {
        match self {
            Declaration::Value(v) => Some(v),
            Declaration::Block(_) => None,
        }
    }

    /// Builds a declaration from JSON-like data.
    ///
    /// Objects become blocks, strings and numbers become values. Arrays are
    /// joined with `", "`; an array nested in an array is joined with spaces,
    /// so `[["1px", "solid"], "red"]` becomes `"1px solid, red"`.
    pub fn from_json(value: &Value) -> Result<Self, DeclarationError> {
        from_json_at(value, "")
    }
}

impl Default for Declaration {
    fn default() -> Self {
        Self::new()
    }
}

impl TryFrom<&Value> for Declaration {
    type Error = DeclarationError;

    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        Declaration::from_json(value)
    }
}

fn from_json_at(value: &Value, path: &str) -> Result<Declaration, DeclarationError> {
    match value {
        Value::Object(map) => {
            let mut entries = Vec::with_capacity(map.len());
            for (name, nested) in map {
                let nested_path = if path.is_empty() {
                    name.clone()
                } else {
                    format!("{}.{}", path, name)
                };
                entries.push((name.clone(), from_json_at(nested, &nested_path)?));
            }
            Ok(Declaration::Block(entries))
        }
        other => Ok(Declaration::Value(PropValue::Static(scalar_text(other, path, true)?))),
    }
}

fn scalar_text(value: &Value, path: &str, allow_nesting: bool) -> Result<String, DeclarationError> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Array(items) if allow_nesting => {
            let parts = items
                .iter()
                .map(|item| match item {
                    Value::Array(inner) => inner
                        .iter()
                        .map(|v| scalar_text(v, path, false))
                        .collect::<Result<Vec<_>, _>>()
                        .map(|words| words.join(" ")),
                    other => scalar_text(other, path, false),
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(parts.join(", "))
        }
        Value::Array(_) => Err(unsupported(path, "deeply nested array")),
        Value::Null => Err(unsupported(path, "null")),
        Value::Bool(_) => Err(unsupported(path, "boolean")),
        Value::Object(_) => Err(unsupported(path, "object inside array")),
    }
}

fn unsupported(path: &str, kind: &'static str) -> DeclarationError {
    DeclarationError::UnsupportedValue {
        path: path.to_string(),
        kind,
    }
}
