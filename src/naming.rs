//! Class name generation and escaping.

use std::cell::Cell;

use crate::registry::SheetMeta;

/// Produces the class name for a style rule that has no selector of its own.
pub trait GenerateId {
    fn generate_id(&self, rule_key: &str, sheet: &SheetMeta) -> String;
}

impl<F> GenerateId for F
where
    F: Fn(&str, &SheetMeta) -> String,
{
    fn generate_id(&self, rule_key: &str, sheet: &SheetMeta) -> String {
        self(rule_key, sheet)
    }
}

/// Default generator: `{prefix}{key}-{sheet}-{n}`, or `{prefix}c{sheet}-{n}`
/// when minified. `n` counts every class this generator produced.
#[derive(Debug, Default)]
pub struct ClassNameGenerator {
    prefix: String,
    minify: bool,
    counter: Cell<u64>,
}

impl ClassNameGenerator {
    pub fn new(prefix: impl Into<String>, minify: bool) -> Self {
        Self {
            prefix: prefix.into(),
            minify,
            counter: Cell::new(0),
        }
    }
}

impl GenerateId for ClassNameGenerator {
    fn generate_id(&self, rule_key: &str, sheet: &SheetMeta) -> String {
        let n = self.counter.get() + 1;
        self.counter.set(n);
        let sheet_prefix = sheet.class_name_prefix.as_deref().unwrap_or("");
        if self.minify {
            format!("{}{}c{}-{}", self.prefix, sheet_prefix, sheet.id.0, n)
        } else {
            format!("{}{}{}-{}-{}", self.prefix, sheet_prefix, rule_key, sheet.id.0, n)
        }
    }
}

/// Escapes text for use as a CSS identifier.
pub fn escape(ident: &str) -> String {
    let mut out = String::with_capacity(ident.len());
    match cssparser::serialize_identifier(ident, &mut out) {
        Ok(()) => out,
        Err(_) => ident.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::SheetId;

    fn meta(id: usize) -> SheetMeta {
        SheetMeta {
            id: SheetId(id),
            meta: None,
            class_name_prefix: None,
        }
    }

    #[test]
    fn test_generator_counts_across_sheets() {
        let generator = ClassNameGenerator::default();
        assert_eq!(generator.generate_id("button", &meta(0)), "button-0-1");
        assert_eq!(generator.generate_id("title", &meta(1)), "title-1-2");
    }

    #[test]
    fn test_generator_minified_with_prefixes() {
        let generator = ClassNameGenerator::new("app-", true);
        let mut sheet = meta(3);
        sheet.class_name_prefix = Some("x".to_string());
        assert_eq!(generator.generate_id("button", &sheet), "app-xc3-1");
    }

    #[test]
    fn test_minified_names_do_not_collide_across_sheets() {
        let first = ClassNameGenerator::new("", true);
        let second = ClassNameGenerator::new("", true);
        let mut twenty_third = String::new();
        for _ in 0..23 {
            twenty_third = first.generate_id("a", &meta(1));
        }
        let mut third = String::new();
        for _ in 0..3 {
            third = second.generate_id("a", &meta(12));
        }
        assert_eq!(twenty_third, "c1-23");
        assert_eq!(third, "c12-3");
    }

    #[test]
    fn test_closure_generator() {
        let generator = |key: &str, _: &SheetMeta| format!("my-{}", key);
        assert_eq!(generator.generate_id("a", &meta(0)), "my-a");
    }

    #[test]
    fn test_escape() {
        assert_eq!(escape("button-0-1"), "button-0-1");
        assert_eq!(escape("a:b"), "a\\:b");
        assert_eq!(escape("1a"), "\\31 a");
    }
}
