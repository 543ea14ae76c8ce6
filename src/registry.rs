//! The registry of every sheet created in a context.
//!
//! Sheets are registered when they are created and stay registered for the
//! lifetime of the context; detaching only clears the `attached` flag. The
//! [insertion resolver](crate::insertion) scans this list to place new
//! containers relative to the ones already in the document.
//!
//! # Ordering
//!
//! Records are kept in registration order. A sheet's `index` is not used to
//! sort the list; it only decides which neighbors count as "higher" during
//! placement. Ties are resolved by registration order.

use crate::engine::NodeId;
use crate::insertion::InsertionPoint;

/// Identifies a sheet within its context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SheetId(pub usize);

/// What the class name generator may know about a sheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetMeta {
    pub id: SheetId,
    pub meta: Option<String>,
    pub class_name_prefix: Option<String>,
}

/// Registry entry for one sheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetRecord {
    pub id: SheetId,
    pub index: i32,
    pub insertion_point: Option<InsertionPoint>,
    /// The sheet's container element.
    pub element: NodeId,
    pub attached: bool,
}

/// Registration-ordered list of sheets.
#[derive(Debug, Clone, Default)]
pub struct SheetsRegistry {
    records: Vec<SheetRecord>,
}

impl SheetsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a record. Registering the same id twice is a no-op.
    pub fn register(&mut self, record: SheetRecord) {
        if self.get(record.id).is_none() {
            self.records.push(record);
        }
    }

    pub fn get(&self, id: SheetId) -> Option<&SheetRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    pub(crate) fn set_attached(&mut self, id: SheetId, attached: bool) {
        if let Some(record) = self.records.iter_mut().find(|r| r.id == id) {
            record.attached = attached;
        }
    }

    /// Records in registration order.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &SheetRecord> {
        self.records.iter()
    }

    /// Attached records in registration order.
    pub fn attached(&self) -> impl Iterator<Item = &SheetRecord> {
        self.records.iter().filter(|r| r.attached)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Index for a sheet that did not ask for one: one above the highest
    /// registered index, or 0 for the first sheet.
    pub fn next_index(&self) -> i32 {
        self.records
            .iter()
            .map(|r| r.index)
            .max()
            .map_or(0, |max| max.saturating_add(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: usize, index: i32) -> SheetRecord {
        SheetRecord {
            id: SheetId(id),
            index,
            insertion_point: None,
            element: NodeId(100 + id),
            attached: false,
        }
    }

    #[test]
    fn test_register_keeps_registration_order() {
        let mut registry = SheetsRegistry::new();
        registry.register(record(0, 5));
        registry.register(record(1, 1));
        registry.register(record(2, 3));
        let indexes: Vec<_> = registry.iter().map(|r| r.index).collect();
        assert_eq!(indexes, vec![5, 1, 3]);
    }

    #[test]
    fn test_register_twice_is_noop() {
        let mut registry = SheetsRegistry::new();
        registry.register(record(0, 0));
        registry.register(record(0, 9));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get(SheetId(0)).unwrap().index, 0);
    }

    #[test]
    fn test_set_attached() {
        let mut registry = SheetsRegistry::new();
        registry.register(record(0, 0));
        registry.register(record(1, 0));
        registry.set_attached(SheetId(1), true);
        let attached: Vec<_> = registry.attached().map(|r| r.id).collect();
        assert_eq!(attached, vec![SheetId(1)]);
    }

    #[test]
    fn test_next_index() {
        let mut registry = SheetsRegistry::new();
        assert_eq!(registry.next_index(), 0);
        registry.register(record(0, 4));
        registry.register(record(1, -2));
        assert_eq!(registry.next_index(), 5);
    }
}
