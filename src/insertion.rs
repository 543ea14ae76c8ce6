//! Placement of style containers in the host area.
//!
//! A container that is about to be attached is placed by the first rule that
//! applies:
//!
//! 1. Before the first attached sheet (registration order) with a higher
//!    index and the same insertion point.
//! 2. After the last attached sheet (registration order) with the same
//!    insertion point.
//! 3. After the marker comment named by a [`InsertionPoint::Marker`], if one
//!    is a direct child of the host area.
//! 4. After the node named by a [`InsertionPoint::Node`], if it has a parent.
//! 5. At the end of the host area.
//!
//! Missing markers and detached nodes only produce warnings. The default
//! marker [`DEFAULT_MARKER`] never warns.

use crate::engine::{NativeEngine, NodeId};
use crate::error::{WarningKind, Warnings};
use crate::registry::{SheetId, SheetRecord, SheetsRegistry};

/// Marker name used when none is configured.
pub const DEFAULT_MARKER: &str = "jss";

/// Where a sheet's container should go.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum InsertionPoint {
    /// A comment in the host area whose trimmed text is the name.
    Marker(String),
    /// A node already in the document.
    Node(NodeId),
}

impl From<&str> for InsertionPoint {
    fn from(marker: &str) -> Self {
        InsertionPoint::Marker(marker.to_string())
    }
}

impl From<String> for InsertionPoint {
    fn from(marker: String) -> Self {
        InsertionPoint::Marker(marker)
    }
}

impl From<NodeId> for InsertionPoint {
    fn from(node: NodeId) -> Self {
        InsertionPoint::Node(node)
    }
}

/// A resolved position: insert under `parent` before `reference`, or at the
/// end when `reference` is `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub parent: NodeId,
    pub reference: Option<NodeId>,
}

impl Placement {
    fn before<E: NativeEngine + ?Sized>(engine: &E, node: NodeId) -> Option<Self> {
        engine.parent_node(node).map(|parent| Placement {
            parent,
            reference: Some(node),
        })
    }

    fn after<E: NativeEngine + ?Sized>(engine: &E, node: NodeId) -> Option<Self> {
        engine.parent_node(node).map(|parent| Placement {
            parent,
            reference: engine.next_sibling(node),
        })
    }
}

/// Computes the placement for `sheet`.
///
/// Returns `None` only when nothing matched and there is no host area.
pub fn resolve<E: NativeEngine + ?Sized>(
    engine: &E,
    registry: &SheetsRegistry,
    host: Option<NodeId>,
    sheet: SheetId,
    index: i32,
    point: Option<&InsertionPoint>,
    warnings: &mut Warnings,
) -> Option<Placement> {
    let neighbors: Vec<&SheetRecord> = registry
        .attached()
        .filter(|r| r.id != sheet && r.insertion_point.as_ref() == point)
        .collect();

    if let Some(higher) = neighbors.iter().find(|r| r.index > index) {
        if let Some(placement) = Placement::before(engine, higher.element) {
            tracing::debug!(sheet = sheet.0, before = higher.id.0, "placing before higher sheet");
            return Some(placement);
        }
    }

    if let Some(lower) = neighbors.last() {
        if let Some(placement) = Placement::after(engine, lower.element) {
            tracing::debug!(sheet = sheet.0, after = lower.id.0, "placing after sheet");
            return Some(placement);
        }
    }

    match point {
        Some(InsertionPoint::Marker(name)) => {
            let marker = host.and_then(|host| find_marker(engine, host, name));
            if let Some(placement) = marker.and_then(|node| Placement::after(engine, node)) {
                tracing::debug!(sheet = sheet.0, marker = %name, "placing after marker");
                return Some(placement);
            }
            if name != DEFAULT_MARKER {
                warnings.emit(
                    WarningKind::InsertionPointNotFound,
                    format!("insertion point \"{}\" not found", name),
                );
            }
        }
        Some(InsertionPoint::Node(node)) => {
            if let Some(placement) = Placement::after(engine, *node) {
                tracing::debug!(sheet = sheet.0, node = node.0, "placing after node");
                return Some(placement);
            }
            warnings.emit(
                WarningKind::InsertionPointDetached,
                format!("insertion point node {} has no parent", node.0),
            );
        }
        None => {}
    }

    match host {
        Some(parent) => Some(Placement {
            parent,
            reference: None,
        }),
        None => {
            warnings.emit(WarningKind::NoHostArea, "document has no host area for style containers");
            None
        }
    }
}

/// Finds a comment among the direct children of `host` whose trimmed text is
/// `name`.
fn find_marker<E: NativeEngine + ?Sized>(engine: &E, host: NodeId, name: &str) -> Option<NodeId> {
    engine.child_nodes(host).into_iter().find(|node| {
        engine
            .comment_text(*node)
            .is_some_and(|text| text.trim() == name)
    })
}
