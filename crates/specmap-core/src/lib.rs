//! specmap-core - Core library for specification section coverage analysis
//!
//! This crate provides the building blocks for:
//! - Partitioning a specification into disjoint sections against overlapping mappings
//! - Rolling declared coverage up through nested work items (waterfall coverage)
//! - Reconciling the edit logs of a work item and its mapping into one timeline
//! - Computing a per-component coverage report
//!
//! # Partitioning a Specification
//!
//! Every direct mapping claims a byte range of the specification. Ranges
//! overlap freely; [`partition`] re-cuts the text so each section carries
//! exactly the items that overlap it:
//!
//! ```
//! use specmap_core::{SectionItem, SectionRange, WorkItemKind, WorkItemRef, partition};
//!
//! let item = |mapping, offset, length| SectionItem {
//!     mapping,
//!     work_item: WorkItemRef { kind: WorkItemKind::Requirement, id: mapping },
//!     range: SectionRange::new(offset, length),
//!     coverage: 50.0,
//! };
//!
//! let sections = partition("AAABBBCCC", [item(1, 0, 6), item(2, 3, 6)]);
//! let texts: Vec<_> = sections.iter().map(|s| s.text.as_str()).collect();
//! assert_eq!(texts, ["AAA", "BBB", "CCC"]);
//! assert_eq!(sections[1].covered(), 100.0);
//! ```
//!
//! # Computing a Report
//!
//! ```ignore
//! use specmap_core::{ComponentReport, ComponentSnapshot, SpecText};
//!
//! let snapshot = ComponentSnapshot::load("snapshots/libfoo.json")?;
//! let graph = snapshot.graph()?;
//! let spec = SpecText::load("specs/libfoo.txt");
//! let work_items = snapshot.work_items();
//! let report = ComponentReport::compute(&snapshot.component, &spec, &graph, &work_items);
//! println!("Coverage: {:.1}%", report.coverage_percent());
//! ```

mod finding;
mod graph;
mod history;
mod model;
mod partition;
mod report;
mod snapshot;
mod waterfall;

pub use finding::Finding;
pub use graph::{MappingGraph, Owner};
pub use history::{
    DEFAULT_USER_LIST_FIELDS, FieldChange, HistoryEntry, HistoryLog, HistoryRecord,
    ReconcileOptions, UserDirectory, reconcile, render_user_list,
};
pub use model::{
    ComponentId, Document, Justification, Mapping, MappingId, MappingParent, MappingRow,
    ParentKind, SectionRange, SwRequirement, TestCase, TestSpecification, Timestamp, User,
    UserId, WorkItem, WorkItemId, WorkItemKind, WorkItemRef, WorkItems,
};
pub use partition::{Section, SectionItem, partition, split_stale};
pub use report::{ComponentReport, MappingHistory, ReportItem};
pub use snapshot::{
    Component, ComponentSnapshot, MappingHistoryRow, ObjectHistoryRow, SPECIFICATION_UNAVAILABLE,
    SpecText,
};
pub use waterfall::{CoverageAggregator, CoverageNode};

/// Clamp a percentage to `[0, 100]`; NaN counts as 0
pub(crate) fn clamp_percent(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 100.0)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use crate::model::{MappingId, MappingRow, ParentKind, WorkItemKind};

    /// Direct mapping onto component 1, covering "AAA" at offset 0
    pub fn direct(id: MappingId, kind: WorkItemKind, coverage: u32) -> MappingRow {
        MappingRow {
            id,
            parent_kind: ParentKind::Section,
            parent_ref: 1,
            work_item_kind: kind,
            work_item_ref: id,
            section: "AAA".to_string(),
            offset: 0,
            coverage,
            created_at: 0,
            edited_at: 0,
            editor_id: None,
            version: 1,
        }
    }

    /// Mapping nested under `parent`
    pub fn nested(
        id: MappingId,
        parent: MappingId,
        kind: WorkItemKind,
        coverage: u32,
    ) -> MappingRow {
        MappingRow {
            parent_kind: ParentKind::Mapping,
            parent_ref: parent,
            section: String::new(),
            ..direct(id, kind, coverage)
        }
    }
}
