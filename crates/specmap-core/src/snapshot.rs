//! Component snapshots and specification text loading

use crate::graph::MappingGraph;
use crate::history::HistoryEntry;
use crate::model::{
    ComponentId, MappingId, MappingRow, User, WorkItem, WorkItemId, WorkItemKind, WorkItemRef,
    WorkItems,
};
use eyre::{Result, WrapErr};
use facet::Facet;
use std::path::Path;
use tracing::warn;

/// Prefix of the warning produced when a specification cannot be loaded
pub const SPECIFICATION_UNAVAILABLE: &str = "Specification unavailable";

/// The component (API) a specification documents
#[derive(Debug, Clone, PartialEq, Eq, Facet)]
pub struct Component {
    pub id: ComponentId,
    pub name: String,
}

/// One snapshot from a work item's edit log
#[derive(Debug, Clone, Facet)]
pub struct ObjectHistoryRow {
    pub work_item_kind: WorkItemKind,
    pub work_item_ref: WorkItemId,
    pub entry: HistoryEntry,
}

/// One snapshot from a mapping's edit log
#[derive(Debug, Clone, Facet)]
pub struct MappingHistoryRow {
    pub mapping_id: MappingId,
    pub entry: HistoryEntry,
}

/// Everything the engine needs about one component, as fetched by a collaborator
#[derive(Debug, Clone, Facet)]
pub struct ComponentSnapshot {
    pub component: Component,
    /// Specification text, when the collaborator ships it inline
    #[facet(default)]
    pub specification: Option<String>,
    #[facet(default)]
    pub mappings: Vec<MappingRow>,
    #[facet(default)]
    pub work_items: Vec<WorkItem>,
    #[facet(default)]
    pub users: Vec<User>,
    #[facet(default)]
    pub object_history: Vec<ObjectHistoryRow>,
    #[facet(default)]
    pub mapping_history: Vec<MappingHistoryRow>,
}

impl ComponentSnapshot {
    /// Parse a snapshot from a JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        facet_json::from_str(json).wrap_err("Failed to parse component snapshot JSON")
    }

    /// Load a snapshot from a local file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).wrap_err_with(|| {
            format!("Failed to read component snapshot from {}", path.display())
        })?;
        Self::from_json(&content)
            .wrap_err_with(|| format!("Failed to parse component snapshot from {}", path.display()))
    }

    /// Build the mapping graph from this snapshot's rows
    pub fn graph(&self) -> Result<MappingGraph> {
        MappingGraph::build(self.mappings.iter().cloned()).wrap_err_with(|| {
            format!(
                "Invalid mappings for component {}",
                self.component.name
            )
        })
    }

    /// Work items indexed by typed reference
    pub fn work_items(&self) -> WorkItems {
        self.work_items.iter().cloned().collect()
    }

    /// Edit log of one work item, ordered by version
    pub fn object_track(&self, item: WorkItemRef) -> Vec<HistoryEntry> {
        let mut track: Vec<HistoryEntry> = self
            .object_history
            .iter()
            .filter(|row| row.work_item_kind == item.kind && row.work_item_ref == item.id)
            .map(|row| row.entry.clone())
            .collect();
        track.sort_by_key(|e| e.version);
        track
    }

    /// Edit log of one mapping, ordered by version
    pub fn mapping_track(&self, mapping: MappingId) -> Vec<HistoryEntry> {
        let mut track: Vec<HistoryEntry> = self
            .mapping_history
            .iter()
            .filter(|row| row.mapping_id == mapping)
            .map(|row| row.entry.clone())
            .collect();
        track.sort_by_key(|e| e.version);
        track
    }
}

/// Specification text, or the warning explaining why there is none
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpecText {
    Loaded(String),
    /// Sentinel: no partition is possible, every mapping renders as unmatched
    Unavailable(String),
}

impl SpecText {
    /// Read a specification from disk; failures become [`SpecText::Unavailable`]
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match std::fs::read_to_string(path) {
            Ok(text) => SpecText::Loaded(text),
            Err(e) => {
                let warning = format!("{SPECIFICATION_UNAVAILABLE}: {}: {e}", path.display());
                warn!("{}", warning);
                SpecText::Unavailable(warning)
            }
        }
    }

    /// Text carried by a snapshot, or the sentinel when it carries none
    pub fn from_snapshot(snapshot: &ComponentSnapshot) -> Self {
        match &snapshot.specification {
            Some(text) => SpecText::Loaded(text.clone()),
            None => SpecText::Unavailable(format!(
                "{SPECIFICATION_UNAVAILABLE}: snapshot of {} carries no text",
                snapshot.component.name
            )),
        }
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            SpecText::Loaded(text) => Some(text),
            SpecText::Unavailable(_) => None,
        }
    }

    pub fn warning(&self) -> Option<&str> {
        match self {
            SpecText::Loaded(_) => None,
            SpecText::Unavailable(warning) => Some(warning),
        }
    }
}
