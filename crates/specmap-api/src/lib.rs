//! API types for specmap coverage reports
//!
//! This crate contains only the JSON type definitions emitted by `specmap`
//! for collaborators (dashboards, CI gates). Field names are camelCase.

use facet::Facet;

/// Coverage of every configured component
#[derive(Debug, Clone, Facet)]
pub struct ApiCoverageData {
    pub components: Vec<ApiComponentData>,
}

/// Section report for one component
#[derive(Debug, Clone, Facet)]
#[facet(rename_all = "camelCase")]
pub struct ApiComponentData {
    /// Component id from the snapshot, 0 when it could not be loaded
    pub id: u64,
    pub name: String,
    /// Length-weighted coverage of the specification text
    pub coverage: f64,
    pub threshold: f64,
    pub passing: bool,
    /// Disjoint sections tiling the specification, by offset
    pub sections: Vec<ApiSection>,
    /// Mappings whose captured text no longer matches the specification
    pub unmapped: Vec<ApiSectionItem>,
    pub findings: Vec<ApiFinding>,
}

/// A disjoint slice of a specification
#[derive(Debug, Clone, Facet)]
#[facet(rename_all = "camelCase")]
pub struct ApiSection {
    pub text: String,
    pub offset: usize,
    pub length: usize,
    /// Summed coverage of every item on this section, 0..=100
    pub covered: f64,
    pub gap: f64,
    pub work_items: ApiWorkItems,
}

/// Items attached to a section, grouped by kind
#[derive(Debug, Clone, Default, Facet)]
#[facet(rename_all = "camelCase")]
pub struct ApiWorkItems {
    pub requirements: Vec<ApiSectionItem>,
    pub test_specs: Vec<ApiSectionItem>,
    pub test_cases: Vec<ApiSectionItem>,
    pub justifications: Vec<ApiSectionItem>,
    pub documents: Vec<ApiSectionItem>,
}

impl ApiWorkItems {
    pub fn len(&self) -> usize {
        self.requirements.len()
            + self.test_specs.len()
            + self.test_cases.len()
            + self.justifications.len()
            + self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A direct mapping in a section report
#[derive(Debug, Clone, Facet)]
#[facet(rename_all = "camelCase")]
pub struct ApiSectionItem {
    pub mapping_id: u64,
    /// Work item kind (e.g., "requirement", "test_case")
    pub kind: String,
    pub work_item_id: u64,
    #[facet(default)]
    pub title: Option<String>,
    /// Declared coverage
    pub declared: u8,
    /// Waterfall coverage
    pub coverage: f64,
    /// Range the mapping claims in the specification
    pub offset: usize,
    pub length: usize,
}

/// Waterfall coverage of one mapping and how it was derived
#[derive(Debug, Clone, Facet)]
#[facet(rename_all = "camelCase")]
pub struct ApiWaterfall {
    pub mapping_id: u64,
    pub coverage: f64,
    /// Pre-order listing of the derivation tree
    pub nodes: Vec<ApiCoverageNode>,
    pub findings: Vec<ApiFinding>,
}

#[derive(Debug, Clone, Facet)]
#[facet(rename_all = "camelCase")]
pub struct ApiCoverageNode {
    pub mapping_id: u64,
    pub kind: String,
    pub work_item_id: u64,
    #[facet(default)]
    pub title: Option<String>,
    /// Distance from the requested mapping
    pub depth: usize,
    pub declared: f64,
    pub effective: f64,
    /// Reached a second time by the walk; contributes 0
    pub cycle: bool,
}

/// Reconciled history of one mapping, latest first
#[derive(Debug, Clone, Facet)]
#[facet(rename_all = "camelCase")]
pub struct ApiHistory {
    pub mapping_id: u64,
    pub records: Vec<ApiHistoryRecord>,
    pub findings: Vec<ApiFinding>,
}

#[derive(Debug, Clone, Facet)]
#[facet(rename_all = "camelCase")]
pub struct ApiHistoryRecord {
    /// Combined version, `N.M`
    pub version: String,
    pub created_at: i64,
    pub object: Vec<ApiFieldChange>,
    pub mapping: Vec<ApiFieldChange>,
}

#[derive(Debug, Clone, Facet)]
#[facet(rename_all = "camelCase")]
pub struct ApiFieldChange {
    pub field: String,
    pub value: String,
    /// Who set the value; absent on the initial record
    #[facet(default)]
    pub editor: Option<String>,
}

/// A non-fatal condition worth reviewing
#[derive(Debug, Clone, Facet)]
#[facet(rename_all = "camelCase")]
pub struct ApiFinding {
    /// Short name (e.g., "stale-mapping")
    pub code: String,
    pub message: String,
    #[facet(default)]
    pub mapping_id: Option<u64>,
}
