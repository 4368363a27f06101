//! Per-component coverage reports

use crate::finding::Finding;
use crate::graph::{MappingGraph, Owner};
use crate::history::{HistoryRecord, ReconcileOptions, reconcile};
use crate::model::{MappingId, SectionRange, WorkItemRef, WorkItems};
use crate::partition::{Section, SectionItem, partition, split_stale};
use crate::snapshot::{Component, ComponentSnapshot, SpecText};
use crate::waterfall::CoverageAggregator;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// A direct mapping as it appears in a report
#[derive(Debug, Clone, PartialEq)]
pub struct ReportItem {
    pub mapping: MappingId,
    pub work_item: WorkItemRef,
    /// Work item title, when the snapshot carries the item
    pub title: Option<String>,
    /// Declared coverage
    pub declared: u8,
    /// Waterfall coverage
    pub waterfall: f64,
    pub range: SectionRange,
    /// Text captured when the mapping was made
    pub snapshot: String,
}

/// Coverage of one component's specification
#[derive(Debug, Clone)]
pub struct ComponentReport {
    pub component: Component,
    /// Disjoint sections tiling the specification; empty when it is unavailable
    pub sections: Vec<Section>,
    /// Every direct mapping of the component, by id
    pub items: BTreeMap<MappingId, ReportItem>,
    /// Direct mappings that could not be placed on the current text
    pub unmatched: Vec<MappingId>,
    pub findings: Vec<Finding>,
    /// Byte length of the specification, 0 when unavailable
    pub text_length: usize,
    pub available: bool,
}

impl ComponentReport {
    /// Compute the report for `component` from its mapping graph and specification text
    pub fn compute(
        component: &Component,
        spec: &SpecText,
        graph: &MappingGraph,
        work_items: &WorkItems,
    ) -> Self {
        let aggregator = CoverageAggregator::new(graph);
        let direct = graph.direct_mappings(component.id);

        let items: BTreeMap<MappingId, ReportItem> = direct
            .iter()
            .filter_map(|mapping| {
                let (range, snapshot) = mapping.section()?;
                Some((
                    mapping.id,
                    ReportItem {
                        mapping: mapping.id,
                        work_item: mapping.work_item,
                        title: work_items.title_of(mapping.work_item).map(str::to_string),
                        declared: mapping.coverage,
                        waterfall: aggregator.waterfall_coverage(mapping.id).unwrap_or(0.0),
                        range,
                        snapshot: snapshot.to_string(),
                    },
                ))
            })
            .collect();

        let mut findings = Vec::new();
        let (sections, unmatched, text_length) = match spec {
            SpecText::Loaded(text) => {
                let (matched, stale) = split_stale(text, direct.iter().copied());
                let section_items = matched.iter().filter_map(|mapping| {
                    SectionItem::from_mapping(mapping, items.get(&mapping.id)?.waterfall)
                });
                let sections = partition(text, section_items);
                findings.extend(
                    stale
                        .iter()
                        .map(|mapping| Finding::StaleMapping { mapping: mapping.id }),
                );
                let unmatched = stale.iter().map(|mapping| mapping.id).collect();
                (sections, unmatched, text.len())
            }
            SpecText::Unavailable(warning) => {
                findings.push(Finding::SpecificationUnavailable {
                    warning: warning.clone(),
                });
                (Vec::new(), items.keys().copied().collect(), 0)
            }
        };

        for id in graph.ids() {
            match graph.owner(id) {
                Some(Owner::Dangling { missing }) => {
                    findings.push(Finding::DanglingParent { mapping: id, missing })
                }
                Some(Owner::Cycle { .. }) => findings.push(Finding::CycleDetected { mapping: id }),
                Some(Owner::Component {
                    component: other,
                    root,
                }) if root == id && other != component.id => {
                    warn!(
                        mapping = id,
                        component = other,
                        "mapping annotates another component's specification"
                    );
                    findings.push(Finding::ForeignMapping {
                        mapping: id,
                        component: other,
                    })
                }
                Some(Owner::Component { .. }) | None => {}
            }
        }

        let report = Self {
            component: component.clone(),
            sections,
            items,
            unmatched,
            findings,
            text_length,
            available: spec.text().is_some(),
        };
        info!(
            component = %report.component.name,
            sections = report.sections.len(),
            unmatched = report.unmatched.len(),
            findings = report.findings.len(),
            "computed coverage report"
        );
        report
    }

    /// Length-weighted coverage of the specification text.
    ///
    /// An empty specification is fully covered; an unavailable one is not covered at all.
    pub fn coverage_percent(&self) -> f64 {
        if !self.available {
            return 0.0;
        }
        if self.text_length == 0 {
            return 100.0;
        }
        let weighted: f64 = self
            .sections
            .iter()
            .map(|section| section.covered() * section.range.length as f64)
            .sum();
        weighted / self.text_length as f64
    }

    /// Whether the specification could be loaded and coverage reaches `threshold`
    pub fn is_passing(&self, threshold: f64) -> bool {
        self.available && self.coverage_percent() >= threshold
    }

    pub fn item(&self, mapping: MappingId) -> Option<&ReportItem> {
        self.items.get(&mapping)
    }

    /// Items attached to `section`, in partition order
    pub fn section_items<'r>(
        &'r self,
        section: &'r Section,
    ) -> impl Iterator<Item = &'r ReportItem> {
        section
            .items
            .iter()
            .filter_map(move |item| self.items.get(&item.mapping))
    }

    /// Mappings that could not be placed, in id order
    pub fn unmatched_items(&self) -> impl Iterator<Item = &ReportItem> {
        self.unmatched.iter().filter_map(|id| self.items.get(id))
    }

    /// Number of sections with at least one item attached
    pub fn covered_sections(&self) -> usize {
        self.sections.iter().filter(|s| s.has_items()).count()
    }
}

/// Reconciled change history of one mapping and the work item it holds
#[derive(Debug, Clone)]
pub struct MappingHistory {
    pub mapping: MappingId,
    pub work_item: WorkItemRef,
    /// Latest first
    pub records: Vec<HistoryRecord>,
    pub findings: Vec<Finding>,
}

impl MappingHistory {
    /// Reconcile the logs for `mapping`; `None` when the graph has no such mapping
    pub fn compute(
        snapshot: &ComponentSnapshot,
        graph: &MappingGraph,
        mapping: MappingId,
        options: &ReconcileOptions,
    ) -> Option<Self> {
        let work_item = graph.work_item_of(mapping)?;
        let object_track = snapshot.object_track(work_item);
        let mapping_track = snapshot.mapping_track(mapping);
        debug!(
            mapping,
            %work_item,
            object_versions = object_track.len(),
            mapping_versions = mapping_track.len(),
            "reconciling history"
        );

        let records = reconcile(
            &object_track,
            &mapping_track,
            snapshot.users.as_slice(),
            options,
        );
        let findings = if records.is_empty() {
            vec![Finding::MalformedHistory { mapping }]
        } else {
            Vec::new()
        };

        Some(Self {
            mapping,
            work_item,
            records,
            findings,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MappingRow;
    use crate::model::WorkItemKind::*;
    use crate::testing::{direct, nested};

    fn component() -> Component {
        Component {
            id: 1,
            name: "libfoo".to_string(),
        }
    }

    fn at(mut row: MappingRow, offset: usize, section: &str) -> MappingRow {
        row.offset = offset;
        row.section = section.to_string();
        row
    }

    #[test]
    fn test_report_weights_sections_by_length() {
        let graph = MappingGraph::build([
            at(direct(1, Requirement, 100), 0, "AAA"),
            nested(2, 1, TestCase, 50),
            at(direct(3, Justification, 100), 3, "BBB"),
        ])
        .unwrap();
        let report = ComponentReport::compute(
            &component(),
            &SpecText::Loaded("AAABBBCCC".to_string()),
            &graph,
            &WorkItems::new(),
        );

        let covered: Vec<_> = report.sections.iter().map(|s| s.covered()).collect();
        assert_eq!(covered, vec![50.0, 100.0, 0.0]);
        assert_eq!(report.coverage_percent(), 50.0);
        assert!(report.is_passing(50.0));
        assert!(!report.is_passing(50.1));
        assert_eq!(report.covered_sections(), 2);
        assert_eq!(report.item(1).unwrap().waterfall, 50.0);
        assert!(report.findings.is_empty());
    }

    #[test]
    fn test_stale_mappings_are_unmatched() {
        let graph = MappingGraph::build([
            at(direct(1, Requirement, 100), 0, "AAA"),
            at(direct(2, Requirement, 100), 3, "XXX"),
        ])
        .unwrap();
        let report = ComponentReport::compute(
            &component(),
            &SpecText::Loaded("AAABBB".to_string()),
            &graph,
            &WorkItems::new(),
        );

        assert_eq!(report.unmatched, vec![2]);
        assert_eq!(report.findings, vec![Finding::StaleMapping { mapping: 2 }]);
        assert!(report.sections.iter().all(|s| !s.contains_mapping(2)));
    }

    #[test]
    fn test_unavailable_specification() {
        let graph = MappingGraph::build([direct(1, Requirement, 100)]).unwrap();
        let report = ComponentReport::compute(
            &component(),
            &SpecText::Unavailable("gone".to_string()),
            &graph,
            &WorkItems::new(),
        );

        assert!(report.sections.is_empty());
        assert_eq!(report.unmatched, vec![1]);
        assert_eq!(report.coverage_percent(), 0.0);
        assert!(!report.is_passing(0.0));
        assert_eq!(
            report.findings,
            vec![Finding::SpecificationUnavailable {
                warning: "gone".to_string()
            }]
        );
    }

    #[test]
    fn test_graph_findings_are_reported() {
        let graph = MappingGraph::build([
            direct(1, Requirement, 100),
            nested(2, 40, Requirement, 50),
            nested(3, 4, Requirement, 50),
            nested(4, 3, Requirement, 50),
        ])
        .unwrap();
        let report = ComponentReport::compute(
            &component(),
            &SpecText::Loaded("AAA".to_string()),
            &graph,
            &WorkItems::new(),
        );

        assert_eq!(
            report.findings,
            vec![
                Finding::DanglingParent {
                    mapping: 2,
                    missing: 40
                },
                Finding::CycleDetected { mapping: 3 },
                Finding::CycleDetected { mapping: 4 },
            ]
        );
    }

    #[test]
    fn test_mappings_of_other_components_are_reported() {
        let mut foreign = at(direct(2, Requirement, 100), 3, "BBB");
        foreign.parent_ref = 7;
        let graph = MappingGraph::build([
            at(direct(1, Requirement, 100), 0, "AAA"),
            foreign,
            nested(3, 2, TestCase, 50),
        ])
        .unwrap();
        let report = ComponentReport::compute(
            &component(),
            &SpecText::Loaded("AAABBB".to_string()),
            &graph,
            &WorkItems::new(),
        );

        assert!(report.item(2).is_none());
        assert!(report.sections.iter().all(|s| !s.contains_mapping(2)));
        assert_eq!(
            report.findings,
            vec![Finding::ForeignMapping {
                mapping: 2,
                component: 7
            }]
        );
    }

    #[test]
    fn test_empty_specification_is_covered() {
        let graph = MappingGraph::build(Vec::new()).unwrap();
        let report = ComponentReport::compute(
            &component(),
            &SpecText::Loaded(String::new()),
            &graph,
            &WorkItems::new(),
        );
        assert!(report.sections.is_empty());
        assert_eq!(report.coverage_percent(), 100.0);
    }
}
