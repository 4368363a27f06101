//! Report data building.
//!
//! Loads configured components from disk, runs the engine over them, and
//! converts the results into the `specmap-api` shapes the renderers and
//! JSON output consume.

use eyre::{Result, WrapErr};
use specmap_core::{
    ComponentReport, ComponentSnapshot, CoverageAggregator, FieldChange, Finding, MappingGraph,
    MappingHistory, MappingId, ReconcileOptions, ReportItem, Section, SpecText, WorkItemKind,
    WorkItems,
};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::config::{ComponentConfig, Config};

// Re-export API types from specmap-api crate
pub use specmap_api::{
    ApiComponentData, ApiCoverageData, ApiCoverageNode, ApiFieldChange, ApiFinding, ApiHistory,
    ApiHistoryRecord, ApiSection, ApiSectionItem, ApiWaterfall, ApiWorkItems,
};

// ============================================================================
// Loading
// ============================================================================

/// A component's snapshot and specification, ready for the engine
pub struct LoadedComponent {
    pub config: ComponentConfig,
    pub snapshot: ComponentSnapshot,
    pub graph: MappingGraph,
    pub work_items: WorkItems,
    pub spec: SpecText,
}

impl LoadedComponent {
    /// Load a component, resolving its paths against `base_dir`
    pub fn load(base_dir: &Path, config: &ComponentConfig) -> Result<Self> {
        let snapshot_path = resolve(base_dir, &config.snapshot);
        let snapshot = ComponentSnapshot::load(&snapshot_path)
            .wrap_err_with(|| format!("Failed to load component '{}'", config.name))?;
        let graph = snapshot.graph()?;

        let spec = match &config.specification {
            Some(path) => SpecText::load(resolve(base_dir, path)),
            None => SpecText::from_snapshot(&snapshot),
        };
        if let Some(warning) = spec.warning() {
            warn!(component = %config.name, "{}", warning);
        }

        debug!(
            component = %config.name,
            mappings = graph.len(),
            work_items = snapshot.work_items.len(),
            "loaded component"
        );

        Ok(Self {
            config: config.clone(),
            work_items: snapshot.work_items(),
            snapshot,
            graph,
            spec,
        })
    }

    pub fn report(&self) -> ComponentReport {
        ComponentReport::compute(
            &self.snapshot.component,
            &self.spec,
            &self.graph,
            &self.work_items,
        )
    }
}

fn resolve(base_dir: &Path, path: &str) -> PathBuf {
    let path = Path::new(path);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    }
}

/// Load the component called `name` from `config`
pub fn load_component(base_dir: &Path, config: &Config, name: &str) -> Result<LoadedComponent> {
    let Some(component) = config.component(name) else {
        eyre::bail!(
            "Unknown component '{}'. Configured components: {}",
            name,
            config.component_names().join(", ")
        );
    };
    LoadedComponent::load(base_dir, component)
}

// ============================================================================
// Coverage
// ============================================================================

/// Compute the section report of every configured component.
///
/// Components are independent: one that fails to load is reported as failing
/// with a [`Finding::LoadFailed`] while the others are still computed.
pub fn build_coverage_data(
    base_dir: &Path,
    config: &Config,
    default_threshold: f64,
) -> ApiCoverageData {
    let compute = |component: &ComponentConfig| -> ApiComponentData {
        let threshold = component.threshold.unwrap_or(default_threshold);
        match LoadedComponent::load(base_dir, component) {
            Ok(loaded) => component_data(&loaded.report(), threshold),
            Err(e) => {
                warn!(component = %component.name, "{:#}", e);
                failed_component_data(component, threshold, &e)
            }
        }
    };

    #[cfg(feature = "parallel")]
    let components: Vec<ApiComponentData> = {
        use rayon::prelude::*;
        config.components.par_iter().map(compute).collect()
    };

    #[cfg(not(feature = "parallel"))]
    let components: Vec<ApiComponentData> = config.components.iter().map(compute).collect();

    info!(components = components.len(), "built coverage data");
    ApiCoverageData { components }
}

/// A component whose snapshot could not be loaded
fn failed_component_data(
    component: &ComponentConfig,
    threshold: f64,
    error: &eyre::Report,
) -> ApiComponentData {
    let finding = Finding::LoadFailed {
        error: format!("{error:#}"),
    };
    ApiComponentData {
        id: 0,
        name: component.name.clone(),
        coverage: 0.0,
        threshold,
        passing: false,
        sections: Vec::new(),
        unmapped: Vec::new(),
        findings: vec![api_finding(&finding)],
    }
}

/// Convert a report into its API shape
pub fn component_data(report: &ComponentReport, threshold: f64) -> ApiComponentData {
    ApiComponentData {
        id: report.component.id,
        name: report.component.name.clone(),
        coverage: report.coverage_percent(),
        threshold,
        passing: report.is_passing(threshold),
        sections: report
            .sections
            .iter()
            .map(|section| api_section(report, section))
            .collect(),
        unmapped: report.unmatched_items().map(api_item).collect(),
        findings: report.findings.iter().map(api_finding).collect(),
    }
}

fn api_section(report: &ComponentReport, section: &Section) -> ApiSection {
    let mut work_items = ApiWorkItems::default();
    for item in report.section_items(section) {
        let bucket = match item.work_item.kind {
            WorkItemKind::Requirement => &mut work_items.requirements,
            WorkItemKind::TestSpec => &mut work_items.test_specs,
            WorkItemKind::TestCase => &mut work_items.test_cases,
            WorkItemKind::Justification => &mut work_items.justifications,
            WorkItemKind::Document => &mut work_items.documents,
        };
        bucket.push(api_item(item));
    }

    ApiSection {
        text: section.text.clone(),
        offset: section.range.offset,
        length: section.range.length,
        covered: section.covered(),
        gap: section.gap(),
        work_items,
    }
}

fn api_item(item: &ReportItem) -> ApiSectionItem {
    ApiSectionItem {
        mapping_id: item.mapping,
        kind: item.work_item.kind.as_str().to_string(),
        work_item_id: item.work_item.id,
        title: item.title.clone(),
        declared: item.declared,
        coverage: item.waterfall,
        offset: item.range.offset,
        length: item.range.length,
    }
}

pub fn api_finding(finding: &Finding) -> ApiFinding {
    ApiFinding {
        code: finding.code().to_string(),
        message: finding.to_string(),
        mapping_id: finding.mapping(),
    }
}

// ============================================================================
// Waterfall
// ============================================================================

/// Waterfall coverage of `mapping` with its derivation tree
pub fn build_waterfall_data(loaded: &LoadedComponent, mapping: MappingId) -> Result<ApiWaterfall> {
    let aggregator = CoverageAggregator::new(&loaded.graph);
    let Some(tree) = aggregator.coverage_tree(mapping) else {
        let findings: Vec<String> = aggregator
            .findings(mapping)
            .iter()
            .map(ToString::to_string)
            .collect();
        if findings.is_empty() {
            eyre::bail!(
                "Mapping {} not found in component '{}'",
                mapping,
                loaded.config.name
            );
        }
        eyre::bail!(
            "Mapping {} in component '{}' has no coverage: {}",
            mapping,
            loaded.config.name,
            findings.join("; ")
        );
    };

    let nodes = tree
        .flatten()
        .into_iter()
        .map(|(depth, node)| ApiCoverageNode {
            mapping_id: node.mapping,
            kind: node.work_item.kind.as_str().to_string(),
            work_item_id: node.work_item.id,
            title: loaded
                .work_items
                .title_of(node.work_item)
                .map(str::to_string),
            depth,
            declared: node.own,
            effective: node.effective,
            cycle: node.cycle,
        })
        .collect();

    Ok(ApiWaterfall {
        mapping_id: mapping,
        coverage: tree.effective,
        nodes,
        findings: aggregator.findings(mapping).iter().map(api_finding).collect(),
    })
}

// ============================================================================
// History
// ============================================================================

/// Reconciled change history of `mapping`, latest first
pub fn build_history_data(
    loaded: &LoadedComponent,
    mapping: MappingId,
    options: &ReconcileOptions,
) -> Result<ApiHistory> {
    let Some(history) = MappingHistory::compute(&loaded.snapshot, &loaded.graph, mapping, options)
    else {
        eyre::bail!(
            "Mapping {} not found in component '{}'",
            mapping,
            loaded.config.name
        );
    };

    for finding in &history.findings {
        warn!(component = %loaded.config.name, "{}", finding);
    }

    Ok(ApiHistory {
        mapping_id: mapping,
        records: history
            .records
            .iter()
            .map(|record| ApiHistoryRecord {
                version: record.version(),
                created_at: record.created_at,
                object: api_changes(&record.object),
                mapping: api_changes(&record.mapping),
            })
            .collect(),
        findings: history.findings.iter().map(api_finding).collect(),
    })
}

fn api_changes(changes: &BTreeMap<String, FieldChange>) -> Vec<ApiFieldChange> {
    changes
        .iter()
        .map(|(field, change)| ApiFieldChange {
            field: field.clone(),
            value: change.value().to_string(),
            editor: change.editor().map(str::to_string),
        })
        .collect()
}
