//! Waterfall coverage: declared coverage discounted by what hangs below it
//!
//! A mapping's own coverage is the engineer's claim about how much of the
//! parent's obligation it satisfies. With nothing attached below, the claim
//! is taken at face value; otherwise it is scaled by the rolled-up coverage
//! of its children:
//!
//! ```text
//! waterfall(node) = own                                     (no children)
//! waterfall(node) = clamp(own * clamp(Σ waterfall(child)) / 100)
//! ```
//!
//! Every work item kind goes through the same walk, which carries a visited
//! set so a nesting cycle contributes zero instead of recursing forever.

use crate::clamp_percent;
use crate::finding::Finding;
use crate::graph::{MappingGraph, Owner};
use crate::model::{Mapping, MappingId, WorkItemRef};
use std::collections::{BTreeMap, HashSet};
use tracing::warn;

/// How one mapping's waterfall value was derived
#[derive(Debug, Clone, PartialEq)]
pub struct CoverageNode {
    pub mapping: MappingId,
    pub work_item: WorkItemRef,
    /// Declared coverage
    pub own: f64,
    /// Waterfall coverage
    pub effective: f64,
    /// The walk reached this mapping a second time; it contributes nothing
    pub cycle: bool,
    pub children: Vec<CoverageNode>,
}

impl CoverageNode {
    /// Pre-order listing of the tree with depths, root at depth 0
    pub fn flatten(&self) -> Vec<(usize, &CoverageNode)> {
        let mut out = Vec::new();
        let mut stack = vec![(0, self)];
        while let Some((depth, node)) = stack.pop() {
            out.push((depth, node));
            for child in node.children.iter().rev() {
                stack.push((depth + 1, child));
            }
        }
        out
    }

    /// Mappings where the walk detected a cycle
    pub fn cycles(&self) -> Vec<MappingId> {
        self.flatten()
            .into_iter()
            .filter(|(_, node)| node.cycle)
            .map(|(_, node)| node.mapping)
            .collect()
    }
}

/// Computes waterfall coverage over a [`MappingGraph`]
#[derive(Debug, Clone, Copy)]
pub struct CoverageAggregator<'g> {
    graph: &'g MappingGraph,
}

impl<'g> CoverageAggregator<'g> {
    pub fn new(graph: &'g MappingGraph) -> Self {
        Self { graph }
    }

    /// Effective coverage of `id` in `[0, 100]`.
    ///
    /// `None` when the mapping is unknown or its parent chain is dangling.
    pub fn waterfall_coverage(&self, id: MappingId) -> Option<f64> {
        self.coverage_tree(id).map(|node| node.effective)
    }

    /// The full derivation of `id`'s waterfall coverage
    pub fn coverage_tree(&self, id: MappingId) -> Option<CoverageNode> {
        let mapping = self.graph.get(id)?;
        if let Some(Owner::Dangling { missing }) = self.graph.owner(id) {
            warn!(
                mapping = id,
                missing, "no owning component, skipping coverage"
            );
            return None;
        }
        let mut visited = HashSet::new();
        Some(self.walk(mapping, &mut visited))
    }

    /// Waterfall coverage of every mapping that resolves, keyed by id
    pub fn waterfall_all(&self) -> BTreeMap<MappingId, f64> {
        self.graph
            .ids()
            .into_iter()
            .filter_map(|id| Some((id, self.waterfall_coverage(id)?)))
            .collect()
    }

    /// Dangling parents and cycles reachable from `id`
    pub fn findings(&self, id: MappingId) -> Vec<Finding> {
        match self.graph.owner(id) {
            None => Vec::new(),
            Some(Owner::Dangling { missing }) => vec![Finding::DanglingParent {
                mapping: id,
                missing,
            }],
            Some(_) => self
                .coverage_tree(id)
                .map(|tree| tree.cycles())
                .unwrap_or_default()
                .into_iter()
                .map(|mapping| Finding::CycleDetected { mapping })
                .collect(),
        }
    }

    fn walk(&self, mapping: &Mapping, visited: &mut HashSet<MappingId>) -> CoverageNode {
        let own = clamp_percent(f64::from(mapping.coverage));

        if !visited.insert(mapping.id) {
            warn!(mapping = mapping.id, "nesting cycle, mapping contributes 0");
            return CoverageNode {
                mapping: mapping.id,
                work_item: mapping.work_item,
                own,
                effective: 0.0,
                cycle: true,
                children: Vec::new(),
            };
        }

        let children: Vec<CoverageNode> = self
            .graph
            .all_children(mapping.id)
            .into_iter()
            .map(|child| self.walk(child, visited))
            .collect();

        let effective = if children.is_empty() {
            own
        } else {
            let children_total = clamp_percent(children.iter().map(|c| c.effective).sum());
            clamp_percent(own * children_total / 100.0)
        };

        CoverageNode {
            mapping: mapping.id,
            work_item: mapping.work_item,
            own,
            effective,
            cycle: false,
            children,
        }
    }
}
