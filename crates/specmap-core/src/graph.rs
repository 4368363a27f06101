//! Read-only graph of mappings assembled from flat rows

use crate::model::{
    ComponentId, Mapping, MappingId, MappingParent, MappingRow, WorkItemKind, WorkItemRef,
};
use eyre::{Result, WrapErr, bail};
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

/// Where an upward walk from a mapping ends up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Owner {
    /// Reached a direct mapping onto a component's specification
    Component {
        component: ComponentId,
        root: MappingId,
    },
    /// A parent pointer leads to a mapping that does not exist
    Dangling { missing: MappingId },
    /// The walk came back to `at`
    Cycle { at: MappingId },
}

impl Owner {
    /// The owning component, or `None` when the walk could not resolve one
    pub fn component(&self) -> Option<ComponentId> {
        match self {
            Owner::Component { component, .. } => Some(*component),
            Owner::Dangling { .. } | Owner::Cycle { .. } => None,
        }
    }
}

/// Mappings of a component indexed by identity and by parent
#[derive(Debug, Clone, Default)]
pub struct MappingGraph {
    mappings: HashMap<MappingId, Mapping>,
    /// Child ids per parent, sorted ascending
    children: HashMap<MappingId, Vec<MappingId>>,
}

impl MappingGraph {
    /// Validate rows and index them.
    ///
    /// Duplicate ids, out-of-range coverage and nesting a work item under an
    /// incompatible kind are errors. Parents that do not exist are not: those
    /// mappings stay in the graph and resolve to [`Owner::Dangling`].
    pub fn build(rows: impl IntoIterator<Item = MappingRow>) -> Result<Self> {
        let mut mappings: HashMap<MappingId, Mapping> = HashMap::new();
        for row in rows {
            let mapping = Mapping::from_row(&row)
                .wrap_err_with(|| format!("Invalid mapping row {}", row.id))?;
            if mappings.insert(mapping.id, mapping).is_some() {
                bail!("duplicate mapping id {}", row.id);
            }
        }

        let mut children: HashMap<MappingId, Vec<MappingId>> = HashMap::new();
        for mapping in mappings.values() {
            let Some(parent_id) = mapping.parent_mapping() else {
                continue;
            };
            match mappings.get(&parent_id) {
                Some(parent) => {
                    if !mapping.kind().can_nest_under(parent.kind()) {
                        bail!(
                            "mapping {} ({}) cannot be nested under mapping {} ({})",
                            mapping.id,
                            mapping.kind(),
                            parent.id,
                            parent.kind()
                        );
                    }
                    children.entry(parent_id).or_default().push(mapping.id);
                }
                None => {
                    warn!(
                        mapping = mapping.id,
                        missing = parent_id,
                        "mapping is nested under a parent that does not exist"
                    );
                }
            }
        }
        for ids in children.values_mut() {
            ids.sort_unstable();
        }

        debug!(
            mappings = mappings.len(),
            parents = children.len(),
            "built mapping graph"
        );
        Ok(Self { mappings, children })
    }

    pub fn get(&self, id: MappingId) -> Option<&Mapping> {
        self.mappings.get(&id)
    }

    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }

    /// All mapping ids, ascending
    pub fn ids(&self) -> Vec<MappingId> {
        let mut ids: Vec<_> = self.mappings.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn work_item_of(&self, id: MappingId) -> Option<WorkItemRef> {
        self.get(id).map(|m| m.work_item)
    }

    /// The mapping `id` is nested under, if it is nested and the parent exists
    pub fn parent(&self, id: MappingId) -> Option<&Mapping> {
        let parent_id = self.get(id)?.parent_mapping()?;
        self.get(parent_id)
    }

    /// Walk parent pointers up to the direct mapping at the top.
    ///
    /// Returns `None` only for an unknown `id`.
    pub fn owner(&self, id: MappingId) -> Option<Owner> {
        let mut current = self.get(id)?;
        let mut visited = HashSet::new();
        loop {
            if !visited.insert(current.id) {
                return Some(Owner::Cycle { at: current.id });
            }
            match current.parent {
                MappingParent::Section { component, .. } => {
                    return Some(Owner::Component {
                        component,
                        root: current.id,
                    });
                }
                MappingParent::Mapping { parent } => match self.get(parent) {
                    Some(next) => current = next,
                    None => return Some(Owner::Dangling { missing: parent }),
                },
            }
        }
    }

    /// Children of `id` holding work items of `kind`, ascending by id
    pub fn children(&self, id: MappingId, kind: WorkItemKind) -> impl Iterator<Item = &Mapping> {
        self.children
            .get(&id)
            .into_iter()
            .flatten()
            .filter_map(|child| self.get(*child))
            .filter(move |child| child.kind() == kind)
    }

    /// Children of `id` across every kind that may nest under it
    pub fn all_children(&self, id: MappingId) -> Vec<&Mapping> {
        let Some(mapping) = self.get(id) else {
            return Vec::new();
        };
        mapping
            .kind()
            .child_kinds()
            .iter()
            .flat_map(|kind| self.children(id, *kind))
            .collect()
    }

    /// Direct mappings onto `component`'s specification, ascending by id
    pub fn direct_mappings(&self, component: ComponentId) -> Vec<&Mapping> {
        let mut direct: Vec<&Mapping> = self
            .mappings
            .values()
            .filter(|m| {
                matches!(m.parent, MappingParent::Section { component: c, .. } if c == component)
            })
            .collect();
        direct.sort_unstable_by_key(|m| m.id);
        direct
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{direct, nested};

    #[test]
    fn test_children_filtered_by_kind() {
        let graph = MappingGraph::build([
            direct(1, WorkItemKind::Requirement, 100),
            nested(4, 1, WorkItemKind::TestCase, 50),
            nested(3, 1, WorkItemKind::TestSpec, 50),
            nested(2, 1, WorkItemKind::Requirement, 50),
            nested(5, 1, WorkItemKind::TestCase, 20),
        ])
        .unwrap();

        let cases: Vec<_> = graph
            .children(1, WorkItemKind::TestCase)
            .map(|m| m.id)
            .collect();
        assert_eq!(cases, vec![4, 5]);

        let all: Vec<_> = graph.all_children(1).iter().map(|m| m.id).collect();
        assert_eq!(all, vec![2, 3, 4, 5]);
        assert!(graph.all_children(4).is_empty());
        assert_eq!(graph.parent(3).map(|m| m.id), Some(1));
        assert_eq!(graph.work_item_of(4).map(|w| w.kind), Some(WorkItemKind::TestCase));
        assert_eq!(graph.work_item_of(9), None);
    }

    #[test]
    fn test_owner_walks_to_root() {
        let graph = MappingGraph::build([
            direct(1, WorkItemKind::Requirement, 100),
            nested(2, 1, WorkItemKind::Requirement, 50),
            nested(3, 2, WorkItemKind::TestSpec, 50),
            nested(4, 3, WorkItemKind::TestCase, 50),
        ])
        .unwrap();

        assert_eq!(
            graph.owner(4),
            Some(Owner::Component {
                component: 1,
                root: 1
            })
        );
        assert_eq!(graph.owner(99), None);
    }

    #[test]
    fn test_dangling_parent_reports_no_owner() {
        let graph = MappingGraph::build([
            direct(1, WorkItemKind::Requirement, 100),
            nested(2, 40, WorkItemKind::Requirement, 50),
            nested(3, 2, WorkItemKind::TestCase, 50),
        ])
        .unwrap();

        let owner = graph.owner(3).unwrap();
        assert_eq!(owner, Owner::Dangling { missing: 40 });
        assert_eq!(owner.component(), None);
        assert_eq!(graph.parent(2), None);
    }

    #[test]
    fn test_cycle_reports_no_owner() {
        let graph = MappingGraph::build([
            nested(1, 2, WorkItemKind::Requirement, 100),
            nested(2, 1, WorkItemKind::Requirement, 100),
        ])
        .unwrap();

        assert!(matches!(graph.owner(1), Some(Owner::Cycle { .. })));
        assert_eq!(graph.owner(2).and_then(|o| o.component()), None);
    }

    #[test]
    fn test_incompatible_nesting_rejected() {
        let err = MappingGraph::build([
            direct(1, WorkItemKind::TestCase, 100),
            nested(2, 1, WorkItemKind::Requirement, 50),
        ])
        .unwrap_err();
        assert!(err.to_string().contains("cannot be nested"), "{err}");

        assert!(
            MappingGraph::build([
                direct(1, WorkItemKind::Requirement, 100),
                nested(2, 1, WorkItemKind::Justification, 50),
            ])
            .is_err()
        );
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let err = MappingGraph::build([
            direct(1, WorkItemKind::Requirement, 100),
            direct(1, WorkItemKind::Document, 100),
        ])
        .unwrap_err();
        assert!(err.to_string().contains("duplicate mapping id 1"));
    }

    #[test]
    fn test_direct_mappings_per_component() {
        let mut other = direct(3, WorkItemKind::Justification, 100);
        other.parent_ref = 2;
        let graph = MappingGraph::build([
            direct(2, WorkItemKind::Document, 100),
            direct(1, WorkItemKind::Requirement, 100),
            other,
            nested(4, 1, WorkItemKind::TestCase, 100),
        ])
        .unwrap();

        let ids: Vec<_> = graph.direct_mappings(1).iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(graph.direct_mappings(2).len(), 1);
        assert_eq!(graph.ids(), vec![1, 2, 3, 4]);
    }
}
