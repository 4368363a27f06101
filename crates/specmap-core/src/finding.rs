//! Non-fatal conditions surfaced alongside engine results

use crate::model::{ComponentId, MappingId};
use facet::Facet;
use std::fmt;

/// Something an operator should review; never a reason to fail a computation.
///
/// Specifications drift out of sync with their mappings over a product's
/// lifetime, so these are the expected steady state rather than errors.
#[derive(Debug, Clone, PartialEq, Eq, Facet)]
#[repr(u8)]
pub enum Finding {
    /// Captured section text no longer matches the live specification
    StaleMapping { mapping: MappingId },
    /// A nested mapping points at a parent row that does not exist
    DanglingParent {
        mapping: MappingId,
        missing: MappingId,
    },
    /// A graph walk came back to a mapping it had already visited
    CycleDetected { mapping: MappingId },
    /// The work item's edit log has no initial version
    MalformedHistory { mapping: MappingId },
    /// A direct mapping annotates another component's specification
    ForeignMapping {
        mapping: MappingId,
        component: ComponentId,
    },
    /// The specification text could not be loaded
    SpecificationUnavailable { warning: String },
    /// The component's snapshot could not be loaded or validated
    LoadFailed { error: String },
}

impl Finding {
    /// The mapping this finding is about, if any
    pub fn mapping(&self) -> Option<MappingId> {
        match self {
            Finding::StaleMapping { mapping }
            | Finding::DanglingParent { mapping, .. }
            | Finding::CycleDetected { mapping }
            | Finding::MalformedHistory { mapping }
            | Finding::ForeignMapping { mapping, .. } => Some(*mapping),
            Finding::SpecificationUnavailable { .. } | Finding::LoadFailed { .. } => None,
        }
    }

    /// Short machine-friendly name
    pub fn code(&self) -> &'static str {
        match self {
            Finding::StaleMapping { .. } => "stale-mapping",
            Finding::DanglingParent { .. } => "dangling-parent",
            Finding::CycleDetected { .. } => "cycle-detected",
            Finding::MalformedHistory { .. } => "malformed-history",
            Finding::ForeignMapping { .. } => "foreign-mapping",
            Finding::SpecificationUnavailable { .. } => "specification-unavailable",
            Finding::LoadFailed { .. } => "load-failed",
        }
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Finding::StaleMapping { mapping } => write!(
                f,
                "mapping {mapping} no longer matches the specification text"
            ),
            Finding::DanglingParent { mapping, missing } => write!(
                f,
                "mapping {mapping} is nested under mapping {missing}, which does not exist"
            ),
            Finding::CycleDetected { mapping } => {
                write!(f, "mapping {mapping} is part of a nesting cycle")
            }
            Finding::MalformedHistory { mapping } => write!(
                f,
                "history of mapping {mapping} has no initial version"
            ),
            Finding::ForeignMapping { mapping, component } => write!(
                f,
                "mapping {mapping} annotates the specification of component {component}"
            ),
            Finding::SpecificationUnavailable { warning } => f.write_str(warning),
            Finding::LoadFailed { error } => write!(f, "component could not be loaded: {error}"),
        }
    }
}
