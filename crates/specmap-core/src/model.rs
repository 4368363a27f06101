//! Work items, mappings, and the rows a collaborator hands to the engine

use eyre::{Result, bail};
use facet::Facet;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Identity of a mapping row
pub type MappingId = u64;
/// Identity of a work item within its kind
pub type WorkItemId = u64;
/// Identity of the component (API) owning a specification
pub type ComponentId = u64;
/// Identity of a user editing work items or mappings
pub type UserId = u64;
/// Unix epoch milliseconds
pub type Timestamp = i64;

/// The five kinds of work item that can be attached to a specification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Facet)]
#[facet(rename_all = "snake_case")]
#[repr(u8)]
pub enum WorkItemKind {
    /// Software requirement
    Requirement,
    /// Test specification
    TestSpec,
    /// Test case
    TestCase,
    /// Justification for leaving a section uncovered
    Justification,
    /// Reference document
    Document,
}

impl WorkItemKind {
    /// Every kind, in presentation order
    pub const ALL: [WorkItemKind; 5] = [
        WorkItemKind::Requirement,
        WorkItemKind::TestSpec,
        WorkItemKind::TestCase,
        WorkItemKind::Justification,
        WorkItemKind::Document,
    ];

    /// Parse a kind from its string representation
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "requirement" => Some(WorkItemKind::Requirement),
            "test_spec" => Some(WorkItemKind::TestSpec),
            "test_case" => Some(WorkItemKind::TestCase),
            "justification" => Some(WorkItemKind::Justification),
            "document" => Some(WorkItemKind::Document),
            _ => None,
        }
    }

    /// Get the string representation of this kind
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkItemKind::Requirement => "requirement",
            WorkItemKind::TestSpec => "test_spec",
            WorkItemKind::TestCase => "test_case",
            WorkItemKind::Justification => "justification",
            WorkItemKind::Document => "document",
        }
    }

    /// Kinds that may be nested directly under a mapping of this kind.
    ///
    /// Order matters: aggregation visits children kind by kind in this order.
    pub fn child_kinds(&self) -> &'static [WorkItemKind] {
        match self {
            WorkItemKind::Requirement => &[
                WorkItemKind::Requirement,
                WorkItemKind::TestSpec,
                WorkItemKind::TestCase,
            ],
            WorkItemKind::TestSpec => &[WorkItemKind::TestCase],
            WorkItemKind::Document => &[WorkItemKind::Document],
            WorkItemKind::TestCase | WorkItemKind::Justification => &[],
        }
    }

    /// Whether a mapping of this kind may hang below a mapping of `parent`'s kind
    pub fn can_nest_under(&self, parent: WorkItemKind) -> bool {
        parent.child_kinds().contains(self)
    }
}

impl fmt::Display for WorkItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a mapping row's `parent_ref` points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Facet)]
#[facet(rename_all = "snake_case")]
#[repr(u8)]
pub enum ParentKind {
    /// A section of the component's specification; `parent_ref` is the component
    Section,
    /// Another mapping; `parent_ref` is that mapping's id
    Mapping,
}

/// Half-open byte range `[offset, offset + length)` over a specification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Facet)]
pub struct SectionRange {
    /// Byte offset from the start of the specification
    pub offset: usize,
    /// Byte length
    pub length: usize,
}

impl SectionRange {
    pub fn new(offset: usize, length: usize) -> Self {
        Self { offset, length }
    }

    /// Build a range from its two ends; `end` before `start` yields an empty range
    pub fn from_bounds(start: usize, end: usize) -> Self {
        Self::new(start, end.saturating_sub(start))
    }

    /// Exclusive end offset
    pub fn end(&self) -> usize {
        self.offset.saturating_add(self.length)
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Two ranges `[a,b)` and `[c,d)` intersect iff `max(a,c) < min(b,d)`
    pub fn intersects(&self, other: &SectionRange) -> bool {
        self.offset.max(other.offset) < self.end().min(other.end())
    }

    /// Whether the byte at `point` lies inside this range
    pub fn contains(&self, point: usize) -> bool {
        self.offset <= point && point < self.end()
    }

    /// The substring of `text` this range addresses, if it is a valid slice
    pub fn slice<'t>(&self, text: &'t str) -> Option<&'t str> {
        text.get(self.offset..self.end())
    }
}

/// A mapping exactly as the persistence layer stores it
#[derive(Debug, Clone, Facet)]
pub struct MappingRow {
    pub id: MappingId,
    pub parent_kind: ParentKind,
    /// Component id for section parents, mapping id for mapping parents
    pub parent_ref: u64,
    pub work_item_kind: WorkItemKind,
    pub work_item_ref: WorkItemId,
    /// Snapshot of the specification text captured at mapping time
    #[facet(default)]
    pub section: String,
    /// Byte offset of `section` in the specification
    #[facet(default)]
    pub offset: usize,
    /// Declared coverage, 0..=100
    pub coverage: u32,
    #[facet(default)]
    pub created_at: Timestamp,
    #[facet(default)]
    pub edited_at: Timestamp,
    #[facet(default)]
    pub editor_id: Option<UserId>,
    /// Mapping version counter (1 on creation)
    #[facet(default)]
    pub version: u32,
}

/// Typed reference to a work item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Facet)]
pub struct WorkItemRef {
    pub kind: WorkItemKind,
    pub id: WorkItemId,
}

impl fmt::Display for WorkItemRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.kind, self.id)
    }
}

/// The single parent of a mapping
#[derive(Debug, Clone, PartialEq, Eq, Facet)]
#[repr(u8)]
pub enum MappingParent {
    /// Direct mapping onto a section of a component's specification
    Section {
        component: ComponentId,
        range: SectionRange,
        /// Text captured when the mapping was made
        snapshot: String,
    },
    /// Nested below another mapping
    Mapping { parent: MappingId },
}

/// A validated mapping: one work item attached to exactly one parent
#[derive(Debug, Clone, PartialEq, Eq, Facet)]
pub struct Mapping {
    pub id: MappingId,
    pub parent: MappingParent,
    pub work_item: WorkItemRef,
    /// Declared coverage, 0..=100
    pub coverage: u8,
    pub created_at: Timestamp,
    pub edited_at: Timestamp,
    #[facet(default)]
    pub editor_id: Option<UserId>,
    pub version: u32,
}

impl Mapping {
    /// Validate a row and build the typed mapping
    pub fn from_row(row: &MappingRow) -> Result<Self> {
        let coverage = match u8::try_from(row.coverage) {
            Ok(coverage) if coverage <= 100 => coverage,
            _ => bail!(
                "mapping {} declares coverage {}, expected 0..=100",
                row.id,
                row.coverage
            ),
        };

        let parent = match row.parent_kind {
            ParentKind::Section => MappingParent::Section {
                component: row.parent_ref,
                range: SectionRange::new(row.offset, row.section.len()),
                snapshot: row.section.clone(),
            },
            ParentKind::Mapping => {
                if row.parent_ref == row.id {
                    bail!("mapping {} is nested under itself", row.id);
                }
                MappingParent::Mapping {
                    parent: row.parent_ref,
                }
            }
        };

        Ok(Self {
            id: row.id,
            parent,
            work_item: WorkItemRef {
                kind: row.work_item_kind,
                id: row.work_item_ref,
            },
            coverage,
            created_at: row.created_at,
            edited_at: row.edited_at,
            editor_id: row.editor_id,
            version: row.version.max(1),
        })
    }

    pub fn kind(&self) -> WorkItemKind {
        self.work_item.kind
    }

    pub fn is_direct(&self) -> bool {
        matches!(self.parent, MappingParent::Section { .. })
    }

    /// Range and captured text, for direct mappings
    pub fn section(&self) -> Option<(SectionRange, &str)> {
        match &self.parent {
            MappingParent::Section {
                range, snapshot, ..
            } => Some((*range, snapshot.as_str())),
            MappingParent::Mapping { .. } => None,
        }
    }

    /// Parent mapping id, for nested mappings
    pub fn parent_mapping(&self) -> Option<MappingId> {
        match self.parent {
            MappingParent::Mapping { parent } => Some(parent),
            MappingParent::Section { .. } => None,
        }
    }

    /// Whether the captured text no longer matches `text` at the stored offset.
    ///
    /// Nested mappings are never stale: they carry no section of their own.
    pub fn is_stale(&self, text: &str) -> bool {
        match self.section() {
            Some((range, snapshot)) => range.slice(text) != Some(snapshot),
            None => false,
        }
    }
}

/// A software requirement
#[derive(Debug, Clone, PartialEq, Eq, Facet)]
pub struct SwRequirement {
    pub id: WorkItemId,
    pub title: String,
    #[facet(default)]
    pub description: String,
    #[facet(default)]
    pub status: String,
    #[facet(default)]
    pub version: u32,
}

/// A test specification
#[derive(Debug, Clone, PartialEq, Eq, Facet)]
pub struct TestSpecification {
    pub id: WorkItemId,
    pub title: String,
    #[facet(default)]
    pub preconditions: String,
    #[facet(default)]
    pub test_description: String,
    #[facet(default)]
    pub expected_behavior: String,
    #[facet(default)]
    pub version: u32,
}

/// A test case
#[derive(Debug, Clone, PartialEq, Eq, Facet)]
pub struct TestCase {
    pub id: WorkItemId,
    pub title: String,
    #[facet(default)]
    pub description: String,
    #[facet(default)]
    pub repository: String,
    #[facet(default)]
    pub relative_path: String,
    #[facet(default)]
    pub version: u32,
}

/// Why a section is intentionally left without verification
#[derive(Debug, Clone, PartialEq, Eq, Facet)]
pub struct Justification {
    pub id: WorkItemId,
    pub description: String,
    #[facet(default)]
    pub version: u32,
}

/// A reference document
#[derive(Debug, Clone, PartialEq, Eq, Facet)]
pub struct Document {
    pub id: WorkItemId,
    pub title: String,
    #[facet(default)]
    pub description: String,
    #[facet(default)]
    pub document_type: String,
    #[facet(default)]
    pub url: String,
    #[facet(default)]
    pub version: u32,
}

/// Any work item
#[derive(Debug, Clone, PartialEq, Eq, Facet)]
#[facet(rename_all = "snake_case")]
#[repr(u8)]
pub enum WorkItem {
    Requirement(SwRequirement),
    TestSpec(TestSpecification),
    TestCase(TestCase),
    Justification(Justification),
    Document(Document),
}

impl WorkItem {
    pub fn kind(&self) -> WorkItemKind {
        match self {
            WorkItem::Requirement(_) => WorkItemKind::Requirement,
            WorkItem::TestSpec(_) => WorkItemKind::TestSpec,
            WorkItem::TestCase(_) => WorkItemKind::TestCase,
            WorkItem::Justification(_) => WorkItemKind::Justification,
            WorkItem::Document(_) => WorkItemKind::Document,
        }
    }

    pub fn id(&self) -> WorkItemId {
        match self {
            WorkItem::Requirement(r) => r.id,
            WorkItem::TestSpec(s) => s.id,
            WorkItem::TestCase(t) => t.id,
            WorkItem::Justification(j) => j.id,
            WorkItem::Document(d) => d.id,
        }
    }

    pub fn reference(&self) -> WorkItemRef {
        WorkItemRef {
            kind: self.kind(),
            id: self.id(),
        }
    }

    pub fn version(&self) -> u32 {
        match self {
            WorkItem::Requirement(r) => r.version,
            WorkItem::TestSpec(s) => s.version,
            WorkItem::TestCase(t) => t.version,
            WorkItem::Justification(j) => j.version,
            WorkItem::Document(d) => d.version,
        }
    }

    /// Short human label; justifications have no title and use their description
    pub fn title(&self) -> &str {
        match self {
            WorkItem::Requirement(r) => &r.title,
            WorkItem::TestSpec(s) => &s.title,
            WorkItem::TestCase(t) => &t.title,
            WorkItem::Justification(j) => &j.description,
            WorkItem::Document(d) => &d.title,
        }
    }

    /// Content fields tracked by the edit history of this item
    pub fn tracked_fields(&self) -> BTreeMap<String, String> {
        let pairs: Vec<(&str, &String)> = match self {
            WorkItem::Requirement(r) => vec![
                ("title", &r.title),
                ("description", &r.description),
                ("status", &r.status),
            ],
            WorkItem::TestSpec(s) => vec![
                ("title", &s.title),
                ("preconditions", &s.preconditions),
                ("test_description", &s.test_description),
                ("expected_behavior", &s.expected_behavior),
            ],
            WorkItem::TestCase(t) => vec![
                ("title", &t.title),
                ("description", &t.description),
                ("repository", &t.repository),
                ("relative_path", &t.relative_path),
            ],
            WorkItem::Justification(j) => vec![("description", &j.description)],
            WorkItem::Document(d) => vec![
                ("title", &d.title),
                ("description", &d.description),
                ("document_type", &d.document_type),
                ("url", &d.url),
            ],
        };
        pairs
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }
}

/// Work items of a component, looked up by typed reference
#[derive(Debug, Clone, Default)]
pub struct WorkItems {
    items: HashMap<WorkItemRef, WorkItem>,
}

impl WorkItems {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, item: WorkItem) -> Option<WorkItem> {
        self.items.insert(item.reference(), item)
    }

    pub fn get(&self, reference: WorkItemRef) -> Option<&WorkItem> {
        self.items.get(&reference)
    }

    /// Title of the referenced item, if the item is known
    pub fn title_of(&self, reference: WorkItemRef) -> Option<&str> {
        self.get(reference).map(WorkItem::title)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl FromIterator<WorkItem> for WorkItems {
    fn from_iter<I: IntoIterator<Item = WorkItem>>(iter: I) -> Self {
        let mut items = WorkItems::new();
        for item in iter {
            items.insert(item);
        }
        items
    }
}

/// A user as far as the engine cares: an id and a display identity
#[derive(Debug, Clone, PartialEq, Eq, Facet)]
pub struct User {
    pub id: UserId,
    pub username: String,
    #[facet(default)]
    pub email: Option<String>,
}
