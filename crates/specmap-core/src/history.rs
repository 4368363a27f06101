//! Edit history of work items and their mappings
//!
//! A work item and the mapping that attaches it are versioned independently.
//! [`reconcile`] merges both logs into a single timeline of combined versions
//! (`object.mapping`, e.g. `3.2`) and reduces each step to the fields that
//! actually changed.

use crate::model::{MappingRow, Timestamp, User, UserId};
use facet::Facet;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::{debug, warn};

/// Fields holding bracket-delimited user id lists (`[1][4]`) unless configured otherwise
pub const DEFAULT_USER_LIST_FIELDS: &[&str] = &[
    "read_denials",
    "write_permissions",
    "edit_permissions",
    "manage_permissions",
];

/// Immutable snapshot of an object or mapping at one version
#[derive(Debug, Clone, PartialEq, Eq, Facet)]
pub struct HistoryEntry {
    pub version: u32,
    pub created_at: Timestamp,
    #[facet(default)]
    pub editor_id: Option<UserId>,
    /// Tracked field values at this version
    #[facet(default)]
    pub fields: BTreeMap<String, String>,
}

/// Append-only log of one entity's snapshots
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistoryLog {
    entries: Vec<HistoryEntry>,
}

impl HistoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap existing entries, ordered by version
    pub fn from_entries(mut entries: Vec<HistoryEntry>) -> Self {
        entries.sort_by_key(|e| e.version);
        Self { entries }
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn latest(&self) -> Option<&HistoryEntry> {
        self.entries.last()
    }

    /// Current version, 0 before the first record
    pub fn version(&self) -> u32 {
        self.latest().map_or(0, |e| e.version)
    }

    /// Append a snapshot if any tracked field differs from the latest one.
    ///
    /// Returns the new version, or `None` when nothing changed.
    pub fn record(
        &mut self,
        fields: BTreeMap<String, String>,
        editor_id: Option<UserId>,
        at: Timestamp,
    ) -> Option<u32> {
        if self.latest().is_some_and(|latest| latest.fields == fields) {
            debug!(version = self.version(), "no effective change, nothing recorded");
            return None;
        }
        let version = self.version() + 1;
        self.entries.push(HistoryEntry {
            version,
            created_at: at,
            editor_id,
            fields,
        });
        Some(version)
    }

    /// Drop every entry; history goes away together with its mapping
    pub fn purge(&mut self) {
        self.entries.clear();
    }
}

impl MappingRow {
    /// Mapping fields tracked by the mapping's edit history
    pub fn tracked_fields(&self) -> BTreeMap<String, String> {
        BTreeMap::from([
            ("coverage".to_string(), self.coverage.to_string()),
            ("offset".to_string(), self.offset.to_string()),
            ("section".to_string(), self.section.clone()),
        ])
    }
}

/// Resolves user ids to something a person recognizes
pub trait UserDirectory {
    fn display_name(&self, id: UserId) -> Option<String>;

    /// Display name, falling back to the raw id
    fn resolve(&self, id: UserId) -> String {
        self.display_name(id).unwrap_or_else(|| format!("#{id}"))
    }
}

impl UserDirectory for [User] {
    fn display_name(&self, id: UserId) -> Option<String> {
        self.iter()
            .find(|user| user.id == id)
            .map(|user| user.username.clone())
    }
}

impl UserDirectory for HashMap<UserId, String> {
    fn display_name(&self, id: UserId) -> Option<String> {
        self.get(&id).cloned()
    }
}

/// Knobs for [`reconcile`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileOptions {
    /// Fields rendered by resolving each bracketed user id
    pub user_list_fields: BTreeSet<String>,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        Self {
            user_list_fields: DEFAULT_USER_LIST_FIELDS
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

/// A field in a combined record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldChange {
    /// Value in the first record of the timeline
    Initial(String),
    /// New value and who set it
    Changed {
        value: String,
        editor: Option<String>,
    },
}

impl FieldChange {
    pub fn value(&self) -> &str {
        match self {
            FieldChange::Initial(value) | FieldChange::Changed { value, .. } => value,
        }
    }

    pub fn editor(&self) -> Option<&str> {
        match self {
            FieldChange::Initial(_) => None,
            FieldChange::Changed { editor, .. } => editor.as_deref(),
        }
    }
}

/// One step of the combined timeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryRecord {
    pub object_version: u32,
    pub mapping_version: Option<u32>,
    /// Later of the two contributing snapshots
    pub created_at: Timestamp,
    /// Object fields; unchanged ones are absent
    pub object: BTreeMap<String, FieldChange>,
    /// Mapping fields; unchanged ones are absent
    pub mapping: BTreeMap<String, FieldChange>,
}

impl HistoryRecord {
    /// Dotted combined version, `N.M`, or `N` while there is no mapping version
    pub fn version(&self) -> String {
        match self.mapping_version {
            Some(mapping) => format!("{}.{}", self.object_version, mapping),
            None => self.object_version.to_string(),
        }
    }
}

/// Which log a timeline event came from; object sorts first on ties
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Track {
    Object,
    Mapping,
}

#[derive(Debug, Clone, Copy)]
struct Step<'h> {
    object: &'h HistoryEntry,
    mapping: Option<&'h HistoryEntry>,
}

impl Step<'_> {
    fn created_at(&self) -> Timestamp {
        self.mapping
            .map_or(self.object.created_at, |m| m.created_at.max(self.object.created_at))
    }
}

/// Merge an object's log with its mapping's log into one diffed timeline,
/// latest first.
///
/// An object log without version 1 is treated as corrupt and yields an empty
/// timeline.
pub fn reconcile<U>(
    object_track: &[HistoryEntry],
    mapping_track: &[HistoryEntry],
    users: &U,
    options: &ReconcileOptions,
) -> Vec<HistoryRecord>
where
    U: UserDirectory + ?Sized,
{
    let Some(first_object) = object_track.iter().find(|e| e.version == 1) else {
        warn!(
            entries = object_track.len(),
            "object history has no initial version"
        );
        return Vec::new();
    };
    let first_mapping = mapping_track.iter().find(|e| e.version == 1);

    let mut timeline: Vec<(Track, &HistoryEntry)> = object_track
        .iter()
        .map(|e| (Track::Object, e))
        .chain(mapping_track.iter().map(|e| (Track::Mapping, e)))
        .collect();
    timeline.sort_by_key(|(track, e)| (e.created_at, *track, e.version));

    let mut steps = vec![Step {
        object: first_object,
        mapping: first_mapping,
    }];
    for (track, entry) in timeline {
        let current = steps[steps.len() - 1];
        match track {
            Track::Object if entry.version > current.object.version => steps.push(Step {
                object: entry,
                ..current
            }),
            Track::Mapping if current.mapping.is_none_or(|m| entry.version > m.version) => {
                steps.push(Step {
                    mapping: Some(entry),
                    ..current
                })
            }
            _ => {}
        }
    }

    let render = |name: &str, value: &str| -> String {
        if options.user_list_fields.contains(name) {
            render_user_list(value, users)
        } else {
            value.to_string()
        }
    };

    let mut records = Vec::with_capacity(steps.len());
    for (i, step) in steps.iter().enumerate() {
        let (object, mapping) = if i == 0 {
            let initial = |entry: &HistoryEntry| {
                entry
                    .fields
                    .iter()
                    .map(|(k, v)| (k.clone(), FieldChange::Initial(render(k, v))))
                    .collect::<BTreeMap<_, _>>()
            };
            (
                initial(step.object),
                step.mapping.map(initial).unwrap_or_default(),
            )
        } else {
            let previous = steps[i - 1];
            (
                diff(Some(previous.object), step.object, users, &render),
                match step.mapping {
                    Some(mapping) => diff(previous.mapping, mapping, users, &render),
                    None => BTreeMap::new(),
                },
            )
        };

        records.push(HistoryRecord {
            object_version: step.object.version,
            mapping_version: step.mapping.map(|m| m.version),
            created_at: step.created_at(),
            object,
            mapping,
        });
    }

    records.reverse();
    records
}

/// Fields of `current` that differ from `previous`, attributed to `current`'s editor
fn diff<U, R>(
    previous: Option<&HistoryEntry>,
    current: &HistoryEntry,
    users: &U,
    render: &R,
) -> BTreeMap<String, FieldChange>
where
    U: UserDirectory + ?Sized,
    R: Fn(&str, &str) -> String,
{
    if previous.is_some_and(|p| std::ptr::eq(p, current)) {
        return BTreeMap::new();
    }
    let empty = BTreeMap::new();
    let before = previous.map_or(&empty, |p| &p.fields);
    let editor = current.editor_id.map(|id| users.resolve(id));

    let names: BTreeSet<&String> = before.keys().chain(current.fields.keys()).collect();
    names
        .into_iter()
        .filter_map(|name| {
            let old = before.get(name).map(String::as_str).unwrap_or_default();
            let new = current.fields.get(name).map(String::as_str).unwrap_or_default();
            (old != new).then(|| {
                (
                    name.clone(),
                    FieldChange::Changed {
                        value: render(name, new),
                        editor: editor.clone(),
                    },
                )
            })
        })
        .collect()
}

/// Render `[1][4]` as the display names of users 1 and 4, comma separated
pub fn render_user_list<U>(value: &str, users: &U) -> String
where
    U: UserDirectory + ?Sized,
{
    value
        .split(['[', ']'])
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(|token| match token.parse::<UserId>() {
            Ok(id) => users.resolve(id),
            Err(_) => token.to_string(),
        })
        .collect::<Vec<_>>()
        .join(", ")
}
