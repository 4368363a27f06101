//! Interval partitioning of a specification against its mappings
//!
//! Mappings overlap freely, so the text is re-cut every time a mapping is
//! added: the sections it intersects are split at every distinct boundary
//! (a sweep over sorted interval endpoints), each piece inheriting the items
//! of the section it was carved from. The result is a tiling of the text
//! where every mapping is attached to exactly the sections it overlaps.

use crate::clamp_percent;
use crate::model::{Mapping, MappingId, SectionRange, WorkItemKind, WorkItemRef};
use facet::Facet;
use tracing::debug;

/// A mapping as seen by the partitioner
#[derive(Debug, Clone, PartialEq, Facet)]
pub struct SectionItem {
    pub mapping: MappingId,
    pub work_item: WorkItemRef,
    /// Range of the specification the mapping covers
    pub range: SectionRange,
    /// What this item contributes to the coverage of every section it touches
    pub coverage: f64,
}

impl SectionItem {
    /// Build an item from a direct mapping; nested mappings have no range
    pub fn from_mapping(mapping: &Mapping, coverage: f64) -> Option<Self> {
        let (range, _) = mapping.section()?;
        Some(Self {
            mapping: mapping.id,
            work_item: mapping.work_item,
            range,
            coverage,
        })
    }
}

/// A disjoint slice of the specification and everything mapped onto it
#[derive(Debug, Clone, PartialEq, Facet)]
pub struct Section {
    pub range: SectionRange,
    pub text: String,
    /// Attached items, in the order their mappings were partitioned
    pub items: Vec<SectionItem>,
}

impl Section {
    pub fn offset(&self) -> usize {
        self.range.offset
    }

    pub fn has_items(&self) -> bool {
        !self.items.is_empty()
    }

    /// Items of one work item kind
    pub fn items_of(&self, kind: WorkItemKind) -> impl Iterator<Item = &SectionItem> {
        self.items
            .iter()
            .filter(move |item| item.work_item.kind == kind)
    }

    pub fn contains_mapping(&self, mapping: MappingId) -> bool {
        self.items.iter().any(|item| item.mapping == mapping)
    }

    /// Sum of every attached item's contribution, clamped to `[0, 100]`.
    ///
    /// Overlapping partial verifications add up rather than average.
    pub fn covered(&self) -> f64 {
        clamp_percent(self.items.iter().map(|item| item.coverage).sum())
    }

    /// Share of the section left uncovered
    pub fn gap(&self) -> f64 {
        100.0 - self.covered()
    }
}

/// Split direct mappings into those whose captured text still matches `text`
/// and those that went stale. Nested mappings are skipped.
pub fn split_stale<'m>(
    text: &str,
    mappings: impl IntoIterator<Item = &'m Mapping>,
) -> (Vec<&'m Mapping>, Vec<&'m Mapping>) {
    let mut matched = Vec::new();
    let mut unmatched = Vec::new();
    for mapping in mappings.into_iter().filter(|m| m.is_direct()) {
        if mapping.is_stale(text) {
            debug!(mapping = mapping.id, "captured section no longer matches specification");
            unmatched.push(mapping);
        } else {
            matched.push(mapping);
        }
    }
    (matched, unmatched)
}

/// Working piece: a range and indices into the item list
#[derive(Debug)]
struct Cut {
    range: SectionRange,
    items: Vec<usize>,
}

/// Partition `text` into disjoint sections annotated with the items overlapping them.
///
/// Sections come back sorted by offset and tile the whole text; stretches no
/// item touches stay as item-less sections. Items whose range is not a valid
/// slice of `text` are ignored.
pub fn partition(text: &str, items: impl IntoIterator<Item = SectionItem>) -> Vec<Section> {
    let items: Vec<SectionItem> = items
        .into_iter()
        .filter(|item| {
            let valid = item.range.slice(text).is_some();
            if !valid {
                debug!(mapping = item.mapping, "skipping item outside the specification");
            }
            valid
        })
        .collect();

    let mut cuts = vec![Cut {
        range: SectionRange::new(0, text.len()),
        items: Vec::new(),
    }];

    for (idx, item) in items.iter().enumerate() {
        let range = item.range;

        let Some(first) = cuts.iter().position(|c| c.range.intersects(&range)) else {
            // Zero-length mapping: annotate whatever holds its offset, no split.
            // At the end of the text that is the section ending there.
            let holder = cuts
                .iter()
                .position(|c| c.range.contains(range.offset))
                .or_else(|| cuts.iter().rposition(|c| c.range.end() == range.offset));
            if let Some(holder) = holder {
                cuts[holder].items.push(idx);
            }
            continue;
        };
        // Cuts are sorted and disjoint, so the intersecting ones form a run
        let last = cuts
            .iter()
            .rposition(|c| c.range.intersects(&range))
            .unwrap_or(first);

        let run = &cuts[first..=last];
        let lo = run[0].range.offset;
        let hi = run[run.len() - 1].range.end();

        let mut bounds: Vec<usize> = run
            .iter()
            .flat_map(|c| [c.range.offset, c.range.end()])
            .chain([range.offset, range.end()])
            .filter(|b| (lo..=hi).contains(b))
            .collect();
        bounds.sort_unstable();
        bounds.dedup();

        let mut pieces = Vec::with_capacity(bounds.len());
        for pair in bounds.windows(2) {
            let piece = SectionRange::from_bounds(pair[0], pair[1]);
            let Some(source) = run
                .iter()
                .find(|c| c.range.offset <= piece.offset && piece.end() <= c.range.end())
            else {
                continue;
            };
            let mut piece_items = source.items.clone();
            if piece.intersects(&range) {
                piece_items.push(idx);
            }
            pieces.push(Cut {
                range: piece,
                items: piece_items,
            });
        }

        cuts.splice(first..=last, pieces);
    }

    cuts.into_iter()
        .filter(|cut| !(cut.range.is_empty() && cut.items.is_empty()))
        .map(|cut| Section {
            text: cut
                .range
                .slice(text)
                .map(str::to_string)
                .unwrap_or_else(|| {
                    let bytes = &text.as_bytes()[cut.range.offset..cut.range.end()];
                    String::from_utf8_lossy(bytes).into_owned()
                }),
            range: cut.range,
            items: cut.items.into_iter().map(|i| items[i].clone()).collect(),
        })
        .collect()
}
