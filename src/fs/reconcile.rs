//! Keyed diff between a displayed child listing and a freshly fetched one.
//!
//! Entries are matched by remote identifier only. Names can collide or
//! change between listings, identifiers cannot.

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::fs::node::NodeRecord;

/// A single change to a child sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum TreeEdit {
    /// The entry is gone from the listing.
    Remove { id: String },
    /// New entry at `index` of the new listing.
    Insert { index: usize, record: NodeRecord },
    /// Known entry whose attributes or position changed.
    Update {
        index: usize,
        previous_index: usize,
        record: NodeRecord,
    },
}

impl TreeEdit {
    /// Identifier of the entry this edit touches.
    pub fn id(&self) -> &str {
        match self {
            TreeEdit::Remove { id } => id,
            TreeEdit::Insert { record, .. } | TreeEdit::Update { record, .. } => &record.id,
        }
    }
}

/// Compute the edit turning `old` into `new`.
///
/// Removals come first (in `old` order), followed by inserts and updates in
/// ascending `index` order. Entries present in both listings at the same
/// position with identical attributes produce no edit. Both slices must have
/// unique ids; see [`dedup_by_id`].
pub fn reconcile(old: &[NodeRecord], new: &[NodeRecord]) -> Vec<TreeEdit> {
    let old_index: HashMap<&str, usize> = old
        .iter()
        .enumerate()
        .map(|(i, r)| (r.id.as_str(), i))
        .collect();
    let new_ids: HashSet<&str> = new.iter().map(|r| r.id.as_str()).collect();

    let mut edits: Vec<TreeEdit> = old
        .iter()
        .filter(|r| !new_ids.contains(r.id.as_str()))
        .map(|r| TreeEdit::Remove { id: r.id.clone() })
        .collect();

    for (index, record) in new.iter().enumerate() {
        match old_index.get(record.id.as_str()) {
            None => edits.push(TreeEdit::Insert {
                index,
                record: record.clone(),
            }),
            Some(&previous_index) => {
                if previous_index != index || old[previous_index] != *record {
                    edits.push(TreeEdit::Update {
                        index,
                        previous_index,
                        record: record.clone(),
                    });
                }
            }
        }
    }

    edits
}

/// Replay an edit produced by [`reconcile`] onto `old`.
///
/// Inserted and updated entries take their target slots; entries without an
/// edit fill the remaining slots in their original relative order.
pub fn apply(old: &[NodeRecord], edits: &[TreeEdit]) -> Vec<NodeRecord> {
    let mut removed: HashSet<&str> = HashSet::new();
    let mut moved: HashSet<&str> = HashSet::new();
    let mut inserts = 0usize;

    for edit in edits {
        match edit {
            TreeEdit::Remove { id } => {
                removed.insert(id);
            }
            TreeEdit::Insert { .. } => inserts += 1,
            TreeEdit::Update { record, .. } => {
                moved.insert(&record.id);
            }
        }
    }

    let len = (old.len() + inserts).saturating_sub(removed.len());
    let mut slots: Vec<Option<NodeRecord>> = vec![None; len];

    for edit in edits {
        match edit {
            TreeEdit::Insert { index, record } | TreeEdit::Update { index, record, .. } => {
                if let Some(slot) = slots.get_mut(*index) {
                    *slot = Some(record.clone());
                }
            }
            TreeEdit::Remove { .. } => {}
        }
    }

    let mut untouched = old
        .iter()
        .filter(|r| !removed.contains(r.id.as_str()) && !moved.contains(r.id.as_str()));

    slots
        .into_iter()
        .filter_map(|slot| slot.or_else(|| untouched.next().cloned()))
        .collect()
}

/// Drop repeated identifiers from a listing, keeping the first occurrence.
pub fn dedup_by_id(records: Vec<NodeRecord>) -> Vec<NodeRecord> {
    let mut seen = HashSet::new();
    records
        .into_iter()
        .filter(|r| {
            let fresh = seen.insert(r.id.clone());
            if !fresh {
                tracing::warn!(id = %r.id, name = %r.name, "duplicate id in listing, ignoring");
            }
            fresh
        })
        .collect()
}
