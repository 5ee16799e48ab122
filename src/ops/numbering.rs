use std::collections::BTreeSet;

use crate::io::buckets::Bucket;

/// Smallest positive id not already taken.
pub fn next_available_id(taken: impl IntoIterator<Item = u32>) -> u32 {
    let taken: BTreeSet<u32> = taken.into_iter().collect();
    (1..).find(|id| !taken.contains(id)).unwrap_or(1)
}

/// Reassign ids `1..=n` to the surviving records, preserving their order by
/// original id. Returns the rewritten bucket and `(old, new)` pairs for ids
/// that moved.
pub fn renumber(bucket: Bucket) -> (Bucket, Vec<(u32, u32)>) {
    let mut entries: Vec<_> = bucket.into_iter().collect();
    entries.sort_by_key(|(id, _)| *id);

    let mut moved = Vec::new();
    let renumbered = entries
        .into_iter()
        .enumerate()
        .map(|(i, (old, record))| {
            let new = i as u32 + 1;
            if old != new {
                moved.push((old, new));
            }
            (new, record)
        })
        .collect();
    (renumbered, moved)
}

/// A note's position label: its ordinal among non-canceled notes, or a
/// fixed label when canceled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayIndex {
    Number(usize),
    Canceled,
}

impl DisplayIndex {
    pub fn render(&self, canceled_label: &str) -> String {
        match self {
            DisplayIndex::Number(n) => n.to_string(),
            DisplayIndex::Canceled => canceled_label.to_string(),
        }
    }
}

/// Display indexes for notes given as `(id, canceled)` in any order.
/// The result is in ascending id order.
pub fn display_indexes(notes: &[(u32, bool)]) -> Vec<(u32, DisplayIndex)> {
    let mut sorted = notes.to_vec();
    sorted.sort_by_key(|(id, _)| *id);
    let mut ordinal = 0;
    sorted
        .into_iter()
        .map(|(id, canceled)| {
            if canceled {
                (id, DisplayIndex::Canceled)
            } else {
                ordinal += 1;
                (id, DisplayIndex::Number(ordinal))
            }
        })
        .collect()
}
