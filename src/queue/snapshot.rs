//! Snapshot reconciliation: deduplication and diffing.

use std::collections::HashMap;

use crate::queue::record::{Record, Status};

/// Keep exactly one record per natural key: the one queued most recently.
///
/// When two records share the same queued timestamp the one appearing later
/// in `records` wins, so the most recently appended state is kept. Survivors
/// keep their relative order from the input.
pub fn dedup(records: &[Record]) -> Vec<Record> {
    latest_positions(records)
        .into_iter()
        .map(|i| records[i].clone())
        .collect()
}

/// Positions of the records [`dedup`] keeps, ascending.
pub(crate) fn latest_positions(records: &[Record]) -> Vec<usize> {
    let mut latest: HashMap<&str, usize> = HashMap::new();

    for (index, record) in records.iter().enumerate() {
        match latest.get(record.key()) {
            Some(&current) if records[current].queued > record.queued => {}
            _ => {
                latest.insert(record.key(), index);
            }
        }
    }

    let mut survivors: Vec<usize> = latest.into_values().collect();
    survivors.sort_unstable();
    survivors
}

/// Records of `new` that are unknown to `old` or whose status changed.
///
/// Both snapshots are deduplicated first, so `diff(q, q)` is always empty.
pub fn diff(old: &[Record], new: &[Record]) -> Vec<Record> {
    let previous: HashMap<String, Status> = dedup(old)
        .into_iter()
        .map(|record| (record.key().to_string(), record.status))
        .collect();

    dedup(new)
        .into_iter()
        .filter(|record| previous.get(record.key()) != Some(&record.status))
        .collect()
}

/// Most recently queued first, capped at `limit`.
pub fn most_recent(records: &[Record], limit: usize) -> Vec<Record> {
    let mut current = dedup(records);
    current.sort_by(|a, b| b.queued.cmp(&a.queued));
    current.truncate(limit);
    current
}
