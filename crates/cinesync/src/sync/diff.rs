//! Which merged movies need a rating written on the other platform.

use crate::entity::merged::MergedDataset;
use crate::entity::platform::SyncDirection;

use super::types::SyncCandidate;

/// Movies rated on the source side and unrated on the target side, in key order.
#[must_use]
pub fn candidates(dataset: &MergedDataset, direction: SyncDirection) -> Vec<SyncCandidate> {
    let source = direction.source();
    let target = direction.target();
    dataset
        .values()
        .filter(|m| m.is_rated_on(source) && !m.is_rated_on(target))
        .map(|m| SyncCandidate::new(direction, m.clone()))
        .collect()
}

/// Oldest source rating first; undated candidates last; ties broken by key.
pub fn order_candidates(candidates: &mut [SyncCandidate]) {
    candidates.sort_by_cached_key(|c| {
        let date = c.source_date();
        (date.is_none(), date, c.key())
    });
}
