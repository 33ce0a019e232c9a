//! Phase-2 candidate selection
//!
//! Four ranked views over the phase-1 records, each capped at K entries with a
//! bounded heap. Ties rank the earlier record first.

use crate::modules::jobs::domain::entities::EnrichedRecord;
use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, HashSet};

/// Minimum external votes before a TMDb rating counts
pub const MIN_VOTES: u32 = 200;
/// User rating needed for a hidden gem
pub const GEM_MIN_USER_RATING: f64 = 3.5;
/// External stars needed for an overrated pick
pub const OVERRATED_MIN_STARS: f64 = 3.5;
/// Minimum disagreement between user and external rating, in stars
pub const MIN_RATING_GAP: f64 = 1.5;

/// Indices into the record slice, best first per view
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Phase2Selection {
    pub top_rated: Vec<usize>,
    pub hidden_gems: Vec<usize>,
    pub overrated: Vec<usize>,
    pub top_external: Vec<usize>,
}

impl Phase2Selection {
    /// Distinct TMDb ids across all views, in view order
    pub fn union_ids(&self, records: &[EnrichedRecord]) -> Vec<i64> {
        let mut seen = HashSet::new();
        self.top_rated
            .iter()
            .chain(&self.hidden_gems)
            .chain(&self.overrated)
            .chain(&self.top_external)
            .filter_map(|&index| records.get(index).and_then(|r| r.tmdb_id))
            .filter(|id| seen.insert(*id))
            .collect()
    }
}

pub fn select_phase2(records: &[EnrichedRecord], k: usize) -> Phase2Selection {
    Phase2Selection {
        top_rated: top_k(records, k, |r| {
            let user = r.rating?;
            r.tmdb_id?;
            Some((user, r.tmdb_stars().unwrap_or(f64::NEG_INFINITY)))
        }),
        hidden_gems: top_k(records, k, hidden_gem_key),
        overrated: top_k(records, k, overrated_key),
        top_external: top_k(records, k, |r| {
            r.tmdb_id?;
            let stars = r.tmdb_stars()?;
            (r.vote_count() >= MIN_VOTES).then_some((stars, r.vote_count() as f64))
        }),
    }
}

/// Rated well by the user, noticeably lower by TMDb. Ranked by gap, then user rating.
pub fn hidden_gem_key(record: &EnrichedRecord) -> Option<(f64, f64)> {
    record.tmdb_id?;
    let user = record.rating?;
    let stars = record.tmdb_stars()?;
    let gap = user - stars;
    (user >= GEM_MIN_USER_RATING && record.vote_count() >= MIN_VOTES && gap >= MIN_RATING_GAP)
        .then_some((gap, user))
}

/// Rated well by TMDb, noticeably lower by the user. Ranked by gap, then stars.
pub fn overrated_key(record: &EnrichedRecord) -> Option<(f64, f64)> {
    record.tmdb_id?;
    let user = record.rating?;
    let stars = record.tmdb_stars()?;
    let gap = stars - user;
    (stars >= OVERRATED_MIN_STARS && record.vote_count() >= MIN_VOTES && gap >= MIN_RATING_GAP)
        .then_some((gap, stars))
}

/// Heap entry; "greater" means better ranked
#[derive(Debug, Clone, Copy)]
struct Ranked {
    primary: f64,
    secondary: f64,
    index: usize,
}

impl Ord for Ranked {
    fn cmp(&self, other: &Self) -> Ordering {
        self.primary
            .total_cmp(&other.primary)
            .then(self.secondary.total_cmp(&other.secondary))
            .then(other.index.cmp(&self.index))
    }
}

impl PartialOrd for Ranked {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Ranked {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Ranked {}

/// Best `k` records by `key` in O(N log K); records with no key are skipped.
pub fn top_k<F>(records: &[EnrichedRecord], k: usize, key: F) -> Vec<usize>
where
    F: Fn(&EnrichedRecord) -> Option<(f64, f64)>,
{
    if k == 0 {
        return Vec::new();
    }

    // min-heap of the current best k
    let mut heap: BinaryHeap<Reverse<Ranked>> = BinaryHeap::with_capacity(k + 1);
    for (index, record) in records.iter().enumerate() {
        let Some((primary, secondary)) = key(record) else {
            continue;
        };
        let entry = Ranked {
            primary,
            secondary,
            index,
        };
        if heap.len() < k {
            heap.push(Reverse(entry));
        } else if let Some(Reverse(worst)) = heap.peek() {
            if entry > *worst {
                heap.pop();
                heap.push(Reverse(entry));
            }
        }
    }

    // ascending Reverse order is descending rank
    heap.into_sorted_vec()
        .into_iter()
        .map(|Reverse(entry)| entry.index)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::jobs::domain::entities::InputRow;
    use crate::modules::provider::domain::entities::MinimalFields;

    fn record(id: i64, user: Option<f64>, vote_average: Option<f64>, votes: u32) -> EnrichedRecord {
        EnrichedRecord::from_row(
            &InputRow::new(&format!("movie {}", id), None, user),
            Some(id),
            MinimalFields::default().with_votes(vote_average, Some(votes)),
        )
    }

    #[test]
    fn test_hidden_gem_thresholds() {
        let records = vec![
            record(1, Some(4.5), Some(6.0), 500), // gap 1.5 -> gem
            record(2, Some(4.5), Some(6.2), 500), // gap 1.4
            record(3, Some(3.0), Some(2.0), 500), // user below 3.5
            record(4, Some(5.0), Some(4.0), 150), // too few votes
            record(5, Some(5.0), None, 500),      // no external rating
            record(6, None, Some(4.0), 500),      // unrated by user
        ];
        assert_eq!(select_phase2(&records, 10).hidden_gems, vec![0]);
    }

    #[test]
    fn test_overrated_ranked_by_gap_then_stars() {
        let records = vec![
            record(1, Some(2.0), Some(8.0), 300), // gap 2.0, stars 4.0
            record(2, Some(1.0), Some(7.0), 300), // gap 2.5
            record(3, Some(2.5), Some(9.0), 300), // gap 2.0, stars 4.5
        ];
        assert_eq!(select_phase2(&records, 10).overrated, vec![1, 2, 0]);
    }

    #[test]
    fn test_ties_keep_input_order() {
        let records: Vec<_> = (0..5).map(|i| record(i, Some(4.0), Some(7.0), 300)).collect();
        assert_eq!(select_phase2(&records, 3).top_rated, vec![0, 1, 2]);
    }

    #[test]
    fn test_union_dedupes_ids() {
        let mut records = vec![
            record(7, Some(5.0), Some(6.0), 400),
            record(8, Some(1.0), Some(9.0), 400),
        ];
        records.push(records[0].clone());

        let selection = select_phase2(&records, 10);
        let ids = selection.union_ids(&records);
        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&7) && ids.contains(&8));
    }

    #[test]
    fn test_zero_k_selects_nothing() {
        let records = vec![record(1, Some(5.0), Some(6.0), 400)];
        assert_eq!(select_phase2(&records, 0), Phase2Selection::default());
    }
}
