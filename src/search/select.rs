//! Picking the best of several NZBs.

use std::cmp::Ordering;

use crate::types::Candidate;

/// Order two candidates by missing files, then missing segment percentage
///
/// Unknown values sort after known ones.
pub fn compare(a: &Candidate, b: &Candidate) -> Ordering {
    let files = |c: &Candidate| c.files_missing().unwrap_or(i64::MAX);
    let percent = |c: &Candidate| c.missing_percent().unwrap_or(f64::INFINITY);

    files(a)
        .cmp(&files(b))
        .then_with(|| percent(a).total_cmp(&percent(b)))
}

/// Take the candidate with the smallest shortfall
///
/// Ties go to the candidate found first.
pub fn select_best(mut candidates: Vec<Candidate>) -> Option<Candidate> {
    if candidates.len() > 1 {
        // stable: equal candidates keep discovery order
        candidates.sort_by(compare);
    }
    candidates.into_iter().next()
}
