//! Highlight pairing between fingerprints of two submissions
//!
//! Picks a one-to-one set of strongly matching fingerprint pairs so the judge
//! view can highlight which chunk of A corresponds to which chunk of B.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Pairs at or below this confidence are never highlighted
pub const MATCH_DISPLAY_THRESHOLD: f64 = 0.1;

/// Comparisons scoring below this percentage report no pairs at all
pub const MIN_SCORE_FOR_MATCHES: f64 = 0.8;

/// One highlighted pair
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SelectedMatch {
    /// Confidence of this pair in `[0, 1]`
    pub confidence: f64,
    /// Position in submission A's fingerprints
    pub index_a: usize,
    /// Position in submission B's fingerprints
    pub index_b: usize,
}

/// Greedy one-to-one assignment over a confidence matrix (`rows[a][b]`)
///
/// Candidates above [`MATCH_DISPLAY_THRESHOLD`] are taken in descending
/// confidence order; ties go to the lower A index, then the lower B index.
/// Each A and each B position is used at most once.
pub fn select_matches(rows: &[Vec<f64>]) -> Vec<SelectedMatch> {
    let mut candidates: Vec<SelectedMatch> = rows
        .iter()
        .enumerate()
        .flat_map(|(index_a, row)| {
            row.iter()
                .enumerate()
                .filter(|(_, confidence)| **confidence > MATCH_DISPLAY_THRESHOLD)
                .map(move |(index_b, confidence)| SelectedMatch {
                    confidence: *confidence,
                    index_a,
                    index_b,
                })
        })
        .collect();

    candidates.sort_by(|x, y| {
        y.confidence
            .total_cmp(&x.confidence)
            .then(x.index_a.cmp(&y.index_a))
            .then(x.index_b.cmp(&y.index_b))
    });

    let mut used_a = HashSet::new();
    let mut used_b = HashSet::new();
    candidates
        .into_iter()
        .filter(|m| {
            if used_a.contains(&m.index_a) || used_b.contains(&m.index_b) {
                return false;
            }
            used_a.insert(m.index_a);
            used_b.insert(m.index_b);
            true
        })
        .collect()
}
