//! Similarity Engine
//!
//! Turns two sets of content fingerprints into a single confidence-weighted
//! percentage. Everything here is pure and deterministic: no I/O, no shared
//! state, same inputs always give the same score.
//!
//! # Algorithm
//!
//! For each fingerprint `fA` of submission A (with weight `w`):
//! 1. Compare against every fingerprint `fB` of submission B by Hamming distance
//!    (maximal distance when the lengths differ).
//! 2. Map the raw bit similarity through the [`ConfidenceCurve`].
//! 3. Sum the confidences and saturate at 1.0 (the reconstruction score).
//!
//! The final score is the weight-averaged reconstruction score, times 100.

mod input;
mod pairing;

pub use input::{ChunkWeight, Fingerprint, ScoringInput};
pub use pairing::{select_matches, SelectedMatch, MATCH_DISPLAY_THRESHOLD, MIN_SCORE_FOR_MATCHES};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Raw similarity at which the confidence curve takes off
pub const DEFAULT_ACTIVATION_POINT: f64 = 0.75;

/// Sharpness of the knee of the confidence curve
pub const DEFAULT_STEEPNESS: f64 = 20.0;

/// Numerically stable `ln(1 + e^v)`
///
/// The naive form overflows to infinity for `v` above ~709.
pub fn softplus(v: f64) -> f64 {
    v.max(0.0) + (-v.abs()).exp().ln_1p()
}

/// Normalized softplus mapping raw bit similarity onto a `[0, 1]` confidence
///
/// The curve is shifted to `activation_point` and rescaled so that a raw
/// similarity of 0 maps to 0 and a raw similarity of 1 maps to 1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceCurve {
    /// Raw similarity where the curve bends upward (x0)
    pub activation_point: f64,
    /// Steepness of the bend (k)
    pub steepness: f64,
}

impl Default for ConfidenceCurve {
    fn default() -> Self {
        Self {
            activation_point: DEFAULT_ACTIVATION_POINT,
            steepness: DEFAULT_STEEPNESS,
        }
    }
}

impl ConfidenceCurve {
    /// Confidence for a raw similarity in `[0, 1]`
    ///
    /// Inputs outside the range are accepted and clamp to the nearest bound
    /// (a negative raw similarity comes from comparing against a longer
    /// fingerprint).
    pub fn confidence(&self, raw_similarity: f64) -> f64 {
        let k = self.steepness;
        let x0 = self.activation_point;

        let transformed = softplus(k * (raw_similarity - x0));
        let min_val = softplus(k * (0.0 - x0));
        let max_val = softplus(k * (1.0 - x0));

        let span = max_val - min_val;
        if !(span > 0.0) {
            // Zero steepness flattens the curve; there is nothing to normalize against
            return 0.0;
        }

        ((transformed - min_val) / span).clamp(0.0, 1.0)
    }
}

/// Confidence using the default curve (`x0 = 0.75`, `k = 20`)
pub fn confidence(raw_similarity: f64) -> f64 {
    ConfidenceCurve::default().confidence(raw_similarity)
}

/// Number of differing positions between two fingerprints
///
/// Fingerprints of different lengths are a definite, maximal mismatch:
/// the distance is the longer of the two lengths.
pub fn hamming_distance(a: &str, b: &str) -> usize {
    if a.len() != b.len() {
        return a.len().max(b.len());
    }
    a.bytes().zip(b.bytes()).filter(|(x, y)| x != y).count()
}

/// Raw bit similarity of `a` against `b`, relative to the length of `a`
///
/// An empty `a` carries no evidence and yields 0.
pub fn raw_similarity(a: &str, b: &str) -> f64 {
    if a.is_empty() {
        return 0.0;
    }
    1.0 - hamming_distance(a, b) as f64 / a.len() as f64
}

/// Result of a full comparison between two submissions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comparison {
    /// Weighted similarity percentage in `[0, 100]`
    pub similarity_score: f64,
    /// One-to-one fingerprint pairs worth highlighting (empty for low scores)
    pub selected_matches: Vec<SelectedMatch>,
}

impl Comparison {
    /// Qualitative band for the score
    pub fn verdict(&self) -> SimilarityVerdict {
        SimilarityVerdict::from_score(self.similarity_score)
    }
}

/// Similarity Engine parameterized by a confidence curve
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SimilarityEngine {
    curve: ConfidenceCurve,
}

impl SimilarityEngine {
    /// Create an engine with a custom confidence curve
    pub fn new(curve: ConfidenceCurve) -> Self {
        Self { curve }
    }

    /// The curve this engine scores with
    pub fn curve(&self) -> ConfidenceCurve {
        self.curve
    }

    /// Saturating sum of confidences of `fingerprint` against every candidate in `pool`
    pub fn reconstruction_score<B: AsRef<str>>(&self, fingerprint: &str, pool: &[B]) -> f64 {
        self.confidence_row(fingerprint, pool).iter().sum::<f64>().min(1.0)
    }

    /// Similarity percentage of A against the pool B
    ///
    /// `weights_a` pairs positionally with `fingerprints_a`; a position with
    /// no weight counts as weight 0. Returns 0 when A is empty or all weights
    /// are zero.
    pub fn score<A, B>(&self, fingerprints_a: &[A], weights_a: &[u64], fingerprints_b: &[B]) -> f64
    where
        A: AsRef<str>,
        B: AsRef<str>,
    {
        let rows = self.confidence_matrix(fingerprints_a, fingerprints_b);
        weighted_score(&rows, weights_a)
    }

    /// Score plus the highlight pairing
    pub fn compare<A, B>(
        &self,
        fingerprints_a: &[A],
        weights_a: &[u64],
        fingerprints_b: &[B],
    ) -> Comparison
    where
        A: AsRef<str>,
        B: AsRef<str>,
    {
        let rows = self.confidence_matrix(fingerprints_a, fingerprints_b);
        let similarity_score = weighted_score(&rows, weights_a);

        let selected_matches = if similarity_score < MIN_SCORE_FOR_MATCHES {
            Vec::new()
        } else {
            select_matches(&rows)
        };

        Comparison {
            similarity_score,
            selected_matches,
        }
    }

    /// Score two extracted result payloads (A = `a`, pool = `b`)
    pub fn compare_inputs(&self, a: &ScoringInput, b: &ScoringInput) -> Comparison {
        self.compare(&a.hashes2, &a.weights(), &b.hashes2)
    }

    fn confidence_row<B: AsRef<str>>(&self, fingerprint: &str, pool: &[B]) -> Vec<f64> {
        pool.iter()
            .map(|candidate| self.curve.confidence(raw_similarity(fingerprint, candidate.as_ref())))
            .collect()
    }

    fn confidence_matrix<A, B>(&self, fingerprints_a: &[A], fingerprints_b: &[B]) -> Vec<Vec<f64>>
    where
        A: AsRef<str>,
        B: AsRef<str>,
    {
        fingerprints_a
            .iter()
            .map(|fp| self.confidence_row(fp.as_ref(), fingerprints_b))
            .collect()
    }
}

fn weighted_score(rows: &[Vec<f64>], weights: &[u64]) -> f64 {
    if rows.is_empty() {
        return 0.0;
    }

    let mut weighted_sum = 0.0;
    let mut total_weight = 0.0;
    for (i, row) in rows.iter().enumerate() {
        let weight = weights.get(i).copied().unwrap_or(0) as f64;
        let reconstruction = row.iter().sum::<f64>().min(1.0);
        weighted_sum += reconstruction * weight;
        total_weight += weight;
    }

    if total_weight == 0.0 {
        return 0.0;
    }
    weighted_sum / total_weight * 100.0
}

/// Similarity percentage with the default curve
///
/// # Examples
///
/// ```
/// use duel_common::similarity::similarity_score;
///
/// let a = ["0000", "1111"];
/// let score = similarity_score(&a, &[4, 4], &a);
/// assert!((score - 100.0).abs() < 1e-9);
/// ```
pub fn similarity_score<A, B>(fingerprints_a: &[A], weights_a: &[u64], fingerprints_b: &[B]) -> f64
where
    A: AsRef<str>,
    B: AsRef<str>,
{
    SimilarityEngine::default().score(fingerprints_a, weights_a, fingerprints_b)
}

/// Full comparison with the default curve
pub fn compare<A, B>(fingerprints_a: &[A], weights_a: &[u64], fingerprints_b: &[B]) -> Comparison
where
    A: AsRef<str>,
    B: AsRef<str>,
{
    SimilarityEngine::default().compare(fingerprints_a, weights_a, fingerprints_b)
}

/// Qualitative reading of a similarity percentage, as shown to the judge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimilarityVerdict {
    /// Above 75%
    High,
    /// Above 40%
    Moderate,
    /// 40% or below
    Distinct,
}

impl SimilarityVerdict {
    pub fn from_score(score: f64) -> Self {
        if score > 75.0 {
            SimilarityVerdict::High
        } else if score > 40.0 {
            SimilarityVerdict::Moderate
        } else {
            SimilarityVerdict::Distinct
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            SimilarityVerdict::High => {
                "A high degree of similarity was detected, suggesting significant code overlap or shared logic."
            }
            SimilarityVerdict::Moderate => {
                "A moderate level of similarity was found, indicating some common structures or algorithms."
            }
            SimilarityVerdict::Distinct => {
                "The codebases are largely distinct, with a low level of detected similarity."
            }
        }
    }
}

impl fmt::Display for SimilarityVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SimilarityVerdict::High => "High",
            SimilarityVerdict::Moderate => "Moderate",
            SimilarityVerdict::Distinct => "Distinct",
        };
        write!(f, "{}", s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    #[test]
    fn test_softplus_matches_naive_form() {
        for v in [-15.0, -1.0, 0.0, 1.0, 5.0] {
            let naive = (1.0f64 + f64::exp(v)).ln();
            assert!((softplus(v) - naive).abs() < 1e-12, "softplus({}) diverged", v);
        }
        // Naive form would be inf here
        assert!((softplus(1000.0) - 1000.0).abs() < EPS);
    }

    #[test]
    fn test_confidence_endpoints() {
        assert!(confidence(0.0).abs() < EPS);
        assert!((confidence(1.0) - 1.0).abs() < EPS);
    }

    #[test]
    fn test_confidence_non_decreasing() {
        let mut prev = confidence(0.0);
        for step in 1..=1000 {
            let s = step as f64 / 1000.0;
            let c = confidence(s);
            assert!(c + 1e-12 >= prev, "confidence dropped at s={}: {} < {}", s, c, prev);
            prev = c;
        }
    }

    #[test]
    fn test_confidence_knee_at_activation_point() {
        // ln 2 / (softplus(5) - softplus(-15))
        let expected = std::f64::consts::LN_2 / (softplus(5.0) - softplus(-15.0));
        let at_knee = confidence(0.75);
        assert!((at_knee - expected).abs() < 1e-12);
        assert!((at_knee - 0.1385).abs() < 1e-3);

        // Flat below the knee, steep above it
        assert!(confidence(0.5) < 0.01);
        assert!(confidence(0.9) > 0.5);
    }

    #[test]
    fn test_confidence_clamps_out_of_range_inputs() {
        assert_eq!(confidence(-1.0), 0.0);
        assert_eq!(confidence(2.0), 1.0);
    }

    #[test]
    fn test_flat_curve_is_zero() {
        let curve = ConfidenceCurve {
            activation_point: 0.75,
            steepness: 0.0,
        };
        assert_eq!(curve.confidence(1.0), 0.0);
    }

    #[test]
    fn test_hamming_distance() {
        assert_eq!(hamming_distance("1010", "1010"), 0);
        assert_eq!(hamming_distance("1010", "0101"), 4);
        assert_eq!(hamming_distance("1000", "1001"), 1);
        // Length mismatch is the maximal distance, not an error
        assert_eq!(hamming_distance("101", "10110"), 5);
        assert_eq!(hamming_distance("", ""), 0);
    }

    #[test]
    fn test_raw_similarity() {
        assert!((raw_similarity("1111", "1111") - 1.0).abs() < EPS);
        assert!(raw_similarity("0000", "1111").abs() < EPS);
        assert!((raw_similarity("1100", "1110") - 0.75).abs() < EPS);
        assert_eq!(raw_similarity("", ""), 0.0);
        assert!(raw_similarity("11", "1111") < 0.0);
    }

    #[test]
    fn test_identical_single_fingerprint_scores_full() {
        for w in [1, 7, 1000] {
            let score = similarity_score(&["10110011"], &[w], &["10110011"]);
            assert!((score - 100.0).abs() < EPS, "weight {} gave {}", w, score);
        }
    }

    #[test]
    fn test_empty_a_scores_zero() {
        let empty: [&str; 0] = [];
        assert_eq!(similarity_score(&empty, &[], &["0101"]), 0.0);
    }

    #[test]
    fn test_zero_weights_score_zero() {
        assert_eq!(similarity_score(&["0101", "1111"], &[0, 0], &["0101"]), 0.0);
    }

    #[test]
    fn test_empty_pool_scores_zero() {
        let empty: [&str; 0] = [];
        assert_eq!(similarity_score(&["0101"], &[3], &empty), 0.0);
    }

    #[test]
    fn test_missing_weights_count_as_zero() {
        // Second fingerprint has no weight, so only the first contributes
        let score = similarity_score(&["0000", "1111"], &[4], &["0000"]);
        assert!((score - 100.0).abs() < EPS);
    }

    #[test]
    fn test_complementary_fingerprints_score_near_zero() {
        let score = similarity_score(&["01010101"], &[8], &["10101010"]);
        assert!(score < 1e-6);
    }

    #[test]
    fn test_pool_order_does_not_matter() {
        let a = ["00001111", "11110000", "10101010"];
        let weights = [3, 5, 2];
        let b = ["00001110", "11111111", "10101011", "01010101"];
        let mut reversed = b;
        reversed.reverse();
        let rotated = [b[2], b[0], b[3], b[1]];

        let base = similarity_score(&a, &weights, &b);
        assert!((base - similarity_score(&a, &weights, &reversed)).abs() < 1e-12);
        assert!((base - similarity_score(&a, &weights, &rotated)).abs() < 1e-12);
    }

    #[test]
    fn test_reconstruction_saturates_at_one() {
        let engine = SimilarityEngine::default();
        let pool = ["1111", "1111", "1111"];
        assert!((engine.reconstruction_score("1111", &pool) - 1.0).abs() < EPS);
    }

    #[test]
    fn test_mismatched_fingerprint_lowers_score() {
        let a = ["0000", "1111"];
        let identical = similarity_score(&a, &[4, 4], &a);
        let mismatched = similarity_score(&a, &[4, 4], &["1111", "1111"]);
        assert!((identical - 100.0).abs() < EPS);
        assert!((mismatched - 50.0).abs() < EPS);
    }

    #[test]
    fn test_length_mismatch_contributes_nothing() {
        let score = similarity_score(&["1111"], &[1], &["11110000"]);
        assert_eq!(score, 0.0);
    }

    #[test]
    fn test_compare_selects_pairs_for_high_scores() {
        let a = ["0000", "1111"];
        let comparison = compare(&a, &[4, 4], &["1111", "0000"]);
        assert!((comparison.similarity_score - 100.0).abs() < EPS);
        assert_eq!(comparison.selected_matches.len(), 2);
        assert_eq!(comparison.verdict(), SimilarityVerdict::High);
    }

    #[test]
    fn test_compare_drops_pairs_below_minimum_score() {
        let comparison = compare(&["0000"], &[1], &["1111"]);
        assert!(comparison.similarity_score < MIN_SCORE_FOR_MATCHES);
        assert!(comparison.selected_matches.is_empty());
    }

    #[test]
    fn test_verdict_bands() {
        assert_eq!(SimilarityVerdict::from_score(99.0), SimilarityVerdict::High);
        assert_eq!(SimilarityVerdict::from_score(75.0), SimilarityVerdict::Moderate);
        assert_eq!(SimilarityVerdict::from_score(40.5), SimilarityVerdict::Moderate);
        assert_eq!(SimilarityVerdict::from_score(40.0), SimilarityVerdict::Distinct);
        assert_eq!(format!("{}", SimilarityVerdict::High), "High");
        assert!(SimilarityVerdict::Distinct.description().contains("distinct"));
    }
}
