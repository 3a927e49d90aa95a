//! Fingerprint comparison endpoint

use axum::{extract::State, Json};
use duel_common::protocol::{CompareRequest, CompareResponse};
use tracing::debug;

use crate::AppState;

/// POST /compare-hashes
///
/// Scores `hashes_a` (weighted by `code_chunks_a`) against the pool
/// `hashes_b`. Malformed bodies are rejected by the `Json` extractor.
pub async fn compare_hashes(
    State(state): State<AppState>,
    Json(request): Json<CompareRequest>,
) -> Json<CompareResponse> {
    let weights = request.weights_a();
    let comparison = state
        .engine
        .compare(&request.hashes_a, &weights, &request.hashes_b);

    debug!(
        fingerprints_a = request.hashes_a.len(),
        fingerprints_b = request.hashes_b.len(),
        score = comparison.similarity_score,
        selected = comparison.selected_matches.len(),
        "Compared fingerprint sets"
    );

    Json(CompareResponse {
        status: "success".to_string(),
        similarity_score: comparison.similarity_score,
        selected_matches: comparison.selected_matches,
    })
}
