//! Scoring of ready matches
//!
//! When a match first reaches BOTH_READY the hub scores participant 1's
//! fingerprints against participant 2's pool. Scoring runs inline with the
//! shared Similarity Engine by default, or through a remote duel-sc
//! instance when a scoring service URL is configured.

use duel_common::protocol::{CompareRequest, CompareResponse, MatchState, Role};
use duel_common::similarity::{ScoringInput, SimilarityEngine};
use std::time::Duration;
use thiserror::Error;

const USER_AGENT: &str = concat!("duel-hub/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Scoring errors
#[derive(Debug, Error)]
pub enum ScorerError {
    /// A slot has no stored result
    #[error("No result stored for {0}")]
    MissingResult(Role),

    /// A stored result lacks usable fingerprints
    #[error("Unscorable payload: {0}")]
    Input(#[from] duel_common::Error),

    /// Network communication error
    #[error("Network error: {0}")]
    Network(String),

    /// Scoring service returned an error response
    #[error("Scoring service error {0}: {1}")]
    Api(u16, String),

    /// Failed to parse the scoring service response
    #[error("Parse error: {0}")]
    Parse(String),
}

/// HTTP client for a duel-sc instance
pub struct RemoteScorer {
    http_client: reqwest::Client,
    endpoint: String,
}

impl RemoteScorer {
    /// Client for the duel-sc service rooted at `base_url`
    pub fn new(base_url: &str) -> Result<Self, ScorerError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| ScorerError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            endpoint: format!("{}/compare-hashes", base_url.trim_end_matches('/')),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn compare(&self, request: &CompareRequest) -> Result<CompareResponse, ScorerError> {
        tracing::debug!(url = %self.endpoint, "Requesting remote comparison");

        let response = self
            .http_client
            .post(&self.endpoint)
            .json(request)
            .send()
            .await
            .map_err(|e| ScorerError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ScorerError::Api(status.as_u16(), error_text));
        }

        response
            .json::<CompareResponse>()
            .await
            .map_err(|e| ScorerError::Parse(e.to_string()))
    }
}

/// Where ready matches get scored
pub enum Scorer {
    Inline(SimilarityEngine),
    Remote(RemoteScorer),
}

impl Scorer {
    /// Inline scoring with the default confidence curve
    pub fn inline() -> Self {
        Scorer::Inline(SimilarityEngine::default())
    }

    /// Remote scoring when a URL is given, inline otherwise
    pub fn from_url(scoring_service_url: Option<&str>) -> Result<Self, ScorerError> {
        match scoring_service_url {
            Some(url) => Ok(Scorer::Remote(RemoteScorer::new(url)?)),
            None => Ok(Scorer::inline()),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Scorer::Inline(_) => "inline".to_string(),
            Scorer::Remote(remote) => format!("remote ({})", remote.endpoint()),
        }
    }

    /// Similarity percentage of a match with both results stored
    pub async fn score_match(&self, state: &MatchState) -> Result<f64, ScorerError> {
        let a = scoring_input(state, Role::Participant1)?;
        let b = scoring_input(state, Role::Participant2)?;

        match self {
            Scorer::Inline(engine) => Ok(engine.compare_inputs(&a, &b).similarity_score),
            Scorer::Remote(remote) => {
                let response = remote.compare(&CompareRequest::from_inputs(&a, &b)).await?;
                Ok(response.similarity_score)
            }
        }
    }
}

fn scoring_input(state: &MatchState, role: Role) -> Result<ScoringInput, ScorerError> {
    let payload = state
        .slot(role)
        .result
        .as_ref()
        .ok_or(ScorerError::MissingResult(role))?;
    Ok(ScoringInput::from_payload(payload)?)
}
