use std::time::Duration;

use thiserror::Error;

use crate::models::{CompetitionId, MatchId, TeamId};

/// Failures talking to an upstream source. Every variant is recoverable:
/// callers degrade to zero values, `Unknown`, or the fallback source.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("upstream returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("rate limited after {0} attempts")]
    RateLimited(u32),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("malformed payload: {0}")]
    Malformed(String),

    #[error("{0} not set")]
    MissingCredentials(&'static str),

    #[error("upstream gate closed")]
    GateClosed,
}

impl ProviderError {
    pub fn malformed(detail: impl Into<String>) -> Self {
        Self::Malformed(detail.into())
    }
}

/// Failures that surface past the local degradation policy.
#[derive(Debug, Error)]
pub enum EnrichError {
    #[error("statistics for match {match_id} name team {team_id}, which did not play in it")]
    Invariant { match_id: MatchId, team_id: TeamId },

    #[error("competition {competition_id} unavailable (primary: {primary}; fallback: {fallback})")]
    CompetitionUnavailable {
        competition_id: CompetitionId,
        primary: String,
        fallback: String,
    },
}
