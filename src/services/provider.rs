//! Narrow interfaces the enrichment core consumes, plus the gate every
//! outbound call goes through.
//!
//! The core never talks to a concrete backend directly: the API-Football
//! client and the web scraper both sit behind these traits, and tests swap
//! in in-memory providers.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::sync::Semaphore;

use crate::error::ProviderError;
use crate::models::{
    CompetitionId, Fixture, MatchId, PlayedMatch, StandingRow, TeamId, TeamStatistics,
};

/// Structured fixture/statistics source (primary).
#[async_trait]
pub trait FixtureProvider: Send + Sync {
    /// Fixtures whose kick-off falls on `utc_date` (UTC calendar date).
    async fn list_fixtures(
        &self,
        competition_id: CompetitionId,
        utc_date: NaiveDate,
    ) -> Result<Vec<Fixture>, ProviderError>;

    /// The team's latest `limit` matches, any status.
    async fn list_recent_matches(
        &self,
        team_id: TeamId,
        limit: u32,
    ) -> Result<Vec<PlayedMatch>, ProviderError>;

    /// Per-team statistic rows for one match.
    async fn match_statistics(&self, match_id: MatchId)
        -> Result<Vec<TeamStatistics>, ProviderError>;

    /// Current table for the competition.
    async fn standings(&self, competition_id: CompetitionId)
        -> Result<Vec<StandingRow>, ProviderError>;
}

/// Unstructured best-effort source (fallback and live telemetry).
#[async_trait]
pub trait ScrapeProvider: Send + Sync {
    /// (home, away) name pairs found for a free-text query.
    async fn search_fixtures(&self, query: &str) -> Result<Vec<(String, String)>, ProviderError>;

    /// Raw text of the live panel, or `None` when no panel showed up in time.
    async fn live_text(&self, query: &str) -> Result<Option<String>, ProviderError>;
}

/// Bounds in-flight outbound calls and puts a deadline on each one.
///
/// A permit is held only for the duration of a single call, so nested
/// fan-out (fixture → team → match statistics) cannot starve itself.
#[derive(Clone, Debug)]
pub struct Upstream {
    permits: Arc<Semaphore>,
    timeout: Duration,
}

impl Upstream {
    pub fn new(max_in_flight: usize, timeout: Duration) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(max_in_flight.max(1))),
            timeout,
        }
    }

    pub async fn call<T, F>(&self, label: &str, fut: F) -> Result<T, ProviderError>
    where
        F: Future<Output = Result<T, ProviderError>>,
    {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| ProviderError::GateClosed)?;

        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!("{} timed out after {:?}", label, self.timeout);
                Err(ProviderError::Timeout(self.timeout))
            }
        }
    }
}
