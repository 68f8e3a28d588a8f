//! In-memory providers and builders shared by the service tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use crate::error::ProviderError;
use crate::models::{
    CompetitionId, Fixture, MatchId, MatchStatus, PlayedMatch, StandingRow, TeamId, TeamRef,
    TeamStatistics,
};
use crate::services::provider::{FixtureProvider, ScrapeProvider};

pub fn team(id: TeamId, name: &str) -> TeamRef {
    TeamRef {
        id: Some(id),
        name: name.to_string(),
        crest: Some(format!("https://media/{}.png", id)),
    }
}

pub fn at(rfc3339: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(rfc3339)
        .unwrap()
        .with_timezone(&Utc)
}

pub fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn fixture(id: MatchId, kickoff: &str, competition_id: CompetitionId, home: TeamRef, away: TeamRef) -> Fixture {
    Fixture {
        id: Some(id),
        kickoff: Some(at(kickoff)),
        competition_id,
        home,
        away,
    }
}

pub fn played(
    id: MatchId,
    kickoff: &str,
    status: &str,
    home: TeamRef,
    away: TeamRef,
    goals: (u32, u32),
) -> PlayedMatch {
    let finished = MatchStatus::from_short(status).is_completed();
    PlayedMatch {
        id,
        kickoff: at(kickoff),
        status: MatchStatus::from_short(status),
        home,
        away,
        home_goals: finished.then_some(goals.0),
        away_goals: finished.then_some(goals.1),
    }
}

pub fn stats(team_id: TeamId, values: &[(&str, f64)]) -> TeamStatistics {
    TeamStatistics {
        team_id,
        values: values.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
    }
}

#[derive(Default)]
pub struct MockFixtureProvider {
    pub fixtures: Vec<Fixture>,
    pub history: HashMap<TeamId, Vec<PlayedMatch>>,
    pub statistics: HashMap<MatchId, Vec<TeamStatistics>>,
    pub standings: HashMap<CompetitionId, Vec<StandingRow>>,
    pub hang_history: HashSet<TeamId>,
    pub failing_history: HashSet<TeamId>,
    pub failing_statistics: HashSet<MatchId>,
    pub statistics_delay: HashMap<MatchId, Duration>,
    pub failing_fixtures: HashSet<CompetitionId>,
    pub failing_fixture_dates: HashSet<NaiveDate>,
    pub failing_standings: HashSet<CompetitionId>,
    pub fixture_calls: AtomicUsize,
    pub history_calls: AtomicUsize,
    pub statistics_calls: AtomicUsize,
    pub standings_calls: AtomicUsize,
}

impl MockFixtureProvider {
    pub fn calls(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

fn unavailable() -> ProviderError {
    ProviderError::Status {
        status: 503,
        body: "unavailable".to_string(),
    }
}

#[async_trait]
impl FixtureProvider for MockFixtureProvider {
    async fn list_fixtures(
        &self,
        competition_id: CompetitionId,
        utc_date: NaiveDate,
    ) -> Result<Vec<Fixture>, ProviderError> {
        self.fixture_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing_fixtures.contains(&competition_id)
            || self.failing_fixture_dates.contains(&utc_date)
        {
            return Err(unavailable());
        }
        Ok(self
            .fixtures
            .iter()
            .filter(|f| f.competition_id == competition_id)
            .filter(|f| f.kickoff.map(|k| k.date_naive()) == Some(utc_date))
            .cloned()
            .collect())
    }

    async fn list_recent_matches(
        &self,
        team_id: TeamId,
        limit: u32,
    ) -> Result<Vec<PlayedMatch>, ProviderError> {
        self.history_calls.fetch_add(1, Ordering::SeqCst);
        if self.hang_history.contains(&team_id) {
            std::future::pending::<()>().await;
        }
        if self.failing_history.contains(&team_id) {
            return Err(unavailable());
        }
        let mut history = self.history.get(&team_id).cloned().unwrap_or_default();
        history.truncate(limit as usize);
        Ok(history)
    }

    async fn match_statistics(
        &self,
        match_id: MatchId,
    ) -> Result<Vec<TeamStatistics>, ProviderError> {
        self.statistics_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.statistics_delay.get(&match_id) {
            tokio::time::sleep(*delay).await;
        }
        if self.failing_statistics.contains(&match_id) {
            return Err(unavailable());
        }
        Ok(self.statistics.get(&match_id).cloned().unwrap_or_default())
    }

    async fn standings(
        &self,
        competition_id: CompetitionId,
    ) -> Result<Vec<StandingRow>, ProviderError> {
        self.standings_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing_standings.contains(&competition_id) {
            return Err(unavailable());
        }
        Ok(self.standings.get(&competition_id).cloned().unwrap_or_default())
    }
}

#[derive(Default)]
pub struct MockScrapeProvider {
    pub pairs: Vec<(String, String)>,
    pub live: Option<String>,
    pub fail: bool,
    pub search_calls: AtomicUsize,
    pub queries: Mutex<Vec<String>>,
}

impl MockScrapeProvider {
    pub fn with_pairs(pairs: &[(&str, &str)]) -> Self {
        Self {
            pairs: pairs
                .iter()
                .map(|(h, a)| (h.to_string(), a.to_string()))
                .collect(),
            ..Self::default()
        }
    }
}

#[async_trait]
impl ScrapeProvider for MockScrapeProvider {
    async fn search_fixtures(&self, query: &str) -> Result<Vec<(String, String)>, ProviderError> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        self.queries.lock().unwrap().push(query.to_string());
        if self.fail {
            return Err(unavailable());
        }
        Ok(self.pairs.clone())
    }

    async fn live_text(&self, query: &str) -> Result<Option<String>, ProviderError> {
        self.queries.lock().unwrap().push(query.to_string());
        if self.fail {
            return Err(unavailable());
        }
        Ok(self.live.clone())
    }
}
