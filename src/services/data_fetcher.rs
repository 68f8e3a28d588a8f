use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use crate::config::ProviderConfig;
use crate::error::ProviderError;
use crate::models::{
    CompetitionId, Fixture, MatchId, MatchStatus, PlayedMatch, StandingRow, TeamId, TeamRef,
    TeamStatistics,
};
use crate::services::provider::FixtureProvider;
use crate::utils::season_for;

// ── API-Football structures ─────────────────────────────────────────────────
//
// Every field is optional: a record missing something we need is dropped at
// this boundary instead of failing the whole payload.

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    errors: Value,
    #[serde(default)]
    response: Vec<Value>,
}

#[derive(Debug, Deserialize)]
pub struct ApiFixtureItem {
    pub fixture: Option<ApiFixtureInfo>,
    pub teams: Option<ApiTeams>,
    pub goals: Option<ApiGoals>,
}

#[derive(Debug, Deserialize)]
pub struct ApiFixtureInfo {
    pub id: Option<u64>,
    pub date: Option<String>,
    pub status: Option<ApiStatus>,
}

#[derive(Debug, Deserialize)]
pub struct ApiStatus {
    pub short: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ApiTeams {
    pub home: Option<ApiTeam>,
    pub away: Option<ApiTeam>,
}

#[derive(Debug, Deserialize)]
pub struct ApiTeam {
    pub id: Option<u64>,
    pub name: Option<String>,
    pub logo: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ApiGoals {
    pub home: Option<u32>,
    pub away: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct ApiStatisticsItem {
    pub team: Option<ApiTeam>,
    pub statistics: Option<Vec<ApiStatEntry>>,
}

#[derive(Debug, Deserialize)]
pub struct ApiStatEntry {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub value: Value,
}

#[derive(Debug, Deserialize)]
pub struct ApiStandingsItem {
    pub league: Option<ApiStandingsLeague>,
}

#[derive(Debug, Deserialize)]
pub struct ApiStandingsLeague {
    pub standings: Option<Vec<Vec<ApiStandingRow>>>,
}

#[derive(Debug, Deserialize)]
pub struct ApiStandingRow {
    pub rank: Option<u32>,
    pub team: Option<ApiTeam>,
}

// ── Conversions ─────────────────────────────────────────────────────────────

fn team_ref(team: Option<ApiTeam>) -> Option<TeamRef> {
    let team = team?;
    Some(TeamRef {
        id: Some(team.id?),
        name: team.name.filter(|n| !n.trim().is_empty())?,
        crest: team.logo,
    })
}

fn parse_kickoff(raw: Option<&str>) -> Option<DateTime<Utc>> {
    let raw = raw?;
    match DateTime::parse_from_rfc3339(raw) {
        Ok(d) => Some(d.with_timezone(&Utc)),
        Err(e) => {
            tracing::warn!("Bad date '{}': {}", raw, e);
            None
        }
    }
}

fn to_fixture(item: ApiFixtureItem, competition_id: CompetitionId) -> Option<Fixture> {
    let info = item.fixture?;
    let teams = item.teams?;
    Some(Fixture {
        id: Some(info.id?),
        kickoff: Some(parse_kickoff(info.date.as_deref())?),
        competition_id,
        home: team_ref(teams.home)?,
        away: team_ref(teams.away)?,
    })
}

fn to_played_match(item: ApiFixtureItem) -> Option<PlayedMatch> {
    let info = item.fixture?;
    let teams = item.teams?;
    let status = info
        .status
        .and_then(|s| s.short)
        .map(|code| MatchStatus::from_short(&code))
        .unwrap_or_else(|| MatchStatus::Other(String::new()));
    let (home_goals, away_goals) = item.goals.map_or((None, None), |g| (g.home, g.away));

    Some(PlayedMatch {
        id: info.id?,
        kickoff: parse_kickoff(info.date.as_deref())?,
        status,
        home: team_ref(teams.home)?,
        away: team_ref(teams.away)?,
        home_goals,
        away_goals,
    })
}

/// API-Football reports statistics as numbers, "55%" strings, or null.
fn stat_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().trim_end_matches('%').trim().parse().ok(),
        _ => None,
    }
}

fn to_team_statistics(item: ApiStatisticsItem) -> Option<TeamStatistics> {
    let team_id = item.team?.id?;
    let values = item
        .statistics
        .unwrap_or_default()
        .into_iter()
        .filter_map(|entry| Some((entry.kind?, stat_value(&entry.value)?)))
        .collect();
    Some(TeamStatistics { team_id, values })
}

fn to_standing_rows(item: ApiStandingsItem) -> Vec<StandingRow> {
    item.league
        .and_then(|l| l.standings)
        .unwrap_or_default()
        .into_iter()
        .flatten()
        .filter_map(|row| {
            Some(StandingRow {
                team_id: row.team?.id?,
                rank: row.rank.filter(|r| *r > 0)?,
            })
        })
        .collect()
}

fn parse_items<T: DeserializeOwned>(values: Vec<Value>, what: &str) -> Vec<T> {
    values
        .into_iter()
        .filter_map(|v| match serde_json::from_value(v) {
            Ok(item) => Some(item),
            Err(e) => {
                tracing::debug!("Skipping malformed {} item: {}", what, e);
                None
            }
        })
        .collect()
}

fn has_errors(errors: &Value) -> bool {
    match errors {
        Value::Null => false,
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
        Value::String(s) => !s.is_empty(),
        _ => true,
    }
}

// ── ApiFootballClient ───────────────────────────────────────────────────────

pub struct ApiFootballClient {
    client: Client,
    config: ProviderConfig,
}

impl ApiFootballClient {
    pub fn new(config: ProviderConfig, timeout: Duration) -> Result<Self, ProviderError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, config })
    }

    pub fn has_key(&self) -> bool {
        self.config.api_key.is_some()
    }

    fn season(&self, day: NaiveDate) -> u16 {
        self.config.season.unwrap_or_else(|| season_for(day))
    }

    /// GET `path`, retrying 429s with exponential backoff, and unwrap the
    /// `response` array.
    async fn get(&self, path: &str, query: &[(&str, String)]) -> Result<Vec<Value>, ProviderError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or(ProviderError::MissingCredentials("API_FOOTBALL_KEY"))?;
        let url = format!("{}{}", self.config.base_url, path);

        let mut attempts = 0u32;
        loop {
            attempts += 1;
            let resp = self
                .client
                .get(&url)
                .query(query)
                .header("X-RapidAPI-Key", api_key)
                .header("X-RapidAPI-Host", self.config.host_header.as_str())
                .send()
                .await?;

            if resp.status() == StatusCode::TOO_MANY_REQUESTS {
                if attempts >= self.config.max_retries {
                    return Err(ProviderError::RateLimited(attempts));
                }
                let wait = Duration::from_millis(250 * 2u64.pow(attempts)); // 500ms, 1s, 2s
                tracing::warn!("API-Football 429 on {}, waiting {:?} (attempt {})", path, wait, attempts);
                tokio::time::sleep(wait).await;
                continue;
            }

            if !resp.status().is_success() {
                let status = resp.status().as_u16();
                let body = resp.text().await.unwrap_or_default();
                return Err(ProviderError::Status { status, body });
            }

            let envelope: Envelope = resp
                .json()
                .await
                .map_err(|e| ProviderError::malformed(format!("{}: {}", path, e)))?;

            if has_errors(&envelope.errors) {
                return Err(ProviderError::malformed(format!(
                    "{} reported errors: {}",
                    path, envelope.errors
                )));
            }

            return Ok(envelope.response);
        }
    }
}

#[async_trait]
impl FixtureProvider for ApiFootballClient {
    async fn list_fixtures(
        &self,
        competition_id: CompetitionId,
        utc_date: NaiveDate,
    ) -> Result<Vec<Fixture>, ProviderError> {
        let values = self
            .get(
                "/fixtures",
                &[
                    ("league", competition_id.to_string()),
                    ("season", self.season(utc_date).to_string()),
                    ("date", utc_date.format("%Y-%m-%d").to_string()),
                ],
            )
            .await?;

        let fixtures: Vec<Fixture> = parse_items::<ApiFixtureItem>(values, "fixture")
            .into_iter()
            .filter_map(|item| to_fixture(item, competition_id))
            .collect();

        tracing::debug!("League {} on {}: {} fixtures", competition_id, utc_date, fixtures.len());
        Ok(fixtures)
    }

    async fn list_recent_matches(
        &self,
        team_id: TeamId,
        limit: u32,
    ) -> Result<Vec<PlayedMatch>, ProviderError> {
        let values = self
            .get("/fixtures", &[("team", team_id.to_string()), ("last", limit.to_string())])
            .await?;

        Ok(parse_items::<ApiFixtureItem>(values, "fixture")
            .into_iter()
            .filter_map(to_played_match)
            .collect())
    }

    async fn match_statistics(
        &self,
        match_id: MatchId,
    ) -> Result<Vec<TeamStatistics>, ProviderError> {
        let values = self
            .get("/fixtures/statistics", &[("fixture", match_id.to_string())])
            .await?;

        Ok(parse_items::<ApiStatisticsItem>(values, "statistics")
            .into_iter()
            .filter_map(to_team_statistics)
            .collect())
    }

    async fn standings(
        &self,
        competition_id: CompetitionId,
    ) -> Result<Vec<StandingRow>, ProviderError> {
        let season = self.season(Utc::now().date_naive());
        let values = self
            .get(
                "/standings",
                &[("league", competition_id.to_string()), ("season", season.to_string())],
            )
            .await?;

        Ok(parse_items::<ApiStandingsItem>(values, "standings")
            .into_iter()
            .flat_map(to_standing_rows)
            .collect())
    }
}
