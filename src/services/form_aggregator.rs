use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::FixedOffset;
use futures::future::join_all;

use crate::error::{EnrichError, ProviderError};
use crate::models::{
    FormAverages, FormEntry, MatchId, PlayedMatch, Side, TeamForm, TeamId, TeamStatistics,
    STAT_CORNERS, STAT_RED_CARDS, STAT_SHOTS_ON_GOAL, STAT_TOTAL_SHOTS, STAT_YELLOW_CARDS,
};
use crate::services::provider::{FixtureProvider, Upstream};
use crate::utils::format_local_date;

/// Rolling per-team averages over the latest completed matches.
pub struct FormAggregator {
    provider: Arc<dyn FixtureProvider>,
    upstream: Upstream,
    history_window: u32,
    tz: FixedOffset,
    date_format: String,
}

impl FormAggregator {
    pub fn new(
        provider: Arc<dyn FixtureProvider>,
        upstream: Upstream,
        history_window: u32,
        tz: FixedOffset,
        date_format: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            upstream,
            history_window,
            tz,
            date_format: date_format.into(),
        }
    }

    /// Form over the team's last `limit` completed matches.
    ///
    /// A failed history fetch yields the zero-value record; only an
    /// inconsistent statistics payload is reported as an error.
    pub async fn compute_form(&self, team_id: TeamId, limit: usize) -> Result<TeamForm, EnrichError> {
        let window = self.history_window.max(limit as u32);
        let history = match self
            .upstream
            .call(
                "recent matches",
                self.provider.list_recent_matches(team_id, window),
            )
            .await
        {
            Ok(history) => history,
            Err(e) => {
                tracing::warn!("History for team {} unavailable: {}", team_id, e);
                return Ok(TeamForm::empty(team_id));
            }
        };

        let matches = select_recent(history, team_id, limit);
        if matches.is_empty() {
            tracing::debug!("Team {} has no completed matches in window", team_id);
            return Ok(TeamForm::empty(team_id));
        }

        let requests = matches.iter().map(|m| {
            let match_id = m.id;
            async move {
                let result = self
                    .upstream
                    .call("match statistics", self.provider.match_statistics(match_id))
                    .await;
                (match_id, result)
            }
        });
        let stats: HashMap<MatchId, Result<Vec<TeamStatistics>, ProviderError>> =
            join_all(requests).await.into_iter().collect();

        aggregate(team_id, &matches, &stats, &self.tz, &self.date_format)
    }
}

/// Completed matches involving `team_id`, newest first, at most `limit`.
pub fn select_recent(history: Vec<PlayedMatch>, team_id: TeamId, limit: usize) -> Vec<PlayedMatch> {
    let mut completed: Vec<PlayedMatch> = history
        .into_iter()
        .filter(|m| m.status.is_completed())
        .filter(|m| m.involves(team_id))
        .filter(|m| m.home_goals.is_some() && m.away_goals.is_some())
        .collect();

    completed.sort_by(|a, b| b.kickoff.cmp(&a.kickoff));

    let mut seen = HashSet::new();
    completed.retain(|m| seen.insert(m.id));
    completed.truncate(limit);
    completed
}

/// Fold matches and their statistics into a [`TeamForm`].
///
/// Statistics are looked up by match id, so the order in which they
/// arrived does not matter. A failed or missing breakdown contributes
/// zero; the match's goals still count.
pub fn aggregate(
    team_id: TeamId,
    matches: &[PlayedMatch],
    stats: &HashMap<MatchId, Result<Vec<TeamStatistics>, ProviderError>>,
    tz: &FixedOffset,
    date_format: &str,
) -> Result<TeamForm, EnrichError> {
    let mut sums = FormAverages::default();
    let mut entries = Vec::with_capacity(matches.len());

    for m in matches {
        let side = match m.side_of(team_id) {
            Some(side) => side,
            None => continue,
        };
        let (home_goals, away_goals) = (m.home_goals.unwrap_or(0), m.away_goals.unwrap_or(0));
        let (goals_for, goals_against, opponent) = match side {
            Side::Home => (home_goals, away_goals, &m.away),
            Side::Away => (away_goals, home_goals, &m.home),
        };

        sums.goals_for += f64::from(goals_for);
        sums.goals_against += f64::from(goals_against);

        match stats.get(&m.id) {
            Some(Ok(rows)) => {
                if let Some(stranger) = rows.iter().find(|row| !m.involves(row.team_id)) {
                    return Err(EnrichError::Invariant {
                        match_id: m.id,
                        team_id: stranger.team_id,
                    });
                }
                if let Some(row) = rows.iter().find(|row| row.team_id == team_id) {
                    sums.corners += row.value(STAT_CORNERS);
                    sums.cards += row.value(STAT_YELLOW_CARDS) + row.value(STAT_RED_CARDS);
                    sums.shots_total += row.value(STAT_TOTAL_SHOTS);
                    sums.shots_on_target += row.value(STAT_SHOTS_ON_GOAL);
                }
            }
            Some(Err(e)) => {
                tracing::warn!("Statistics for match {} unavailable: {}", m.id, e);
            }
            None => {}
        }

        entries.push(FormEntry {
            match_id: m.id,
            opponent: opponent.name.clone(),
            goals_for,
            goals_against,
            is_home: side == Side::Home,
            date: format_local_date(m.kickoff, tz, date_format),
        });
    }

    let divisor = entries.len().max(1) as f64;
    let averages = FormAverages {
        goals_for: sums.goals_for / divisor,
        goals_against: sums.goals_against / divisor,
        corners: sums.corners / divisor,
        cards: sums.cards / divisor,
        shots_total: sums.shots_total / divisor,
        shots_on_target: sums.shots_on_target / divisor,
    };

    Ok(TeamForm::new(team_id, entries, averages))
}
