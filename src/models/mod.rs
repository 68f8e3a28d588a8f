use std::collections::HashMap;

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use serde::{Serialize, Serializer};

use crate::utils::format_avg;

pub type CompetitionId = u32;
pub type TeamId = u64;
pub type MatchId = u64;

/// Shown for any count or score the live panel did not expose.
pub const NOT_AVAILABLE: &str = "N/D";
/// Shown when the live panel carries no recognisable clock.
pub const PHASE_IN_PROGRESS: &str = "in progress";
/// Kick-off label for fixtures that came without a time (fallback source).
pub const KICKOFF_PLACEHOLDER: &str = "--:--";

// API-Football statistic type names.
pub const STAT_CORNERS: &str = "Corner Kicks";
pub const STAT_YELLOW_CARDS: &str = "Yellow Cards";
pub const STAT_RED_CARDS: &str = "Red Cards";
pub const STAT_TOTAL_SHOTS: &str = "Total Shots";
pub const STAT_SHOTS_ON_GOAL: &str = "Shots on Goal";

// ── Fixtures ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TeamRef {
    pub id: Option<TeamId>,
    pub name: String,
    pub crest: Option<String>,
}

impl TeamRef {
    /// A team known only by name, as the scrape fallback reports it.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            crest: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Fixture {
    pub id: Option<MatchId>,
    pub kickoff: Option<DateTime<Utc>>,
    pub competition_id: CompetitionId,
    pub home: TeamRef,
    pub away: TeamRef,
}

impl Fixture {
    /// Both team ids, or `None` when either side is unidentified.
    pub fn team_ids(&self) -> Option<(TeamId, TeamId)> {
        Some((self.home.id?, self.away.id?))
    }

    pub fn local_kickoff(&self, tz: &FixedOffset) -> Option<DateTime<FixedOffset>> {
        self.kickoff.map(|k| k.with_timezone(tz))
    }

    pub fn local_date(&self, tz: &FixedOffset) -> Option<NaiveDate> {
        self.local_kickoff(tz).map(|k| k.date_naive())
    }

    pub fn kickoff_label(&self, tz: &FixedOffset) -> String {
        self.local_kickoff(tz)
            .map(|k| k.format("%H:%M").to_string())
            .unwrap_or_else(|| KICKOFF_PLACEHOLDER.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    Primary,
    Fallback,
}

// ── Match history ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchStatus {
    Finished,
    InPlay,
    Scheduled,
    Cancelled,
    Other(String),
}

impl MatchStatus {
    /// Maps an API-Football `fixture.status.short` code.
    pub fn from_short(code: &str) -> Self {
        match code {
            "FT" | "AET" | "PEN" => Self::Finished,
            "1H" | "HT" | "2H" | "ET" | "BT" | "P" | "SUSP" | "INT" | "LIVE" => Self::InPlay,
            "TBD" | "NS" => Self::Scheduled,
            "PST" | "CANC" | "ABD" | "AWD" | "WO" => Self::Cancelled,
            other => Self::Other(other.to_string()),
        }
    }

    /// Only matches that were actually played to the end count towards form.
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Finished)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Home,
    Away,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlayedMatch {
    pub id: MatchId,
    pub kickoff: DateTime<Utc>,
    pub status: MatchStatus,
    pub home: TeamRef,
    pub away: TeamRef,
    pub home_goals: Option<u32>,
    pub away_goals: Option<u32>,
}

impl PlayedMatch {
    /// Which side `team_id` played on. Compared by id only; names are not unique.
    pub fn side_of(&self, team_id: TeamId) -> Option<Side> {
        if self.home.id == Some(team_id) {
            Some(Side::Home)
        } else if self.away.id == Some(team_id) {
            Some(Side::Away)
        } else {
            None
        }
    }

    pub fn involves(&self, team_id: TeamId) -> bool {
        self.side_of(team_id).is_some()
    }
}

/// One team's statistic breakdown for one match.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TeamStatistics {
    pub team_id: TeamId,
    pub values: HashMap<String, f64>,
}

impl TeamStatistics {
    /// Missing statistic types count as zero.
    pub fn value(&self, kind: &str) -> f64 {
        self.values.get(kind).copied().unwrap_or(0.0)
    }
}

// ── Standings ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StandingRow {
    pub team_id: TeamId,
    pub rank: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Standing {
    Rank(u32),
    Unknown,
}

impl Standing {
    pub fn label(&self) -> String {
        match self {
            Self::Rank(rank) => rank.to_string(),
            Self::Unknown => "unknown".to_string(),
        }
    }
}

impl Serialize for Standing {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Rank(rank) => serializer.serialize_u32(*rank),
            Self::Unknown => serializer.serialize_str("unknown"),
        }
    }
}

// ── Form ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormEntry {
    pub match_id: MatchId,
    pub opponent: String,
    pub goals_for: u32,
    pub goals_against: u32,
    pub is_home: bool,
    /// Kick-off date in the reference timezone, already formatted.
    pub date: String,
}

impl FormEntry {
    pub fn result(&self) -> char {
        match self.goals_for.cmp(&self.goals_against) {
            std::cmp::Ordering::Greater => 'W',
            std::cmp::Ordering::Equal => 'D',
            std::cmp::Ordering::Less => 'L',
        }
    }

    /// e.g. `01/06/2024 - 2x1 vs Arsenal`
    pub fn summary(&self) -> String {
        format!(
            "{} - {}x{} vs {}",
            self.date, self.goals_for, self.goals_against, self.opponent
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct FormAverages {
    pub goals_for: f64,
    pub goals_against: f64,
    pub corners: f64,
    pub cards: f64,
    pub shots_total: f64,
    pub shots_on_target: f64,
}

/// Fixed two-decimal renderings of [`FormAverages`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormDisplay {
    pub goals_for: String,
    pub goals_against: String,
    pub corners: String,
    pub cards: String,
    pub shots_total: String,
    pub shots_on_target: String,
}

impl From<&FormAverages> for FormDisplay {
    fn from(avg: &FormAverages) -> Self {
        Self {
            goals_for: format_avg(avg.goals_for),
            goals_against: format_avg(avg.goals_against),
            corners: format_avg(avg.corners),
            cards: format_avg(avg.cards),
            shots_total: format_avg(avg.shots_total),
            shots_on_target: format_avg(avg.shots_on_target),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TeamForm {
    pub team_id: TeamId,
    /// Newest first.
    pub matches: Vec<FormEntry>,
    pub averages: FormAverages,
    pub display: FormDisplay,
    /// Results newest first, e.g. "WWDLW".
    pub form: String,
    pub summaries: Vec<String>,
}

impl TeamForm {
    pub fn new(team_id: TeamId, matches: Vec<FormEntry>, averages: FormAverages) -> Self {
        let form = matches.iter().map(FormEntry::result).collect();
        let summaries = matches.iter().map(FormEntry::summary).collect();
        Self {
            team_id,
            display: FormDisplay::from(&averages),
            averages,
            matches,
            form,
            summaries,
        }
    }

    /// The well-defined record for a team with no usable history.
    pub fn empty(team_id: TeamId) -> Self {
        Self::new(team_id, Vec::new(), FormAverages::default())
    }

    pub fn matches_considered(&self) -> usize {
        self.matches.len()
    }
}

// ── Enrichment output ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrichedFixture {
    pub fixture: Fixture,
    /// Local kick-off "HH:MM", or the placeholder for fallback fixtures.
    pub kickoff_local: String,
    /// `None` when the fixture came without team ids.
    pub home_form: Option<TeamForm>,
    pub away_form: Option<TeamForm>,
    pub home_standing: Standing,
    pub away_standing: Standing,
    pub provenance: Provenance,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "scope", rename_all = "snake_case")]
pub enum BatchFailure {
    Competition {
        competition_id: CompetitionId,
        reason: String,
    },
    Fixture {
        competition_id: CompetitionId,
        fixture_id: Option<MatchId>,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrichmentBatch {
    pub day: NaiveDate,
    pub fixtures: Vec<EnrichedFixture>,
    pub failures: Vec<BatchFailure>,
}

// ── Live telemetry ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LiveMatchSnapshot {
    pub source_text: String,
    #[serde(serialize_with = "serialize_count")]
    pub corners: Option<u32>,
    #[serde(serialize_with = "serialize_count")]
    pub shots: Option<u32>,
    #[serde(serialize_with = "serialize_count")]
    pub cards: Option<u32>,
    #[serde(serialize_with = "serialize_score")]
    pub score: Option<(u32, u32)>,
    #[serde(serialize_with = "serialize_phase")]
    pub phase: Option<String>,
}

impl LiveMatchSnapshot {
    pub fn score_label(&self) -> String {
        match self.score {
            Some((home, away)) => format!("{}x{}", home, away),
            None => NOT_AVAILABLE.to_string(),
        }
    }

    pub fn phase_label(&self) -> &str {
        self.phase.as_deref().unwrap_or(PHASE_IN_PROGRESS)
    }

    pub fn count_label(count: Option<u32>) -> String {
        count.map_or_else(|| NOT_AVAILABLE.to_string(), |c| c.to_string())
    }
}

fn serialize_count<S: Serializer>(count: &Option<u32>, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&LiveMatchSnapshot::count_label(*count))
}

fn serialize_score<S: Serializer>(score: &Option<(u32, u32)>, s: S) -> Result<S::Ok, S::Error> {
    match score {
        Some((home, away)) => s.serialize_str(&format!("{}x{}", home, away)),
        None => s.serialize_str(NOT_AVAILABLE),
    }
}

fn serialize_phase<S: Serializer>(phase: &Option<String>, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(phase.as_deref().unwrap_or(PHASE_IN_PROGRESS))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum LiveStatus {
    /// The panel is up and the match is being played.
    Live { snapshot: LiveMatchSnapshot },
    /// The panel is up but says the match is over or has not started.
    NotLive { snapshot: LiveMatchSnapshot },
    /// No panel found, or the source could not be reached.
    Unknown,
}

// API Response types
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            timestamp: Utc::now(),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
            timestamp: Utc::now(),
        }
    }
}
