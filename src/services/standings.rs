use std::sync::Arc;

use crate::models::{CompetitionId, Standing, StandingRow, TeamId};
use crate::services::provider::{FixtureProvider, Upstream};

pub struct StandingLookup {
    provider: Arc<dyn FixtureProvider>,
    upstream: Upstream,
}

impl StandingLookup {
    pub fn new(provider: Arc<dyn FixtureProvider>, upstream: Upstream) -> Self {
        Self { provider, upstream }
    }

    /// Current rank of `team_id` in the competition table. Never fails.
    pub async fn lookup_rank(&self, competition_id: CompetitionId, team_id: TeamId) -> Standing {
        match self
            .upstream
            .call("standings", self.provider.standings(competition_id))
            .await
        {
            Ok(table) => {
                let standing = rank_in(&table, team_id);
                if standing == Standing::Unknown {
                    tracing::debug!(
                        "Team {} not found in {} standings ({} rows)",
                        team_id,
                        competition_id,
                        table.len()
                    );
                }
                standing
            }
            Err(e) => {
                tracing::warn!("Standings for competition {} unavailable: {}", competition_id, e);
                Standing::Unknown
            }
        }
    }
}

pub fn rank_in(table: &[StandingRow], team_id: TeamId) -> Standing {
    table
        .iter()
        .find(|row| row.team_id == team_id)
        .map_or(Standing::Unknown, |row| Standing::Rank(row.rank))
}
