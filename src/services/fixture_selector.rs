//! Picks where a competition's fixtures for a day come from.
//!
//! The structured provider is authoritative. The scrape source is consulted
//! only when the provider has nothing for the day, and its fixtures carry
//! team names alone.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{FixedOffset, NaiveDate};
use futures::future::join_all;

use crate::config::EnrichmentConfig;
use crate::error::{EnrichError, ProviderError};
use crate::models::{CompetitionId, Fixture, Provenance, TeamRef};
use crate::services::provider::{FixtureProvider, ScrapeProvider, Upstream};
use crate::utils::{fill_template, utc_dates_for_local_day};

/// A competition's fixtures for one local day.
#[derive(Debug)]
pub struct DayListing {
    pub fixtures: Vec<Fixture>,
    pub provenance: Provenance,
    /// Provider requests that failed while another UTC date answered.
    /// Fixtures from those windows are missing from `fixtures`.
    pub gaps: Vec<String>,
}

impl DayListing {
    fn complete(fixtures: Vec<Fixture>, provenance: Provenance) -> Self {
        Self {
            fixtures,
            provenance,
            gaps: Vec::new(),
        }
    }

    pub fn is_partial(&self) -> bool {
        !self.gaps.is_empty()
    }
}

pub struct FixtureSelector {
    primary: Arc<dyn FixtureProvider>,
    fallback: Arc<dyn ScrapeProvider>,
    upstream: Upstream,
    enrichment: EnrichmentConfig,
    query_template: String,
}

impl FixtureSelector {
    pub fn new(
        primary: Arc<dyn FixtureProvider>,
        fallback: Arc<dyn ScrapeProvider>,
        upstream: Upstream,
        enrichment: EnrichmentConfig,
        query_template: impl Into<String>,
    ) -> Self {
        Self {
            primary,
            fallback,
            upstream,
            enrichment,
            query_template: query_template.into(),
        }
    }

    fn tz(&self) -> &FixedOffset {
        &self.enrichment.reference_offset
    }

    pub async fn fixtures_for_day(
        &self,
        competition_id: CompetitionId,
        day: NaiveDate,
    ) -> Result<DayListing, EnrichError> {
        let primary_error = match self.primary_fixtures(competition_id, day).await {
            Ok((fixtures, gaps)) if !fixtures.is_empty() => {
                tracing::info!(
                    "Competition {}: {} fixtures on {} from primary",
                    competition_id,
                    fixtures.len(),
                    day
                );
                if !gaps.is_empty() {
                    tracing::warn!(
                        "Competition {}: listing for {} is partial, {} provider requests failed",
                        competition_id,
                        day,
                        gaps.len()
                    );
                }
                return Ok(DayListing {
                    fixtures,
                    provenance: Provenance::Primary,
                    gaps,
                });
            }
            Ok(_) => None,
            Err(e) => Some(e),
        };

        match &primary_error {
            Some(e) => tracing::warn!(
                "Competition {}: primary failed ({}), trying fallback",
                competition_id,
                e
            ),
            None => tracing::info!(
                "Competition {}: no primary fixtures on {}, trying fallback",
                competition_id,
                day
            ),
        }

        match self.fallback_fixtures(competition_id, day).await {
            Ok(fixtures) if !fixtures.is_empty() => {
                tracing::info!(
                    "Competition {}: {} fixtures from fallback",
                    competition_id,
                    fixtures.len()
                );
                Ok(DayListing::complete(fixtures, Provenance::Fallback))
            }
            Ok(_) => Ok(DayListing::complete(Vec::new(), Provenance::Primary)),
            Err(fallback_error) => match primary_error {
                Some(primary_error) => Err(EnrichError::CompetitionUnavailable {
                    competition_id,
                    primary: primary_error.to_string(),
                    fallback: fallback_error.to_string(),
                }),
                None => {
                    tracing::warn!(
                        "Competition {}: fallback failed ({}), reporting empty day",
                        competition_id,
                        fallback_error
                    );
                    Ok(DayListing::complete(Vec::new(), Provenance::Primary))
                }
            },
        }
    }

    /// Fixtures whose kick-off falls on `day` in the reference timezone.
    ///
    /// The provider filters by UTC date, so every UTC date overlapping the
    /// local day is requested and the results are filtered locally. A failed
    /// date is only an error when no other date produced fixtures; otherwise
    /// it is returned as a gap next to the fixtures that did arrive.
    async fn primary_fixtures(
        &self,
        competition_id: CompetitionId,
        day: NaiveDate,
    ) -> Result<(Vec<Fixture>, Vec<String>), ProviderError> {
        let requests = utc_dates_for_local_day(day, self.tz()).into_iter().map(|utc_date| async move {
            let result = self
                .upstream
                .call("fixtures", self.primary.list_fixtures(competition_id, utc_date))
                .await;
            (utc_date, result)
        });

        let mut fixtures = Vec::new();
        let mut gaps = Vec::new();
        let mut last_error = None;
        for (utc_date, result) in join_all(requests).await {
            match result {
                Ok(batch) => fixtures.extend(batch),
                Err(e) => {
                    tracing::warn!(
                        "Competition {}: fixtures for UTC date {} failed: {}",
                        competition_id,
                        utc_date,
                        e
                    );
                    gaps.push(format!("fixtures for UTC date {} unavailable: {}", utc_date, e));
                    last_error = Some(e);
                }
            }
        }

        let tz = *self.tz();
        let mut seen = HashSet::new();
        fixtures.retain(|f| f.local_date(&tz) == Some(day));
        fixtures.retain(|f| f.id.map_or(true, |id| seen.insert(id)));
        fixtures.sort_by_key(|f| f.kickoff);

        match last_error {
            Some(e) if fixtures.is_empty() => Err(e),
            _ => Ok((fixtures, gaps)),
        }
    }

    async fn fallback_fixtures(
        &self,
        competition_id: CompetitionId,
        day: NaiveDate,
    ) -> Result<Vec<Fixture>, ProviderError> {
        let name = self.enrichment.competition_name(competition_id);
        let date = day.format("%d/%m/%Y").to_string();
        let query = fill_template(&self.query_template, &[("competition", &name), ("date", &date)]);

        let pairs = self
            .upstream
            .call("fixture search", self.fallback.search_fixtures(&query))
            .await?;

        Ok(pairs
            .into_iter()
            .map(|(home, away)| Fixture {
                id: None,
                kickoff: None,
                competition_id,
                home: TeamRef::named(home),
                away: TeamRef::named(away),
            })
            .collect())
    }
}
