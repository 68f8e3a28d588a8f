use std::sync::Arc;

use chrono::{FixedOffset, NaiveDate};
use futures::future::join_all;
use futures::stream::{self, StreamExt};

use crate::config::Config;
use crate::models::{
    BatchFailure, CompetitionId, EnrichedFixture, EnrichmentBatch, Fixture, Provenance, Standing,
};
use crate::services::data_fetcher::ApiFootballClient;
use crate::services::fixture_selector::FixtureSelector;
use crate::services::form_aggregator::FormAggregator;
use crate::services::provider::{FixtureProvider, ScrapeProvider, Upstream};
use crate::services::standings::StandingLookup;
use crate::services::web_scraper::WebScraper;
use crate::utils::today_in;

/// Builds the day's enriched fixture list across competitions.
pub struct Enricher {
    selector: FixtureSelector,
    forms: FormAggregator,
    standings: StandingLookup,
    tz: FixedOffset,
    form_limit: usize,
    max_in_flight: usize,
}

impl Enricher {
    pub fn new(
        primary: Arc<dyn FixtureProvider>,
        fallback: Arc<dyn ScrapeProvider>,
        config: &Config,
    ) -> Self {
        let enrichment = &config.enrichment;
        let upstream = Upstream::new(enrichment.max_in_flight, enrichment.call_timeout());

        Self {
            selector: FixtureSelector::new(
                primary.clone(),
                fallback,
                upstream.clone(),
                enrichment.clone(),
                config.scrape.fixtures_query_template.clone(),
            ),
            forms: FormAggregator::new(
                primary.clone(),
                upstream.clone(),
                enrichment.history_window,
                enrichment.reference_offset,
                enrichment.display_date_format.clone(),
            ),
            standings: StandingLookup::new(primary, upstream),
            tz: enrichment.reference_offset,
            form_limit: enrichment.form_limit,
            max_in_flight: enrichment.max_in_flight.max(1),
        }
    }

    /// Wire up the API-Football client and the web scraper from `config`.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let scraper = WebScraper::new(config.scrape.clone(), config.enrichment.call_timeout())?;
        Self::with_scraper(config, Arc::new(scraper))
    }

    /// Like [`Enricher::from_config`], reusing a scraper the caller also
    /// hands to other services.
    pub fn with_scraper(config: &Config, scraper: Arc<WebScraper>) -> anyhow::Result<Self> {
        let primary = ApiFootballClient::new(config.provider.clone(), config.enrichment.call_timeout())?;
        if !primary.has_key() {
            tracing::warn!("API_FOOTBALL_KEY not set, every competition will use the fallback");
        }
        Ok(Self::new(Arc::new(primary), scraper, config))
    }

    pub fn forms(&self) -> &FormAggregator {
        &self.forms
    }

    pub fn standings(&self) -> &StandingLookup {
        &self.standings
    }

    pub fn form_limit(&self) -> usize {
        self.form_limit
    }

    /// Enrich today's fixtures. "Today" is resolved once, up front.
    pub async fn enrich_today(&self, competitions: &[CompetitionId]) -> EnrichmentBatch {
        let day = today_in(&self.tz);
        self.enrich_day(competitions, day).await
    }

    pub async fn enrich_day(&self, competitions: &[CompetitionId], day: NaiveDate) -> EnrichmentBatch {
        tracing::info!("Enriching {} competitions for {}", competitions.len(), day);

        let listings = join_all(competitions.iter().map(|&competition_id| async move {
            (
                competition_id,
                self.selector.fixtures_for_day(competition_id, day).await,
            )
        }))
        .await;

        let mut failures = Vec::new();
        let mut work = Vec::new();
        for (competition_id, listing) in listings {
            match listing {
                Ok(listing) => {
                    if listing.is_partial() {
                        failures.push(BatchFailure::Competition {
                            competition_id,
                            reason: format!("partial listing: {}", listing.gaps.join("; ")),
                        });
                    }
                    let provenance = listing.provenance;
                    work.extend(listing.fixtures.into_iter().map(|f| (f, provenance)));
                }
                Err(e) => {
                    tracing::error!("{}", e);
                    failures.push(BatchFailure::Competition {
                        competition_id,
                        reason: e.to_string(),
                    });
                }
            }
        }

        let results: Vec<Result<EnrichedFixture, BatchFailure>> = stream::iter(work)
            .map(|(fixture, provenance)| self.enrich_fixture(fixture, provenance))
            .buffer_unordered(self.max_in_flight)
            .collect()
            .await;

        let mut fixtures = Vec::with_capacity(results.len());
        for result in results {
            match result {
                Ok(enriched) => fixtures.push(enriched),
                Err(failure) => failures.push(failure),
            }
        }
        fixtures.sort_by(|a, b| {
            a.fixture
                .kickoff
                .cmp(&b.fixture.kickoff)
                .then(a.fixture.competition_id.cmp(&b.fixture.competition_id))
        });

        tracing::info!(
            "Enriched {} fixtures for {} ({} failures)",
            fixtures.len(),
            day,
            failures.len()
        );

        EnrichmentBatch {
            day,
            fixtures,
            failures,
        }
    }

    async fn enrich_fixture(
        &self,
        fixture: Fixture,
        provenance: Provenance,
    ) -> Result<EnrichedFixture, BatchFailure> {
        let kickoff_local = fixture.kickoff_label(&self.tz);

        let ids = match (provenance, fixture.team_ids()) {
            (Provenance::Primary, Some(ids)) => ids,
            _ => {
                return Ok(EnrichedFixture {
                    fixture,
                    kickoff_local,
                    home_form: None,
                    away_form: None,
                    home_standing: Standing::Unknown,
                    away_standing: Standing::Unknown,
                    provenance,
                });
            }
        };
        let (home_id, away_id) = ids;
        let competition_id = fixture.competition_id;

        let (home_form, away_form, home_standing, away_standing) = tokio::join!(
            self.forms.compute_form(home_id, self.form_limit),
            self.forms.compute_form(away_id, self.form_limit),
            self.standings.lookup_rank(competition_id, home_id),
            self.standings.lookup_rank(competition_id, away_id),
        );

        let failure = |e: crate::error::EnrichError| {
            tracing::error!("Fixture {:?} dropped: {}", fixture.id, e);
            BatchFailure::Fixture {
                competition_id,
                fixture_id: fixture.id,
                reason: e.to_string(),
            }
        };
        let home_form = home_form.map_err(failure)?;
        let away_form = away_form.map_err(failure)?;

        Ok(EnrichedFixture {
            fixture,
            kickoff_local,
            home_form: Some(home_form),
            away_form: Some(away_form),
            home_standing,
            away_standing,
            provenance,
        })
    }
}
