use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::get,
    Router,
};
use serde::Deserialize;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::Config;
use crate::models::{
    ApiResponse, CompetitionId, EnrichmentBatch, LiveStatus, Standing, TeamForm, TeamId,
};
use crate::services::{Enricher, LiveService, WebScraper};

pub struct AppState {
    pub enricher: Enricher,
    pub live: LiveService,
    pub competitions: Vec<CompetitionId>,
}

impl AppState {
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let scraper = WebScraper::new(config.scrape.clone(), config.enrichment.call_timeout())?;
        Self::with_scraper(config, Arc::new(scraper))
    }

    /// The fixture fallback and the live lookups share one scraper, and so
    /// one HTTP connection pool.
    pub fn with_scraper(config: &Config, scraper: Arc<WebScraper>) -> anyhow::Result<Self> {
        Ok(Self {
            enricher: Enricher::with_scraper(config, scraper.clone())?,
            live: LiveService::new(
                scraper,
                config.scrape.live_query_suffix.clone(),
                config.scrape.selector_timeout() + config.enrichment.call_timeout(),
            ),
            competitions: config.enrichment.competition_ids(),
        })
    }
}

pub async fn serve(config: &Config, port: u16) -> anyhow::Result<()> {
    let state = Arc::new(AppState::from_config(config)?);
    let app = create_router().with_state(state);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;
    tracing::info!("Fixture enrichment API listening on port {}", port);

    axum::serve(listener, app).await?;
    Ok(())
}

fn create_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(health_check))
        .route("/fixtures/today", get(today_handler))
        .route("/teams/{team_id}/form", get(team_form_handler))
        .route(
            "/competitions/{competition_id}/teams/{team_id}/rank",
            get(team_rank_handler),
        )
        .route("/live", get(live_handler))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
}

async fn health_check() -> Json<ApiResponse<&'static str>> {
    Json(ApiResponse::success("Fixture enrichment API is running"))
}

/// Parse "39,140" into competition ids.
pub fn parse_competition_ids(raw: &str) -> Option<Vec<CompetitionId>> {
    let ids = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse().ok())
        .collect::<Option<Vec<CompetitionId>>>()?;
    if ids.is_empty() {
        None
    } else {
        Some(ids)
    }
}

// GET /fixtures/today?competitions=39,140
#[derive(Deserialize)]
struct TodayQuery {
    competitions: Option<String>,
}

type Rejection<T> = (StatusCode, Json<ApiResponse<T>>);

fn bad_request<T>(message: &str) -> Rejection<T> {
    (StatusCode::BAD_REQUEST, Json(ApiResponse::error(message.to_string())))
}

async fn today_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<TodayQuery>,
) -> Result<Json<ApiResponse<EnrichmentBatch>>, Rejection<EnrichmentBatch>> {
    let competitions = match params.competitions.as_deref() {
        Some(raw) => parse_competition_ids(raw)
            .ok_or_else(|| bad_request("competitions must be comma-separated ids"))?,
        None => state.competitions.clone(),
    };

    let batch = state.enricher.enrich_today(&competitions).await;
    Ok(Json(ApiResponse::success(batch)))
}

// GET /teams/{team_id}/form?limit=5
#[derive(Deserialize)]
struct FormQuery {
    limit: Option<usize>,
}

async fn team_form_handler(
    State(state): State<Arc<AppState>>,
    Path(team_id): Path<TeamId>,
    Query(params): Query<FormQuery>,
) -> Result<Json<ApiResponse<TeamForm>>, StatusCode> {
    let limit = params
        .limit
        .unwrap_or_else(|| state.enricher.form_limit())
        .clamp(1, 20);

    match state.enricher.forms().compute_form(team_id, limit).await {
        Ok(form) => Ok(Json(ApiResponse::success(form))),
        Err(e) => {
            tracing::error!("Failed to compute form for team {}: {}", team_id, e);
            Err(StatusCode::BAD_GATEWAY)
        }
    }
}

// GET /competitions/{competition_id}/teams/{team_id}/rank
async fn team_rank_handler(
    State(state): State<Arc<AppState>>,
    Path((competition_id, team_id)): Path<(CompetitionId, TeamId)>,
) -> Json<ApiResponse<Standing>> {
    let standing = state
        .enricher
        .standings()
        .lookup_rank(competition_id, team_id)
        .await;
    Json(ApiResponse::success(standing))
}

// GET /live?q=Arsenal x Chelsea
#[derive(Deserialize)]
struct LiveQuery {
    q: Option<String>,
}

async fn live_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<LiveQuery>,
) -> Result<Json<ApiResponse<LiveStatus>>, Rejection<LiveStatus>> {
    let query = params
        .q
        .filter(|q| !q.trim().is_empty())
        .ok_or_else(|| bad_request("missing query parameter 'q'"))?;

    Ok(Json(ApiResponse::success(state.live.live_status(&query).await)))
}
