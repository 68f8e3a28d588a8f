use std::env;
use std::str::FromStr;
use std::time::Duration;

use chrono::{FixedOffset, Offset, Utc};

use crate::models::CompetitionId;
use crate::utils::parse_utc_offset;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Competition {
    pub id: CompetitionId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    pub base_url: String,
    pub host_header: String,
    pub api_key: Option<String>,
    /// `None` derives the season from the requested day.
    pub season: Option<u16>,
    pub max_retries: u32,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api-football-v1.p.rapidapi.com/v3".to_string(),
            host_header: "api-football-v1.p.rapidapi.com".to_string(),
            api_key: None,
            season: None,
            max_retries: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrapeConfig {
    pub search_url: String,
    pub user_agent: String,
    pub live_panel_selector: String,
    pub fixture_row_selector: String,
    pub team_name_selector: String,
    pub live_query_suffix: String,
    pub fixtures_query_template: String,
    pub selector_timeout_secs: u64,
    pub poll_interval_ms: u64,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            search_url: "https://www.google.com/search".to_string(),
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36"
                .to_string(),
            live_panel_selector: r#"div[data-attrid="kc:/sports_competition:live_score_card"]"#
                .to_string(),
            fixture_row_selector: "table.imspo_mt__mit tr".to_string(),
            team_name_selector: ".imspo_mt__t-n".to_string(),
            live_query_suffix: "ao vivo".to_string(),
            fixtures_query_template: "{competition} jogos {date}".to_string(),
            selector_timeout_secs: 10,
            poll_interval_ms: 1000,
        }
    }
}

impl ScrapeConfig {
    pub fn selector_timeout(&self) -> Duration {
        Duration::from_secs(self.selector_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrichmentConfig {
    pub competitions: Vec<Competition>,
    pub form_limit: usize,
    pub history_window: u32,
    pub max_in_flight: usize,
    pub call_timeout_secs: u64,
    pub reference_offset: FixedOffset,
    pub display_date_format: String,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            competitions: vec![
                Competition { id: 39, name: "Premier League".to_string() },
                Competition { id: 140, name: "La Liga".to_string() },
                Competition { id: 135, name: "Serie A".to_string() },
            ],
            form_limit: 5,
            history_window: 20,
            max_in_flight: 8,
            call_timeout_secs: 10,
            reference_offset: default_reference_offset(),
            display_date_format: "%d/%m/%Y".to_string(),
        }
    }
}

impl EnrichmentConfig {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }

    pub fn competition_ids(&self) -> Vec<CompetitionId> {
        self.competitions.iter().map(|c| c.id).collect()
    }

    pub fn competition_name(&self, id: CompetitionId) -> String {
        self.competitions
            .iter()
            .find(|c| c.id == id)
            .map(|c| c.name.clone())
            .unwrap_or_else(|| format!("league {}", id))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: 10000 }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    pub provider: ProviderConfig,
    pub scrape: ScrapeConfig,
    pub enrichment: EnrichmentConfig,
    pub server: ServerConfig,
}

impl Config {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(key) = env::var("API_FOOTBALL_KEY") {
            if !key.trim().is_empty() {
                config.provider.api_key = Some(key);
            }
        }
        if let Ok(url) = env::var("API_FOOTBALL_BASE_URL") {
            config.provider.base_url = url.trim_end_matches('/').to_string();
        }
        if let Ok(host) = env::var("API_FOOTBALL_HOST") {
            config.provider.host_header = host;
        }
        if let Some(season) = env_parse("API_FOOTBALL_SEASON") {
            config.provider.season = Some(season);
        }
        if let Some(retries) = env_parse("API_FOOTBALL_MAX_RETRIES") {
            config.provider.max_retries = retries;
        }

        if let Ok(raw) = env::var("COMPETITIONS") {
            match parse_competitions(&raw) {
                Some(list) => config.enrichment.competitions = list,
                None => tracing::warn!("Ignoring malformed COMPETITIONS '{}'", raw),
            }
        }
        if let Some(limit) = env_parse("FORM_LIMIT") {
            config.enrichment.form_limit = limit;
        }
        if let Some(window) = env_parse("HISTORY_WINDOW") {
            config.enrichment.history_window = window;
        }
        if let Some(n) = env_parse::<usize>("MAX_IN_FLIGHT") {
            config.enrichment.max_in_flight = n.max(1);
        }
        if let Some(secs) = env_parse("CALL_TIMEOUT_SECS") {
            config.enrichment.call_timeout_secs = secs;
        }
        if let Ok(raw) = env::var("REFERENCE_UTC_OFFSET") {
            match parse_utc_offset(&raw) {
                Some(offset) => config.enrichment.reference_offset = offset,
                None => tracing::warn!("Ignoring malformed REFERENCE_UTC_OFFSET '{}'", raw),
            }
        }
        if let Ok(format) = env::var("DISPLAY_DATE_FORMAT") {
            config.enrichment.display_date_format = format;
        }

        if let Ok(url) = env::var("SCRAPE_SEARCH_URL") {
            config.scrape.search_url = url;
        }
        if let Ok(user_agent) = env::var("SCRAPE_USER_AGENT") {
            config.scrape.user_agent = user_agent;
        }
        if let Ok(selector) = env::var("SCRAPE_LIVE_SELECTOR") {
            config.scrape.live_panel_selector = selector;
        }
        if let Ok(selector) = env::var("SCRAPE_FIXTURE_ROW_SELECTOR") {
            config.scrape.fixture_row_selector = selector;
        }
        if let Ok(selector) = env::var("SCRAPE_TEAM_NAME_SELECTOR") {
            config.scrape.team_name_selector = selector;
        }
        if let Ok(suffix) = env::var("SCRAPE_LIVE_SUFFIX") {
            config.scrape.live_query_suffix = suffix;
        }
        if let Ok(template) = env::var("SCRAPE_FIXTURES_QUERY") {
            config.scrape.fixtures_query_template = template;
        }
        if let Some(secs) = env_parse("SCRAPE_SELECTOR_TIMEOUT_SECS") {
            config.scrape.selector_timeout_secs = secs;
        }
        if let Some(ms) = env_parse("SCRAPE_POLL_INTERVAL_MS") {
            config.scrape.poll_interval_ms = ms;
        }

        if let Some(port) = env_parse("PORT") {
            config.server.port = port;
        }

        config
    }
}

/// UTC-3, Brasília time.
fn default_reference_offset() -> FixedOffset {
    FixedOffset::west_opt(3 * 3600).unwrap_or_else(|| Utc.fix())
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    let raw = env::var(key).ok()?;
    match raw.trim().parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!("Ignoring malformed {} '{}'", key, raw);
            None
        }
    }
}

/// Parse "39:Premier League,140:La Liga". A bare id gets a generic name.
pub fn parse_competitions(raw: &str) -> Option<Vec<Competition>> {
    let mut list = Vec::new();
    for item in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let (id, name) = match item.split_once(':') {
            Some((id, name)) => (id.trim(), name.trim().to_string()),
            None => (item, format!("league {}", item)),
        };
        list.push(Competition {
            id: id.parse().ok()?,
            name,
        });
    }
    if list.is_empty() {
        None
    } else {
        Some(list)
    }
}
