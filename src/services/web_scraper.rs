//! Search-result scraping: the degraded fixture source and the live panel.
//!
//! Pages are fetched with reqwest and queried with CSS selectors. Parsed
//! documents never live across an await point; a [`ScrapeSession`] keeps
//! only the raw HTML between polls.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use scraper::{Html, Selector};

use crate::config::ScrapeConfig;
use crate::error::ProviderError;
use crate::services::provider::ScrapeProvider;
use crate::utils::names_match;

static PAIR_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*([^\d\n]{2,}?)\s+(?:x|vs\.?|v)\s+([^\d\n]{2,}?)\s*$").unwrap()
});

/// One query's page state. Dropping it releases everything tied to the query.
pub struct ScrapeSession {
    client: Client,
    search_url: String,
    query: String,
    html: String,
    loads: u32,
    opened: Instant,
}

impl ScrapeSession {
    pub async fn open(client: Client, search_url: &str, query: &str) -> Result<Self, ProviderError> {
        let mut session = Self {
            client,
            search_url: search_url.to_string(),
            query: query.to_string(),
            html: String::new(),
            loads: 0,
            opened: Instant::now(),
        };
        session.reload().await?;
        Ok(session)
    }

    pub fn html(&self) -> &str {
        &self.html
    }

    pub async fn reload(&mut self) -> Result<(), ProviderError> {
        let response = self
            .client
            .get(&self.search_url)
            .query(&[("q", self.query.as_str()), ("hl", "pt-BR")])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Status {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        self.html = response.text().await?;
        self.loads += 1;
        Ok(())
    }

    /// Re-poll the page until `selector` shows up with text or `deadline`
    /// elapses. `Ok(None)` means the element never appeared.
    pub async fn wait_for_selector(
        &mut self,
        selector: &str,
        deadline: Duration,
        poll: Duration,
    ) -> Result<Option<String>, ProviderError> {
        let started = Instant::now();
        loop {
            if let Some(text) = first_text(&self.html, selector)? {
                return Ok(Some(text));
            }
            if started.elapsed() + poll > deadline {
                return Ok(None);
            }
            tokio::time::sleep(poll).await;
            self.reload().await?;
        }
    }
}

impl Drop for ScrapeSession {
    fn drop(&mut self) {
        tracing::debug!(
            "Closing scrape session for '{}' after {} loads in {:?}",
            self.query,
            self.loads,
            self.opened.elapsed()
        );
    }
}

fn parse_selector(selector: &str) -> Result<Selector, ProviderError> {
    Selector::parse(selector)
        .map_err(|e| ProviderError::malformed(format!("selector '{}': {}", selector, e)))
}

fn element_text(element: scraper::ElementRef<'_>) -> String {
    element
        .text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Text of the first element matching `selector`, one text node per line.
pub fn first_text(html: &str, selector: &str) -> Result<Option<String>, ProviderError> {
    let selector = parse_selector(selector)?;
    let document = Html::parse_document(html);
    Ok(document
        .select(&selector)
        .next()
        .map(element_text)
        .filter(|text| !text.is_empty()))
}

/// (home, away) pairs from a fixtures card. Falls back to "Home x Away"
/// lines in the page text when no row matches the selectors.
pub fn parse_fixture_pairs(
    html: &str,
    row_selector: &str,
    team_selector: &str,
) -> Result<Vec<(String, String)>, ProviderError> {
    let rows = parse_selector(row_selector)?;
    let teams = parse_selector(team_selector)?;
    let document = Html::parse_document(html);

    let mut candidates: Vec<(String, String)> = document
        .select(&rows)
        .filter_map(|row| {
            let mut names = row.select(&teams).map(element_text).filter(|n| !n.is_empty());
            Some((names.next()?, names.next()?))
        })
        .collect();

    if candidates.is_empty() {
        candidates = document
            .root_element()
            .text()
            .flat_map(str::lines)
            .filter_map(|line| {
                let caps = PAIR_LINE.captures(line)?;
                Some((caps[1].trim().to_string(), caps[2].trim().to_string()))
            })
            .collect();
    }

    let mut pairs: Vec<(String, String)> = Vec::new();
    for (home, away) in candidates {
        let duplicate = pairs
            .iter()
            .any(|(h, a)| names_match(h, &home) && names_match(a, &away));
        if !duplicate {
            pairs.push((home, away));
        }
    }
    Ok(pairs)
}

pub struct WebScraper {
    client: Client,
    config: ScrapeConfig,
}

impl WebScraper {
    pub fn new(config: ScrapeConfig, timeout: Duration) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(timeout)
            .build()?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl ScrapeProvider for WebScraper {
    async fn search_fixtures(&self, query: &str) -> Result<Vec<(String, String)>, ProviderError> {
        let session = ScrapeSession::open(self.client.clone(), &self.config.search_url, query).await?;
        let pairs = parse_fixture_pairs(
            session.html(),
            &self.config.fixture_row_selector,
            &self.config.team_name_selector,
        )?;
        tracing::info!("Scraped {} fixture pairs for '{}'", pairs.len(), query);
        Ok(pairs)
    }

    async fn live_text(&self, query: &str) -> Result<Option<String>, ProviderError> {
        let mut session =
            ScrapeSession::open(self.client.clone(), &self.config.search_url, query).await?;
        let deadline = self.config.selector_timeout();

        let waited = tokio::time::timeout(
            deadline,
            session.wait_for_selector(
                &self.config.live_panel_selector,
                deadline,
                self.config.poll_interval(),
            ),
        )
        .await;

        match waited {
            Ok(result) => result,
            Err(_) => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use pretty_assertions::assert_eq;

    const FIXTURES_CARD: &str = r#"
        <html><body>
          <table class="imspo_mt__mit">
            <tr><td><span class="imspo_mt__t-n">Arsenal</span></td><td><span class="imspo_mt__t-n">Chelsea</span></td></tr>
            <tr><td><span class="imspo_mt__t-n">Arsenal FC</span></td><td><span class="imspo_mt__t-n">Chelsea</span></td></tr>
            <tr><td><span class="imspo_mt__t-n">Liverpool</span></td><td><span class="imspo_mt__t-n">Everton</span></td></tr>
            <tr><td>Header only</td></tr>
          </table>
        </body></html>"#;

    fn config(server: &mockito::ServerGuard) -> ScrapeConfig {
        ScrapeConfig {
            search_url: format!("{}/search", server.url()),
            selector_timeout_secs: 1,
            poll_interval_ms: 50,
            ..ScrapeConfig::default()
        }
    }

    #[test]
    fn test_parse_fixture_pairs_from_rows() {
        let defaults = ScrapeConfig::default();
        let pairs = parse_fixture_pairs(
            FIXTURES_CARD,
            &defaults.fixture_row_selector,
            &defaults.team_name_selector,
        )
        .unwrap();

        assert_eq!(
            pairs,
            vec![
                ("Arsenal".to_string(), "Chelsea".to_string()),
                ("Liverpool".to_string(), "Everton".to_string()),
            ]
        );
    }

    #[test]
    fn test_parse_fixture_pairs_text_fallback() {
        let html = "<html><body><p>Jogos de hoje</p><div>Real Madrid x Barcelona</div>\
                    <div>Sevilla vs Betis</div><div>Getafe 2 x 1 Elche</div></body></html>";
        let pairs = parse_fixture_pairs(html, "table.none tr", ".none").unwrap();

        assert_eq!(
            pairs,
            vec![
                ("Real Madrid".to_string(), "Barcelona".to_string()),
                ("Sevilla".to_string(), "Betis".to_string()),
            ]
        );
    }

    #[test]
    fn test_invalid_selector_is_malformed() {
        assert!(matches!(
            first_text("<p>hi</p>", "[[["),
            Err(ProviderError::Malformed(_))
        ));
    }

    #[test]
    fn test_first_text_joins_text_nodes() {
        let html = r#"<div class="panel"><span>2 x 1</span><span> Escanteios 5 </span></div>"#;
        assert_eq!(
            first_text(html, "div.panel").unwrap(),
            Some("2 x 1\nEscanteios 5".to_string())
        );
        assert_eq!(first_text(html, "div.missing").unwrap(), None);
    }

    #[tokio::test]
    async fn test_live_text_finds_panel() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/search")
            .match_query(Matcher::UrlEncoded("q".into(), "Arsenal x Chelsea ao vivo".into()))
            .with_status(200)
            .with_body(
                r#"<div data-attrid="kc:/sports_competition:live_score_card">
                     <span>Arsenal 1 x 0 Chelsea</span><span>2º tempo - 60 min</span>
                   </div>"#,
            )
            .create_async()
            .await;

        let scraper = WebScraper::new(config(&server), Duration::from_secs(2)).unwrap();
        let text = scraper.live_text("Arsenal x Chelsea ao vivo").await.unwrap();

        assert_eq!(text, Some("Arsenal 1 x 0 Chelsea\n2º tempo - 60 min".to_string()));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_live_text_gives_up_after_deadline() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/search")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body("<html><body>Nada por aqui</body></html>")
            .expect_at_least(2)
            .create_async()
            .await;

        let scraper = WebScraper::new(config(&server), Duration::from_secs(2)).unwrap();
        let started = Instant::now();
        let text = scraper.live_text("Arsenal x Chelsea ao vivo").await.unwrap();

        assert_eq!(text, None);
        assert!(started.elapsed() < Duration::from_secs(3));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_search_fixtures_status_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/search")
            .match_query(Matcher::Any)
            .with_status(429)
            .with_body("slow down")
            .create_async()
            .await;

        let scraper = WebScraper::new(config(&server), Duration::from_secs(2)).unwrap();
        let err = scraper.search_fixtures("La Liga jogos 01/06/2024").await.unwrap_err();
        assert!(matches!(err, ProviderError::Status { status: 429, .. }));
    }
}
