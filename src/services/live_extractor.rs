//! Pulls a live match snapshot out of free text.
//!
//! Each field has its own rule; a rule that does not match leaves its field
//! at the default and never stops the others from running.

use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::{LiveMatchSnapshot, LiveStatus};
use crate::services::provider::ScrapeProvider;

static CORNERS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:escanteios|corner\s+kicks|corners)[\s:]+(\d+)").unwrap()
});

static SHOTS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:chutes|total\s+shots|shots)[\s:]+(\d+)").unwrap()
});

static CARDS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:cart(?:õ|o)es\s+amarelos|yellow\s+cards)[\s:]+(\d+)").unwrap()
});

static SCORE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(\d{1,3})\s+x\s+(\d{1,3})\b").unwrap());

static CLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b\d+º\s+tempo\s+-\s+\d+\s+min|\b(?:1st|2nd)\s+half\s+-\s+\d+\s+min").unwrap()
});

static HALF_TIME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:intervalo|half[\s-]time)\b").unwrap());

static FINISHED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:encerrado|fim\s+de\s+jogo|full[\s-]time)\b").unwrap()
});

static NOT_STARTED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:n(?:ã|a)o\s+iniciado|not\s+started|starts\s+at|come(?:ç|c)a\s+(?:às|as))\b")
        .unwrap()
});

fn count(rule: &Regex, text: &str) -> Option<u32> {
    rule.captures(text)?.get(1)?.as_str().parse().ok()
}

fn score(text: &str) -> Option<(u32, u32)> {
    let caps = SCORE.captures(text)?;
    Some((caps.get(1)?.as_str().parse().ok()?, caps.get(2)?.as_str().parse().ok()?))
}

fn phase(text: &str) -> Option<String> {
    [&*CLOCK, &*HALF_TIME, &*FINISHED, &*NOT_STARTED]
        .iter()
        .find_map(|rule| rule.find(text))
        .map(|m| m.as_str().to_string())
}

/// Best-effort snapshot. Never fails; unmatched fields stay at their defaults.
pub fn extract(raw: &str) -> LiveMatchSnapshot {
    LiveMatchSnapshot {
        source_text: raw.to_string(),
        corners: count(&CORNERS, raw),
        shots: count(&SHOTS, raw),
        cards: count(&CARDS, raw),
        score: score(raw),
        phase: phase(raw),
    }
}

/// A panel is live unless it carries a finished or not-started marker and
/// no running clock.
pub fn classify(raw: &str) -> LiveStatus {
    let snapshot = extract(raw);
    let running = CLOCK.is_match(raw) || HALF_TIME.is_match(raw);
    if !running && (FINISHED.is_match(raw) || NOT_STARTED.is_match(raw)) {
        LiveStatus::NotLive { snapshot }
    } else {
        LiveStatus::Live { snapshot }
    }
}

pub struct LiveService {
    scraper: Arc<dyn ScrapeProvider>,
    query_suffix: String,
    deadline: Duration,
}

impl LiveService {
    pub fn new(scraper: Arc<dyn ScrapeProvider>, query_suffix: impl Into<String>, deadline: Duration) -> Self {
        Self {
            scraper,
            query_suffix: query_suffix.into(),
            deadline,
        }
    }

    /// Live status for a free-text match query such as "Arsenal x Chelsea".
    pub async fn live_status(&self, query: &str) -> LiveStatus {
        let query = format!("{} {}", query.trim(), self.query_suffix).trim().to_string();
        tracing::info!("Looking up live panel for '{}'", query);

        match tokio::time::timeout(self.deadline, self.scraper.live_text(&query)).await {
            Ok(Ok(Some(text))) => classify(&text),
            Ok(Ok(None)) => {
                tracing::info!("No live panel found for '{}'", query);
                LiveStatus::Unknown
            }
            Ok(Err(e)) => {
                tracing::warn!("Live lookup for '{}' failed: {}", query, e);
                LiveStatus::Unknown
            }
            Err(_) => {
                tracing::warn!("Live lookup for '{}' exceeded {:?}", query, self.deadline);
                LiveStatus::Unknown
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NOT_AVAILABLE, PHASE_IN_PROGRESS};
    use crate::services::testing::MockScrapeProvider;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_extract_empty_text_defaults() {
        let snapshot = extract("");
        assert_eq!(snapshot.corners, None);
        assert_eq!(snapshot.shots, None);
        assert_eq!(snapshot.cards, None);
        assert_eq!(snapshot.score_label(), NOT_AVAILABLE);
        assert_eq!(snapshot.phase_label(), PHASE_IN_PROGRESS);
    }

    #[test]
    fn test_extract_portuguese_panel() {
        let text = "Flamengo 2 x 1 Palmeiras\n2º tempo - 67 min\nEscanteios 5\nChutes 12\nCartões amarelos 3";
        let snapshot = extract(text);

        assert_eq!(snapshot.score, Some((2, 1)));
        assert_eq!(snapshot.score_label(), "2x1");
        assert_eq!(snapshot.corners, Some(5));
        assert_eq!(snapshot.shots, Some(12));
        assert_eq!(snapshot.cards, Some(3));
        assert_eq!(snapshot.phase_label(), "2º tempo - 67 min");
    }

    #[test]
    fn test_missing_field_does_not_block_others() {
        let snapshot = extract("Chutes 9\nsem placar");
        assert_eq!(snapshot.shots, Some(9));
        assert_eq!(snapshot.corners, None);
        assert_eq!(snapshot.score, None);
        assert_eq!(snapshot.phase, None);
    }

    #[test]
    fn test_extract_english_labels() {
        let snapshot = extract("Arsenal 0 x 0 Chelsea\n1st half - 23 min\nCorners: 4\nShots 6\nYellow cards 1");
        assert_eq!(snapshot.corners, Some(4));
        assert_eq!(snapshot.shots, Some(6));
        assert_eq!(snapshot.cards, Some(1));
        assert_eq!(snapshot.score, Some((0, 0)));
        assert_eq!(snapshot.phase.as_deref(), Some("1st half - 23 min"));
    }

    #[test]
    fn test_classify() {
        assert!(matches!(classify("2 x 1\n2º tempo - 80 min"), LiveStatus::Live { .. }));
        assert!(matches!(classify("1 x 1\nIntervalo"), LiveStatus::Live { .. }));
        assert!(matches!(classify("3 x 0\nEncerrado"), LiveStatus::NotLive { .. }));
        assert!(matches!(classify("Não iniciado"), LiveStatus::NotLive { .. }));
        assert!(matches!(classify("Escanteios 2"), LiveStatus::Live { .. }));
    }

    #[tokio::test]
    async fn test_live_status_without_panel_is_unknown() {
        let service = LiveService::new(
            Arc::new(MockScrapeProvider::default()),
            "ao vivo",
            Duration::from_secs(1),
        );
        assert_eq!(service.live_status("Arsenal x Chelsea").await, LiveStatus::Unknown);
    }

    #[tokio::test]
    async fn test_live_status_failure_is_unknown() {
        let scraper = Arc::new(MockScrapeProvider {
            fail: true,
            ..MockScrapeProvider::default()
        });
        let service = LiveService::new(scraper, "ao vivo", Duration::from_secs(1));
        assert_eq!(service.live_status("Arsenal x Chelsea").await, LiveStatus::Unknown);
    }

    #[tokio::test]
    async fn test_live_status_appends_suffix() {
        let scraper = Arc::new(MockScrapeProvider {
            live: Some("Arsenal 1 x 0 Chelsea\n2nd half - 70 min\nCorners 3".to_string()),
            ..MockScrapeProvider::default()
        });
        let service = LiveService::new(scraper.clone(), "ao vivo", Duration::from_secs(1));

        match service.live_status("Arsenal x Chelsea").await {
            LiveStatus::Live { snapshot } => {
                assert_eq!(snapshot.score, Some((1, 0)));
                assert_eq!(snapshot.corners, Some(3));
            }
            other => panic!("expected live, got {:?}", other),
        }
        assert_eq!(
            *scraper.queries.lock().unwrap(),
            vec!["Arsenal x Chelsea ao vivo".to_string()]
        );
    }
}
