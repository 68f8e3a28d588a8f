pub mod data_fetcher;
pub mod enricher;
pub mod fixture_selector;
pub mod form_aggregator;
pub mod live_extractor;
pub mod provider;
pub mod standings;
pub mod web_scraper;

#[cfg(test)]
pub mod testing;

pub use enricher::Enricher;
pub use live_extractor::LiveService;
pub use web_scraper::WebScraper;
