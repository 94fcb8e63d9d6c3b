//! Data sources for the pipeline's data stage.
//!
//! A [`DataSource`] produces records without calling the text-generation
//! service. Two adapters ship with sitesmith:
//! - [`ArxivSource`]: structured-API client, one partition per category
//! - [`GithubTrendingSource`]: markup scrape of a trending listing
//!
//! Neither adapter fails at the call site: when nothing could be fetched it
//! returns a single placeholder record and marks the outcome synthetic.

mod arxiv;
mod github;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use sitesmith_shared::{DataConfig, DataSourceKind, Record, Result, SitesmithError};

pub use arxiv::{ArxivSource, parse_feed};
pub use github::{GithubTrendingSource, parse_trending};

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Records fetched by a source, plus how they were obtained.
#[derive(Debug, Clone, Default)]
pub struct FetchOutcome {
    /// Records in source order.
    pub records: Vec<Record>,
    /// `records` is a stand-in because nothing real was fetched.
    pub synthetic: bool,
    /// Failed partitions or requests (target, error message).
    pub failures: Vec<(String, String)>,
}

impl FetchOutcome {
    /// Replace an empty record list with `placeholder` and mark it synthetic.
    fn or_placeholder(mut self, placeholder: impl FnOnce() -> Record) -> Self {
        if self.records.is_empty() {
            tracing::warn!(
                failures = self.failures.len(),
                "no records fetched, substituting placeholder record"
            );
            self.records = vec![placeholder()];
            self.synthetic = true;
        }
        self
    }
}

/// Produces structured records for the data artifact.
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Fetch records. Never empty; see [`FetchOutcome::synthetic`].
    async fn fetch(&self) -> FetchOutcome;

    /// Human-readable source name for tracing.
    fn name(&self) -> &str;
}

/// Build the fetch-based source for `kind`, or `None` for the LLM variant.
pub fn build_source(kind: DataSourceKind, config: &DataConfig) -> Result<Option<Box<dyn DataSource>>> {
    Ok(match kind {
        DataSourceKind::Llm => None,
        DataSourceKind::Arxiv => Some(Box::new(ArxivSource::new(
            config.arxiv.clone(),
            config.fetch_timeout_secs,
        )?)),
        DataSourceKind::GithubTrending => Some(Box::new(GithubTrendingSource::new(
            config.github.clone(),
            config.fetch_timeout_secs,
        )?)),
    })
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Build a reqwest client with the source's identity and timeout.
fn build_client(user_agent: &str, timeout_secs: u64) -> Result<Client> {
    Client::builder()
        .user_agent(user_agent)
        .redirect(reqwest::redirect::Policy::limited(5))
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| SitesmithError::Network(format!("failed to build HTTP client: {e}")))
}

/// Today's date (UTC) as `YYYY-MM-DD`.
fn today() -> String {
    chrono::Utc::now().format("%Y-%m-%d").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn llm_kind_has_no_fetch_source() {
        let source = build_source(DataSourceKind::Llm, &DataConfig::default()).unwrap();
        assert!(source.is_none());
    }

    #[test]
    fn fetch_kinds_build_named_sources() {
        let config = DataConfig::default();
        let arxiv = build_source(DataSourceKind::Arxiv, &config).unwrap().unwrap();
        assert_eq!(arxiv.name(), "arxiv");

        let github = build_source(DataSourceKind::GithubTrending, &config)
            .unwrap()
            .unwrap();
        assert_eq!(github.name(), "github_trending");
    }

    #[test]
    fn today_is_iso_date() {
        let date = today();
        assert_eq!(date.len(), 10);
        assert_eq!(&date[4..5], "-");
    }
}
