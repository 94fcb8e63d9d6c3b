//! Markup-scrape source for the GitHub trending listing.

use async_trait::async_trait;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info, instrument, warn};

use sitesmith_shared::{GithubConfig, Record, RepoRecord, Result, SitesmithError};

use crate::{DataSource, FetchOutcome, build_client, today};

/// Scrapes one trending page per run.
pub struct GithubTrendingSource {
    config: GithubConfig,
    client: Client,
}

impl GithubTrendingSource {
    pub fn new(config: GithubConfig, timeout_secs: u64) -> Result<Self> {
        Ok(Self {
            client: build_client(&config.user_agent, timeout_secs)?,
            config,
        })
    }

    /// Listing URL, narrowed to the configured language when set.
    fn listing_url(&self) -> String {
        let base = self.config.base_url.trim_end_matches('/');
        match self.config.language.as_deref().map(str::trim) {
            Some(lang) if !lang.is_empty() => format!("{base}/{lang}"),
            _ => base.to_string(),
        }
    }

    #[instrument(skip(self), fields(url = %self.listing_url()))]
    async fn fetch_listing(&self) -> Result<String> {
        let response = self
            .client
            .get(self.listing_url())
            .query(&[("since", self.config.since.as_str())])
            .send()
            .await
            .map_err(|e| SitesmithError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SitesmithError::Network(format!("HTTP {status}")));
        }

        response
            .text()
            .await
            .map_err(|e| SitesmithError::Network(format!("body read failed: {e}")))
    }

    fn placeholder(&self) -> Record {
        Record::Repo(RepoRecord {
            id: "example/hello-world".into(),
            owner: "example".into(),
            repo: "hello-world".into(),
            description: "A sample project for testing".into(),
            language: "Python".into(),
            stars_today: "123".into(),
            forks: "45".into(),
            url: "https://github.com/example/hello-world".into(),
            fetch_date: today(),
        })
    }
}

#[async_trait]
impl DataSource for GithubTrendingSource {
    async fn fetch(&self) -> FetchOutcome {
        let mut outcome = FetchOutcome::default();

        match self.fetch_listing().await {
            Ok(html) => {
                let mut repos =
                    parse_trending(&html, self.config.language.as_deref(), &today());
                repos.truncate(self.config.max_results);
                info!(count = repos.len(), "trending repositories scraped");
                outcome.records = repos.into_iter().map(Record::Repo).collect();
            }
            Err(e) => {
                warn!(error = %e, "trending fetch failed");
                outcome.failures.push((self.listing_url(), e.to_string()));
            }
        }

        outcome.or_placeholder(|| self.placeholder())
    }

    fn name(&self) -> &str {
        "github_trending"
    }
}

/// Extract repositories from a trending page, in page order.
///
/// Rows without a repository link are skipped. `fallback_language` is used
/// when a row carries no language label.
pub fn parse_trending(
    html: &str,
    fallback_language: Option<&str>,
    fetch_date: &str,
) -> Vec<RepoRecord> {
    let doc = Html::parse_document(html);
    let row_sel = Selector::parse("article.Box-row").expect("valid selector");
    let link_sel = Selector::parse("h2 a[href]").expect("valid selector");
    let desc_sel = Selector::parse("p.col-9").expect("valid selector");
    let lang_sel =
        Selector::parse(r#"span[itemprop="programmingLanguage"]"#).expect("valid selector");
    let stat_sel = Selector::parse("span.d-inline-block.float-sm-right").expect("valid selector");
    let forks_sel = Selector::parse(r#"a[href$="/forks"]"#).expect("valid selector");

    let mut repos = Vec::new();

    for row in doc.select(&row_sel) {
        let Some(href) = row
            .select(&link_sel)
            .next()
            .and_then(|a| a.value().attr("href"))
        else {
            debug!("skipping trending row without repository link");
            continue;
        };

        let full_name = href.trim().trim_matches('/');
        let Some((owner, repo)) = full_name.split_once('/') else {
            debug!(href, "skipping trending row with unexpected link");
            continue;
        };

        let description = row
            .select(&desc_sel)
            .next()
            .map(text_of)
            .unwrap_or_default();

        let language = row
            .select(&lang_sel)
            .next()
            .map(text_of)
            .filter(|l| !l.is_empty())
            .or_else(|| fallback_language.map(str::to_string))
            .unwrap_or_else(|| "Unknown".into());

        let mut stars_today = String::new();
        let mut forks = String::new();
        for stat in row.select(&stat_sel) {
            let text = text_of(stat);
            if text.contains("star") {
                stars_today = text
                    .replace("stars today", "")
                    .replace("star today", "")
                    .trim()
                    .to_string();
            } else if text.contains("fork") {
                forks = text.replace("forks", "").replace("fork", "").trim().to_string();
            }
        }
        if forks.is_empty() {
            if let Some(a) = row.select(&forks_sel).next() {
                forks = text_of(a);
            }
        }

        repos.push(RepoRecord {
            id: full_name.to_string(),
            owner: owner.to_string(),
            repo: repo.to_string(),
            description,
            language,
            stars_today,
            forks,
            url: format!("https://github.com/{full_name}"),
            fetch_date: fetch_date.to_string(),
        });
    }

    repos
}

/// Element text with whitespace runs collapsed.
fn text_of(el: ElementRef<'_>) -> String {
    el.text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}
