//! Core domain types for sitesmith pipeline runs.

use serde::{Deserialize, Serialize};

/// Current schema version for the run manifest format.
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// ArtifactKey
// ---------------------------------------------------------------------------

/// Logical name of an artifact written by exactly one pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKey {
    ProjectPlan,
    Data,
    IndexHtml,
    ListHtml,
    DetailHtml,
    EvaluationReport,
}

impl ArtifactKey {
    /// Every key, in pipeline order.
    pub const ALL: [ArtifactKey; 6] = [
        Self::ProjectPlan,
        Self::Data,
        Self::IndexHtml,
        Self::ListHtml,
        Self::DetailHtml,
        Self::EvaluationReport,
    ];

    /// Stable logical name (also used as the default placeholder name).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ProjectPlan => "project_plan",
            Self::Data => "data",
            Self::IndexHtml => "index_html",
            Self::ListHtml => "list_html",
            Self::DetailHtml => "detail_html",
            Self::EvaluationReport => "evaluation_report",
        }
    }

    /// File name inside the output directory.
    pub fn file_name(&self) -> &'static str {
        match self {
            Self::ProjectPlan => "project_plan.txt",
            Self::Data => "data.json",
            Self::IndexHtml => "index.html",
            Self::ListHtml => "list.html",
            Self::DetailHtml => "detail.html",
            Self::EvaluationReport => "evaluation_report.txt",
        }
    }

    /// Human-readable label used in prompt preambles.
    pub fn label(&self) -> &'static str {
        match self {
            Self::ProjectPlan => "Project plan",
            Self::Data => "Data",
            Self::IndexHtml => "Index page",
            Self::ListHtml => "List page",
            Self::DetailHtml => "Detail page",
            Self::EvaluationReport => "Evaluation report",
        }
    }
}

impl std::fmt::Display for ArtifactKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ArtifactKey {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| format!("unknown artifact key: {s}"))
    }
}

// ---------------------------------------------------------------------------
// Artifact / StageOutcome
// ---------------------------------------------------------------------------

/// A named text blob produced by a stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub key: ArtifactKey,
    pub content: String,
}

/// What a single stage invocation produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageOutcome {
    /// The artifact was produced and committed to the store.
    Success(Artifact),
    /// No artifact was produced.
    Failed { key: ArtifactKey, reason: String },
}

impl StageOutcome {
    /// The artifact this outcome is about, regardless of success.
    pub fn key(&self) -> ArtifactKey {
        match self {
            Self::Success(artifact) => artifact.key,
            Self::Failed { key, .. } => *key,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// One paper from a structured-API (arXiv-style) source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaperRecord {
    /// Source identifier, e.g. `2401.01234v1`.
    pub id: String,
    pub title: String,
    pub authors: Vec<String>,
    /// Category partition the paper was fetched under.
    pub category: String,
    /// Submission date, `YYYY-MM-DD`.
    pub submit_date: String,
    pub pdf_url: String,
}

/// One repository from a scraped trending listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoRecord {
    /// Full name, `owner/repo`.
    pub id: String,
    pub owner: String,
    pub repo: String,
    #[serde(default)]
    pub description: String,
    pub language: String,
    #[serde(default)]
    pub stars_today: String,
    #[serde(default)]
    pub forks: String,
    pub url: String,
    pub fetch_date: String,
}

/// A single entry of the `data` artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Record {
    Paper(PaperRecord),
    Repo(RepoRecord),
}

impl Record {
    /// Stable unique identifier.
    pub fn id(&self) -> &str {
        match self {
            Self::Paper(p) => &p.id,
            Self::Repo(r) => &r.id,
        }
    }

    /// Human-readable title or name.
    pub fn title(&self) -> &str {
        match self {
            Self::Paper(p) => &p.title,
            Self::Repo(r) => &r.repo,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn artifact_key_roundtrip() {
        for key in ArtifactKey::ALL {
            let parsed: ArtifactKey = key.as_str().parse().expect("parse key");
            assert_eq!(parsed, key);
        }
        assert!("papers".parse::<ArtifactKey>().is_err());
    }

    #[test]
    fn artifact_file_names_are_distinct() {
        let mut names: Vec<_> = ArtifactKey::ALL.iter().map(|k| k.file_name()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), ArtifactKey::ALL.len());
    }

    #[test]
    fn stage_outcome_key() {
        let ok = StageOutcome::Success(Artifact {
            key: ArtifactKey::IndexHtml,
            content: "<html></html>".into(),
        });
        assert_eq!(ok.key(), ArtifactKey::IndexHtml);
        assert!(ok.is_success());

        let failed = StageOutcome::Failed {
            key: ArtifactKey::ListHtml,
            reason: "timeout".into(),
        };
        assert_eq!(failed.key(), ArtifactKey::ListHtml);
        assert!(!failed.is_success());
    }

    #[test]
    fn records_serialize_without_tag() {
        let records = vec![
            Record::Paper(PaperRecord {
                id: "2401.00001v1".into(),
                title: "Attention Again".into(),
                authors: vec!["A. Author".into()],
                category: "cs.AI".into(),
                submit_date: "2024-01-01".into(),
                pdf_url: "https://arxiv.org/pdf/2401.00001v1".into(),
            }),
            Record::Repo(RepoRecord {
                id: "octo/widget".into(),
                owner: "octo".into(),
                repo: "widget".into(),
                description: String::new(),
                language: "Rust".into(),
                stars_today: "12".into(),
                forks: "3".into(),
                url: "https://github.com/octo/widget".into(),
                fetch_date: "2024-01-01".into(),
            }),
        ];

        let json = serde_json::to_string(&records).expect("serialize");
        assert!(!json.contains("Paper"));
        assert!(json.contains(r#""category":"cs.AI""#));

        let parsed: Vec<Record> = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(parsed, records);
        assert_eq!(parsed[0].title(), "Attention Again");
        assert_eq!(parsed[1].id(), "octo/widget");
        assert_eq!(parsed[1].title(), "widget");
    }
}
