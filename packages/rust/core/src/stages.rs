//! The fixed stage catalogue: what each stage reads, writes, and expects.

use std::fmt;

use sitesmith_prompt::ContentKind;
use sitesmith_shared::ArtifactKey;

/// One of the three generated pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Page {
    Index,
    List,
    Detail,
}

/// A pipeline stage. Html runs once per [`Page`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Plan,
    Data,
    Html(Page),
    Evaluate,
}

impl Stage {
    /// Execution order of a run.
    pub const ALL: [Stage; 6] = [
        Stage::Plan,
        Stage::Data,
        Stage::Html(Page::Index),
        Stage::Html(Page::List),
        Stage::Html(Page::Detail),
        Stage::Evaluate,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Plan => "plan",
            Self::Data => "data",
            Self::Html(Page::Index) => "html_index",
            Self::Html(Page::List) => "html_list",
            Self::Html(Page::Detail) => "html_detail",
            Self::Evaluate => "evaluate",
        }
    }

    /// The artifact this stage produces.
    pub fn artifact(&self) -> ArtifactKey {
        match self {
            Self::Plan => ArtifactKey::ProjectPlan,
            Self::Data => ArtifactKey::Data,
            Self::Html(Page::Index) => ArtifactKey::IndexHtml,
            Self::Html(Page::List) => ArtifactKey::ListHtml,
            Self::Html(Page::Detail) => ArtifactKey::DetailHtml,
            Self::Evaluate => ArtifactKey::EvaluationReport,
        }
    }

    /// Template file name inside the case directory.
    pub fn template(&self) -> &'static str {
        match self {
            Self::Plan => "plan_prompt.txt",
            Self::Data => "data_prompt.txt",
            Self::Html(Page::Index) => "html_index_prompt.txt",
            Self::Html(Page::List) => "html_list_prompt.txt",
            Self::Html(Page::Detail) => "html_detail_prompt.txt",
            Self::Evaluate => "evaluation_prompt.txt",
        }
    }

    /// Payload kind to recover from the model response. Plain-text stages
    /// return `None` and are stored as returned.
    pub fn content_kind(&self) -> Option<ContentKind> {
        match self {
            Self::Data => Some(ContentKind::Json),
            Self::Html(_) => Some(ContentKind::Html),
            Self::Plan | Self::Evaluate => None,
        }
    }

    /// Artifacts that must have been produced earlier in the same run.
    ///
    /// `llm_data` is true when the data stage asks the model instead of a
    /// fetch source; fetch sources never read the plan.
    pub fn requires(&self, llm_data: bool) -> &'static [ArtifactKey] {
        match self {
            Self::Plan => &[],
            Self::Data if llm_data => &[ArtifactKey::ProjectPlan],
            Self::Data => &[],
            Self::Html(_) | Self::Evaluate => &[ArtifactKey::ProjectPlan],
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
