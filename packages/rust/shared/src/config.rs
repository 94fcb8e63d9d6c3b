//! Application configuration for sitesmith.
//!
//! Config is looked up at `./sitesmith.toml`, then `~/.sitesmith/sitesmith.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, SitesmithError};

/// Default configuration file name.
pub const CONFIG_FILE_NAME: &str = "sitesmith.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".sitesmith";

// ---------------------------------------------------------------------------
// Config structs (matching sitesmith.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Pipeline layout and policies.
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Text-generation service settings.
    #[serde(default)]
    pub llm: LlmConfig,

    /// Data stage settings.
    #[serde(default)]
    pub data: DataConfig,
}

/// `[pipeline]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Active case; selects `<cases_dir>/<case>/` for prompt templates.
    #[serde(default = "default_case")]
    pub case: String,

    /// Directory holding one sub-directory of templates per case.
    #[serde(default = "default_cases_dir")]
    pub cases_dir: String,

    /// Artifact output directory, cleared at the start of every run.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    /// Artifacts embedded into prompts are cut to this many lines.
    #[serde(default = "default_max_artifact_lines")]
    pub max_artifact_lines: usize,

    /// Fail a stage when its sanitized output does not validate.
    #[serde(default)]
    pub strict_validation: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            case: default_case(),
            cases_dir: default_cases_dir(),
            output_dir: default_output_dir(),
            max_artifact_lines: default_max_artifact_lines(),
            strict_validation: false,
        }
    }
}

fn default_case() -> String {
    "arxiv_cs_daily".into()
}
fn default_cases_dir() -> String {
    "test_cases".into()
}
fn default_output_dir() -> String {
    "outputs".into()
}
fn default_max_artifact_lines() -> usize {
    200
}

/// `[llm]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// OpenAI-compatible API root; `/chat/completions` is appended.
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,

    /// Model identity sent with every request.
    #[serde(default = "default_model")]
    pub model: String,

    /// Sampling temperature sent with every request.
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Local secret file holding the API key (checked first).
    #[serde(default = "default_api_key_file")]
    pub api_key_file: String,

    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// TCP connect timeout for the generation service.
    #[serde(default = "default_timeout_secs")]
    pub connect_timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_llm_base_url(),
            model: default_model(),
            temperature: default_temperature(),
            api_key_file: default_api_key_file(),
            api_key_env: default_api_key_env(),
            connect_timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_llm_base_url() -> String {
    "https://dashscope.aliyuncs.com/compatible-mode/v1".into()
}
fn default_model() -> String {
    "qwen-turbo".into()
}
fn default_temperature() -> f32 {
    0.3
}
fn default_api_key_file() -> String {
    "api_key.txt".into()
}
fn default_api_key_env() -> String {
    "SITESMITH_API_KEY".into()
}
fn default_timeout_secs() -> u64 {
    30
}

/// Where the data stage gets its records from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSourceKind {
    /// Ask the text-generation service to synthesize records.
    Llm,
    /// Structured-API fetch, one partition per category.
    Arxiv,
    /// Markup scrape of a trending listing.
    GithubTrending,
}

impl DataSourceKind {
    /// Infer a source from a case identifier (`arxiv_*`, `github_*`).
    pub fn infer_from_case(case: &str) -> Self {
        let case = case.to_ascii_lowercase();
        if case.starts_with("arxiv") {
            Self::Arxiv
        } else if case.starts_with("github") {
            Self::GithubTrending
        } else {
            Self::Llm
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Llm => "llm",
            Self::Arxiv => "arxiv",
            Self::GithubTrending => "github_trending",
        }
    }
}

/// `[data]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    /// Explicit source; inferred from the case when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<DataSourceKind>,

    /// Whole-request timeout for source fetches.
    #[serde(default = "default_timeout_secs")]
    pub fetch_timeout_secs: u64,

    #[serde(default)]
    pub arxiv: ArxivConfig,

    #[serde(default)]
    pub github: GithubConfig,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            source: None,
            fetch_timeout_secs: default_timeout_secs(),
            arxiv: ArxivConfig::default(),
            github: GithubConfig::default(),
        }
    }
}

impl DataConfig {
    /// The effective source for `case`.
    pub fn resolve_source(&self, case: &str) -> DataSourceKind {
        self.source
            .unwrap_or_else(|| DataSourceKind::infer_from_case(case))
    }
}

/// `[data.arxiv]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArxivConfig {
    #[serde(default = "default_arxiv_base_url")]
    pub base_url: String,

    /// One partition query per category, in this order.
    #[serde(default = "default_arxiv_categories")]
    pub categories: Vec<String>,

    /// Per-partition record cap.
    #[serde(default = "default_arxiv_max_results")]
    pub max_results: usize,
}

impl Default for ArxivConfig {
    fn default() -> Self {
        Self {
            base_url: default_arxiv_base_url(),
            categories: default_arxiv_categories(),
            max_results: default_arxiv_max_results(),
        }
    }
}

fn default_arxiv_base_url() -> String {
    "http://export.arxiv.org/api/query".into()
}
fn default_arxiv_categories() -> Vec<String> {
    ["cs.AI", "cs.TH", "cs.CV", "cs.LG"]
        .into_iter()
        .map(String::from)
        .collect()
}
fn default_arxiv_max_results() -> usize {
    5
}

/// `[data.github]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GithubConfig {
    #[serde(default = "default_github_base_url")]
    pub base_url: String,

    /// Language path segment; `None` lists all languages.
    #[serde(default = "default_github_language")]
    pub language: Option<String>,

    /// Time window: `daily`, `weekly`, or `monthly`.
    #[serde(default = "default_github_since")]
    pub since: String,

    #[serde(default = "default_github_max_results")]
    pub max_results: usize,

    /// Client identity sent with the listing request.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            base_url: default_github_base_url(),
            language: default_github_language(),
            since: default_github_since(),
            max_results: default_github_max_results(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_github_base_url() -> String {
    "https://github.com/trending".into()
}
fn default_github_language() -> Option<String> {
    Some("python".into())
}
fn default_github_since() -> String {
    "daily".into()
}
fn default_github_max_results() -> usize {
    10
}
fn default_user_agent() -> String {
    concat!("Mozilla/5.0 (compatible; sitesmith/", env!("CARGO_PKG_VERSION"), ")").into()
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the user config directory (`~/.sitesmith/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| SitesmithError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the user config file (`~/.sitesmith/sitesmith.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config.
///
/// Looks for `./sitesmith.toml` first, then the user config file.
/// Returns defaults if neither exists.
pub fn load_config() -> Result<AppConfig> {
    let local = PathBuf::from(CONFIG_FILE_NAME);
    if local.exists() {
        return load_config_from(&local);
    }

    let path = config_file_path()?;
    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| SitesmithError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        SitesmithError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Write a default config file to `path`, creating parent directories.
pub fn init_config_at(path: &Path) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).map_err(|e| SitesmithError::io(dir, e))?;
    }

    let content = toml::to_string_pretty(&AppConfig::default())
        .map_err(|e| SitesmithError::config(e.to_string()))?;

    std::fs::write(path, content).map_err(|e| SitesmithError::io(path, e))?;
    tracing::info!(?path, "created default config file");
    Ok(())
}

/// Create the user config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let path = config_file_path()?;
    init_config_at(&path)?;
    Ok(path)
}
