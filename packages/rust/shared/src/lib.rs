//! Shared types, error model, and configuration for sitesmith.
//!
//! This crate is the foundation depended on by all other sitesmith crates.
//! It provides:
//! - [`SitesmithError`]: the unified error type
//! - Domain types ([`ArtifactKey`], [`Artifact`], [`StageOutcome`], [`Record`])
//! - Configuration ([`AppConfig`] and its sections, config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, ArxivConfig, CONFIG_FILE_NAME, DataConfig, DataSourceKind, GithubConfig,
    LlmConfig, PipelineConfig, config_dir, config_file_path, init_config, init_config_at,
    load_config, load_config_from,
};
pub use error::{Result, SitesmithError};
pub use types::{
    Artifact, ArtifactKey, CURRENT_SCHEMA_VERSION, PaperRecord, Record, RepoRecord, StageOutcome,
};
