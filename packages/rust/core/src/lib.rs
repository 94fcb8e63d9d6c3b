//! Pipeline orchestration for sitesmith.
//!
//! Ties the text generator, data sources, prompt composition, and the
//! artifact store into one sequential run (see [`Pipeline::run`]).

pub mod pipeline;
pub mod stages;
mod title;

pub use pipeline::{
    Pipeline, PipelineSettings, ProgressReporter, RunSummary, SYNTHETIC_DATA_NOTICE,
    SilentProgress, StageReport,
};
pub use stages::{Page, Stage};
pub use title::format_title;
