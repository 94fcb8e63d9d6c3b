//! End-to-end run: reset → plan → data → html ×3 → evaluate.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use sitesmith_artifacts::{ArtifactStore, RunManifest, RunStatus, StageEntry};
use sitesmith_llm::TextGenerator;
use sitesmith_prompt::{
    Binding, ContentKind, PromptComposer, TemplateSet, sanitize, validate, validate_records,
};
use sitesmith_shared::{
    AppConfig, Artifact, ArtifactKey, Result, SitesmithError, StageOutcome,
};
use sitesmith_sources::DataSource;

use crate::stages::Stage;
use crate::title::format_title;

/// Text bound to `{data_notice}` when the data artifact is a placeholder.
pub const SYNTHETIC_DATA_NOTICE: &str = "NOTE: live data could not be fetched for this run. \
The data artifact contains a synthetic placeholder record, not real results.";

/// Run-level settings taken from `[pipeline]`.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Case identifier; bound to `{case}` and used for the run title.
    pub case: String,
    /// Line cap for artifacts embedded in prompts. `0` disables.
    pub max_artifact_lines: usize,
    /// Fail a stage whose sanitized output does not validate.
    pub strict_validation: bool,
}

impl PipelineSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            case: config.pipeline.case.clone(),
            max_artifact_lines: config.pipeline.max_artifact_lines,
            strict_validation: config.pipeline.strict_validation,
        }
    }
}

/// One stage's result within a run.
#[derive(Debug, Clone)]
pub struct StageReport {
    pub stage: Stage,
    pub outcome: StageOutcome,
    pub elapsed: Duration,
}

impl StageReport {
    fn to_entry(&self) -> StageEntry {
        StageEntry {
            stage: self.stage.name().to_string(),
            artifact: self.outcome.key(),
            succeeded: self.outcome.is_success(),
            reason: match &self.outcome {
                StageOutcome::Success(_) => None,
                StageOutcome::Failed { reason, .. } => Some(reason.clone()),
            },
        }
    }
}

/// Result of a run that reached the last stage.
#[derive(Debug)]
pub struct RunSummary {
    pub run_id: String,
    pub title: String,
    pub output_dir: PathBuf,
    pub stages: Vec<StageReport>,
    /// The data artifact holds placeholder records.
    pub data_synthetic: bool,
    pub status: RunStatus,
    pub elapsed: Duration,
}

impl RunSummary {
    pub fn failed_stages(&self) -> impl Iterator<Item = &StageReport> {
        self.stages.iter().filter(|r| !r.outcome.is_success())
    }
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called for run-level steps outside any stage.
    fn phase(&self, name: &str);
    /// Called before a stage starts; `index` is 1-based.
    fn stage_started(&self, stage: Stage, index: usize, total: usize);
    /// Called after a stage returns an outcome.
    fn stage_finished(&self, report: &StageReport);
    /// Called when the run completes without halting.
    fn done(&self, summary: &RunSummary);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn stage_started(&self, _stage: Stage, _index: usize, _total: usize) {}
    fn stage_finished(&self, _report: &StageReport) {}
    fn done(&self, _summary: &RunSummary) {}
}

/// Sequences the stages of one case against one output directory.
///
/// The generator and the optional fetch source are constructed by the
/// caller and held for the pipeline's lifetime. Without a source the data
/// stage asks the generator for records.
pub struct Pipeline {
    generator: Arc<dyn TextGenerator>,
    source: Option<Box<dyn DataSource>>,
    store: ArtifactStore,
    templates: TemplateSet,
    settings: PipelineSettings,
}

impl Pipeline {
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        source: Option<Box<dyn DataSource>>,
        store: ArtifactStore,
        templates: TemplateSet,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            generator,
            source,
            store,
            templates,
            settings,
        }
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    pub fn title(&self) -> String {
        format_title(&self.settings.case)
    }

    /// Run every stage in order.
    ///
    /// Generation failures are recorded per stage and the run continues.
    /// A missing required input halts the run with
    /// [`SitesmithError::MissingArtifact`]. Template and store failures are
    /// returned as-is. The run manifest is written on completion and on every halt.
    #[instrument(skip_all, fields(case = %self.settings.case))]
    pub async fn run(&self, progress: &dyn ProgressReporter) -> Result<RunSummary> {
        let start = Instant::now();
        let run_id = Uuid::now_v7().to_string();
        let title = self.title();
        let mut manifest = RunManifest::new(
            run_id.clone(),
            self.settings.case.clone(),
            title.clone(),
            Utc::now(),
        );

        info!(
            %run_id,
            %title,
            model = self.generator.model(),
            source = self.source.as_ref().map_or("llm", |s| s.name()),
            "starting pipeline run"
        );

        progress.phase("Clearing previous artifacts");
        self.store.reset()?;

        let mut reports: Vec<StageReport> = Vec::new();
        let mut data_synthetic = false;

        if let Err(e) = self.run_stages(progress, &mut reports, &mut data_synthetic).await {
            manifest.data_synthetic = data_synthetic;
            if let Err(me) = self.finish_manifest(manifest, &reports, RunStatus::Halted) {
                warn!(error = %me, "failed to write run manifest");
            }
            return Err(e);
        }

        let status = if reports.iter().all(|r| r.outcome.is_success()) {
            RunStatus::Completed
        } else {
            RunStatus::CompletedWithFailures
        };
        manifest.data_synthetic = data_synthetic;
        self.finish_manifest(manifest, &reports, status)?;

        let summary = RunSummary {
            run_id,
            title,
            output_dir: self.store.root().to_path_buf(),
            stages: reports,
            data_synthetic,
            status,
            elapsed: start.elapsed(),
        };

        progress.done(&summary);

        info!(
            run_id = %summary.run_id,
            status = ?summary.status,
            failed = summary.failed_stages().count(),
            data_synthetic = summary.data_synthetic,
            elapsed_ms = summary.elapsed.as_millis(),
            "pipeline run complete"
        );

        Ok(summary)
    }

    /// Stage loop. Reports accumulate in `reports` so a halted run still
    /// records what happened up to the failing stage.
    async fn run_stages(
        &self,
        progress: &dyn ProgressReporter,
        reports: &mut Vec<StageReport>,
        data_synthetic: &mut bool,
    ) -> Result<()> {
        let mut produced = BTreeSet::new();
        let total = Stage::ALL.len();

        for (i, stage) in Stage::ALL.into_iter().enumerate() {
            progress.stage_started(stage, i + 1, total);
            let stage_start = Instant::now();

            let result = match self.check_inputs(stage, &produced) {
                Ok(()) => self.run_stage(stage, data_synthetic).await,
                Err(e) => Err(e),
            };
            let outcome = match result {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!(%stage, error = %e, "stage cannot proceed, halting run");
                    let report = StageReport {
                        stage,
                        outcome: StageOutcome::Failed {
                            key: stage.artifact(),
                            reason: e.to_string(),
                        },
                        elapsed: stage_start.elapsed(),
                    };
                    progress.stage_finished(&report);
                    reports.push(report);
                    return Err(e);
                }
            };

            if let StageOutcome::Success(artifact) = &outcome {
                produced.insert(artifact.key);
            }
            let report = StageReport {
                stage,
                outcome,
                elapsed: stage_start.elapsed(),
            };
            progress.stage_finished(&report);
            reports.push(report);
        }

        Ok(())
    }

    /// Every hard input of `stage` must have been produced in this run.
    fn check_inputs(&self, stage: Stage, produced: &BTreeSet<ArtifactKey>) -> Result<()> {
        let llm_data = self.source.is_none();
        match stage
            .requires(llm_data)
            .iter()
            .find(|key| !produced.contains(*key))
        {
            Some(key) => Err(SitesmithError::missing_artifact(key.as_str(), stage.name())),
            None => Ok(()),
        }
    }

    async fn run_stage(&self, stage: Stage, data_synthetic: &mut bool) -> Result<StageOutcome> {
        if let (Stage::Data, Some(source)) = (stage, self.source.as_deref()) {
            let (outcome, synthetic) = self.fetch_data(source).await?;
            *data_synthetic = synthetic;
            return Ok(outcome);
        }
        self.generate(stage, *data_synthetic).await
    }

    /// Compose, generate, sanitize, and commit one model-backed stage.
    #[instrument(skip_all, fields(stage = %stage))]
    async fn generate(&self, stage: Stage, data_synthetic: bool) -> Result<StageOutcome> {
        let key = stage.artifact();
        let composer =
            PromptComposer::new(&self.templates, &self.store, self.settings.max_artifact_lines);
        let prompt = composer.compose(stage.template(), &self.bindings(stage, data_synthetic))?;

        let raw = match self.generator.generate(&prompt).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(%stage, artifact = %key, error = %e, "generation failed, no artifact produced");
                return Ok(StageOutcome::Failed {
                    key,
                    reason: e.to_string(),
                });
            }
        };

        let content = match stage.content_kind() {
            Some(kind) => {
                let cleaned = sanitize(&raw, kind);
                if let Err(e) = check_content(stage, &cleaned, kind) {
                    if self.settings.strict_validation {
                        warn!(%stage, artifact = %key, error = %e, "validation failed, artifact discarded");
                        return Ok(StageOutcome::Failed {
                            key,
                            reason: e.to_string(),
                        });
                    }
                    warn!(%stage, artifact = %key, error = %e, "validation finding, artifact kept");
                }
                cleaned
            }
            None => raw.trim().to_string(),
        };

        self.commit(key, content)
    }

    /// Data stage backed by a fetch source. Never fails at this level
    /// beyond store errors: an empty fetch is already a placeholder.
    #[instrument(skip_all, fields(source = source.name()))]
    async fn fetch_data(&self, source: &dyn DataSource) -> Result<(StageOutcome, bool)> {
        let fetched = source.fetch().await;

        if fetched.synthetic {
            warn!(
                failures = fetched.failures.len(),
                "data artifact holds placeholder records"
            );
        }
        info!(
            records = fetched.records.len(),
            failures = fetched.failures.len(),
            "records fetched"
        );

        let json = serde_json::to_string_pretty(&fetched.records)
            .map_err(|e| SitesmithError::validation(format!("record serialization failed: {e}")))?;

        Ok((self.commit(ArtifactKey::Data, json)?, fetched.synthetic))
    }

    fn commit(&self, key: ArtifactKey, content: String) -> Result<StageOutcome> {
        let path = self.store.write(key, &content)?;
        info!(artifact = %key, path = %path.display(), bytes = content.len(), "artifact written");
        Ok(StageOutcome::Success(Artifact { key, content }))
    }

    /// Placeholder bindings for `stage`. Artifacts the template does not
    /// reference are prepended as labelled context.
    fn bindings(&self, stage: Stage, data_synthetic: bool) -> Vec<Binding> {
        let mut bindings = vec![
            Binding::literal("case", self.settings.case.as_str()),
            Binding::literal("title", self.title()),
        ];

        match stage {
            Stage::Plan => {}
            Stage::Data => bindings.push(Binding::artifact(ArtifactKey::ProjectPlan)),
            Stage::Html(_) => {
                bindings.push(Binding::artifact(ArtifactKey::ProjectPlan));
                bindings.push(Binding::artifact_as("data_json", ArtifactKey::Data));
            }
            Stage::Evaluate => {
                bindings.push(Binding::artifact(ArtifactKey::ProjectPlan));
                bindings.push(Binding::artifact_as("data_json", ArtifactKey::Data));
                bindings.push(Binding::artifact(ArtifactKey::IndexHtml));
                bindings.push(Binding::artifact(ArtifactKey::ListHtml));
                bindings.push(Binding::artifact(ArtifactKey::DetailHtml));
            }
        }

        if matches!(stage, Stage::Html(_) | Stage::Evaluate) {
            let notice = if data_synthetic { SYNTHETIC_DATA_NOTICE } else { "" };
            bindings.push(Binding::literal("data_notice", notice));
        }

        debug!(%stage, count = bindings.len(), "bindings prepared");
        bindings
    }

    fn finish_manifest(
        &self,
        mut manifest: RunManifest,
        reports: &[StageReport],
        status: RunStatus,
    ) -> Result<()> {
        manifest.finished_at = Utc::now();
        manifest.status = status;
        manifest.stages = reports.iter().map(StageReport::to_entry).collect();
        manifest.artifacts = self.store.inventory()?;
        self.store.write_manifest(&manifest)?;
        Ok(())
    }
}

/// Data must be a JSON array of records; pages must contain markup.
fn check_content(stage: Stage, content: &str, kind: ContentKind) -> Result<()> {
    match stage {
        Stage::Data => validate_records(content).map(|count| {
            debug!(records = count, "generated records validated");
        }),
        _ => validate(content, kind),
    }
}
