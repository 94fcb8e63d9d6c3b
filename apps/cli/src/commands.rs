//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use color_eyre::eyre::Result;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use sitesmith_artifacts::{ArtifactStore, RunStatus};
use sitesmith_core::{
    Pipeline, PipelineSettings, ProgressReporter, RunSummary, Stage, StageReport, format_title,
};
use sitesmith_llm::{ChatCompletionsClient, load_api_key};
use sitesmith_prompt::{TemplateSet, list_cases};
use sitesmith_shared::{
    AppConfig, SitesmithError, StageOutcome, init_config, init_config_at, load_config,
    load_config_from,
};
use sitesmith_sources::build_source;

/// Configuration error (bad config file, missing template or credential).
const EXIT_CONFIG: u8 = 2;
/// A stage's required input was missing and the run stopped.
const EXIT_HALTED: u8 = 3;
/// The run finished but at least one stage produced nothing.
const EXIT_STAGE_FAILURES: u8 = 4;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// sitesmith: plan, populate, render, and review a small static site with an LLM.
#[derive(Parser)]
#[command(
    name = "sitesmith",
    version,
    about = "Run the plan → data → html → evaluate generation pipeline for a case.",
    long_about = None,
    args_conflicts_with_subcommands = true,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file to use instead of ./sitesmith.toml or ~/.sitesmith/sitesmith.toml.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Run options when no subcommand is given.
    #[command(flatten)]
    pub run: RunArgs,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Overrides for a pipeline run.
#[derive(Args, Clone, Debug, Default)]
pub(crate) struct RunArgs {
    /// Case to run (a directory under the configured cases_dir).
    #[arg(long)]
    pub case: Option<String>,

    /// Output directory; cleared at the start of the run.
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Run the full pipeline (default).
    Run(RunArgs),

    /// List available cases.
    Cases,

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init {
        /// Write here instead of ~/.sitesmith/sitesmith.toml.
        #[arg(long)]
        path: Option<PathBuf>,
    },
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "sitesmith=info",
        1 => "sitesmith=debug",
        _ => "sitesmith=trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<ExitCode> {
    let config_path = cli.config.as_deref();
    match cli.command {
        None => cmd_run(config_path, &cli.run).await,
        Some(Command::Run(args)) => cmd_run(config_path, &args).await,
        Some(Command::Cases) => cmd_cases(config_path),
        Some(Command::Config { action }) => match action {
            ConfigAction::Init { path } => cmd_config_init(path.as_deref()),
            ConfigAction::Show => cmd_config_show(config_path),
        },
    }
}

/// Load config from `--config` or the default search path.
fn resolve_config(path: Option<&Path>) -> sitesmith_shared::Result<AppConfig> {
    match path {
        Some(p) => load_config_from(p),
        None => load_config(),
    }
}

/// Exit code for configuration-class failures; `None` for everything else.
fn exit_code_for(err: &SitesmithError) -> Option<u8> {
    match err {
        SitesmithError::MissingArtifact { .. } => Some(EXIT_HALTED),
        e if e.is_configuration() => Some(EXIT_CONFIG),
        _ => None,
    }
}

/// Report configuration-class failures and exit with their code; anything
/// else is reported by color-eyre.
fn exit_for(err: SitesmithError) -> Result<ExitCode> {
    match exit_code_for(&err) {
        Some(EXIT_HALTED) => {
            eprintln!("\n  Run halted: {err}\n");
            Ok(ExitCode::from(EXIT_HALTED))
        }
        Some(code) => {
            eprintln!("\n  {err}\n");
            Ok(ExitCode::from(code))
        }
        None => Err(err.into()),
    }
}

// ---------------------------------------------------------------------------
// run
// ---------------------------------------------------------------------------

async fn cmd_run(config_path: Option<&Path>, args: &RunArgs) -> Result<ExitCode> {
    let pipeline = match build_pipeline(config_path, args) {
        Ok(pipeline) => pipeline,
        Err(e) => return exit_for(e),
    };

    let title = pipeline.title();
    println!("{}", "=".repeat(60));
    println!("  sitesmith: {title}");
    println!("{}", "=".repeat(60));

    let reporter = CliProgress::new();
    let result = pipeline.run(&reporter).await;
    reporter.clear();

    match result {
        Ok(summary) => {
            print_summary(&summary);
            Ok(match summary.status {
                RunStatus::Completed => ExitCode::SUCCESS,
                _ => ExitCode::from(EXIT_STAGE_FAILURES),
            })
        }
        Err(e) => exit_for(e),
    }
}

/// Resolve config, load the credential once, and wire the pipeline.
fn build_pipeline(config_path: Option<&Path>, args: &RunArgs) -> sitesmith_shared::Result<Pipeline> {
    let mut config = resolve_config(config_path)?;
    if let Some(case) = &args.case {
        config.pipeline.case = case.clone();
    }
    if let Some(output) = &args.output {
        config.pipeline.output_dir = output.display().to_string();
    }

    let case = config.pipeline.case.clone();
    let templates = TemplateSet::for_case(Path::new(&config.pipeline.cases_dir), &case);
    if !templates.dir().is_dir() {
        return Err(SitesmithError::config(format!(
            "case `{case}` not found at {}",
            templates.dir().display()
        )));
    }

    let api_key = load_api_key(&config.llm)?;
    let generator = Arc::new(ChatCompletionsClient::new(&config.llm, api_key)?);

    let kind = config.data.resolve_source(&case);
    let source = build_source(kind, &config.data)?;

    info!(
        %case,
        source = kind.as_str(),
        model = %config.llm.model,
        output = %config.pipeline.output_dir,
        "pipeline configured"
    );

    Ok(Pipeline::new(
        generator,
        source,
        ArtifactStore::new(&config.pipeline.output_dir),
        templates,
        PipelineSettings::from_config(&config),
    ))
}

fn print_summary(summary: &RunSummary) {
    let status = match summary.status {
        RunStatus::Completed => "completed",
        RunStatus::CompletedWithFailures => "completed with failures",
        RunStatus::Halted => "halted",
    };

    println!();
    println!("  Run {status}: {}", summary.title);
    println!("  Run ID:  {}", summary.run_id);
    for report in &summary.stages {
        match &report.outcome {
            StageOutcome::Success(artifact) => println!(
                "    {:<12} ok      {} ({:.1}s)",
                report.stage.name(),
                artifact.key.file_name(),
                report.elapsed.as_secs_f64()
            ),
            StageOutcome::Failed { reason, .. } => {
                println!("    {:<12} FAILED  {reason}", report.stage.name())
            }
        }
    }
    if summary.data_synthetic {
        println!("  Data:    placeholder records (live fetch returned nothing)");
    }
    println!("  Output:  {}", summary.output_dir.display());
    println!("  Time:    {:.1}s", summary.elapsed.as_secs_f64());
    println!();
    println!("  Preview: python -m http.server 8000 --directory {}", summary.output_dir.display());
    println!();
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
            spinner.set_style(
                style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
            );
        }
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }

    fn clear(&self) {
        if !self.spinner.is_finished() {
            self.spinner.finish_and_clear();
        }
    }
}

fn stage_label(stage: Stage) -> &'static str {
    match stage {
        Stage::Plan => "Planning",
        Stage::Data => "Gathering data",
        Stage::Html(_) => "Rendering page",
        Stage::Evaluate => "Evaluating",
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn stage_started(&self, stage: Stage, index: usize, total: usize) {
        self.spinner.set_message(format!(
            "[{index}/{total}] {} ({stage})",
            stage_label(stage)
        ));
    }

    fn stage_finished(&self, report: &StageReport) {
        let mark = if report.outcome.is_success() { "✓" } else { "✗" };
        self.spinner.println(format!("  {mark} {}", report.stage));
    }

    fn done(&self, _summary: &RunSummary) {
        self.spinner.finish_and_clear();
    }
}

// ---------------------------------------------------------------------------
// cases / config
// ---------------------------------------------------------------------------

fn cmd_cases(config_path: Option<&Path>) -> Result<ExitCode> {
    let config = match resolve_config(config_path) {
        Ok(config) => config,
        Err(e) => return exit_for(e),
    };

    let cases_dir = Path::new(&config.pipeline.cases_dir);
    let cases = if cases_dir.is_dir() {
        list_cases(cases_dir)?
    } else {
        Vec::new()
    };
    if cases.is_empty() {
        println!("No cases found in {}", cases_dir.display());
        return Ok(ExitCode::SUCCESS);
    }

    for case in cases {
        let marker = if case == config.pipeline.case { "*" } else { " " };
        println!("{marker} {case:<24} {}", format_title(&case));
    }
    Ok(ExitCode::SUCCESS)
}

fn cmd_config_init(path: Option<&Path>) -> Result<ExitCode> {
    let path = match path {
        Some(p) => {
            init_config_at(p)?;
            p.to_path_buf()
        }
        None => init_config()?,
    };
    println!("Config initialized at: {}", path.display());
    Ok(ExitCode::SUCCESS)
}

fn cmd_config_show(config_path: Option<&Path>) -> Result<ExitCode> {
    let config = match resolve_config(config_path) {
        Ok(config) => config,
        Err(e) => return exit_for(e),
    };
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_subcommand_means_run() {
        let cli = Cli::try_parse_from(["sitesmith", "--case", "github_trending"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.run.case.as_deref(), Some("github_trending"));
    }

    #[test]
    fn run_subcommand_takes_overrides() {
        let cli =
            Cli::try_parse_from(["sitesmith", "run", "-o", "site", "--config", "x.toml"]).unwrap();
        match cli.command {
            Some(Command::Run(args)) => assert_eq!(args.output, Some(PathBuf::from("site"))),
            _ => panic!("expected run"),
        }
        assert_eq!(cli.config, Some(PathBuf::from("x.toml")));
    }

    #[test]
    fn verbosity_counts() {
        let cli = Cli::try_parse_from(["sitesmith", "cases", "-vv"]).unwrap();
        assert_eq!(cli.verbose, 2);
        assert!(matches!(cli.command, Some(Command::Cases)));
    }

    #[test]
    fn missing_artifact_exits_halted() {
        let err = SitesmithError::missing_artifact("project_plan", "data");
        assert_eq!(exit_code_for(&err), Some(EXIT_HALTED));
    }

    #[test]
    fn config_error_exits_config() {
        assert_eq!(exit_code_for(&SitesmithError::config("bad")), Some(EXIT_CONFIG));
    }

    #[test]
    fn other_errors_propagate() {
        let err = SitesmithError::Network("down".into());
        assert_eq!(exit_code_for(&err), None);
        assert!(exit_for(err).is_err());
    }
}
