//! Startup Validator CLI
//!
//! Runs a startup idea through a validation workflow, writes the report and
//! prints a short summary.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde_json::json;
use startup_validator::assembler::{Findings, ReportStore, ScoreCard};
use startup_validator::cancellation::CancellationToken;
use startup_validator::config::ValidatorConfig;
use startup_validator::core::{ReportStatus, StageId, StartupIdea, ValidationReport};
use startup_validator::errors::ValidatorError;
use startup_validator::observability::init_tracing;
use startup_validator::pipeline::{
    ExecutionMode, FailureMode, Precursors, RunOutcome, StartupValidator, Workflow,
};
use startup_validator::testing::fixtures::sample_idea;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const SUMMARY_FILE: &str = "validation_result.json";
const SUMMARY_RECOMMENDATIONS: usize = 5;

#[derive(Debug, Parser)]
#[command(
    name = "startup-validator",
    version,
    about = "Validate a startup idea with market, competitor, persona and MVP analysis"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(about = "Run a validation workflow and write the report")]
    Run(RunArgs),
    #[command(about = "Write an example idea file")]
    Example {
        #[arg(long, default_value = "example_idea.json")]
        output: PathBuf,
    },
    #[command(about = "Print the summary of a persisted report")]
    Score {
        #[arg(long)]
        report: PathBuf,
    },
}

#[derive(Debug, Args)]
struct RunArgs {
    /// Idea file (JSON). The FreshMeal example is used when omitted.
    #[arg(long)]
    input_file: Option<PathBuf>,
    /// Where reports are written.
    #[arg(long)]
    output_dir: Option<PathBuf>,
    /// full_validation, market_only or mvp_only.
    #[arg(long)]
    workflow: Option<Workflow>,
    /// Verbose logging.
    #[arg(long)]
    debug: bool,
    /// Ask for approval after MVP planning.
    #[arg(long)]
    interactive: bool,
    /// Keep running after a stage fails.
    #[arg(long)]
    best_effort: bool,
    /// Run independent stages concurrently.
    #[arg(long)]
    parallel: bool,
    /// TOML configuration file.
    #[arg(long, env = "VALIDATOR_CONFIG")]
    config: Option<PathBuf>,
    /// Market research JSON to use instead of a live market stage.
    #[arg(long)]
    market_data: Option<PathBuf>,
    /// Emit logs as JSON lines.
    #[arg(long)]
    log_json: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let code = match execute(cli).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{}", format_cli_error(&err));
            tracing::error!(error = %err, "command failed");
            exit_code(&err)
        }
    };
    std::process::exit(code);
}

async fn execute(cli: Cli) -> Result<i32> {
    match cli.command {
        Commands::Run(args) => run(args).await,
        Commands::Example { output } => {
            write_example(&output)?;
            println!("Example idea written to {}", output.display());
            Ok(0)
        }
        Commands::Score { report } => {
            let report = ReportStore::load(&report)
                .await
                .with_context(|| format!("failed to read report {}", report.display()))?;
            print_rescored(&report);
            Ok(0)
        }
    }
}

async fn run(args: RunArgs) -> Result<i32> {
    let config = resolve_config(&args)?;
    let filter = if config.debug { "debug" } else { "info" };
    init_tracing(filter, args.log_json);

    let document = match &args.input_file {
        Some(path) => read_json(path)?,
        None => {
            tracing::info!("No input file given, using the FreshMeal example");
            json!({ "idea": sample_idea() })
        }
    };
    let idea = StartupIdea::from_document(&document).map_err(ValidatorError::from)?;
    let mut precursors = Precursors::from_input(&document);
    if let Some(path) = &args.market_data {
        precursors.insert(StageId::Market, read_json(path)?);
    }

    let output_dir = config.output_dir.clone();
    let validator = StartupValidator::from_config(config)?;

    let cancel = Arc::new(CancellationToken::new());
    cancel.on_cancel(|| eprintln!("Interrupted, stopping the validation run..."));
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel("interrupted by user");
        }
    });

    let outcome = validator
        .validate_with_cancellation(idea, &precursors, cancel)
        .await?;

    let summary_path = output_dir.join(SUMMARY_FILE);
    write_summary(&summary_path, &outcome)?;
    print_summary(&outcome.report);
    println!("Report: {}", outcome.report_path.display());
    println!("Summary: {}", summary_path.display());

    Ok(match outcome.report.status() {
        ReportStatus::Rejected => {
            let reason = outcome
                .report
                .review()
                .and_then(|r| r.reason.clone())
                .unwrap_or_default();
            ValidatorError::Rejected { reason }.exit_code()
        }
        _ => 0,
    })
}

fn resolve_config(args: &RunArgs) -> Result<ValidatorConfig> {
    let mut config = ValidatorConfig::load(args.config.as_deref())?.with_env();
    if let Some(dir) = &args.output_dir {
        config = config.with_output_dir(dir.clone());
    }
    if let Some(workflow) = args.workflow {
        config = config.with_workflow(workflow);
    }
    if args.interactive {
        config = config.with_interactive(true);
    }
    if args.best_effort {
        config = config.with_failure_mode(FailureMode::BestEffort);
    }
    if args.parallel {
        config = config.with_execution_mode(ExecutionMode::Parallel);
    }
    config.debug |= args.debug;
    Ok(config)
}

fn read_json(path: &Path) -> Result<serde_json::Value> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let value = serde_json::from_str(&text)
        .map_err(ValidatorError::from)
        .with_context(|| format!("{} is not valid JSON", path.display()))?;
    Ok(value)
}

fn write_example(path: &Path) -> Result<()> {
    let body = serde_json::to_string_pretty(&json!({ "idea": sample_idea() }))?;
    std::fs::write(path, body + "\n")
        .with_context(|| format!("failed to write {}", path.display()))
}

fn write_summary(path: &Path, outcome: &RunOutcome) -> Result<()> {
    let report = &outcome.report;
    let stages: serde_json::Map<String, serde_json::Value> = report
        .stage_results()
        .iter()
        .map(|r| (r.stage().to_string(), r.payload().clone()))
        .collect();
    let summary = json!({
        "idea": report.idea(),
        "workflow": report.workflow(),
        "status": report.status(),
        "validation_score": report.score(),
        "score_band": report.score_band().label(),
        "recommendations": report.recommendations(),
        "results": stages,
        "report_path": outcome.report_path.display().to_string(),
    });
    let body = serde_json::to_string_pretty(&summary)?;
    std::fs::write(path, body + "\n").with_context(|| format!("failed to write {}", path.display()))
}

fn print_summary(report: &ValidationReport) {
    println!();
    println!("Validation summary for {}", report.idea().name);
    println!("Workflow: {}", report.workflow());
    println!("Status: {}", report.status());
    println!("Score: {} ({})", report.score(), report.score_band().label());
    if !report.failed_stages().is_empty() {
        let failed: Vec<String> = report.failed_stages().iter().map(ToString::to_string).collect();
        println!("Failed stages: {}", failed.join(", "));
    }
    println!("Top recommendations:");
    for (i, recommendation) in report
        .recommendations()
        .iter()
        .take(SUMMARY_RECOMMENDATIONS)
        .enumerate()
    {
        println!("  {}. {recommendation}", i + 1);
    }
}

fn print_rescored(report: &ValidationReport) {
    print_summary(report);
    let card = ScoreCard::evaluate(&Findings::collect(report.stage_results(), report.precursors()));
    println!("Score factors:");
    for factor in card.factors() {
        println!("  {:<20} {:+}", factor.factor, factor.points);
    }
    if card.score() != report.score() {
        println!(
            "Note: the current rules score this report {} ({})",
            card.score(),
            card.score().band().label()
        );
    }
}

fn format_cli_error(err: &anyhow::Error) -> String {
    match err.downcast_ref::<ValidatorError>() {
        Some(validator_err) => {
            let mut line = format!("[{}] {err:#}", validator_err.category());
            if let Some(hint) = validator_err.hint() {
                line.push_str("\nHint: ");
                line.push_str(&hint);
            }
            line
        }
        None => format!("[internal] {err:#}"),
    }
}

fn exit_code(err: &anyhow::Error) -> i32 {
    err.downcast_ref::<ValidatorError>()
        .map_or(1, ValidatorError::exit_code)
}
