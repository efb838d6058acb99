mod config;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use pmpedia_extract::{
    preflight_documents, run_phase1, run_phase2, Phase1Options, Phase1Report, Phase2Options,
    Phase2Report,
};
use pmpedia_gemini_adapter::GeminiExtractionService;
use pmpedia_storage::LoadReport;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::{load_file_config, require_api_key, resolve, Overrides, Settings};

#[derive(Parser)]
#[command(name = "pmpedia")]
#[command(about = "Extract project snippets from documents and merge them per project", long_about = None)]
struct Cli {
    /// TOML config file (defaults to ./pmpedia.toml when present)
    #[arg(long, global = true, env = "PMPEDIA_CONFIG")]
    config: Option<PathBuf>,
    #[arg(long, global = true, env = "LANGEXTRACT_API_KEY", hide_env_values = true)]
    api_key: Option<String>,
    #[arg(long, global = true)]
    model_id: Option<String>,
    #[arg(long, global = true)]
    phase1_dir: Option<PathBuf>,
    #[arg(long, global = true)]
    phase2_dir: Option<PathBuf>,
    #[arg(long, global = true, default_value_t = false)]
    debug: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug, Clone, Default)]
struct DocumentArgs {
    /// Input documents; replaces the `documents` list from the config file
    documents: Vec<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Triage documents and extract snippets from the relevant ones
    Phase1(DocumentArgs),
    /// Merge phase-1 artifacts into unified projects
    Phase2,
    /// Phase 1 followed by phase 2
    Run(DocumentArgs),
}

fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    init_logging(cli.debug);

    match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{}", failure_message(&err));
            ExitCode::FAILURE
        }
    }
}

/// Full context chain on one line; printed once, outside the log stream.
fn failure_message(err: &anyhow::Error) -> String {
    format!("error: {err:#}")
}

fn init_logging(debug: bool) {
    let level = if let Ok(level) = std::env::var("PMPEDIA_LOG_LEVEL") {
        level
    } else if debug {
        "debug".to_string()
    } else {
        "info".to_string()
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn run(cli: Cli) -> Result<ExitCode> {
    let file = load_file_config(cli.config.as_deref())?;
    let documents = match &cli.command {
        Commands::Phase1(args) | Commands::Run(args) => args.documents.clone(),
        Commands::Phase2 => Vec::new(),
    };
    let settings = resolve(
        file,
        Overrides {
            documents,
            phase1_dir: cli.phase1_dir,
            phase2_dir: cli.phase2_dir,
            model_id: cli.model_id,
        },
    );

    let api_key = require_api_key(cli.api_key)?;
    if !matches!(cli.command, Commands::Phase2) {
        preflight_documents(&settings.documents)?;
    }
    let service = GeminiExtractionService::new(settings.gemini(api_key))
        .context("failed to initialise the extraction service")?;
    info!(
        event = "pmpedia_started",
        model = %settings.model_id,
        documents = settings.documents.len(),
        phase1_dir = %settings.layout.phase1_dir.display(),
        phase2_dir = %settings.layout.phase2_dir.display()
    );

    match cli.command {
        Commands::Phase1(_) => {
            let report = phase1(&service, &settings)?;
            Ok(exit_code(&report))
        }
        Commands::Phase2 => {
            phase2(&service, &settings)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Run(_) => {
            let report = phase1(&service, &settings)?;
            phase2(&service, &settings)?;
            Ok(exit_code(&report))
        }
    }
}

fn phase1(service: &GeminiExtractionService, settings: &Settings) -> Result<Phase1Report> {
    let options = Phase1Options {
        documents: settings.documents.clone(),
        layout: settings.layout.clone(),
    };
    let report = run_phase1(service, &options, Utc::now()).context("phase 1 failed")?;
    report.log_details();

    let summary = &report.summary;
    println!(
        "phase 1: {}/{} documents processed, {} failed; summary at {}",
        summary.processed_documents,
        summary.total_documents,
        summary.failures.len(),
        report.summary_path.display()
    );
    Ok(report)
}

fn phase2(service: &GeminiExtractionService, settings: &Settings) -> Result<Phase2Report> {
    let options = Phase2Options {
        layout: settings.layout.clone(),
        association: settings.association(),
    };
    let report = run_phase2(service, &options, Utc::now()).context("phase 2 failed")?;

    let metadata = &report.outcome.result.extraction_metadata;
    println!(
        "phase 2: {} projects, {} snippets attached from {} files; written to {}",
        metadata.projects_count,
        metadata.total_snippets,
        metadata.processed_files,
        report.output_path.display()
    );
    for project in &report.outcome.result.unified_projects {
        println!(
            "  {} {} [{}] {} snippets",
            project.project_id,
            project.project_name,
            project.status,
            project.information_snippets.len()
        );
    }
    for line in load_problems(&report.outcome.load_report) {
        println!("  {line}");
    }
    Ok(report)
}

fn load_problems(report: &LoadReport) -> Vec<String> {
    let unreadable = report
        .unreadable_files
        .iter()
        .map(|file| format!("unreadable {}: {}", file.file.display(), file.error));
    let skipped = report.skipped.iter().map(|record| {
        format!(
            "skipped {}:{}: {}",
            record.file.display(),
            record.line_number,
            record.reason
        )
    });
    unreadable.chain(skipped).collect()
}

fn exit_code(report: &Phase1Report) -> ExitCode {
    if report.has_failures() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
