//! Agent-based data pipeline CLI.
//!
//! Single-task subcommands (`ingest`, `transform`, `quality`) run the
//! data-pipeline crew with one present context key; `run` executes the full
//! pipeline from a context document through the workflow orchestrator.
//! Reports print to stdout as pretty JSON; exit codes follow `exit_codes`.

use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::{Value, json};

use pipeline::agents::Agent;
use pipeline::agents::ingestion::IngestionAgent;
use pipeline::agents::quality::QualityAgent;
use pipeline::agents::transformation::TransformationAgent;
use pipeline::core::context::{CrewContext, TaskInput, WorkflowContext};
use pipeline::core::gate::data_quality_gate;
use pipeline::core::types::RunStatus;
use pipeline::crew::{Crew, CrewRunner, data_pipeline_crew};
use pipeline::exit_codes;
use pipeline::io::config::{PipelineConfig, load_config};
use pipeline::io::context::load_crew_context;
use pipeline::io::invoker::ProcessToolInvoker;
use pipeline::io::store::SqliteStorage;
use pipeline::logging;
use pipeline::orchestrator::WorkflowOrchestrator;

#[derive(Parser)]
#[command(
    name = "pipeline",
    version,
    about = "Agent-based data pipeline with checkpointed batch ingestion"
)]
struct Cli {
    /// Configuration file (missing file uses defaults).
    #[arg(long, global = true, default_value = "pipeline.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Load a CSV source into the destination store.
    Ingest {
        /// Source CSV file.
        #[arg(long)]
        source: PathBuf,
        /// Destination table in `schema.table` form.
        #[arg(long)]
        table: String,
        /// Rows per transactional chunk.
        #[arg(long)]
        batch_size: Option<u64>,
        /// Checkpoint file enabling resumable runs.
        #[arg(long)]
        checkpoint: Option<PathBuf>,
    },
    /// Run the transformation tool against the project's models.
    Transform {
        /// Tool subcommand, e.g. `run` or `test`.
        #[arg(long, default_value = "run")]
        command: String,
        /// Model selectors passed to the tool as `--models`.
        #[arg(long, num_args = 1..)]
        models: Vec<String>,
        /// Variables passed to the tool as a JSON object.
        #[arg(long)]
        vars: Option<String>,
    },
    /// Score a destination table on data quality checks.
    Quality {
        /// Table to check, in `schema.table` form.
        #[arg(long)]
        table: String,
        /// Checks to run (default: completeness, uniqueness).
        #[arg(long, num_args = 1..)]
        checks: Vec<String>,
        /// Key column for the uniqueness check.
        #[arg(long)]
        key_column: Option<String>,
    },
    /// Run the full data pipeline from a crew context document.
    Run {
        /// Crew context document (JSON, schema-validated).
        #[arg(long)]
        context: PathBuf,
        /// Also write the workflow report to this path.
        #[arg(long)]
        report: Option<PathBuf>,
    },
}

fn main() {
    logging::init();
    match run() {
        Ok(code) => process::exit(code),
        Err(err) => {
            eprintln!("{err:#}");
            process::exit(exit_codes::INVALID);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    let config = load_config(&cli.config)?;
    match cli.command {
        Command::Ingest {
            source,
            table,
            batch_size,
            checkpoint,
        } => cmd_single_task(&config, "ingestion", {
            let mut input = TaskInput::new()
                .with("source_file", path_value(&source)?)
                .with("target_table", json!(table));
            if let Some(batch_size) = batch_size {
                input = input.with("batch_size", json!(batch_size));
            }
            if let Some(checkpoint) = checkpoint {
                input = input.with("checkpoint_file", path_value(&checkpoint)?);
            }
            input
        }),
        Command::Transform {
            command,
            models,
            vars,
        } => {
            let mut input = TaskInput::new().with("command", json!(command));
            if !models.is_empty() {
                input = input.with("models", json!(models));
            }
            if let Some(vars) = vars {
                let vars: Value =
                    serde_json::from_str(&vars).context("parse --vars as json")?;
                input = input.with("vars", vars);
            }
            cmd_single_task(&config, "transformation", input)
        }
        Command::Quality {
            table,
            checks,
            key_column,
        } => {
            let mut input = TaskInput::new().with("table_name", json!(table));
            if !checks.is_empty() {
                input = input.with("checks", json!(checks));
            }
            if let Some(key_column) = key_column {
                input = input.with("key_column", json!(key_column));
            }
            cmd_single_task(&config, "quality", input)
        }
        Command::Run { context, report } => cmd_run(&config, &context, report.as_deref()),
    }
}

/// Run the data-pipeline crew with a single present task and report it.
fn cmd_single_task(config: &PipelineConfig, task: &str, input: TaskInput) -> Result<i32> {
    let mut crew = build_crew(config);
    let context = CrewContext::new().with_task(task, input);
    let report = crew.kickoff(&context);
    print_json(&report)?;
    Ok(if report.is_success() {
        exit_codes::OK
    } else {
        exit_codes::FAILED
    })
}

fn cmd_run(config: &PipelineConfig, context_path: &Path, report_path: Option<&Path>) -> Result<i32> {
    let crew_context = load_crew_context(context_path)?;
    let mut orchestrator = WorkflowOrchestrator::new()
        .with_stage(Box::new(build_crew(config)), Some(data_quality_gate()));
    let workflow_context = WorkflowContext::new().with_crew("data-pipeline", crew_context);

    let report = orchestrator.run(&workflow_context);
    print_json(&report)?;
    if let Some(path) = report_path {
        write_json(path, &report)?;
    }
    Ok(match report.workflow_status {
        RunStatus::Success => exit_codes::OK,
        RunStatus::Failed => exit_codes::FAILED,
        RunStatus::PartialSuccess => exit_codes::PARTIAL,
    })
}

/// Wire the standard data-pipeline crew from configuration.
fn build_crew(config: &PipelineConfig) -> Crew {
    let storage = SqliteStorage::new(&config.database_path);
    let ingestion = Agent::new(Box::new(
        IngestionAgent::new(Box::new(storage.clone()))
            .with_default_batch_size(config.ingest.batch_size)
            .with_max_retries(config.ingest.max_retries),
    ));
    let transformation = Agent::new(Box::new(TransformationAgent::new(
        Box::new(ProcessToolInvoker),
        config.transform.clone(),
    )));
    let quality = Agent::new(Box::new(QualityAgent::new(Box::new(storage))));
    data_pipeline_crew(ingestion, transformation, quality)
}

fn path_value(path: &Path) -> Result<Value> {
    let text = path
        .to_str()
        .ok_or_else(|| anyhow!("path {} is not valid utf-8", path.display()))?;
    Ok(json!(text))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("serialize report")?
    );
    Ok(())
}

/// Write `value` as pretty JSON with a trailing newline, atomically.
fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let mut payload = serde_json::to_string_pretty(value).context("serialize report")?;
    payload.push('\n');
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
    }
    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, payload)
        .with_context(|| format!("write temp report {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace report {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_ingest_with_checkpoint() {
        let cli = Cli::parse_from([
            "pipeline",
            "ingest",
            "--source",
            "data/patients.csv",
            "--table",
            "raw.patients",
            "--batch-size",
            "500",
            "--checkpoint",
            "checkpoints/patients.json",
        ]);
        let Command::Ingest {
            source,
            table,
            batch_size,
            checkpoint,
        } = cli.command
        else {
            panic!("expected ingest command");
        };
        assert_eq!(source, PathBuf::from("data/patients.csv"));
        assert_eq!(table, "raw.patients");
        assert_eq!(batch_size, Some(500));
        assert_eq!(checkpoint, Some(PathBuf::from("checkpoints/patients.json")));
    }

    #[test]
    fn parse_transform_defaults_to_run() {
        let cli = Cli::parse_from(["pipeline", "transform"]);
        let Command::Transform {
            command,
            models,
            vars,
        } = cli.command
        else {
            panic!("expected transform command");
        };
        assert_eq!(command, "run");
        assert!(models.is_empty());
        assert_eq!(vars, None);
    }

    #[test]
    fn parse_transform_with_models() {
        let cli = Cli::parse_from([
            "pipeline",
            "transform",
            "--command",
            "test",
            "--models",
            "staging",
            "marts",
        ]);
        let Command::Transform { command, models, .. } = cli.command else {
            panic!("expected transform command");
        };
        assert_eq!(command, "test");
        assert_eq!(models, vec!["staging".to_string(), "marts".to_string()]);
    }

    #[test]
    fn parse_run_with_report() {
        let cli = Cli::parse_from([
            "pipeline",
            "--config",
            "custom.toml",
            "run",
            "--context",
            "context.json",
            "--report",
            "report.json",
        ]);
        assert_eq!(cli.config, PathBuf::from("custom.toml"));
        let Command::Run { context, report } = cli.command else {
            panic!("expected run command");
        };
        assert_eq!(context, PathBuf::from("context.json"));
        assert_eq!(report, Some(PathBuf::from("report.json")));
    }

    #[test]
    fn global_config_works_after_the_subcommand() {
        let cli = Cli::parse_from([
            "pipeline",
            "quality",
            "--table",
            "raw.patients",
            "--config",
            "custom.toml",
        ]);
        assert_eq!(cli.config, PathBuf::from("custom.toml"));
    }
}
