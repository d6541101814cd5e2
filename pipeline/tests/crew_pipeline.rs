//! Lifecycle tests driving the real pipeline end to end: SQLite ingestion,
//! a scripted transformation tool, and real quality checks, composed through
//! the crew and the workflow orchestrator.

use std::path::Path;

use serde_json::json;
use tempfile::TempDir;

use pipeline::agents::Agent;
use pipeline::agents::ingestion::IngestionAgent;
use pipeline::agents::quality::QualityAgent;
use pipeline::agents::transformation::TransformationAgent;
use pipeline::core::context::{CrewContext, TaskInput, WorkflowContext};
use pipeline::core::gate::data_quality_gate;
use pipeline::core::table::TableRef;
use pipeline::core::types::RunStatus;
use pipeline::crew::{Crew, CrewRunner, data_pipeline_crew};
use pipeline::io::checkpoint::{Checkpoint, load_checkpoint};
use pipeline::io::config::TransformConfig;
use pipeline::io::store::{SqliteStorage, Storage};
use pipeline::orchestrator::WorkflowOrchestrator;
use pipeline::test_support::{ScriptedInvoker, tool_success, write_csv_rows};

fn storage_in(temp: &TempDir) -> SqliteStorage {
    SqliteStorage::new(&temp.path().join("destination.db"))
}

/// The standard crew with real ingestion and quality against SQLite; the
/// transformation tool is scripted so no external binary is needed.
fn real_crew(temp: &TempDir, invoker: ScriptedInvoker) -> Crew {
    let config = TransformConfig {
        project_dir: temp.path().to_path_buf(),
        ..TransformConfig::default()
    };
    data_pipeline_crew(
        Agent::new(Box::new(IngestionAgent::new(Box::new(storage_in(temp))))),
        Agent::new(Box::new(TransformationAgent::new(Box::new(invoker), config))),
        Agent::new(Box::new(QualityAgent::new(Box::new(storage_in(temp))))),
    )
}

fn full_context(source: &Path, checkpoint: &Path) -> CrewContext {
    CrewContext::new()
        .with_task(
            "ingestion",
            TaskInput::new()
                .with("source_file", json!(source.to_str().expect("utf8 path")))
                .with("target_table", json!("raw.patients"))
                .with("batch_size", json!(30))
                .with(
                    "checkpoint_file",
                    json!(checkpoint.to_str().expect("utf8 path")),
                ),
        )
        .with_task("transformation", TaskInput::new().with("command", json!("run")))
        .with_task(
            "quality",
            TaskInput::new().with("table_name", json!("raw.patients")),
        )
}

#[test]
fn full_pipeline_ingests_transforms_and_checks() {
    let temp = tempfile::tempdir().expect("tempdir");
    let source = temp.path().join("patients.csv");
    let checkpoint = temp.path().join("checkpoint.json");
    write_csv_rows(&source, 100);

    let invoker = ScriptedInvoker::returning(tool_success("Completed successfully\n"));
    let requests = invoker.requests();
    let mut crew = real_crew(&temp, invoker);
    let context = full_context(&source, &checkpoint);

    let report = crew.kickoff(&context);

    assert_eq!(report.status, RunStatus::Success);
    assert!(report.failed_at.is_none());

    let ingestion = report.task_output("ingestion").expect("ingestion output");
    assert_eq!(ingestion["total_rows"], json!(100));
    assert_eq!(ingestion["rows_ingested"], json!(100));
    assert_eq!(ingestion["rows_failed"], json!(0));
    assert_eq!(ingestion["success_rate"], json!(1.0));

    assert_eq!(requests.borrow().len(), 1);
    assert_eq!(requests.borrow()[0].args, vec!["run".to_string()]);

    let quality = report.task_output("quality").expect("quality output");
    assert_eq!(quality["row_count"], json!(100));
    assert_eq!(quality["overall_score"], json!(1.0));
    assert_eq!(quality["passed"], json!(true));

    // Every committed row reached the destination and the checkpoint is
    // caught up.
    let table = TableRef::parse("raw.patients").expect("parse");
    let conn = storage_in(&temp).connect().expect("connect");
    assert_eq!(conn.count_rows(&table).expect("count"), 100);
    assert_eq!(
        load_checkpoint(&checkpoint).expect("load"),
        Some(Checkpoint { last_row: 100 })
    );
}

/// A second kickoff against a caught-up checkpoint re-runs the crew but
/// ingests nothing new.
#[test]
fn rerun_with_checkpoint_is_idempotent() {
    let temp = tempfile::tempdir().expect("tempdir");
    let source = temp.path().join("patients.csv");
    let checkpoint = temp.path().join("checkpoint.json");
    write_csv_rows(&source, 100);

    let invoker = ScriptedInvoker::returning(tool_success(""));
    let mut crew = real_crew(&temp, invoker);
    let context = full_context(&source, &checkpoint);

    let first = crew.kickoff(&context);
    assert_eq!(first.status, RunStatus::Success);

    let second = crew.kickoff(&context);
    assert_eq!(second.status, RunStatus::Success);
    let ingestion = second.task_output("ingestion").expect("ingestion output");
    assert_eq!(ingestion["rows_ingested"], json!(0));
    assert_eq!(ingestion["total_rows"], json!(100));

    let table = TableRef::parse("raw.patients").expect("parse");
    let conn = storage_in(&temp).connect().expect("connect");
    assert_eq!(conn.count_rows(&table).expect("count"), 100);
}

#[test]
fn failed_ingestion_stops_the_crew_before_the_tool_runs() {
    let temp = tempfile::tempdir().expect("tempdir");
    let invoker = ScriptedInvoker::returning(tool_success(""));
    let requests = invoker.requests();
    let mut crew = real_crew(&temp, invoker);

    let context = CrewContext::new()
        .with_task(
            "ingestion",
            TaskInput::new()
                .with("source_file", json!("/nonexistent/patients.csv"))
                .with("target_table", json!("raw.patients")),
        )
        .with_task("transformation", TaskInput::new().with("command", json!("run")))
        .with_task(
            "quality",
            TaskInput::new().with("table_name", json!("raw.patients")),
        );

    let report = crew.kickoff(&context);

    assert_eq!(report.status, RunStatus::Failed);
    assert_eq!(report.failed_at.as_deref(), Some("ingestion"));
    assert!(requests.borrow().is_empty());
    assert!(!report.results.contains_key("transformation"));
    assert!(!report.results.contains_key("quality"));
}

#[test]
fn orchestrated_run_passes_the_data_quality_gate() {
    let temp = tempfile::tempdir().expect("tempdir");
    let source = temp.path().join("patients.csv");
    let checkpoint = temp.path().join("checkpoint.json");
    write_csv_rows(&source, 50);

    let crew = real_crew(&temp, ScriptedInvoker::returning(tool_success("")));
    let mut orchestrator =
        WorkflowOrchestrator::new().with_stage(Box::new(crew), Some(data_quality_gate()));
    let workflow_context = WorkflowContext::new()
        .with_crew("data-pipeline", full_context(&source, &checkpoint));

    let report = orchestrator.run(&workflow_context);

    assert_eq!(report.workflow_status, RunStatus::Success);
    assert_eq!(report.crews_executed, 1);
    assert_eq!(report.crews_succeeded, 1);
    let gate = report.crew_reports[0].gate.as_ref().expect("gate");
    assert!(gate.met);
    assert_eq!(gate.observed, 1.0);
    assert_eq!(gate.metric, "overall_score");
}

/// Null-heavy data fails the crew's quality post-condition, which surfaces as
/// a workflow failure, not a gate stop.
#[test]
fn low_quality_data_fails_the_orchestrated_run() {
    let temp = tempfile::tempdir().expect("tempdir");
    let source = temp.path().join("patients.csv");
    let checkpoint = temp.path().join("checkpoint.json");
    // Half the age fields are empty, so completeness lands at 0.75 and the
    // overall score at 0.875, below the 0.90 threshold.
    let mut contents = String::from("subject_id,age\n");
    for i in 1..=40 {
        if i % 2 == 0 {
            contents.push_str(&format!("{i},\n"));
        } else {
            contents.push_str(&format!("{i},{}\n", 40 + i));
        }
    }
    std::fs::write(&source, contents).expect("write csv");

    let crew = real_crew(&temp, ScriptedInvoker::returning(tool_success("")));
    let mut orchestrator =
        WorkflowOrchestrator::new().with_stage(Box::new(crew), Some(data_quality_gate()));
    let workflow_context = WorkflowContext::new()
        .with_crew("data-pipeline", full_context(&source, &checkpoint));

    let report = orchestrator.run(&workflow_context);

    assert_eq!(report.workflow_status, RunStatus::Failed);
    assert_eq!(
        report.crew_reports[0].report.failed_at.as_deref(),
        Some("quality")
    );
    let quality = report.crew_reports[0]
        .report
        .task_output("quality")
        .expect("quality output");
    assert_eq!(quality["passed"], json!(false));
}
