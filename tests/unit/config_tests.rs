//! Run configuration loading and job-queue parsing

use ctxrecon::config::{ReportFormat, RunConfig};
use ctxrecon::{ContextSpec, JobSource, JsonJobSource, ReconError};
use std::fs;
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;

#[test]
fn test_load_full_config() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("recon.json");
    fs::write(
        &path,
        r#"{
            "context1": "legacy",
            "context2": "migrated",
            "contexts": {
                "legacy": {"type": "directory", "path": "exports/legacy", "key_columns": ["region", "id"]},
                "migrated": {"type": "database", "path": "warehouse.duckdb", "key_columns": ["region", "id"]}
            },
            "jobs": "jobs.json",
            "report": {
                "title": "Migration check",
                "subtitle": "week 42",
                "file": "reports/out.json",
                "options": {"comments": false}
            },
            "workers": 6,
            "job_timeout_secs": 120,
            "show_progress": true
        }"#,
    )
    .unwrap();

    let config = RunConfig::load(&path).unwrap();
    assert_eq!(config.worker_count(), 6);
    assert_eq!(config.job_timeout(), Some(Duration::from_secs(120)));
    assert!(config.show_progress);
    assert_eq!(config.report.title, "Migration check");
    assert_eq!(config.report.subtitle.as_deref(), Some("week 42"));
    assert!(!config.report.options.comments);
    assert!(config.report.options.header);

    let destination = config.report_destination();
    assert_eq!(destination, temp_dir.path().join("reports/out.json"));
    assert_eq!(config.report.resolved_format(&destination), ReportFormat::Json);

    let names: Vec<_> = config.contexts.keys().cloned().collect();
    assert_eq!(names, vec!["legacy", "migrated"]);
    assert!(matches!(config.contexts["migrated"], ContextSpec::Database { .. }));
    assert_eq!(config.contexts["legacy"].key_columns(), ["region", "id"]);
}

#[test]
fn test_load_errors() {
    let temp_dir = TempDir::new().unwrap();

    let missing = RunConfig::load(&temp_dir.path().join("nope.json"));
    assert!(matches!(missing, Err(ReconError::Config { .. })));

    let path = temp_dir.path().join("bad.json");
    fs::write(&path, "{ not json").unwrap();
    assert!(matches!(RunConfig::load(&path), Err(ReconError::Config { .. })));

    fs::write(
        &path,
        r#"{"context1": "a", "context2": "b",
            "contexts": {"a": {"type": "directory", "path": "a", "key_columns": []}}}"#,
    )
    .unwrap();
    assert!(RunConfig::load(&path).is_err());

    fs::write(&path, r#"{"context1": "a", "context2": "b", "job_timeout_secs": 0}"#).unwrap();
    assert!(RunConfig::load(&path).is_err());
}

#[test]
fn test_explicit_format_wins_over_extension() {
    let mut config = RunConfig::new("a", "b");
    config.report.format = Some(ReportFormat::Json);
    assert_eq!(
        config.report.resolved_format(Path::new("report.html")),
        ReportFormat::Json
    );
    assert!(config
        .report_destination()
        .to_string_lossy()
        .ends_with(".json"));
}

#[test]
fn test_json_job_file_array_and_lines() {
    let temp_dir = TempDir::new().unwrap();

    let array = temp_dir.path().join("array.json");
    fs::write(
        &array,
        r#"[
            {"name": "orders", "countColumns": ["qty"], "refColumns": ["status"], "tolerancePercent": 2},
            {"name": "users", "refColumns": ["email"], "tolerancePercent": "0.5"}
        ]"#,
    )
    .unwrap();
    let jobs = JsonJobSource::new(&array).load_jobs().unwrap();
    assert_eq!(jobs.len(), 2);
    assert_eq!(jobs[0].count_columns, vec!["qty"]);
    assert_eq!(jobs[0].tolerance_percent, Some(2.0));
    assert!(jobs[1].count_columns.is_empty());
    assert_eq!(jobs[1].tolerance_percent, Some(0.5));

    let lines = temp_dir.path().join("lines.jsonl");
    fs::write(
        &lines,
        "# nightly queue\n{\"name\": \"orders\"}\n\n{\"name\": \"users\", \"tolerancePercent\": \"lots\"}\n",
    )
    .unwrap();
    let jobs = JsonJobSource::new(&lines).load_jobs().unwrap();
    let names: Vec<_> = jobs.iter().map(|j| j.namespace.as_str()).collect();
    assert_eq!(names, vec!["orders", "users"]);
    // unparseable tolerance falls back to the run default
    assert_eq!(jobs[1].tolerance_percent, None);
    assert_eq!(jobs[1].tolerance(3.0), 3.0);
}

#[test]
fn test_json_job_file_errors() {
    let temp_dir = TempDir::new().unwrap();

    let missing = JsonJobSource::new(temp_dir.path().join("missing.json")).load_jobs();
    assert!(missing.is_err());

    let path = temp_dir.path().join("jobs.json");
    fs::write(&path, r#"[{"name": ""}]"#).unwrap();
    assert!(JsonJobSource::new(&path).load_jobs().is_err());
}
