//! Command implementations for the ctxrecon CLI

use crate::cli::Commands;
use crate::config::{ContextSpec, ReportFormat, RunConfig};
use crate::context::{ContextFactory, ContextRegistry};
use crate::data::list_namespace_files;
use crate::dispatcher::Dispatcher;
use crate::error::{ReconError, Result};
use crate::jobs::{JobConfig, JobSource, JsonJobSource};
use crate::output::{JsonFormatter, PrettyPrinter};
use crate::report::FileReportPublisher;
use indexmap::IndexMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Process exit code when the run completed but recorded failures
pub const EXIT_FAILURES_FOUND: i32 = 2;

/// Template file names written by `init`
pub const CONFIG_FILE_NAME: &str = "recon.json";
pub const JOBS_FILE_NAME: &str = "jobs.json";

/// Execute a command and return the process exit code
pub fn execute_command(command: Commands) -> Result<i32> {
    match command {
        Commands::Run {
            config,
            jobs,
            report,
            format,
            workers,
            timeout,
            progress,
            json,
        } => {
            let overrides = RunOverrides {
                jobs,
                report,
                format,
                workers,
                timeout_secs: timeout.map(|t| t as u64),
                progress,
            };
            run_command(&config, overrides, json)
        }
        Commands::Check { config } => check_command(&config).map(|_| 0),
        Commands::Init { dir, scan, force } => init_command(&dir, scan.as_deref(), force).map(|_| 0),
    }
}

/// Command-line values that take precedence over the configuration file
#[derive(Debug, Default)]
pub struct RunOverrides {
    pub jobs: Option<PathBuf>,
    pub report: Option<PathBuf>,
    pub format: Option<ReportFormat>,
    pub workers: Option<usize>,
    pub timeout_secs: Option<u64>,
    pub progress: bool,
}

impl RunOverrides {
    fn apply(self, config: &mut RunConfig) {
        if let Some(jobs) = self.jobs {
            config.jobs = Some(jobs);
        }
        if let Some(report) = self.report {
            config.report.file = Some(report);
        }
        if let Some(format) = self.format {
            config.report.format = Some(format);
        }
        if let Some(workers) = self.workers {
            config.workers = Some(workers);
        }
        if let Some(timeout) = self.timeout_secs {
            config.job_timeout_secs = Some(timeout);
        }
        if self.progress {
            config.show_progress = true;
        }
    }
}

fn job_source(config: &RunConfig) -> Result<JsonJobSource> {
    let path = config
        .jobs
        .as_ref()
        .ok_or_else(|| ReconError::config("No job file configured (set \"jobs\" or pass --jobs)"))?;
    Ok(JsonJobSource::new(path))
}

/// Compare both contexts
fn run_command(config_path: &Path, overrides: RunOverrides, json: bool) -> Result<i32> {
    let mut config = RunConfig::load(config_path)?;
    overrides.apply(&mut config);
    config.validate()?;

    let mut source = job_source(&config)?;
    let registry = Arc::new(ContextRegistry::from_specs(config.contexts.clone()));
    let dispatcher = Dispatcher::new(registry)
        .with_publisher(Arc::new(FileReportPublisher::new(config.report.format)));

    let outcome = match dispatcher.run(&config, &mut source)? {
        Some(outcome) => outcome,
        None => return Err(ReconError::RunInProgress),
    };

    if json {
        println!("{}", JsonFormatter::format_run_outcome(&outcome)?);
    } else {
        PrettyPrinter::print_run_outcome(&outcome);
    }

    Ok(if outcome.has_failures() {
        EXIT_FAILURES_FOUND
    } else {
        0
    })
}

/// Validate configuration without comparing anything
fn check_command(config_path: &Path) -> Result<()> {
    let config = RunConfig::load(config_path)?;
    let registry = ContextRegistry::from_specs(config.contexts.clone());

    for name in [&config.context1, &config.context2] {
        if registry.resolve(name).is_none() {
            return Err(ReconError::context_not_found(name.as_str()));
        }
    }

    let jobs = job_source(&config)?.load_jobs()?;
    let namespaces: Vec<String> = jobs.into_iter().map(|j| j.namespace).collect();
    PrettyPrinter::print_check_results(
        &config.context1,
        &config.context2,
        &namespaces,
        config.worker_count(),
    );
    Ok(())
}

/// Write template configuration and job files
fn init_command(dir: &Path, scan: Option<&Path>, force: bool) -> Result<()> {
    fs::create_dir_all(dir)?;
    let config_path = dir.join(CONFIG_FILE_NAME);
    let jobs_path = dir.join(JOBS_FILE_NAME);

    for path in [&config_path, &jobs_path] {
        if path.exists() && !force {
            return Err(ReconError::invalid_input(format!(
                "'{}' already exists. Use --force to overwrite it.",
                path.display()
            )));
        }
    }

    let config = template_config();
    fs::write(&config_path, serde_json::to_string_pretty(&config)?)?;

    let jobs = match scan {
        Some(data_dir) => {
            let namespaces = list_namespace_files(data_dir)?;
            log::info!("Found {} namespaces in {}", namespaces.len(), data_dir.display());
            namespaces.into_iter().map(JobConfig::new).collect()
        }
        None => vec![JobConfig::new("example_namespace")
            .with_count_columns(["row_total"])
            .with_reference_columns(["status"])],
    };
    JsonJobSource::write(&jobs_path, &jobs)?;

    println!("✅ Wrote {}", config_path.display());
    println!("✅ Wrote {} ({} jobs)", jobs_path.display(), jobs.len());
    Ok(())
}

/// Starting configuration written by `init`
pub fn template_config() -> RunConfig {
    let mut contexts = IndexMap::new();
    contexts.insert(
        "source".to_string(),
        ContextSpec::Directory {
            path: PathBuf::from("data/source"),
            key_columns: vec!["id".to_string()],
        },
    );
    contexts.insert(
        "target".to_string(),
        ContextSpec::Directory {
            path: PathBuf::from("data/target"),
            key_columns: vec!["id".to_string()],
        },
    );

    let mut config = RunConfig::new("source", "target");
    config.contexts = contexts;
    config.jobs = Some(PathBuf::from(JOBS_FILE_NAME));
    config.report.subtitle = Some("source vs target".to_string());
    config
}
