//! Command-line interface for ctxrecon

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "ctxrecon")]
#[command(about = "Reconcile two datasets namespace by namespace")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Compare both contexts and publish a report
    Run {
        /// Run configuration file
        #[arg(long, short)]
        config: PathBuf,

        /// Override the job-queue file
        #[arg(long)]
        jobs: Option<PathBuf>,

        /// Override the report destination
        #[arg(long)]
        report: Option<PathBuf>,

        /// Report format: "html" or "json" (defaults to the report file extension)
        #[arg(long, value_parser = parse_report_format)]
        format: Option<crate::config::ReportFormat>,

        /// Worker pool size (must be > 0)
        #[arg(long, value_parser = validate_positive)]
        workers: Option<usize>,

        /// Per-namespace deadline in seconds (must be > 0)
        #[arg(long, value_parser = validate_positive)]
        timeout: Option<usize>,

        /// Show a progress bar
        #[arg(long)]
        progress: bool,

        /// Print the run summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// Validate configuration, resolve both contexts and read the jobs without comparing
    Check {
        /// Run configuration file
        #[arg(long, short)]
        config: PathBuf,
    },

    /// Write a template configuration and job file
    Init {
        /// Directory to write into
        #[arg(long, default_value = ".")]
        dir: PathBuf,

        /// Data directory to scan for namespaces when writing the job file
        #[arg(long)]
        scan: Option<PathBuf>,

        /// Overwrite existing files
        #[arg(long)]
        force: bool,
    },
}

fn parse_report_format(s: &str) -> Result<crate::config::ReportFormat, String> {
    crate::config::ReportFormat::parse(s)
}

/// Validate that a count is greater than 0
fn validate_positive(s: &str) -> Result<usize, String> {
    let value: usize = s
        .parse()
        .map_err(|_| format!("Invalid value: '{}'. Must be a positive integer.", s))?;

    if value == 0 {
        return Err("Value must be greater than 0".to_string());
    }

    Ok(value)
}
