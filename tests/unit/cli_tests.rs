//! Argument parsing for the ctxrecon CLI

use clap::Parser;
use ctxrecon::cli::{Cli, Commands};
use ctxrecon::config::ReportFormat;
use std::path::PathBuf;

#[test]
fn test_run_defaults() {
    let cli = Cli::try_parse_from(["ctxrecon", "run", "-c", "recon.json"]).unwrap();
    assert!(!cli.verbose);
    match cli.command {
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
            assert_eq!(config, PathBuf::from("recon.json"));
            assert!(jobs.is_none());
            assert!(report.is_none());
            assert!(format.is_none());
            assert!(workers.is_none());
            assert!(timeout.is_none());
            assert!(!progress);
            assert!(!json);
        }
        _ => panic!("expected run command"),
    }
}

#[test]
fn test_run_with_all_overrides() {
    let cli = Cli::try_parse_from([
        "ctxrecon",
        "--verbose",
        "run",
        "--config",
        "recon.json",
        "--jobs",
        "nightly.json",
        "--report",
        "out/report.html",
        "--format",
        "HTML",
        "--workers",
        "3",
        "--timeout",
        "45",
        "--progress",
        "--json",
    ])
    .unwrap();
    assert!(cli.verbose);
    match cli.command {
        Commands::Run {
            jobs,
            report,
            format,
            workers,
            timeout,
            progress,
            json,
            ..
        } => {
            assert_eq!(jobs, Some(PathBuf::from("nightly.json")));
            assert_eq!(report, Some(PathBuf::from("out/report.html")));
            assert_eq!(format, Some(ReportFormat::Html));
            assert_eq!(workers, Some(3));
            assert_eq!(timeout, Some(45));
            assert!(progress);
            assert!(json);
        }
        _ => panic!("expected run command"),
    }
}

#[test]
fn test_verbose_after_subcommand() {
    let cli = Cli::try_parse_from(["ctxrecon", "check", "-c", "recon.json", "-v"]).unwrap();
    assert!(cli.verbose);
    assert!(matches!(cli.command, Commands::Check { .. }));
}

#[test]
fn test_invalid_values_rejected() {
    assert!(Cli::try_parse_from(["ctxrecon", "run", "-c", "r.json", "--format", "xml"]).is_err());
    assert!(Cli::try_parse_from(["ctxrecon", "run", "-c", "r.json", "--timeout", "0"]).is_err());
    assert!(Cli::try_parse_from(["ctxrecon", "run", "-c", "r.json", "--workers", "many"]).is_err());
    assert!(Cli::try_parse_from(["ctxrecon", "run"]).is_err());
}

#[test]
fn test_init_defaults() {
    let cli = Cli::try_parse_from(["ctxrecon", "init"]).unwrap();
    match cli.command {
        Commands::Init { dir, scan, force } => {
            assert_eq!(dir, PathBuf::from("."));
            assert!(scan.is_none());
            assert!(!force);
        }
        _ => panic!("expected init command"),
    }
}
