//! Console output formatting

use crate::dispatcher::RunOutcome;
use crate::error::Result;
use crate::report::Report;
use crate::sink::{Category, Status};

/// Maximum failure lines printed per category
const FAILURE_SAMPLE: usize = 3;

/// Pretty printer for ctxrecon output
pub struct PrettyPrinter;

impl PrettyPrinter {
    /// Print the outcome of a run
    pub fn print_run_outcome(outcome: &RunOutcome) {
        let report = &outcome.report;
        println!("🔍 Context comparison: {} → {}", report.context1, report.context2);
        println!("├─ Run: {}", outcome.run_id);
        println!("├─ Namespaces compared: {}", outcome.jobs_run);
        if outcome.jobs_skipped > 0 {
            println!("├─ Duplicate records skipped: {}", outcome.jobs_skipped);
        }

        Self::print_categories(report, "│  ");

        println!("├─ Digest: {}", report.digest);
        println!("└─ Report: {}", outcome.destination.display());

        if report.has_failures() {
            println!();
            println!("❌ {} failed checks", report.summary.total_failed());
        } else {
            println!();
            println!("✅ All namespaces reconciled");
        }
    }

    fn print_categories(report: &Report, prefix: &str) {
        println!("├─ Checks:");
        let used: Vec<Category> = Category::ALL
            .into_iter()
            .filter(|c| report.summary.counts(*c).total() > 0)
            .collect();

        for (i, category) in used.iter().enumerate() {
            let counts = report.summary.counts(*category);
            let marker = if i == used.len() - 1 { "└─" } else { "├─" };
            let icon = if counts.failed > 0 { "❌" } else { "✅" };
            let mut line = format!(
                "{}{} {} {}: {} passed, {} failed",
                prefix,
                marker,
                icon,
                category.label(),
                counts.passed,
                counts.failed
            );
            if counts.skipped > 0 {
                line.push_str(&format!(", {} skipped", counts.skipped));
            }
            println!("{}", line);

            let continuation = if i == used.len() - 1 { "   " } else { "│  " };
            let failures: Vec<_> = report.results[category]
                .iter()
                .filter(|e| e.status == Status::Failed)
                .collect();
            for entry in failures.iter().take(FAILURE_SAMPLE) {
                println!(
                    "{}{}└─ {}: {}",
                    prefix,
                    continuation,
                    entry.namespace,
                    entry.detail.as_deref().unwrap_or("")
                );
            }
            if failures.len() > FAILURE_SAMPLE {
                println!(
                    "{}{}   ... and {} more",
                    prefix,
                    continuation,
                    failures.len() - FAILURE_SAMPLE
                );
            }
        }
    }

    /// Print validated configuration details for `check`
    pub fn print_check_results(context1: &str, context2: &str, namespaces: &[String], workers: usize) {
        println!("✅ Configuration is valid");
        println!("├─ Context 1: {}", context1);
        println!("├─ Context 2: {}", context2);
        println!("├─ Workers: {}", workers);
        println!("└─ Jobs: {}", namespaces.len());
        for (i, namespace) in namespaces.iter().enumerate() {
            let marker = if i == namespaces.len() - 1 { "└─" } else { "├─" };
            println!("   {} {}", marker, namespace);
        }
    }
}

/// JSON formatter for machine-readable output
pub struct JsonFormatter;

impl JsonFormatter {
    /// Format any serializable data as JSON
    pub fn format<T: serde::Serialize + ?Sized>(data: &T) -> Result<String> {
        Ok(serde_json::to_string_pretty(data)?)
    }

    /// Format a run outcome as JSON
    pub fn format_run_outcome(outcome: &RunOutcome) -> Result<String> {
        let json = serde_json::json!({
            "run_id": outcome.run_id,
            "report": outcome.destination,
            "jobs_run": outcome.jobs_run,
            "jobs_skipped": outcome.jobs_skipped,
            "digest": outcome.report.digest,
            "has_failures": outcome.has_failures(),
            "summary": outcome.summary(),
        });
        Ok(serde_json::to_string_pretty(&json)?)
    }
}
