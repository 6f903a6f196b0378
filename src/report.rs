//! Report model and publishers

use crate::config::{ReportConfig, ReportFormat, ReportOptions};
use crate::error::{ReconError, Result};
use crate::sink::{CategorizedResults, Category, ResultEntry, ResultSink, RunSummary};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::fs;
use std::path::Path;
use uuid::Uuid;

/// Final categorized outcome of a run, ready to render
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub format_version: String,
    pub title: String,
    pub subtitle: Option<String>,
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub context1: String,
    pub context2: String,
    pub namespaces: usize,
    /// Order-independent digest of all entries
    pub digest: String,
    pub summary: RunSummary,
    pub results: CategorizedResults,
    pub options: ReportOptions,
}

impl Report {
    pub fn from_sink(
        config: &ReportConfig,
        run_id: Uuid,
        context1: &str,
        context2: &str,
        namespaces: usize,
        sink: &ResultSink,
    ) -> Self {
        Self {
            format_version: crate::FORMAT_VERSION.to_string(),
            title: config.title.clone(),
            subtitle: config.subtitle.clone(),
            run_id,
            generated_at: Utc::now(),
            context1: context1.to_string(),
            context2: context2.to_string(),
            namespaces,
            digest: sink.digest(),
            summary: sink.summary(),
            results: sink.categorized(),
            options: config.options,
        }
    }

    /// All entries in category order
    pub fn entries(&self) -> impl Iterator<Item = &ResultEntry> {
        self.results.values().flatten()
    }

    pub fn entries_for<'a>(&'a self, namespace: &'a str) -> impl Iterator<Item = &'a ResultEntry> + 'a {
        self.entries().filter(move |e| e.namespace == namespace)
    }

    pub fn has_failures(&self) -> bool {
        self.summary.has_failures()
    }
}

/// Renders a report to a durable artifact
pub trait ReportPublisher: Send + Sync {
    fn publish(&self, report: &Report, destination: &Path) -> Result<()>;
}

/// Writes a self-contained HTML page
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlReportPublisher;

impl HtmlReportPublisher {
    pub fn render(report: &Report) -> String {
        let options = report.options;
        let mut html = String::new();

        html.push_str("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n");
        let _ = writeln!(html, "<title>{}</title>", escape_html(&report.title));
        html.push_str(STYLE);
        html.push_str("</head>\n<body>\n");

        if options.header {
            let _ = writeln!(html, "<h1>{}</h1>", escape_html(&report.title));
            if let Some(subtitle) = &report.subtitle {
                let _ = writeln!(html, "<h2>{}</h2>", escape_html(subtitle));
            }
            let _ = writeln!(
                html,
                "<p class=\"meta\">{} vs {} &middot; {} namespaces &middot; generated {} &middot; run {}</p>",
                escape_html(&report.context1),
                escape_html(&report.context2),
                report.namespaces,
                report.generated_at.format("%Y-%m-%d %H:%M:%S UTC"),
                report.run_id
            );
            Self::render_summary(&mut html, report);
        }

        if options.categorize {
            for (category, entries) in &report.results {
                if entries.is_empty() {
                    continue;
                }
                let _ = writeln!(html, "<h3>{}</h3>", escape_html(category.label()));
                Self::render_table(&mut html, entries.iter(), options, false);
            }
        } else {
            Self::render_table(&mut html, report.entries(), options, true);
        }

        let _ = writeln!(html, "<p class=\"meta\">digest {}</p>", report.digest);
        html.push_str("</body>\n</html>\n");
        html
    }

    fn render_summary(html: &mut String, report: &Report) {
        html.push_str("<table class=\"summary\">\n<tr><th>Category</th><th>Passed</th><th>Failed</th><th>Skipped</th></tr>\n");
        for category in Category::ALL {
            let counts = report.summary.counts(category);
            if counts.total() == 0 {
                continue;
            }
            let _ = writeln!(
                html,
                "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
                escape_html(category.label()),
                counts.passed,
                counts.failed,
                counts.skipped
            );
        }
        html.push_str("</table>\n");
    }

    fn render_table<'a>(
        html: &mut String,
        entries: impl Iterator<Item = &'a ResultEntry>,
        options: ReportOptions,
        with_category: bool,
    ) {
        html.push_str("<table>\n<tr><th>Namespace</th>");
        if with_category {
            html.push_str("<th>Category</th>");
        }
        if options.status {
            html.push_str("<th>Status</th>");
        }
        if options.comments {
            html.push_str("<th>Comments</th>");
        }
        html.push_str("</tr>\n");

        for entry in entries {
            let _ = write!(html, "<tr><td>{}</td>", escape_html(&entry.namespace));
            if with_category {
                let _ = write!(html, "<td>{}</td>", escape_html(entry.category.label()));
            }
            if options.status {
                let _ = write!(
                    html,
                    "<td class=\"{}\">{}</td>",
                    entry.status.label().to_lowercase(),
                    entry.status.label()
                );
            }
            if options.comments {
                let _ = write!(
                    html,
                    "<td>{}</td>",
                    escape_html(entry.detail.as_deref().unwrap_or(""))
                );
            }
            html.push_str("</tr>\n");
        }
        html.push_str("</table>\n");
    }
}

impl ReportPublisher for HtmlReportPublisher {
    fn publish(&self, report: &Report, destination: &Path) -> Result<()> {
        write_artifact(destination, Self::render(report).as_bytes())
    }
}

/// Writes the report model as pretty JSON
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonReportPublisher;

impl ReportPublisher for JsonReportPublisher {
    fn publish(&self, report: &Report, destination: &Path) -> Result<()> {
        write_artifact(destination, serde_json::to_string_pretty(report)?.as_bytes())
    }
}

/// Picks the HTML or JSON publisher per the configured or inferred format
#[derive(Debug, Clone, Default)]
pub struct FileReportPublisher {
    format: Option<ReportFormat>,
}

impl FileReportPublisher {
    pub fn new(format: Option<ReportFormat>) -> Self {
        Self { format }
    }
}

impl ReportPublisher for FileReportPublisher {
    fn publish(&self, report: &Report, destination: &Path) -> Result<()> {
        match self.format.unwrap_or_else(|| ReportFormat::from_path(destination)) {
            ReportFormat::Html => HtmlReportPublisher.publish(report, destination),
            ReportFormat::Json => JsonReportPublisher.publish(report, destination),
        }
    }
}

fn write_artifact(destination: &Path, content: &[u8]) -> Result<()> {
    if let Some(parent) = destination.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(destination, content).map_err(|e| {
        ReconError::report(format!(
            "Failed to write report '{}': {}",
            destination.display(),
            e
        ))
    })?;
    log::info!("Report published to {}", destination.display());
    Ok(())
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

const STYLE: &str = "<style>
body { font-family: sans-serif; margin: 2em; }
table { border-collapse: collapse; margin-bottom: 1.5em; }
th, td { border: 1px solid #ccc; padding: 4px 8px; text-align: left; }
td.passed { color: #1a7f37; }
td.failed { color: #cf222e; }
td.skipped { color: #9a6700; }
.meta { color: #666; font-size: 0.9em; }
</style>
";
