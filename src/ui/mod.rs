//! Report rendering for the command line.

use anyhow::Result;

use serde_json::json;

use gleanwatch_domain::{AggregationReport, SourceStatistics};
use gleanwatch_ui_presentation::formatting::{
    problem_lines, record_lines, source_statistics_lines, summary_lines,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

pub fn render(report: &AggregationReport, format: OutputFormat, details: bool) -> Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(report)?),
        OutputFormat::Text => Ok(render_text(report, details)),
    }
}

fn render_text(report: &AggregationReport, details: bool) -> String {
    let mut lines = summary_lines(report);
    if details {
        for entry in report.entries.iter().filter(|entry| !entry.records.is_empty()) {
            lines.push(format!("{} / {}", entry.environment, entry.service));
            lines.extend(record_lines(entry));
        }
    }
    let problems = problem_lines(report);
    if !problems.is_empty() {
        lines.push("problems:".to_string());
        lines.extend(problems.into_iter().map(|line| format!("  {line}")));
    }
    lines.join("\n")
}

/// Per-environment source statistics, as text blocks or one JSON array.
pub fn render_sources(
    breakdown: &[(String, Vec<SourceStatistics>)],
    format: OutputFormat,
) -> Result<String> {
    match format {
        OutputFormat::Json => {
            let value: Vec<_> = breakdown
                .iter()
                .map(|(environment, sources)| {
                    json!({ "environment": environment, "sources": sources })
                })
                .collect();
            Ok(serde_json::to_string_pretty(&value)?)
        }
        OutputFormat::Text => Ok(breakdown
            .iter()
            .flat_map(|(environment, sources)| source_statistics_lines(environment, sources))
            .collect::<Vec<_>>()
            .join("\n")),
    }
}
