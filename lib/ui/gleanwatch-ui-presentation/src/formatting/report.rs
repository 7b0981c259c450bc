use serde::Serialize;

use gleanwatch_domain::{
    AggregationReport, HealthStatus, RecordDetail, ReportEntry, ServiceType,
};

use super::duration::format_duration;

/// Flat view of one report entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntrySummary {
    pub environment: String,
    pub service: ServiceType,
    pub health: HealthStatus,
    pub records: usize,
    pub error: Option<String>,
    pub elapsed_ms: u64,
}

impl From<&ReportEntry> for EntrySummary {
    fn from(entry: &ReportEntry) -> Self {
        Self {
            environment: entry.environment.clone(),
            service: entry.service,
            health: entry.health(),
            records: entry.records.len(),
            error: entry.error.as_ref().map(ToString::to_string),
            elapsed_ms: entry.elapsed_ms,
        }
    }
}

pub fn entry_summaries(report: &AggregationReport) -> Vec<EntrySummary> {
    report.entries.iter().map(EntrySummary::from).collect()
}

/// One aligned line per entry, followed by a tally line.
pub fn summary_lines(report: &AggregationReport) -> Vec<String> {
    let mut lines: Vec<String> = entry_summaries(report)
        .into_iter()
        .map(|summary| {
            let mut line = format!(
                "{:<12} {:<13} {:<9} {:>4} records {:>6} ms",
                summary.environment,
                summary.service.as_str(),
                summary.health.as_str(),
                summary.records,
                summary.elapsed_ms
            );
            if let Some(error) = summary.error {
                line.push_str("  ");
                line.push_str(&error);
            }
            line
        })
        .collect();

    let tally = report.tally();
    lines.push(format!(
        "pass {}: {} ok, {} degraded, {} failed, {} unknown, {} backend errors",
        report.pass_id, tally.ok, tally.degraded, tally.failed, tally.unknown, tally.errors
    ));
    lines
}

/// Backend errors and unrecognized statuses, one per line.
pub fn problem_lines(report: &AggregationReport) -> Vec<String> {
    let mut lines = Vec::new();
    for entry in &report.entries {
        if let Some(error) = &entry.error {
            lines.push(format!("{}/{}: {}", entry.environment, entry.service, error));
        }
        for record in &entry.records {
            if let Some(note) = record.status.note() {
                lines.push(format!(
                    "{}/{}: {}: {}",
                    entry.environment, entry.service, record.source_id, note.detail
                ));
            }
        }
    }
    lines
}

/// Per-record detail lines for one entry.
pub fn record_lines(entry: &ReportEntry) -> Vec<String> {
    entry
        .records
        .iter()
        .map(|record| {
            let head = format!("  {:<9} {}", record.health().as_str(), record.source_id);
            match &record.detail {
                RecordDetail::Run(run) => format!(
                    "{head}  {} {} {}",
                    run.job_name,
                    run.status,
                    format_duration(run.duration())
                ),
                RecordDetail::Service(service) => format!(
                    "{head}  {} {}/{} {}",
                    service.name,
                    service.running_replicas,
                    service.desired_replicas,
                    record.status.raw
                ),
                RecordDetail::Object(object) => format!(
                    "{head}  {} bytes {}",
                    object.size,
                    object.last_modified.to_rfc3339()
                ),
                RecordDetail::Probe(probe) => {
                    format!("{head}  HTTP {} in {} ms", probe.status_code, probe.response_ms)
                }
                RecordDetail::Message { text } => format!("{head}  {text}"),
            }
        })
        .collect()
}
