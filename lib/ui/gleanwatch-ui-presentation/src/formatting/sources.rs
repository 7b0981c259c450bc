use gleanwatch_domain::SourceStatistics;

use super::duration::format_duration;

/// Environment header, then one aligned line per source in the order given.
pub fn source_statistics_lines(environment: &str, statistics: &[SourceStatistics]) -> Vec<String> {
    let mut lines = vec![format!("sources in {environment}:")];
    if statistics.is_empty() {
        lines.push("  no scheduler runs".to_string());
        return lines;
    }
    lines.extend(statistics.iter().map(|stats| {
        let durations = stats.durations.as_ref();
        format!(
            "  {:<24} {:>5} jobs {:>5.1}% ok {:>5.1}% failed {:>3} running {:>3} queued  median {} avg {} max {}",
            stats.source,
            stats.total,
            stats.success_rate(),
            stats.failure_rate(),
            stats.running,
            stats.queued,
            format_duration(durations.map(|d| d.median)),
            format_duration(durations.map(|d| d.average)),
            format_duration(durations.map(|d| d.max)),
        )
    }));
    lines
}
