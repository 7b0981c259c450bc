//! Per-source job statistics over scheduler runs.
//!
//! A run's source comes from a `source` or `provider` tag when one is set,
//! otherwise from its job name, matched against the harvester's known sources.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use serde::{Deserialize, Serialize};

use crate::record::{RunRecord, RunTag};

pub const UNKNOWN_SOURCE: &str = "unknown";

/// Job-name endings that follow the source name, tried in order.
const JOB_SUFFIXES: [&str; 4] = ["_summon_and_release", "_pipeline", "_job", "_ingest"];
const GLEANER_PREFIX: &str = "gleaner_";

/// Value of the last `source`/`provider` tag, if it is not empty.
pub fn source_from_tags(tags: &[RunTag]) -> Option<&str> {
    tags.iter()
        .rev()
        .find(|tag| {
            let key = tag.key.to_lowercase();
            key.contains("source") || key.contains("provider")
        })
        .map(|tag| tag.value.as_str())
        .filter(|value| !value.is_empty())
}

/// Best guess at the source a job harvests, or [`UNKNOWN_SOURCE`].
///
/// A known source named anywhere in the job name wins. Otherwise the name is
/// cut at a conventional suffix (`iris_summon_and_release`, `iris_job`, ...),
/// after a `gleaner_` prefix, or at its last separator, and the piece is
/// mapped onto a similar known source when there is one.
pub fn source_from_job_name(job_name: &str, known_sources: &[String]) -> String {
    if job_name.is_empty() {
        return UNKNOWN_SOURCE.to_string();
    }
    let lowered = job_name.to_lowercase();
    let known: Vec<&String> = known_sources
        .iter()
        .filter(|source| !source.trim().is_empty())
        .collect();

    if let Some(source) = known
        .iter()
        .find(|source| lowered.contains(&source.to_lowercase()))
    {
        return (*source).clone();
    }

    match candidate_from_job_name(&lowered) {
        Some(candidate) => known
            .iter()
            .find(|source| resembles(candidate, source))
            .map_or_else(|| candidate.to_string(), |source| (*source).clone()),
        None => UNKNOWN_SOURCE.to_string(),
    }
}

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn candidate_from_job_name(name: &str) -> Option<&str> {
    let word_end = name.find(|c: char| !is_word_char(c)).unwrap_or(name.len());
    let word = &name[..word_end];

    for suffix in JOB_SUFFIXES {
        if let Some(at) = word.rfind(suffix).filter(|at| *at > 0) {
            return Some(&word[..at]);
        }
    }

    let after_prefix = name.match_indices(GLEANER_PREFIX).find_map(|(at, prefix)| {
        let rest = &name[at + prefix.len()..];
        let end = rest.find(|c: char| !is_word_char(c)).unwrap_or(rest.len());
        (end > 0).then(|| &rest[..end])
    });
    if after_prefix.is_some() {
        return after_prefix;
    }

    if !word.is_empty() && name[word_end..].starts_with('-') {
        return Some(word);
    }
    word.rfind('_').filter(|at| *at > 0).map(|at| &word[..at])
}

/// Containment either way, or names within two characters of each other in length.
fn resembles(candidate: &str, source: &str) -> bool {
    let source = source.to_lowercase();
    candidate.contains(&source)
        || source.contains(candidate)
        || candidate.chars().count().abs_diff(source.chars().count()) <= 2
}

/// Wall-clock seconds of successful runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DurationStats {
    pub samples: usize,
    pub average: f64,
    pub min: f64,
    pub max: f64,
    /// Mean of the two middle samples when the count is even.
    pub median: f64,
}

impl DurationStats {
    pub fn from_samples(samples: &[f64]) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }
        let mut sorted = samples.to_vec();
        sorted.sort_by(f64::total_cmp);
        let count = sorted.len();
        let mid = count / 2;
        let median = if count % 2 == 0 {
            (sorted[mid - 1] + sorted[mid]) / 2.0
        } else {
            sorted[mid]
        };
        Some(Self {
            samples: count,
            average: sorted.iter().sum::<f64>() / count as f64,
            min: sorted[0],
            max: sorted[count - 1],
            median,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceStatistics {
    pub source: String,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub running: usize,
    pub queued: usize,
    pub job_names: BTreeSet<String>,
    pub durations: Option<DurationStats>,
}

impl SourceStatistics {
    fn new(source: String) -> Self {
        Self {
            source,
            total: 0,
            succeeded: 0,
            failed: 0,
            running: 0,
            queued: 0,
            job_names: BTreeSet::new(),
            durations: None,
        }
    }

    /// Percentage of runs that succeeded, 0 when there are none.
    pub fn success_rate(&self) -> f64 {
        percent(self.succeeded, self.total)
    }

    pub fn failure_rate(&self) -> f64 {
        percent(self.failed, self.total)
    }
}

fn percent(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64 * 100.0
    }
}

/// Group runs by source, busiest source first. A run id seen twice counts once.
pub fn source_statistics(runs: &[RunRecord], known_sources: &[String]) -> Vec<SourceStatistics> {
    let mut seen = HashSet::new();
    let mut by_source: BTreeMap<String, (SourceStatistics, Vec<f64>)> = BTreeMap::new();

    for run in runs
        .iter()
        .filter(|run| !run.run_id.is_empty() && seen.insert(run.run_id.as_str()))
    {
        let source = match source_from_tags(&run.tags) {
            Some(source) => source.to_string(),
            None => source_from_job_name(&run.job_name, known_sources),
        };
        let (stats, durations) = by_source
            .entry(source.clone())
            .or_insert_with(|| (SourceStatistics::new(source), Vec::new()));

        stats.total += 1;
        if !run.job_name.is_empty() {
            stats.job_names.insert(run.job_name.clone());
        }
        match run.status.as_str() {
            "SUCCESS" => {
                stats.succeeded += 1;
                durations.extend(run.duration());
            }
            "FAILURE" => stats.failed += 1,
            "STARTED" => stats.running += 1,
            "QUEUED" => stats.queued += 1,
            _ => {}
        }
    }

    let mut statistics: Vec<SourceStatistics> = by_source
        .into_values()
        .map(|(mut stats, durations)| {
            stats.durations = DurationStats::from_samples(&durations);
            stats
        })
        .collect();
    statistics.sort_by(|a, b| b.total.cmp(&a.total).then_with(|| a.source.cmp(&b.source)));
    statistics
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(id: &str, job: &str, status: &str, duration: Option<f64>) -> RunRecord {
        RunRecord {
            run_id: id.to_string(),
            job_name: job.to_string(),
            status: status.to_string(),
            start_time: duration.map(|_| 1_720_000_000.0),
            end_time: duration.map(|secs| 1_720_000_000.0 + secs),
            run_config_yaml: String::new(),
            tags: Vec::new(),
        }
    }

    fn known(names: &[&str]) -> Vec<String> {
        names.iter().map(|name| name.to_string()).collect()
    }

    #[test]
    fn test_median_of_odd_count() {
        let runs = vec![
            run("r1", "iris_job", "SUCCESS", Some(30.0)),
            run("r2", "iris_job", "SUCCESS", Some(10.0)),
            run("r3", "iris_job", "SUCCESS", Some(20.0)),
        ];
        let stats = source_statistics(&runs, &[]);
        let durations = stats[0].durations.as_ref().unwrap();
        assert_eq!(durations.samples, 3);
        assert_eq!(durations.median, 20.0);
        assert_eq!(durations.average, 20.0);
        assert_eq!(durations.min, 10.0);
        assert_eq!(durations.max, 30.0);
    }

    #[test]
    fn test_median_of_even_count() {
        let runs = vec![
            run("r1", "iris_job", "SUCCESS", Some(40.0)),
            run("r2", "iris_job", "SUCCESS", Some(10.0)),
            run("r3", "iris_job", "SUCCESS", Some(30.0)),
            run("r4", "iris_job", "SUCCESS", Some(20.0)),
        ];
        let stats = source_statistics(&runs, &[]);
        assert_eq!(stats[0].durations.as_ref().unwrap().median, 25.0);
    }

    #[test]
    fn test_unrecognized_names_are_unknown() {
        let runs = vec![
            run("r1", "", "FAILURE", None),
            run("r2", "cleanup", "SUCCESS", Some(5.0)),
        ];
        let stats = source_statistics(&runs, &known(&["iris"]));
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].source, UNKNOWN_SOURCE);
        assert_eq!(stats[0].total, 2);
        assert_eq!(stats[0].job_names, BTreeSet::from(["cleanup".to_string()]));
    }

    #[test]
    fn test_no_successful_durations() {
        let runs = vec![
            run("r1", "iris_job", "FAILURE", Some(12.0)),
            run("r2", "iris_job", "STARTED", None),
            run("r3", "iris_job", "SUCCESS", None),
        ];
        let stats = source_statistics(&runs, &[]);
        let iris = &stats[0];
        assert_eq!(iris.source, "iris");
        assert_eq!((iris.succeeded, iris.failed, iris.running), (1, 1, 1));
        assert!(iris.durations.is_none());
        assert!((iris.failure_rate() - 100.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_runs_give_no_statistics() {
        assert!(source_statistics(&[], &known(&["iris"])).is_empty());
        let zero = SourceStatistics::new("iris".to_string());
        assert_eq!(zero.success_rate(), 0.0);
    }

    #[test]
    fn test_tag_wins_over_job_name() {
        let mut tagged = run("r1", "iris_job", "SUCCESS", Some(1.0));
        tagged.tags = vec![
            RunTag {
                key: "dagster/partition".to_string(),
                value: "p1".to_string(),
            },
            RunTag {
                key: "Data_Source".to_string(),
                value: "opentopography".to_string(),
            },
        ];
        let stats = source_statistics(&[tagged], &known(&["iris"]));
        assert_eq!(stats[0].source, "opentopography");
    }

    #[test]
    fn test_repeated_run_ids_count_once() {
        let runs = vec![
            run("r1", "iris_job", "SUCCESS", Some(10.0)),
            run("r1", "iris_job", "SUCCESS", Some(10.0)),
            run("r2", "geocodes_job", "QUEUED", None),
            run("r3", "geocodes_job", "QUEUED", None),
        ];
        let stats = source_statistics(&runs, &[]);
        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0].source, "geocodes");
        assert_eq!(stats[0].queued, 2);
        assert_eq!(stats[1].source, "iris");
        assert_eq!(stats[1].total, 1);
        assert_eq!(stats[1].success_rate(), 100.0);
    }

    #[test]
    fn test_source_from_job_name_patterns() {
        let none: Vec<String> = Vec::new();
        assert_eq!(source_from_job_name("iris_summon_and_release", &none), "iris");
        assert_eq!(source_from_job_name("ssdb_iris_pipeline", &none), "ssdb_iris");
        assert_eq!(source_from_job_name("harvest_gleaner_iris-x", &none), "iris");
        assert_eq!(source_from_job_name("neotoma-nightly", &none), "neotoma");
        assert_eq!(source_from_job_name("Neotoma_Nightly", &none), "neotoma");
        assert_eq!(source_from_job_name("nightly", &none), UNKNOWN_SOURCE);
    }

    #[test]
    fn test_source_from_job_name_prefers_known_sources() {
        let catalog = known(&["IRIS", "opentopography"]);
        assert_eq!(source_from_job_name("harvest_iris_job", &catalog), "IRIS");
        assert_eq!(source_from_job_name("opentopo_pipeline", &catalog), "opentopography");
        assert_eq!(source_from_job_name("geocodes_job", &catalog), "geocodes");
    }

    #[test]
    fn test_blank_source_tag_ignored() {
        let tags = vec![RunTag {
            key: "source".to_string(),
            value: String::new(),
        }];
        assert_eq!(source_from_tags(&tags), None);
    }
}
