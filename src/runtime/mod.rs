//! One aggregation pass driven from a loaded config.

use std::collections::{HashMap, HashSet};
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use tracing::warn;

use gleanwatch_adapter_minio::{MinioBackend, MinioClient};
use gleanwatch_application::Aggregator;
use gleanwatch_domain::{
    AggregationReport, AggregationSettings, BackendError, RecordDetail, S3Section,
    ServerEnvironment, ServiceType, SourceStatistics, WatchConfig, source_statistics,
};
use gleanwatch_ports::{HealthQuery, PassContext};

use crate::adapters::EnvironmentBackends;

pub const CONFIG_PATH_ENV: &str = "GLEANWATCH_CONFIG_PATH";

/// Caller choices for a single pass.
#[derive(Debug, Clone, Default)]
pub struct PassOptions {
    /// Services to poll. Empty means every service. Repeats are ignored.
    pub services: Vec<ServiceType>,
    /// Environment keys to poll. Empty means every configured environment.
    pub environments: Vec<String>,
    pub trace_payloads: bool,
    pub timeout: Option<Duration>,
}

impl PassOptions {
    /// Requested services, first mention wins.
    pub fn services(&self) -> Vec<ServiceType> {
        if self.services.is_empty() {
            return ServiceType::ALL.to_vec();
        }
        let mut seen = HashSet::new();
        self.services
            .iter()
            .copied()
            .filter(|service| seen.insert(*service))
            .collect()
    }
}

pub fn config_path(explicit: Option<&Path>) -> PathBuf {
    resolve_config_path(
        explicit,
        env::var(CONFIG_PATH_ENV).ok(),
        env::var("HOME").ok(),
    )
}

fn resolve_config_path(
    explicit: Option<&Path>,
    from_env: Option<String>,
    home: Option<String>,
) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }

    if let Some(path) = from_env.filter(|path| !path.trim().is_empty()) {
        return PathBuf::from(path);
    }

    if let Some(home) = home {
        return Path::new(&home).join(".gleanwatch").join("config.yaml");
    }

    PathBuf::from("gleanwatch.yaml")
}

/// Environments named by `keys`, in config order. Unknown keys are an error.
pub fn select_environments(config: &WatchConfig, keys: &[String]) -> Result<Vec<ServerEnvironment>> {
    if keys.is_empty() {
        return Ok(config.environments.clone());
    }
    let unknown: Vec<&str> = keys
        .iter()
        .filter(|key| config.environment(key).is_none())
        .map(String::as_str)
        .collect();
    if !unknown.is_empty() {
        bail!("unknown environment(s): {}", unknown.join(", "));
    }
    Ok(config
        .environments
        .iter()
        .filter(|env| keys.contains(&env.key))
        .cloned()
        .collect())
}

pub async fn run_pass(config: &WatchConfig, options: &PassOptions) -> Result<AggregationReport> {
    let environments = select_environments(config, &options.environments)?;
    let mut settings = config.aggregation.clone();
    if let Some(timeout) = options.timeout {
        settings.timeout_secs = timeout.as_secs().max(1);
    }

    let factory = Arc::new(EnvironmentBackends::from_settings(&settings));
    let aggregator = Aggregator::from_settings(factory, &settings);
    let query = HealthQuery::from_settings(&settings).context("Invalid aggregation settings")?;
    let ctx = PassContext::new(options.trace_payloads);
    Ok(aggregator
        .run(&environments, &options.services(), &query, &ctx)
        .await)
}

/// Source names from each environment's harvester catalog, keyed by environment.
/// Environments without object storage or with an unreadable catalog map to none.
pub async fn known_sources(
    environments: &[ServerEnvironment],
    settings: &AggregationSettings,
) -> HashMap<String, Vec<String>> {
    let mut known = HashMap::new();
    for environment in environments {
        let Some(section) = &environment.s3 else {
            continue;
        };
        let read = tokio::time::timeout(
            settings.timeout(),
            catalog_sources(&environment.key, section, &settings.source_catalog_key),
        )
        .await
        .unwrap_or_else(|_| Err(BackendError::unreachable("source catalog read timed out")));
        let names = match read {
            Ok(names) => names,
            Err(err) => {
                warn!(environment = %environment.key, error = %err, "source catalog unavailable");
                Vec::new()
            }
        };
        known.insert(environment.key.clone(), names);
    }
    known
}

async fn catalog_sources(
    environment: &str,
    section: &S3Section,
    key: &str,
) -> Result<Vec<String>, BackendError> {
    let backend = MinioBackend::new(environment, MinioClient::new(section)?);
    let sources = backend.sources(key).await?;
    Ok(sources.into_iter().map(|source| source.name).collect())
}

/// Per-source statistics over the scheduler runs each environment reported,
/// in report order.
pub fn source_breakdown(
    report: &AggregationReport,
    known: &HashMap<String, Vec<String>>,
) -> Vec<(String, Vec<SourceStatistics>)> {
    report
        .entries
        .iter()
        .filter(|entry| entry.service == ServiceType::Scheduler)
        .map(|entry| {
            let runs: Vec<_> = entry
                .records
                .iter()
                .filter_map(|record| match &record.detail {
                    RecordDetail::Run(run) => Some(run.clone()),
                    _ => None,
                })
                .collect();
            let catalog = known
                .get(&entry.environment)
                .map(Vec::as_slice)
                .unwrap_or_default();
            (entry.environment.clone(), source_statistics(&runs, catalog))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"
environments:
  - key: dev
    graph:
      url: http://127.0.0.1:9/blazegraph
  - key: prod
"#;

    #[test]
    fn test_config_path_precedence() {
        let explicit = Path::new("/etc/gleanwatch.yaml");
        assert_eq!(
            resolve_config_path(Some(explicit), Some("/env.yaml".into()), Some("/home/a".into())),
            PathBuf::from("/etc/gleanwatch.yaml")
        );
        assert_eq!(
            resolve_config_path(None, Some("/env.yaml".into()), Some("/home/a".into())),
            PathBuf::from("/env.yaml")
        );
        assert_eq!(
            resolve_config_path(None, None, Some("/home/a".into())),
            PathBuf::from("/home/a/.gleanwatch/config.yaml")
        );
        assert_eq!(resolve_config_path(None, None, None), PathBuf::from("gleanwatch.yaml"));
    }

    #[test]
    fn test_select_environments() {
        let config = WatchConfig::from_yaml(CONFIG).unwrap();
        assert_eq!(select_environments(&config, &[]).unwrap().len(), 2);
        let picked = select_environments(&config, &["prod".to_string()]).unwrap();
        assert_eq!(picked.len(), 1);
        assert_eq!(picked[0].key, "prod");
        let err = select_environments(&config, &["staging".to_string()]).unwrap_err();
        assert!(err.to_string().contains("staging"));
    }

    #[test]
    fn test_empty_service_list_means_all() {
        assert_eq!(PassOptions::default().services(), ServiceType::ALL.to_vec());
    }

    #[test]
    fn test_repeated_services_collapse_in_first_order() {
        let options = PassOptions {
            services: vec![
                ServiceType::Containers,
                ServiceType::Scheduler,
                ServiceType::Containers,
                ServiceType::Scheduler,
            ],
            ..PassOptions::default()
        };
        assert_eq!(
            options.services(),
            vec![ServiceType::Containers, ServiceType::Scheduler]
        );
    }

    #[tokio::test]
    async fn test_repeated_services_and_keys_cover_each_pair_once() {
        let raw = r#"
environments:
  - key: dev
    graph:
      url: http://127.0.0.1:9/blazegraph
  - key: dev
    name: second dev
"#;
        let config = WatchConfig::from_yaml(raw).unwrap();
        assert!(config.validate().iter().any(|p| p.contains("duplicate")));
        let options = PassOptions {
            services: vec![
                ServiceType::Containers,
                ServiceType::TripleStore,
                ServiceType::Containers,
            ],
            timeout: Some(Duration::from_secs(2)),
            ..PassOptions::default()
        };
        let report = run_pass(&config, &options).await.unwrap();
        assert_eq!(report.entries.len(), 2);
        assert!(report.covers(&["dev"], &[ServiceType::Containers, ServiceType::TripleStore]));
    }

    #[tokio::test]
    async fn test_invalid_settings_rejected_before_pass() {
        let raw = r#"
aggregation:
  page_size: 0
environments:
  - key: dev
"#;
        let config = WatchConfig::from_yaml(raw).unwrap();
        let err = run_pass(&config, &PassOptions::default()).await.unwrap_err();
        assert!(format!("{err:#}").contains("page size"));
    }

    #[tokio::test]
    async fn test_unconfigured_pairs_still_reported() {
        let config = WatchConfig::from_yaml(CONFIG).unwrap();
        let options = PassOptions {
            services: vec![ServiceType::Containers, ServiceType::TripleStore],
            timeout: Some(Duration::from_secs(2)),
            ..PassOptions::default()
        };
        let report = run_pass(&config, &options).await.unwrap();
        assert!(report.covers(
            &["dev", "prod"],
            &[ServiceType::Containers, ServiceType::TripleStore]
        ));
        assert!(report.entries.iter().all(|entry| entry.error.is_some()));
    }

    fn run_entry(environment: &str, jobs: &[(&str, &str)]) -> gleanwatch_domain::ReportEntry {
        let records = jobs
            .iter()
            .enumerate()
            .map(|(i, (job, status))| {
                gleanwatch_domain::HealthRecord::from_run(
                    environment,
                    gleanwatch_domain::RunRecord {
                        run_id: format!("{environment}-{i}"),
                        job_name: job.to_string(),
                        status: status.to_string(),
                        start_time: Some(0.0),
                        end_time: Some(60.0),
                        run_config_yaml: String::new(),
                        tags: Vec::new(),
                    },
                )
            })
            .collect();
        gleanwatch_domain::ReportEntry::succeeded(environment, ServiceType::Scheduler, records)
    }

    #[test]
    fn test_source_breakdown_per_environment() {
        let now = chrono::Utc::now();
        let report = AggregationReport {
            pass_id: "p-1".to_string(),
            started_at: now,
            finished_at: now,
            entries: vec![
                run_entry("dev", &[("harvest_iris_job", "SUCCESS"), ("opentopo_job", "FAILURE")]),
                gleanwatch_domain::ReportEntry::failed(
                    "dev",
                    ServiceType::Containers,
                    BackendError::auth_rejected("HTTP 401"),
                ),
                run_entry("prod", &[]),
            ],
        };
        let known = HashMap::from([(
            "dev".to_string(),
            vec!["IRIS".to_string(), "opentopography".to_string()],
        )]);

        let breakdown = source_breakdown(&report, &known);
        assert_eq!(breakdown.len(), 2);
        assert_eq!(breakdown[0].0, "dev");
        let names: Vec<_> = breakdown[0].1.iter().map(|s| s.source.as_str()).collect();
        assert_eq!(names, vec!["IRIS", "opentopography"]);
        assert_eq!(breakdown[1].0, "prod");
        assert!(breakdown[1].1.is_empty());
    }

    #[tokio::test]
    async fn test_known_sources_skip_environments_without_storage() {
        let config = WatchConfig::from_yaml(
            r#"
aggregation:
  timeout_secs: 1
environments:
  - key: dev
    s3:
      endpoint: 127.0.0.1
      port: 9
      use_ssl: false
      bucket: gleaner
  - key: prod
"#,
        )
        .unwrap();
        let known = known_sources(&config.environments, &config.aggregation).await;
        assert_eq!(known.len(), 1);
        assert!(known["dev"].is_empty());
    }
}
