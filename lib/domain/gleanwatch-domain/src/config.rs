//! Environment and aggregation settings, loaded once at startup.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::time::Duration;

use crate::filter::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
use crate::window::TimeWindow;

/// Longest look-back window accepted in `aggregation.window_days`.
pub const MAX_WINDOW_DAYS: i64 = 3_650;

/// Credential value that never shows up in `Debug` output.
#[derive(Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchConfig {
    #[serde(default)]
    pub aggregation: AggregationSettings,
    #[serde(default)]
    pub environments: Vec<ServerEnvironment>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregationSettings {
    pub timeout_secs: u64,
    pub max_concurrency: usize,
    pub max_pages: usize,
    pub page_size: u32,
    pub window_days: i64,
    pub log_prefix: String,
    pub include_tasks: bool,
    /// Object key of the harvester config listing known sources.
    pub source_catalog_key: String,
}

impl Default for AggregationSettings {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            max_concurrency: 8,
            max_pages: 20,
            page_size: DEFAULT_PAGE_SIZE,
            window_days: 7,
            log_prefix: "scheduler/logs/".to_string(),
            include_tasks: false,
            source_catalog_key: "scheduler/configs/gleanerconfig.yaml".to_string(),
        }
    }
}

impl AggregationSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }

    pub fn window(&self) -> TimeWindow {
        TimeWindow::days(self.window_days)
    }
}

/// One deployment target and the endpoints it exposes. Read-only after load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerEnvironment {
    pub key: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub portainer: Option<PortainerSection>,
    #[serde(default)]
    pub dagster: Option<DagsterSection>,
    #[serde(default)]
    pub s3: Option<S3Section>,
    #[serde(default)]
    pub graph: Option<GraphSection>,
}

impl ServerEnvironment {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            name: None,
            portainer: None,
            dagster: None,
            s3: None,
            graph: None,
        }
    }

    /// Display label, falling back to the key.
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.key)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortainerSection {
    pub api_url: String,
    pub api_key: Secret,
    #[serde(default = "default_endpoint_id")]
    pub endpoint_id: u64,
}

fn default_endpoint_id() -> u64 {
    1
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DagsterSection {
    pub graphql_url: String,
    #[serde(default)]
    pub job_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct S3Section {
    pub endpoint: String,
    #[serde(default = "default_s3_port")]
    pub port: u16,
    #[serde(default = "default_use_ssl")]
    pub use_ssl: bool,
    pub bucket: String,
    #[serde(default)]
    pub access_key: Option<Secret>,
    #[serde(default)]
    pub secret_key: Option<Secret>,
    #[serde(default = "default_region")]
    pub region: String,
}

fn default_s3_port() -> u16 {
    443
}

fn default_use_ssl() -> bool {
    true
}

fn default_region() -> String {
    "us-east-1".to_string()
}

impl S3Section {
    pub fn endpoint_url(&self) -> String {
        let host = self.endpoint.trim().trim_end_matches('/');
        if host.starts_with("http://") || host.starts_with("https://") {
            return host.to_string();
        }
        let scheme = if self.use_ssl { "https" } else { "http" };
        format!("{scheme}://{host}:{}", self.port)
    }

    /// Anonymous access is allowed for public buckets.
    pub fn has_credentials(&self) -> bool {
        matches!(
            (&self.access_key, &self.secret_key),
            (Some(access), Some(secret)) if !access.is_empty() && !secret.is_empty()
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphSection {
    pub url: String,
}

impl WatchConfig {
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config at {}", path.display()))?;
        Self::from_yaml(&raw).with_context(|| format!("Failed to parse config at {}", path.display()))
    }

    pub fn from_yaml(raw: &str) -> Result<Self> {
        let config: WatchConfig = serde_yaml::from_str(raw)?;
        Ok(config)
    }

    pub fn environment(&self, key: &str) -> Option<&ServerEnvironment> {
        self.environments.iter().find(|env| env.key == key)
    }

    /// Every problem found, rather than stopping at the first.
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if self.environments.is_empty() {
            problems.push("no environments configured".to_string());
        }
        for (index, env) in self.environments.iter().enumerate() {
            if env.key.trim().is_empty() {
                problems.push(format!("environment #{index} has an empty key"));
            }
            if self.environments[..index].iter().any(|other| other.key == env.key) {
                problems.push(format!("duplicate environment key '{}'", env.key));
            }
            let key = &env.key;
            if let Some(portainer) = &env.portainer {
                if portainer.api_url.trim().is_empty() {
                    problems.push(format!("{key}: empty portainer.api_url"));
                }
                if portainer.api_key.is_empty() {
                    problems.push(format!("{key}: empty portainer.api_key"));
                }
            }
            if let Some(dagster) = &env.dagster {
                if dagster.graphql_url.trim().is_empty() {
                    problems.push(format!("{key}: empty dagster.graphql_url"));
                }
            }
            if let Some(s3) = &env.s3 {
                if s3.endpoint.trim().is_empty() {
                    problems.push(format!("{key}: empty s3.endpoint"));
                }
                if s3.bucket.trim().is_empty() {
                    problems.push(format!("{key}: empty s3.bucket"));
                }
            }
            if let Some(graph) = &env.graph {
                if graph.url.trim().is_empty() {
                    problems.push(format!("{key}: empty graph.url"));
                }
            }
        }
        if self.aggregation.max_concurrency == 0 {
            problems.push("aggregation.max_concurrency must be at least 1".to_string());
        }
        if self.aggregation.max_pages == 0 {
            problems.push("aggregation.max_pages must be at least 1".to_string());
        }
        let page_size = self.aggregation.page_size;
        if page_size == 0 || page_size > MAX_PAGE_SIZE {
            problems.push(format!(
                "aggregation.page_size must be between 1 and {MAX_PAGE_SIZE}, got {page_size}"
            ));
        }
        let window_days = self.aggregation.window_days;
        if !(0..=MAX_WINDOW_DAYS).contains(&window_days) {
            problems.push(format!(
                "aggregation.window_days must be between 0 and {MAX_WINDOW_DAYS}, got {window_days}"
            ));
        }
        problems
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"
aggregation:
  timeout_secs: 5
environments:
  - key: dev
    name: Development
    portainer:
      api_url: https://portainer.dev.example.org
      api_key: ptr_abc
      endpoint_id: 2
    dagster:
      graphql_url: https://sched.dev.example.org/graphql
    s3:
      endpoint: oss.dev.example.org
      bucket: gleaner
      access_key: AKIA
      secret_key: shh
  - key: prod
    graph:
      url: https://graph.example.org/blazegraph/status
"#;

    #[test]
    fn test_parse_sample() {
        let config = WatchConfig::from_yaml(SAMPLE).unwrap();
        assert_eq!(config.aggregation.timeout_secs, 5);
        assert_eq!(config.aggregation.max_pages, 20);
        assert_eq!(
            config.aggregation.source_catalog_key,
            "scheduler/configs/gleanerconfig.yaml"
        );
        assert_eq!(config.environments.len(), 2);

        let dev = config.environment("dev").unwrap();
        assert_eq!(dev.label(), "Development");
        assert_eq!(dev.portainer.as_ref().unwrap().endpoint_id, 2);
        let s3 = dev.s3.as_ref().unwrap();
        assert_eq!(s3.endpoint_url(), "https://oss.dev.example.org:443");
        assert!(s3.has_credentials());

        let prod = config.environment("prod").unwrap();
        assert_eq!(prod.label(), "prod");
        assert!(prod.portainer.is_none());
        assert!(config.validate().is_empty());
    }

    #[test]
    fn test_secret_is_redacted() {
        let config = WatchConfig::from_yaml(SAMPLE).unwrap();
        let debug = format!("{:?}", config.environment("dev").unwrap());
        assert!(!debug.contains("ptr_abc"));
        assert!(!debug.contains("shh"));
        assert!(debug.contains("Secret(***)"));
    }

    #[test]
    fn test_validate_collects_all_problems() {
        let raw = r#"
environments:
  - key: dev
    portainer:
      api_url: ""
      api_key: ""
  - key: dev
    s3:
      endpoint: minio
      bucket: ""
"#;
        let problems = WatchConfig::from_yaml(raw).unwrap().validate();
        assert_eq!(problems.len(), 4, "{problems:?}");
        assert!(problems.iter().any(|p| p.contains("duplicate")));
        assert!(problems.iter().any(|p| p.contains("s3.bucket")));
    }

    #[test]
    fn test_validate_bounds_page_size_and_window() {
        let raw = r#"
aggregation:
  page_size: 0
  window_days: -3
environments:
  - key: dev
"#;
        let problems = WatchConfig::from_yaml(raw).unwrap().validate();
        assert_eq!(problems.len(), 2, "{problems:?}");
        assert!(problems[0].contains("page_size"));
        assert!(problems[1].contains("window_days"));

        let mut config = WatchConfig::from_yaml(raw).unwrap();
        config.aggregation.page_size = MAX_PAGE_SIZE + 1;
        config.aggregation.window_days = i64::MAX;
        assert_eq!(config.validate().len(), 2);

        config.aggregation.page_size = MAX_PAGE_SIZE;
        config.aggregation.window_days = MAX_WINDOW_DAYS;
        assert!(config.validate().is_empty());
    }

    #[test]
    fn test_empty_config_is_invalid() {
        let problems = WatchConfig::from_yaml("{}").unwrap().validate();
        assert_eq!(problems, vec!["no environments configured".to_string()]);
    }

    #[test]
    fn test_load_from_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();
        let config = WatchConfig::load_from_path(file.path()).unwrap();
        assert_eq!(config.environments[0].key, "dev");

        let missing = WatchConfig::load_from_path(Path::new("/nonexistent/gleanwatch.yaml"));
        assert!(missing.is_err());
    }

    #[test]
    fn test_plain_http_endpoint() {
        let s3 = S3Section {
            endpoint: "minio.local".to_string(),
            port: 9000,
            use_ssl: false,
            bucket: "b".to_string(),
            access_key: None,
            secret_key: None,
            region: default_region(),
        };
        assert_eq!(s3.endpoint_url(), "http://minio.local:9000");
        assert!(!s3.has_credentials());
    }
}
