use serde::{Deserialize, Serialize};
use std::fmt;

/// Shared health classification across all backend types.
///
/// Variants are declared in severity order so `Ord` picks the worst reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HealthStatus {
    Ok,
    Unknown,
    Degraded,
    Failed,
}

impl HealthStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            HealthStatus::Ok => "OK",
            HealthStatus::Unknown => "UNKNOWN",
            HealthStatus::Degraded => "DEGRADED",
            HealthStatus::Failed => "FAILED",
        }
    }

    pub fn worst<I>(statuses: I) -> Option<HealthStatus>
    where
        I: IntoIterator<Item = HealthStatus>,
    {
        statuses.into_iter().max()
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of external system polled for one environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceType {
    Containers,
    Scheduler,
    ObjectStore,
    TripleStore,
}

impl ServiceType {
    pub const ALL: [ServiceType; 4] = [
        ServiceType::Containers,
        ServiceType::Scheduler,
        ServiceType::ObjectStore,
        ServiceType::TripleStore,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ServiceType::Containers => "containers",
            ServiceType::Scheduler => "scheduler",
            ServiceType::ObjectStore => "object_store",
            ServiceType::TripleStore => "triplestore",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "containers" | "portainer" | "docker" => Some(ServiceType::Containers),
            "scheduler" | "dagster" => Some(ServiceType::Scheduler),
            "object_store" | "object-store" | "s3" | "minio" => Some(ServiceType::ObjectStore),
            "triplestore" | "graph" => Some(ServiceType::TripleStore),
            _ => None,
        }
    }
}

impl fmt::Display for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worst_prefers_failed() {
        let worst = HealthStatus::worst([
            HealthStatus::Ok,
            HealthStatus::Failed,
            HealthStatus::Degraded,
        ]);
        assert_eq!(worst, Some(HealthStatus::Failed));
        assert_eq!(HealthStatus::worst([]), None);
    }

    #[test]
    fn test_unknown_ranks_between_ok_and_degraded() {
        assert!(HealthStatus::Ok < HealthStatus::Unknown);
        assert!(HealthStatus::Unknown < HealthStatus::Degraded);
    }

    #[test]
    fn test_service_type_aliases() {
        assert_eq!(ServiceType::parse("Dagster"), Some(ServiceType::Scheduler));
        assert_eq!(ServiceType::parse("s3"), Some(ServiceType::ObjectStore));
        assert_eq!(ServiceType::parse("ftp"), None);
    }
}
