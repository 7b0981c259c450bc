use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::health::{HealthStatus, ServiceType};
use crate::normalize::{StatusReading, normalize};

/// One normalized observation. Built fresh per pass and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthRecord {
    pub source_id: String,
    pub environment: String,
    pub service: ServiceType,
    pub status: StatusReading,
    pub timestamp: DateTime<Utc>,
    pub detail: RecordDetail,
}

impl HealthRecord {
    pub fn new(
        environment: impl Into<String>,
        service: ServiceType,
        source_id: impl Into<String>,
        status: StatusReading,
        detail: RecordDetail,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            environment: environment.into(),
            service,
            status,
            timestamp: Utc::now(),
            detail,
        }
    }

    pub fn from_run(environment: impl Into<String>, run: RunRecord) -> Self {
        let status = normalize(ServiceType::Scheduler, &run.status);
        Self::new(
            environment,
            ServiceType::Scheduler,
            run.run_id.clone(),
            status,
            RecordDetail::Run(run),
        )
    }

    pub fn health(&self) -> HealthStatus {
        self.status.health
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RecordDetail {
    Message { text: String },
    Run(RunRecord),
    Service(ServiceSummary),
    Object(ObjectSummary),
    Probe(ProbeSummary),
}

/// A scheduler run as selected by the runs query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRecord {
    pub run_id: String,
    #[serde(default)]
    pub job_name: String,
    pub status: String,
    #[serde(default)]
    pub start_time: Option<f64>,
    #[serde(default)]
    pub end_time: Option<f64>,
    #[serde(default)]
    pub run_config_yaml: String,
    #[serde(default)]
    pub tags: Vec<RunTag>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunTag {
    pub key: String,
    #[serde(default)]
    pub value: String,
}

impl RunRecord {
    /// Wall-clock seconds between start and end, when both are known.
    pub fn duration(&self) -> Option<f64> {
        match (self.start_time, self.end_time) {
            (Some(start), Some(end)) if end >= start => Some(end - start),
            _ => None,
        }
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.start_time.and_then(epoch_to_datetime)
    }
}

fn epoch_to_datetime(seconds: f64) -> Option<DateTime<Utc>> {
    let whole = seconds.trunc() as i64;
    let nanos = ((seconds - seconds.trunc()) * 1e9) as u32;
    DateTime::from_timestamp(whole, nanos)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceSummary {
    pub id: String,
    pub name: String,
    pub image: Option<String>,
    pub desired_replicas: u64,
    pub running_replicas: u64,
    pub created_at: Option<DateTime<Utc>>,
    pub ingest_prefix: Option<String>,
    #[serde(default)]
    pub tasks: Vec<TaskSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSummary {
    pub id: String,
    pub state: StatusReading,
    pub exit_code: Option<i64>,
    pub message: Option<String>,
    pub container_id: Option<String>,
    pub since: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectSummary {
    pub key: String,
    pub size: u64,
    pub last_modified: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeSummary {
    pub url: String,
    pub status_code: u16,
    pub response_ms: u64,
}
