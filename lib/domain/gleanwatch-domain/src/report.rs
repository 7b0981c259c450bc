use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::BackendError;
use crate::health::{HealthStatus, ServiceType};
use crate::record::HealthRecord;

/// Outcome for one (environment, service) pair.
///
/// `records` may be non-empty alongside `error` when a paginated walk failed
/// part-way through.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportEntry {
    pub environment: String,
    pub service: ServiceType,
    pub records: Vec<HealthRecord>,
    pub error: Option<BackendError>,
    pub elapsed_ms: u64,
}

impl ReportEntry {
    pub fn succeeded(
        environment: impl Into<String>,
        service: ServiceType,
        records: Vec<HealthRecord>,
    ) -> Self {
        Self {
            environment: environment.into(),
            service,
            records,
            error: None,
            elapsed_ms: 0,
        }
    }

    pub fn failed(environment: impl Into<String>, service: ServiceType, error: BackendError) -> Self {
        Self {
            environment: environment.into(),
            service,
            records: Vec::new(),
            error: Some(error),
            elapsed_ms: 0,
        }
    }

    pub fn with_elapsed_ms(mut self, elapsed_ms: u64) -> Self {
        self.elapsed_ms = elapsed_ms;
        self
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    pub fn is_partial(&self) -> bool {
        self.error.is_some() && !self.records.is_empty()
    }

    pub fn outcome(&self) -> Result<&[HealthRecord], &BackendError> {
        match &self.error {
            Some(err) => Err(err),
            None => Ok(&self.records),
        }
    }

    /// Worst reading across records. An error with nothing salvaged counts as failed.
    pub fn health(&self) -> HealthStatus {
        let worst = HealthStatus::worst(self.records.iter().map(HealthRecord::health));
        match (&self.error, worst) {
            (None, Some(worst)) => worst,
            (None, None) => HealthStatus::Ok,
            (Some(_), Some(worst)) => worst.max(HealthStatus::Degraded),
            (Some(_), None) => HealthStatus::Failed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregationReport {
    pub pass_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub entries: Vec<ReportEntry>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthTally {
    pub ok: usize,
    pub unknown: usize,
    pub degraded: usize,
    pub failed: usize,
    pub errors: usize,
}

impl HealthTally {
    fn add(&mut self, health: HealthStatus) {
        match health {
            HealthStatus::Ok => self.ok += 1,
            HealthStatus::Unknown => self.unknown += 1,
            HealthStatus::Degraded => self.degraded += 1,
            HealthStatus::Failed => self.failed += 1,
        }
    }
}

impl AggregationReport {
    pub fn entry(&self, environment: &str, service: ServiceType) -> Option<&ReportEntry> {
        self.entries
            .iter()
            .find(|entry| entry.environment == environment && entry.service == service)
    }

    pub fn failures(&self) -> impl Iterator<Item = &ReportEntry> {
        self.entries.iter().filter(|entry| !entry.is_ok())
    }

    /// True when every requested pair has exactly one entry.
    pub fn covers(&self, environments: &[&str], services: &[ServiceType]) -> bool {
        if self.entries.len() != environments.len() * services.len() {
            return false;
        }
        environments.iter().all(|env| {
            services.iter().all(|service| {
                self.entries
                    .iter()
                    .filter(|entry| entry.environment == *env && entry.service == *service)
                    .count()
                    == 1
            })
        })
    }

    /// Per-record health counts plus the number of failed entries.
    pub fn tally(&self) -> HealthTally {
        let mut tally = HealthTally::default();
        for entry in &self.entries {
            if entry.error.is_some() {
                tally.errors += 1;
            }
            for record in &entry.records {
                tally.add(record.health());
            }
        }
        tally
    }
}
