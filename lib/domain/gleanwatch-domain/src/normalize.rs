//! Native status vocabularies mapped onto [`HealthStatus`].
//!
//! The tables are total: anything unrecognized becomes `Unknown` with the raw
//! string kept for diagnosis.

use serde::{Deserialize, Serialize};

use crate::error::{BackendError, ErrorKind};
use crate::health::{HealthStatus, ServiceType};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusReading {
    pub health: HealthStatus,
    pub raw: String,
    pub recognized: bool,
}

impl StatusReading {
    fn known(health: HealthStatus, raw: &str) -> Self {
        Self {
            health,
            raw: raw.to_string(),
            recognized: true,
        }
    }

    fn unknown(raw: &str) -> Self {
        Self {
            health: HealthStatus::Unknown,
            raw: raw.to_string(),
            recognized: false,
        }
    }

    /// Non-fatal diagnostic for statuses outside the table.
    pub fn note(&self) -> Option<BackendError> {
        if self.recognized {
            None
        } else {
            Some(BackendError::new(
                ErrorKind::UnknownStatus,
                format!("unrecognized status '{}'", self.raw),
            ))
        }
    }
}

pub fn normalize(service: ServiceType, native: &str) -> StatusReading {
    let health = match service {
        ServiceType::Containers => container_health(native),
        ServiceType::Scheduler => run_health(native),
        ServiceType::ObjectStore => object_health(native),
        ServiceType::TripleStore => probe_health(native),
    };
    match health {
        Some(health) => StatusReading::known(health, native),
        None => StatusReading::unknown(native),
    }
}

/// Container task state with its exit code, when the runtime reported one.
///
/// A clean exit is healthy; a task that finished with a non-zero code failed
/// even if the orchestrator calls it `complete`.
pub fn normalize_task(state: &str, exit_code: Option<i64>) -> StatusReading {
    let lowered = state.trim().to_ascii_lowercase();
    match (lowered.as_str(), exit_code) {
        ("exited" | "complete" | "completed", Some(0)) => {
            StatusReading::known(HealthStatus::Ok, state)
        }
        ("exited" | "complete" | "completed", Some(_)) => {
            StatusReading::known(HealthStatus::Failed, state)
        }
        _ => normalize(ServiceType::Containers, state),
    }
}

fn container_health(native: &str) -> Option<HealthStatus> {
    let health = match native.trim().to_ascii_lowercase().as_str() {
        "running" | "complete" | "completed" => HealthStatus::Ok,
        "new" | "allocated" | "pending" | "assigned" | "accepted" | "preparing" | "ready"
        | "starting" | "created" | "restarting" | "paused" | "updating" | "shutdown"
        | "rollback_started" | "rollback_paused" | "rollback_completed" => HealthStatus::Degraded,
        "exited" | "failed" | "rejected" | "dead" | "orphaned" | "remove" | "removing" => {
            HealthStatus::Failed
        }
        _ => return None,
    };
    Some(health)
}

fn run_health(native: &str) -> Option<HealthStatus> {
    let health = match native.trim().to_ascii_uppercase().as_str() {
        "SUCCESS" => HealthStatus::Ok,
        "STARTED" | "STARTING" | "QUEUED" | "NOT_STARTED" | "MANAGED" | "CANCELING" => {
            HealthStatus::Degraded
        }
        "FAILURE" | "CANCELED" => HealthStatus::Failed,
        _ => return None,
    };
    Some(health)
}

fn object_health(native: &str) -> Option<HealthStatus> {
    match native.trim().to_ascii_lowercase().as_str() {
        "present" => Some(HealthStatus::Ok),
        "empty" => Some(HealthStatus::Degraded),
        "missing" => Some(HealthStatus::Failed),
        _ => None,
    }
}

fn probe_health(native: &str) -> Option<HealthStatus> {
    match native.trim().to_ascii_lowercase().as_str() {
        "up" => Some(HealthStatus::Ok),
        "degraded" => Some(HealthStatus::Degraded),
        "down" => Some(HealthStatus::Failed),
        _ => None,
    }
}
