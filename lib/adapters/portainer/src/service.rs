//! Docker Engine service and task payloads as relayed by Portainer.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use gleanwatch_domain::{ServiceSummary, TaskSummary, normalize_task};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct DockerService {
    #[serde(rename = "ID", default)]
    pub id: String,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub spec: ServiceSpec,
    #[serde(default)]
    pub service_status: Option<ServiceStatus>,
    #[serde(default)]
    pub update_status: Option<UpdateStatus>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct ServiceSpec {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub task_template: Option<TaskTemplate>,
    #[serde(default)]
    pub mode: Option<ServiceMode>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct TaskTemplate {
    #[serde(default)]
    pub container_spec: Option<ContainerSpec>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct ContainerSpec {
    #[serde(default)]
    pub image: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct ServiceMode {
    #[serde(default)]
    pub replicated: Option<Replicated>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct Replicated {
    #[serde(default)]
    pub replicas: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct ServiceStatus {
    #[serde(default)]
    pub running_tasks: u64,
    #[serde(default)]
    pub desired_tasks: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct UpdateStatus {
    #[serde(default)]
    pub state: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct DockerTask {
    #[serde(rename = "ID", default)]
    pub id: String,
    #[serde(default)]
    pub status: TaskStatus,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct TaskStatus {
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub err: Option<String>,
    #[serde(default)]
    pub container_status: Option<ContainerStatus>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct ContainerStatus {
    #[serde(rename = "ContainerID", default)]
    pub container_id: Option<String>,
    #[serde(default)]
    pub exit_code: Option<i64>,
}

/// Scheduler containers are named `sch_{prefix}_magic_gleaner`.
pub fn ingest_prefix(service_name: &str) -> Option<String> {
    service_name
        .strip_prefix("sch_")
        .and_then(|rest| rest.strip_suffix("_magic_gleaner"))
        .filter(|prefix| !prefix.is_empty())
        .map(str::to_string)
}

fn parse_timestamp(raw: Option<&str>) -> Option<DateTime<Utc>> {
    raw.and_then(|value| DateTime::parse_from_rfc3339(value).ok())
        .map(|value| value.with_timezone(&Utc))
}

impl DockerService {
    pub fn desired_replicas(&self) -> u64 {
        if let Some(status) = &self.service_status {
            return status.desired_tasks;
        }
        self.spec
            .mode
            .as_ref()
            .and_then(|mode| mode.replicated.as_ref())
            .and_then(|replicated| replicated.replicas)
            .unwrap_or(0)
    }

    pub fn running_replicas(&self) -> u64 {
        self.service_status
            .as_ref()
            .map(|status| status.running_tasks)
            .unwrap_or(0)
    }

    /// Native state word for the normalizer. An in-flight update wins over replica counts.
    pub fn state(&self) -> String {
        if let Some(state) = self
            .update_status
            .as_ref()
            .and_then(|update| update.state.as_deref())
            .filter(|state| !state.is_empty())
        {
            return state.to_string();
        }
        let desired = self.desired_replicas();
        let running = self.running_replicas();
        let derived = if desired == 0 {
            "complete"
        } else if running >= desired {
            "running"
        } else if running > 0 {
            "starting"
        } else {
            "pending"
        };
        derived.to_string()
    }

    pub fn image(&self) -> Option<String> {
        self.spec
            .task_template
            .as_ref()
            .and_then(|template| template.container_spec.as_ref())
            .and_then(|spec| spec.image.as_deref())
            .map(|image| image.split('@').next().unwrap_or(image).to_string())
    }

    pub fn summary(&self, tasks: Vec<TaskSummary>) -> ServiceSummary {
        ServiceSummary {
            id: self.id.clone(),
            name: self.spec.name.clone(),
            image: self.image(),
            desired_replicas: self.desired_replicas(),
            running_replicas: self.running_replicas(),
            created_at: parse_timestamp(self.created_at.as_deref()),
            ingest_prefix: ingest_prefix(&self.spec.name),
            tasks,
        }
    }
}

impl DockerTask {
    pub fn summary(&self) -> TaskSummary {
        let exit_code = self
            .status
            .container_status
            .as_ref()
            .and_then(|status| status.exit_code);
        let message = self
            .status
            .err
            .clone()
            .filter(|err| !err.is_empty())
            .or_else(|| self.status.message.clone());
        TaskSummary {
            id: self.id.clone(),
            state: normalize_task(&self.status.state, exit_code),
            exit_code,
            message,
            container_id: self
                .status
                .container_status
                .as_ref()
                .and_then(|status| status.container_id.clone()),
            since: parse_timestamp(self.status.timestamp.as_deref()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gleanwatch_domain::HealthStatus;
    use serde_json::json;

    fn service(value: serde_json::Value) -> DockerService {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_ingest_prefix() {
        assert_eq!(
            ingest_prefix("sch_iris_magic_gleaner").as_deref(),
            Some("iris")
        );
        assert_eq!(
            ingest_prefix("sch_geo_codes_magic_gleaner").as_deref(),
            Some("geo_codes")
        );
        assert_eq!(ingest_prefix("traefik"), None);
        assert_eq!(ingest_prefix("sch__magic_gleaner"), None);
    }

    #[test]
    fn test_state_from_replicas() {
        let running = service(json!({
            "ID": "s1",
            "Spec": { "Name": "web" },
            "ServiceStatus": { "RunningTasks": 2, "DesiredTasks": 2 }
        }));
        assert_eq!(running.state(), "running");

        let starting = service(json!({
            "Spec": { "Name": "web" },
            "ServiceStatus": { "RunningTasks": 1, "DesiredTasks": 3 }
        }));
        assert_eq!(starting.state(), "starting");

        let pending = service(json!({
            "Spec": { "Name": "web", "Mode": { "Replicated": { "Replicas": 1 } } }
        }));
        assert_eq!(pending.desired_replicas(), 1);
        assert_eq!(pending.state(), "pending");

        let complete = service(json!({
            "Spec": { "Name": "job" },
            "ServiceStatus": { "RunningTasks": 0, "DesiredTasks": 0 }
        }));
        assert_eq!(complete.state(), "complete");
    }

    #[test]
    fn test_update_state_overrides() {
        let paused = service(json!({
            "Spec": { "Name": "web" },
            "ServiceStatus": { "RunningTasks": 1, "DesiredTasks": 1 },
            "UpdateStatus": { "State": "paused" }
        }));
        assert_eq!(paused.state(), "paused");
    }

    #[test]
    fn test_summary_fields() {
        let svc = service(json!({
            "ID": "abc",
            "CreatedAt": "2024-07-10T12:00:00.123456789Z",
            "Spec": {
                "Name": "sch_iris_magic_gleaner",
                "TaskTemplate": { "ContainerSpec": { "Image": "nsfearthcube/gleaner:latest@sha256:ff" } }
            },
            "ServiceStatus": { "RunningTasks": 1, "DesiredTasks": 1 }
        }));
        let summary = svc.summary(Vec::new());
        assert_eq!(summary.image.as_deref(), Some("nsfearthcube/gleaner:latest"));
        assert_eq!(summary.ingest_prefix.as_deref(), Some("iris"));
        assert_eq!(summary.created_at.unwrap().timestamp(), 1_720_612_800);
    }

    #[test]
    fn test_task_summary_uses_exit_code() {
        let task: DockerTask = serde_json::from_value(json!({
            "ID": "t1",
            "Status": {
                "Timestamp": "2024-07-10T12:00:00Z",
                "State": "complete",
                "Message": "finished",
                "ContainerStatus": { "ContainerID": "c1", "ExitCode": 1 }
            }
        }))
        .unwrap();
        let summary = task.summary();
        assert_eq!(summary.state.health, HealthStatus::Failed);
        assert_eq!(summary.exit_code, Some(1));
        assert_eq!(summary.container_id.as_deref(), Some("c1"));
        assert_eq!(summary.message.as_deref(), Some("finished"));
    }
}
