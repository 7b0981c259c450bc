//! Raw HTTP access to the Docker API proxied by Portainer.
//!
//! Requests go to `/api/endpoints/{id}/docker/...` with no API-version path
//! segment; some deployments answer 404 to versioned paths. Auth is the
//! `X-API-Key` header only.

use std::time::Duration;

use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use tracing::debug;

use gleanwatch_domain::{BackendError, PortainerSection, Secret, ServiceSummary, TaskSummary};
use gleanwatch_ports::PassContext;

use crate::service::{DockerService, DockerTask};

const API_KEY_HEADER: &str = "X-API-Key";
const TASKS_PER_SERVICE: usize = 3;

#[derive(Debug, Clone)]
pub struct PortainerClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Secret,
    endpoint_id: u64,
}

impl PortainerClient {
    pub fn new(section: &PortainerSection, timeout: Duration) -> Result<Self, BackendError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| BackendError::unsupported(format!("http client setup failed: {err}")))?;
        Ok(Self::with_http(http, section))
    }

    pub fn with_http(http: reqwest::Client, section: &PortainerSection) -> Self {
        Self {
            http,
            base_url: section.api_url.trim_end_matches('/').to_string(),
            api_key: section.api_key.clone(),
            endpoint_id: section.endpoint_id,
        }
    }

    fn docker_url(&self, resource: &str) -> String {
        format!(
            "{}/api/endpoints/{}/docker/{}",
            self.base_url, self.endpoint_id, resource
        )
    }

    /// Services on the unversioned path, each paired with the native state word
    /// derived from replicas and update status.
    pub async fn list_services(
        &self,
        ctx: &PassContext,
    ) -> Result<Vec<(ServiceSummary, String)>, BackendError> {
        let services: Vec<DockerService> = self
            .get_json(ctx, &self.docker_url("services"), &[("status", "true".to_string())])
            .await?;
        debug!(count = services.len(), "portainer services listed");
        Ok(services
            .iter()
            .map(|service| (service.summary(Vec::new()), service.state()))
            .collect())
    }

    /// Most recent tasks for a service, newest last.
    pub async fn list_tasks(
        &self,
        ctx: &PassContext,
        service_name: &str,
    ) -> Result<Vec<TaskSummary>, BackendError> {
        let filters = serde_json::json!({ "service": [service_name] }).to_string();
        let tasks: Vec<DockerTask> = self
            .get_json(ctx, &self.docker_url("tasks"), &[("filters", filters)])
            .await?;
        let mut summaries: Vec<TaskSummary> = tasks.iter().map(DockerTask::summary).collect();
        summaries.sort_by_key(|task| task.since);
        let skip = summaries.len().saturating_sub(TASKS_PER_SERVICE);
        Ok(summaries.split_off(skip))
    }

    async fn get_json<T>(
        &self,
        ctx: &PassContext,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T, BackendError>
    where
        T: DeserializeOwned,
    {
        let response = self
            .http
            .get(url)
            .header(API_KEY_HEADER, self.api_key.expose())
            .query(query)
            .send()
            .await
            .map_err(transport_error)?;
        let status = response.status();
        let body = response.text().await.map_err(transport_error)?;
        ctx.trace_payload(url, &body);
        if status != StatusCode::OK {
            return Err(BackendError::from_http(status.as_u16(), &body));
        }
        serde_json::from_str(&body)
            .map_err(|err| BackendError::query(format!("unexpected response from {url}: {err}")))
    }
}

fn transport_error(err: reqwest::Error) -> BackendError {
    if err.is_timeout() {
        BackendError::unreachable(format!("request timed out: {err}"))
    } else {
        BackendError::unreachable(err.to_string())
    }
}
