//! Container-orchestrator backend (Docker Swarm behind Portainer).

mod client;
mod service;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use tokio::time::timeout_at;
use tracing::warn;

use gleanwatch_domain::{
    BackendError, HealthRecord, RecordDetail, ServiceSummary, ServiceType, TaskSummary, normalize,
};
use gleanwatch_ports::{FetchOutcome, HealthBackend, HealthQuery, PassContext};

pub use client::PortainerClient;
pub use service::ingest_prefix;

/// Task listings in flight at once for one environment.
const TASK_LISTINGS_IN_FLIGHT: usize = 4;

pub struct PortainerBackend {
    environment: String,
    client: PortainerClient,
}

impl PortainerBackend {
    pub fn new(environment: impl Into<String>, client: PortainerClient) -> Self {
        Self {
            environment: environment.into(),
            client,
        }
    }

    fn record(&self, summary: ServiceSummary, state: &str) -> HealthRecord {
        HealthRecord::new(
            self.environment.clone(),
            ServiceType::Containers,
            summary.name.clone(),
            normalize(ServiceType::Containers, state),
            RecordDetail::Service(summary),
        )
    }

    /// Recent tasks for one service, given up on at the query deadline.
    async fn tasks(
        &self,
        ctx: &PassContext,
        query: &HealthQuery,
        service_name: &str,
    ) -> Result<Vec<TaskSummary>, BackendError> {
        let listing = self.client.list_tasks(ctx, service_name);
        match query.deadline {
            Some(deadline) => timeout_at(deadline, listing).await.unwrap_or_else(|_| {
                Err(BackendError::unreachable("task listing timed out"))
            }),
            None => listing.await,
        }
    }
}

#[async_trait]
impl HealthBackend for PortainerBackend {
    fn service(&self) -> ServiceType {
        ServiceType::Containers
    }

    async fn fetch(&self, ctx: &PassContext, query: &HealthQuery) -> FetchOutcome {
        let services = match self.client.list_services(ctx).await {
            Ok(services) => services,
            Err(err) => return FetchOutcome::failed(err),
        };

        if !query.include_tasks {
            let records = services
                .into_iter()
                .map(|(summary, state)| self.record(summary, &state))
                .collect();
            return FetchOutcome::complete(records);
        }

        // Task details are best effort; a failed listing leaves the service record as is.
        let records = stream::iter(services)
            .map(|(mut summary, state)| async move {
                match self.tasks(ctx, query, &summary.name).await {
                    Ok(tasks) => summary.tasks = tasks,
                    Err(err) => {
                        warn!(service = %summary.name, error = %err, "task listing failed");
                    }
                }
                self.record(summary, &state)
            })
            .buffered(TASK_LISTINGS_IN_FLIGHT)
            .collect()
            .await;
        FetchOutcome::complete(records)
    }
}
