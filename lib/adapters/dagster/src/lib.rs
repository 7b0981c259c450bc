//! Job-scheduler backend (Dagster GraphQL).

mod client;
mod query;

use async_trait::async_trait;
use tokio::time::Instant;
use tracing::{info, warn};

use gleanwatch_domain::{HealthRecord, RunFilter, RunRecord, ServiceType};
use gleanwatch_ports::{
    FetchOutcome, HealthBackend, HealthQuery, PassContext, Walk, walk_pages_until,
};

pub use client::{DagsterClient, RunPages};

pub struct DagsterBackend {
    environment: String,
    client: DagsterClient,
    job_name: Option<String>,
}

impl DagsterBackend {
    pub fn new(environment: impl Into<String>, client: DagsterClient) -> Self {
        Self {
            environment: environment.into(),
            client,
            job_name: None,
        }
    }

    /// Job to filter on when the query itself names none.
    pub fn with_job_name(mut self, job_name: Option<String>) -> Self {
        self.job_name = job_name.filter(|name| !name.trim().is_empty());
        self
    }

    /// Walk every page matching `filter`, oldest page first. Pages read before
    /// `deadline` are kept when a later page is still pending.
    pub async fn fetch_all_runs(
        &self,
        ctx: &PassContext,
        filter: &RunFilter,
        max_pages: usize,
        deadline: Option<Instant>,
    ) -> Walk<RunRecord> {
        let pages = RunPages {
            client: &self.client,
            ctx,
            filter,
            job_override: self.job_name.as_deref(),
        };
        walk_pages_until(&pages, max_pages, deadline).await
    }
}

#[async_trait]
impl HealthBackend for DagsterBackend {
    fn service(&self) -> ServiceType {
        ServiceType::Scheduler
    }

    async fn fetch(&self, ctx: &PassContext, query: &HealthQuery) -> FetchOutcome {
        let walk = self
            .fetch_all_runs(ctx, &query.runs, query.max_pages, query.deadline)
            .await;
        if !walk.exhausted && walk.error.is_none() {
            warn!(pages = walk.pages, "run listing truncated at page cap");
        }
        info!(runs = walk.items.len(), pages = walk.pages, "scheduler runs collected");
        let records = walk
            .items
            .into_iter()
            .map(|run| HealthRecord::from_run(self.environment.clone(), run))
            .collect();
        match walk.error {
            Some(err) => FetchOutcome::partial(records, err),
            None => FetchOutcome::complete(records),
        }
    }
}
