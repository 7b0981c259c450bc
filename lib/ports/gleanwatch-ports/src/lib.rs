//! Capability traits shared by the aggregator and the backend adapters.

pub mod pagination;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::time::Instant;
use uuid::Uuid;

use gleanwatch_domain::{
    AggregationSettings, BackendError, FilterError, HealthRecord, RunFilter, RunStatus,
    ServerEnvironment, ServiceType, TimeWindow,
};

pub use pagination::{Page, PagedSource, Walk, walk_pages, walk_pages_until};

/// Per-pass logging context, passed explicitly into every backend call.
#[derive(Debug, Clone)]
pub struct PassContext {
    pub pass_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub trace_payloads: bool,
}

impl PassContext {
    pub fn new(trace_payloads: bool) -> Self {
        Self {
            pass_id: Uuid::new_v4(),
            started_at: Utc::now(),
            trace_payloads,
        }
    }

    /// Log a raw request or response body when payload tracing is on for this pass.
    pub fn trace_payload(&self, label: &str, payload: &str) {
        if self.trace_payloads {
            tracing::debug!(pass_id = %self.pass_id, label, payload, "backend payload");
        }
    }
}

impl Default for PassContext {
    fn default() -> Self {
        Self::new(false)
    }
}

/// What one pass asks of every backend.
#[derive(Debug, Clone)]
pub struct HealthQuery {
    pub runs: RunFilter,
    pub window: TimeWindow,
    pub log_prefix: String,
    pub include_tasks: bool,
    pub max_pages: usize,
    /// Point by which a backend should stop issuing requests and report what it has.
    pub deadline: Option<Instant>,
}

impl HealthQuery {
    /// Fails when the settings describe a run filter the scheduler would reject.
    pub fn from_settings(settings: &AggregationSettings) -> Result<Self, FilterError> {
        let runs = RunFilter::builder()
            .statuses(RunStatus::ALL)
            .within(settings.window())
            .page_size(settings.page_size)
            .build()?;
        Ok(Self::with_filter(settings, runs))
    }

    fn with_filter(settings: &AggregationSettings, runs: RunFilter) -> Self {
        Self {
            runs,
            window: settings.window(),
            log_prefix: settings.log_prefix.clone(),
            include_tasks: settings.include_tasks,
            max_pages: settings.max_pages.max(1),
            deadline: None,
        }
    }

    pub fn with_runs(mut self, runs: RunFilter) -> Self {
        self.runs = runs;
        self
    }

    /// Keeps the earlier of `deadline` and any deadline already set.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(current) => current.min(deadline),
            None => deadline,
        });
        self
    }
}

impl Default for HealthQuery {
    fn default() -> Self {
        let settings = AggregationSettings::default();
        Self::from_settings(&settings)
            .unwrap_or_else(|_| Self::with_filter(&settings, RunFilter::default()))
    }
}

/// Records gathered by one backend call, plus the error that stopped it, if any.
#[derive(Debug, Clone, Default)]
pub struct FetchOutcome {
    pub records: Vec<HealthRecord>,
    pub error: Option<BackendError>,
}

impl FetchOutcome {
    pub fn complete(records: Vec<HealthRecord>) -> Self {
        Self {
            records,
            error: None,
        }
    }

    pub fn failed(error: BackendError) -> Self {
        Self {
            records: Vec::new(),
            error: Some(error),
        }
    }

    pub fn partial(records: Vec<HealthRecord>, error: BackendError) -> Self {
        Self {
            records,
            error: Some(error),
        }
    }

    pub fn into_result(self) -> Result<Vec<HealthRecord>, BackendError> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.records),
        }
    }
}

impl From<Result<Vec<HealthRecord>, BackendError>> for FetchOutcome {
    fn from(result: Result<Vec<HealthRecord>, BackendError>) -> Self {
        match result {
            Ok(records) => Self::complete(records),
            Err(err) => Self::failed(err),
        }
    }
}

/// One external system bound to one environment.
///
/// Implementations never panic or return transport errors directly; every
/// failure is folded into the outcome.
#[async_trait]
pub trait HealthBackend: Send + Sync {
    fn service(&self) -> ServiceType;

    async fn fetch(&self, ctx: &PassContext, query: &HealthQuery) -> FetchOutcome;
}

/// Builds the backend for a pair, or explains why it cannot.
pub trait BackendFactory: Send + Sync {
    fn backend(
        &self,
        environment: &ServerEnvironment,
        service: ServiceType,
    ) -> Result<Arc<dyn HealthBackend>, BackendError>;
}

/// Backends for a single environment, keyed by service type.
#[derive(Clone, Default)]
pub struct BackendSet {
    backends: HashMap<ServiceType, Arc<dyn HealthBackend>>,
}

impl BackendSet {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, backend: Arc<dyn HealthBackend>) {
        self.backends.insert(backend.service(), backend);
    }

    pub fn get(&self, service: ServiceType) -> Option<Arc<dyn HealthBackend>> {
        self.backends.get(&service).cloned()
    }
}
