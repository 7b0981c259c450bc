use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{Instrument, info, info_span, warn};

use gleanwatch_domain::{
    AggregationReport, AggregationSettings, BackendError, ReportEntry, ServerEnvironment,
    ServiceType,
};
use gleanwatch_ports::{BackendFactory, HealthBackend, HealthQuery, PassContext};

/// Slack after a call's deadline before the call is abandoned outright.
const DEADLINE_GRACE: Duration = Duration::from_millis(250);

/// Fans one pass out over every (environment, service) pair.
///
/// Calls run concurrently up to `max_concurrency`, each under its own timeout.
/// Backends see the timeout as a deadline on the query so they can return what
/// they gathered before it; a call still running `DEADLINE_GRACE` later is dropped.
/// A failing, hanging or panicking backend only ever affects its own entry.
/// Dropping the future returned by [`Aggregator::run`] aborts calls still in flight.
pub struct Aggregator {
    factory: Arc<dyn BackendFactory>,
    timeout: Duration,
    max_concurrency: usize,
}

impl Aggregator {
    pub fn new(factory: Arc<dyn BackendFactory>) -> Self {
        Self::from_settings(factory, &AggregationSettings::default())
    }

    pub fn from_settings(factory: Arc<dyn BackendFactory>, settings: &AggregationSettings) -> Self {
        Self {
            factory,
            timeout: settings.timeout(),
            max_concurrency: settings.max_concurrency.max(1),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    pub async fn run(
        &self,
        environments: &[ServerEnvironment],
        services: &[ServiceType],
        query: &HealthQuery,
        ctx: &PassContext,
    ) -> AggregationReport {
        let span = info_span!("aggregation_pass", pass_id = %ctx.pass_id);
        self.run_pass(environments, services, query, ctx)
            .instrument(span)
            .await
    }

    async fn run_pass(
        &self,
        environments: &[ServerEnvironment],
        services: &[ServiceType],
        query: &HealthQuery,
        ctx: &PassContext,
    ) -> AggregationReport {
        let started_at = Utc::now();
        let environments = distinct_environments(environments);
        let services = distinct_services(services);
        let pairs: Vec<(&ServerEnvironment, ServiceType)> = environments
            .iter()
            .flat_map(|environment| services.iter().map(move |service| (*environment, *service)))
            .collect();
        info!(
            environments = environments.len(),
            services = services.len(),
            calls = pairs.len(),
            "aggregation pass started"
        );

        let mut slots: Vec<Option<ReportEntry>> = vec![None; pairs.len()];
        let permits = Arc::new(Semaphore::new(self.max_concurrency));
        let query = Arc::new(query.clone());
        let mut calls = JoinSet::new();

        for (index, (environment, service)) in pairs.iter().enumerate() {
            let backend = match self.factory.backend(environment, *service) {
                Ok(backend) => backend,
                Err(err) => {
                    warn!(environment = %environment.key, %service, error = %err, "no backend for pair");
                    slots[index] = Some(ReportEntry::failed(environment.key.clone(), *service, err));
                    continue;
                }
            };
            let call = BackendCall {
                environment: environment.key.clone(),
                service: *service,
                backend,
                timeout: self.timeout,
            };
            let permits = Arc::clone(&permits);
            let query = Arc::clone(&query);
            let ctx = ctx.clone();
            let span = info_span!("backend_call", environment = %environment.key, %service);
            calls.spawn(
                async move {
                    let _permit = permits.acquire_owned().await;
                    (index, call.execute(&ctx, &query).await)
                }
                .instrument(span),
            );
        }

        while let Some(joined) = calls.join_next().await {
            match joined {
                Ok((index, entry)) => slots[index] = Some(entry),
                Err(err) => warn!(error = %err, panicked = err.is_panic(), "backend task lost"),
            }
        }

        let entries: Vec<ReportEntry> = pairs
            .iter()
            .zip(slots)
            .map(|((environment, service), slot)| {
                slot.unwrap_or_else(|| {
                    ReportEntry::failed(
                        environment.key.clone(),
                        *service,
                        BackendError::unreachable("backend call aborted before reporting"),
                    )
                })
            })
            .collect();

        let report = AggregationReport {
            pass_id: ctx.pass_id.to_string(),
            started_at,
            finished_at: Utc::now(),
            entries,
        };
        let tally = report.tally();
        info!(
            entries = report.entries.len(),
            errors = tally.errors,
            ok = tally.ok,
            degraded = tally.degraded,
            failed = tally.failed,
            unknown = tally.unknown,
            "aggregation pass finished"
        );
        report
    }
}

/// First occurrence of each environment key, in request order.
fn distinct_environments(environments: &[ServerEnvironment]) -> Vec<&ServerEnvironment> {
    let mut seen = HashSet::new();
    environments
        .iter()
        .filter(|environment| {
            let first = seen.insert(environment.key.as_str());
            if !first {
                warn!(environment = %environment.key, "duplicate environment key, keeping the first");
            }
            first
        })
        .collect()
}

fn distinct_services(services: &[ServiceType]) -> Vec<ServiceType> {
    let mut seen = HashSet::new();
    services
        .iter()
        .copied()
        .filter(|service| seen.insert(*service))
        .collect()
}

struct BackendCall {
    environment: String,
    service: ServiceType,
    backend: Arc<dyn HealthBackend>,
    timeout: Duration,
}

impl BackendCall {
    async fn execute(self, ctx: &PassContext, query: &HealthQuery) -> ReportEntry {
        let started = Instant::now();
        let query = query
            .clone()
            .with_deadline(tokio::time::Instant::now() + self.timeout);
        let budget = self.timeout + DEADLINE_GRACE;
        let entry = match tokio::time::timeout(budget, self.backend.fetch(ctx, &query)).await {
            Ok(outcome) => {
                for record in &outcome.records {
                    if let Some(note) = record.status.note() {
                        warn!(source_id = %record.source_id, %note, "status not recognized");
                    }
                }
                ReportEntry {
                    environment: self.environment,
                    service: self.service,
                    records: outcome.records,
                    error: outcome.error,
                    elapsed_ms: 0,
                }
            }
            Err(_) => ReportEntry::failed(
                self.environment,
                self.service,
                BackendError::unreachable(format!("timed out after {:?}", self.timeout)),
            ),
        };

        match &entry.error {
            Some(err) => warn!(
                kind = %err.kind,
                detail = %err.detail,
                records = entry.records.len(),
                "backend call failed"
            ),
            None => info!(records = entry.records.len(), "backend call complete"),
        }
        entry.with_elapsed_ms(started.elapsed().as_millis() as u64)
    }
}
