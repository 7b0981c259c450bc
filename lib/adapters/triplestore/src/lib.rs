//! Liveness probe for the graph server backing the knowledge graph.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use tracing::debug;

use gleanwatch_domain::{
    BackendError, HealthRecord, ProbeSummary, RecordDetail, ServiceType, normalize,
};
use gleanwatch_ports::{FetchOutcome, HealthBackend, HealthQuery, PassContext};

pub struct TriplestoreBackend {
    environment: String,
    http: reqwest::Client,
    url: String,
}

impl TriplestoreBackend {
    pub fn new(
        environment: impl Into<String>,
        url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, BackendError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| BackendError::unsupported(format!("http client setup failed: {err}")))?;
        Ok(Self {
            environment: environment.into(),
            http,
            url: url.into(),
        })
    }

    /// One GET against the graph endpoint, timed.
    pub async fn probe(&self, ctx: &PassContext) -> Result<ProbeSummary, BackendError> {
        let started = Instant::now();
        let response = self
            .http
            .get(&self.url)
            .send()
            .await
            .map_err(|err| BackendError::unreachable(err.to_string()))?;
        let response_ms = started.elapsed().as_millis() as u64;
        let status_code = response.status().as_u16();
        if matches!(status_code, 401 | 403) {
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::from_http(status_code, &body));
        }
        ctx.trace_payload(&self.url, &format!("HTTP {status_code}"));
        debug!(status_code, response_ms, "graph server probed");
        Ok(ProbeSummary {
            url: self.url.clone(),
            status_code,
            response_ms,
        })
    }
}

pub fn probe_state(status_code: u16) -> &'static str {
    match status_code {
        200..=299 => "up",
        500..=599 => "down",
        _ => "degraded",
    }
}

#[async_trait]
impl HealthBackend for TriplestoreBackend {
    fn service(&self) -> ServiceType {
        ServiceType::TripleStore
    }

    async fn fetch(&self, ctx: &PassContext, _query: &HealthQuery) -> FetchOutcome {
        let summary = match self.probe(ctx).await {
            Ok(summary) => summary,
            Err(err) => return FetchOutcome::failed(err),
        };
        let status = normalize(ServiceType::TripleStore, probe_state(summary.status_code));
        let record = HealthRecord::new(
            self.environment.clone(),
            ServiceType::TripleStore,
            summary.url.clone(),
            status,
            RecordDetail::Probe(summary),
        );
        FetchOutcome::complete(vec![record])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gleanwatch_domain::{ErrorKind, HealthStatus};
    use httpmock::prelude::*;

    async fn probe_with(code: u16) -> FetchOutcome {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/blazegraph/status");
                then.status(code).body("ok");
            })
            .await;
        let backend = TriplestoreBackend::new(
            "dev",
            server.url("/blazegraph/status"),
            Duration::from_secs(5),
        )
        .unwrap();
        backend
            .fetch(&PassContext::default(), &HealthQuery::default())
            .await
    }

    #[test]
    fn test_probe_state_bands() {
        assert_eq!(probe_state(200), "up");
        assert_eq!(probe_state(204), "up");
        assert_eq!(probe_state(302), "degraded");
        assert_eq!(probe_state(404), "degraded");
        assert_eq!(probe_state(503), "down");
    }

    #[tokio::test]
    async fn test_up_probe() {
        let outcome = probe_with(200).await;
        assert!(outcome.error.is_none());
        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.records[0].health(), HealthStatus::Ok);
        match &outcome.records[0].detail {
            RecordDetail::Probe(summary) => assert_eq!(summary.status_code, 200),
            other => panic!("unexpected detail {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_server_error_is_down() {
        let outcome = probe_with(500).await;
        assert!(outcome.error.is_none());
        assert_eq!(outcome.records[0].health(), HealthStatus::Failed);
    }

    #[tokio::test]
    async fn test_not_found_is_degraded() {
        let outcome = probe_with(404).await;
        assert_eq!(outcome.records[0].health(), HealthStatus::Degraded);
    }

    #[tokio::test]
    async fn test_forbidden_is_auth_rejected() {
        let outcome = probe_with(403).await;
        assert!(outcome.records.is_empty());
        assert_eq!(outcome.error.unwrap().kind, ErrorKind::AuthRejected);
    }

    #[tokio::test]
    async fn test_closed_port_is_unreachable() {
        let backend =
            TriplestoreBackend::new("dev", "http://127.0.0.1:9/status", Duration::from_secs(2))
                .unwrap();
        let outcome = backend
            .fetch(&PassContext::default(), &HealthQuery::default())
            .await;
        assert_eq!(outcome.error.unwrap().kind, ErrorKind::Unreachable);
    }
}
