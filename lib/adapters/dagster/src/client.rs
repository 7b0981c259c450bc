use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::debug;

use gleanwatch_domain::{BackendError, PageCursor, RunFilter, RunRecord};
use gleanwatch_ports::{Page, PagedSource, PassContext};

use crate::query::{GraphQlRequest, GraphQlResponse, RUNS_QUERY, RUNS_TYPENAME, RunsVariables};

#[derive(Debug, Clone)]
pub struct DagsterClient {
    http: reqwest::Client,
    graphql_url: String,
}

impl DagsterClient {
    pub fn new(graphql_url: impl Into<String>, timeout: Duration) -> Result<Self, BackendError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| BackendError::unsupported(format!("http client setup failed: {err}")))?;
        Ok(Self::with_http(http, graphql_url))
    }

    pub fn with_http(http: reqwest::Client, graphql_url: impl Into<String>) -> Self {
        Self {
            http,
            graphql_url: graphql_url.into(),
        }
    }

    /// One page of runs. The filter is resolved against the clock on every call.
    pub async fn fetch_runs(
        &self,
        ctx: &PassContext,
        filter: &RunFilter,
        job_override: Option<&str>,
        cursor: Option<&PageCursor>,
    ) -> Result<Page<RunRecord>, BackendError> {
        let mut input = filter.to_input();
        if input.pipeline_name.is_none() {
            input.pipeline_name = job_override.map(str::to_string);
        }
        let request = GraphQlRequest {
            query: RUNS_QUERY,
            variables: RunsVariables {
                cursor: cursor.map(PageCursor::as_str),
                filter: input,
                limit: filter.page_size(),
            },
        };

        let response = self
            .http
            .post(&self.graphql_url)
            .json(&request)
            .send()
            .await
            .map_err(transport_error)?;
        let status = response.status();
        let body = response.text().await.map_err(transport_error)?;
        ctx.trace_payload(&self.graphql_url, &body);
        if status != StatusCode::OK {
            return Err(BackendError::from_http(status.as_u16(), &body));
        }
        let page = decode_runs(&body)?;
        debug!(
            records = page.items.len(),
            more = page.next.is_some(),
            "scheduler page decoded"
        );
        Ok(page)
    }
}

fn decode_runs(body: &str) -> Result<Page<RunRecord>, BackendError> {
    let response: GraphQlResponse = serde_json::from_str(body)
        .map_err(|err| BackendError::query(format!("undecodable runs response: {err}")))?;

    let union = response
        .data
        .and_then(|data| data.runs_or_error)
        .ok_or_else(|| {
            let messages: Vec<_> = response.errors.iter().map(|e| e.message.as_str()).collect();
            if messages.is_empty() {
                BackendError::query("response carried no runsOrError field")
            } else {
                BackendError::query(messages.join("; "))
            }
        })?;

    if union.typename != RUNS_TYPENAME {
        let message = union.message.unwrap_or_default();
        return Err(BackendError::query(format!("{}: {message}", union.typename)));
    }

    Ok(Page {
        items: union.results,
        next: PageCursor::from_response(union.cursor),
    })
}

fn transport_error(err: reqwest::Error) -> BackendError {
    if err.is_timeout() {
        BackendError::unreachable(format!("request timed out: {err}"))
    } else {
        BackendError::unreachable(err.to_string())
    }
}

/// Binds a client and filter so the cursor walker can drive it.
pub struct RunPages<'a> {
    pub client: &'a DagsterClient,
    pub ctx: &'a PassContext,
    pub filter: &'a RunFilter,
    pub job_override: Option<&'a str>,
}

#[async_trait]
impl PagedSource for RunPages<'_> {
    type Item = RunRecord;

    async fn fetch_page(&self, cursor: Option<&PageCursor>) -> Result<Page<RunRecord>, BackendError> {
        self.client
            .fetch_runs(self.ctx, self.filter, self.job_override, cursor)
            .await
    }
}
