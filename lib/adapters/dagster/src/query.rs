//! Fixed runs query and its wire shapes.

use serde::{Deserialize, Serialize};

use gleanwatch_domain::{RunRecord, RunsFilterInput};

pub(crate) const RUNS_QUERY: &str = r#"query FilteredRunsQuery($cursor: String, $filter: RunsFilter, $limit: Int) {
  runsOrError(filter: $filter, cursor: $cursor, limit: $limit) {
    __typename
    ... on Runs {
      results {
        runId
        jobName
        status
        runConfigYaml
        startTime
        endTime
        tags {
          key
          value
        }
      }
      cursor
    }
    ... on InvalidPipelineRunsFilterError {
      message
    }
    ... on PythonError {
      message
    }
  }
}"#;

pub(crate) const RUNS_TYPENAME: &str = "Runs";

#[derive(Debug, Serialize)]
pub(crate) struct GraphQlRequest<'a> {
    pub query: &'static str,
    pub variables: RunsVariables<'a>,
}

#[derive(Debug, Serialize)]
pub(crate) struct RunsVariables<'a> {
    pub cursor: Option<&'a str>,
    pub filter: RunsFilterInput,
    pub limit: u32,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GraphQlResponse {
    #[serde(default)]
    pub data: Option<RunsData>,
    #[serde(default)]
    pub errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GraphQlError {
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RunsData {
    #[serde(default)]
    pub runs_or_error: Option<RunsOrError>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RunsOrError {
    #[serde(rename = "__typename")]
    pub typename: String,
    #[serde(default)]
    pub results: Vec<RunRecord>,
    #[serde(default)]
    pub cursor: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}
