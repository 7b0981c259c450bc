//! Typed scheduler run filter.
//!
//! Combinations are validated when the filter is built; adapters serialize the
//! resolved filter as GraphQL variables instead of splicing strings into a query.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::error::FilterError;
use crate::window::{TimeWindow, now_epoch_seconds};

pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const MAX_PAGE_SIZE: u32 = 1_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    Started,
    Success,
    Failure,
}

impl RunStatus {
    pub const ALL: [RunStatus; 3] = [RunStatus::Started, RunStatus::Success, RunStatus::Failure];
}

/// Lower bound on run creation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeBound {
    /// Fixed epoch seconds.
    Since(i64),
    /// Relative to the moment the request is issued.
    Window(TimeWindow),
}

impl TimeBound {
    pub fn resolve(self, now_epoch: i64) -> i64 {
        match self {
            TimeBound::Since(epoch) => epoch,
            TimeBound::Window(window) => window.created_after(now_epoch),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunFilter {
    statuses: BTreeSet<RunStatus>,
    job_name: Option<String>,
    created_after: Option<TimeBound>,
    page_size: u32,
}

/// Wire shape of the `filter` variable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunsFilterInput {
    pub statuses: Vec<RunStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pipeline_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_after: Option<i64>,
}

impl RunFilter {
    pub fn builder() -> RunFilterBuilder {
        RunFilterBuilder::default()
    }

    pub fn statuses(&self) -> impl Iterator<Item = RunStatus> + '_ {
        self.statuses.iter().copied()
    }

    pub fn job_name(&self) -> Option<&str> {
        self.job_name.as_deref()
    }

    pub fn created_after(&self) -> Option<TimeBound> {
        self.created_after
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Resolve against the current clock. Called per request so windows slide.
    pub fn to_input(&self) -> RunsFilterInput {
        self.to_input_at(now_epoch_seconds())
    }

    pub fn to_input_at(&self, now_epoch: i64) -> RunsFilterInput {
        RunsFilterInput {
            statuses: self.statuses.iter().copied().collect(),
            pipeline_name: self.job_name.clone(),
            created_after: self.created_after.map(|bound| bound.resolve(now_epoch)),
        }
    }
}

impl Default for RunFilter {
    fn default() -> Self {
        Self {
            statuses: RunStatus::ALL.into_iter().collect(),
            job_name: None,
            created_after: None,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RunFilterBuilder {
    statuses: BTreeSet<RunStatus>,
    job_name: Option<String>,
    created_after: Option<TimeBound>,
    page_size: Option<u32>,
}

impl RunFilterBuilder {
    pub fn status(mut self, status: RunStatus) -> Self {
        self.statuses.insert(status);
        self
    }

    pub fn statuses<I>(mut self, statuses: I) -> Self
    where
        I: IntoIterator<Item = RunStatus>,
    {
        self.statuses.extend(statuses);
        self
    }

    pub fn job_name(mut self, name: impl Into<String>) -> Self {
        self.job_name = Some(name.into());
        self
    }

    pub fn created_after(mut self, epoch: i64) -> Self {
        self.created_after = Some(TimeBound::Since(epoch));
        self
    }

    pub fn within(mut self, window: TimeWindow) -> Self {
        self.created_after = Some(TimeBound::Window(window));
        self
    }

    pub fn page_size(mut self, size: u32) -> Self {
        self.page_size = Some(size);
        self
    }

    pub fn build(self) -> Result<RunFilter, FilterError> {
        if self.statuses.is_empty() {
            return Err(FilterError::NoStatuses);
        }
        let job_name = match self.job_name {
            Some(name) if name.trim().is_empty() => return Err(FilterError::BlankJobName),
            Some(name) => Some(name.trim().to_string()),
            None => None,
        };
        match self.created_after {
            Some(TimeBound::Since(epoch)) if epoch < 0 => {
                return Err(FilterError::NegativeBound(epoch));
            }
            Some(TimeBound::Window(window)) if window.seconds() < 0 => {
                return Err(FilterError::NegativeBound(window.seconds()));
            }
            _ => {}
        }
        let page_size = self.page_size.unwrap_or(DEFAULT_PAGE_SIZE);
        if page_size == 0 || page_size > MAX_PAGE_SIZE {
            return Err(FilterError::PageSize {
                got: page_size,
                max: MAX_PAGE_SIZE,
            });
        }
        Ok(RunFilter {
            statuses: self.statuses,
            job_name,
            created_after: self.created_after,
            page_size,
        })
    }
}
