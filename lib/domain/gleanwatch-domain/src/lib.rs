//! Domain models and invariants.

pub mod config;
pub mod cursor;
pub mod error;
pub mod filter;
pub mod health;
pub mod normalize;
pub mod record;
pub mod report;
pub mod stats;
pub mod window;

pub use config::{
    AggregationSettings, DagsterSection, GraphSection, MAX_WINDOW_DAYS, PortainerSection,
    S3Section, Secret, ServerEnvironment, WatchConfig,
};
pub use cursor::PageCursor;
pub use error::{BackendError, ErrorKind, FilterError};
pub use filter::{
    DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE, RunFilter, RunFilterBuilder, RunStatus, RunsFilterInput,
    TimeBound,
};
pub use health::{HealthStatus, ServiceType};
pub use normalize::{StatusReading, normalize, normalize_task};
pub use record::{
    HealthRecord, ObjectSummary, ProbeSummary, RecordDetail, RunRecord, RunTag, ServiceSummary,
    TaskSummary,
};
pub use report::{AggregationReport, HealthTally, ReportEntry};
pub use stats::{
    DurationStats, SourceStatistics, UNKNOWN_SOURCE, source_from_job_name, source_from_tags,
    source_statistics,
};
pub use window::{TimeWindow, compute_created_after, now_epoch_seconds};
