//! Shared formatting helpers used by the CLI and any report renderer.

mod duration;
mod report;
mod sources;

pub use duration::format_duration;
pub use report::{EntrySummary, entry_summaries, problem_lines, record_lines, summary_lines};
pub use sources::source_statistics_lines;
