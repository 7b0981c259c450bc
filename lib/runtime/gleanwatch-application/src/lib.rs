//! Aggregation pass orchestration.

pub mod aggregator;
pub mod registry;

pub use aggregator::Aggregator;
pub use registry::StaticBackends;
