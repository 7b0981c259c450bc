//! Health aggregation across container, scheduler, object-store and graph backends.

pub mod adapters;
pub mod runtime;
pub mod ui;

pub use adapters::EnvironmentBackends;
pub use runtime::{
    PassOptions, config_path, known_sources, run_pass, select_environments, source_breakdown,
};
pub use ui::{OutputFormat, render, render_sources};
