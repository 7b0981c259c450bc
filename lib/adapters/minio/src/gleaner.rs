//! Harvester source catalog stored alongside the logs.

use serde::{Deserialize, Serialize};

use gleanwatch_domain::BackendError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GleanerSource {
    pub name: String,
    #[serde(default)]
    pub propername: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default)]
    pub sourcetype: Option<String>,
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct GleanerConfig {
    #[serde(default)]
    sources: Vec<GleanerSource>,
}

pub fn gleaner_sources(bytes: &[u8]) -> Result<Vec<GleanerSource>, BackendError> {
    let config: GleanerConfig = serde_yaml::from_slice(bytes)
        .map_err(|err| BackendError::query(format!("harvester config is not valid: {err}")))?;
    Ok(config.sources)
}
