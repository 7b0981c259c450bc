use std::collections::HashMap;
use std::sync::Arc;

use gleanwatch_domain::{BackendError, ServerEnvironment, ServiceType};
use gleanwatch_ports::{BackendFactory, BackendSet, HealthBackend};

/// Pre-built backends keyed by environment. Pairs with no backend are reported
/// as not configured.
#[derive(Clone, Default)]
pub struct StaticBackends {
    environments: HashMap<String, BackendSet>,
}

impl StaticBackends {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_backend(mut self, environment: &str, backend: Arc<dyn HealthBackend>) -> Self {
        self.insert(environment, backend);
        self
    }

    pub fn insert(&mut self, environment: &str, backend: Arc<dyn HealthBackend>) {
        self.environments
            .entry(environment.to_string())
            .or_default()
            .insert(backend);
    }
}

impl BackendFactory for StaticBackends {
    fn backend(
        &self,
        environment: &ServerEnvironment,
        service: ServiceType,
    ) -> Result<Arc<dyn HealthBackend>, BackendError> {
        self.environments
            .get(&environment.key)
            .and_then(|set| set.get(service))
            .ok_or_else(|| BackendError::not_configured(service.as_str()))
    }
}
