//! Builds a concrete backend for each configured (environment, service) pair.

use std::sync::Arc;
use std::time::Duration;

use gleanwatch_adapter_dagster::{DagsterBackend, DagsterClient};
use gleanwatch_adapter_minio::{MinioBackend, MinioClient};
use gleanwatch_adapter_portainer::{PortainerBackend, PortainerClient};
use gleanwatch_adapter_triplestore::TriplestoreBackend;
use gleanwatch_domain::{AggregationSettings, BackendError, ServerEnvironment, ServiceType};
use gleanwatch_ports::{BackendFactory, HealthBackend};

/// Backends wired from each environment's config sections. A missing section
/// yields an `Unsupported` error for that pair only.
#[derive(Debug, Clone)]
pub struct EnvironmentBackends {
    timeout: Duration,
}

impl EnvironmentBackends {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn from_settings(settings: &AggregationSettings) -> Self {
        Self::new(settings.timeout())
    }
}

impl BackendFactory for EnvironmentBackends {
    fn backend(
        &self,
        environment: &ServerEnvironment,
        service: ServiceType,
    ) -> Result<Arc<dyn HealthBackend>, BackendError> {
        let key = environment.key.clone();
        let backend: Arc<dyn HealthBackend> = match service {
            ServiceType::Containers => {
                let section = environment
                    .portainer
                    .as_ref()
                    .ok_or_else(|| BackendError::not_configured("portainer"))?;
                let client = PortainerClient::new(section, self.timeout)?;
                Arc::new(PortainerBackend::new(key, client))
            }
            ServiceType::Scheduler => {
                let section = environment
                    .dagster
                    .as_ref()
                    .ok_or_else(|| BackendError::not_configured("dagster"))?;
                let client = DagsterClient::new(section.graphql_url.clone(), self.timeout)?;
                Arc::new(DagsterBackend::new(key, client).with_job_name(section.job_name.clone()))
            }
            ServiceType::ObjectStore => {
                let section = environment
                    .s3
                    .as_ref()
                    .ok_or_else(|| BackendError::not_configured("s3"))?;
                Arc::new(MinioBackend::new(key, MinioClient::new(section)?))
            }
            ServiceType::TripleStore => {
                let section = environment
                    .graph
                    .as_ref()
                    .ok_or_else(|| BackendError::not_configured("graph"))?;
                Arc::new(TriplestoreBackend::new(key, section.url.clone(), self.timeout)?)
            }
        };
        Ok(backend)
    }
}
