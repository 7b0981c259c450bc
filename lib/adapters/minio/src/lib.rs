//! Object-store backend (MinIO / S3): recent harvester logs and config objects.

mod client;
mod gleaner;

use async_trait::async_trait;
use chrono::Utc;

use gleanwatch_domain::{HealthRecord, RecordDetail, ServiceType, normalize};
use gleanwatch_ports::{FetchOutcome, HealthBackend, HealthQuery, PassContext};

pub use client::MinioClient;
pub use gleaner::{GleanerSource, gleaner_sources};

pub struct MinioBackend {
    environment: String,
    client: MinioClient,
}

impl MinioBackend {
    pub fn new(environment: impl Into<String>, client: MinioClient) -> Self {
        Self {
            environment: environment.into(),
            client,
        }
    }

    /// Harvester sources declared in the config object at `key`.
    pub async fn sources(
        &self,
        key: &str,
    ) -> Result<Vec<GleanerSource>, gleanwatch_domain::BackendError> {
        let bytes = self.client.get_object(key).await?;
        gleaner_sources(&bytes)
    }
}

#[async_trait]
impl HealthBackend for MinioBackend {
    fn service(&self) -> ServiceType {
        ServiceType::ObjectStore
    }

    async fn fetch(&self, _ctx: &PassContext, query: &HealthQuery) -> FetchOutcome {
        let objects = match self.client.list_objects(&query.log_prefix).await {
            Ok(objects) => objects,
            Err(err) => return FetchOutcome::failed(err),
        };

        let cutoff = query.window.cutoff(Utc::now());
        let mut recent: Vec<_> = objects
            .into_iter()
            .filter(|object| object.last_modified > cutoff)
            .collect();
        recent.sort_by_key(|object| object.last_modified);

        let records = recent
            .into_iter()
            .map(|object| {
                HealthRecord::new(
                    self.environment.clone(),
                    ServiceType::ObjectStore,
                    object.key.clone(),
                    normalize(ServiceType::ObjectStore, "present"),
                    RecordDetail::Object(object),
                )
            })
            .collect();
        FetchOutcome::complete(records)
    }
}
