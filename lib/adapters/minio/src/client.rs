//! Bucket listing and object reads over the S3 protocol.

use std::sync::Arc;

use futures::TryStreamExt;
use object_store::ObjectStore;
use object_store::aws::AmazonS3Builder;
use object_store::path::Path as ObjectPath;
use serde::de::DeserializeOwned;
use tracing::debug;

use gleanwatch_domain::{BackendError, ObjectSummary, S3Section};

#[derive(Debug, Clone)]
pub struct MinioClient {
    store: Arc<dyn ObjectStore>,
    bucket: String,
}

impl MinioClient {
    pub fn new(section: &S3Section) -> Result<Self, BackendError> {
        let mut builder = AmazonS3Builder::new()
            .with_bucket_name(&section.bucket)
            .with_region(&section.region)
            .with_endpoint(section.endpoint_url())
            .with_allow_http(!section.use_ssl)
            .with_virtual_hosted_style_request(false);
        match (&section.access_key, &section.secret_key) {
            (Some(access), Some(secret)) if section.has_credentials() => {
                builder = builder
                    .with_access_key_id(access.expose())
                    .with_secret_access_key(secret.expose());
            }
            _ => builder = builder.with_skip_signature(true),
        }
        let store = builder
            .build()
            .map_err(|err| BackendError::unsupported(format!("object store setup failed: {err}")))?;
        Ok(Self::with_store(Arc::new(store), section.bucket.clone()))
    }

    pub fn with_store(store: Arc<dyn ObjectStore>, bucket: impl Into<String>) -> Self {
        Self {
            store,
            bucket: bucket.into(),
        }
    }

    /// Every object under `prefix`, in listing order.
    pub async fn list_objects(&self, prefix: &str) -> Result<Vec<ObjectSummary>, BackendError> {
        let prefix = prefix.trim_matches('/');
        let location = (!prefix.is_empty()).then(|| ObjectPath::from(prefix));
        let objects: Vec<_> = self
            .store
            .list(location.as_ref())
            .map_ok(|meta| ObjectSummary {
                key: meta.location.to_string(),
                size: meta.size as u64,
                last_modified: meta.last_modified,
            })
            .try_collect()
            .await
            .map_err(store_error)?;
        debug!(bucket = %self.bucket, prefix, count = objects.len(), "objects listed");
        Ok(objects
            .into_iter()
            .filter(|object| !object.key.ends_with('/'))
            .collect())
    }

    pub async fn get_object(&self, key: &str) -> Result<Vec<u8>, BackendError> {
        let location = ObjectPath::from(key);
        let result = self.store.get(&location).await.map_err(store_error)?;
        let bytes = result.bytes().await.map_err(store_error)?;
        Ok(bytes.to_vec())
    }

    /// Fetch a YAML object and deserialize it.
    pub async fn get_yaml<T>(&self, key: &str) -> Result<T, BackendError>
    where
        T: DeserializeOwned,
    {
        let bytes = self.get_object(key).await?;
        serde_yaml::from_slice(&bytes)
            .map_err(|err| BackendError::query(format!("{key} is not valid YAML: {err}")))
    }
}

fn store_error(err: object_store::Error) -> BackendError {
    match err {
        object_store::Error::NotFound { path, .. } => {
            BackendError::not_found(format!("no object at {path}"))
        }
        object_store::Error::Unauthenticated { path, .. }
        | object_store::Error::PermissionDenied { path, .. } => {
            BackendError::auth_rejected(format!("access to {path} denied"))
        }
        other => {
            let message = other.to_string();
            if message.contains("NoSuchBucket") {
                BackendError::not_found(message)
            } else if message.contains("AccessDenied")
                || message.contains("InvalidAccessKeyId")
                || message.contains("SignatureDoesNotMatch")
                || message.contains("403")
            {
                BackendError::auth_rejected(message)
            } else {
                BackendError::unreachable(message)
            }
        }
    }
}
