use std::sync::Arc;

use async_trait::async_trait;
use xpa_runtime::ExternalError;
use xpa_runtime::subresource::{AspectStatus, SubresourceClient, classify};

use super::bucket_name;
use crate::clients::S3Api;
use crate::clients::s3::LoggingEnabled;
use crate::crd::bucket::{Bucket, LoggingConfiguration};

const ERR_GET: &str = "cannot get bucket logging configuration";
const ERR_PUT: &str = "cannot put bucket logging configuration";

/// The logging status S3 would report for `cfg`.
pub fn logging_enabled(cfg: &LoggingConfiguration) -> LoggingEnabled {
    LoggingEnabled {
        target_bucket: cfg.target_bucket.clone().unwrap_or_default(),
        target_prefix: cfg.target_prefix.clone(),
    }
}

pub struct LoggingClient {
    s3: Arc<dyn S3Api>,
}

impl LoggingClient {
    pub fn new(s3: Arc<dyn S3Api>) -> Self {
        Self { s3 }
    }
}

#[async_trait]
impl SubresourceClient<Bucket> for LoggingClient {
    fn name(&self) -> &'static str {
        "logging"
    }

    async fn observe(&self, mg: &Bucket) -> Result<AspectStatus, ExternalError> {
        let observed = self
            .s3
            .get_bucket_logging(&bucket_name(mg))
            .await
            .map_err(|e| ExternalError::api(ERR_GET, e))?;
        let desired = mg
            .spec
            .for_provider
            .logging_configuration
            .as_ref()
            .map(logging_enabled);
        Ok(classify(desired.as_ref(), observed.as_ref()))
    }

    async fn create_or_update(&self, mg: &Bucket) -> Result<(), ExternalError> {
        let Some(cfg) = mg.spec.for_provider.logging_configuration.as_ref() else {
            return Ok(());
        };
        if cfg.target_bucket.as_deref().is_none_or(str::is_empty) {
            return Err(ExternalError::Invalid(
                "loggingConfiguration.targetBucket is required".into(),
            ));
        }
        self.s3
            .put_bucket_logging(&bucket_name(mg), Some(&logging_enabled(cfg)))
            .await
            .map_err(|e| ExternalError::api(ERR_PUT, e))
    }

    /// S3 has no delete verb for logging; an empty status disables it.
    async fn delete(&self, mg: &Bucket) -> Result<(), ExternalError> {
        self.s3
            .put_bucket_logging(&bucket_name(mg), None)
            .await
            .map_err(|e| ExternalError::api(ERR_PUT, e))
    }
}
