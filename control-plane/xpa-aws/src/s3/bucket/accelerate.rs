use std::sync::Arc;

use async_trait::async_trait;
use xpa_runtime::ExternalError;
use xpa_runtime::subresource::{AspectStatus, SubresourceClient, classify};

use super::bucket_name;
use crate::clients::S3Api;
use crate::crd::bucket::Bucket;

const ERR_GET: &str = "cannot get bucket accelerate configuration";
const ERR_PUT: &str = "cannot put bucket accelerate configuration";

pub const SUSPENDED: &str = "Suspended";

/// `Suspended` is what S3 reports after acceleration was switched off, so it
/// reads the same as never configured.
fn active(status: Option<&str>) -> Option<&str> {
    status.filter(|s| !s.is_empty() && *s != SUSPENDED)
}

pub struct AccelerateClient {
    s3: Arc<dyn S3Api>,
}

impl AccelerateClient {
    pub fn new(s3: Arc<dyn S3Api>) -> Self {
        Self { s3 }
    }
}

#[async_trait]
impl SubresourceClient<Bucket> for AccelerateClient {
    fn name(&self) -> &'static str {
        "accelerate"
    }

    async fn observe(&self, mg: &Bucket) -> Result<AspectStatus, ExternalError> {
        let observed = self
            .s3
            .get_bucket_accelerate_configuration(&bucket_name(mg))
            .await
            .map_err(|e| ExternalError::api(ERR_GET, e))?;
        let desired = mg
            .spec
            .for_provider
            .accelerate_configuration
            .as_ref()
            .map(|c| c.status.as_str());
        Ok(classify(active(desired).as_ref(), active(observed.as_deref()).as_ref()))
    }

    async fn create_or_update(&self, mg: &Bucket) -> Result<(), ExternalError> {
        let Some(cfg) = mg.spec.for_provider.accelerate_configuration.as_ref() else {
            return Ok(());
        };
        self.s3
            .put_bucket_accelerate_configuration(&bucket_name(mg), &cfg.status)
            .await
            .map_err(|e| ExternalError::api(ERR_PUT, e))
    }

    async fn delete(&self, mg: &Bucket) -> Result<(), ExternalError> {
        self.s3
            .put_bucket_accelerate_configuration(&bucket_name(mg), SUSPENDED)
            .await
            .map_err(|e| ExternalError::api(ERR_PUT, e))
    }
}
