use std::sync::Arc;

use async_trait::async_trait;
use xpa_runtime::ExternalError;
use xpa_runtime::subresource::{AspectStatus, SubresourceClient, classify};

use super::bucket_name;
use crate::clients::S3Api;
use crate::crd::bucket::{Bucket, VersioningConfiguration};

const ERR_GET: &str = "cannot get bucket versioning";
const ERR_PUT: &str = "cannot put bucket versioning";

pub const SUSPENDED: &str = "Suspended";

/// Versioning cannot be removed from a bucket once enabled, only suspended,
/// so suspended reads the same as never enabled.
fn enabled(cfg: Option<&VersioningConfiguration>) -> Option<&VersioningConfiguration> {
    cfg.filter(|c| {
        c.status
            .as_deref()
            .is_some_and(|s| !s.is_empty() && s != SUSPENDED)
    })
}

pub struct VersioningClient {
    s3: Arc<dyn S3Api>,
}

impl VersioningClient {
    pub fn new(s3: Arc<dyn S3Api>) -> Self {
        Self { s3 }
    }
}

#[async_trait]
impl SubresourceClient<Bucket> for VersioningClient {
    fn name(&self) -> &'static str {
        "versioning"
    }

    async fn observe(&self, mg: &Bucket) -> Result<AspectStatus, ExternalError> {
        let observed = self
            .s3
            .get_bucket_versioning(&bucket_name(mg))
            .await
            .map_err(|e| ExternalError::api(ERR_GET, e))?;
        let desired = mg.spec.for_provider.versioning_configuration.as_ref();
        Ok(classify(enabled(desired), enabled(Some(&observed))))
    }

    async fn create_or_update(&self, mg: &Bucket) -> Result<(), ExternalError> {
        let Some(cfg) = mg
            .spec
            .for_provider
            .versioning_configuration
            .as_ref()
            .filter(|c| c.status.is_some())
        else {
            return Ok(());
        };
        self.s3
            .put_bucket_versioning(&bucket_name(mg), cfg)
            .await
            .map_err(|e| ExternalError::api(ERR_PUT, e))
    }

    async fn delete(&self, mg: &Bucket) -> Result<(), ExternalError> {
        let suspended = VersioningConfiguration {
            status: Some(SUSPENDED.to_string()),
            mfa_delete: None,
        };
        self.s3
            .put_bucket_versioning(&bucket_name(mg), &suspended)
            .await
            .map_err(|e| ExternalError::api(ERR_PUT, e))
    }
}
