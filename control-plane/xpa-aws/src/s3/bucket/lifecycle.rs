use std::sync::Arc;

use async_trait::async_trait;
use xpa_runtime::ExternalError;
use xpa_runtime::subresource::{AspectStatus, SubresourceClient, classify};

use super::bucket_name;
use crate::clients::S3Api;
use crate::clients::s3::{ERR_NO_SUCH_LIFECYCLE, ERR_NOT_FOUND};
use crate::crd::bucket::Bucket;
use crate::s3::observed_or_absent;

const ERR_GET: &str = "cannot get bucket lifecycle configuration";
const ERR_PUT: &str = "cannot put bucket lifecycle configuration";
const ERR_DELETE: &str = "cannot delete bucket lifecycle configuration";

pub struct LifecycleClient {
    s3: Arc<dyn S3Api>,
}

impl LifecycleClient {
    pub fn new(s3: Arc<dyn S3Api>) -> Self {
        Self { s3 }
    }
}

#[async_trait]
impl SubresourceClient<Bucket> for LifecycleClient {
    fn name(&self) -> &'static str {
        "lifecycle"
    }

    async fn observe(&self, mg: &Bucket) -> Result<AspectStatus, ExternalError> {
        let observed = observed_or_absent(
            self.s3
                .get_bucket_lifecycle_configuration(&bucket_name(mg))
                .await,
            &[ERR_NO_SUCH_LIFECYCLE, ERR_NOT_FOUND],
            ERR_GET,
        )?
        .filter(|c| !c.rules.is_empty());
        let desired = mg
            .spec
            .for_provider
            .lifecycle_configuration
            .as_ref()
            .filter(|c| !c.rules.is_empty());
        Ok(classify(desired, observed.as_ref()))
    }

    async fn create_or_update(&self, mg: &Bucket) -> Result<(), ExternalError> {
        let Some(cfg) = mg
            .spec
            .for_provider
            .lifecycle_configuration
            .as_ref()
            .filter(|c| !c.rules.is_empty())
        else {
            return Ok(());
        };
        self.s3
            .put_bucket_lifecycle_configuration(&bucket_name(mg), cfg)
            .await
            .map_err(|e| ExternalError::api(ERR_PUT, e))
    }

    async fn delete(&self, mg: &Bucket) -> Result<(), ExternalError> {
        self.s3
            .delete_bucket_lifecycle(&bucket_name(mg))
            .await
            .map_err(|e| ExternalError::api(ERR_DELETE, e))
    }
}
