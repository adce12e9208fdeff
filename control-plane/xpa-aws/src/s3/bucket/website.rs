use std::sync::Arc;

use async_trait::async_trait;
use xpa_runtime::ExternalError;
use xpa_runtime::subresource::{AspectStatus, SubresourceClient, classify};

use super::bucket_name;
use crate::clients::S3Api;
use crate::clients::s3::{ERR_NO_SUCH_WEBSITE, ERR_NOT_FOUND};
use crate::crd::bucket::Bucket;
use crate::s3::observed_or_absent;

const ERR_GET: &str = "cannot get bucket website configuration";
const ERR_PUT: &str = "cannot put bucket website configuration";
const ERR_DELETE: &str = "cannot delete bucket website configuration";

pub struct WebsiteClient {
    s3: Arc<dyn S3Api>,
}

impl WebsiteClient {
    pub fn new(s3: Arc<dyn S3Api>) -> Self {
        Self { s3 }
    }
}

#[async_trait]
impl SubresourceClient<Bucket> for WebsiteClient {
    fn name(&self) -> &'static str {
        "website"
    }

    async fn observe(&self, mg: &Bucket) -> Result<AspectStatus, ExternalError> {
        let observed = observed_or_absent(
            self.s3.get_bucket_website(&bucket_name(mg)).await,
            &[ERR_NO_SUCH_WEBSITE, ERR_NOT_FOUND],
            ERR_GET,
        )?;
        let desired = mg.spec.for_provider.website_configuration.as_ref();
        Ok(classify(desired, observed.as_ref()))
    }

    async fn create_or_update(&self, mg: &Bucket) -> Result<(), ExternalError> {
        let Some(cfg) = mg.spec.for_provider.website_configuration.as_ref() else {
            return Ok(());
        };
        self.s3
            .put_bucket_website(&bucket_name(mg), cfg)
            .await
            .map_err(|e| ExternalError::api(ERR_PUT, e))
    }

    async fn delete(&self, mg: &Bucket) -> Result<(), ExternalError> {
        self.s3
            .delete_bucket_website(&bucket_name(mg))
            .await
            .map_err(|e| ExternalError::api(ERR_DELETE, e))
    }
}
