use std::sync::Arc;

use async_trait::async_trait;
use xpa_runtime::ExternalError;
use xpa_runtime::late_init::LateInitializer;
use xpa_runtime::subresource::{AspectStatus, ObservedCache, SubresourceClient, classify};

use super::bucket_name;
use crate::clients::S3Api;
use crate::clients::s3::{ERR_NO_SUCH_ENCRYPTION, ERR_NOT_FOUND};
use crate::crd::bucket::{Bucket, ServerSideEncryptionConfiguration};
use crate::s3::observed_or_absent;

const ERR_GET: &str = "cannot get bucket encryption configuration";
const ERR_PUT: &str = "cannot put bucket encryption configuration";
const ERR_DELETE: &str = "cannot delete bucket encryption configuration";

pub struct EncryptionClient {
    s3: Arc<dyn S3Api>,
    observed: ObservedCache<Option<ServerSideEncryptionConfiguration>>,
}

impl EncryptionClient {
    pub fn new(s3: Arc<dyn S3Api>) -> Self {
        Self {
            s3,
            observed: ObservedCache::new(),
        }
    }

    async fn get(
        &self,
        bucket: &str,
    ) -> Result<Option<ServerSideEncryptionConfiguration>, ExternalError> {
        self.observed
            .get_or_fetch(bucket, move || async move {
                Ok(observed_or_absent(
                    self.s3.get_bucket_encryption(bucket).await,
                    &[ERR_NO_SUCH_ENCRYPTION, ERR_NOT_FOUND],
                    ERR_GET,
                )?
                .filter(|c| !c.rules.is_empty()))
            })
            .await
    }
}

#[async_trait]
impl SubresourceClient<Bucket> for EncryptionClient {
    fn name(&self) -> &'static str {
        "encryption"
    }

    async fn observe(&self, mg: &Bucket) -> Result<AspectStatus, ExternalError> {
        let observed = self.get(&bucket_name(mg)).await?;
        let desired = mg
            .spec
            .for_provider
            .server_side_encryption_configuration
            .as_ref()
            .filter(|c| !c.rules.is_empty());
        Ok(classify(desired, observed.as_ref()))
    }

    async fn create_or_update(&self, mg: &Bucket) -> Result<(), ExternalError> {
        let Some(cfg) = mg
            .spec
            .for_provider
            .server_side_encryption_configuration
            .as_ref()
            .filter(|c| !c.rules.is_empty())
        else {
            return Ok(());
        };
        self.observed.clear().await;
        self.s3
            .put_bucket_encryption(&bucket_name(mg), cfg)
            .await
            .map_err(|e| ExternalError::api(ERR_PUT, e))
    }

    async fn delete(&self, mg: &Bucket) -> Result<(), ExternalError> {
        self.observed.clear().await;
        self.s3
            .delete_bucket_encryption(&bucket_name(mg))
            .await
            .map_err(|e| ExternalError::api(ERR_DELETE, e))
    }

    /// S3 applies default encryption to every new bucket.
    async fn late_initialize(&self, mg: &mut Bucket) -> Result<(), ExternalError> {
        let observed = self.get(&bucket_name(mg)).await?;
        LateInitializer::new().whole(
            &mut mg.spec.for_provider.server_side_encryption_configuration,
            observed,
        );
        Ok(())
    }
}
