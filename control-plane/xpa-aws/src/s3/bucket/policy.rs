use std::sync::Arc;

use async_trait::async_trait;
use xpa_runtime::ExternalError;
use xpa_runtime::subresource::{AspectStatus, SubresourceClient};

use super::bucket_name;
use crate::clients::S3Api;
use crate::clients::s3::{ERR_NO_SUCH_POLICY, ERR_NOT_FOUND};
use crate::crd::bucket::Bucket;
use crate::s3::{observed_or_absent, policies_equal};

const ERR_GET: &str = "cannot get bucket policy";
const ERR_PUT: &str = "cannot put bucket policy";
const ERR_DELETE: &str = "cannot delete bucket policy";

/// Inline bucket policy. Do not combine with a `BucketPolicy` for the same
/// bucket; both would own the one policy document.
pub struct PolicyClient {
    s3: Arc<dyn S3Api>,
}

impl PolicyClient {
    pub fn new(s3: Arc<dyn S3Api>) -> Self {
        Self { s3 }
    }
}

#[async_trait]
impl SubresourceClient<Bucket> for PolicyClient {
    fn name(&self) -> &'static str {
        "policy"
    }

    async fn observe(&self, mg: &Bucket) -> Result<AspectStatus, ExternalError> {
        let observed = observed_or_absent(
            self.s3.get_bucket_policy(&bucket_name(mg)).await,
            &[ERR_NO_SUCH_POLICY, ERR_NOT_FOUND],
            ERR_GET,
        )?
        .filter(|p| !p.is_empty());
        let desired = mg.spec.for_provider.policy.as_deref().filter(|p| !p.is_empty());
        Ok(match (desired, observed.as_deref()) {
            (None, None) => AspectStatus::Updated,
            (None, Some(_)) => AspectStatus::NeedsDeletion,
            (Some(_), None) => AspectStatus::NeedsUpdate,
            (Some(want), Some(got)) if policies_equal(want, got)? => AspectStatus::Updated,
            (Some(_), Some(_)) => AspectStatus::NeedsUpdate,
        })
    }

    async fn create_or_update(&self, mg: &Bucket) -> Result<(), ExternalError> {
        let Some(policy) = mg.spec.for_provider.policy.as_deref().filter(|p| !p.is_empty())
        else {
            return Ok(());
        };
        self.s3
            .put_bucket_policy(&bucket_name(mg), policy)
            .await
            .map_err(|e| ExternalError::api(ERR_PUT, e))
    }

    async fn delete(&self, mg: &Bucket) -> Result<(), ExternalError> {
        self.s3
            .delete_bucket_policy(&bucket_name(mg))
            .await
            .map_err(|e| ExternalError::api(ERR_DELETE, e))
    }
}
