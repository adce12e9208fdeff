use std::sync::Arc;

use async_trait::async_trait;
use xpa_runtime::ExternalError;
use xpa_runtime::subresource::{AspectStatus, SubresourceClient, classify};

use super::bucket_name;
use crate::clients::S3Api;
use crate::clients::s3::{ERR_NO_SUCH_TAG_SET, ERR_NOT_FOUND};
use crate::crd::bucket::Bucket;
use crate::crd::{tag_map, tags_from_map};
use crate::s3::observed_or_absent;

const ERR_GET: &str = "cannot get bucket tagging";
const ERR_PUT: &str = "cannot put bucket tagging";
const ERR_DELETE: &str = "cannot delete bucket tagging";

pub struct TaggingClient {
    s3: Arc<dyn S3Api>,
}

impl TaggingClient {
    pub fn new(s3: Arc<dyn S3Api>) -> Self {
        Self { s3 }
    }
}

#[async_trait]
impl SubresourceClient<Bucket> for TaggingClient {
    fn name(&self) -> &'static str {
        "tagging"
    }

    /// Tag sets compare as maps; order and duplicates do not matter.
    async fn observe(&self, mg: &Bucket) -> Result<AspectStatus, ExternalError> {
        let observed = observed_or_absent(
            self.s3.get_bucket_tagging(&bucket_name(mg)).await,
            &[ERR_NO_SUCH_TAG_SET, ERR_NOT_FOUND],
            ERR_GET,
        )?
        .map(|tags| tag_map(&tags))
        .filter(|m| !m.is_empty());
        let desired = mg
            .spec
            .for_provider
            .tagging
            .as_ref()
            .map(|t| tag_map(&t.tag_set))
            .filter(|m| !m.is_empty());
        Ok(classify(desired.as_ref(), observed.as_ref()))
    }

    async fn create_or_update(&self, mg: &Bucket) -> Result<(), ExternalError> {
        let Some(tagging) = mg
            .spec
            .for_provider
            .tagging
            .as_ref()
            .filter(|t| !t.tag_set.is_empty())
        else {
            return Ok(());
        };
        let tags = tags_from_map(&tag_map(&tagging.tag_set));
        self.s3
            .put_bucket_tagging(&bucket_name(mg), &tags)
            .await
            .map_err(|e| ExternalError::api(ERR_PUT, e))
    }

    async fn delete(&self, mg: &Bucket) -> Result<(), ExternalError> {
        self.s3
            .delete_bucket_tagging(&bucket_name(mg))
            .await
            .map_err(|e| ExternalError::api(ERR_DELETE, e))
    }
}
