use std::sync::Arc;

use async_trait::async_trait;
use xpa_runtime::ExternalError;
use xpa_runtime::late_init::LateInitializer;
use xpa_runtime::subresource::{AspectStatus, ObservedCache, SubresourceClient, classify};

use super::bucket_name;
use crate::clients::S3Api;
use crate::crd::bucket::Bucket;

const ERR_GET: &str = "cannot get bucket request payment";
const ERR_PUT: &str = "cannot put bucket request payment";

pub const BUCKET_OWNER: &str = "BucketOwner";

/// The bucket owner paying is the S3 default and reads as unset.
fn requester_pays(payer: Option<&str>) -> Option<&str> {
    payer.filter(|p| !p.is_empty() && *p != BUCKET_OWNER)
}

pub struct PaymentClient {
    s3: Arc<dyn S3Api>,
    observed: ObservedCache<String>,
}

impl PaymentClient {
    pub fn new(s3: Arc<dyn S3Api>) -> Self {
        Self {
            s3,
            observed: ObservedCache::new(),
        }
    }

    async fn get(&self, bucket: &str) -> Result<String, ExternalError> {
        self.observed
            .get_or_fetch(bucket, move || async move {
                self.s3
                    .get_bucket_request_payment(bucket)
                    .await
                    .map_err(|e| ExternalError::api(ERR_GET, e))
            })
            .await
    }
}

#[async_trait]
impl SubresourceClient<Bucket> for PaymentClient {
    fn name(&self) -> &'static str {
        "payment"
    }

    async fn observe(&self, mg: &Bucket) -> Result<AspectStatus, ExternalError> {
        let observed = self.get(&bucket_name(mg)).await?;
        let desired = mg
            .spec
            .for_provider
            .payment_configuration
            .as_ref()
            .map(|c| c.payer.as_str());
        Ok(classify(
            requester_pays(desired).as_ref(),
            requester_pays(Some(observed.as_str())).as_ref(),
        ))
    }

    async fn create_or_update(&self, mg: &Bucket) -> Result<(), ExternalError> {
        let Some(cfg) = mg.spec.for_provider.payment_configuration.as_ref() else {
            return Ok(());
        };
        self.observed.clear().await;
        self.s3
            .put_bucket_request_payment(&bucket_name(mg), &cfg.payer)
            .await
            .map_err(|e| ExternalError::api(ERR_PUT, e))
    }

    async fn delete(&self, mg: &Bucket) -> Result<(), ExternalError> {
        self.observed.clear().await;
        self.s3
            .put_bucket_request_payment(&bucket_name(mg), BUCKET_OWNER)
            .await
            .map_err(|e| ExternalError::api(ERR_PUT, e))
    }

    async fn late_initialize(&self, mg: &mut Bucket) -> Result<(), ExternalError> {
        let observed = self.get(&bucket_name(mg)).await?;
        LateInitializer::new().nested(
            &mut mg.spec.for_provider.payment_configuration,
            |li, c| li.field(&mut c.payer, observed),
        );
        Ok(())
    }
}
