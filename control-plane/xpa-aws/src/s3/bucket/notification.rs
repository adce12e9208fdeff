use std::sync::Arc;

use async_trait::async_trait;
use xpa_runtime::ExternalError;
use xpa_runtime::late_init::LateInitializer;
use xpa_runtime::subresource::{AspectStatus, ObservedCache, SubresourceClient, classify};

use super::bucket_name;
use crate::clients::S3Api;
use crate::crd::bucket::{Bucket, NotificationConfiguration};

const ERR_GET: &str = "cannot get bucket notification configuration";
const ERR_PUT: &str = "cannot put bucket notification configuration";

/// Adopt each observed list whole, only where the desired list is empty.
/// Entries are never merged by position.
pub fn late_initialize(
    desired: &mut Option<NotificationConfiguration>,
    observed: &NotificationConfiguration,
) -> bool {
    let mut li = LateInitializer::new();
    li.nested(desired, |li, n| {
        li.field(
            &mut n.lambda_function_configurations,
            observed.lambda_function_configurations.clone(),
        );
        li.field(&mut n.queue_configurations, observed.queue_configurations.clone());
        li.field(&mut n.topic_configurations, observed.topic_configurations.clone());
    });
    li.changed()
}

pub struct NotificationClient {
    s3: Arc<dyn S3Api>,
    observed: ObservedCache<NotificationConfiguration>,
}

impl NotificationClient {
    pub fn new(s3: Arc<dyn S3Api>) -> Self {
        Self {
            s3,
            observed: ObservedCache::new(),
        }
    }

    async fn get(&self, bucket: &str) -> Result<NotificationConfiguration, ExternalError> {
        self.observed
            .get_or_fetch(bucket, move || async move {
                self.s3
                    .get_bucket_notification_configuration(bucket)
                    .await
                    .map_err(|e| ExternalError::api(ERR_GET, e))
            })
            .await
    }
}

#[async_trait]
impl SubresourceClient<Bucket> for NotificationClient {
    fn name(&self) -> &'static str {
        "notification"
    }

    async fn observe(&self, mg: &Bucket) -> Result<AspectStatus, ExternalError> {
        let observed = self.get(&bucket_name(mg)).await?;
        let desired = mg
            .spec
            .for_provider
            .notification_configuration
            .as_ref()
            .filter(|n| !n.is_empty());
        Ok(classify(desired, Some(&observed).filter(|n| !n.is_empty())))
    }

    async fn create_or_update(&self, mg: &Bucket) -> Result<(), ExternalError> {
        let Some(cfg) = mg.spec.for_provider.notification_configuration.as_ref() else {
            return Ok(());
        };
        self.observed.clear().await;
        self.s3
            .put_bucket_notification_configuration(&bucket_name(mg), cfg)
            .await
            .map_err(|e| ExternalError::api(ERR_PUT, e))
    }

    async fn delete(&self, mg: &Bucket) -> Result<(), ExternalError> {
        self.observed.clear().await;
        self.s3
            .put_bucket_notification_configuration(
                &bucket_name(mg),
                &NotificationConfiguration::default(),
            )
            .await
            .map_err(|e| ExternalError::api(ERR_PUT, e))
    }

    async fn late_initialize(&self, mg: &mut Bucket) -> Result<(), ExternalError> {
        let observed = self.get(&bucket_name(mg)).await?;
        late_initialize(&mut mg.spec.for_provider.notification_configuration, &observed);
        Ok(())
    }
}
