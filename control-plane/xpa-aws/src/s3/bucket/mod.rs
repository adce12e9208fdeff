//! External client for `Bucket`. The bucket itself only has to exist; all
//! of its configuration is reconciled aspect by aspect.

pub mod accelerate;
pub mod cors;
pub mod encryption;
pub mod lifecycle;
pub mod logging;
pub mod notification;
pub mod payment;
pub mod policy;
pub mod replication;
pub mod tagging;
pub mod versioning;
pub mod website;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;
use xpa_runtime::subresource::Aspects;
use xpa_runtime::{
    ExternalClient, ExternalConnector, ExternalCreation, ExternalError,
    ExternalObservation, ExternalUpdate, ManagedExt, conditions,
};

use crate::clients::S3Api;
use crate::clients::s3::{
    CreateBucketInput, ERR_BUCKET_ALREADY_OWNED, ERR_NO_SUCH_BUCKET, ERR_NOT_FOUND,
};
use crate::controller::connector::AwsConnector;
use crate::crd::bucket::Bucket;

const ERR_HEAD: &str = "cannot get bucket";
const ERR_CREATE: &str = "cannot create bucket";
const ERR_DELETE: &str = "cannot delete bucket";

pub fn bucket_name(mg: &Bucket) -> String {
    mg.external_name().unwrap_or_else(|| mg.name_or_default())
}

pub fn bucket_arn(name: &str) -> String {
    format!("arn:aws:s3:::{name}")
}

/// Every bucket aspect, in reconcile order.
pub fn aspects(s3: Arc<dyn S3Api>) -> Aspects<Bucket> {
    Aspects::new(vec![
        Box::new(accelerate::AccelerateClient::new(s3.clone())),
        Box::new(cors::CorsClient::new(s3.clone())),
        Box::new(encryption::EncryptionClient::new(s3.clone())),
        Box::new(lifecycle::LifecycleClient::new(s3.clone())),
        Box::new(logging::LoggingClient::new(s3.clone())),
        Box::new(notification::NotificationClient::new(s3.clone())),
        Box::new(payment::PaymentClient::new(s3.clone())),
        Box::new(policy::PolicyClient::new(s3.clone())),
        Box::new(replication::ReplicationClient::new(s3.clone())),
        Box::new(tagging::TaggingClient::new(s3.clone())),
        Box::new(versioning::VersioningClient::new(s3.clone())),
        Box::new(website::WebsiteClient::new(s3)),
    ])
}

pub struct BucketConnector {
    aws: AwsConnector,
}

impl BucketConnector {
    pub fn new(aws: AwsConnector) -> Self {
        Self { aws }
    }
}

#[async_trait]
impl ExternalConnector<Bucket> for BucketConnector {
    async fn connect(
        &self,
        mg: &Bucket,
    ) -> Result<Box<dyn ExternalClient<Bucket>>, ExternalError> {
        let cfg = self
            .aws
            .config_for(mg, &mg.spec.for_provider.location_constraint)
            .await?;
        Ok(Box::new(BucketClient::new(self.aws.factory().s3(&cfg))))
    }
}

pub struct BucketClient {
    s3: Arc<dyn S3Api>,
    aspects: Aspects<Bucket>,
}

impl BucketClient {
    pub fn new(s3: Arc<dyn S3Api>) -> Self {
        Self {
            aspects: aspects(s3.clone()),
            s3,
        }
    }
}

#[async_trait]
impl ExternalClient<Bucket> for BucketClient {
    async fn observe(&self, mg: &mut Bucket) -> Result<ExternalObservation, ExternalError> {
        let name = bucket_name(mg);
        match self.s3.head_bucket(&name).await {
            Ok(()) => {}
            Err(e) if e.is_any(&[ERR_NOT_FOUND, ERR_NO_SUCH_BUCKET]) => {
                return Ok(ExternalObservation::not_found());
            }
            Err(e) => return Err(ExternalError::api(ERR_HEAD, e)),
        }

        let late_initialized = self.aspects.late_initialize(mg).await?;
        let observation = self.aspects.observe(mg).await?;

        mg.status.get_or_insert_with(Default::default).at_provider.arn = bucket_arn(&name);
        mg.set_conditions([conditions::available()]);

        Ok(ExternalObservation {
            resource_exists: true,
            resource_up_to_date: observation.up_to_date(),
            resource_late_initialized: late_initialized,
            connection_details: Default::default(),
            diff: observation.diff(),
        })
    }

    async fn create(&self, mg: &mut Bucket) -> Result<ExternalCreation, ExternalError> {
        let name = bucket_name(mg);
        let p = &mg.spec.for_provider;
        let input = CreateBucketInput {
            bucket: name.clone(),
            location_constraint: p.location_constraint.clone(),
            acl: p.acl.clone(),
            object_lock_enabled_for_bucket: p.object_lock_enabled_for_bucket,
        };
        match self.s3.create_bucket(input).await {
            Ok(()) => info!(bucket = %name, "bucket created"),
            Err(e) if e.is_code(ERR_BUCKET_ALREADY_OWNED) => {}
            Err(e) => return Err(ExternalError::api(ERR_CREATE, e)),
        }
        self.aspects.create_all(mg).await?;
        Ok(ExternalCreation::default())
    }

    async fn update(&self, mg: &mut Bucket) -> Result<ExternalUpdate, ExternalError> {
        self.aspects.reconcile(mg).await?;
        Ok(ExternalUpdate::default())
    }

    async fn delete(&self, mg: &mut Bucket) -> Result<(), ExternalError> {
        mg.set_conditions([conditions::deleting()]);
        match self.s3.delete_bucket(&bucket_name(mg)).await {
            Ok(()) => Ok(()),
            Err(e) if e.is_any(&[ERR_NO_SUCH_BUCKET, ERR_NOT_FOUND]) => Ok(()),
            Err(e) => Err(ExternalError::api(ERR_DELETE, e)),
        }
    }
}
