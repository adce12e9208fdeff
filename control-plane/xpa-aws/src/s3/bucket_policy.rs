//! External client for `BucketPolicy`.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;
use xpa_runtime::{
    ExternalClient, ExternalConnector, ExternalCreation, ExternalError,
    ExternalObservation, ExternalUpdate, ManagedExt, conditions,
};

use super::{observed_or_absent, policies_equal};
use crate::clients::S3Api;
use crate::clients::s3::{ERR_NO_SUCH_BUCKET, ERR_NO_SUCH_POLICY, ERR_NOT_FOUND};
use crate::controller::connector::AwsConnector;
use crate::crd::bucket_policy::BucketPolicy;

const ERR_GET: &str = "cannot get bucket policy";
const ERR_PUT: &str = "cannot put bucket policy";
const ERR_DELETE: &str = "cannot delete bucket policy";

fn bucket(mg: &BucketPolicy) -> Result<&str, ExternalError> {
    mg.spec
        .for_provider
        .bucket_name
        .as_deref()
        .filter(|b| !b.is_empty())
        .ok_or_else(|| ExternalError::Invalid("bucketName is required".into()))
}

pub struct BucketPolicyConnector {
    aws: AwsConnector,
}

impl BucketPolicyConnector {
    pub fn new(aws: AwsConnector) -> Self {
        Self { aws }
    }
}

#[async_trait]
impl ExternalConnector<BucketPolicy> for BucketPolicyConnector {
    async fn connect(
        &self,
        mg: &BucketPolicy,
    ) -> Result<Box<dyn ExternalClient<BucketPolicy>>, ExternalError> {
        let cfg = self.aws.config_for(mg, &mg.spec.for_provider.region).await?;
        Ok(Box::new(BucketPolicyClient::new(self.aws.factory().s3(&cfg))))
    }
}

pub struct BucketPolicyClient {
    s3: Arc<dyn S3Api>,
}

impl BucketPolicyClient {
    pub fn new(s3: Arc<dyn S3Api>) -> Self {
        Self { s3 }
    }

    async fn put(&self, mg: &BucketPolicy) -> Result<(), ExternalError> {
        self.s3
            .put_bucket_policy(bucket(mg)?, &mg.spec.for_provider.raw_policy)
            .await
            .map_err(|e| ExternalError::api(ERR_PUT, e))
    }
}

#[async_trait]
impl ExternalClient<BucketPolicy> for BucketPolicyClient {
    async fn observe(
        &self,
        mg: &mut BucketPolicy,
    ) -> Result<ExternalObservation, ExternalError> {
        let Ok(bucket) = bucket(mg) else {
            return Ok(ExternalObservation::not_found());
        };
        let observed = observed_or_absent(
            self.s3.get_bucket_policy(bucket).await,
            &[ERR_NO_SUCH_POLICY, ERR_NO_SUCH_BUCKET, ERR_NOT_FOUND],
            ERR_GET,
        )?;
        let Some(observed) = observed.filter(|p| !p.is_empty()) else {
            return Ok(ExternalObservation::not_found());
        };

        let up_to_date = policies_equal(&mg.spec.for_provider.raw_policy, &observed)?;
        mg.set_conditions([conditions::available()]);
        Ok(ExternalObservation {
            resource_exists: true,
            resource_up_to_date: up_to_date,
            diff: if up_to_date {
                String::new()
            } else {
                "rawPolicy: differs from the attached policy".to_string()
            },
            ..Default::default()
        })
    }

    async fn create(
        &self,
        mg: &mut BucketPolicy,
    ) -> Result<ExternalCreation, ExternalError> {
        self.put(mg).await?;
        info!(bucket = bucket(mg)?, "bucket policy attached");
        Ok(ExternalCreation::default())
    }

    async fn update(
        &self,
        mg: &mut BucketPolicy,
    ) -> Result<ExternalUpdate, ExternalError> {
        self.put(mg).await?;
        Ok(ExternalUpdate::default())
    }

    async fn delete(&self, mg: &mut BucketPolicy) -> Result<(), ExternalError> {
        mg.set_conditions([conditions::deleting()]);
        match self.s3.delete_bucket_policy(bucket(mg)?).await {
            Ok(()) => Ok(()),
            Err(e) if e.is_any(&[ERR_NO_SUCH_POLICY, ERR_NO_SUCH_BUCKET, ERR_NOT_FOUND]) => {
                Ok(())
            }
            Err(e) => Err(ExternalError::api(ERR_DELETE, e)),
        }
    }
}
