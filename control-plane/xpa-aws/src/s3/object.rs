//! External client for `Object`.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;
use xpa_runtime::late_init::LateInitializer;
use xpa_runtime::{
    ExternalClient, ExternalConnector, ExternalCreation, ExternalError,
    ExternalObservation, ExternalUpdate, ManagedExt, conditions,
};

use super::observed_or_absent;
use crate::clients::S3Api;
use crate::clients::s3::{
    ERR_NO_SUCH_BUCKET, ERR_NO_SUCH_KEY, ERR_NOT_FOUND, GetObjectOutput, PutObjectInput,
};
use crate::controller::connector::AwsConnector;
use crate::crd::object::{Object, ObjectObservation, ObjectParameters};

const ERR_GET: &str = "cannot get object";
const ERR_PUT: &str = "cannot put object";
const ERR_DELETE: &str = "cannot delete object";

fn bucket(mg: &Object) -> Result<&str, ExternalError> {
    mg.spec
        .for_provider
        .bucket
        .as_deref()
        .filter(|b| !b.is_empty())
        .ok_or_else(|| ExternalError::Invalid("bucket is required".into()))
}

fn key(mg: &Object) -> String {
    mg.external_name().unwrap_or_else(|| mg.name_or_default())
}

pub fn late_initialize(p: &mut ObjectParameters, obj: &GetObjectOutput) -> bool {
    let mut li = LateInitializer::new();
    li.field(&mut p.content_type, obj.content_type.clone());
    li.changed()
}

/// Fields left unset on the desired side are not compared.
pub fn differences(p: &ObjectParameters, obj: &GetObjectOutput) -> Vec<&'static str> {
    let mut out = Vec::new();
    if p.body.as_bytes() != obj.body.as_slice() {
        out.push("body");
    }
    if p.content_type.is_some() && p.content_type != obj.content_type {
        out.push("contentType");
    }
    if p.cache_control.is_some() && p.cache_control != obj.cache_control {
        out.push("cacheControl");
    }
    if p.metadata != obj.metadata {
        out.push("metadata");
    }
    out
}

pub struct ObjectConnector {
    aws: AwsConnector,
}

impl ObjectConnector {
    pub fn new(aws: AwsConnector) -> Self {
        Self { aws }
    }
}

#[async_trait]
impl ExternalConnector<Object> for ObjectConnector {
    async fn connect(
        &self,
        mg: &Object,
    ) -> Result<Box<dyn ExternalClient<Object>>, ExternalError> {
        let cfg = self.aws.config_for(mg, &mg.spec.for_provider.region).await?;
        Ok(Box::new(ObjectClient::new(self.aws.factory().s3(&cfg))))
    }
}

pub struct ObjectClient {
    s3: Arc<dyn S3Api>,
}

impl ObjectClient {
    pub fn new(s3: Arc<dyn S3Api>) -> Self {
        Self { s3 }
    }

    async fn put(&self, mg: &Object) -> Result<(), ExternalError> {
        let p = &mg.spec.for_provider;
        let input = PutObjectInput {
            bucket: bucket(mg)?.to_string(),
            key: key(mg),
            body: p.body.clone().into_bytes(),
            content_type: p.content_type.clone(),
            cache_control: p.cache_control.clone(),
            metadata: p.metadata.clone(),
        };
        self.s3
            .put_object(input)
            .await
            .map_err(|e| ExternalError::api(ERR_PUT, e))
    }
}

#[async_trait]
impl ExternalClient<Object> for ObjectClient {
    /// Without a bucket name nothing can have been uploaded yet. Create
    /// reports the missing bucket; delete has nothing to remove.
    async fn observe(&self, mg: &mut Object) -> Result<ExternalObservation, ExternalError> {
        let Ok(bucket) = bucket(mg) else {
            return Ok(ExternalObservation::not_found());
        };
        let observed = observed_or_absent(
            self.s3.get_object(bucket, &key(mg)).await,
            &[ERR_NO_SUCH_KEY, ERR_NO_SUCH_BUCKET, ERR_NOT_FOUND],
            ERR_GET,
        )?;
        let Some(obj) = observed else {
            return Ok(ExternalObservation::not_found());
        };

        let late_initialized = late_initialize(&mut mg.spec.for_provider, &obj);
        mg.status.get_or_insert_with(Default::default).at_provider = ObjectObservation {
            etag: obj.etag.clone(),
            version_id: obj.version_id.clone(),
        };
        mg.set_conditions([conditions::available()]);

        let drift = differences(&mg.spec.for_provider, &obj);
        Ok(ExternalObservation {
            resource_exists: true,
            resource_up_to_date: drift.is_empty(),
            resource_late_initialized: late_initialized,
            connection_details: Default::default(),
            diff: drift
                .iter()
                .map(|f| format!("{f}: changed"))
                .collect::<Vec<_>>()
                .join("\n"),
        })
    }

    async fn create(&self, mg: &mut Object) -> Result<ExternalCreation, ExternalError> {
        self.put(mg).await?;
        info!(bucket = bucket(mg)?, key = %key(mg), "object uploaded");
        Ok(ExternalCreation::default())
    }

    async fn update(&self, mg: &mut Object) -> Result<ExternalUpdate, ExternalError> {
        self.put(mg).await?;
        Ok(ExternalUpdate::default())
    }

    async fn delete(&self, mg: &mut Object) -> Result<(), ExternalError> {
        mg.set_conditions([conditions::deleting()]);
        match self.s3.delete_object(bucket(mg)?, &key(mg)).await {
            Ok(()) => Ok(()),
            Err(e) if e.is_any(&[ERR_NO_SUCH_KEY, ERR_NO_SUCH_BUCKET, ERR_NOT_FOUND]) => Ok(()),
            Err(e) => Err(ExternalError::api(ERR_DELETE, e)),
        }
    }
}
