use std::collections::BTreeMap;

use async_trait::async_trait;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use xpa_runtime::ResolveError;
use xpa_runtime::reference::{
    ApiResolver, Extract, Reference, ResolutionRequest, ResolveReferences,
    Selector, TargetKind,
};
use xpa_runtime::{ResourceSpec, ResourceStatus};

use super::bucket::Bucket;

/// A single S3 object. The object key is the external name.
#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, JsonSchema)]
#[kube(
    group = "s3.aws.xpa.io",
    version = "v1alpha1",
    kind = "Object",
    plural = "objects",
    status = "ObjectStatus"
)]
#[serde(rename_all = "camelCase")]
pub struct ObjectSpec {
    #[serde(flatten)]
    pub resource_spec: ResourceSpec,
    pub for_provider: ObjectParameters,
}

#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ObjectParameters {
    pub region: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bucket: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bucket_ref: Option<Reference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bucket_selector: Option<Selector>,
    /// UTF-8 object content.
    #[serde(default)]
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_control: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ObjectObservation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_id: Option<String>,
}

#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ObjectStatus {
    #[serde(flatten)]
    pub resource_status: ResourceStatus,
    #[serde(default)]
    pub at_provider: ObjectObservation,
}

xpa_runtime::managed_resource!(Object);

#[async_trait]
impl ResolveReferences for Object {
    async fn resolve_references(
        &mut self,
        resolver: &ApiResolver,
    ) -> Result<(), ResolveError> {
        let p = &mut self.spec.for_provider;
        let res = resolver
            .resolve(
                "bucket",
                ResolutionRequest {
                    current_value: p.bucket.clone(),
                    reference: p.bucket_ref.clone(),
                    selector: p.bucket_selector.clone(),
                    target: TargetKind::of::<Bucket>(),
                    extract: Extract::ExternalName,
                },
            )
            .await?;
        p.bucket = res.resolved_value;
        p.bucket_ref = res.resolved_reference;
        Ok(())
    }
}
