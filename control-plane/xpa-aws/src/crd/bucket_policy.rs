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

/// Policy document attached to a bucket managed elsewhere.
#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, JsonSchema)]
#[kube(
    group = "s3.aws.xpa.io",
    version = "v1alpha3",
    kind = "BucketPolicy",
    plural = "bucketpolicies",
    status = "BucketPolicyStatus"
)]
#[serde(rename_all = "camelCase")]
pub struct BucketPolicySpec {
    #[serde(flatten)]
    pub resource_spec: ResourceSpec,
    pub for_provider: BucketPolicyParameters,
}

#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BucketPolicyParameters {
    pub region: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bucket_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bucket_name_ref: Option<Reference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bucket_name_selector: Option<Selector>,
    /// JSON policy document. Compared semantically, so formatting and key
    /// order do not cause drift.
    pub raw_policy: String,
}

#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BucketPolicyStatus {
    #[serde(flatten)]
    pub resource_status: ResourceStatus,
}

xpa_runtime::managed_resource!(BucketPolicy);

#[async_trait]
impl ResolveReferences for BucketPolicy {
    async fn resolve_references(
        &mut self,
        resolver: &ApiResolver,
    ) -> Result<(), ResolveError> {
        let p = &mut self.spec.for_provider;
        let res = resolver
            .resolve(
                "bucketName",
                ResolutionRequest {
                    current_value: p.bucket_name.clone(),
                    reference: p.bucket_name_ref.clone(),
                    selector: p.bucket_name_selector.clone(),
                    target: TargetKind::of::<Bucket>(),
                    extract: Extract::ExternalName,
                },
            )
            .await?;
        p.bucket_name = res.resolved_value;
        p.bucket_name_ref = res.resolved_reference;
        Ok(())
    }
}
