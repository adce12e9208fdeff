use async_trait::async_trait;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use xpa_runtime::ResolveError;
use xpa_runtime::reference::{
    ApiResolver, Extract, MultiResolutionRequest, Reference, ResolveReferences,
    Selector,
};
use xpa_runtime::{ResourceSpec, ResourceStatus};

use super::{Tag, subnet_kind};

#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, JsonSchema)]
#[kube(
    group = "database.aws.xpa.io",
    version = "v1beta1",
    kind = "DBSubnetGroup",
    plural = "dbsubnetgroups",
    status = "DBSubnetGroupStatus"
)]
#[serde(rename_all = "camelCase")]
pub struct DBSubnetGroupSpec {
    #[serde(flatten)]
    pub resource_spec: ResourceSpec,
    pub for_provider: DBSubnetGroupParameters,
}

#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DBSubnetGroupParameters {
    pub region: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subnet_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subnet_id_refs: Vec<Reference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subnet_id_selector: Option<Selector>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<Tag>,
}

#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Subnet {
    pub subnet_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub subnet_status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub availability_zone: Option<String>,
}

#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DBSubnetGroupObservation {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub arn: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub state: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub vpc_id: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subnets: Vec<Subnet>,
}

#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DBSubnetGroupStatus {
    #[serde(flatten)]
    pub resource_status: ResourceStatus,
    #[serde(default)]
    pub at_provider: DBSubnetGroupObservation,
}

xpa_runtime::managed_resource!(DBSubnetGroup);

#[async_trait]
impl ResolveReferences for DBSubnetGroup {
    async fn resolve_references(
        &mut self,
        resolver: &ApiResolver,
    ) -> Result<(), ResolveError> {
        let p = &mut self.spec.for_provider;
        let res = resolver
            .resolve_multiple(
                "subnetIds",
                MultiResolutionRequest {
                    current_values: p.subnet_ids.clone(),
                    references: p.subnet_id_refs.clone(),
                    selector: p.subnet_id_selector.clone(),
                    target: subnet_kind(),
                    extract: Extract::ExternalName,
                },
            )
            .await?;
        p.subnet_ids = res.resolved_values;
        p.subnet_id_refs = res.resolved_references;
        Ok(())
    }
}
