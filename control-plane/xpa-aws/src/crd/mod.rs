pub mod bucket;
pub mod bucket_policy;
pub mod db_instance;
pub mod db_subnet_group;
pub mod object;
pub mod provider_config;

use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use xpa_runtime::reference::TargetKind;

#[derive(
    Deserialize, Serialize, Clone, Debug, JsonSchema, PartialEq, Eq, PartialOrd, Ord,
)]
pub struct Tag {
    pub key: String,
    pub value: String,
}

impl Tag {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Later duplicates win.
pub fn tag_map(tags: &[Tag]) -> BTreeMap<String, String> {
    tags.iter()
        .map(|t| (t.key.clone(), t.value.clone()))
        .collect()
}

pub fn tags_from_map(map: &BTreeMap<String, String>) -> Vec<Tag> {
    map.iter().map(|(k, v)| Tag::new(k, v)).collect()
}

// Kinds owned by other providers that our resources may reference.

pub fn security_group_kind() -> TargetKind {
    TargetKind::new("ec2.aws.xpa.io/v1beta1", "SecurityGroup", "securitygroups")
}

pub fn subnet_kind() -> TargetKind {
    TargetKind::new("ec2.aws.xpa.io/v1beta1", "Subnet", "subnets")
}

pub fn role_kind() -> TargetKind {
    TargetKind::new("iam.aws.xpa.io/v1beta1", "Role", "roles")
}

pub fn kms_key_kind() -> TargetKind {
    TargetKind::new("kms.aws.xpa.io/v1alpha1", "Key", "keys")
}
