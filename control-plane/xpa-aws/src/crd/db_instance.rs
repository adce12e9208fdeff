use async_trait::async_trait;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use xpa_runtime::ResolveError;
use xpa_runtime::reference::{
    ApiResolver, Extract, MultiResolutionRequest, Reference, ResolutionRequest,
    ResolveReferences, Selector, TargetKind,
};
use xpa_runtime::resource::SecretKeySelector;
use xpa_runtime::{ResourceSpec, ResourceStatus};

use super::db_subnet_group::DBSubnetGroup;
use super::{Tag, kms_key_kind, role_kind, security_group_kind};

#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, JsonSchema)]
#[kube(
    group = "database.aws.xpa.io",
    version = "v1beta1",
    kind = "RDSInstance",
    plural = "rdsinstances",
    status = "RDSInstanceStatus",
    printcolumn = r#"{"name":"STATE","type":"string","jsonPath":".status.atProvider.dbInstanceStatus"}"#,
    printcolumn = r#"{"name":"ENGINE","type":"string","jsonPath":".spec.forProvider.engine"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct RDSInstanceSpec {
    #[serde(flatten)]
    pub resource_spec: ResourceSpec,
    pub for_provider: RDSInstanceParameters,
}

/// Desired state of an RDS DB instance.
#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RDSInstanceParameters {
    pub region: String,
    pub db_instance_class: String,
    pub engine: String,
    /// A prefix such as "12" lets the cloud pick the minor version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engine_version: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allocated_storage: Option<i64>,
    /// Enables storage autoscaling up to this many GiB.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_allocated_storage: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iops: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_encrypted: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kms_key_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kms_key_id_ref: Option<Reference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kms_key_id_selector: Option<Selector>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub availability_zone: Option<String>,
    #[serde(rename = "multiAZ", default, skip_serializing_if = "Option::is_none")]
    pub multi_az: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub master_username: Option<String>,
    /// When omitted a password is generated on create.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub master_password_secret_ref: Option<SecretKeySelector>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publicly_accessible: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_minor_version_upgrade: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub copy_tags_to_snapshot: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deletion_protection: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca_certificate_identifier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license_model: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup_retention_period: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_backup_window: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_maintenance_window: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db_parameter_group_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub option_group_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db_subnet_group_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db_subnet_group_name_ref: Option<Reference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db_subnet_group_name_selector: Option<Selector>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub vpc_security_group_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub vpc_security_group_id_refs: Vec<Reference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vpc_security_group_id_selector: Option<Selector>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_iam_database_authentication: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_performance_insights: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monitoring_interval: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monitoring_role_arn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monitoring_role_arn_ref: Option<Reference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monitoring_role_arn_selector: Option<Selector>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub enable_cloudwatch_logs_exports: Vec<String>,
    /// Deprecated: use `enableCloudwatchLogsExports`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cloudwatch_logs_export_configuration: Option<CloudwatchLogsExportConfiguration>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub apply_modifications_immediately: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_major_version_upgrade: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_final_snapshot_before_deletion: Option<bool>,
    #[serde(
        rename = "finalDBSnapshotIdentifier",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub final_db_snapshot_identifier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delete_automated_backups: Option<bool>,

    /// Only honoured when the instance is first created.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restore_from: Option<RestoreBackupConfiguration>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<Tag>,
}

#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CloudwatchLogsExportConfiguration {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub enable_log_types: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub disable_log_types: Vec<String>,
}

#[derive(Deserialize, Serialize, Clone, Copy, Debug, JsonSchema, PartialEq, Eq)]
pub enum RestoreSource {
    S3,
    Snapshot,
    PointInTime,
}

#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RestoreBackupConfiguration {
    pub source: RestoreSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s3: Option<S3RestoreBackupConfiguration>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<SnapshotRestoreBackupConfiguration>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub point_in_time: Option<PointInTimeRestoreBackupConfiguration>,
}

#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct S3RestoreBackupConfiguration {
    pub bucket_name: String,
    pub ingestion_role_arn: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    pub source_engine: String,
    pub source_engine_version: String,
}

#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotRestoreBackupConfiguration {
    pub snapshot_identifier: String,
}

#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PointInTimeRestoreBackupConfiguration {
    /// RFC 3339 timestamp.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restore_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_latest_restorable_time: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_db_instance_automated_backups_arn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_db_instance_identifier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_dbi_resource_id: Option<String>,
}

#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Endpoint {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hosted_zone_id: Option<String>,
}

#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OptionGroupMembership {
    pub option_group_name: String,
    pub status: String,
}

#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PendingCloudwatchLogsExports {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub log_types_to_enable: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub log_types_to_disable: Vec<String>,
}

#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PendingModifiedValues {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allocated_storage: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db_instance_class: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engine_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub master_user_password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_cloudwatch_logs_exports: Option<PendingCloudwatchLogsExports>,
}

/// Observed state of the DB instance as last described.
#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RDSInstanceObservation {
    #[serde(default)]
    pub db_instance_status: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub db_instance_arn: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub dbi_resource_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<Endpoint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engine_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_create_time: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub option_group_memberships: Vec<OptionGroupMembership>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_modified_values: Option<PendingModifiedValues>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub enabled_cloudwatch_logs_exports: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub awsbackup_recovery_point_arn: Option<String>,
}

#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RDSInstanceStatus {
    #[serde(flatten)]
    pub resource_status: ResourceStatus,
    #[serde(default)]
    pub at_provider: RDSInstanceObservation,
}

xpa_runtime::managed_resource!(RDSInstance);

impl RDSInstance {
    pub fn at_provider(&self) -> Option<&RDSInstanceObservation> {
        self.status.as_ref().map(|s| &s.at_provider)
    }

    pub fn at_provider_mut(&mut self) -> &mut RDSInstanceObservation {
        &mut self.status.get_or_insert_with(Default::default).at_provider
    }
}

#[async_trait]
impl ResolveReferences for RDSInstance {
    async fn resolve_references(
        &mut self,
        resolver: &ApiResolver,
    ) -> Result<(), ResolveError> {
        let p = &mut self.spec.for_provider;

        let res = resolver
            .resolve(
                "dbSubnetGroupName",
                ResolutionRequest {
                    current_value: p.db_subnet_group_name.clone(),
                    reference: p.db_subnet_group_name_ref.clone(),
                    selector: p.db_subnet_group_name_selector.clone(),
                    target: TargetKind::of::<DBSubnetGroup>(),
                    extract: Extract::ExternalName,
                },
            )
            .await?;
        p.db_subnet_group_name = res.resolved_value;
        p.db_subnet_group_name_ref = res.resolved_reference;

        let res = resolver
            .resolve_multiple(
                "vpcSecurityGroupIds",
                MultiResolutionRequest {
                    current_values: p.vpc_security_group_ids.clone(),
                    references: p.vpc_security_group_id_refs.clone(),
                    selector: p.vpc_security_group_id_selector.clone(),
                    target: security_group_kind(),
                    extract: Extract::ExternalName,
                },
            )
            .await?;
        p.vpc_security_group_ids = res.resolved_values;
        p.vpc_security_group_id_refs = res.resolved_references;

        let res = resolver
            .resolve(
                "monitoringRoleArn",
                ResolutionRequest {
                    current_value: p.monitoring_role_arn.clone(),
                    reference: p.monitoring_role_arn_ref.clone(),
                    selector: p.monitoring_role_arn_selector.clone(),
                    target: role_kind(),
                    extract: Extract::ROLE_ARN,
                },
            )
            .await?;
        p.monitoring_role_arn = res.resolved_value;
        p.monitoring_role_arn_ref = res.resolved_reference;

        let res = resolver
            .resolve(
                "kmsKeyId",
                ResolutionRequest {
                    current_value: p.kms_key_id.clone(),
                    reference: p.kms_key_id_ref.clone(),
                    selector: p.kms_key_id_selector.clone(),
                    target: kms_key_kind(),
                    extract: Extract::Field("/status/atProvider/arn"),
                },
            )
            .await?;
        p.kms_key_id = res.resolved_value;
        p.kms_key_id_ref = res.resolved_reference;
        Ok(())
    }
}
