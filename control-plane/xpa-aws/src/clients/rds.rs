use async_trait::async_trait;

use super::ApiResult;
use crate::crd::Tag;
use crate::crd::db_instance::{
    Endpoint, OptionGroupMembership, PendingModifiedValues,
};
use crate::crd::db_subnet_group::Subnet;

pub const ERR_DB_INSTANCE_NOT_FOUND: &str = "DBInstanceNotFound";
pub const ERR_DB_SUBNET_GROUP_NOT_FOUND: &str = "DBSubnetGroupNotFoundFault";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DbParameterGroupStatus {
    pub db_parameter_group_name: String,
    pub parameter_apply_status: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct VpcSecurityGroupMembership {
    pub vpc_security_group_id: String,
    pub status: String,
}

/// A DB instance as returned by `DescribeDBInstances`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DbInstance {
    pub db_instance_identifier: String,
    pub db_instance_arn: String,
    pub dbi_resource_id: String,
    pub db_instance_class: String,
    pub db_instance_status: String,
    pub engine: String,
    pub engine_version: Option<String>,
    pub allocated_storage: Option<i64>,
    pub max_allocated_storage: Option<i64>,
    pub storage_type: Option<String>,
    pub iops: Option<i64>,
    pub storage_encrypted: Option<bool>,
    pub kms_key_id: Option<String>,
    pub availability_zone: Option<String>,
    pub multi_az: Option<bool>,
    pub db_name: Option<String>,
    pub master_username: Option<String>,
    pub endpoint: Option<Endpoint>,
    pub db_instance_port: Option<i64>,
    pub publicly_accessible: Option<bool>,
    pub auto_minor_version_upgrade: Option<bool>,
    pub copy_tags_to_snapshot: Option<bool>,
    pub deletion_protection: Option<bool>,
    pub ca_certificate_identifier: Option<String>,
    pub license_model: Option<String>,
    pub backup_retention_period: Option<i64>,
    pub preferred_backup_window: Option<String>,
    pub preferred_maintenance_window: Option<String>,
    pub db_parameter_groups: Vec<DbParameterGroupStatus>,
    pub option_group_memberships: Vec<OptionGroupMembership>,
    pub db_subnet_group_name: Option<String>,
    pub vpc_security_groups: Vec<VpcSecurityGroupMembership>,
    pub iam_database_authentication_enabled: Option<bool>,
    pub performance_insights_enabled: Option<bool>,
    pub monitoring_interval: Option<i64>,
    pub monitoring_role_arn: Option<String>,
    pub enabled_cloudwatch_logs_exports: Vec<String>,
    pub pending_modified_values: Option<PendingModifiedValues>,
    pub awsbackup_recovery_point_arn: Option<String>,
    pub instance_create_time: Option<String>,
    pub tag_list: Vec<Tag>,
}

/// Fields shared by create and every restore variant.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DbInstanceSettings {
    pub db_instance_identifier: String,
    pub db_instance_class: String,
    pub engine: String,
    pub engine_version: Option<String>,
    pub allocated_storage: Option<i64>,
    pub max_allocated_storage: Option<i64>,
    pub storage_type: Option<String>,
    pub iops: Option<i64>,
    pub storage_encrypted: Option<bool>,
    pub kms_key_id: Option<String>,
    pub availability_zone: Option<String>,
    pub multi_az: Option<bool>,
    pub db_name: Option<String>,
    pub master_username: Option<String>,
    pub master_user_password: Option<String>,
    pub port: Option<i64>,
    pub publicly_accessible: Option<bool>,
    pub auto_minor_version_upgrade: Option<bool>,
    pub copy_tags_to_snapshot: Option<bool>,
    pub deletion_protection: Option<bool>,
    pub license_model: Option<String>,
    pub backup_retention_period: Option<i64>,
    pub preferred_backup_window: Option<String>,
    pub preferred_maintenance_window: Option<String>,
    pub db_parameter_group_name: Option<String>,
    pub option_group_name: Option<String>,
    pub db_subnet_group_name: Option<String>,
    pub vpc_security_group_ids: Vec<String>,
    pub enable_iam_database_authentication: Option<bool>,
    pub enable_performance_insights: Option<bool>,
    pub monitoring_interval: Option<i64>,
    pub monitoring_role_arn: Option<String>,
    pub enable_cloudwatch_logs_exports: Vec<String>,
    pub tags: Vec<Tag>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RestoreFromS3Input {
    pub settings: DbInstanceSettings,
    pub s3_bucket_name: String,
    pub s3_ingestion_role_arn: String,
    pub s3_prefix: Option<String>,
    pub source_engine: String,
    pub source_engine_version: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RestoreFromSnapshotInput {
    pub settings: DbInstanceSettings,
    pub db_snapshot_identifier: String,
}

/// Exactly one of the source fields is set.
#[derive(Debug, Clone, PartialEq)]
pub struct RestoreToPointInTimeInput {
    pub settings: DbInstanceSettings,
    pub restore_time: Option<String>,
    pub use_latest_restorable_time: Option<bool>,
    pub source_db_instance_automated_backups_arn: Option<String>,
    pub source_db_instance_identifier: Option<String>,
    pub source_dbi_resource_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CloudwatchLogsExportChange {
    pub enable_log_types: Vec<String>,
    pub disable_log_types: Vec<String>,
}

/// Only the set fields are changed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModifyDbInstanceInput {
    pub db_instance_identifier: String,
    pub apply_immediately: Option<bool>,
    pub allow_major_version_upgrade: Option<bool>,
    pub db_instance_class: Option<String>,
    pub engine_version: Option<String>,
    pub allocated_storage: Option<i64>,
    pub max_allocated_storage: Option<i64>,
    pub storage_type: Option<String>,
    pub iops: Option<i64>,
    pub multi_az: Option<bool>,
    pub master_user_password: Option<String>,
    pub db_port_number: Option<i64>,
    pub publicly_accessible: Option<bool>,
    pub auto_minor_version_upgrade: Option<bool>,
    pub copy_tags_to_snapshot: Option<bool>,
    pub deletion_protection: Option<bool>,
    pub ca_certificate_identifier: Option<String>,
    pub license_model: Option<String>,
    pub backup_retention_period: Option<i64>,
    pub preferred_backup_window: Option<String>,
    pub preferred_maintenance_window: Option<String>,
    pub db_parameter_group_name: Option<String>,
    pub option_group_name: Option<String>,
    pub db_subnet_group_name: Option<String>,
    pub vpc_security_group_ids: Vec<String>,
    pub enable_iam_database_authentication: Option<bool>,
    pub enable_performance_insights: Option<bool>,
    pub monitoring_interval: Option<i64>,
    pub monitoring_role_arn: Option<String>,
    pub cloudwatch_logs_export_configuration: Option<CloudwatchLogsExportChange>,
}

impl ModifyDbInstanceInput {
    /// True when nothing besides the identifier and apply flags is set.
    pub fn is_empty(&self) -> bool {
        let bare = Self {
            db_instance_identifier: self.db_instance_identifier.clone(),
            apply_immediately: self.apply_immediately,
            allow_major_version_upgrade: self.allow_major_version_upgrade,
            ..Default::default()
        };
        *self == bare
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeleteDbInstanceInput {
    pub db_instance_identifier: String,
    pub skip_final_snapshot: bool,
    pub final_db_snapshot_identifier: Option<String>,
    pub delete_automated_backups: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DbSubnetGroup {
    pub db_subnet_group_name: String,
    pub db_subnet_group_arn: String,
    pub db_subnet_group_description: String,
    pub subnet_group_status: String,
    pub vpc_id: String,
    pub subnets: Vec<Subnet>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DbSubnetGroupInput {
    pub db_subnet_group_name: String,
    pub db_subnet_group_description: String,
    pub subnet_ids: Vec<String>,
    pub tags: Vec<Tag>,
}

#[async_trait]
pub trait RdsApi: Send + Sync {
    async fn describe_db_instance(&self, id: &str) -> ApiResult<DbInstance>;

    async fn create_db_instance(
        &self,
        input: DbInstanceSettings,
    ) -> ApiResult<DbInstance>;

    async fn restore_db_instance_from_s3(
        &self,
        input: RestoreFromS3Input,
    ) -> ApiResult<DbInstance>;

    async fn restore_db_instance_from_db_snapshot(
        &self,
        input: RestoreFromSnapshotInput,
    ) -> ApiResult<DbInstance>;

    async fn restore_db_instance_to_point_in_time(
        &self,
        input: RestoreToPointInTimeInput,
    ) -> ApiResult<DbInstance>;

    async fn modify_db_instance(
        &self,
        input: ModifyDbInstanceInput,
    ) -> ApiResult<DbInstance>;

    async fn delete_db_instance(&self, input: DeleteDbInstanceInput) -> ApiResult<()>;

    async fn add_tags_to_resource(&self, arn: &str, tags: Vec<Tag>) -> ApiResult<()>;

    async fn remove_tags_from_resource(
        &self,
        arn: &str,
        keys: Vec<String>,
    ) -> ApiResult<()>;

    async fn list_tags_for_resource(&self, arn: &str) -> ApiResult<Vec<Tag>>;

    async fn describe_db_subnet_group(&self, name: &str) -> ApiResult<DbSubnetGroup>;

    async fn create_db_subnet_group(
        &self,
        input: DbSubnetGroupInput,
    ) -> ApiResult<DbSubnetGroup>;

    /// Tags in the input are ignored; use the tagging verbs.
    async fn modify_db_subnet_group(
        &self,
        input: DbSubnetGroupInput,
    ) -> ApiResult<DbSubnetGroup>;

    async fn delete_db_subnet_group(&self, name: &str) -> ApiResult<()>;
}
