//! Pure conversions between `RDSInstanceParameters` and the RDS API shapes.

use std::collections::BTreeSet;

use chrono::DateTime;
use xpa_runtime::ConnectionDetails;
use xpa_runtime::conditions::{self, Condition};
use xpa_runtime::diff::{self, FieldPatch, TagDiff};
use xpa_runtime::external::{
    CONNECTION_KEY_ENDPOINT, CONNECTION_KEY_PASSWORD, CONNECTION_KEY_PORT,
    CONNECTION_KEY_USERNAME,
};
use xpa_runtime::late_init::LateInitializer;
use xpa_runtime::ExternalError;

use crate::clients::rds::{
    CloudwatchLogsExportChange, DbInstance, DbInstanceSettings,
    DeleteDbInstanceInput, ModifyDbInstanceInput, RestoreFromS3Input,
    RestoreFromSnapshotInput, RestoreToPointInTimeInput,
};
use crate::crd::db_instance::{
    RDSInstanceObservation, RDSInstanceParameters, RestoreSource,
};
use crate::crd::{tag_map, tags_from_map};

pub const STATUS_AVAILABLE: &str = "available";
pub const STATUS_CREATING: &str = "creating";
pub const STATUS_DELETING: &str = "deleting";

const OPTION_GROUP_PENDING_APPLY: &str = "pending-maintenance-apply";
const OPTION_GROUP_PENDING_REMOVAL: &str = "pending-maintenance-removal";
const OPTION_GROUP_ADOPTABLE: &[&str] =
    &["in-sync", "applying", "pending-apply", OPTION_GROUP_PENDING_APPLY];

/// Fields excluded from the generic diff. Some have dedicated comparisons,
/// some only matter at create or delete time, the rest are reference slots.
pub const IGNORED_FIELDS: &[&str] = &[
    "region",
    "tags",
    "dbName",
    "engineVersion",
    "skipFinalSnapshotBeforeDeletion",
    "finalDBSnapshotIdentifier",
    "deleteAutomatedBackups",
    "restoreFrom",
    "applyModificationsImmediately",
    "allowMajorVersionUpgrade",
    "masterPasswordSecretRef",
    "optionGroupName",
    "kmsKeyId",
    "enableCloudwatchLogsExports",
    "cloudwatchLogsExportConfiguration",
    "kmsKeyIdRef",
    "kmsKeyIdSelector",
    "dbSubnetGroupNameRef",
    "dbSubnetGroupNameSelector",
    "vpcSecurityGroupIdRefs",
    "vpcSecurityGroupIdSelector",
    "monitoringRoleArnRef",
    "monitoringRoleArnSelector",
];

pub fn generate_observation(db: &DbInstance) -> RDSInstanceObservation {
    RDSInstanceObservation {
        db_instance_status: db.db_instance_status.clone(),
        db_instance_arn: db.db_instance_arn.clone(),
        dbi_resource_id: db.dbi_resource_id.clone(),
        endpoint: db.endpoint.clone(),
        engine_version: db.engine_version.clone(),
        instance_create_time: db.instance_create_time.clone(),
        option_group_memberships: db.option_group_memberships.clone(),
        pending_modified_values: db.pending_modified_values.clone(),
        enabled_cloudwatch_logs_exports: db.enabled_cloudwatch_logs_exports.clone(),
        awsbackup_recovery_point_arn: db.awsbackup_recovery_point_arn.clone(),
    }
}

pub fn ready_condition(status: &str) -> Condition {
    match status {
        STATUS_AVAILABLE => conditions::available(),
        STATUS_CREATING => conditions::creating(),
        STATUS_DELETING => conditions::deleting(),
        _ => conditions::unavailable(),
    }
}

/// Fill unset parameters from the described instance. Returns true when
/// anything was assigned.
pub fn late_initialize(p: &mut RDSInstanceParameters, db: &DbInstance) -> bool {
    let mut li = LateInitializer::new();
    li.field(&mut p.db_instance_class, db.db_instance_class.clone());
    li.field(&mut p.engine, db.engine.clone());

    match (p.engine_version.as_deref(), db.engine_version.as_deref()) {
        (Some(want), Some(got))
            if want != got && diff::version_has_prefix(want, got) =>
        {
            p.engine_version = Some(got.to_string());
            li.mark();
        }
        _ => li.field(&mut p.engine_version, db.engine_version.clone()),
    }

    li.field(&mut p.allocated_storage, db.allocated_storage);
    li.field(&mut p.max_allocated_storage, db.max_allocated_storage);
    li.field(&mut p.storage_type, db.storage_type.clone());
    li.field(&mut p.iops, db.iops);
    li.field(&mut p.storage_encrypted, db.storage_encrypted);
    li.field(&mut p.kms_key_id, db.kms_key_id.clone());
    li.field(&mut p.availability_zone, db.availability_zone.clone());
    li.field(&mut p.multi_az, db.multi_az);
    li.field(&mut p.db_name, db.db_name.clone());
    li.field(&mut p.master_username, db.master_username.clone());
    li.field(
        &mut p.port,
        db.db_instance_port
            .or_else(|| db.endpoint.as_ref().and_then(|e| e.port)),
    );
    li.field(&mut p.publicly_accessible, db.publicly_accessible);
    li.field(&mut p.auto_minor_version_upgrade, db.auto_minor_version_upgrade);
    li.field(&mut p.copy_tags_to_snapshot, db.copy_tags_to_snapshot);
    li.field(&mut p.deletion_protection, db.deletion_protection);
    li.field(&mut p.ca_certificate_identifier, db.ca_certificate_identifier.clone());
    li.field(&mut p.license_model, db.license_model.clone());
    li.field(&mut p.backup_retention_period, db.backup_retention_period);
    li.field(&mut p.preferred_backup_window, db.preferred_backup_window.clone());
    li.field(
        &mut p.preferred_maintenance_window,
        db.preferred_maintenance_window.clone(),
    );
    li.field(
        &mut p.db_parameter_group_name,
        db.db_parameter_groups
            .first()
            .map(|g| g.db_parameter_group_name.clone()),
    );
    li.field(
        &mut p.option_group_name,
        db.option_group_memberships
            .iter()
            .find(|m| OPTION_GROUP_ADOPTABLE.contains(&m.status.as_str()))
            .map(|m| m.option_group_name.clone()),
    );
    li.field(&mut p.db_subnet_group_name, db.db_subnet_group_name.clone());
    li.field(
        &mut p.vpc_security_group_ids,
        db.vpc_security_groups
            .iter()
            .map(|g| g.vpc_security_group_id.clone())
            .collect(),
    );
    li.field(
        &mut p.enable_iam_database_authentication,
        db.iam_database_authentication_enabled,
    );
    li.field(&mut p.enable_performance_insights, db.performance_insights_enabled);
    li.field(&mut p.monitoring_interval, db.monitoring_interval);
    li.field(&mut p.monitoring_role_arn, db.monitoring_role_arn.clone());
    li.field(
        &mut p.enable_cloudwatch_logs_exports,
        db.enabled_cloudwatch_logs_exports.clone(),
    );
    li.changed()
}

/// Parameters as they would read if the instance had been declared exactly
/// as it is observed.
pub fn current_params(db: &DbInstance) -> RDSInstanceParameters {
    let mut p = RDSInstanceParameters::default();
    late_initialize(&mut p, db);
    p
}

/// Patch of the top-level fields where `desired` differs from `db`, after
/// normalizing the fields the cloud manages itself.
pub fn create_patch(
    db: &DbInstance,
    desired: &RDSInstanceParameters,
) -> Result<FieldPatch, ExternalError> {
    let mut target = desired.clone();
    let mut current = current_params(db);

    // The zone is chosen by the cloud for Multi-AZ deployments.
    if target.multi_az == Some(true) || current.multi_az == Some(true) {
        target.availability_zone = None;
        current.availability_zone = None;
    }

    // Storage autoscaling grew the volume; do not ask to shrink it.
    if target.max_allocated_storage.is_some() {
        if let (Some(got), Some(want)) =
            (current.allocated_storage, target.allocated_storage)
        {
            if got > want {
                current.allocated_storage = Some(want);
            }
        }
    }

    // AWS Backup owns the backup settings once it has a recovery point.
    if db
        .awsbackup_recovery_point_arn
        .as_deref()
        .is_some_and(|arn| !arn.is_empty())
    {
        target.backup_retention_period = None;
        target.preferred_backup_window = None;
        current.backup_retention_period = None;
        current.preferred_backup_window = None;
    }

    target.vpc_security_group_ids.sort();
    current.vpc_security_group_ids.sort();

    Ok(diff::create_patch(&current, &target)?)
}

pub fn engine_version_needs_upgrade(
    desired: &RDSInstanceParameters,
    db: &DbInstance,
) -> bool {
    match (desired.engine_version.as_deref(), db.engine_version.as_deref()) {
        (Some(want), Some(got)) => diff::version_needs_upgrade(want, got),
        _ => false,
    }
}

pub fn option_group_up_to_date(
    desired: &RDSInstanceParameters,
    db: &DbInstance,
) -> bool {
    let Some(want) = desired.option_group_name.as_deref() else {
        return true;
    };
    let immediately = desired.apply_modifications_immediately.unwrap_or(false);
    db.option_group_memberships
        .iter()
        .find(|m| m.option_group_name == want)
        .is_some_and(|m| match m.status.as_str() {
            OPTION_GROUP_PENDING_APPLY => !immediately,
            OPTION_GROUP_PENDING_REMOVAL => false,
            _ => true,
        })
}

fn cloudwatch_change_pending(db: &DbInstance) -> bool {
    db.pending_modified_values
        .as_ref()
        .and_then(|p| p.pending_cloudwatch_logs_exports.as_ref())
        .is_some_and(|p| {
            !p.log_types_to_enable.is_empty() || !p.log_types_to_disable.is_empty()
        })
}

/// The deprecated enable/disable configuration is consulted only while the
/// list form is empty.
fn desired_log_exports(p: &RDSInstanceParameters, db: &DbInstance) -> Vec<String> {
    let Some(cfg) = p
        .cloudwatch_logs_export_configuration
        .as_ref()
        .filter(|_| p.enable_cloudwatch_logs_exports.is_empty())
    else {
        return p.enable_cloudwatch_logs_exports.clone();
    };
    let mut set: BTreeSet<String> = db
        .enabled_cloudwatch_logs_exports
        .iter()
        .chain(cfg.enable_log_types.iter())
        .cloned()
        .collect();
    for t in &cfg.disable_log_types {
        set.remove(t);
    }
    set.into_iter().collect()
}

pub fn cloudwatch_up_to_date(p: &RDSInstanceParameters, db: &DbInstance) -> bool {
    if cloudwatch_change_pending(db) {
        return true;
    }
    diff::same_set(&desired_log_exports(p, db), &db.enabled_cloudwatch_logs_exports)
}

fn cloudwatch_change(
    p: &RDSInstanceParameters,
    db: &DbInstance,
) -> Option<CloudwatchLogsExportChange> {
    if cloudwatch_change_pending(db) {
        return None;
    }
    let want = desired_log_exports(p, db);
    let got = &db.enabled_cloudwatch_logs_exports;
    let change = CloudwatchLogsExportChange {
        enable_log_types: want.iter().filter(|t| !got.contains(t)).cloned().collect(),
        disable_log_types: got.iter().filter(|t| !want.contains(t)).cloned().collect(),
    };
    (!change.enable_log_types.is_empty() || !change.disable_log_types.is_empty())
        .then_some(change)
}

pub fn tag_diff(p: &RDSInstanceParameters, db: &DbInstance) -> TagDiff {
    diff::diff_tags(&tag_map(&p.tags), &tag_map(&db.tag_list))
}

/// Everything that keeps the instance from being up to date.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Drift {
    pub patch: FieldPatch,
    pub engine_version: bool,
    pub option_group: bool,
    pub cloudwatch_logs: bool,
    pub tags: TagDiff,
}

impl Drift {
    pub fn is_empty(&self) -> bool {
        self.patch.is_empty()
            && !self.engine_version
            && !self.option_group
            && !self.cloudwatch_logs
            && self.tags.is_empty()
    }

    pub fn describe(&self, p: &RDSInstanceParameters, db: &DbInstance) -> String {
        let mut lines: Vec<String> = Vec::new();
        if !self.patch.is_empty() {
            lines.push(self.patch.describe());
        }
        if self.engine_version {
            lines.push(format!(
                "engineVersion: {} -> {}",
                db.engine_version.as_deref().unwrap_or_default(),
                p.engine_version.as_deref().unwrap_or_default()
            ));
        }
        if self.option_group {
            lines.push(format!(
                "optionGroupName: -> {}",
                p.option_group_name.as_deref().unwrap_or_default()
            ));
        }
        if self.cloudwatch_logs {
            lines.push(format!(
                "enableCloudwatchLogsExports: {:?} -> {:?}",
                db.enabled_cloudwatch_logs_exports,
                desired_log_exports(p, db)
            ));
        }
        if !self.tags.is_empty() {
            let add = self.tags.add.iter().map(|(k, v)| format!("+{k}={v}"));
            let remove = self.tags.remove.iter().map(|k| format!("-{k}"));
            lines.push(format!(
                "tags: {}",
                add.chain(remove).collect::<Vec<_>>().join(", ")
            ));
        }
        lines.join("\n")
    }
}

pub fn drift(p: &RDSInstanceParameters, db: &DbInstance) -> Result<Drift, ExternalError> {
    Ok(Drift {
        patch: create_patch(db, p)?.without(IGNORED_FIELDS),
        engine_version: engine_version_needs_upgrade(p, db),
        option_group: !option_group_up_to_date(p, db),
        cloudwatch_logs: !cloudwatch_up_to_date(p, db),
        tags: tag_diff(p, db),
    })
}

fn when<T: Clone>(patch: &FieldPatch, field: &str, value: &Option<T>) -> Option<T> {
    if patch.contains(field) {
        value.clone()
    } else {
        None
    }
}

/// Modify request carrying only what drifted. `patch` comes from
/// [`create_patch`].
pub fn generate_modify_input(
    id: &str,
    p: &RDSInstanceParameters,
    db: &DbInstance,
    patch: &FieldPatch,
) -> ModifyDbInstanceInput {
    ModifyDbInstanceInput {
        db_instance_identifier: id.to_string(),
        apply_immediately: p.apply_modifications_immediately,
        allow_major_version_upgrade: p.allow_major_version_upgrade,
        db_instance_class: patch
            .contains("dbInstanceClass")
            .then(|| p.db_instance_class.clone()),
        engine_version: if engine_version_needs_upgrade(p, db) {
            p.engine_version.clone()
        } else {
            None
        },
        allocated_storage: when(patch, "allocatedStorage", &p.allocated_storage),
        max_allocated_storage: when(patch, "maxAllocatedStorage", &p.max_allocated_storage),
        storage_type: when(patch, "storageType", &p.storage_type),
        iops: when(patch, "iops", &p.iops),
        multi_az: when(patch, "multiAZ", &p.multi_az),
        master_user_password: None,
        db_port_number: when(patch, "port", &p.port),
        publicly_accessible: when(patch, "publiclyAccessible", &p.publicly_accessible),
        auto_minor_version_upgrade: when(
            patch,
            "autoMinorVersionUpgrade",
            &p.auto_minor_version_upgrade,
        ),
        copy_tags_to_snapshot: when(patch, "copyTagsToSnapshot", &p.copy_tags_to_snapshot),
        deletion_protection: when(patch, "deletionProtection", &p.deletion_protection),
        ca_certificate_identifier: when(
            patch,
            "caCertificateIdentifier",
            &p.ca_certificate_identifier,
        ),
        license_model: when(patch, "licenseModel", &p.license_model),
        backup_retention_period: when(
            patch,
            "backupRetentionPeriod",
            &p.backup_retention_period,
        ),
        preferred_backup_window: when(
            patch,
            "preferredBackupWindow",
            &p.preferred_backup_window,
        ),
        preferred_maintenance_window: when(
            patch,
            "preferredMaintenanceWindow",
            &p.preferred_maintenance_window,
        ),
        db_parameter_group_name: when(
            patch,
            "dbParameterGroupName",
            &p.db_parameter_group_name,
        ),
        option_group_name: if option_group_up_to_date(p, db) {
            None
        } else {
            p.option_group_name.clone()
        },
        db_subnet_group_name: when(patch, "dbSubnetGroupName", &p.db_subnet_group_name),
        vpc_security_group_ids: if patch.contains("vpcSecurityGroupIds") {
            p.vpc_security_group_ids.clone()
        } else {
            Vec::new()
        },
        enable_iam_database_authentication: when(
            patch,
            "enableIamDatabaseAuthentication",
            &p.enable_iam_database_authentication,
        ),
        enable_performance_insights: when(
            patch,
            "enablePerformanceInsights",
            &p.enable_performance_insights,
        ),
        monitoring_interval: when(patch, "monitoringInterval", &p.monitoring_interval),
        monitoring_role_arn: when(patch, "monitoringRoleArn", &p.monitoring_role_arn),
        cloudwatch_logs_export_configuration: cloudwatch_change(p, db),
    }
}

pub fn generate_create_settings(
    id: &str,
    p: &RDSInstanceParameters,
    password: Option<String>,
) -> DbInstanceSettings {
    DbInstanceSettings {
        db_instance_identifier: id.to_string(),
        db_instance_class: p.db_instance_class.clone(),
        engine: p.engine.clone(),
        engine_version: p.engine_version.clone(),
        allocated_storage: p.allocated_storage,
        max_allocated_storage: p.max_allocated_storage,
        storage_type: p.storage_type.clone(),
        iops: p.iops,
        storage_encrypted: p.storage_encrypted,
        kms_key_id: p.kms_key_id.clone(),
        availability_zone: p.availability_zone.clone(),
        multi_az: p.multi_az,
        db_name: p.db_name.clone(),
        master_username: p.master_username.clone(),
        master_user_password: password,
        port: p.port,
        publicly_accessible: p.publicly_accessible,
        auto_minor_version_upgrade: p.auto_minor_version_upgrade,
        copy_tags_to_snapshot: p.copy_tags_to_snapshot,
        deletion_protection: p.deletion_protection,
        license_model: p.license_model.clone(),
        backup_retention_period: p.backup_retention_period,
        preferred_backup_window: p.preferred_backup_window.clone(),
        preferred_maintenance_window: p.preferred_maintenance_window.clone(),
        db_parameter_group_name: p.db_parameter_group_name.clone(),
        option_group_name: p.option_group_name.clone(),
        db_subnet_group_name: p.db_subnet_group_name.clone(),
        vpc_security_group_ids: p.vpc_security_group_ids.clone(),
        enable_iam_database_authentication: p.enable_iam_database_authentication,
        enable_performance_insights: p.enable_performance_insights,
        monitoring_interval: p.monitoring_interval,
        monitoring_role_arn: p.monitoring_role_arn.clone(),
        enable_cloudwatch_logs_exports: p.enable_cloudwatch_logs_exports.clone(),
        tags: tags_from_map(&tag_map(&p.tags)),
    }
}

/// The API call that brings a new instance into existence.
#[derive(Debug, Clone, PartialEq)]
pub enum CreateRequest {
    Create(DbInstanceSettings),
    FromS3(RestoreFromS3Input),
    FromSnapshot(RestoreFromSnapshotInput),
    ToPointInTime(RestoreToPointInTimeInput),
}

impl CreateRequest {
    /// The master password the new instance will carry, if the request sets
    /// one. Snapshot and point-in-time restores inherit the source's.
    pub fn password(&self) -> Option<&str> {
        match self {
            CreateRequest::Create(s) => s.master_user_password.as_deref(),
            CreateRequest::FromS3(r) => r.settings.master_user_password.as_deref(),
            CreateRequest::FromSnapshot(_) | CreateRequest::ToPointInTime(_) => None,
        }
    }
}

/// Pick plain create or one of the restore calls from `restoreFrom`.
pub fn generate_create_request(
    id: &str,
    p: &RDSInstanceParameters,
    password: String,
) -> Result<CreateRequest, ExternalError> {
    let Some(restore) = p.restore_from.as_ref() else {
        return Ok(CreateRequest::Create(generate_create_settings(
            id,
            p,
            Some(password),
        )));
    };

    match restore.source {
        RestoreSource::S3 => {
            let s3 = restore.s3.as_ref().ok_or_else(|| {
                ExternalError::Invalid("restoreFrom.s3 is required for source S3".into())
            })?;
            Ok(CreateRequest::FromS3(RestoreFromS3Input {
                settings: generate_create_settings(id, p, Some(password)),
                s3_bucket_name: s3.bucket_name.clone(),
                s3_ingestion_role_arn: s3.ingestion_role_arn.clone(),
                s3_prefix: s3.prefix.clone(),
                source_engine: s3.source_engine.clone(),
                source_engine_version: s3.source_engine_version.clone(),
            }))
        }
        RestoreSource::Snapshot => {
            let snap = restore.snapshot.as_ref().ok_or_else(|| {
                ExternalError::Invalid(
                    "restoreFrom.snapshot is required for source Snapshot".into(),
                )
            })?;
            Ok(CreateRequest::FromSnapshot(RestoreFromSnapshotInput {
                settings: inherited_settings(id, p),
                db_snapshot_identifier: snap.snapshot_identifier.clone(),
            }))
        }
        RestoreSource::PointInTime => {
            let pit = restore.point_in_time.as_ref().ok_or_else(|| {
                ExternalError::Invalid(
                    "restoreFrom.pointInTime is required for source PointInTime".into(),
                )
            })?;
            let sources = [
                pit.source_db_instance_automated_backups_arn.is_some(),
                pit.source_db_instance_identifier.is_some(),
                pit.source_dbi_resource_id.is_some(),
            ];
            if sources.iter().filter(|s| **s).count() != 1 {
                return Err(ExternalError::Invalid(
                    "restoreFrom.pointInTime needs exactly one of \
                     sourceDBInstanceAutomatedBackupsArn, \
                     sourceDBInstanceIdentifier, sourceDbiResourceId"
                        .into(),
                ));
            }
            if let Some(t) = pit.restore_time.as_deref() {
                DateTime::parse_from_rfc3339(t).map_err(|e| {
                    ExternalError::Invalid(format!(
                        "restoreFrom.pointInTime.restoreTime {t}: {e}"
                    ))
                })?;
            } else if pit.use_latest_restorable_time != Some(true) {
                return Err(ExternalError::Invalid(
                    "restoreFrom.pointInTime needs restoreTime or \
                     useLatestRestorableTime"
                        .into(),
                ));
            }
            Ok(CreateRequest::ToPointInTime(RestoreToPointInTimeInput {
                settings: inherited_settings(id, p),
                restore_time: pit.restore_time.clone(),
                use_latest_restorable_time: pit.use_latest_restorable_time,
                source_db_instance_automated_backups_arn: pit
                    .source_db_instance_automated_backups_arn
                    .clone(),
                source_db_instance_identifier: pit.source_db_instance_identifier.clone(),
                source_dbi_resource_id: pit.source_dbi_resource_id.clone(),
            }))
        }
    }
}

/// Settings for restores that take credentials and database name from the
/// source.
fn inherited_settings(id: &str, p: &RDSInstanceParameters) -> DbInstanceSettings {
    DbInstanceSettings {
        master_username: None,
        db_name: None,
        ..generate_create_settings(id, p, None)
    }
}

pub fn generate_delete_input(
    id: &str,
    p: &RDSInstanceParameters,
) -> DeleteDbInstanceInput {
    DeleteDbInstanceInput {
        db_instance_identifier: id.to_string(),
        skip_final_snapshot: p.skip_final_snapshot_before_deletion.unwrap_or(false),
        final_db_snapshot_identifier: p.final_db_snapshot_identifier.clone(),
        delete_automated_backups: p.delete_automated_backups,
    }
}

/// Endpoint and port, only once the instance has an address.
pub fn connection_details(obs: &RDSInstanceObservation) -> ConnectionDetails {
    let mut details = ConnectionDetails::new();
    let Some(ep) = obs.endpoint.as_ref() else {
        return details;
    };
    let Some(address) = ep.address.as_deref().filter(|a| !a.is_empty()) else {
        return details;
    };
    details.insert(CONNECTION_KEY_ENDPOINT.into(), address.as_bytes().to_vec());
    if let Some(port) = ep.port {
        details.insert(CONNECTION_KEY_PORT.into(), port.to_string().into_bytes());
    }
    details
}

pub fn credential_details(username: Option<&str>, password: Option<&str>) -> ConnectionDetails {
    let mut details = ConnectionDetails::new();
    if let Some(u) = username.filter(|u| !u.is_empty()) {
        details.insert(CONNECTION_KEY_USERNAME.into(), u.as_bytes().to_vec());
    }
    if let Some(pw) = password {
        details.insert(CONNECTION_KEY_PASSWORD.into(), pw.as_bytes().to_vec());
    }
    details
}
