//! In-memory AWS used by the integration tests.
#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use k8s_openapi::chrono::Utc;
use kube::Resource;
use tokio_util::sync::CancellationToken;
use xpa_runtime::memory::{
    MemoryEventRecorder, MemoryManagedStore, MemoryReferenceReader, MemorySecretStore,
};
use xpa_runtime::reference::{ResolveReferences, TargetKind};
use xpa_runtime::store::Event;
use xpa_runtime::{
    ConditionReason, ConditionType, ExternalConnector, Managed, ManagedExt,
    ReconcileError, Reconciler, Requeue,
};

use xpa_aws::clients::rds::{
    DbInstance, DbInstanceSettings, DbParameterGroupStatus, DbSubnetGroup,
    DbSubnetGroupInput, DeleteDbInstanceInput, ERR_DB_INSTANCE_NOT_FOUND,
    ERR_DB_SUBNET_GROUP_NOT_FOUND, ModifyDbInstanceInput, RestoreFromS3Input,
    RestoreFromSnapshotInput, RestoreToPointInTimeInput, VpcSecurityGroupMembership,
};
use xpa_aws::clients::s3::{
    CreateBucketInput, ERR_NO_SUCH_BUCKET, ERR_NO_SUCH_CORS, ERR_NO_SUCH_ENCRYPTION,
    ERR_NO_SUCH_KEY, ERR_NO_SUCH_LIFECYCLE, ERR_NO_SUCH_POLICY, ERR_NO_SUCH_REPLICATION,
    ERR_NO_SUCH_TAG_SET, ERR_NO_SUCH_WEBSITE, GetObjectOutput, LoggingEnabled,
    PutObjectInput,
};
use xpa_aws::clients::{
    ApiError, ApiResult, AwsClientFactory, AwsConfig, RdsApi, S3Api,
};
use xpa_aws::controller::connector::AwsConnector;
use xpa_aws::crd::Tag;
use xpa_aws::crd::bucket::{
    BucketLifecycleConfiguration, CorsConfiguration, NotificationConfiguration,
    ReplicationConfiguration, ServerSideEncryptionConfiguration,
    VersioningConfiguration, WebsiteConfiguration,
};
use xpa_aws::crd::db_instance::{Endpoint, OptionGroupMembership};
use xpa_aws::crd::db_subnet_group::Subnet;
use xpa_aws::crd::provider_config::{
    CredentialsSource, ProviderConfig, ProviderConfigSpec, ProviderCredentials,
};

pub const ACCOUNT: &str = "123456789012";

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap()
}

// ---------------------------------------------------------------- RDS

#[derive(Default)]
struct RdsState {
    instances: HashMap<String, DbInstance>,
    subnet_groups: HashMap<String, DbSubnetGroup>,
    tags: HashMap<String, Vec<Tag>>,
    calls: Vec<String>,
    modifies: Vec<ModifyDbInstanceInput>,
    deletes: Vec<DeleteDbInstanceInput>,
    created: Vec<DbInstanceSettings>,
    failures: HashMap<&'static str, ApiError>,
}

#[derive(Clone, Default)]
pub struct FakeRds {
    state: Arc<Mutex<RdsState>>,
}

fn instance_from_settings(s: &DbInstanceSettings) -> DbInstance {
    let arn = format!("arn:aws:rds:us-east-1:{ACCOUNT}:db:{}", s.db_instance_identifier);
    DbInstance {
        db_instance_identifier: s.db_instance_identifier.clone(),
        db_instance_arn: arn,
        dbi_resource_id: format!("db-{}", s.db_instance_identifier.to_uppercase()),
        db_instance_class: s.db_instance_class.clone(),
        db_instance_status: "creating".into(),
        engine: s.engine.clone(),
        engine_version: s.engine_version.clone(),
        allocated_storage: s.allocated_storage,
        max_allocated_storage: s.max_allocated_storage,
        storage_type: s.storage_type.clone(),
        iops: s.iops,
        storage_encrypted: s.storage_encrypted,
        kms_key_id: s.kms_key_id.clone(),
        availability_zone: s.availability_zone.clone(),
        multi_az: s.multi_az,
        db_name: s.db_name.clone(),
        master_username: s.master_username.clone(),
        endpoint: None,
        db_instance_port: s.port,
        publicly_accessible: s.publicly_accessible,
        auto_minor_version_upgrade: s.auto_minor_version_upgrade,
        copy_tags_to_snapshot: s.copy_tags_to_snapshot,
        deletion_protection: s.deletion_protection,
        license_model: s.license_model.clone(),
        backup_retention_period: s.backup_retention_period,
        preferred_backup_window: s.preferred_backup_window.clone(),
        preferred_maintenance_window: s.preferred_maintenance_window.clone(),
        db_parameter_groups: s
            .db_parameter_group_name
            .iter()
            .map(|n| DbParameterGroupStatus {
                db_parameter_group_name: n.clone(),
                parameter_apply_status: "in-sync".into(),
            })
            .collect(),
        option_group_memberships: s
            .option_group_name
            .iter()
            .map(|n| OptionGroupMembership {
                option_group_name: n.clone(),
                status: "in-sync".into(),
            })
            .collect(),
        db_subnet_group_name: s.db_subnet_group_name.clone(),
        vpc_security_groups: s
            .vpc_security_group_ids
            .iter()
            .map(|id| VpcSecurityGroupMembership {
                vpc_security_group_id: id.clone(),
                status: "active".into(),
            })
            .collect(),
        iam_database_authentication_enabled: s.enable_iam_database_authentication,
        performance_insights_enabled: s.enable_performance_insights,
        monitoring_interval: s.monitoring_interval,
        monitoring_role_arn: s.monitoring_role_arn.clone(),
        enabled_cloudwatch_logs_exports: s.enable_cloudwatch_logs_exports.clone(),
        tag_list: s.tags.clone(),
        ..Default::default()
    }
}

fn apply_modify(db: &mut DbInstance, m: &ModifyDbInstanceInput) {
    if let Some(v) = &m.db_instance_class {
        db.db_instance_class = v.clone();
    }
    if m.engine_version.is_some() {
        db.engine_version = m.engine_version.clone();
    }
    if m.allocated_storage.is_some() {
        db.allocated_storage = m.allocated_storage;
    }
    if m.max_allocated_storage.is_some() {
        db.max_allocated_storage = m.max_allocated_storage;
    }
    if m.multi_az.is_some() {
        db.multi_az = m.multi_az;
    }
    if m.backup_retention_period.is_some() {
        db.backup_retention_period = m.backup_retention_period;
    }
    if m.deletion_protection.is_some() {
        db.deletion_protection = m.deletion_protection;
    }
    if m.publicly_accessible.is_some() {
        db.publicly_accessible = m.publicly_accessible;
    }
}

impl FakeRds {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an existing instance; its tags move to the tag store.
    pub fn insert_instance(&self, db: DbInstance) {
        let mut s = lock(&self.state);
        s.tags.insert(db.db_instance_arn.clone(), db.tag_list.clone());
        s.instances.insert(db.db_instance_identifier.clone(), db);
    }

    pub fn instance(&self, id: &str) -> Option<DbInstance> {
        let s = lock(&self.state);
        s.instances.get(id).cloned().map(|mut db| {
            db.tag_list = s.tags.get(&db.db_instance_arn).cloned().unwrap_or_default();
            db
        })
    }

    pub fn update_instance(&self, id: &str, f: impl FnOnce(&mut DbInstance)) {
        if let Some(db) = lock(&self.state).instances.get_mut(id) {
            f(db);
        }
    }

    pub fn remove_instance(&self, id: &str) {
        lock(&self.state).instances.remove(id);
    }

    pub fn insert_subnet_group(&self, group: DbSubnetGroup, tags: Vec<Tag>) {
        let mut s = lock(&self.state);
        s.tags.insert(group.db_subnet_group_arn.clone(), tags);
        s.subnet_groups
            .insert(group.db_subnet_group_name.clone(), group);
    }

    pub fn subnet_group(&self, name: &str) -> Option<DbSubnetGroup> {
        lock(&self.state).subnet_groups.get(name).cloned()
    }

    pub fn tags_of(&self, arn: &str) -> Vec<Tag> {
        lock(&self.state).tags.get(arn).cloned().unwrap_or_default()
    }

    /// Make every later call of `verb` fail with `err`.
    pub fn fail(&self, verb: &'static str, err: ApiError) {
        lock(&self.state).failures.insert(verb, err);
    }

    pub fn calls(&self) -> Vec<String> {
        lock(&self.state).calls.clone()
    }

    pub fn clear_calls(&self) {
        lock(&self.state).calls.clear();
    }

    pub fn modifies(&self) -> Vec<ModifyDbInstanceInput> {
        lock(&self.state).modifies.clone()
    }

    pub fn deletes(&self) -> Vec<DeleteDbInstanceInput> {
        lock(&self.state).deletes.clone()
    }

    pub fn created(&self) -> Vec<DbInstanceSettings> {
        lock(&self.state).created.clone()
    }

    fn enter(&self, verb: &'static str, detail: String) -> ApiResult<std::sync::MutexGuard<'_, RdsState>> {
        let mut s = lock(&self.state);
        s.calls.push(if detail.is_empty() {
            verb.to_string()
        } else {
            format!("{verb} {detail}")
        });
        match s.failures.get(verb) {
            Some(err) => Err(err.clone()),
            None => Ok(s),
        }
    }

    fn instance_not_found(id: &str) -> ApiError {
        ApiError::new(ERR_DB_INSTANCE_NOT_FOUND, format!("DBInstance {id} not found."))
    }

    fn create_from(
        &self,
        verb: &'static str,
        settings: DbInstanceSettings,
    ) -> ApiResult<DbInstance> {
        let mut s = self.enter(verb, settings.db_instance_identifier.clone())?;
        let db = instance_from_settings(&settings);
        s.tags.insert(db.db_instance_arn.clone(), settings.tags.clone());
        s.instances
            .insert(settings.db_instance_identifier.clone(), db.clone());
        s.created.push(settings);
        Ok(db)
    }
}

#[async_trait]
impl RdsApi for FakeRds {
    async fn describe_db_instance(&self, id: &str) -> ApiResult<DbInstance> {
        drop(self.enter("DescribeDBInstances", id.to_string())?);
        self.instance(id).ok_or_else(|| Self::instance_not_found(id))
    }

    async fn create_db_instance(&self, input: DbInstanceSettings) -> ApiResult<DbInstance> {
        self.create_from("CreateDBInstance", input)
    }

    async fn restore_db_instance_from_s3(
        &self,
        input: RestoreFromS3Input,
    ) -> ApiResult<DbInstance> {
        self.create_from("RestoreDBInstanceFromS3", input.settings)
    }

    async fn restore_db_instance_from_db_snapshot(
        &self,
        input: RestoreFromSnapshotInput,
    ) -> ApiResult<DbInstance> {
        self.create_from("RestoreDBInstanceFromDBSnapshot", input.settings)
    }

    async fn restore_db_instance_to_point_in_time(
        &self,
        input: RestoreToPointInTimeInput,
    ) -> ApiResult<DbInstance> {
        self.create_from("RestoreDBInstanceToPointInTime", input.settings)
    }

    async fn modify_db_instance(
        &self,
        input: ModifyDbInstanceInput,
    ) -> ApiResult<DbInstance> {
        let mut s = self.enter("ModifyDBInstance", input.db_instance_identifier.clone())?;
        let id = input.db_instance_identifier.clone();
        let db = s
            .instances
            .get_mut(&id)
            .ok_or_else(|| Self::instance_not_found(&id))?;
        apply_modify(db, &input);
        let db = db.clone();
        s.modifies.push(input);
        Ok(db)
    }

    async fn delete_db_instance(&self, input: DeleteDbInstanceInput) -> ApiResult<()> {
        let mut s = self.enter("DeleteDBInstance", input.db_instance_identifier.clone())?;
        let id = input.db_instance_identifier.clone();
        let db = s
            .instances
            .get_mut(&id)
            .ok_or_else(|| Self::instance_not_found(&id))?;
        db.db_instance_status = "deleting".into();
        s.deletes.push(input);
        Ok(())
    }

    async fn add_tags_to_resource(&self, arn: &str, tags: Vec<Tag>) -> ApiResult<()> {
        let detail = tags
            .iter()
            .map(|t| format!("{}={}", t.key, t.value))
            .collect::<Vec<_>>()
            .join(",");
        let mut s = self.enter("AddTagsToResource", detail)?;
        let current = s.tags.entry(arn.to_string()).or_default();
        for tag in tags {
            current.retain(|t| t.key != tag.key);
            current.push(tag);
        }
        Ok(())
    }

    async fn remove_tags_from_resource(
        &self,
        arn: &str,
        keys: Vec<String>,
    ) -> ApiResult<()> {
        let mut s = self.enter("RemoveTagsFromResource", keys.join(","))?;
        if let Some(current) = s.tags.get_mut(arn) {
            current.retain(|t| !keys.contains(&t.key));
        }
        Ok(())
    }

    async fn list_tags_for_resource(&self, arn: &str) -> ApiResult<Vec<Tag>> {
        let s = self.enter("ListTagsForResource", String::new())?;
        Ok(s.tags.get(arn).cloned().unwrap_or_default())
    }

    async fn describe_db_subnet_group(&self, name: &str) -> ApiResult<DbSubnetGroup> {
        let s = self.enter("DescribeDBSubnetGroups", name.to_string())?;
        s.subnet_groups.get(name).cloned().ok_or_else(|| {
            ApiError::new(
                ERR_DB_SUBNET_GROUP_NOT_FOUND,
                format!("DB subnet group '{name}' not found."),
            )
        })
    }

    async fn create_db_subnet_group(
        &self,
        input: DbSubnetGroupInput,
    ) -> ApiResult<DbSubnetGroup> {
        let mut s = self.enter("CreateDBSubnetGroup", input.db_subnet_group_name.clone())?;
        let group = DbSubnetGroup {
            db_subnet_group_name: input.db_subnet_group_name.clone(),
            db_subnet_group_arn: format!(
                "arn:aws:rds:us-east-1:{ACCOUNT}:subgrp:{}",
                input.db_subnet_group_name
            ),
            db_subnet_group_description: input.db_subnet_group_description.clone(),
            subnet_group_status: "Complete".into(),
            vpc_id: "vpc-1".into(),
            subnets: subnets(&input.subnet_ids),
        };
        s.tags.insert(group.db_subnet_group_arn.clone(), input.tags);
        s.subnet_groups
            .insert(group.db_subnet_group_name.clone(), group.clone());
        Ok(group)
    }

    async fn modify_db_subnet_group(
        &self,
        input: DbSubnetGroupInput,
    ) -> ApiResult<DbSubnetGroup> {
        let mut s = self.enter("ModifyDBSubnetGroup", input.db_subnet_group_name.clone())?;
        let name = input.db_subnet_group_name.clone();
        let group = s.subnet_groups.get_mut(&name).ok_or_else(|| {
            ApiError::new(ERR_DB_SUBNET_GROUP_NOT_FOUND, format!("{name} not found"))
        })?;
        group.db_subnet_group_description = input.db_subnet_group_description;
        group.subnets = subnets(&input.subnet_ids);
        Ok(group.clone())
    }

    async fn delete_db_subnet_group(&self, name: &str) -> ApiResult<()> {
        let mut s = self.enter("DeleteDBSubnetGroup", name.to_string())?;
        match s.subnet_groups.remove(name) {
            Some(_) => Ok(()),
            None => Err(ApiError::new(
                ERR_DB_SUBNET_GROUP_NOT_FOUND,
                format!("{name} not found"),
            )),
        }
    }
}

pub fn subnets(ids: &[String]) -> Vec<Subnet> {
    ids.iter()
        .map(|id| Subnet {
            subnet_id: id.clone(),
            subnet_status: "Active".into(),
            availability_zone: Some("us-east-1a".into()),
        })
        .collect()
}

/// A converged postgres instance the way RDS describes it.
pub fn available_instance(id: &str) -> DbInstance {
    DbInstance {
        db_instance_identifier: id.to_string(),
        db_instance_arn: format!("arn:aws:rds:us-east-1:{ACCOUNT}:db:{id}"),
        dbi_resource_id: "db-ABCDEFG".into(),
        db_instance_class: "db.t3.small".into(),
        db_instance_status: "available".into(),
        engine: "postgres".into(),
        engine_version: Some("12.3".into()),
        allocated_storage: Some(20),
        availability_zone: Some("us-east-1b".into()),
        multi_az: Some(false),
        master_username: Some("root".into()),
        endpoint: Some(Endpoint {
            address: Some(format!("{id}.abc.us-east-1.rds.amazonaws.com")),
            port: Some(5432),
            hosted_zone_id: None,
        }),
        db_instance_port: Some(5432),
        backup_retention_period: Some(1),
        ..Default::default()
    }
}

// ---------------------------------------------------------------- S3

#[derive(Default, Clone)]
pub struct FakeBucket {
    pub accelerate: Option<String>,
    pub cors: Option<CorsConfiguration>,
    pub encryption: Option<ServerSideEncryptionConfiguration>,
    pub lifecycle: Option<BucketLifecycleConfiguration>,
    pub logging: Option<LoggingEnabled>,
    pub notification: NotificationConfiguration,
    pub payer: String,
    pub policy: Option<String>,
    pub replication: Option<ReplicationConfiguration>,
    pub tags: Option<Vec<Tag>>,
    pub versioning: VersioningConfiguration,
    pub website: Option<WebsiteConfiguration>,
    pub objects: BTreeMap<String, GetObjectOutput>,
}

impl FakeBucket {
    /// A freshly created bucket: requester pays off, nothing else set.
    pub fn new() -> Self {
        Self {
            payer: "BucketOwner".into(),
            ..Default::default()
        }
    }
}

#[derive(Default)]
struct S3State {
    buckets: HashMap<String, FakeBucket>,
    calls: Vec<String>,
    failures: HashMap<&'static str, ApiError>,
    object_versions: u64,
}

#[derive(Clone, Default)]
pub struct FakeS3 {
    state: Arc<Mutex<S3State>>,
}

fn no_such_bucket(bucket: &str) -> ApiError {
    ApiError::new(ERR_NO_SUCH_BUCKET, format!("bucket {bucket} does not exist"))
}

fn present<T: Clone>(v: &Option<T>, code: &str) -> ApiResult<T> {
    v.clone()
        .ok_or_else(|| ApiError::new(code, "The configuration does not exist"))
}

impl FakeS3 {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_bucket(&self, name: &str, bucket: FakeBucket) {
        lock(&self.state).buckets.insert(name.to_string(), bucket);
    }

    pub fn bucket(&self, name: &str) -> Option<FakeBucket> {
        lock(&self.state).buckets.get(name).cloned()
    }

    pub fn fail(&self, verb: &'static str, err: ApiError) {
        lock(&self.state).failures.insert(verb, err);
    }

    pub fn calls(&self) -> Vec<String> {
        lock(&self.state).calls.clone()
    }

    pub fn clear_calls(&self) {
        lock(&self.state).calls.clear();
    }

    /// Calls that change something, in order.
    pub fn writes(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| {
                ["Put", "Delete", "Create"]
                    .iter()
                    .any(|p| c.starts_with(p))
            })
            .collect()
    }

    fn enter(&self, verb: &'static str) -> ApiResult<std::sync::MutexGuard<'_, S3State>> {
        let mut s = lock(&self.state);
        s.calls.push(verb.to_string());
        match s.failures.get(verb) {
            Some(err) => Err(err.clone()),
            None => Ok(s),
        }
    }

    /// Run `f` on the named bucket, failing with NoSuchBucket if absent.
    fn with<T>(
        &self,
        verb: &'static str,
        bucket: &str,
        f: impl FnOnce(&mut FakeBucket) -> ApiResult<T>,
    ) -> ApiResult<T> {
        let mut s = self.enter(verb)?;
        let b = s
            .buckets
            .get_mut(bucket)
            .ok_or_else(|| no_such_bucket(bucket))?;
        f(b)
    }
}

#[async_trait]
impl S3Api for FakeS3 {
    async fn head_bucket(&self, bucket: &str) -> ApiResult<()> {
        let s = self.enter("HeadBucket")?;
        if s.buckets.contains_key(bucket) {
            Ok(())
        } else {
            Err(ApiError::new("NotFound", "Not Found"))
        }
    }

    async fn create_bucket(&self, input: CreateBucketInput) -> ApiResult<()> {
        let mut s = self.enter("CreateBucket")?;
        if s.buckets.contains_key(&input.bucket) {
            return Err(ApiError::new(
                "BucketAlreadyOwnedByYou",
                "Your previous request to create the named bucket succeeded",
            ));
        }
        s.buckets.insert(input.bucket, FakeBucket::new());
        Ok(())
    }

    async fn delete_bucket(&self, bucket: &str) -> ApiResult<()> {
        let mut s = self.enter("DeleteBucket")?;
        s.buckets
            .remove(bucket)
            .map(|_| ())
            .ok_or_else(|| no_such_bucket(bucket))
    }

    async fn get_bucket_accelerate_configuration(
        &self,
        bucket: &str,
    ) -> ApiResult<Option<String>> {
        self.with("GetBucketAccelerateConfiguration", bucket, |b| {
            Ok(b.accelerate.clone())
        })
    }

    async fn put_bucket_accelerate_configuration(
        &self,
        bucket: &str,
        status: &str,
    ) -> ApiResult<()> {
        self.with("PutBucketAccelerateConfiguration", bucket, |b| {
            b.accelerate = Some(status.to_string());
            Ok(())
        })
    }

    async fn get_bucket_cors(&self, bucket: &str) -> ApiResult<CorsConfiguration> {
        self.with("GetBucketCors", bucket, |b| present(&b.cors, ERR_NO_SUCH_CORS))
    }

    async fn put_bucket_cors(
        &self,
        bucket: &str,
        config: &CorsConfiguration,
    ) -> ApiResult<()> {
        self.with("PutBucketCors", bucket, |b| {
            b.cors = Some(config.clone());
            Ok(())
        })
    }

    async fn delete_bucket_cors(&self, bucket: &str) -> ApiResult<()> {
        self.with("DeleteBucketCors", bucket, |b| {
            b.cors = None;
            Ok(())
        })
    }

    async fn get_bucket_encryption(
        &self,
        bucket: &str,
    ) -> ApiResult<ServerSideEncryptionConfiguration> {
        self.with("GetBucketEncryption", bucket, |b| {
            present(&b.encryption, ERR_NO_SUCH_ENCRYPTION)
        })
    }

    async fn put_bucket_encryption(
        &self,
        bucket: &str,
        config: &ServerSideEncryptionConfiguration,
    ) -> ApiResult<()> {
        self.with("PutBucketEncryption", bucket, |b| {
            b.encryption = Some(config.clone());
            Ok(())
        })
    }

    async fn delete_bucket_encryption(&self, bucket: &str) -> ApiResult<()> {
        self.with("DeleteBucketEncryption", bucket, |b| {
            b.encryption = None;
            Ok(())
        })
    }

    async fn get_bucket_lifecycle_configuration(
        &self,
        bucket: &str,
    ) -> ApiResult<BucketLifecycleConfiguration> {
        self.with("GetBucketLifecycleConfiguration", bucket, |b| {
            present(&b.lifecycle, ERR_NO_SUCH_LIFECYCLE)
        })
    }

    async fn put_bucket_lifecycle_configuration(
        &self,
        bucket: &str,
        config: &BucketLifecycleConfiguration,
    ) -> ApiResult<()> {
        self.with("PutBucketLifecycleConfiguration", bucket, |b| {
            b.lifecycle = Some(config.clone());
            Ok(())
        })
    }

    async fn delete_bucket_lifecycle(&self, bucket: &str) -> ApiResult<()> {
        self.with("DeleteBucketLifecycle", bucket, |b| {
            b.lifecycle = None;
            Ok(())
        })
    }

    async fn get_bucket_logging(&self, bucket: &str) -> ApiResult<Option<LoggingEnabled>> {
        self.with("GetBucketLogging", bucket, |b| Ok(b.logging.clone()))
    }

    async fn put_bucket_logging(
        &self,
        bucket: &str,
        logging: Option<&LoggingEnabled>,
    ) -> ApiResult<()> {
        self.with("PutBucketLogging", bucket, |b| {
            b.logging = logging.cloned();
            Ok(())
        })
    }

    async fn get_bucket_notification_configuration(
        &self,
        bucket: &str,
    ) -> ApiResult<NotificationConfiguration> {
        self.with("GetBucketNotificationConfiguration", bucket, |b| {
            Ok(b.notification.clone())
        })
    }

    async fn put_bucket_notification_configuration(
        &self,
        bucket: &str,
        config: &NotificationConfiguration,
    ) -> ApiResult<()> {
        self.with("PutBucketNotificationConfiguration", bucket, |b| {
            b.notification = config.clone();
            Ok(())
        })
    }

    async fn get_bucket_request_payment(&self, bucket: &str) -> ApiResult<String> {
        self.with("GetBucketRequestPayment", bucket, |b| Ok(b.payer.clone()))
    }

    async fn put_bucket_request_payment(&self, bucket: &str, payer: &str) -> ApiResult<()> {
        self.with("PutBucketRequestPayment", bucket, |b| {
            b.payer = payer.to_string();
            Ok(())
        })
    }

    async fn get_bucket_policy(&self, bucket: &str) -> ApiResult<String> {
        self.with("GetBucketPolicy", bucket, |b| present(&b.policy, ERR_NO_SUCH_POLICY))
    }

    async fn put_bucket_policy(&self, bucket: &str, policy: &str) -> ApiResult<()> {
        self.with("PutBucketPolicy", bucket, |b| {
            b.policy = Some(policy.to_string());
            Ok(())
        })
    }

    async fn delete_bucket_policy(&self, bucket: &str) -> ApiResult<()> {
        self.with("DeleteBucketPolicy", bucket, |b| {
            b.policy = None;
            Ok(())
        })
    }

    async fn get_bucket_replication(
        &self,
        bucket: &str,
    ) -> ApiResult<ReplicationConfiguration> {
        self.with("GetBucketReplication", bucket, |b| {
            present(&b.replication, ERR_NO_SUCH_REPLICATION)
        })
    }

    async fn put_bucket_replication(
        &self,
        bucket: &str,
        config: &ReplicationConfiguration,
    ) -> ApiResult<()> {
        self.with("PutBucketReplication", bucket, |b| {
            b.replication = Some(config.without_references());
            Ok(())
        })
    }

    async fn delete_bucket_replication(&self, bucket: &str) -> ApiResult<()> {
        self.with("DeleteBucketReplication", bucket, |b| {
            b.replication = None;
            Ok(())
        })
    }

    async fn get_bucket_tagging(&self, bucket: &str) -> ApiResult<Vec<Tag>> {
        self.with("GetBucketTagging", bucket, |b| present(&b.tags, ERR_NO_SUCH_TAG_SET))
    }

    async fn put_bucket_tagging(&self, bucket: &str, tags: &[Tag]) -> ApiResult<()> {
        self.with("PutBucketTagging", bucket, |b| {
            b.tags = Some(tags.to_vec());
            Ok(())
        })
    }

    async fn delete_bucket_tagging(&self, bucket: &str) -> ApiResult<()> {
        self.with("DeleteBucketTagging", bucket, |b| {
            b.tags = None;
            Ok(())
        })
    }

    async fn get_bucket_versioning(
        &self,
        bucket: &str,
    ) -> ApiResult<VersioningConfiguration> {
        self.with("GetBucketVersioning", bucket, |b| Ok(b.versioning.clone()))
    }

    async fn put_bucket_versioning(
        &self,
        bucket: &str,
        config: &VersioningConfiguration,
    ) -> ApiResult<()> {
        self.with("PutBucketVersioning", bucket, |b| {
            b.versioning = config.clone();
            Ok(())
        })
    }

    async fn get_bucket_website(&self, bucket: &str) -> ApiResult<WebsiteConfiguration> {
        self.with("GetBucketWebsite", bucket, |b| {
            present(&b.website, ERR_NO_SUCH_WEBSITE)
        })
    }

    async fn put_bucket_website(
        &self,
        bucket: &str,
        config: &WebsiteConfiguration,
    ) -> ApiResult<()> {
        self.with("PutBucketWebsite", bucket, |b| {
            b.website = Some(config.clone());
            Ok(())
        })
    }

    async fn delete_bucket_website(&self, bucket: &str) -> ApiResult<()> {
        self.with("DeleteBucketWebsite", bucket, |b| {
            b.website = None;
            Ok(())
        })
    }

    async fn get_object(&self, bucket: &str, key: &str) -> ApiResult<GetObjectOutput> {
        self.with("GetObject", bucket, |b| {
            b.objects
                .get(key)
                .cloned()
                .ok_or_else(|| ApiError::new(ERR_NO_SUCH_KEY, "The specified key does not exist."))
        })
    }

    async fn put_object(&self, input: PutObjectInput) -> ApiResult<()> {
        let mut s = self.enter("PutObject")?;
        s.object_versions += 1;
        let version = s.object_versions;
        let b = s
            .buckets
            .get_mut(&input.bucket)
            .ok_or_else(|| no_such_bucket(&input.bucket))?;
        b.objects.insert(
            input.key,
            GetObjectOutput {
                body: input.body,
                content_type: input
                    .content_type
                    .or_else(|| Some("binary/octet-stream".into())),
                cache_control: input.cache_control,
                metadata: input.metadata,
                etag: Some(format!("\"etag-{version}\"")),
                version_id: Some(format!("v{version}")),
            },
        );
        Ok(())
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> ApiResult<()> {
        self.with("DeleteObject", bucket, |b| {
            b.objects.remove(key);
            Ok(())
        })
    }
}

// ---------------------------------------------------------------- wiring

#[derive(Clone, Default)]
pub struct FakeFactory {
    pub rds: FakeRds,
    pub s3: FakeS3,
    configs: Arc<Mutex<Vec<AwsConfig>>>,
}

impl FakeFactory {
    /// Every config a client was built with, in order.
    pub fn configs(&self) -> Vec<AwsConfig> {
        lock(&self.configs).clone()
    }
}

impl AwsClientFactory for FakeFactory {
    fn rds(&self, config: &AwsConfig) -> Arc<dyn RdsApi> {
        lock(&self.configs).push(config.clone());
        Arc::new(self.rds.clone())
    }

    fn s3(&self, config: &AwsConfig) -> Arc<dyn S3Api> {
        lock(&self.configs).push(config.clone());
        Arc::new(self.s3.clone())
    }
}

/// Everything a reconciler for one kind touches, all in memory.
pub struct Harness<K: ResolveReferences> {
    pub aws: FakeFactory,
    pub store: MemoryManagedStore<K>,
    pub secrets: MemorySecretStore,
    pub reader: MemoryReferenceReader,
    pub recorder: MemoryEventRecorder,
    reconciler: Reconciler<K>,
}

pub fn default_provider_config() -> serde_json::Value {
    let pc = ProviderConfig::new(
        "default",
        ProviderConfigSpec {
            credentials: ProviderCredentials {
                source: CredentialsSource::None,
                secret_ref: None,
                profile: None,
            },
            endpoint: None,
        },
    );
    serde_json::to_value(pc).unwrap()
}

impl<K: ResolveReferences> Harness<K> {
    /// Build a harness; `connector` receives the shared [`AwsConnector`].
    pub async fn new<C>(connector: impl FnOnce(AwsConnector) -> C) -> Self
    where
        C: ExternalConnector<K> + 'static,
    {
        let aws = FakeFactory::default();
        let store = MemoryManagedStore::new();
        let secrets = MemorySecretStore::new();
        let reader = MemoryReferenceReader::new();
        let recorder = MemoryEventRecorder::new();
        reader
            .insert(&TargetKind::of::<ProviderConfig>(), default_provider_config())
            .await;

        let shared = AwsConnector::new(
            Arc::new(aws.clone()),
            Arc::new(reader.clone()),
            Arc::new(secrets.clone()),
        );
        let reconciler = Reconciler::new(
            Arc::new(connector(shared)),
            Arc::new(store.clone()),
            Arc::new(secrets.clone()),
            Arc::new(reader.clone()),
            Arc::new(recorder.clone()),
        );
        Self {
            aws,
            store,
            secrets,
            reader,
            recorder,
            reconciler,
        }
    }

    pub async fn tick(&self, mg: &mut K) -> Result<Requeue, ReconcileError> {
        self.reconciler.reconcile(mg, &CancellationToken::new()).await
    }

    pub async fn events(&self) -> Vec<Event> {
        self.recorder.events().await
    }

    pub async fn event_reasons(&self) -> Vec<&'static str> {
        self.events().await.into_iter().map(|e| e.reason).collect()
    }

    pub async fn secret(&self, namespace: &str, name: &str) -> BTreeMap<String, String> {
        use xpa_runtime::store::SecretStore;
        self.secrets
            .get(namespace, name)
            .await
            .unwrap()
            .unwrap_or_default()
            .into_iter()
            .map(|(k, v)| (k, String::from_utf8(v).unwrap()))
            .collect()
    }
}

pub fn reason<K: Managed>(mg: &K, type_: ConditionType) -> Option<ConditionReason> {
    mg.condition(type_).map(|c| c.reason)
}

/// Mark an object as being deleted by the platform.
pub fn mark_deleted<K: Managed>(mg: &mut K) {
    mg.meta_mut().deletion_timestamp = Some(Time(Utc::now()));
}
