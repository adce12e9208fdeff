use std::collections::BTreeMap;

use async_trait::async_trait;

use super::ApiResult;
use crate::crd::Tag;
use crate::crd::bucket::{
    BucketLifecycleConfiguration, CorsConfiguration, NotificationConfiguration,
    ReplicationConfiguration, ServerSideEncryptionConfiguration,
    VersioningConfiguration, WebsiteConfiguration,
};

// Error codes S3 uses for a missing bucket, object or configuration.
pub const ERR_NOT_FOUND: &str = "NotFound";
pub const ERR_NO_SUCH_BUCKET: &str = "NoSuchBucket";
pub const ERR_NO_SUCH_KEY: &str = "NoSuchKey";
pub const ERR_BUCKET_ALREADY_OWNED: &str = "BucketAlreadyOwnedByYou";
pub const ERR_NO_SUCH_CORS: &str = "NoSuchCORSConfiguration";
pub const ERR_NO_SUCH_LIFECYCLE: &str = "NoSuchLifecycleConfiguration";
pub const ERR_NO_SUCH_ENCRYPTION: &str =
    "ServerSideEncryptionConfigurationNotFoundError";
pub const ERR_NO_SUCH_REPLICATION: &str = "ReplicationConfigurationNotFoundError";
pub const ERR_NO_SUCH_TAG_SET: &str = "NoSuchTagSet";
pub const ERR_NO_SUCH_WEBSITE: &str = "NoSuchWebsiteConfiguration";
pub const ERR_NO_SUCH_POLICY: &str = "NoSuchBucketPolicy";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CreateBucketInput {
    pub bucket: String,
    pub location_constraint: String,
    pub acl: Option<String>,
    pub object_lock_enabled_for_bucket: Option<bool>,
}

/// Destination of server access logs; absent when logging is disabled.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoggingEnabled {
    pub target_bucket: String,
    pub target_prefix: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PutObjectInput {
    pub bucket: String,
    pub key: String,
    pub body: Vec<u8>,
    pub content_type: Option<String>,
    pub cache_control: Option<String>,
    pub metadata: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GetObjectOutput {
    pub body: Vec<u8>,
    pub content_type: Option<String>,
    pub cache_control: Option<String>,
    pub metadata: BTreeMap<String, String>,
    pub etag: Option<String>,
    pub version_id: Option<String>,
}

/// S3 verbs. Configuration payloads use the resource's own shapes; the SDK
/// binding converts them to wire types.
#[async_trait]
pub trait S3Api: Send + Sync {
    async fn head_bucket(&self, bucket: &str) -> ApiResult<()>;
    async fn create_bucket(&self, input: CreateBucketInput) -> ApiResult<()>;
    async fn delete_bucket(&self, bucket: &str) -> ApiResult<()>;

    /// `None` when acceleration was never configured.
    async fn get_bucket_accelerate_configuration(
        &self,
        bucket: &str,
    ) -> ApiResult<Option<String>>;
    async fn put_bucket_accelerate_configuration(
        &self,
        bucket: &str,
        status: &str,
    ) -> ApiResult<()>;

    async fn get_bucket_cors(&self, bucket: &str) -> ApiResult<CorsConfiguration>;
    async fn put_bucket_cors(
        &self,
        bucket: &str,
        config: &CorsConfiguration,
    ) -> ApiResult<()>;
    async fn delete_bucket_cors(&self, bucket: &str) -> ApiResult<()>;

    async fn get_bucket_encryption(
        &self,
        bucket: &str,
    ) -> ApiResult<ServerSideEncryptionConfiguration>;
    async fn put_bucket_encryption(
        &self,
        bucket: &str,
        config: &ServerSideEncryptionConfiguration,
    ) -> ApiResult<()>;
    async fn delete_bucket_encryption(&self, bucket: &str) -> ApiResult<()>;

    async fn get_bucket_lifecycle_configuration(
        &self,
        bucket: &str,
    ) -> ApiResult<BucketLifecycleConfiguration>;
    async fn put_bucket_lifecycle_configuration(
        &self,
        bucket: &str,
        config: &BucketLifecycleConfiguration,
    ) -> ApiResult<()>;
    async fn delete_bucket_lifecycle(&self, bucket: &str) -> ApiResult<()>;

    async fn get_bucket_logging(&self, bucket: &str) -> ApiResult<Option<LoggingEnabled>>;
    /// `None` disables logging.
    async fn put_bucket_logging(
        &self,
        bucket: &str,
        logging: Option<&LoggingEnabled>,
    ) -> ApiResult<()>;

    /// An empty configuration when none was set.
    async fn get_bucket_notification_configuration(
        &self,
        bucket: &str,
    ) -> ApiResult<NotificationConfiguration>;
    async fn put_bucket_notification_configuration(
        &self,
        bucket: &str,
        config: &NotificationConfiguration,
    ) -> ApiResult<()>;

    async fn get_bucket_request_payment(&self, bucket: &str) -> ApiResult<String>;
    async fn put_bucket_request_payment(&self, bucket: &str, payer: &str)
    -> ApiResult<()>;

    async fn get_bucket_policy(&self, bucket: &str) -> ApiResult<String>;
    async fn put_bucket_policy(&self, bucket: &str, policy: &str) -> ApiResult<()>;
    async fn delete_bucket_policy(&self, bucket: &str) -> ApiResult<()>;

    /// Reference fields of the returned configuration are always unset.
    async fn get_bucket_replication(
        &self,
        bucket: &str,
    ) -> ApiResult<ReplicationConfiguration>;
    async fn put_bucket_replication(
        &self,
        bucket: &str,
        config: &ReplicationConfiguration,
    ) -> ApiResult<()>;
    async fn delete_bucket_replication(&self, bucket: &str) -> ApiResult<()>;

    async fn get_bucket_tagging(&self, bucket: &str) -> ApiResult<Vec<Tag>>;
    async fn put_bucket_tagging(&self, bucket: &str, tags: &[Tag]) -> ApiResult<()>;
    async fn delete_bucket_tagging(&self, bucket: &str) -> ApiResult<()>;

    /// Status is `None` when versioning was never enabled.
    async fn get_bucket_versioning(
        &self,
        bucket: &str,
    ) -> ApiResult<VersioningConfiguration>;
    async fn put_bucket_versioning(
        &self,
        bucket: &str,
        config: &VersioningConfiguration,
    ) -> ApiResult<()>;

    async fn get_bucket_website(&self, bucket: &str) -> ApiResult<WebsiteConfiguration>;
    async fn put_bucket_website(
        &self,
        bucket: &str,
        config: &WebsiteConfiguration,
    ) -> ApiResult<()>;
    async fn delete_bucket_website(&self, bucket: &str) -> ApiResult<()>;

    async fn get_object(&self, bucket: &str, key: &str) -> ApiResult<GetObjectOutput>;
    async fn put_object(&self, input: PutObjectInput) -> ApiResult<()>;
    async fn delete_object(&self, bucket: &str, key: &str) -> ApiResult<()>;
}
