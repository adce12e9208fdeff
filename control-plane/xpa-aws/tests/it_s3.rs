mod common;

use std::collections::BTreeMap;
use std::sync::Arc;

use common::{FakeBucket, FakeS3, Harness, mark_deleted, reason};
use serde_json::json;
use xpa_aws::crd::Tag;
use xpa_aws::crd::bucket::{
    Bucket, BucketLifecycleConfiguration, BucketParameters, BucketSpec,
    CorsConfiguration, CorsRule, IndexDocument, LifecycleExpiration, LifecycleRule,
    ReplicationConfiguration, ReplicationDestination, ReplicationRule,
    ServerSideEncryptionByDefault, ServerSideEncryptionConfiguration,
    ServerSideEncryptionRule, Tagging, VersioningConfiguration, WebsiteConfiguration,
};
use xpa_aws::crd::bucket_policy::{BucketPolicy, BucketPolicyParameters, BucketPolicySpec};
use xpa_aws::crd::object::{Object, ObjectParameters, ObjectSpec};
use xpa_aws::s3::bucket::cors::CorsClient;
use xpa_aws::s3::bucket::encryption::EncryptionClient;
use xpa_aws::s3::bucket::lifecycle::LifecycleClient;
use xpa_aws::s3::bucket::replication::ReplicationClient;
use xpa_aws::s3::bucket::tagging::TaggingClient;
use xpa_aws::s3::bucket::website::WebsiteClient;
use xpa_aws::s3::bucket::{BucketClient, BucketConnector, aspects};
use xpa_aws::s3::bucket_policy::BucketPolicyConnector;
use xpa_aws::s3::object::ObjectConnector;
use xpa_runtime::reference::{Reference, TargetKind};
use xpa_runtime::store::{REASON_CANNOT_RESOLVE, REASON_LATE_INITIALIZED, REASON_UPDATED};
use xpa_runtime::subresource::{AspectStatus, SubresourceClient};
use xpa_runtime::{
    ConditionReason, ConditionType, ExternalClient, ManagedExt, ReconcileError,
    Requeue, ResourceSpec,
};

fn bucket(name: &str, params: BucketParameters) -> Bucket {
    Bucket::new(
        name,
        BucketSpec {
            resource_spec: ResourceSpec::default(),
            for_provider: BucketParameters {
                location_constraint: "us-east-1".into(),
                ..params
            },
        },
    )
}

fn cors() -> CorsConfiguration {
    CorsConfiguration {
        cors_rules: vec![CorsRule {
            allowed_methods: vec!["GET".into()],
            allowed_origins: vec!["https://example.com".into()],
            max_age_seconds: Some(3000),
            ..Default::default()
        }],
    }
}

fn lifecycle(days: i64) -> BucketLifecycleConfiguration {
    BucketLifecycleConfiguration {
        rules: vec![LifecycleRule {
            id: Some("expire-logs".into()),
            status: "Enabled".into(),
            expiration: Some(LifecycleExpiration {
                days: Some(days),
                ..Default::default()
            }),
            ..Default::default()
        }],
    }
}

fn aes256() -> ServerSideEncryptionConfiguration {
    ServerSideEncryptionConfiguration {
        rules: vec![ServerSideEncryptionRule {
            apply_server_side_encryption_by_default: ServerSideEncryptionByDefault {
                sse_algorithm: "AES256".into(),
                kms_master_key_id: None,
            },
            bucket_key_enabled: None,
        }],
    }
}

fn website(suffix: &str) -> WebsiteConfiguration {
    WebsiteConfiguration {
        index_document: Some(IndexDocument {
            suffix: suffix.into(),
        }),
        ..Default::default()
    }
}

fn replication(role: Option<&str>) -> ReplicationConfiguration {
    ReplicationConfiguration {
        role: role.map(str::to_string),
        role_ref: None,
        role_selector: None,
        rules: vec![ReplicationRule {
            id: Some("all".into()),
            status: "Enabled".into(),
            destination: ReplicationDestination {
                bucket: "arn:aws:s3:::replica".into(),
                ..Default::default()
            },
            ..Default::default()
        }],
    }
}

async fn bucket_harness() -> Harness<Bucket> {
    Harness::new(BucketConnector::new).await
}

#[test_log::test(tokio::test)]
async fn lifecycle_drift_updates_only_that_aspect() {
    let h = bucket_harness().await;
    h.aws.s3.insert_bucket(
        "logs",
        FakeBucket {
            cors: Some(cors()),
            ..FakeBucket::new()
        },
    );
    let mut mg = bucket(
        "logs",
        BucketParameters {
            cors_configuration: Some(cors()),
            lifecycle_configuration: Some(lifecycle(30)),
            ..Default::default()
        },
    );

    h.tick(&mut mg).await.unwrap();
    assert_eq!(h.aws.s3.writes(), vec!["PutBucketLifecycleConfiguration"]);
    assert_eq!(
        h.aws.s3.bucket("logs").unwrap().lifecycle,
        Some(lifecycle(30))
    );
    let events = h.events().await;
    let update = events.iter().find(|e| e.reason == REASON_UPDATED).unwrap();
    assert_eq!(update.note.as_deref(), Some("lifecycle: NeedsUpdate"));
    assert_eq!(reason(&mg, ConditionType::Ready), Some(ConditionReason::Available));
    assert_eq!(
        mg.status.as_ref().map(|s| s.at_provider.arn.as_str()),
        Some("arn:aws:s3:::logs")
    );

    h.aws.s3.clear_calls();
    let requeue = h.tick(&mut mg).await.unwrap();
    assert!(matches!(requeue, Requeue::After(_)));
    assert!(h.aws.s3.writes().is_empty());
}

#[test_log::test(tokio::test)]
async fn new_bucket_gets_every_configured_aspect() {
    let h = bucket_harness().await;
    let mut mg = bucket(
        "assets",
        BucketParameters {
            cors_configuration: Some(cors()),
            tagging: Some(Tagging {
                tag_set: vec![Tag::new("team", "web"), Tag::new("team", "data")],
            }),
            versioning_configuration: Some(VersioningConfiguration {
                status: Some("Enabled".into()),
                mfa_delete: None,
            }),
            ..Default::default()
        },
    );

    h.tick(&mut mg).await.unwrap();
    assert_eq!(
        h.aws.s3.writes(),
        vec![
            "CreateBucket",
            "PutBucketCors",
            "PutBucketTagging",
            "PutBucketVersioning"
        ]
    );
    let stored = h.aws.s3.bucket("assets").unwrap();
    // Duplicate keys collapse, last one wins.
    assert_eq!(stored.tags, Some(vec![Tag::new("team", "data")]));

    h.aws.s3.clear_calls();
    h.tick(&mut mg).await.unwrap();
    assert!(h.aws.s3.writes().is_empty());
    assert!(h.event_reasons().await.contains(&REASON_LATE_INITIALIZED));
    // Requester pays was adopted from the bucket.
    assert_eq!(
        mg.spec
            .for_provider
            .payment_configuration
            .as_ref()
            .map(|p| p.payer.as_str()),
        Some("BucketOwner")
    );
}

#[test_log::test(tokio::test)]
async fn removed_aspects_are_deleted_from_the_bucket() {
    let h = bucket_harness().await;
    h.aws.s3.insert_bucket(
        "site",
        FakeBucket {
            cors: Some(cors()),
            website: Some(website("index.html")),
            versioning: VersioningConfiguration {
                status: Some("Enabled".into()),
                mfa_delete: None,
            },
            ..FakeBucket::new()
        },
    );
    let mut mg = bucket(
        "site",
        BucketParameters {
            website_configuration: Some(website("index.html")),
            ..Default::default()
        },
    );

    h.tick(&mut mg).await.unwrap();
    assert_eq!(
        h.aws.s3.writes(),
        vec!["DeleteBucketCors", "PutBucketVersioning"]
    );
    let stored = h.aws.s3.bucket("site").unwrap();
    assert_eq!(stored.cors, None);
    assert_eq!(stored.versioning.status.as_deref(), Some("Suspended"));
    assert_eq!(stored.website, Some(website("index.html")));
}

#[test_log::test(tokio::test)]
async fn observed_encryption_is_adopted_not_removed() {
    let h = bucket_harness().await;
    h.aws.s3.insert_bucket(
        "enc",
        FakeBucket {
            encryption: Some(aes256()),
            ..FakeBucket::new()
        },
    );
    let mut mg = bucket("enc", BucketParameters::default());

    h.tick(&mut mg).await.unwrap();
    assert!(h.aws.s3.writes().is_empty());
    assert_eq!(
        mg.spec.for_provider.server_side_encryption_configuration,
        Some(aes256())
    );
}

#[test_log::test(tokio::test)]
async fn invalid_aspect_fails_the_tick() {
    let h = bucket_harness().await;
    h.aws.s3.insert_bucket("repl", FakeBucket::new());
    let mut mg = bucket(
        "repl",
        BucketParameters {
            replication_configuration: Some(replication(None)),
            ..Default::default()
        },
    );

    let err = h.tick(&mut mg).await.unwrap_err();
    assert!(matches!(err, ReconcileError::Update(_)));
    assert!(err.is_terminal());
    assert_eq!(
        reason(&mg, ConditionType::Synced),
        Some(ConditionReason::ReconcileError)
    );
}

#[test_log::test(tokio::test)]
async fn bucket_delete() {
    let h = bucket_harness().await;
    let mut mg = bucket("tmp", BucketParameters::default());
    h.tick(&mut mg).await.unwrap();
    assert!(h.aws.s3.bucket("tmp").is_some());

    mark_deleted(&mut mg);
    h.tick(&mut mg).await.unwrap();
    assert!(h.aws.s3.bucket("tmp").is_none());
    assert_eq!(h.tick(&mut mg).await.unwrap(), Requeue::Never);
}

#[tokio::test]
async fn aspect_order_is_fixed() {
    let names = aspects(Arc::new(FakeS3::new())).names();
    assert_eq!(
        names,
        vec![
            "accelerate",
            "cors",
            "encryption",
            "lifecycle",
            "logging",
            "notification",
            "payment",
            "policy",
            "replication",
            "tagging",
            "versioning",
            "website"
        ]
    );
}

/// Observe one aspect of `mg` against a bucket prepared by `seed`.
async fn classify_with(
    client: impl FnOnce(Arc<FakeS3>) -> Box<dyn SubresourceClient<Bucket>>,
    seed: FakeBucket,
    params: BucketParameters,
) -> AspectStatus {
    let s3 = Arc::new(FakeS3::new());
    s3.insert_bucket("b", seed);
    client(s3).observe(&bucket("b", params)).await.unwrap()
}

#[tokio::test]
async fn cors_classification() {
    let new = |s3: Arc<FakeS3>| Box::new(CorsClient::new(s3)) as Box<dyn SubresourceClient<Bucket>>;
    let want = BucketParameters {
        cors_configuration: Some(cors()),
        ..Default::default()
    };
    let have = FakeBucket {
        cors: Some(cors()),
        ..FakeBucket::new()
    };

    assert_eq!(
        classify_with(new, FakeBucket::new(), want.clone()).await,
        AspectStatus::NeedsUpdate
    );
    assert_eq!(
        classify_with(new, have.clone(), BucketParameters::default()).await,
        AspectStatus::NeedsDeletion
    );
    assert_eq!(
        classify_with(new, have.clone(), want).await,
        AspectStatus::Updated
    );
    let mut other = cors();
    other.cors_rules[0].max_age_seconds = Some(60);
    let changed = BucketParameters {
        cors_configuration: Some(other),
        ..Default::default()
    };
    assert_eq!(
        classify_with(new, have, changed).await,
        AspectStatus::NeedsUpdate
    );
    let empty = BucketParameters {
        cors_configuration: Some(CorsConfiguration { cors_rules: vec![] }),
        ..Default::default()
    };
    assert_eq!(
        classify_with(new, FakeBucket::new(), empty).await,
        AspectStatus::Updated
    );
}

#[tokio::test]
async fn encryption_classification() {
    let new = |s3: Arc<FakeS3>| {
        Box::new(EncryptionClient::new(s3)) as Box<dyn SubresourceClient<Bucket>>
    };
    let want = BucketParameters {
        server_side_encryption_configuration: Some(aes256()),
        ..Default::default()
    };
    let have = FakeBucket {
        encryption: Some(aes256()),
        ..FakeBucket::new()
    };
    assert_eq!(
        classify_with(new, FakeBucket::new(), want.clone()).await,
        AspectStatus::NeedsUpdate
    );
    assert_eq!(classify_with(new, have.clone(), want).await, AspectStatus::Updated);
    assert_eq!(
        classify_with(new, have, BucketParameters::default()).await,
        AspectStatus::NeedsDeletion
    );
}

#[tokio::test]
async fn lifecycle_classification() {
    let new = |s3: Arc<FakeS3>| {
        Box::new(LifecycleClient::new(s3)) as Box<dyn SubresourceClient<Bucket>>
    };
    let have = FakeBucket {
        lifecycle: Some(lifecycle(30)),
        ..FakeBucket::new()
    };
    let want = |days| BucketParameters {
        lifecycle_configuration: Some(lifecycle(days)),
        ..Default::default()
    };
    assert_eq!(classify_with(new, have.clone(), want(30)).await, AspectStatus::Updated);
    assert_eq!(
        classify_with(new, have.clone(), want(60)).await,
        AspectStatus::NeedsUpdate
    );
    assert_eq!(
        classify_with(new, have, BucketParameters::default()).await,
        AspectStatus::NeedsDeletion
    );
}

#[tokio::test]
async fn website_classification() {
    let new = |s3: Arc<FakeS3>| {
        Box::new(WebsiteClient::new(s3)) as Box<dyn SubresourceClient<Bucket>>
    };
    let have = FakeBucket {
        website: Some(website("index.html")),
        ..FakeBucket::new()
    };
    let want = |suffix: &str| BucketParameters {
        website_configuration: Some(website(suffix)),
        ..Default::default()
    };
    assert_eq!(
        classify_with(new, have.clone(), want("index.html")).await,
        AspectStatus::Updated
    );
    assert_eq!(
        classify_with(new, have.clone(), want("home.html")).await,
        AspectStatus::NeedsUpdate
    );
    assert_eq!(
        classify_with(new, FakeBucket::new(), BucketParameters::default()).await,
        AspectStatus::Updated
    );
    assert_eq!(
        classify_with(new, have, BucketParameters::default()).await,
        AspectStatus::NeedsDeletion
    );
}

#[tokio::test]
async fn tagging_classification() {
    let new = |s3: Arc<FakeS3>| {
        Box::new(TaggingClient::new(s3)) as Box<dyn SubresourceClient<Bucket>>
    };
    let have = FakeBucket {
        tags: Some(vec![Tag::new("a", "1"), Tag::new("b", "2")]),
        ..FakeBucket::new()
    };
    let want = |tags: Vec<Tag>| BucketParameters {
        tagging: Some(Tagging { tag_set: tags }),
        ..Default::default()
    };
    // Order does not matter.
    assert_eq!(
        classify_with(
            new,
            have.clone(),
            want(vec![Tag::new("b", "2"), Tag::new("a", "1")])
        )
        .await,
        AspectStatus::Updated
    );
    assert_eq!(
        classify_with(new, have.clone(), want(vec![Tag::new("a", "1")])).await,
        AspectStatus::NeedsUpdate
    );
    assert_eq!(
        classify_with(new, have, want(vec![])).await,
        AspectStatus::NeedsDeletion
    );
    assert_eq!(
        classify_with(new, FakeBucket::new(), want(vec![])).await,
        AspectStatus::Updated
    );
}

#[tokio::test]
async fn replication_classification_ignores_references() {
    let new = |s3: Arc<FakeS3>| {
        Box::new(ReplicationClient::new(s3)) as Box<dyn SubresourceClient<Bucket>>
    };
    let role = "arn:aws:iam::123456789012:role/replicator";
    let have = FakeBucket {
        replication: Some(replication(Some(role))),
        ..FakeBucket::new()
    };
    let mut with_ref = replication(Some(role));
    with_ref.role_ref = Some(Reference::new("replicator"));
    let want = BucketParameters {
        replication_configuration: Some(with_ref),
        ..Default::default()
    };
    assert_eq!(classify_with(new, have.clone(), want).await, AspectStatus::Updated);
    assert_eq!(
        classify_with(
            new,
            have.clone(),
            BucketParameters {
                replication_configuration: Some(replication(Some("arn:aws:iam::1:role/other"))),
                ..Default::default()
            }
        )
        .await,
        AspectStatus::NeedsUpdate
    );
    assert_eq!(
        classify_with(new, have, BucketParameters::default()).await,
        AspectStatus::NeedsDeletion
    );
}

#[tokio::test]
async fn parent_is_up_to_date_only_when_every_aspect_is() {
    let s3 = Arc::new(FakeS3::new());
    s3.insert_bucket(
        "p",
        FakeBucket {
            cors: Some(cors()),
            ..FakeBucket::new()
        },
    );
    let client = BucketClient::new(s3.clone());

    let mut mg = bucket(
        "p",
        BucketParameters {
            cors_configuration: Some(cors()),
            ..Default::default()
        },
    );
    let obs = client.observe(&mut mg).await.unwrap();
    assert!(obs.resource_exists);
    assert!(obs.resource_up_to_date);

    let mut mg = bucket(
        "p",
        BucketParameters {
            cors_configuration: Some(cors()),
            website_configuration: Some(website("index.html")),
            ..Default::default()
        },
    );
    let obs = client.observe(&mut mg).await.unwrap();
    assert!(!obs.resource_up_to_date);
    assert_eq!(obs.diff, "website: NeedsUpdate");

    let obs = client.observe(&mut bucket("missing", BucketParameters::default())).await.unwrap();
    assert!(!obs.resource_exists);
}

const POLICY: &str = r#"{"Version":"2012-10-17","Statement":[{"Effect":"Allow","Principal":"*","Action":"s3:GetObject","Resource":"arn:aws:s3:::web/*"}]}"#;

fn bucket_policy(bucket: Option<&str>, policy: &str) -> BucketPolicy {
    BucketPolicy::new(
        "web-policy",
        BucketPolicySpec {
            resource_spec: ResourceSpec::default(),
            for_provider: BucketPolicyParameters {
                region: "us-east-1".into(),
                bucket_name: bucket.map(str::to_string),
                raw_policy: policy.into(),
                ..Default::default()
            },
        },
    )
}

#[test_log::test(tokio::test)]
async fn bucket_policy_is_compared_by_meaning() {
    let h: Harness<BucketPolicy> = Harness::new(BucketPolicyConnector::new).await;
    h.aws.s3.insert_bucket("web", FakeBucket::new());
    let mut mg = bucket_policy(Some("web"), POLICY);

    h.tick(&mut mg).await.unwrap();
    assert_eq!(h.aws.s3.bucket("web").unwrap().policy.as_deref(), Some(POLICY));

    // Same document, different formatting.
    let reformatted = serde_json::to_string_pretty(
        &serde_json::from_str::<serde_json::Value>(POLICY).unwrap(),
    )
    .unwrap();
    mg.spec.for_provider.raw_policy = reformatted;
    h.aws.s3.clear_calls();
    h.tick(&mut mg).await.unwrap();
    assert!(h.aws.s3.writes().is_empty());
    assert_eq!(reason(&mg, ConditionType::Ready), Some(ConditionReason::Available));

    mg.spec.for_provider.raw_policy = r#"{"Version":"2012-10-17","Statement":[]}"#.into();
    h.tick(&mut mg).await.unwrap();
    assert_eq!(h.aws.s3.writes(), vec!["PutBucketPolicy"]);

    mark_deleted(&mut mg);
    h.tick(&mut mg).await.unwrap();
    assert_eq!(h.aws.s3.bucket("web").unwrap().policy, None);
}

#[test_log::test(tokio::test)]
async fn bucket_policy_without_bucket_is_terminal() {
    let h: Harness<BucketPolicy> = Harness::new(BucketPolicyConnector::new).await;
    let mut mg = bucket_policy(None, POLICY);
    let err = h.tick(&mut mg).await.unwrap_err();
    assert!(err.is_terminal());
}

fn object(name: &str, params: ObjectParameters) -> Object {
    Object::new(
        name,
        ObjectSpec {
            resource_spec: ResourceSpec::default(),
            for_provider: ObjectParameters {
                region: "us-east-1".into(),
                ..params
            },
        },
    )
}

#[test_log::test(tokio::test)]
async fn object_upload_and_drift() {
    let h: Harness<Object> = Harness::new(ObjectConnector::new).await;
    h.aws.s3.insert_bucket("web", FakeBucket::new());
    let mut mg = object(
        "index.html",
        ObjectParameters {
            bucket: Some("web".into()),
            body: "<h1>hi</h1>".into(),
            content_type: Some("text/html".into()),
            metadata: BTreeMap::from([("owner".to_string(), "web".to_string())]),
            ..Default::default()
        },
    );

    h.tick(&mut mg).await.unwrap();
    let stored = h.aws.s3.bucket("web").unwrap().objects["index.html"].clone();
    assert_eq!(stored.body, b"<h1>hi</h1>".to_vec());
    assert_eq!(stored.content_type.as_deref(), Some("text/html"));

    h.aws.s3.clear_calls();
    h.tick(&mut mg).await.unwrap();
    assert!(h.aws.s3.writes().is_empty());
    assert_eq!(
        mg.status.as_ref().and_then(|s| s.at_provider.version_id.as_deref()),
        Some("v1")
    );

    mg.spec.for_provider.body = "<h1>bye</h1>".into();
    h.tick(&mut mg).await.unwrap();
    assert_eq!(h.aws.s3.writes(), vec!["PutObject"]);
    let events = h.events().await;
    let note = events.last().and_then(|e| e.note.clone()).unwrap_or_default();
    assert_eq!(note, "body: changed");

    mark_deleted(&mut mg);
    h.tick(&mut mg).await.unwrap();
    assert!(h.aws.s3.bucket("web").unwrap().objects.is_empty());
}

#[test_log::test(tokio::test)]
async fn object_waits_for_referenced_bucket() {
    let h: Harness<Object> = Harness::new(ObjectConnector::new).await;
    let mut mg = object(
        "data.json",
        ObjectParameters {
            bucket_ref: Some(Reference::new("data-bucket")),
            body: "{}".into(),
            ..Default::default()
        },
    );
    let mut target = json!({
        "apiVersion": "s3.aws.xpa.io/v1beta1",
        "kind": "Bucket",
        "metadata": {
            "name": "data-bucket",
            "annotations": {"xpa.io/external-name": "data-bucket-1234"}
        },
        "spec": {"forProvider": {"locationConstraint": "us-east-1"}}
    });
    h.reader.insert(&TargetKind::of::<Bucket>(), target.clone()).await;

    let err = h.tick(&mut mg).await.unwrap_err();
    assert!(matches!(err, ReconcileError::Resolve(_)));
    assert_eq!(h.event_reasons().await.last(), Some(&REASON_CANNOT_RESOLVE));
    assert!(h.aws.s3.calls().is_empty());

    target["status"] = json!({"conditions": [{"type": "Ready", "status": "True"}]});
    h.reader.insert(&TargetKind::of::<Bucket>(), target).await;
    h.aws.s3.insert_bucket("data-bucket-1234", FakeBucket::new());

    h.tick(&mut mg).await.unwrap();
    assert_eq!(mg.spec.for_provider.bucket.as_deref(), Some("data-bucket-1234"));
    assert!(
        h.aws.s3.bucket("data-bucket-1234").unwrap().objects.contains_key("data.json")
    );
}

#[test_log::test(tokio::test)]
async fn object_with_unresolved_bucket_can_be_deleted() {
    let h: Harness<Object> = Harness::new(ObjectConnector::new).await;
    let mut mg = object(
        "orphan.txt",
        ObjectParameters {
            bucket_ref: Some(Reference::new("never-created")),
            body: "x".into(),
            ..Default::default()
        },
    );

    let err = h.tick(&mut mg).await.unwrap_err();
    assert!(matches!(err, ReconcileError::Resolve(_)));
    assert!(mg.has_finalizer());

    mark_deleted(&mut mg);
    assert_eq!(h.tick(&mut mg).await.unwrap(), Requeue::Never);
    assert!(!mg.has_finalizer());
    assert!(h.aws.s3.calls().is_empty());
}

#[test_log::test(tokio::test)]
async fn bucket_policy_with_unresolved_bucket_can_be_deleted() {
    let h: Harness<BucketPolicy> = Harness::new(BucketPolicyConnector::new).await;
    let mut mg = bucket_policy(None, POLICY);
    mg.spec.for_provider.bucket_name_ref = Some(Reference::new("never-created"));

    assert!(h.tick(&mut mg).await.is_err());
    assert!(mg.has_finalizer());

    mark_deleted(&mut mg);
    assert_eq!(h.tick(&mut mg).await.unwrap(), Requeue::Never);
    assert!(!mg.has_finalizer());
    assert!(h.aws.s3.calls().is_empty());
}

#[test_log::test(tokio::test)]
async fn each_aspect_is_read_once_per_tick() {
    let h = bucket_harness().await;
    h.aws.s3.insert_bucket(
        "reads",
        FakeBucket {
            encryption: Some(aes256()),
            ..FakeBucket::new()
        },
    );
    let mut mg = bucket("reads", BucketParameters::default());
    h.tick(&mut mg).await.unwrap();

    h.aws.s3.clear_calls();
    h.tick(&mut mg).await.unwrap();
    let calls = h.aws.s3.calls();
    for verb in [
        "GetBucketEncryption",
        "GetBucketRequestPayment",
        "GetBucketNotificationConfiguration",
        "GetBucketCors",
    ] {
        assert_eq!(calls.iter().filter(|c| *c == verb).count(), 1, "{verb}");
    }
}
