use std::sync::Arc;

use futures_util::future::try_join_all;
use kube::{Api, Client, Resource};
use tokio::task::JoinHandle;
use tracing::info;
use xpa_runtime::store::{EventRecorder, ReferenceReader, SecretStore};
use xpa_runtime::{ExternalConnector, Reconciler, ResolveReferences};

use crate::clients::AwsClientFactory;
use crate::config::ProviderConfigEnv;
use crate::controller::connector::AwsConnector;
use crate::controller::kube_store::{
    KubeEventRecorder, KubeReferenceReader, KubeSecretStore, KubeStore,
};
use crate::controller::{ControllerContext, run_kind};
use crate::crd::bucket::Bucket;
use crate::crd::bucket_policy::BucketPolicy;
use crate::crd::db_instance::RDSInstance;
use crate::crd::db_subnet_group::DBSubnetGroup;
use crate::crd::object::Object;
use crate::rds::instance::RdsInstanceConnector;
use crate::rds::subnet_group::DbSubnetGroupConnector;
use crate::s3::bucket::BucketConnector;
use crate::s3::bucket_policy::BucketPolicyConnector;
use crate::s3::object::ObjectConnector;

/// Shared host services every kind's reconciler is built from.
#[derive(Clone)]
struct Host {
    client: Client,
    cfg: ProviderConfigEnv,
    secrets: Arc<dyn SecretStore>,
    references: Arc<dyn ReferenceReader>,
    recorder: Arc<dyn EventRecorder>,
}

impl Host {
    fn spawn<K>(&self, connector: Arc<dyn ExternalConnector<K>>) -> JoinHandle<anyhow::Result<()>>
    where
        K: ResolveReferences,
    {
        let reconciler = Reconciler::new(
            connector,
            Arc::new(KubeStore::<K>::new(self.client.clone())),
            self.secrets.clone(),
            self.references.clone(),
            self.recorder.clone(),
        )
        .with_options(self.cfg.reconciler_options());
        let ctx = Arc::new(ControllerContext::new(reconciler, self.cfg.backoff.clone()));
        let api: Api<K> = Api::all(self.client.clone());
        let concurrency = self.cfg.max_reconcile_rate;
        info!(kind = %K::kind(&()), "starting controller");
        tokio::spawn(async move { run_kind(api, ctx, concurrency).await })
    }
}

/// Start a controller for every enabled kind and wait until one of them
/// stops.
pub async fn run_all(
    client: Client,
    cfg: ProviderConfigEnv,
    factory: Arc<dyn AwsClientFactory>,
) -> anyhow::Result<()> {
    let cfg = cfg.apply_defaults();
    let host = Host {
        secrets: Arc::new(KubeSecretStore::new(client.clone(), cfg.controller_name.clone())),
        references: Arc::new(KubeReferenceReader::new(client.clone())),
        recorder: Arc::new(KubeEventRecorder::new(client.clone(), cfg.controller_name.clone())),
        client,
        cfg,
    };
    let aws = AwsConnector::new(factory, host.references.clone(), host.secrets.clone());

    let mut tasks = Vec::new();
    if host.cfg.features.rds.unwrap_or(true) {
        tasks.push(host.spawn::<RDSInstance>(Arc::new(RdsInstanceConnector::new(aws.clone()))));
        tasks.push(host.spawn::<DBSubnetGroup>(Arc::new(DbSubnetGroupConnector::new(aws.clone()))));
    }
    if host.cfg.features.s3.unwrap_or(true) {
        tasks.push(host.spawn::<Bucket>(Arc::new(BucketConnector::new(aws.clone()))));
        tasks.push(host.spawn::<BucketPolicy>(Arc::new(BucketPolicyConnector::new(aws.clone()))));
        tasks.push(host.spawn::<Object>(Arc::new(ObjectConnector::new(aws))));
    }
    if tasks.is_empty() {
        anyhow::bail!("no controllers enabled; set XPA_FEATURES_RDS or XPA_FEATURES_S3");
    }

    for res in try_join_all(tasks).await? {
        res?;
    }
    Ok(())
}
