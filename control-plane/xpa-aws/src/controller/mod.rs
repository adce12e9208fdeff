//! Host wiring: one `kube::runtime::Controller` per managed kind, each
//! delegating a tick to the generic [`Reconciler`].

pub mod connector;
pub mod kube_store;

use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::StreamExt;
use kube::{
    Api, ResourceExt,
    runtime::{
        Controller,
        controller::{Action, Config as ControllerConfig},
        watcher::Config,
    },
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use xpa_runtime::{ReconcileError, Reconciler, Requeue, ResolveReferences};

use crate::config::BackoffConfig;

#[derive(thiserror::Error, Debug)]
pub enum ControllerError {
    #[error("reconcile {name} failed: {source}")]
    Reconcile {
        name: String,
        #[source]
        source: ReconcileError,
    },
}

impl ControllerError {
    fn is_terminal(&self) -> bool {
        match self {
            ControllerError::Reconcile { source, .. } => source.is_terminal(),
        }
    }
}

/// Consecutive failures per object, reset on the first success.
#[derive(Debug, Default)]
pub struct FailureTracker {
    failures: Mutex<HashMap<String, u32>>,
}

impl FailureTracker {
    /// Failures for `key`, counting this one.
    pub fn record(&self, key: &str) -> u32 {
        let mut failures = self.failures.lock().unwrap_or_else(|e| e.into_inner());
        let n = failures.entry(key.to_string()).or_insert(0);
        *n = n.saturating_add(1);
        *n
    }

    pub fn reset(&self, key: &str) {
        self.failures
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(key);
    }
}

pub struct ControllerContext<K> {
    reconciler: Reconciler<K>,
    backoff: BackoffConfig,
    failures: FailureTracker,
}

impl<K> ControllerContext<K> {
    pub fn new(reconciler: Reconciler<K>, backoff: BackoffConfig) -> Self {
        Self {
            reconciler,
            backoff,
            failures: FailureTracker::default(),
        }
    }

    /// Requeue delay after a failed tick. The first retry waits the base
    /// delay.
    fn backoff_for(&self, key: &str) -> Duration {
        self.backoff.delay(self.failures.record(key) - 1)
    }
}

/// Watch every object of kind `K` and reconcile it until the stream ends.
pub async fn run_kind<K>(
    api: Api<K>,
    ctx: Arc<ControllerContext<K>>,
    concurrency: u16,
) -> anyhow::Result<()>
where
    K: ResolveReferences + Debug,
{
    Controller::new(api, Config::default())
        .with_config(ControllerConfig::default().concurrency(concurrency))
        .run(reconcile::<K>, error_policy::<K>, ctx)
        .for_each(|res| async move {
            match res {
                Ok((obj_ref, action)) => {
                    debug!(name = %obj_ref.name, ?action, "reconciled")
                }
                Err(e) => warn!(error = %e, "reconcile failed"),
            }
        })
        .await;
    Ok(())
}

async fn reconcile<K>(
    obj: Arc<K>,
    ctx: Arc<ControllerContext<K>>,
) -> Result<Action, ControllerError>
where
    K: ResolveReferences,
{
    let mut mg = (*obj).clone();
    let name = mg.name_any();
    let cancel = CancellationToken::new();
    match ctx.reconciler.reconcile(&mut mg, &cancel).await {
        Ok(requeue) => {
            ctx.failures.reset(&name);
            Ok(match requeue {
                Requeue::After(d) => Action::requeue(d),
                Requeue::Never => Action::await_change(),
            })
        }
        Err(source) => Err(ControllerError::Reconcile { name, source }),
    }
}

fn error_policy<K>(
    obj: Arc<K>,
    err: &ControllerError,
    ctx: Arc<ControllerContext<K>>,
) -> Action
where
    K: ResolveReferences,
{
    // Retrying cannot fix these; wait for the user to change the object.
    if err.is_terminal() {
        return Action::await_change();
    }
    Action::requeue(ctx.backoff_for(&obj.name_any()))
}
