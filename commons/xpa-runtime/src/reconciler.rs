use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::conditions;
use crate::error::{ReconcileError, StoreError};
use crate::external::{ConnectionDetails, ExternalConnector};
use crate::reference::{ApiResolver, ResolveReferences};
use crate::resource::{DeletionPolicy, ManagedExt, ManagementAction};
use crate::store::{
    Event, EventRecorder, ManagedStore, REASON_CANNOT_RESOLVE, REASON_CREATED,
    REASON_DELETED, REASON_LATE_INITIALIZED, REASON_RECONCILE_ERROR,
    REASON_UPDATE_BEFORE_DELETE, REASON_UPDATED, ReferenceReader, SecretStore,
};

/// What the host should do with the key after a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requeue {
    After(Duration),
    Never,
}

#[derive(Debug, Clone)]
pub struct ReconcilerOptions {
    /// Requeue interval once the external resource has converged.
    pub poll_interval: Duration,
    /// Requeue interval after a create or delete was issued.
    pub short_wait: Duration,
    /// Upper bound for each external call.
    pub call_timeout: Duration,
}

impl Default for ReconcilerOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(60),
            short_wait: Duration::from_secs(30),
            call_timeout: Duration::from_secs(60),
        }
    }
}

/// Drives one managed resource kind from observation to convergence.
pub struct Reconciler<R> {
    connector: Arc<dyn ExternalConnector<R>>,
    store: Arc<dyn ManagedStore<R>>,
    secrets: Arc<dyn SecretStore>,
    references: Arc<dyn ReferenceReader>,
    recorder: Arc<dyn EventRecorder>,
    options: ReconcilerOptions,
}

/// Object without its status, used to detect spec and metadata changes.
fn desired_snapshot<R: serde::Serialize>(mg: &R) -> Result<Value, StoreError> {
    let mut v = serde_json::to_value(mg)?;
    if let Some(obj) = v.as_object_mut() {
        obj.remove("status");
    }
    Ok(v)
}

impl<R: ResolveReferences> Reconciler<R> {
    pub fn new(
        connector: Arc<dyn ExternalConnector<R>>,
        store: Arc<dyn ManagedStore<R>>,
        secrets: Arc<dyn SecretStore>,
        references: Arc<dyn ReferenceReader>,
        recorder: Arc<dyn EventRecorder>,
    ) -> Self {
        Self {
            connector,
            store,
            secrets,
            references,
            recorder,
            options: ReconcilerOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ReconcilerOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &ReconcilerOptions {
        &self.options
    }

    /// Run one tick. On failure Synced is set to False, the status is
    /// written and the error is returned for the host to back off.
    #[instrument(skip_all, fields(kind = %R::kind(&()), name = %mg.name_or_default()))]
    pub async fn reconcile(
        &self,
        mg: &mut R,
        cancel: &CancellationToken,
    ) -> Result<Requeue, ReconcileError> {
        match self.tick(mg, cancel).await {
            Ok(requeue) => Ok(requeue),
            Err(e) => {
                warn!(error = %e, "reconcile failed");
                mg.set_conditions([conditions::reconcile_error(&e)]);
                if let Err(se) = self.store.update_status(mg).await {
                    warn!(error = %se, "cannot record reconcile error in status");
                }
                let reason = match &e {
                    ReconcileError::Resolve(_) => REASON_CANNOT_RESOLVE,
                    _ => REASON_RECONCILE_ERROR,
                };
                self.record(mg, Event::warning(reason, "Reconcile").with_note(e.to_string()))
                    .await;
                Err(e)
            }
        }
    }

    async fn tick(
        &self,
        mg: &mut R,
        cancel: &CancellationToken,
    ) -> Result<Requeue, ReconcileError> {
        if mg.is_deleting()
            && (mg.resource_spec().deletion_policy == DeletionPolicy::Orphan
                || !mg.allows(ManagementAction::Delete))
        {
            if mg.remove_finalizer() {
                self.store.update(mg).await?;
            }
            info!("leaving external resource in place; finalizer removed");
            return Ok(Requeue::Never);
        }

        if !mg.is_deleting() {
            let stamped = mg.initialize_external_name();
            let finalized = mg.add_finalizer();
            if stamped || finalized {
                self.store.update(mg).await?;
            }

            let before = desired_snapshot(mg)?;
            let resolver = ApiResolver::for_resource(self.references.clone(), mg);
            mg.resolve_references(&resolver).await?;
            if desired_snapshot(mg)? != before {
                debug!("persisting resolved references");
                self.store.update(mg).await?;
            }
        }

        let client = self
            .call("connect", cancel, self.connector.connect(mg))
            .await?
            .map_err(ReconcileError::Connect)?;

        let observation = self
            .call("observe", cancel, client.observe(mg))
            .await?
            .map_err(ReconcileError::Observe)?;

        if mg.is_deleting() {
            if !observation.resource_exists {
                mg.remove_finalizer();
                self.store.update(mg).await?;
                info!("external resource is gone; finalizer removed");
                return Ok(Requeue::Never);
            }
            if client.update_before_delete(mg) && mg.allows(ManagementAction::Update) {
                match self.call("update", cancel, client.update(mg)).await? {
                    Ok(_) => debug!("updated external resource before delete"),
                    Err(e) => {
                        warn!(error = %e, "update before delete failed; deleting anyway");
                        self.record(
                            mg,
                            Event::warning(REASON_UPDATE_BEFORE_DELETE, "Update")
                                .with_note(e.to_string()),
                        )
                        .await;
                    }
                }
            }
            self.call("delete", cancel, client.delete(mg))
                .await?
                .map_err(ReconcileError::Delete)?;
            mg.set_conditions([conditions::deleting(), conditions::reconcile_success()]);
            self.store.update_status(mg).await?;
            self.record(mg, Event::normal(REASON_DELETED, "Delete")).await;
            info!("delete requested for external resource");
            return Ok(Requeue::After(self.options.short_wait));
        }

        self.publish(mg, &observation.connection_details).await?;

        if !observation.resource_exists {
            if !mg.allows(ManagementAction::Create) {
                debug!("external resource absent and creation not permitted");
                mg.set_conditions([
                    conditions::unavailable(),
                    conditions::reconcile_success(),
                ]);
                self.store.update_status(mg).await?;
                return Ok(Requeue::After(self.options.poll_interval));
            }
            let before = desired_snapshot(mg)?;
            let creation = self
                .call("create", cancel, client.create(mg))
                .await?
                .map_err(ReconcileError::Create)?;
            if desired_snapshot(mg)? != before {
                self.store.update(mg).await?;
            }
            self.publish(mg, &creation.connection_details).await?;
            mg.set_conditions([conditions::creating(), conditions::reconcile_success()]);
            self.store.update_status(mg).await?;
            self.record(mg, Event::normal(REASON_CREATED, "Create")).await;
            info!("external resource created");
            return Ok(Requeue::After(self.options.short_wait));
        }

        if observation.resource_late_initialized
            && mg.allows(ManagementAction::LateInitialize)
        {
            self.store
                .update(mg)
                .await
                .map_err(ReconcileError::LateInit)?;
            self.record(mg, Event::normal(REASON_LATE_INITIALIZED, "LateInitialize"))
                .await;
            debug!("persisted late-initialized spec");
        }

        if observation.resource_up_to_date || !mg.allows(ManagementAction::Update) {
            if !observation.resource_up_to_date {
                debug!(diff = %observation.diff, "drift observed; updates not permitted");
            }
            mg.set_conditions([conditions::reconcile_success()]);
            self.store.update_status(mg).await?;
            return Ok(Requeue::After(self.options.poll_interval));
        }

        let update = self
            .call("update", cancel, client.update(mg))
            .await?
            .map_err(ReconcileError::Update)?;
        self.publish(mg, &update.connection_details).await?;
        mg.set_conditions([conditions::reconcile_success()]);
        self.store.update_status(mg).await?;
        let mut event = Event::normal(REASON_UPDATED, "Update");
        if !observation.diff.is_empty() {
            event = event.with_note(observation.diff.clone());
        }
        self.record(mg, event).await;
        info!("external resource updated");
        Ok(Requeue::After(self.options.poll_interval))
    }

    /// Race an external call against cancellation and the call timeout.
    async fn call<T>(
        &self,
        op: &'static str,
        cancel: &CancellationToken,
        fut: impl Future<Output = T>,
    ) -> Result<T, ReconcileError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ReconcileError::Cancelled(op)),
            res = tokio::time::timeout(self.options.call_timeout, fut) => {
                res.map_err(|_| ReconcileError::TimedOut(op))
            }
        }
    }

    async fn publish(
        &self,
        mg: &R,
        details: &ConnectionDetails,
    ) -> Result<(), ReconcileError> {
        let Some(target) = mg.resource_spec().write_connection_secret_to_ref.as_ref()
        else {
            return Ok(());
        };
        if details.is_empty() {
            return Ok(());
        }
        self.secrets
            .apply(&target.namespace, &target.name, details)
            .await
            .map_err(ReconcileError::Publish)
    }

    async fn record(&self, mg: &R, event: Event) {
        self.recorder.record(&mg.object_ref(&()), event).await;
    }
}
