//! Kubernetes-backed implementations of the host seams.

use std::collections::BTreeMap;

use async_trait::async_trait;
use k8s_openapi::ByteString;
use k8s_openapi::api::core::v1::{ObjectReference, Secret};
use kube::api::{
    Api, ApiResource, DynamicObject, GroupVersionKind, ListParams, ObjectMeta, Patch,
    PatchParams, PostParams,
};
use kube::runtime::events::{Event as KubeEvent, EventType, Recorder, Reporter};
use kube::{Client, Resource, ResourceExt};
use serde_json::json;
use tracing::warn;
use xpa_runtime::reference::TargetKind;
use xpa_runtime::store::{
    Event, EventKind, EventRecorder, ManagedStore, ReferenceReader, ReferencedObject,
    SecretStore, StoreResult,
};
use xpa_runtime::{ConnectionDetails, Managed, StoreError};

fn store_error(e: kube::Error) -> StoreError {
    match &e {
        kube::Error::Api(resp) if resp.code == 409 => StoreError::Conflict(resp.message.clone()),
        kube::Error::Api(resp) if resp.code == 404 => StoreError::NotFound(resp.message.clone()),
        _ => StoreError::Backend(e.to_string()),
    }
}

/// Writes managed resources of one kind.
pub struct KubeStore<K> {
    api: Api<K>,
}

impl<K: Managed> KubeStore<K> {
    pub fn new(client: Client) -> Self {
        Self {
            api: Api::all(client),
        }
    }
}

#[async_trait]
impl<K: Managed> ManagedStore<K> for KubeStore<K> {
    /// Replace carries the resource version, so a concurrent edit fails with
    /// a conflict instead of being overwritten.
    async fn update(&self, obj: &mut K) -> StoreResult<()> {
        let stored = self
            .api
            .replace(&obj.name_any(), &PostParams::default(), obj)
            .await
            .map_err(store_error)?;
        obj.meta_mut().resource_version = stored.meta().resource_version.clone();
        Ok(())
    }

    async fn update_status(&self, obj: &K) -> StoreResult<()> {
        let value = serde_json::to_value(obj)?;
        let patch = json!({ "status": value.get("status").cloned().unwrap_or_default() });
        self.api
            .patch_status(&obj.name_any(), &PatchParams::default(), &Patch::Merge(&patch))
            .await
            .map_err(store_error)?;
        Ok(())
    }
}

/// Connection secrets, written with server-side apply so keys published by
/// earlier ticks are kept.
pub struct KubeSecretStore {
    client: Client,
    field_manager: String,
}

impl KubeSecretStore {
    pub fn new(client: Client, field_manager: impl Into<String>) -> Self {
        Self {
            client,
            field_manager: field_manager.into(),
        }
    }
}

#[async_trait]
impl SecretStore for KubeSecretStore {
    async fn get(
        &self,
        namespace: &str,
        name: &str,
    ) -> StoreResult<Option<ConnectionDetails>> {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        let secret = api.get_opt(name).await.map_err(store_error)?;
        Ok(secret.map(|s| {
            s.data
                .unwrap_or_default()
                .into_iter()
                .map(|(k, v)| (k, v.0))
                .collect()
        }))
    }

    async fn apply(
        &self,
        namespace: &str,
        name: &str,
        details: &ConnectionDetails,
    ) -> StoreResult<()> {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        let data: BTreeMap<String, ByteString> = details
            .iter()
            .map(|(k, v)| (k.clone(), ByteString(v.clone())))
            .collect();
        let secret = Secret {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some(namespace.to_string()),
                ..Default::default()
            },
            data: Some(data),
            ..Default::default()
        };
        let mut value = serde_json::to_value(&secret)?;
        value["apiVersion"] = json!("v1");
        value["kind"] = json!("Secret");
        api.patch(
            name,
            &PatchParams::apply(&self.field_manager).force(),
            &Patch::Apply(&value),
        )
        .await
        .map_err(store_error)?;
        Ok(())
    }
}

/// Read-only view of any cluster-scoped kind a reference may point at.
pub struct KubeReferenceReader {
    client: Client,
}

impl KubeReferenceReader {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api(&self, target: &TargetKind) -> Api<DynamicObject> {
        let (group, version) = target.group_version();
        let gvk = GroupVersionKind::gvk(group, version, &target.kind);
        let resource = ApiResource::from_gvk_with_plural(&gvk, &target.plural);
        Api::all_with(self.client.clone(), &resource)
    }
}

fn project(obj: DynamicObject) -> StoreResult<ReferencedObject> {
    Ok(ReferencedObject::from_value(serde_json::to_value(obj)?))
}

#[async_trait]
impl ReferenceReader for KubeReferenceReader {
    async fn get(
        &self,
        target: &TargetKind,
        name: &str,
    ) -> StoreResult<Option<ReferencedObject>> {
        self.api(target)
            .get_opt(name)
            .await
            .map_err(store_error)?
            .map(project)
            .transpose()
    }

    async fn list(&self, target: &TargetKind) -> StoreResult<Vec<ReferencedObject>> {
        self.api(target)
            .list(&ListParams::default())
            .await
            .map_err(store_error)?
            .items
            .into_iter()
            .map(project)
            .collect()
    }
}

pub struct KubeEventRecorder {
    recorder: Recorder,
}

impl KubeEventRecorder {
    pub fn new(client: Client, controller: impl Into<String>) -> Self {
        let reporter = Reporter {
            controller: controller.into(),
            instance: std::env::var("POD_NAME").ok(),
        };
        Self {
            recorder: Recorder::new(client, reporter),
        }
    }
}

#[async_trait]
impl EventRecorder for KubeEventRecorder {
    async fn record(&self, obj: &ObjectReference, event: Event) {
        let ev = KubeEvent {
            type_: match event.kind {
                EventKind::Normal => EventType::Normal,
                EventKind::Warning => EventType::Warning,
            },
            reason: event.reason.into(),
            note: event.note,
            action: event.action.into(),
            secondary: None,
        };
        if let Err(e) = self.recorder.publish(&ev, obj).await {
            warn!(error = %e, reason = event.reason, "cannot publish event");
        }
    }
}
