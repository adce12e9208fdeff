//! In-memory host seams for tests and local runs.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::ObjectReference;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::error::StoreError;
use crate::external::ConnectionDetails;
use crate::reference::TargetKind;
use crate::resource::Managed;
use crate::store::{
    Event, EventRecorder, ManagedStore, ReferenceReader, ReferencedObject,
    SecretStore, StoreResult,
};

type MemoryMap<K, T> = Arc<RwLock<HashMap<K, T>>>;

/// Keeps the last written copy of each managed resource by name and counts
/// writes.
#[derive(Clone)]
pub struct MemoryManagedStore<R> {
    objects: MemoryMap<String, R>,
    status_writes: Arc<RwLock<usize>>,
    spec_writes: Arc<RwLock<usize>>,
}

impl<R: Managed> MemoryManagedStore<R> {
    pub fn new() -> Self {
        Self {
            objects: Arc::new(RwLock::new(HashMap::new())),
            status_writes: Arc::new(RwLock::new(0)),
            spec_writes: Arc::new(RwLock::new(0)),
        }
    }

    pub async fn get(&self, name: &str) -> Option<R> {
        self.objects.read().await.get(name).cloned()
    }

    pub async fn spec_writes(&self) -> usize {
        *self.spec_writes.read().await
    }

    pub async fn status_writes(&self) -> usize {
        *self.status_writes.read().await
    }
}

impl<R: Managed> Default for MemoryManagedStore<R> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<R: Managed> ManagedStore<R> for MemoryManagedStore<R> {
    async fn update(&self, obj: &mut R) -> StoreResult<()> {
        let name = obj.meta().name.clone().unwrap_or_default();
        let mut objects = self.objects.write().await;
        let next = obj
            .meta()
            .resource_version
            .as_deref()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(0)
            + 1;
        if let Some(stored) = objects.get(&name) {
            if stored.meta().resource_version != obj.meta().resource_version {
                return Err(StoreError::Conflict(name));
            }
        }
        obj.meta_mut().resource_version = Some(next.to_string());
        objects.insert(name, obj.clone());
        *self.spec_writes.write().await += 1;
        Ok(())
    }

    async fn update_status(&self, obj: &R) -> StoreResult<()> {
        let name = obj.meta().name.clone().unwrap_or_default();
        let mut objects = self.objects.write().await;
        match objects.get_mut(&name) {
            Some(stored) => {
                *stored.resource_status_mut() =
                    obj.resource_status().cloned().unwrap_or_default();
            }
            None => {
                objects.insert(name, obj.clone());
            }
        }
        *self.status_writes.write().await += 1;
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct MemorySecretStore {
    secrets: MemoryMap<(String, String), ConnectionDetails>,
}

impl MemorySecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(
        &self,
        namespace: &str,
        name: &str,
        details: ConnectionDetails,
    ) {
        self.secrets
            .write()
            .await
            .insert((namespace.to_string(), name.to_string()), details);
    }
}

#[async_trait]
impl SecretStore for MemorySecretStore {
    async fn get(
        &self,
        namespace: &str,
        name: &str,
    ) -> StoreResult<Option<ConnectionDetails>> {
        let secrets = self.secrets.read().await;
        Ok(secrets
            .get(&(namespace.to_string(), name.to_string()))
            .cloned())
    }

    async fn apply(
        &self,
        namespace: &str,
        name: &str,
        details: &ConnectionDetails,
    ) -> StoreResult<()> {
        let mut secrets = self.secrets.write().await;
        secrets
            .entry((namespace.to_string(), name.to_string()))
            .or_default()
            .extend(details.iter().map(|(k, v)| (k.clone(), v.clone())));
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct MemoryEventRecorder {
    events: Arc<RwLock<Vec<(ObjectReference, Event)>>>,
}

impl MemoryEventRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn events(&self) -> Vec<Event> {
        self.events
            .read()
            .await
            .iter()
            .map(|(_, e)| e.clone())
            .collect()
    }
}

#[async_trait]
impl EventRecorder for MemoryEventRecorder {
    async fn record(&self, obj: &ObjectReference, event: Event) {
        self.events.write().await.push((obj.clone(), event));
    }
}

#[derive(Clone, Default)]
pub struct MemoryReferenceReader {
    objects: MemoryMap<TargetKind, Vec<ReferencedObject>>,
}

impl MemoryReferenceReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace (by name) a serialized object of `target` kind.
    pub async fn insert(&self, target: &TargetKind, object: Value) {
        let projected = ReferencedObject::from_value(object);
        let mut objects = self.objects.write().await;
        let list = objects.entry(target.clone()).or_default();
        list.retain(|o| o.name != projected.name);
        list.push(projected);
    }
}

#[async_trait]
impl ReferenceReader for MemoryReferenceReader {
    async fn get(
        &self,
        target: &TargetKind,
        name: &str,
    ) -> StoreResult<Option<ReferencedObject>> {
        let objects = self.objects.read().await;
        Ok(objects
            .get(target)
            .and_then(|list| list.iter().find(|o| o.name == name))
            .cloned())
    }

    async fn list(&self, target: &TargetKind) -> StoreResult<Vec<ReferencedObject>> {
        let objects = self.objects.read().await;
        Ok(objects.get(target).cloned().unwrap_or_default())
    }
}
