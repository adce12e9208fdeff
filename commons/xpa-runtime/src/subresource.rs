//! Fan-out of a composite parent over independently reconciled aspects.

use std::future::Future;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, trace};

use crate::error::ExternalError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AspectStatus {
    /// Observed matches desired, or both are absent.
    Updated,
    /// Desired differs from observed, or only desired is present.
    NeedsUpdate,
    /// Only observed is present.
    NeedsDeletion,
}

/// Three-state classification of an aspect. `None` on either side means the
/// aspect is absent there.
pub fn classify<T: PartialEq>(
    desired: Option<&T>,
    observed: Option<&T>,
) -> AspectStatus {
    match (desired, observed) {
        (None, None) => AspectStatus::Updated,
        (None, Some(_)) => AspectStatus::NeedsDeletion,
        (Some(_), None) => AspectStatus::NeedsUpdate,
        (Some(d), Some(o)) if d == o => AspectStatus::Updated,
        (Some(_), Some(_)) => AspectStatus::NeedsUpdate,
    }
}

/// One aspect of a parent resource, sharing the parent's identifier.
#[async_trait]
pub trait SubresourceClient<P>: Send + Sync {
    fn name(&self) -> &'static str;

    async fn observe(&self, parent: &P) -> Result<AspectStatus, ExternalError>;

    /// Put the desired configuration. Does nothing when the parent declares
    /// no configuration for this aspect.
    async fn create_or_update(&self, parent: &P) -> Result<(), ExternalError>;

    async fn delete(&self, parent: &P) -> Result<(), ExternalError>;

    async fn late_initialize(&self, _parent: &mut P) -> Result<(), ExternalError> {
        Ok(())
    }
}

/// Last value an aspect read for one parent. Late-initialization and
/// observation in the same tick share a single read; any write through the
/// aspect must `clear` it.
pub struct ObservedCache<T> {
    slot: Mutex<Option<(String, T)>>,
}

impl<T: Clone + Send> ObservedCache<T> {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(None),
        }
    }

    pub async fn get_or_fetch<F, Fut>(&self, key: &str, fetch: F) -> Result<T, ExternalError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, ExternalError>>,
    {
        if let Some((k, v)) = self.slot.lock().await.as_ref() {
            if k == key {
                return Ok(v.clone());
            }
        }
        let value = fetch().await?;
        *self.slot.lock().await = Some((key.to_string(), value.clone()));
        Ok(value)
    }

    pub async fn clear(&self) {
        *self.slot.lock().await = None;
    }
}

impl<T: Clone + Send> Default for ObservedCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AspectsObservation {
    pub statuses: Vec<(&'static str, AspectStatus)>,
}

impl AspectsObservation {
    pub fn up_to_date(&self) -> bool {
        self.statuses
            .iter()
            .all(|(_, s)| *s == AspectStatus::Updated)
    }

    pub fn diff(&self) -> String {
        self.statuses
            .iter()
            .filter(|(_, s)| *s != AspectStatus::Updated)
            .map(|(n, s)| format!("{n}: {s:?}"))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Ordered list of aspect clients for one parent kind.
pub struct Aspects<P> {
    clients: Vec<Box<dyn SubresourceClient<P>>>,
}

impl<P: Serialize + Send + Sync> Aspects<P> {
    pub fn new(clients: Vec<Box<dyn SubresourceClient<P>>>) -> Self {
        Self { clients }
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.clients.iter().map(|c| c.name()).collect()
    }

    pub async fn observe(
        &self,
        parent: &P,
    ) -> Result<AspectsObservation, ExternalError> {
        let mut statuses = Vec::with_capacity(self.clients.len());
        for client in &self.clients {
            let status = client.observe(parent).await?;
            trace!(aspect = client.name(), ?status, "observed aspect");
            statuses.push((client.name(), status));
        }
        Ok(AspectsObservation { statuses })
    }

    /// Returns true when any aspect changed the parent's desired state.
    pub async fn late_initialize(&self, parent: &mut P) -> Result<bool, ExternalError> {
        let before = serde_json::to_value(&*parent)?;
        for client in &self.clients {
            client.late_initialize(parent).await?;
        }
        Ok(serde_json::to_value(&*parent)? != before)
    }

    /// Called after the parent itself was created.
    pub async fn create_all(&self, parent: &P) -> Result<(), ExternalError> {
        for client in &self.clients {
            client.create_or_update(parent).await?;
        }
        Ok(())
    }

    /// Re-observe every aspect and act only on those out of date.
    pub async fn reconcile(&self, parent: &P) -> Result<(), ExternalError> {
        for client in &self.clients {
            match client.observe(parent).await? {
                AspectStatus::Updated => {}
                AspectStatus::NeedsUpdate => {
                    debug!(aspect = client.name(), "updating aspect");
                    client.create_or_update(parent).await?;
                }
                AspectStatus::NeedsDeletion => {
                    debug!(aspect = client.name(), "deleting aspect");
                    client.delete(parent).await?;
                }
            }
        }
        Ok(())
    }
}
