//! Seams to the host platform: persistence of managed resources, the
//! connection secret writer, the event recorder and the read-only reference
//! lookup used by the resolver.

use std::collections::BTreeMap;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::ObjectReference;
use serde_json::Value;

use crate::error::StoreError;
use crate::external::ConnectionDetails;
use crate::reference::TargetKind;
use crate::resource::{ANNOTATION_EXTERNAL_NAME, Managed};

pub type StoreResult<T> = Result<T, StoreError>;

pub const REASON_CREATED: &str = "CreatedExternalResource";
pub const REASON_UPDATED: &str = "UpdatedExternalResource";
pub const REASON_DELETED: &str = "DeletedExternalResource";
pub const REASON_LATE_INITIALIZED: &str = "LateInitializedSpec";
pub const REASON_RECONCILE_ERROR: &str = "ReconcileError";
pub const REASON_CANNOT_RESOLVE: &str = "CannotResolveReferences";
pub const REASON_UPDATE_BEFORE_DELETE: &str = "CannotUpdateBeforeDelete";

#[async_trait]
pub trait ManagedStore<R: Managed>: Send + Sync {
    /// Persist metadata and spec. `obj` is refreshed with the stored copy so
    /// the next write carries the new resource version.
    async fn update(&self, obj: &mut R) -> StoreResult<()>;

    async fn update_status(&self, obj: &R) -> StoreResult<()>;
}

#[async_trait]
pub trait SecretStore: Send + Sync {
    async fn get(
        &self,
        namespace: &str,
        name: &str,
    ) -> StoreResult<Option<ConnectionDetails>>;

    /// Create the secret or merge `details` into its existing data.
    async fn apply(
        &self,
        namespace: &str,
        name: &str,
        details: &ConnectionDetails,
    ) -> StoreResult<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Normal,
    Warning,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub kind: EventKind,
    pub reason: &'static str,
    pub action: &'static str,
    pub note: Option<String>,
}

impl Event {
    pub fn normal(reason: &'static str, action: &'static str) -> Self {
        Self {
            kind: EventKind::Normal,
            reason,
            action,
            note: None,
        }
    }

    pub fn warning(reason: &'static str, action: &'static str) -> Self {
        Self {
            kind: EventKind::Warning,
            reason,
            action,
            note: None,
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

/// Events are best effort; implementations log and swallow failures.
#[async_trait]
pub trait EventRecorder: Send + Sync {
    async fn record(&self, obj: &ObjectReference, event: Event);
}

/// Projection of another managed resource as seen by the resolver.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferencedObject {
    pub name: String,
    pub labels: BTreeMap<String, String>,
    pub controller_uid: Option<String>,
    pub object: Value,
}

impl ReferencedObject {
    /// Build a projection from a serialized object.
    pub fn from_value(object: Value) -> Self {
        let meta = &object["metadata"];
        let name = meta["name"].as_str().unwrap_or_default().to_string();
        let labels = meta["labels"]
            .as_object()
            .map(|m| {
                m.iter()
                    .filter_map(|(k, v)| {
                        v.as_str().map(|s| (k.clone(), s.to_string()))
                    })
                    .collect()
            })
            .unwrap_or_default();
        let controller_uid = meta["ownerReferences"].as_array().and_then(|refs| {
            refs.iter()
                .find(|r| r["controller"].as_bool().unwrap_or(false))
                .and_then(|r| r["uid"].as_str())
                .map(str::to_string)
        });
        Self {
            name,
            labels,
            controller_uid,
            object,
        }
    }

    pub fn external_name(&self) -> Option<&str> {
        self.object["metadata"]["annotations"][ANNOTATION_EXTERNAL_NAME]
            .as_str()
            .filter(|s| !s.is_empty())
    }

    /// Ready=True in `status.conditions`.
    pub fn is_ready(&self) -> bool {
        self.object["status"]["conditions"]
            .as_array()
            .map(|conds| {
                conds
                    .iter()
                    .any(|c| c["type"] == "Ready" && c["status"] == "True")
            })
            .unwrap_or(false)
    }
}

#[async_trait]
pub trait ReferenceReader: Send + Sync {
    async fn get(
        &self,
        target: &TargetKind,
        name: &str,
    ) -> StoreResult<Option<ReferencedObject>>;

    async fn list(&self, target: &TargetKind) -> StoreResult<Vec<ReferencedObject>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn projects_labels_controller_and_readiness() {
        let obj = ReferencedObject::from_value(json!({
            "metadata": {
                "name": "sg-a",
                "labels": {"team": "db"},
                "annotations": {"xpa.io/external-name": "sg-123"},
                "ownerReferences": [
                    {"uid": "other", "controller": false},
                    {"uid": "owner-1", "controller": true}
                ]
            },
            "status": {"conditions": [{"type": "Ready", "status": "True"}]}
        }));
        assert_eq!(obj.name, "sg-a");
        assert_eq!(obj.labels.get("team").map(String::as_str), Some("db"));
        assert_eq!(obj.controller_uid.as_deref(), Some("owner-1"));
        assert_eq!(obj.external_name(), Some("sg-123"));
        assert!(obj.is_ready());
    }

    #[test]
    fn missing_conditions_are_not_ready() {
        let obj = ReferencedObject::from_value(json!({
            "metadata": {"name": "x"}
        }));
        assert!(!obj.is_ready());
        assert!(obj.external_name().is_none());
        assert!(obj.controller_uid.is_none());
    }
}
