//! Cross-resource references.
//!
//! A referencing field `F` travels with two siblings: `FRef` names the target
//! object directly, `FSelector` picks one by labels. The resolver fills the
//! concrete slot and pins a selector choice as a direct reference so later
//! ticks are stable.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use kube::Resource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ResolveError;
use crate::resource::Managed;
use crate::store::{ReferenceReader, ReferencedObject};

#[derive(
    Deserialize, Serialize, Clone, Copy, Debug, JsonSchema, PartialEq, Eq, Default,
)]
pub enum ResolvePolicy {
    Always,
    #[default]
    IfNotPresent,
}

#[derive(
    Deserialize, Serialize, Clone, Copy, Debug, JsonSchema, PartialEq, Eq, Default,
)]
pub enum ResolutionPolicy {
    #[default]
    Required,
    Optional,
}

#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, PartialEq, Default)]
pub struct Policy {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolve: Option<ResolvePolicy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<ResolutionPolicy>,
}

#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, PartialEq)]
pub struct Reference {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy: Option<Policy>,
}

impl Reference {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            policy: None,
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Selector {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub match_labels: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_controller_ref: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy: Option<Policy>,
}

fn always(policy: Option<&Policy>) -> bool {
    policy.and_then(|p| p.resolve) == Some(ResolvePolicy::Always)
}

fn optional(policy: Option<&Policy>) -> bool {
    policy.and_then(|p| p.resolution) == Some(ResolutionPolicy::Optional)
}

/// Coordinates of the kind a reference points at.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TargetKind {
    pub api_version: String,
    pub kind: String,
    pub plural: String,
}

impl TargetKind {
    pub fn new(
        api_version: impl Into<String>,
        kind: impl Into<String>,
        plural: impl Into<String>,
    ) -> Self {
        Self {
            api_version: api_version.into(),
            kind: kind.into(),
            plural: plural.into(),
        }
    }

    pub fn of<K: Resource<DynamicType = ()>>() -> Self {
        Self::new(K::api_version(&()), K::kind(&()), K::plural(&()))
    }

    /// Splits `group/version`; core kinds have an empty group.
    pub fn group_version(&self) -> (&str, &str) {
        match self.api_version.split_once('/') {
            Some((g, v)) => (g, v),
            None => ("", self.api_version.as_str()),
        }
    }
}

/// Which value of the referenced object lands in the concrete slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extract {
    ExternalName,
    /// JSON pointer into the serialized object.
    Field(&'static str),
}

impl Extract {
    pub const ROLE_ARN: Extract = Extract::Field("/status/atProvider/arn");

    fn value(&self, obj: &ReferencedObject) -> Option<String> {
        match self {
            Extract::ExternalName => obj.external_name().map(str::to_string),
            Extract::Field(ptr) => obj
                .object
                .pointer(ptr)
                .and_then(|v| v.as_str())
                .filter(|s| !s.is_empty())
                .map(str::to_string),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceStatus {
    NotFound,
    NotReady,
    Ready,
}

impl ReferenceStatus {
    pub fn of(obj: Option<&ReferencedObject>) -> Self {
        match obj {
            None => ReferenceStatus::NotFound,
            Some(o) if o.is_ready() => ReferenceStatus::Ready,
            Some(_) => ReferenceStatus::NotReady,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResolutionRequest {
    pub current_value: Option<String>,
    pub reference: Option<Reference>,
    pub selector: Option<Selector>,
    pub target: TargetKind,
    pub extract: Extract,
}

impl ResolutionRequest {
    fn is_no_op(&self) -> bool {
        if always(self.reference.as_ref().and_then(|r| r.policy.as_ref())) {
            return false;
        }
        let has_value =
            self.current_value.as_deref().is_some_and(|v| !v.is_empty());
        has_value || (self.reference.is_none() && self.selector.is_none())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolutionResponse {
    pub resolved_value: Option<String>,
    pub resolved_reference: Option<Reference>,
}

#[derive(Debug, Clone)]
pub struct MultiResolutionRequest {
    pub current_values: Vec<String>,
    pub references: Vec<Reference>,
    pub selector: Option<Selector>,
    pub target: TargetKind,
    pub extract: Extract,
}

impl MultiResolutionRequest {
    fn is_no_op(&self) -> bool {
        if self
            .references
            .iter()
            .any(|r| always(r.policy.as_ref()))
        {
            return false;
        }
        !self.current_values.is_empty()
            || (self.references.is_empty() && self.selector.is_none())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MultiResolutionResponse {
    pub resolved_values: Vec<String>,
    pub resolved_references: Vec<Reference>,
}

/// Resolves references against a read-only view of the local store.
#[derive(Clone)]
pub struct ApiResolver {
    reader: Arc<dyn ReferenceReader>,
    controller_uid: Option<String>,
}

impl ApiResolver {
    /// `controller_uid` is the controller owner of the referencing resource,
    /// used by `matchControllerRef` selectors.
    pub fn new(
        reader: Arc<dyn ReferenceReader>,
        controller_uid: Option<String>,
    ) -> Self {
        Self {
            reader,
            controller_uid,
        }
    }

    pub fn for_resource<R: Managed>(
        reader: Arc<dyn ReferenceReader>,
        mg: &R,
    ) -> Self {
        let uid = mg
            .meta()
            .owner_references
            .as_ref()
            .and_then(|refs| refs.iter().find(|r| r.controller == Some(true)))
            .map(|r| r.uid.clone());
        Self::new(reader, uid)
    }

    async fn candidates(
        &self,
        target: &TargetKind,
        selector: &Selector,
    ) -> Result<Vec<ReferencedObject>, ResolveError> {
        let mut matched: Vec<ReferencedObject> = self
            .reader
            .list(target)
            .await?
            .into_iter()
            .filter(|o| {
                selector
                    .match_labels
                    .iter()
                    .all(|(k, v)| o.labels.get(k) == Some(v))
            })
            .filter(|o| {
                if selector.match_controller_ref != Some(true) {
                    return true;
                }
                self.controller_uid.is_some()
                    && o.controller_uid == self.controller_uid
            })
            .collect();
        matched.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(matched)
    }

    /// Fetch one target and extract its value. `Ok(None)` only when the
    /// reference is optional.
    async fn fetch(
        &self,
        field: &str,
        target: &TargetKind,
        extract: Extract,
        reference: &Reference,
    ) -> Result<Option<String>, ResolveError> {
        let opt = optional(reference.policy.as_ref());
        let obj = self.reader.get(target, &reference.name).await?;
        match ReferenceStatus::of(obj.as_ref()) {
            ReferenceStatus::NotFound if opt => return Ok(None),
            ReferenceStatus::NotFound => {
                return Err(ResolveError::NotFound {
                    field: field.to_string(),
                    name: reference.name.clone(),
                });
            }
            ReferenceStatus::NotReady if opt => return Ok(None),
            ReferenceStatus::NotReady => {
                return Err(ResolveError::NotReady {
                    field: field.to_string(),
                    name: reference.name.clone(),
                });
            }
            ReferenceStatus::Ready => {}
        }
        match obj.as_ref().and_then(|o| extract.value(o)) {
            Some(v) => Ok(Some(v)),
            None if opt => Ok(None),
            None => Err(ResolveError::Extract {
                field: field.to_string(),
                name: reference.name.clone(),
            }),
        }
    }

    pub async fn resolve(
        &self,
        field: &str,
        req: ResolutionRequest,
    ) -> Result<ResolutionResponse, ResolveError> {
        if req.is_no_op() {
            return Ok(ResolutionResponse {
                resolved_value: req.current_value,
                resolved_reference: req.reference,
            });
        }

        let reference = match (req.reference, req.selector.as_ref()) {
            (Some(r), _) => r,
            (None, Some(sel)) => {
                let picked = self.candidates(&req.target, sel).await?;
                match picked.into_iter().next() {
                    Some(o) => {
                        debug!(field, name = %o.name, "selector matched");
                        Reference {
                            name: o.name,
                            policy: sel.policy.clone(),
                        }
                    }
                    None if optional(sel.policy.as_ref()) => {
                        return Ok(ResolutionResponse {
                            resolved_value: req.current_value,
                            resolved_reference: None,
                        });
                    }
                    None => {
                        return Err(ResolveError::NoMatch {
                            field: field.to_string(),
                        });
                    }
                }
            }
            (None, None) => {
                return Ok(ResolutionResponse {
                    resolved_value: req.current_value,
                    resolved_reference: None,
                });
            }
        };

        let value = self
            .fetch(field, &req.target, req.extract, &reference)
            .await?;
        Ok(ResolutionResponse {
            resolved_value: value.or(req.current_value),
            resolved_reference: Some(reference),
        })
    }

    pub async fn resolve_multiple(
        &self,
        field: &str,
        req: MultiResolutionRequest,
    ) -> Result<MultiResolutionResponse, ResolveError> {
        if req.is_no_op() {
            return Ok(MultiResolutionResponse {
                resolved_values: req.current_values,
                resolved_references: req.references,
            });
        }

        let references = if !req.references.is_empty() {
            req.references
        } else {
            let sel = req.selector.as_ref().ok_or_else(|| {
                ResolveError::NoMatch {
                    field: field.to_string(),
                }
            })?;
            let picked = self.candidates(&req.target, sel).await?;
            if picked.is_empty() && !optional(sel.policy.as_ref()) {
                return Err(ResolveError::NoMatch {
                    field: field.to_string(),
                });
            }
            picked
                .into_iter()
                .map(|o| Reference {
                    name: o.name,
                    policy: sel.policy.clone(),
                })
                .collect()
        };

        let mut values: Vec<String> = Vec::with_capacity(references.len());
        for r in &references {
            if let Some(v) =
                self.fetch(field, &req.target, req.extract, r).await?
            {
                if !values.contains(&v) {
                    values.push(v);
                }
            }
        }
        Ok(MultiResolutionResponse {
            resolved_values: values,
            resolved_references: references,
        })
    }
}

/// Implemented by kinds that carry reference triads. The default resolves
/// nothing.
#[async_trait]
pub trait ResolveReferences: Managed {
    async fn resolve_references(
        &mut self,
        _resolver: &ApiResolver,
    ) -> Result<(), ResolveError> {
        Ok(())
    }
}
