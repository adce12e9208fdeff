use std::fmt::Debug;

use kube::Resource;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::conditions::{Condition, ConditionType};

/// Annotation holding the cloud-side identifier of a managed resource.
pub const ANNOTATION_EXTERNAL_NAME: &str = "xpa.io/external-name";

/// Finalizer guarding the external resource until it is confirmed gone.
pub const FINALIZER: &str = "finalizer.managedresource.xpa.io";

pub const DEFAULT_PROVIDER_CONFIG: &str = "default";

/// What happens to the external resource when the managed resource is deleted.
#[derive(
    Deserialize, Serialize, Clone, Copy, Debug, JsonSchema, PartialEq, Eq, Default,
)]
pub enum DeletionPolicy {
    #[default]
    Delete,
    Orphan,
}

/// A single action the reconciler is allowed to take.
#[derive(
    Deserialize, Serialize, Clone, Copy, Debug, JsonSchema, PartialEq, Eq, Hash,
)]
pub enum ManagementAction {
    Observe,
    Create,
    Update,
    Delete,
    LateInitialize,
    #[serde(rename = "*")]
    All,
}

#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, PartialEq, Eq)]
pub struct SecretReference {
    pub name: String,
    pub namespace: String,
}

#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, PartialEq, Eq)]
pub struct SecretKeySelector {
    pub name: String,
    pub namespace: String,
    pub key: String,
}

#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, PartialEq, Eq)]
pub struct ProviderConfigReference {
    pub name: String,
}

impl Default for ProviderConfigReference {
    fn default() -> Self {
        Self {
            name: DEFAULT_PROVIDER_CONFIG.to_string(),
        }
    }
}

/// Fields shared by every managed resource spec, flattened next to
/// `forProvider`.
#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResourceSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub write_connection_secret_to_ref: Option<SecretReference>,
    #[serde(default)]
    pub provider_config_ref: ProviderConfigReference,
    #[serde(default)]
    pub deletion_policy: DeletionPolicy,
    /// Defaults to `["*"]` when omitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub management_policies: Option<Vec<ManagementAction>>,
}

impl ResourceSpec {
    pub fn allows(&self, action: ManagementAction) -> bool {
        match self.management_policies.as_ref() {
            None => true,
            Some(list) => list
                .iter()
                .any(|a| *a == ManagementAction::All || *a == action),
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, Default, PartialEq)]
pub struct ResourceStatus {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
}

impl ResourceStatus {
    pub fn condition(&self, type_: ConditionType) -> Option<&Condition> {
        self.conditions.iter().find(|c| c.type_ == type_)
    }

    /// Replace conditions of the same type. A condition that only differs in
    /// its timestamp keeps the previous `lastTransitionTime`.
    pub fn set_conditions(&mut self, conds: impl IntoIterator<Item = Condition>) {
        for mut c in conds {
            match self.conditions.iter_mut().find(|x| x.type_ == c.type_) {
                Some(existing) => {
                    if existing.equal_ignoring_time(&c) {
                        continue;
                    }
                    if existing.status == c.status {
                        c.last_transition_time =
                            existing.last_transition_time.clone();
                    }
                    *existing = c;
                }
                None => self.conditions.push(c),
            }
        }
    }
}

/// A platform-local object that represents a desired cloud resource.
///
/// Implemented for each custom resource kind with [`managed_resource!`].
pub trait Managed:
    Resource<DynamicType = ()>
    + Clone
    + Debug
    + Serialize
    + DeserializeOwned
    + Send
    + Sync
    + 'static
{
    fn resource_spec(&self) -> &ResourceSpec;
    fn resource_spec_mut(&mut self) -> &mut ResourceSpec;
    fn resource_status(&self) -> Option<&ResourceStatus>;
    /// Materializes the status block when absent.
    fn resource_status_mut(&mut self) -> &mut ResourceStatus;
}

/// Implements [`Managed`] for a `kube::CustomResource` whose spec flattens a
/// `resource_spec: ResourceSpec` and whose status flattens a
/// `resource_status: ResourceStatus`.
#[macro_export]
macro_rules! managed_resource {
    ($kind:ty) => {
        impl $crate::Managed for $kind {
            fn resource_spec(&self) -> &$crate::ResourceSpec {
                &self.spec.resource_spec
            }
            fn resource_spec_mut(&mut self) -> &mut $crate::ResourceSpec {
                &mut self.spec.resource_spec
            }
            fn resource_status(&self) -> Option<&$crate::ResourceStatus> {
                self.status.as_ref().map(|s| &s.resource_status)
            }
            fn resource_status_mut(&mut self) -> &mut $crate::ResourceStatus {
                &mut self
                    .status
                    .get_or_insert_with(Default::default)
                    .resource_status
            }
        }
    };
}

/// Convenience accessors available on every [`Managed`] kind.
pub trait ManagedExt: Managed {
    fn external_name(&self) -> Option<String> {
        self.meta()
            .annotations
            .as_ref()
            .and_then(|a| a.get(ANNOTATION_EXTERNAL_NAME))
            .filter(|n| !n.is_empty())
            .cloned()
    }

    fn set_external_name(&mut self, name: &str) {
        self.meta_mut()
            .annotations
            .get_or_insert_with(Default::default)
            .insert(ANNOTATION_EXTERNAL_NAME.to_string(), name.to_string());
    }

    /// Stamps the external name from `metadata.name` when none is set.
    /// Returns true when the annotation was written.
    fn initialize_external_name(&mut self) -> bool {
        if self.external_name().is_some() {
            return false;
        }
        let name = self.meta().name.clone().unwrap_or_default();
        if name.is_empty() {
            return false;
        }
        self.set_external_name(&name);
        true
    }

    fn is_deleting(&self) -> bool {
        self.meta().deletion_timestamp.is_some()
    }

    fn has_finalizer(&self) -> bool {
        self.meta()
            .finalizers
            .as_ref()
            .map(|f| f.iter().any(|x| x == FINALIZER))
            .unwrap_or(false)
    }

    fn add_finalizer(&mut self) -> bool {
        if self.has_finalizer() {
            return false;
        }
        self.meta_mut()
            .finalizers
            .get_or_insert_with(Vec::new)
            .push(FINALIZER.to_string());
        true
    }

    fn remove_finalizer(&mut self) -> bool {
        if !self.has_finalizer() {
            return false;
        }
        if let Some(f) = self.meta_mut().finalizers.as_mut() {
            f.retain(|x| x != FINALIZER);
        }
        true
    }

    fn condition(&self, type_: ConditionType) -> Option<&Condition> {
        self.resource_status().and_then(|s| s.condition(type_))
    }

    fn set_conditions(&mut self, conds: impl IntoIterator<Item = Condition>) {
        self.resource_status_mut().set_conditions(conds);
    }

    fn allows(&self, action: ManagementAction) -> bool {
        self.resource_spec().allows(action)
    }

    /// `metadata.name`, or an empty string for objects not yet named.
    fn name_or_default(&self) -> String {
        self.meta().name.clone().unwrap_or_default()
    }
}

impl<T: Managed> ManagedExt for T {}
