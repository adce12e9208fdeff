//! Generic reconciliation core for managed cloud resources.
//!
//! A managed resource kind implements [`Managed`] (usually through
//! [`managed_resource!`]), optionally [`ResolveReferences`], and supplies an
//! [`ExternalConnector`]. The [`Reconciler`] then drives each object through
//! observe, create, update and delete against the external system.

pub mod conditions;
pub mod diff;
pub mod error;
pub mod external;
pub mod late_init;
pub mod memory;
pub mod password;
pub mod reconciler;
pub mod reference;
pub mod resource;
pub mod store;
pub mod subresource;


pub use conditions::{Condition, ConditionReason, ConditionStatus, ConditionType};
pub use error::{ExternalError, ReconcileError, ResolveError, StoreError};
pub use external::{
    ConnectionDetails, ExternalClient, ExternalConnector, ExternalCreation,
    ExternalObservation, ExternalUpdate,
};
pub use reconciler::{Reconciler, ReconcilerOptions, Requeue};
pub use reference::{ApiResolver, ResolveReferences};
pub use resource::{
    DeletionPolicy, Managed, ManagedExt, ManagementAction, ResourceSpec,
    ResourceStatus,
};
