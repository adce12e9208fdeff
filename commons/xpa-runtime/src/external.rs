use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::error::ExternalError;
use crate::resource::Managed;

/// Well-known connection secret keys.
pub const CONNECTION_KEY_ENDPOINT: &str = "endpoint";
pub const CONNECTION_KEY_PORT: &str = "port";
pub const CONNECTION_KEY_USERNAME: &str = "username";
pub const CONNECTION_KEY_PASSWORD: &str = "password";

pub type ConnectionDetails = BTreeMap<String, Vec<u8>>;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExternalObservation {
    pub resource_exists: bool,
    pub resource_up_to_date: bool,
    /// The adapter filled unset desired fields from the observation.
    pub resource_late_initialized: bool,
    pub connection_details: ConnectionDetails,
    /// Human readable description of the drift, empty when up to date.
    pub diff: String,
}

impl ExternalObservation {
    pub fn not_found() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExternalCreation {
    pub connection_details: ConnectionDetails,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExternalUpdate {
    pub connection_details: ConnectionDetails,
}

/// Per-kind adapter translating desired state into cloud API calls.
///
/// Every method receives the resource mutably: `observe` writes the observed
/// state into status and late-initializes the spec, `create` may record
/// generated identifiers.
#[async_trait]
pub trait ExternalClient<R: Managed>: Send + Sync {
    async fn observe(
        &self,
        mg: &mut R,
    ) -> Result<ExternalObservation, ExternalError>;

    async fn create(&self, mg: &mut R) -> Result<ExternalCreation, ExternalError>;

    async fn update(&self, mg: &mut R) -> Result<ExternalUpdate, ExternalError>;

    async fn delete(&self, mg: &mut R) -> Result<(), ExternalError>;

    /// Adapters for resources with deletion-blocking flags return true so the
    /// loop issues an update before deleting. Called after `observe`, so
    /// the observed state of `mg` is current.
    fn update_before_delete(&self, _mg: &R) -> bool {
        false
    }
}

/// Builds a client for one managed resource, typically by reading its
/// provider config and credentials.
#[async_trait]
pub trait ExternalConnector<R: Managed>: Send + Sync {
    async fn connect(
        &self,
        mg: &R,
    ) -> Result<Box<dyn ExternalClient<R>>, ExternalError>;
}

