use std::sync::Arc;

use tracing::{debug, warn};
use xpa_runtime::reference::TargetKind;
use xpa_runtime::store::{ReferenceReader, SecretStore};
use xpa_runtime::{ExternalError, Managed};

use crate::clients::{AwsClientFactory, AwsConfig, Credentials};
use crate::crd::provider_config::{CredentialsSource, ProviderConfig};

const DEFAULT_PROFILE: &str = "default";

/// Shared by every kind's connector: turns a resource's `providerConfigRef`
/// into an [`AwsConfig`] and hands out service clients.
#[derive(Clone)]
pub struct AwsConnector {
    factory: Arc<dyn AwsClientFactory>,
    reader: Arc<dyn ReferenceReader>,
    secrets: Arc<dyn SecretStore>,
}

impl AwsConnector {
    pub fn new(
        factory: Arc<dyn AwsClientFactory>,
        reader: Arc<dyn ReferenceReader>,
        secrets: Arc<dyn SecretStore>,
    ) -> Self {
        Self {
            factory,
            reader,
            secrets,
        }
    }

    pub fn factory(&self) -> &dyn AwsClientFactory {
        self.factory.as_ref()
    }

    pub fn secrets(&self) -> Arc<dyn SecretStore> {
        self.secrets.clone()
    }

    pub async fn config_for<R: Managed>(
        &self,
        mg: &R,
        region: &str,
    ) -> Result<AwsConfig, ExternalError> {
        let name = &mg.resource_spec().provider_config_ref.name;
        let obj = self
            .reader
            .get(&TargetKind::of::<ProviderConfig>(), name)
            .await
            .map_err(|e| ExternalError::api("cannot get provider config", e))?
            .ok_or_else(|| {
                ExternalError::api(
                    "cannot get provider config",
                    format!("provider config {name} not found"),
                )
            })?;
        let pc: ProviderConfig = serde_json::from_value(obj.object).map_err(|e| {
            warn!(provider_config = %name, error = %e, "cannot decode provider config");
            ExternalError::UnexpectedObject
        })?;

        let credentials = match pc.spec.credentials.source {
            CredentialsSource::None => None,
            CredentialsSource::Secret => {
                let sel = pc.spec.credentials.secret_ref.as_ref().ok_or_else(|| {
                    ExternalError::Invalid(format!(
                        "provider config {name} uses a Secret source without secretRef"
                    ))
                })?;
                let data = self
                    .secrets
                    .get(&sel.namespace, &sel.name)
                    .await
                    .map_err(|e| ExternalError::api("cannot get credentials secret", e))?
                    .and_then(|mut d| d.remove(&sel.key))
                    .ok_or_else(|| {
                        ExternalError::api(
                            "cannot get credentials secret",
                            format!("key {} not found in {}/{}", sel.key, sel.namespace, sel.name),
                        )
                    })?;
                let text = String::from_utf8(data)
                    .map_err(|e| ExternalError::api("cannot decode credentials", e))?;
                let profile = pc
                    .spec
                    .credentials
                    .profile
                    .as_deref()
                    .unwrap_or(DEFAULT_PROFILE);
                Some(Credentials::from_ini(&text, profile)?)
            }
        };
        debug!(provider_config = %name, region, "resolved AWS config");

        Ok(AwsConfig {
            region: region.to_string(),
            credentials,
            endpoint: pc.spec.endpoint,
        })
    }
}
