//! External client for `RDSInstance`.

pub mod convert;


use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};
use xpa_runtime::external::CONNECTION_KEY_PASSWORD;
use xpa_runtime::password::generate_password;
use xpa_runtime::store::SecretStore;
use xpa_runtime::{
    ExternalClient, ExternalConnector, ExternalCreation, ExternalError,
    ExternalObservation, ExternalUpdate, ManagedExt, conditions,
};

use crate::clients::rds::{DbInstance, ERR_DB_INSTANCE_NOT_FOUND, RdsApi};
use crate::clients::{ApiError, message_says_not_found};
use crate::controller::connector::AwsConnector;
use crate::crd::db_instance::RDSInstance;
use crate::crd::tags_from_map;

use convert::{CreateRequest, IGNORED_FIELDS, STATUS_CREATING, STATUS_DELETING};

const ERR_DESCRIBE: &str = "cannot describe DB instance";
const ERR_CREATE: &str = "cannot create DB instance";
const ERR_MODIFY: &str = "cannot modify DB instance";
const ERR_DELETE: &str = "cannot delete DB instance";
const ERR_ADD_TAGS: &str = "cannot add tags to DB instance";
const ERR_REMOVE_TAGS: &str = "cannot remove tags from DB instance";
const ERR_PASSWORD: &str = "cannot get password secret";

fn is_not_found(e: &ApiError) -> bool {
    e.is_code(ERR_DB_INSTANCE_NOT_FOUND) || message_says_not_found(e)
}

fn identifier(mg: &RDSInstance) -> String {
    mg.external_name().unwrap_or_else(|| mg.name_or_default())
}

pub struct RdsInstanceConnector {
    aws: AwsConnector,
}

impl RdsInstanceConnector {
    pub fn new(aws: AwsConnector) -> Self {
        Self { aws }
    }
}

#[async_trait]
impl ExternalConnector<RDSInstance> for RdsInstanceConnector {
    async fn connect(
        &self,
        mg: &RDSInstance,
    ) -> Result<Box<dyn ExternalClient<RDSInstance>>, ExternalError> {
        let cfg = self.aws.config_for(mg, &mg.spec.for_provider.region).await?;
        Ok(Box::new(RdsInstanceClient::new(
            self.aws.factory().rds(&cfg),
            self.aws.secrets(),
        )))
    }
}

pub struct RdsInstanceClient {
    rds: Arc<dyn RdsApi>,
    secrets: Arc<dyn SecretStore>,
}

impl RdsInstanceClient {
    pub fn new(rds: Arc<dyn RdsApi>, secrets: Arc<dyn SecretStore>) -> Self {
        Self { rds, secrets }
    }

    async fn describe(&self, id: &str) -> Result<Option<DbInstance>, ExternalError> {
        match self.rds.describe_db_instance(id).await {
            Ok(db) => Ok(Some(db)),
            Err(e) if is_not_found(&e) => Ok(None),
            Err(e) => Err(ExternalError::api(ERR_DESCRIBE, e)),
        }
    }

    /// Password from `masterPasswordSecretRef`, if the user supplied one.
    async fn user_password(&self, mg: &RDSInstance) -> Result<Option<String>, ExternalError> {
        let Some(sel) = mg.spec.for_provider.master_password_secret_ref.as_ref() else {
            return Ok(None);
        };
        let data = self
            .secrets
            .get(&sel.namespace, &sel.name)
            .await
            .map_err(|e| ExternalError::api(ERR_PASSWORD, e))?
            .and_then(|mut d| d.remove(&sel.key))
            .ok_or_else(|| {
                ExternalError::api(
                    ERR_PASSWORD,
                    format!("key {} not found in {}/{}", sel.key, sel.namespace, sel.name),
                )
            })?;
        String::from_utf8(data)
            .map(Some)
            .map_err(|e| ExternalError::api(ERR_PASSWORD, e))
    }

    /// The user-supplied password when it differs from the published one.
    async fn changed_password(
        &self,
        mg: &RDSInstance,
    ) -> Result<Option<String>, ExternalError> {
        let Some(target) = mg.spec.resource_spec.write_connection_secret_to_ref.as_ref()
        else {
            return Ok(None);
        };
        let Some(password) = self.user_password(mg).await? else {
            return Ok(None);
        };
        let published = self
            .secrets
            .get(&target.namespace, &target.name)
            .await
            .map_err(|e| ExternalError::api(ERR_PASSWORD, e))?
            .and_then(|mut d| d.remove(CONNECTION_KEY_PASSWORD));
        Ok((published.as_deref() != Some(password.as_bytes())).then_some(password))
    }
}

#[async_trait]
impl ExternalClient<RDSInstance> for RdsInstanceClient {
    async fn observe(
        &self,
        mg: &mut RDSInstance,
    ) -> Result<ExternalObservation, ExternalError> {
        let Some(db) = self.describe(&identifier(mg)).await? else {
            return Ok(ExternalObservation::not_found());
        };

        let late_initialized = convert::late_initialize(&mut mg.spec.for_provider, &db);
        let observation = convert::generate_observation(&db);
        let connection_details = convert::connection_details(&observation);
        mg.set_conditions([convert::ready_condition(&observation.db_instance_status)]);
        *mg.at_provider_mut() = observation;

        let drift = convert::drift(&mg.spec.for_provider, &db)?;
        let password_changed = self.changed_password(mg).await?.is_some();
        let mut diff = drift.describe(&mg.spec.for_provider, &db);
        if password_changed {
            if !diff.is_empty() {
                diff.push('\n');
            }
            diff.push_str("masterPassword: changed");
        }

        Ok(ExternalObservation {
            resource_exists: true,
            resource_up_to_date: drift.is_empty() && !password_changed,
            resource_late_initialized: late_initialized,
            connection_details,
            diff,
        })
    }

    async fn create(
        &self,
        mg: &mut RDSInstance,
    ) -> Result<ExternalCreation, ExternalError> {
        if mg
            .at_provider()
            .is_some_and(|o| o.db_instance_status == STATUS_CREATING)
        {
            debug!("DB instance is already being created");
            return Ok(ExternalCreation::default());
        }

        let id = identifier(mg);
        let password = match self.user_password(mg).await? {
            Some(pw) => pw,
            None => generate_password(),
        };
        let request = convert::generate_create_request(&id, &mg.spec.for_provider, password)?;
        let password = request.password().map(str::to_string);

        let db = match request {
            CreateRequest::Create(input) => self.rds.create_db_instance(input).await,
            CreateRequest::FromS3(input) => self.rds.restore_db_instance_from_s3(input).await,
            CreateRequest::FromSnapshot(input) => {
                self.rds.restore_db_instance_from_db_snapshot(input).await
            }
            CreateRequest::ToPointInTime(input) => {
                self.rds.restore_db_instance_to_point_in_time(input).await
            }
        }
        .map_err(|e| ExternalError::api(ERR_CREATE, e))?;
        info!(id = %id, "DB instance creation started");

        let mut observation = convert::generate_observation(&db);
        if observation.db_instance_status.is_empty() {
            observation.db_instance_status = STATUS_CREATING.to_string();
        }
        *mg.at_provider_mut() = observation;

        Ok(ExternalCreation {
            connection_details: convert::credential_details(
                mg.spec.for_provider.master_username.as_deref(),
                password.as_deref(),
            ),
        })
    }

    async fn update(
        &self,
        mg: &mut RDSInstance,
    ) -> Result<ExternalUpdate, ExternalError> {
        let id = identifier(mg);
        let db = self.describe(&id).await?.ok_or_else(|| {
            ExternalError::api(ERR_DESCRIBE, format!("DB instance {id} not found"))
        })?;

        let params = &mg.spec.for_provider;
        let patch = convert::create_patch(&db, params)?.without(IGNORED_FIELDS);
        let mut input = convert::generate_modify_input(&id, params, &db, &patch);
        let new_password = self.changed_password(mg).await?;
        input.master_user_password = new_password.clone();
        if !input.is_empty() {
            self.rds
                .modify_db_instance(input)
                .await
                .map_err(|e| ExternalError::api(ERR_MODIFY, e))?;
        }

        let tags = convert::tag_diff(params, &db);
        if !tags.remove.is_empty() {
            self.rds
                .remove_tags_from_resource(&db.db_instance_arn, tags.remove)
                .await
                .map_err(|e| ExternalError::api(ERR_REMOVE_TAGS, e))?;
        }
        if !tags.add.is_empty() {
            self.rds
                .add_tags_to_resource(&db.db_instance_arn, tags_from_map(&tags.add))
                .await
                .map_err(|e| ExternalError::api(ERR_ADD_TAGS, e))?;
        }

        Ok(ExternalUpdate {
            connection_details: convert::credential_details(None, new_password.as_deref()),
        })
    }

    async fn delete(&self, mg: &mut RDSInstance) -> Result<(), ExternalError> {
        mg.set_conditions([conditions::deleting()]);
        if mg
            .at_provider()
            .is_some_and(|o| o.db_instance_status == STATUS_DELETING)
        {
            debug!("DB instance is already being deleted");
            return Ok(());
        }
        let input = convert::generate_delete_input(&identifier(mg), &mg.spec.for_provider);
        match self.rds.delete_db_instance(input).await {
            Ok(()) => Ok(()),
            Err(e) if is_not_found(&e) => Ok(()),
            Err(e) => Err(ExternalError::api(ERR_DELETE, e)),
        }
    }

    /// Deletion protection and delete-time flags must reach the instance
    /// before the delete call. Nothing is sent once the deletion started.
    fn update_before_delete(&self, mg: &RDSInstance) -> bool {
        !mg.at_provider()
            .is_some_and(|o| o.db_instance_status == STATUS_DELETING)
    }
}
