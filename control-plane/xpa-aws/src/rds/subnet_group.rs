//! External client for `DBSubnetGroup`.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;
use xpa_runtime::diff::{TagDiff, diff_tags, same_set};
use xpa_runtime::{
    ExternalClient, ExternalConnector, ExternalCreation, ExternalError,
    ExternalObservation, ExternalUpdate, ManagedExt, conditions,
};

use crate::clients::rds::{
    DbSubnetGroup, DbSubnetGroupInput, ERR_DB_SUBNET_GROUP_NOT_FOUND, RdsApi,
};
use crate::clients::{ApiError, message_says_not_found};
use crate::controller::connector::AwsConnector;
use crate::crd::db_subnet_group::{
    DBSubnetGroup, DBSubnetGroupObservation, DBSubnetGroupParameters,
};
use crate::crd::{Tag, tag_map, tags_from_map};

const ERR_DESCRIBE: &str = "cannot describe DB subnet group";
const ERR_CREATE: &str = "cannot create DB subnet group";
const ERR_MODIFY: &str = "cannot modify DB subnet group";
const ERR_DELETE: &str = "cannot delete DB subnet group";
const ERR_ADD_TAGS: &str = "cannot add tags to DB subnet group";
const ERR_REMOVE_TAGS: &str = "cannot remove tags from DB subnet group";
const ERR_LIST_TAGS: &str = "cannot list tags of DB subnet group";

const STATUS_COMPLETE: &str = "Complete";

fn is_not_found(e: &ApiError) -> bool {
    e.is_code(ERR_DB_SUBNET_GROUP_NOT_FOUND) || message_says_not_found(e)
}

fn group_name(mg: &DBSubnetGroup) -> String {
    mg.external_name().unwrap_or_else(|| mg.name_or_default())
}

pub fn generate_observation(group: &DbSubnetGroup) -> DBSubnetGroupObservation {
    DBSubnetGroupObservation {
        arn: group.db_subnet_group_arn.clone(),
        state: group.subnet_group_status.clone(),
        vpc_id: group.vpc_id.clone(),
        subnets: group.subnets.clone(),
    }
}

/// Fill an unset description and subnet list from the observed group.
pub fn late_initialize(p: &mut DBSubnetGroupParameters, group: &DbSubnetGroup) -> bool {
    let mut li = xpa_runtime::late_init::LateInitializer::new();
    li.field(&mut p.description, group.db_subnet_group_description.clone());
    li.field(
        &mut p.subnet_ids,
        group.subnets.iter().map(|s| s.subnet_id.clone()).collect(),
    );
    li.changed()
}

pub fn is_up_to_date(
    p: &DBSubnetGroupParameters,
    group: &DbSubnetGroup,
    tags: &[Tag],
) -> bool {
    let observed: Vec<&str> = group.subnets.iter().map(|s| s.subnet_id.as_str()).collect();
    let desired: Vec<&str> = p.subnet_ids.iter().map(String::as_str).collect();
    p.description == group.db_subnet_group_description
        && same_set(&desired, &observed)
        && tag_diff(p, tags).is_empty()
}

pub fn tag_diff(p: &DBSubnetGroupParameters, observed: &[Tag]) -> TagDiff {
    diff_tags(&tag_map(&p.tags), &tag_map(observed))
}

fn generate_input(name: String, p: &DBSubnetGroupParameters) -> DbSubnetGroupInput {
    DbSubnetGroupInput {
        db_subnet_group_name: name,
        db_subnet_group_description: p.description.clone(),
        subnet_ids: p.subnet_ids.clone(),
        tags: tags_from_map(&tag_map(&p.tags)),
    }
}

pub struct DbSubnetGroupConnector {
    aws: AwsConnector,
}

impl DbSubnetGroupConnector {
    pub fn new(aws: AwsConnector) -> Self {
        Self { aws }
    }
}

#[async_trait]
impl ExternalConnector<DBSubnetGroup> for DbSubnetGroupConnector {
    async fn connect(
        &self,
        mg: &DBSubnetGroup,
    ) -> Result<Box<dyn ExternalClient<DBSubnetGroup>>, ExternalError> {
        let cfg = self.aws.config_for(mg, &mg.spec.for_provider.region).await?;
        Ok(Box::new(DbSubnetGroupClient {
            rds: self.aws.factory().rds(&cfg),
        }))
    }
}

pub struct DbSubnetGroupClient {
    rds: Arc<dyn RdsApi>,
}

impl DbSubnetGroupClient {
    pub fn new(rds: Arc<dyn RdsApi>) -> Self {
        Self { rds }
    }

    async fn describe(&self, name: &str) -> Result<Option<DbSubnetGroup>, ExternalError> {
        match self.rds.describe_db_subnet_group(name).await {
            Ok(g) => Ok(Some(g)),
            Err(e) if is_not_found(&e) => Ok(None),
            Err(e) => Err(ExternalError::api(ERR_DESCRIBE, e)),
        }
    }

    async fn tags(&self, arn: &str) -> Result<Vec<Tag>, ExternalError> {
        self.rds
            .list_tags_for_resource(arn)
            .await
            .map_err(|e| ExternalError::api(ERR_LIST_TAGS, e))
    }
}

#[async_trait]
impl ExternalClient<DBSubnetGroup> for DbSubnetGroupClient {
    async fn observe(
        &self,
        mg: &mut DBSubnetGroup,
    ) -> Result<ExternalObservation, ExternalError> {
        let Some(group) = self.describe(&group_name(mg)).await? else {
            return Ok(ExternalObservation::not_found());
        };
        let tags = self.tags(&group.db_subnet_group_arn).await?;

        let late_initialized = late_initialize(&mut mg.spec.for_provider, &group);
        let ready = if group.subnet_group_status == STATUS_COMPLETE {
            conditions::available()
        } else {
            conditions::unavailable()
        };
        mg.set_conditions([ready]);
        mg.status.get_or_insert_with(Default::default).at_provider =
            generate_observation(&group);

        let up_to_date = is_up_to_date(&mg.spec.for_provider, &group, &tags);
        let diff = if up_to_date {
            String::new()
        } else {
            format!(
                "description: {:?} -> {:?}\nsubnetIds: {:?} -> {:?}",
                group.db_subnet_group_description,
                mg.spec.for_provider.description,
                group.subnets.iter().map(|s| &s.subnet_id).collect::<Vec<_>>(),
                mg.spec.for_provider.subnet_ids,
            )
        };

        Ok(ExternalObservation {
            resource_exists: true,
            resource_up_to_date: up_to_date,
            resource_late_initialized: late_initialized,
            connection_details: Default::default(),
            diff,
        })
    }

    async fn create(
        &self,
        mg: &mut DBSubnetGroup,
    ) -> Result<ExternalCreation, ExternalError> {
        let name = group_name(mg);
        let group = self
            .rds
            .create_db_subnet_group(generate_input(name.clone(), &mg.spec.for_provider))
            .await
            .map_err(|e| ExternalError::api(ERR_CREATE, e))?;
        info!(name = %name, "DB subnet group created");
        mg.status.get_or_insert_with(Default::default).at_provider =
            generate_observation(&group);
        Ok(ExternalCreation::default())
    }

    async fn update(
        &self,
        mg: &mut DBSubnetGroup,
    ) -> Result<ExternalUpdate, ExternalError> {
        let name = group_name(mg);
        let group = self
            .rds
            .modify_db_subnet_group(generate_input(name, &mg.spec.for_provider))
            .await
            .map_err(|e| ExternalError::api(ERR_MODIFY, e))?;

        let observed = self.tags(&group.db_subnet_group_arn).await?;
        let tags = tag_diff(&mg.spec.for_provider, &observed);
        if !tags.remove.is_empty() {
            self.rds
                .remove_tags_from_resource(&group.db_subnet_group_arn, tags.remove)
                .await
                .map_err(|e| ExternalError::api(ERR_REMOVE_TAGS, e))?;
        }
        if !tags.add.is_empty() {
            self.rds
                .add_tags_to_resource(&group.db_subnet_group_arn, tags_from_map(&tags.add))
                .await
                .map_err(|e| ExternalError::api(ERR_ADD_TAGS, e))?;
        }
        Ok(ExternalUpdate::default())
    }

    async fn delete(&self, mg: &mut DBSubnetGroup) -> Result<(), ExternalError> {
        mg.set_conditions([conditions::deleting()]);
        match self.rds.delete_db_subnet_group(&group_name(mg)).await {
            Ok(()) => Ok(()),
            Err(e) if is_not_found(&e) => Ok(()),
            Err(e) => Err(ExternalError::api(ERR_DELETE, e)),
        }
    }
}
