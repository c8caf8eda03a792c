//! App Engine: the application, its services, their versions and the running instances.
//!
//! The application is fetched once per project and handed to the services step
//! through [`APP_ENGINE_APPLICATION`]. Versions and instances fan out over the
//! entities collected by the previous step, using the ids parsed from each
//! parent's resource name when it was created.

pub mod converters;

use std::sync::Arc;

use async_trait::async_trait;
use futures::TryStreamExt;
use tracing::{debug, info, warn};

use super::{add_entity, add_relationship, StepContext, StepDescriptor, StepHandler};
use super::iam::SERVICE_ACCOUNT_ENTITY_TYPE;
use super::resource_manager::USER_ENTITY_TYPE;
use super::storage::{bucket_key, BUCKET_ENTITY_TYPE};
use super::Artifact;
use crate::error::StepError;
use crate::graph::{Entity, EntityDeclaration, RelationshipClass, RelationshipDeclaration};
use crate::paginate::paginate;
use crate::resource_name::{ServiceName, VersionName};
use crate::slots::Slot;
use converters::{application_entity, instance_entity, service_entity, version_entity};

pub const APPLICATION_STEP_ID: &str = "fetch-app-engine-application";
pub const SERVICES_STEP_ID: &str = "fetch-app-engine-services";
pub const VERSIONS_STEP_ID: &str = "fetch-app-engine-versions";
pub const INSTANCES_STEP_ID: &str = "fetch-app-engine-instances";

pub const APPLICATION_ENTITY_TYPE: &str = "google_app_engine_application";
pub const APPLICATION_ENTITY_CLASS: &str = "Application";
pub const SERVICE_ENTITY_TYPE: &str = "google_app_engine_service";
pub const SERVICE_ENTITY_CLASS: &str = "Service";
pub const VERSION_ENTITY_TYPE: &str = "google_app_engine_version";
pub const VERSION_ENTITY_CLASS: &str = "Deployment";
pub const INSTANCE_ENTITY_TYPE: &str = "google_app_engine_instance";
pub const INSTANCE_ENTITY_CLASS: &str = "Host";

/// The project's single application entity, published by the application step.
pub const APP_ENGINE_APPLICATION: Slot<Entity> = Slot::new("app_engine_application");

pub struct FetchApplication;

#[async_trait]
impl StepHandler for FetchApplication {
    async fn run(&self, ctx: &StepContext) -> Result<(), StepError> {
        let app_id = ctx.config.app_id();
        let Some(application) = ctx.clients.app_engine.get_application(app_id).await? else {
            info!(step_id = APPLICATION_STEP_ID, app_id, "Project has no App Engine application");
            return Ok(());
        };
        let Some(entity) = application_entity(&application, ctx.project_id()) else {
            warn!(step_id = APPLICATION_STEP_ID, app_id, "Application has no name, skipping");
            return Ok(());
        };

        let state = ctx.job_state.as_ref();
        add_entity(state, entity.clone()).await?;
        APP_ENGINE_APPLICATION.publish(state, &entity).await?;

        let buckets = [
            application.default_bucket.as_deref(),
            application.code_bucket.as_deref(),
        ];
        let mut linked = 0usize;
        for bucket_name in buckets.into_iter().flatten() {
            match state.find_entity(&bucket_key(bucket_name)).await {
                Some(bucket) => {
                    if add_relationship(state, RelationshipClass::Uses, &entity, &bucket).await? {
                        linked += 1;
                    }
                }
                None => debug!(bucket = bucket_name, "Referenced bucket was not collected"),
            }
        }
        info!(step_id = APPLICATION_STEP_ID, key = %entity.key, linked_buckets = linked, "Collected App Engine application");
        Ok(())
    }
}

pub struct FetchServices;

#[async_trait]
impl StepHandler for FetchServices {
    async fn run(&self, ctx: &StepContext) -> Result<(), StepError> {
        let state = ctx.job_state.as_ref();
        let application = APP_ENGINE_APPLICATION.read(state).await?;
        if application.is_none() {
            info!(step_id = SERVICES_STEP_ID, "No App Engine application collected, services get no parent edge");
        }

        let app_id = ctx.config.app_id();
        let api = ctx.clients.app_engine.as_ref();
        let mut services = Box::pin(paginate(|token| api.list_services(app_id, token)));

        let mut count = 0usize;
        while let Some(service) = services.try_next().await? {
            let Some(entity) = service_entity(&service, ctx.project_id()) else {
                warn!(step_id = SERVICES_STEP_ID, id = ?service.id, "Skipping service without a name");
                continue;
            };
            add_entity(state, entity.clone()).await?;
            if let Some(application) = &application {
                add_relationship(state, RelationshipClass::Has, application, &entity).await?;
            }
            count += 1;
        }
        info!(step_id = SERVICES_STEP_ID, count, "Collected App Engine services");
        Ok(())
    }
}

pub struct FetchVersions;

impl FetchVersions {
    /// `createdBy` is an email, which is the key of either a user or a service account.
    async fn link_creator(ctx: &StepContext, creator: &str, version: &Entity) -> Result<(), StepError> {
        let state = ctx.job_state.as_ref();
        match state.find_entity(creator).await {
            Some(found)
                if found.entity_type == USER_ENTITY_TYPE
                    || found.entity_type == SERVICE_ACCOUNT_ENTITY_TYPE =>
            {
                add_relationship(state, RelationshipClass::Created, &found, version).await?;
            }
            _ => debug!(creator, version = %version.key, "Version creator was not collected"),
        }
        Ok(())
    }
}

#[async_trait]
impl StepHandler for FetchVersions {
    async fn run(&self, ctx: &StepContext) -> Result<(), StepError> {
        let state = ctx.job_state.as_ref();
        let api = ctx.clients.app_engine.as_ref();
        let mut count = 0usize;

        for service in state.entities_by_type(SERVICE_ENTITY_TYPE).await {
            let Some(parent) = ServiceName::from_entity(&service) else {
                warn!(step_id = VERSIONS_STEP_ID, key = %service.key, "Service has no parsed ids, skipping");
                continue;
            };

            let mut versions = Box::pin(paginate(|token| {
                api.list_versions(&parent.app_id, &parent.service_id, token)
            }));
            while let Some(version) = versions.try_next().await? {
                let Some(entity) = version_entity(&version, ctx.project_id()) else {
                    warn!(step_id = VERSIONS_STEP_ID, service = %parent, "Skipping version without a name");
                    continue;
                };
                add_entity(state, entity.clone()).await?;
                add_relationship(state, RelationshipClass::Has, &service, &entity).await?;
                if let Some(creator) = version.created_by.as_deref() {
                    Self::link_creator(ctx, creator, &entity).await?;
                }
                count += 1;
            }
        }
        info!(step_id = VERSIONS_STEP_ID, count, "Collected App Engine versions");
        Ok(())
    }
}

pub struct FetchInstances;

#[async_trait]
impl StepHandler for FetchInstances {
    async fn run(&self, ctx: &StepContext) -> Result<(), StepError> {
        let state = ctx.job_state.as_ref();
        let api = ctx.clients.app_engine.as_ref();
        let mut count = 0usize;

        for version in state.entities_by_type(VERSION_ENTITY_TYPE).await {
            let Some(parent) = VersionName::from_entity(&version) else {
                warn!(step_id = INSTANCES_STEP_ID, key = %version.key, "Version has no parsed ids, skipping");
                continue;
            };

            let mut instances = Box::pin(paginate(|token| {
                api.list_instances(&parent.app_id, &parent.service_id, &parent.version_id, token)
            }));
            while let Some(instance) = instances.try_next().await? {
                let Some(entity) = instance_entity(&instance) else {
                    warn!(step_id = INSTANCES_STEP_ID, version = %parent, "Skipping instance without a name");
                    continue;
                };
                add_entity(state, entity.clone()).await?;
                add_relationship(state, RelationshipClass::Has, &version, &entity).await?;
                count += 1;
            }
        }
        info!(step_id = INSTANCES_STEP_ID, count, "Collected App Engine instances");
        Ok(())
    }
}

pub fn application_descriptor() -> StepDescriptor {
    StepDescriptor {
        id: APPLICATION_STEP_ID,
        name: "AppEngine Application",
        entities: vec![EntityDeclaration {
            resource_name: "AppEngine Application",
            entity_type: APPLICATION_ENTITY_TYPE,
            entity_class: APPLICATION_ENTITY_CLASS,
        }],
        relationships: vec![RelationshipDeclaration {
            class: RelationshipClass::Uses,
            source_type: APPLICATION_ENTITY_TYPE,
            target_type: BUCKET_ENTITY_TYPE,
        }],
        reads: vec![Artifact::Entities(BUCKET_ENTITY_TYPE)],
        publishes: vec![APP_ENGINE_APPLICATION.name],
        depends_on: vec![super::storage::STEP_ID],
        permission: Some("appengine.applications.get"),
        handler: Arc::new(FetchApplication),
    }
}

pub fn services_descriptor() -> StepDescriptor {
    StepDescriptor {
        id: SERVICES_STEP_ID,
        name: "AppEngine Services",
        entities: vec![EntityDeclaration {
            resource_name: "AppEngine Service",
            entity_type: SERVICE_ENTITY_TYPE,
            entity_class: SERVICE_ENTITY_CLASS,
        }],
        relationships: vec![RelationshipDeclaration {
            class: RelationshipClass::Has,
            source_type: APPLICATION_ENTITY_TYPE,
            target_type: SERVICE_ENTITY_TYPE,
        }],
        reads: vec![Artifact::Slot(APP_ENGINE_APPLICATION.name)],
        publishes: vec![],
        depends_on: vec![APPLICATION_STEP_ID],
        permission: Some("appengine.services.list"),
        handler: Arc::new(FetchServices),
    }
}

pub fn versions_descriptor() -> StepDescriptor {
    StepDescriptor {
        id: VERSIONS_STEP_ID,
        name: "AppEngine Versions",
        entities: vec![EntityDeclaration {
            resource_name: "AppEngine Version",
            entity_type: VERSION_ENTITY_TYPE,
            entity_class: VERSION_ENTITY_CLASS,
        }],
        relationships: vec![
            RelationshipDeclaration {
                class: RelationshipClass::Has,
                source_type: SERVICE_ENTITY_TYPE,
                target_type: VERSION_ENTITY_TYPE,
            },
            RelationshipDeclaration {
                class: RelationshipClass::Created,
                source_type: USER_ENTITY_TYPE,
                target_type: VERSION_ENTITY_TYPE,
            },
            RelationshipDeclaration {
                class: RelationshipClass::Created,
                source_type: SERVICE_ACCOUNT_ENTITY_TYPE,
                target_type: VERSION_ENTITY_TYPE,
            },
        ],
        reads: vec![
            Artifact::Entities(SERVICE_ENTITY_TYPE),
            Artifact::Entities(USER_ENTITY_TYPE),
            Artifact::Entities(SERVICE_ACCOUNT_ENTITY_TYPE),
        ],
        publishes: vec![],
        depends_on: vec![
            SERVICES_STEP_ID,
            super::resource_manager::STEP_ID,
            super::iam::STEP_ID,
        ],
        permission: Some("appengine.versions.list"),
        handler: Arc::new(FetchVersions),
    }
}

pub fn instances_descriptor() -> StepDescriptor {
    StepDescriptor {
        id: INSTANCES_STEP_ID,
        name: "AppEngine Instances",
        entities: vec![EntityDeclaration {
            resource_name: "AppEngine Instance",
            entity_type: INSTANCE_ENTITY_TYPE,
            entity_class: INSTANCE_ENTITY_CLASS,
        }],
        relationships: vec![RelationshipDeclaration {
            class: RelationshipClass::Has,
            source_type: VERSION_ENTITY_TYPE,
            target_type: INSTANCE_ENTITY_TYPE,
        }],
        reads: vec![Artifact::Entities(VERSION_ENTITY_TYPE)],
        publishes: vec![],
        depends_on: vec![VERSIONS_STEP_ID],
        permission: Some("appengine.instances.list"),
        handler: Arc::new(FetchInstances),
    }
}
