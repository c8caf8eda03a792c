//! Cloud Functions and the service account each function runs as.

use std::sync::Arc;

use async_trait::async_trait;
use futures::TryStreamExt;
use tracing::{debug, info, warn};

use super::iam::{STEP_ID as SERVICE_ACCOUNTS_STEP_ID, SERVICE_ACCOUNT_ENTITY_TYPE};
use super::{add_entity, add_relationship, epoch_millis, Artifact, StepContext, StepDescriptor, StepHandler};
use crate::error::StepError;
use crate::graph::{Entity, EntityDeclaration, RelationshipClass, RelationshipDeclaration};
use crate::paginate::paginate;
use crate::records::CloudFunction;
use crate::resource_name::FunctionName;

pub const STEP_ID: &str = "fetch-cloud-functions";
pub const SERVICE_ACCOUNT_RELATIONSHIPS_STEP_ID: &str =
    "build-cloud-function-service-account-relationships";
pub const FUNCTION_ENTITY_TYPE: &str = "google_cloud_function";
pub const FUNCTION_ENTITY_CLASS: &str = "Function";

pub fn function_entity(function: &CloudFunction) -> Option<Entity> {
    let name = function.name.as_deref()?;
    let mut entity = Entity::new(name, FUNCTION_ENTITY_TYPE, FUNCTION_ENTITY_CLASS)
        .with_property("name", name)
        .with_optional("description", function.description.clone())
        .with_optional("status", function.status.clone())
        .with_optional("entryPoint", function.entry_point.clone())
        .with_optional("runtime", function.runtime.clone())
        .with_optional("timeout", function.timeout.clone())
        .with_optional("availableMemoryMb", function.available_memory_mb)
        .with_optional("serviceAccountEmail", function.service_account_email.clone())
        .with_optional("updatedOn", epoch_millis(function.update_time.as_deref()))
        .with_optional("versionId", function.version_id.clone())
        .with_optional("ingressSettings", function.ingress_settings.clone())
        .with_optional("sourceArchiveUrl", function.source_archive_url.clone())
        .with_optional(
            "httpsTrigger",
            function.https_trigger.as_ref().and_then(|t| t.url.clone()),
        )
        .with_optional(
            "eventTriggerType",
            function.event_trigger.as_ref().and_then(|t| t.event_type.clone()),
        )
        .with_optional(
            "eventTriggerResource",
            function.event_trigger.as_ref().and_then(|t| t.resource.clone()),
        )
        .with_property("trigger", if function.https_trigger.is_some() { "HTTP" } else { "EVENT" });

    match FunctionName::parse(name) {
        Ok(parsed) => {
            entity = entity
                .with_property("displayName", parsed.function_id.as_str())
                .with_property("location", parsed.location.as_str())
                .with_property(
                    "webLink",
                    format!(
                        "https://console.cloud.google.com/functions/details/{}/{}?project={}",
                        parsed.location, parsed.function_id, parsed.project_id
                    ),
                );
        }
        Err(e) => {
            warn!(error = %e, "Function name did not parse");
            entity = entity.with_property("displayName", name);
        }
    }
    for (label, value) in &function.labels {
        entity = entity.with_property(&format!("label.{label}"), value.as_str());
    }
    Some(entity)
}

pub struct FetchCloudFunctions;

#[async_trait]
impl StepHandler for FetchCloudFunctions {
    async fn run(&self, ctx: &StepContext) -> Result<(), StepError> {
        let project_id = ctx.project_id();
        let api = ctx.clients.functions.as_ref();
        let mut functions = Box::pin(paginate(|token| api.list_functions(project_id, token)));

        let mut count = 0usize;
        while let Some(function) = functions.try_next().await? {
            let Some(entity) = function_entity(&function) else {
                warn!(step_id = STEP_ID, "Skipping function without a name");
                continue;
            };
            if add_entity(ctx.job_state.as_ref(), entity).await? {
                count += 1;
            }
        }
        info!(step_id = STEP_ID, count, "Collected Cloud Functions");
        Ok(())
    }
}

/// Links functions to their runtime service account. No API calls.
pub struct BuildServiceAccountRelationships;

#[async_trait]
impl StepHandler for BuildServiceAccountRelationships {
    async fn run(&self, ctx: &StepContext) -> Result<(), StepError> {
        let state = ctx.job_state.as_ref();
        let mut linked = 0usize;

        for function in state.entities_by_type(FUNCTION_ENTITY_TYPE).await {
            let Some(email) = function.property_str("serviceAccountEmail") else {
                continue;
            };
            let Some(account) = state.find_entity(email).await else {
                debug!(function = %function.key, email, "Function service account was not collected");
                continue;
            };
            if add_relationship(state, RelationshipClass::Uses, &function, &account).await? {
                linked += 1;
            }
        }
        info!(step_id = SERVICE_ACCOUNT_RELATIONSHIPS_STEP_ID, linked, "Linked functions to service accounts");
        Ok(())
    }
}

pub fn descriptor() -> StepDescriptor {
    StepDescriptor {
        id: STEP_ID,
        name: "Cloud Functions",
        entities: vec![EntityDeclaration {
            resource_name: "Cloud Function",
            entity_type: FUNCTION_ENTITY_TYPE,
            entity_class: FUNCTION_ENTITY_CLASS,
        }],
        relationships: vec![],
        reads: vec![],
        publishes: vec![],
        depends_on: vec![],
        permission: Some("cloudfunctions.functions.list"),
        handler: Arc::new(FetchCloudFunctions),
    }
}

pub fn service_account_relationships_descriptor() -> StepDescriptor {
    StepDescriptor {
        id: SERVICE_ACCOUNT_RELATIONSHIPS_STEP_ID,
        name: "Cloud Function Service Account Relationships",
        entities: vec![],
        relationships: vec![RelationshipDeclaration {
            class: RelationshipClass::Uses,
            source_type: FUNCTION_ENTITY_TYPE,
            target_type: SERVICE_ACCOUNT_ENTITY_TYPE,
        }],
        reads: vec![
            Artifact::Entities(FUNCTION_ENTITY_TYPE),
            Artifact::Entities(SERVICE_ACCOUNT_ENTITY_TYPE),
        ],
        publishes: vec![],
        depends_on: vec![STEP_ID, SERVICE_ACCOUNTS_STEP_ID],
        permission: None,
        handler: Arc::new(BuildServiceAccountRelationships),
    }
}
