//! IAM policy bindings on every resource in the project, via Cloud Asset search.

use std::sync::Arc;

use async_trait::async_trait;
use futures::TryStreamExt;
use sha2::{Digest, Sha256};
use tracing::info;

use super::{add_entity, StepContext, StepDescriptor, StepHandler};
use crate::error::StepError;
use crate::graph::{Entity, EntityDeclaration};
use crate::paginate::paginate;
use crate::records::Binding;

pub const STEP_ID: &str = "fetch-iam-bindings";
pub const BINDING_ENTITY_TYPE: &str = "google_iam_binding";
pub const BINDING_ENTITY_CLASS: &str = "AccessPolicy";

/// Stable key for a binding: the role and resource stay readable, the member
/// list and condition are hashed (members sorted, so order does not matter).
pub fn binding_key(binding: &Binding, resource: Option<&str>) -> String {
    let mut members: Vec<&str> = binding.members.iter().map(String::as_str).collect();
    members.sort_unstable();

    let mut hasher = Sha256::new();
    for member in &members {
        hasher.update(member.as_bytes());
        hasher.update(b"\n");
    }
    if let Some(condition) = &binding.condition {
        hasher.update(condition.expression.as_deref().unwrap_or_default().as_bytes());
        hasher.update(condition.title.as_deref().unwrap_or_default().as_bytes());
    }
    format!(
        "{}_{}_{:x}",
        resource.unwrap_or("unknown"),
        binding.role.as_deref().unwrap_or("unknown"),
        hasher.finalize()
    )
}

pub fn binding_entity(binding: &Binding, project: Option<&str>, resource: Option<&str>) -> Entity {
    let role = binding.role.as_deref().unwrap_or("unknown");
    let condition = binding.condition.as_ref();
    Entity::new(binding_key(binding, resource), BINDING_ENTITY_TYPE, BINDING_ENTITY_CLASS)
        .with_property("displayName", role)
        .with_property("role", role)
        .with_property("members", binding.members.clone())
        .with_optional("resource", resource)
        .with_optional("projectId", project)
        .with_optional("conditionTitle", condition.and_then(|c| c.title.clone()))
        .with_optional("conditionExpression", condition.and_then(|c| c.expression.clone()))
        .with_optional("conditionDescription", condition.and_then(|c| c.description.clone()))
}

pub struct FetchIamBindings;

#[async_trait]
impl StepHandler for FetchIamBindings {
    async fn run(&self, ctx: &StepContext) -> Result<(), StepError> {
        let project_id = ctx.project_id();
        let api = ctx.clients.cloud_asset.as_ref();
        let mut results = Box::pin(paginate(|token| api.search_all_iam_policies(project_id, token)));

        let mut count = 0usize;
        while let Some(result) = results.try_next().await? {
            let bindings = result.policy.as_ref().map(|p| p.bindings.as_slice()).unwrap_or_default();
            for binding in bindings {
                let entity = binding_entity(binding, result.project.as_deref(), result.resource.as_deref());
                if add_entity(ctx.job_state.as_ref(), entity).await? {
                    count += 1;
                }
            }
        }
        info!(step_id = STEP_ID, count, "Created IAM binding entities");
        Ok(())
    }
}

pub fn descriptor() -> StepDescriptor {
    StepDescriptor {
        id: STEP_ID,
        name: "IAM Bindings",
        entities: vec![EntityDeclaration {
            resource_name: "IAM Binding",
            entity_type: BINDING_ENTITY_TYPE,
            entity_class: BINDING_ENTITY_CLASS,
        }],
        relationships: vec![],
        reads: vec![],
        publishes: vec![],
        depends_on: vec![],
        permission: Some("cloudasset.assets.searchAllIamPolicies"),
        handler: Arc::new(FetchIamBindings),
    }
}
