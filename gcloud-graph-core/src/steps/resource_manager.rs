//! Project IAM policy: every `user:` member becomes a `google_user`.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use super::{add_entity, StepContext, StepDescriptor, StepHandler};
use crate::error::StepError;
use crate::graph::{Entity, EntityDeclaration};
use crate::records::Policy;

pub const STEP_ID: &str = "fetch-resource-manager-iam-policy";
pub const USER_ENTITY_TYPE: &str = "google_user";
pub const USER_ENTITY_CLASS: &str = "User";

const USER_MEMBER_PREFIX: &str = "user:";

/// Emails of `user:` members across all bindings, first occurrence order, deduplicated.
pub fn user_emails(policy: &Policy) -> Vec<&str> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut emails: Vec<&str> = Vec::new();
    for member in policy.bindings.iter().flat_map(|b| b.members.iter()) {
        if let Some(email) = member.strip_prefix(USER_MEMBER_PREFIX) {
            if !email.is_empty() && seen.insert(email) {
                emails.push(email);
            }
        }
    }
    emails
}

pub fn user_entity(email: &str) -> Entity {
    Entity::new(email, USER_ENTITY_TYPE, USER_ENTITY_CLASS)
        .with_property("email", email)
        .with_property("username", email)
        .with_property("displayName", email)
}

pub struct FetchResourceManagerIamPolicy;

#[async_trait]
impl StepHandler for FetchResourceManagerIamPolicy {
    async fn run(&self, ctx: &StepContext) -> Result<(), StepError> {
        let policy = ctx
            .clients
            .resource_manager
            .get_project_iam_policy(ctx.project_id())
            .await?;

        let mut count = 0usize;
        for email in user_emails(&policy) {
            if add_entity(ctx.job_state.as_ref(), user_entity(email)).await? {
                count += 1;
            }
        }
        info!(
            step_id = STEP_ID,
            bindings = policy.bindings.len(),
            count,
            "Collected users from project IAM policy"
        );
        Ok(())
    }
}

pub fn descriptor() -> StepDescriptor {
    StepDescriptor {
        id: STEP_ID,
        name: "Resource Manager IAM Policy",
        entities: vec![EntityDeclaration {
            resource_name: "Google User",
            entity_type: USER_ENTITY_TYPE,
            entity_class: USER_ENTITY_CLASS,
        }],
        relationships: vec![],
        reads: vec![],
        publishes: vec![],
        depends_on: vec![],
        permission: Some("resourcemanager.projects.getIamPolicy"),
        handler: Arc::new(FetchResourceManagerIamPolicy),
    }
}
