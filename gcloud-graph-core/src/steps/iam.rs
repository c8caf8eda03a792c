//! IAM service accounts, keyed by email so other steps can find them from a
//! `createdBy` or `serviceAccountEmail` field.

use std::sync::Arc;

use async_trait::async_trait;
use futures::TryStreamExt;
use tracing::{info, warn};

use super::{add_entity, StepContext, StepDescriptor, StepHandler};
use crate::error::StepError;
use crate::graph::{Entity, EntityDeclaration};
use crate::paginate::paginate;
use crate::records::ServiceAccount;

pub const STEP_ID: &str = "fetch-iam-service-accounts";
pub const SERVICE_ACCOUNT_ENTITY_TYPE: &str = "google_iam_service_account";
pub const SERVICE_ACCOUNT_ENTITY_CLASS: &str = "User";

pub fn service_account_entity(account: &ServiceAccount) -> Option<Entity> {
    let email = account.email.as_deref()?;
    let display_name = account.display_name.as_deref().unwrap_or(email);
    let entity = Entity::new(email, SERVICE_ACCOUNT_ENTITY_TYPE, SERVICE_ACCOUNT_ENTITY_CLASS)
        .with_property("email", email)
        .with_property("displayName", display_name)
        .with_optional("name", account.name.clone())
        .with_optional("projectId", account.project_id.clone())
        .with_optional("uniqueId", account.unique_id.clone())
        .with_optional("description", account.description.clone())
        .with_optional("oauth2ClientId", account.oauth2_client_id.clone())
        .with_property("enabled", !account.disabled.unwrap_or(false));
    Some(entity)
}

pub struct FetchIamServiceAccounts;

#[async_trait]
impl StepHandler for FetchIamServiceAccounts {
    async fn run(&self, ctx: &StepContext) -> Result<(), StepError> {
        let project_id = ctx.project_id();
        let api = ctx.clients.iam.as_ref();
        let mut accounts = Box::pin(paginate(|token| api.list_service_accounts(project_id, token)));

        let mut count = 0usize;
        while let Some(account) = accounts.try_next().await? {
            let Some(entity) = service_account_entity(&account) else {
                warn!(step_id = STEP_ID, name = ?account.name, "Skipping service account without an email");
                continue;
            };
            if add_entity(ctx.job_state.as_ref(), entity).await? {
                count += 1;
            }
        }
        info!(step_id = STEP_ID, count, "Collected IAM service accounts");
        Ok(())
    }
}

pub fn descriptor() -> StepDescriptor {
    StepDescriptor {
        id: STEP_ID,
        name: "Identity and Access Management (IAM) Service Accounts",
        entities: vec![EntityDeclaration {
            resource_name: "IAM Service Account",
            entity_type: SERVICE_ACCOUNT_ENTITY_TYPE,
            entity_class: SERVICE_ACCOUNT_ENTITY_CLASS,
        }],
        relationships: vec![],
        reads: vec![],
        publishes: vec![],
        depends_on: vec![],
        permission: Some("iam.serviceAccounts.list"),
        handler: Arc::new(FetchIamServiceAccounts),
    }
}
