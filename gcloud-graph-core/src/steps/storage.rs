//! Cloud Storage buckets.

use std::sync::Arc;

use async_trait::async_trait;
use futures::TryStreamExt;
use tracing::{info, warn};

use super::{add_entity, epoch_millis, StepContext, StepDescriptor, StepHandler};
use crate::error::StepError;
use crate::graph::{Entity, EntityDeclaration};
use crate::paginate::paginate;
use crate::records::Bucket;

pub const STEP_ID: &str = "fetch-storage-buckets";
pub const BUCKET_ENTITY_TYPE: &str = "google_storage_bucket";
pub const BUCKET_ENTITY_CLASS: &str = "DataStore";

/// Buckets are keyed by name, which is what App Engine's `defaultBucket` and
/// `codeBucket` refer to.
pub fn bucket_key(name: &str) -> String {
    name.to_string()
}

pub fn bucket_entity(bucket: &Bucket) -> Option<Entity> {
    let name = bucket.name.as_deref()?;
    let versioning = bucket.versioning.as_ref().and_then(|v| v.enabled);
    let uniform_access = bucket
        .iam_configuration
        .as_ref()
        .and_then(|c| c.uniform_bucket_level_access.as_ref())
        .and_then(|u| u.enabled);

    let mut entity = Entity::new(bucket_key(name), BUCKET_ENTITY_TYPE, BUCKET_ENTITY_CLASS)
        .with_property("name", name)
        .with_property("displayName", name)
        .with_optional("id", bucket.id.clone())
        .with_optional("selfLink", bucket.self_link.clone())
        .with_optional("projectNumber", bucket.project_number.clone())
        .with_optional("location", bucket.location.clone())
        .with_optional("storageClass", bucket.storage_class.clone())
        .with_optional("createdOn", epoch_millis(bucket.time_created.as_deref()))
        .with_optional("updatedOn", epoch_millis(bucket.updated.as_deref()))
        .with_optional("versioningEnabled", versioning)
        .with_optional("uniformBucketLevelAccess", uniform_access)
        .with_property(
            "webLink",
            format!("https://console.cloud.google.com/storage/browser/{name}"),
        );
    for (label, value) in &bucket.labels {
        entity = entity.with_property(&format!("label.{label}"), value.as_str());
    }
    Some(entity)
}

pub struct FetchStorageBuckets;

#[async_trait]
impl StepHandler for FetchStorageBuckets {
    async fn run(&self, ctx: &StepContext) -> Result<(), StepError> {
        let project_id = ctx.project_id();
        let api = ctx.clients.storage.as_ref();
        let mut buckets = Box::pin(paginate(|token| api.list_buckets(project_id, token)));

        let mut count = 0usize;
        while let Some(bucket) = buckets.try_next().await? {
            match bucket_entity(&bucket) {
                Some(entity) => {
                    if add_entity(ctx.job_state.as_ref(), entity).await? {
                        count += 1;
                    }
                }
                None => warn!(step_id = STEP_ID, bucket_id = ?bucket.id, "Skipping bucket without a name"),
            }
        }
        info!(step_id = STEP_ID, count, "Collected storage buckets");
        Ok(())
    }
}

pub fn descriptor() -> StepDescriptor {
    StepDescriptor {
        id: STEP_ID,
        name: "Cloud Storage Buckets",
        entities: vec![EntityDeclaration {
            resource_name: "Cloud Storage Bucket",
            entity_type: BUCKET_ENTITY_TYPE,
            entity_class: BUCKET_ENTITY_CLASS,
        }],
        relationships: vec![],
        reads: vec![],
        publishes: vec![],
        depends_on: vec![],
        permission: Some("storage.buckets.list"),
        handler: Arc::new(FetchStorageBuckets),
    }
}
