//! # steps: the collection steps and their registry
//!
//! A step is a [`StepDescriptor`]: static metadata (id, declared outputs, what it
//! reads, which permission it needs) plus a [`StepHandler`] doing the work. The
//! executor orders descriptors with [`crate::executor::StepGraph`] and runs each
//! through [`execute_step`], which turns a permission failure into a
//! [`MissingPermissionEvent`] instead of aborting the run.
//!
//! Handlers write through [`add_entity`] and [`add_relationship`], which treat a
//! duplicate key or a missing endpoint as a skip, so running a step twice
//! against the same job state is harmless.

pub mod app_engine;
pub mod cloud_asset;
pub mod functions;
pub mod iam;
pub mod resource_manager;
pub mod storage;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::DateTime;
#[cfg(any(test, feature = "test-export-mocks"))]
use mockall::automock;
use serde::Serialize;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::client::GoogleHttpClient;
use crate::config::CollectorConfig;
use crate::contract::{
    AppEngineApi, CloudAssetApi, CloudFunctionsApi, EventPublisher, IamApi, JobState,
    ResourceManagerApi, StorageApi,
};
use crate::error::{JobStateError, StepError};
use crate::events::MissingPermissionEvent;
use crate::graph::{Entity, EntityDeclaration, Relationship, RelationshipClass, RelationshipDeclaration};

/// Something a step consumes from earlier steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "name", rename_all = "camelCase")]
pub enum Artifact {
    /// Entities of this type, produced by whichever step declares them.
    Entities(&'static str),
    /// A typed slot, produced by whichever step publishes it.
    Slot(&'static str),
}

#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait StepHandler: Send + Sync {
    async fn run(&self, ctx: &StepContext) -> Result<(), StepError>;
}

#[derive(Clone)]
pub struct StepDescriptor {
    pub id: &'static str,
    pub name: &'static str,
    pub entities: Vec<EntityDeclaration>,
    pub relationships: Vec<RelationshipDeclaration>,
    pub reads: Vec<Artifact>,
    /// Names of the slots this step publishes.
    pub publishes: Vec<&'static str>,
    pub depends_on: Vec<&'static str>,
    /// IAM permission reported when the step is denied; `None` for steps without API calls.
    pub permission: Option<&'static str>,
    pub handler: Arc<dyn StepHandler>,
}

impl std::fmt::Debug for StepDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StepDescriptor")
            .field("id", &self.id)
            .field("depends_on", &self.depends_on)
            .field("reads", &self.reads)
            .field("permission", &self.permission)
            .finish_non_exhaustive()
    }
}

impl StepDescriptor {
    pub fn declares_entity(&self, entity_type: &str) -> bool {
        self.entities.iter().any(|e| e.entity_type == entity_type)
    }

    pub fn publishes_slot(&self, slot: &str) -> bool {
        self.publishes.contains(&slot)
    }
}

/// One handle per Google Cloud API family.
#[derive(Clone)]
pub struct ApiClients {
    pub storage: Arc<dyn StorageApi>,
    pub iam: Arc<dyn IamApi>,
    pub resource_manager: Arc<dyn ResourceManagerApi>,
    pub app_engine: Arc<dyn AppEngineApi>,
    pub functions: Arc<dyn CloudFunctionsApi>,
    pub cloud_asset: Arc<dyn CloudAssetApi>,
}

impl ApiClients {
    /// Every family served by the same HTTP client.
    pub fn from_http(client: Arc<GoogleHttpClient>) -> Self {
        Self {
            storage: client.clone(),
            iam: client.clone(),
            resource_manager: client.clone(),
            app_engine: client.clone(),
            functions: client.clone(),
            cloud_asset: client,
        }
    }
}

/// Per-run state handed to every step.
pub struct StepContext {
    pub config: CollectorConfig,
    pub job_state: Arc<dyn JobState>,
    pub events: Arc<dyn EventPublisher>,
    pub clients: ApiClients,
    pub run_id: Uuid,
}

impl StepContext {
    pub fn new(
        config: CollectorConfig,
        job_state: Arc<dyn JobState>,
        events: Arc<dyn EventPublisher>,
        clients: ApiClients,
    ) -> Self {
        Self {
            config,
            job_state,
            events,
            clients,
            run_id: Uuid::new_v4(),
        }
    }

    pub fn project_id(&self) -> &str {
        &self.config.project_id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum StepOutcome {
    Completed,
    MissingPermission,
    Disabled,
}

/// Runs one step. A permission failure publishes one event and yields
/// `StepOutcome::MissingPermission`; any other error is returned.
pub async fn execute_step(step: &StepDescriptor, ctx: &StepContext) -> Result<StepOutcome, StepError> {
    match step.handler.run(ctx).await {
        Ok(()) => Ok(StepOutcome::Completed),
        Err(err) if err.is_permission_denied() => {
            let event = MissingPermissionEvent::new(step.id, step.permission.unwrap_or_default());
            warn!(
                step_id = step.id,
                permission = %event.permission,
                error = %err,
                "Step stopped on missing permission"
            );
            ctx.events.publish_missing_permission(event).await;
            Ok(StepOutcome::MissingPermission)
        }
        Err(err) => Err(err),
    }
}

/// Adds `entity`; `Ok(false)` when its key is already present.
pub async fn add_entity(state: &dyn JobState, entity: Entity) -> Result<bool, JobStateError> {
    match state.add_entity(entity).await {
        Ok(()) => Ok(true),
        Err(JobStateError::DuplicateKey(key)) => {
            debug!(key = %key, "Entity already collected, skipping");
            Ok(false)
        }
        Err(e) => Err(e),
    }
}

/// Adds a direct edge; `Ok(false)` when it already exists or an endpoint is missing.
pub async fn add_relationship(
    state: &dyn JobState,
    class: RelationshipClass,
    from: &Entity,
    to: &Entity,
) -> Result<bool, JobStateError> {
    match state.add_relationship(Relationship::direct(class, from, to)).await {
        Ok(()) => Ok(true),
        Err(JobStateError::DuplicateKey(key)) => {
            debug!(key = %key, "Relationship already collected, skipping");
            Ok(false)
        }
        Err(JobStateError::MissingEndpoint { relationship, missing }) => {
            debug!(key = %relationship, missing = %missing, "Relationship endpoint absent, skipping");
            Ok(false)
        }
        Err(e) => Err(e),
    }
}

/// RFC 3339 timestamp to epoch milliseconds; unparseable values are dropped.
pub(crate) fn epoch_millis(timestamp: Option<&str>) -> Option<i64> {
    let raw = timestamp?;
    match DateTime::parse_from_rfc3339(raw) {
        Ok(parsed) => Some(parsed.timestamp_millis()),
        Err(e) => {
            debug!(timestamp = raw, error = %e, "Ignoring unparseable timestamp");
            None
        }
    }
}

/// The full registry, in registration order.
pub fn all_steps() -> Vec<StepDescriptor> {
    vec![
        storage::descriptor(),
        iam::descriptor(),
        resource_manager::descriptor(),
        app_engine::application_descriptor(),
        app_engine::services_descriptor(),
        app_engine::versions_descriptor(),
        app_engine::instances_descriptor(),
        functions::descriptor(),
        functions::service_account_relationships_descriptor(),
        cloud_asset::descriptor(),
    ]
}

#[cfg(any(test, feature = "test-export-mocks"))]
pub mod test_support {
    //! Builders for step tests: mocked clients and a context over an in-memory job state.

    use super::*;
    use crate::contract::{
        MockAppEngineApi, MockCloudAssetApi, MockCloudFunctionsApi, MockEventPublisher,
        MockIamApi, MockResourceManagerApi, MockStorageApi,
    };
    use crate::events::RecordingEventPublisher;
    use crate::job_state::InMemoryJobState;

    /// Mocks for every API family; any call without an expectation panics.
    #[derive(Default)]
    pub struct MockClients {
        pub storage: MockStorageApi,
        pub iam: MockIamApi,
        pub resource_manager: MockResourceManagerApi,
        pub app_engine: MockAppEngineApi,
        pub functions: MockCloudFunctionsApi,
        pub cloud_asset: MockCloudAssetApi,
    }

    impl MockClients {
        pub fn into_clients(self) -> ApiClients {
            ApiClients {
                storage: Arc::new(self.storage),
                iam: Arc::new(self.iam),
                resource_manager: Arc::new(self.resource_manager),
                app_engine: Arc::new(self.app_engine),
                functions: Arc::new(self.functions),
                cloud_asset: Arc::new(self.cloud_asset),
            }
        }
    }

    pub struct TestRun {
        pub ctx: StepContext,
        pub state: Arc<InMemoryJobState>,
        pub events: Arc<RecordingEventPublisher<MockEventPublisher>>,
    }

    /// Context for project `my-project-1` whose events are recorded and otherwise ignored.
    pub fn test_run(clients: MockClients) -> TestRun {
        test_run_with_state(clients, Arc::new(InMemoryJobState::new()))
    }

    pub fn test_run_with_state(clients: MockClients, state: Arc<InMemoryJobState>) -> TestRun {
        let mut sink = MockEventPublisher::new();
        sink.expect_publish_missing_permission().return_const(());
        let events = Arc::new(RecordingEventPublisher::wrapping(sink));
        let ctx = StepContext::new(
            CollectorConfig::new("my-project-1"),
            state.clone(),
            events.clone(),
            clients.into_clients(),
        );
        TestRun { ctx, state, events }
    }
}
