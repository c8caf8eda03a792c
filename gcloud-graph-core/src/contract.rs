//! # contract: the seams between steps and the outside world
//!
//! Steps never talk to reqwest, to a concrete store or to a concrete event sink.
//! They go through the traits below:
//!
//! - one trait per Google Cloud API family (`StorageApi`, `IamApi`,
//!   `ResourceManagerApi`, `AppEngineApi`, `CloudFunctionsApi`, `CloudAssetApi`),
//!   each method fetching a single page; [`crate::paginate::paginate`] walks the
//!   continuation tokens;
//! - [`JobState`], the per-run entity/relationship store;
//! - [`EventPublisher`], the sink for missing-permission events.
//!
//! ## Mocking & Testing
//! The API traits and the event publisher are annotated for `mockall`; the mocks
//! are exported under the default `test-export-mocks` feature so integration
//! tests can use them.
//!
//! ## Errors
//! API methods return [`ApiError`]. A 403 surfaces as
//! `ApiError::PermissionDenied` and is never retried.

use async_trait::async_trait;
#[cfg(any(test, feature = "test-export-mocks"))]
use mockall::automock;

use crate::error::{ApiError, JobStateError};
use crate::events::MissingPermissionEvent;
use crate::graph::{Entity, Relationship};
use crate::records::{
    Application, Bucket, CloudFunction, IamPolicySearchResult, Instance, Policy, Service,
    ServiceAccount, Version,
};

/// One page of a list response.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Opaque continuation token; `None` or empty means this was the last page.
    pub next_page_token: Option<String>,
}

impl<T> Page<T> {
    pub fn last(items: Vec<T>) -> Self {
        Self {
            items,
            next_page_token: None,
        }
    }

    pub fn with_next(items: Vec<T>, token: impl Into<String>) -> Self {
        Self {
            items,
            next_page_token: Some(token.into()),
        }
    }
}

#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait StorageApi: Send + Sync {
    async fn list_buckets(
        &self,
        project_id: &str,
        page_token: Option<String>,
    ) -> Result<Page<Bucket>, ApiError>;
}

#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait IamApi: Send + Sync {
    async fn list_service_accounts(
        &self,
        project_id: &str,
        page_token: Option<String>,
    ) -> Result<Page<ServiceAccount>, ApiError>;
}

#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait ResourceManagerApi: Send + Sync {
    async fn get_project_iam_policy(&self, project_id: &str) -> Result<Policy, ApiError>;
}

#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait AppEngineApi: Send + Sync {
    /// `Ok(None)` when the project has no App Engine application.
    async fn get_application(&self, app_id: &str) -> Result<Option<Application>, ApiError>;

    async fn list_services(
        &self,
        app_id: &str,
        page_token: Option<String>,
    ) -> Result<Page<Service>, ApiError>;

    async fn list_versions(
        &self,
        app_id: &str,
        service_id: &str,
        page_token: Option<String>,
    ) -> Result<Page<Version>, ApiError>;

    async fn list_instances(
        &self,
        app_id: &str,
        service_id: &str,
        version_id: &str,
        page_token: Option<String>,
    ) -> Result<Page<Instance>, ApiError>;
}

#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait CloudFunctionsApi: Send + Sync {
    async fn list_functions(
        &self,
        project_id: &str,
        page_token: Option<String>,
    ) -> Result<Page<CloudFunction>, ApiError>;
}

#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait CloudAssetApi: Send + Sync {
    async fn search_all_iam_policies(
        &self,
        project_id: &str,
        page_token: Option<String>,
    ) -> Result<Page<IamPolicySearchResult>, ApiError>;
}

/// Sink for the structured "missing permission" notification.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish_missing_permission(&self, event: MissingPermissionEvent);
}

/// Per-run store of entities and relationships.
///
/// Keys are unique across entities and relationships: a second add with the
/// same key is rejected with [`JobStateError::DuplicateKey`]. Relationships are
/// only accepted when both endpoints are already present.
#[async_trait]
pub trait JobState: Send + Sync {
    async fn add_entity(&self, entity: Entity) -> Result<(), JobStateError>;

    async fn add_relationship(&self, relationship: Relationship) -> Result<(), JobStateError>;

    async fn find_entity(&self, key: &str) -> Option<Entity>;

    async fn has_key(&self, key: &str) -> bool;

    /// Snapshot of all entities of `entity_type`, in insertion order.
    async fn entities_by_type(&self, entity_type: &str) -> Vec<Entity>;

    async fn relationships_by_type(&self, relationship_type: &str) -> Vec<Relationship>;

    /// Raw storage behind [`crate::slots::Slot`]; use the typed wrapper instead.
    async fn set_slot(&self, slot: &str, value: serde_json::Value);

    async fn get_slot(&self, slot: &str) -> Option<serde_json::Value>;
}
