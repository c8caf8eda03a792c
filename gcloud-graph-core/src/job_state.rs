//! In-memory [`JobState`] used by the CLI and the tests.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::trace;

use crate::contract::JobState;
use crate::error::JobStateError;
use crate::graph::{Entity, Relationship};

/// The collected graph, as written by the CLI.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphDocument {
    pub entities: Vec<Entity>,
    pub relationships: Vec<Relationship>,
}

#[derive(Default)]
struct Inner {
    keys: HashSet<String>,
    entities: Vec<Entity>,
    entity_index: HashMap<String, usize>,
    relationships: Vec<Relationship>,
    slots: HashMap<String, Value>,
}

#[derive(Default)]
pub struct InMemoryJobState {
    inner: RwLock<Inner>,
}

impl InMemoryJobState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entity_count(&self) -> usize {
        self.inner.read().entities.len()
    }

    pub fn relationship_count(&self) -> usize {
        self.inner.read().relationships.len()
    }

    pub fn relationships(&self) -> Vec<Relationship> {
        self.inner.read().relationships.clone()
    }

    pub fn to_document(&self) -> GraphDocument {
        let inner = self.inner.read();
        GraphDocument {
            entities: inner.entities.clone(),
            relationships: inner.relationships.clone(),
        }
    }
}

#[async_trait]
impl JobState for InMemoryJobState {
    async fn add_entity(&self, entity: Entity) -> Result<(), JobStateError> {
        let mut inner = self.inner.write();
        if !inner.keys.insert(entity.key.clone()) {
            return Err(JobStateError::DuplicateKey(entity.key));
        }
        trace!(key = %entity.key, entity_type = %entity.entity_type, "Added entity");
        let position = inner.entities.len();
        inner.entity_index.insert(entity.key.clone(), position);
        inner.entities.push(entity);
        Ok(())
    }

    async fn add_relationship(&self, relationship: Relationship) -> Result<(), JobStateError> {
        let mut inner = self.inner.write();
        for endpoint in [&relationship.from_key, &relationship.to_key] {
            if !inner.entity_index.contains_key(endpoint) {
                return Err(JobStateError::MissingEndpoint {
                    relationship: relationship.key.clone(),
                    missing: endpoint.clone(),
                });
            }
        }
        if !inner.keys.insert(relationship.key.clone()) {
            return Err(JobStateError::DuplicateKey(relationship.key));
        }
        trace!(key = %relationship.key, relationship_type = %relationship.relationship_type, "Added relationship");
        inner.relationships.push(relationship);
        Ok(())
    }

    async fn find_entity(&self, key: &str) -> Option<Entity> {
        let inner = self.inner.read();
        inner
            .entity_index
            .get(key)
            .map(|&position| inner.entities[position].clone())
    }

    async fn has_key(&self, key: &str) -> bool {
        self.inner.read().keys.contains(key)
    }

    async fn entities_by_type(&self, entity_type: &str) -> Vec<Entity> {
        self.inner
            .read()
            .entities
            .iter()
            .filter(|e| e.entity_type == entity_type)
            .cloned()
            .collect()
    }

    async fn relationships_by_type(&self, relationship_type: &str) -> Vec<Relationship> {
        self.inner
            .read()
            .relationships
            .iter()
            .filter(|r| r.relationship_type == relationship_type)
            .cloned()
            .collect()
    }

    async fn set_slot(&self, slot: &str, value: Value) {
        self.inner.write().slots.insert(slot.to_string(), value);
    }

    async fn get_slot(&self, slot: &str) -> Option<Value> {
        self.inner.read().slots.get(slot).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::RelationshipClass;

    fn bucket(key: &str) -> Entity {
        Entity::new(key, "google_storage_bucket", "DataStore")
    }

    #[tokio::test]
    async fn rejects_duplicate_entity_keys() {
        let state = InMemoryJobState::new();
        state.add_entity(bucket("b1")).await.unwrap();

        let err = state.add_entity(bucket("b1")).await.unwrap_err();
        assert_eq!(err, JobStateError::DuplicateKey("b1".to_string()));
        assert_eq!(state.entity_count(), 1);
    }

    #[tokio::test]
    async fn rejects_relationship_with_missing_endpoint() {
        let state = InMemoryJobState::new();
        let app = Entity::new("apps/p", "google_app_engine_application", "Application");
        state.add_entity(app.clone()).await.unwrap();

        let rel = Relationship::direct(RelationshipClass::Uses, &app, &bucket("b1"));
        let err = state.add_relationship(rel).await.unwrap_err();

        assert_eq!(
            err,
            JobStateError::MissingEndpoint {
                relationship: "apps/p|uses|b1".to_string(),
                missing: "b1".to_string(),
            }
        );
        assert_eq!(state.relationship_count(), 0);
    }

    #[tokio::test]
    async fn iterates_by_type_in_insertion_order() {
        let state = InMemoryJobState::new();
        for key in ["b2", "b1", "b3"] {
            state.add_entity(bucket(key)).await.unwrap();
        }
        state
            .add_entity(Entity::new("sa@p.iam", "google_iam_service_account", "User"))
            .await
            .unwrap();

        let keys: Vec<String> = state
            .entities_by_type("google_storage_bucket")
            .await
            .into_iter()
            .map(|e| e.key)
            .collect();
        assert_eq!(keys, vec!["b2", "b1", "b3"]);
        assert!(state.entities_by_type("google_user").await.is_empty());
    }

    #[tokio::test]
    async fn finds_entities_and_relationships() {
        let state = InMemoryJobState::new();
        let app = Entity::new("apps/p", "google_app_engine_application", "Application");
        state.add_entity(app.clone()).await.unwrap();
        state.add_entity(bucket("b1")).await.unwrap();
        state
            .add_relationship(Relationship::direct(
                RelationshipClass::Uses,
                &app,
                &bucket("b1"),
            ))
            .await
            .unwrap();

        assert_eq!(state.find_entity("b1").await, Some(bucket("b1")));
        assert!(state.find_entity("b2").await.is_none());
        assert!(state.has_key("apps/p|uses|b1").await);
        assert_eq!(
            state
                .relationships_by_type("google_app_engine_application_uses_storage_bucket")
                .await
                .len(),
            1
        );
        let doc = state.to_document();
        assert_eq!(doc.entities.len(), 2);
        assert_eq!(doc.relationships.len(), 1);
    }
}
