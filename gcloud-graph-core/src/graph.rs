//! Graph model: entities (typed nodes), relationships (typed directed edges)
//! and the static declarations steps use to advertise what they produce.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A typed node keyed by the provider's natural key (resource name or email).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    #[serde(rename = "_key")]
    pub key: String,
    #[serde(rename = "_type")]
    pub entity_type: String,
    #[serde(rename = "_class")]
    pub entity_class: String,
    #[serde(flatten)]
    pub properties: Map<String, Value>,
}

impl Entity {
    pub fn new(key: impl Into<String>, entity_type: &str, entity_class: &str) -> Self {
        Self {
            key: key.into(),
            entity_type: entity_type.to_string(),
            entity_class: entity_class.to_string(),
            properties: Map::new(),
        }
    }

    pub fn with_property(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.properties.insert(name.to_string(), value.into());
        self
    }

    /// Sets the property only when a value is present; absent provider fields stay absent.
    pub fn with_optional<T: Into<Value>>(self, name: &str, value: Option<T>) -> Self {
        match value {
            Some(v) => self.with_property(name, v),
            None => self,
        }
    }

    pub fn property(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }

    pub fn property_str(&self, name: &str) -> Option<&str> {
        self.properties.get(name).and_then(Value::as_str)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RelationshipClass {
    Has,
    Uses,
    Created,
}

impl RelationshipClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationshipClass::Has => "HAS",
            RelationshipClass::Uses => "USES",
            RelationshipClass::Created => "CREATED",
        }
    }

    fn verb(&self) -> &'static str {
        match self {
            RelationshipClass::Has => "has",
            RelationshipClass::Uses => "uses",
            RelationshipClass::Created => "created",
        }
    }
}

/// Builds `{source}_{verb}_{target}`, dropping from the target the leading
/// type segments it shares with the source (at least one target segment is kept):
/// `google_app_engine_service` HAS `google_app_engine_version`
/// gives `google_app_engine_service_has_version`.
pub fn relationship_type(source_type: &str, class: RelationshipClass, target_type: &str) -> String {
    let source: Vec<&str> = source_type.split('_').collect();
    let target: Vec<&str> = target_type.split('_').collect();

    let mut shared = 0;
    while shared < source.len()
        && shared + 1 < target.len()
        && source[shared] == target[shared]
    {
        shared += 1;
    }

    format!(
        "{}_{}_{}",
        source_type,
        class.verb(),
        target[shared..].join("_")
    )
}

/// A typed directed edge between two entities, referenced by key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    #[serde(rename = "_key")]
    pub key: String,
    #[serde(rename = "_type")]
    pub relationship_type: String,
    #[serde(rename = "_class")]
    pub class: RelationshipClass,
    #[serde(rename = "_fromEntityKey")]
    pub from_key: String,
    #[serde(rename = "_toEntityKey")]
    pub to_key: String,
    #[serde(rename = "_fromEntityType")]
    pub from_type: String,
    #[serde(rename = "_toEntityType")]
    pub to_type: String,
}

impl Relationship {
    pub fn direct(class: RelationshipClass, from: &Entity, to: &Entity) -> Self {
        Self {
            key: format!(
                "{}|{}|{}",
                from.key,
                class.as_str().to_lowercase(),
                to.key
            ),
            relationship_type: relationship_type(&from.entity_type, class, &to.entity_type),
            class,
            from_key: from.key.clone(),
            to_key: to.key.clone(),
            from_type: from.entity_type.clone(),
            to_type: to.entity_type.clone(),
        }
    }
}

/// Schema metadata: an entity type a step may produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EntityDeclaration {
    pub resource_name: &'static str,
    pub entity_type: &'static str,
    pub entity_class: &'static str,
}

/// Schema metadata: a `(source type, class, target type)` edge a step may produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RelationshipDeclaration {
    pub class: RelationshipClass,
    pub source_type: &'static str,
    pub target_type: &'static str,
}

impl RelationshipDeclaration {
    pub fn relationship_type(&self) -> String {
        relationship_type(self.source_type, self.class, self.target_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relationship_type_drops_shared_prefix_from_target() {
        assert_eq!(
            relationship_type(
                "google_app_engine_service",
                RelationshipClass::Has,
                "google_app_engine_version"
            ),
            "google_app_engine_service_has_version"
        );
        assert_eq!(
            relationship_type(
                "google_app_engine_application",
                RelationshipClass::Uses,
                "google_storage_bucket"
            ),
            "google_app_engine_application_uses_storage_bucket"
        );
        assert_eq!(
            relationship_type(
                "google_cloud_function",
                RelationshipClass::Uses,
                "google_iam_service_account"
            ),
            "google_cloud_function_uses_iam_service_account"
        );
    }

    #[test]
    fn relationship_type_keeps_last_target_segment() {
        assert_eq!(
            relationship_type("google_user", RelationshipClass::Created, "google_user"),
            "google_user_created_user"
        );
    }

    #[test]
    fn direct_relationship_keys_both_endpoints() {
        let user = Entity::new("someone@example.com", "google_user", "User");
        let version = Entity::new(
            "apps/p/services/default/versions/v1",
            "google_app_engine_version",
            "Deployment",
        );
        let rel = Relationship::direct(RelationshipClass::Created, &user, &version);

        assert_eq!(
            rel.key,
            "someone@example.com|created|apps/p/services/default/versions/v1"
        );
        assert_eq!(rel.relationship_type, "google_user_created_app_engine_version");
        assert_eq!(rel.from_key, user.key);
        assert_eq!(rel.to_key, version.key);
    }

    #[test]
    fn entity_serializes_properties_flat() {
        let entity = Entity::new("b1", "google_storage_bucket", "DataStore")
            .with_property("name", "b1")
            .with_optional::<String>("location", None);
        let json = serde_json::to_value(&entity).unwrap();

        assert_eq!(json["_key"], "b1");
        assert_eq!(json["_type"], "google_storage_bucket");
        assert_eq!(json["name"], "b1");
        assert!(json.get("location").is_none());
    }
}
