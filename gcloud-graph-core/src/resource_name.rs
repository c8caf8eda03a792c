//! Structured identifiers for hierarchical Google Cloud resource names.
//!
//! Names such as `apps/my-app/services/default/versions/v1` are parsed once, when
//! the entity is created, and the components are stored on the entity as
//! attributes (`appId`, `serviceId`, `versionId`). Fan-out steps read those
//! attributes back with `from_entity` instead of re-splitting the name.

use std::fmt;

use crate::error::ResourceNameError;
use crate::graph::Entity;

pub const APP_ID: &str = "appId";
pub const SERVICE_ID: &str = "serviceId";
pub const VERSION_ID: &str = "versionId";
pub const INSTANCE_ID: &str = "instanceId";

/// Splits `name` into ids, checking that the collection segments appear in order.
fn parse_ids(name: &str, collections: &[&str]) -> Result<Vec<String>, ResourceNameError> {
    let segments: Vec<&str> = name.split('/').collect();
    if segments.len() != collections.len() * 2 {
        return Err(ResourceNameError {
            name: name.to_string(),
            reason: format!(
                "expected {} segments, found {}",
                collections.len() * 2,
                segments.len()
            ),
        });
    }

    let mut ids = Vec::with_capacity(collections.len());
    for (pair, expected) in segments.chunks(2).zip(collections) {
        if pair[0] != *expected {
            return Err(ResourceNameError {
                name: name.to_string(),
                reason: format!("expected collection {expected:?}, found {:?}", pair[0]),
            });
        }
        if pair[1].is_empty() {
            return Err(ResourceNameError {
                name: name.to_string(),
                reason: format!("empty id for collection {expected:?}"),
            });
        }
        ids.push(pair[1].to_string());
    }
    Ok(ids)
}

/// `apps/{app}/services/{service}`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceName {
    pub app_id: String,
    pub service_id: String,
}

impl ServiceName {
    pub fn parse(name: &str) -> Result<Self, ResourceNameError> {
        let mut ids = parse_ids(name, &["apps", "services"])?.into_iter();
        Ok(Self {
            app_id: ids.next().unwrap_or_default(),
            service_id: ids.next().unwrap_or_default(),
        })
    }

    pub fn annotate(&self, entity: Entity) -> Entity {
        entity
            .with_property(APP_ID, self.app_id.as_str())
            .with_property(SERVICE_ID, self.service_id.as_str())
    }

    pub fn from_entity(entity: &Entity) -> Option<Self> {
        Some(Self {
            app_id: entity.property_str(APP_ID)?.to_string(),
            service_id: entity.property_str(SERVICE_ID)?.to_string(),
        })
    }
}

impl fmt::Display for ServiceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "apps/{}/services/{}", self.app_id, self.service_id)
    }
}

/// `apps/{app}/services/{service}/versions/{version}`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionName {
    pub app_id: String,
    pub service_id: String,
    pub version_id: String,
}

impl VersionName {
    pub fn parse(name: &str) -> Result<Self, ResourceNameError> {
        let mut ids = parse_ids(name, &["apps", "services", "versions"])?.into_iter();
        Ok(Self {
            app_id: ids.next().unwrap_or_default(),
            service_id: ids.next().unwrap_or_default(),
            version_id: ids.next().unwrap_or_default(),
        })
    }

    pub fn annotate(&self, entity: Entity) -> Entity {
        entity
            .with_property(APP_ID, self.app_id.as_str())
            .with_property(SERVICE_ID, self.service_id.as_str())
            .with_property(VERSION_ID, self.version_id.as_str())
    }

    pub fn from_entity(entity: &Entity) -> Option<Self> {
        Some(Self {
            app_id: entity.property_str(APP_ID)?.to_string(),
            service_id: entity.property_str(SERVICE_ID)?.to_string(),
            version_id: entity.property_str(VERSION_ID)?.to_string(),
        })
    }
}

impl fmt::Display for VersionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "apps/{}/services/{}/versions/{}",
            self.app_id, self.service_id, self.version_id
        )
    }
}

/// `apps/{app}/services/{service}/versions/{version}/instances/{instance}`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceName {
    pub version: VersionName,
    pub instance_id: String,
}

impl InstanceName {
    pub fn parse(name: &str) -> Result<Self, ResourceNameError> {
        let mut ids =
            parse_ids(name, &["apps", "services", "versions", "instances"])?.into_iter();
        Ok(Self {
            version: VersionName {
                app_id: ids.next().unwrap_or_default(),
                service_id: ids.next().unwrap_or_default(),
                version_id: ids.next().unwrap_or_default(),
            },
            instance_id: ids.next().unwrap_or_default(),
        })
    }

    pub fn annotate(&self, entity: Entity) -> Entity {
        self.version
            .annotate(entity)
            .with_property(INSTANCE_ID, self.instance_id.as_str())
    }
}

/// `projects/{project}/locations/{location}/functions/{function}`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionName {
    pub project_id: String,
    pub location: String,
    pub function_id: String,
}

impl FunctionName {
    pub fn parse(name: &str) -> Result<Self, ResourceNameError> {
        let mut ids = parse_ids(name, &["projects", "locations", "functions"])?.into_iter();
        Ok(Self {
            project_id: ids.next().unwrap_or_default(),
            location: ids.next().unwrap_or_default(),
            function_id: ids.next().unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_version_name_into_components() {
        let name = VersionName::parse(
            "apps/j1-gc-integration-dev-v2/services/default/versions/20210309t141022",
        )
        .unwrap();

        assert_eq!(name.app_id, "j1-gc-integration-dev-v2");
        assert_eq!(name.service_id, "default");
        assert_eq!(name.version_id, "20210309t141022");
        assert_eq!(
            name.to_string(),
            "apps/j1-gc-integration-dev-v2/services/default/versions/20210309t141022"
        );
    }

    #[test]
    fn rejects_wrong_segment_count() {
        let err = ServiceName::parse("apps/p/services").unwrap_err();
        assert!(err.reason.contains("expected 4 segments"), "{err}");
    }

    #[test]
    fn rejects_unexpected_collection() {
        let err = VersionName::parse("apps/p/functions/f/versions/v").unwrap_err();
        assert!(err.reason.contains("\"services\""), "{err}");
    }

    #[test]
    fn rejects_empty_id() {
        assert!(ServiceName::parse("apps/p/services/").is_err());
    }

    #[test]
    fn annotated_entity_round_trips_through_attributes() {
        let parsed = ServiceName::parse("apps/p/services/api").unwrap();
        let entity = parsed.annotate(Entity::new(
            "apps/p/services/api",
            "google_app_engine_service",
            "Service",
        ));

        assert_eq!(ServiceName::from_entity(&entity), Some(parsed));
    }

    #[test]
    fn entity_without_attributes_has_no_parsed_name() {
        let entity = Entity::new("weird-name", "google_app_engine_version", "Deployment");
        assert_eq!(VersionName::from_entity(&entity), None);
    }

    #[test]
    fn parses_instance_and_function_names() {
        let instance = InstanceName::parse("apps/p/services/s/versions/v/instances/abc").unwrap();
        assert_eq!(instance.version.service_id, "s");
        assert_eq!(instance.instance_id, "abc");

        let function =
            FunctionName::parse("projects/p/locations/us-central1/functions/handler").unwrap();
        assert_eq!(function.location, "us-central1");
        assert_eq!(function.function_id, "handler");
    }
}
