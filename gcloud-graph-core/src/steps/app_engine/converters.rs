use serde_json::Value;
use tracing::warn;

use super::{
    APPLICATION_ENTITY_CLASS, APPLICATION_ENTITY_TYPE, INSTANCE_ENTITY_CLASS,
    INSTANCE_ENTITY_TYPE, SERVICE_ENTITY_CLASS, SERVICE_ENTITY_TYPE, VERSION_ENTITY_CLASS,
    VERSION_ENTITY_TYPE,
};
use crate::graph::Entity;
use crate::records::{Application, Instance, Service, Version};
use crate::resource_name::{InstanceName, ServiceName, VersionName, APP_ID};
use crate::steps::epoch_millis;

fn console_link(path: &str, project_id: &str) -> String {
    format!("https://console.cloud.google.com/appengine{path}?project={project_id}")
}

pub fn application_entity(application: &Application, project_id: &str) -> Option<Entity> {
    let name = application.name.as_deref()?;
    let features = application.feature_settings.as_ref();
    let entity = Entity::new(name, APPLICATION_ENTITY_TYPE, APPLICATION_ENTITY_CLASS)
        .with_property("name", name)
        .with_property("displayName", name)
        .with_optional(APP_ID, application.id.clone())
        .with_optional("authDomain", application.auth_domain.clone())
        .with_optional("locationId", application.location_id.clone())
        .with_optional("codeBucket", application.code_bucket.clone())
        .with_optional("servingStatus", application.serving_status.clone())
        .with_optional("defaultHostname", application.default_hostname.clone())
        .with_optional("defaultBucket", application.default_bucket.clone())
        .with_optional("gcrDomain", application.gcr_domain.clone())
        .with_optional("databaseType", application.database_type.clone())
        .with_optional("splitHealthChecks", features.and_then(|f| f.split_health_checks))
        .with_optional(
            "useContainerOptimizedOs",
            features.and_then(|f| f.use_container_optimized_os),
        )
        .with_property("webLink", console_link("", project_id));
    Some(entity)
}

/// A service whose name does not parse is kept without its id attributes.
pub fn service_entity(service: &Service, project_id: &str) -> Option<Entity> {
    let name = service.name.as_deref()?;
    let allocations = service
        .split
        .as_ref()
        .and_then(|s| serde_json::to_value(&s.allocations).ok());
    let entity = Entity::new(name, SERVICE_ENTITY_TYPE, SERVICE_ENTITY_CLASS)
        .with_property("name", name)
        .with_optional("displayName", service.id.clone())
        .with_optional("id", service.id.clone())
        .with_optional("shardBy", service.split.as_ref().and_then(|s| s.shard_by.clone()))
        .with_optional::<Value>("trafficAllocations", allocations)
        .with_property("webLink", console_link("/services", project_id));

    Some(match ServiceName::parse(name) {
        Ok(parsed) => parsed.annotate(entity),
        Err(e) => {
            warn!(error = %e, "Service name did not parse; versions will not be fetched for it");
            entity
        }
    })
}

pub fn version_entity(version: &Version, project_id: &str) -> Option<Entity> {
    let name = version.name.as_deref()?;
    let entity = Entity::new(name, VERSION_ENTITY_TYPE, VERSION_ENTITY_CLASS)
        .with_property("name", name)
        .with_optional("displayName", version.id.clone())
        .with_optional("id", version.id.clone())
        .with_optional("instanceClass", version.instance_class.clone())
        .with_optional("runtime", version.runtime.clone())
        .with_optional("threadsafe", version.threadsafe)
        .with_optional("env", version.env.clone())
        .with_optional("servingStatus", version.serving_status.clone())
        .with_optional("createdBy", version.created_by.clone())
        .with_optional("createdOn", epoch_millis(version.create_time.as_deref()))
        .with_optional("diskUsageBytes", version.disk_usage_bytes.clone())
        .with_optional("versionUrl", version.version_url.clone())
        .with_optional("runtimeChannel", version.runtime_channel.clone())
        .with_property("webLink", console_link("/versions", project_id));

    Some(match VersionName::parse(name) {
        Ok(parsed) => parsed.annotate(entity),
        Err(e) => {
            warn!(error = %e, "Version name did not parse; instances will not be fetched for it");
            entity
        }
    })
}

pub fn instance_entity(instance: &Instance) -> Option<Entity> {
    let name = instance.name.as_deref()?;
    let entity = Entity::new(name, INSTANCE_ENTITY_TYPE, INSTANCE_ENTITY_CLASS)
        .with_property("name", name)
        .with_optional("displayName", instance.id.clone())
        .with_optional("id", instance.id.clone())
        .with_optional("appEngineRelease", instance.app_engine_release.clone())
        .with_optional("availability", instance.availability.clone())
        .with_optional("vmStatus", instance.vm_status.clone())
        .with_optional("startedOn", epoch_millis(instance.start_time.as_deref()))
        .with_optional("requests", instance.requests)
        .with_optional("errors", instance.errors)
        .with_optional("qps", instance.qps)
        .with_optional("averageLatency", instance.average_latency)
        .with_optional("memoryUsage", instance.memory_usage.clone());

    Some(match InstanceName::parse(name) {
        Ok(parsed) => parsed.annotate(entity),
        Err(e) => {
            warn!(error = %e, "Instance name did not parse");
            entity
        }
    })
}
