//! Raw records as returned by the Google Cloud REST APIs.
//!
//! Only the fields the converters read are modelled; everything is optional
//! because the APIs omit unset fields.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Application {
    pub name: Option<String>,
    pub id: Option<String>,
    pub auth_domain: Option<String>,
    pub location_id: Option<String>,
    pub code_bucket: Option<String>,
    pub serving_status: Option<String>,
    pub default_hostname: Option<String>,
    pub default_bucket: Option<String>,
    pub gcr_domain: Option<String>,
    pub database_type: Option<String>,
    pub feature_settings: Option<FeatureSettings>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureSettings {
    pub split_health_checks: Option<bool>,
    pub use_container_optimized_os: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    pub name: Option<String>,
    pub id: Option<String>,
    pub split: Option<TrafficSplit>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrafficSplit {
    pub shard_by: Option<String>,
    #[serde(default)]
    pub allocations: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Version {
    pub name: Option<String>,
    pub id: Option<String>,
    pub instance_class: Option<String>,
    pub runtime: Option<String>,
    pub threadsafe: Option<bool>,
    pub env: Option<String>,
    pub serving_status: Option<String>,
    pub created_by: Option<String>,
    pub create_time: Option<String>,
    pub disk_usage_bytes: Option<String>,
    pub version_url: Option<String>,
    pub runtime_channel: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Instance {
    pub name: Option<String>,
    pub id: Option<String>,
    pub app_engine_release: Option<String>,
    pub availability: Option<String>,
    pub vm_status: Option<String>,
    pub start_time: Option<String>,
    pub requests: Option<i64>,
    pub errors: Option<i64>,
    pub qps: Option<f64>,
    pub average_latency: Option<i64>,
    pub memory_usage: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bucket {
    pub id: Option<String>,
    pub name: Option<String>,
    pub self_link: Option<String>,
    pub project_number: Option<String>,
    pub location: Option<String>,
    pub storage_class: Option<String>,
    pub time_created: Option<String>,
    pub updated: Option<String>,
    pub versioning: Option<Versioning>,
    pub iam_configuration: Option<IamConfiguration>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Versioning {
    pub enabled: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IamConfiguration {
    pub uniform_bucket_level_access: Option<UniformBucketLevelAccess>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UniformBucketLevelAccess {
    pub enabled: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceAccount {
    pub name: Option<String>,
    pub project_id: Option<String>,
    pub unique_id: Option<String>,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub description: Option<String>,
    pub oauth2_client_id: Option<String>,
    pub disabled: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Policy {
    pub version: Option<i64>,
    pub etag: Option<String>,
    #[serde(default)]
    pub bindings: Vec<Binding>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Binding {
    pub role: Option<String>,
    #[serde(default)]
    pub members: Vec<String>,
    pub condition: Option<Expr>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Expr {
    pub title: Option<String>,
    pub expression: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloudFunction {
    pub name: Option<String>,
    pub description: Option<String>,
    pub source_archive_url: Option<String>,
    pub https_trigger: Option<HttpsTrigger>,
    pub event_trigger: Option<EventTrigger>,
    pub status: Option<String>,
    pub entry_point: Option<String>,
    pub timeout: Option<String>,
    pub available_memory_mb: Option<i64>,
    pub service_account_email: Option<String>,
    pub update_time: Option<String>,
    pub version_id: Option<String>,
    pub runtime: Option<String>,
    pub ingress_settings: Option<String>,
    #[serde(default)]
    pub environment_variables: BTreeMap<String, String>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HttpsTrigger {
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventTrigger {
    pub event_type: Option<String>,
    pub resource: Option<String>,
}

/// One result of `searchAllIamPolicies`: the policy attached to a single resource.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IamPolicySearchResult {
    pub resource: Option<String>,
    pub project: Option<String>,
    pub asset_type: Option<String>,
    pub policy: Option<Policy>,
}
