//! Full run of the step registry against a wiremock stand-in for the Google APIs.

use std::sync::Arc;

use gcloud_graph_core::client::GoogleHttpClient;
use gcloud_graph_core::config::CollectorConfig;
use gcloud_graph_core::error::CollectionError;
use gcloud_graph_core::executor::collect_in_memory;
use gcloud_graph_core::steps::{ApiClients, StepOutcome};
use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PROJECT: &str = "my-project-1";
const SA: &str = "deployer@my-project-1.iam.gserviceaccount.com";

async fn mount_get(server: &MockServer, route: &str, body: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path(route))
        .and(header("authorization", "Bearer token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

async fn mount_project(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/storage/v1/b"))
        .and(query_param("pageToken", "more"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [{ "id": "b2", "name": "b2" }]
        })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/storage/v1/b"))
        .and(query_param("project", PROJECT))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [{ "id": "b1", "name": "b1", "timeCreated": "2020-08-05T18:05:19Z" }],
            "nextPageToken": "more"
        })))
        .mount(server)
        .await;

    mount_get(
        server,
        "/v1/projects/my-project-1/serviceAccounts",
        json!({ "accounts": [{ "email": SA, "uniqueId": "42" }] }),
    )
    .await;

    Mock::given(method("POST"))
        .and(path("/v1/projects/my-project-1:getIamPolicy"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "bindings": [{ "role": "roles/owner", "members": ["user:alice@example.com"] }]
        })))
        .mount(server)
        .await;

    mount_get(
        server,
        "/v1/apps/my-project-1",
        json!({
            "name": "apps/my-project-1",
            "id": "my-project-1",
            "defaultBucket": "b1",
            "codeBucket": "b2"
        }),
    )
    .await;
    mount_get(
        server,
        "/v1/apps/my-project-1/services",
        json!({ "services": [{ "name": "apps/my-project-1/services/default", "id": "default" }] }),
    )
    .await;
    mount_get(
        server,
        "/v1/apps/my-project-1/services/default/versions",
        json!({ "versions": [
            { "name": "apps/my-project-1/services/default/versions/v1", "id": "v1", "createdBy": "alice@example.com" },
            { "name": "apps/my-project-1/services/default/versions/v2", "id": "v2", "createdBy": SA }
        ] }),
    )
    .await;
    mount_get(
        server,
        "/v1/apps/my-project-1/services/default/versions/v1/instances",
        json!({ "instances": [{ "name": "apps/my-project-1/services/default/versions/v1/instances/i1", "id": "i1" }] }),
    )
    .await;
    mount_get(
        server,
        "/v1/apps/my-project-1/services/default/versions/v2/instances",
        json!({}),
    )
    .await;
    mount_get(
        server,
        "/v1/projects/my-project-1/locations/-/functions",
        json!({ "functions": [{
            "name": "projects/my-project-1/locations/us-central1/functions/hello",
            "serviceAccountEmail": SA
        }] }),
    )
    .await;

    Mock::given(method("GET"))
        .and(path("/v1/projects/my-project-1:searchAllIamPolicies"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "error": { "code": 403, "message": "denied", "status": "PERMISSION_DENIED" }
        })))
        .mount(server)
        .await;
}

fn clients_for(server: &MockServer, config: &CollectorConfig) -> ApiClients {
    let mut config = config.clone();
    config.endpoint_override = Some(server.uri());
    ApiClients::from_http(Arc::new(GoogleHttpClient::new(&config, "token").unwrap()))
}

fn count_type(values: &[serde_json::Value], relationship_type: &str) -> usize {
    values.iter().filter(|v| v["_type"] == relationship_type).count()
}

#[tokio::test]
async fn collects_project_graph_end_to_end() {
    let server = MockServer::start().await;
    mount_project(&server).await;
    let config = CollectorConfig::new(PROJECT);

    let (report, document) = collect_in_memory(config.clone(), clients_for(&server, &config))
        .await
        .unwrap();

    // b1, b2, sa, alice, app, service, v1, v2, i1, function
    assert_eq!(document.entities.len(), 10);
    assert_eq!(report.entity_count, 10);

    let relationships: Vec<serde_json::Value> = document
        .relationships
        .iter()
        .map(|r| serde_json::to_value(r).unwrap())
        .collect();
    assert_eq!(count_type(&relationships, "google_app_engine_application_uses_storage_bucket"), 2);
    assert_eq!(count_type(&relationships, "google_app_engine_application_has_service"), 1);
    assert_eq!(count_type(&relationships, "google_app_engine_service_has_version"), 2);
    assert_eq!(count_type(&relationships, "google_app_engine_version_has_instance"), 1);
    assert_eq!(count_type(&relationships, "google_user_created_app_engine_version"), 1);
    assert_eq!(count_type(&relationships, "google_iam_service_account_created_app_engine_version"), 1);
    assert_eq!(count_type(&relationships, "google_cloud_function_uses_iam_service_account"), 1);
    assert_eq!(report.relationship_count, 9);

    assert_eq!(report.outcome_of("fetch-iam-bindings"), Some(StepOutcome::MissingPermission));
    assert_eq!(report.missing_permissions.len(), 1);
    assert_eq!(
        serde_json::to_value(&report.missing_permissions[0]).unwrap(),
        json!({ "permission": "cloudasset.assets.searchAllIamPolicies", "stepId": "fetch-iam-bindings" })
    );
    assert!(report
        .steps
        .iter()
        .filter(|s| s.step_id != "fetch-iam-bindings")
        .all(|s| s.outcome == StepOutcome::Completed));
}

#[tokio::test]
async fn disabled_application_step_keeps_services_without_parent_edge() {
    let server = MockServer::start().await;
    mount_project(&server).await;
    let mut config = CollectorConfig::new(PROJECT);
    config.disabled_steps = vec![
        "fetch-app-engine-application".to_string(),
        "fetch-iam-bindings".to_string(),
    ];

    let (report, document) = collect_in_memory(config.clone(), clients_for(&server, &config))
        .await
        .unwrap();

    assert_eq!(
        report.outcome_of("fetch-app-engine-application"),
        Some(StepOutcome::Disabled)
    );
    assert_eq!(
        report.outcome_of("fetch-app-engine-services"),
        Some(StepOutcome::Completed)
    );
    assert!(report.missing_permissions.is_empty());
    let of_type = |entity_type: &str| {
        document
            .entities
            .iter()
            .filter(|e| e.entity_type == entity_type)
            .count()
    };
    assert_eq!(of_type("google_app_engine_application"), 0);
    assert_eq!(of_type("google_app_engine_service"), 1);
    assert_eq!(of_type("google_app_engine_version"), 2);
    assert!(document
        .relationships
        .iter()
        .all(|r| r.relationship_type != "google_app_engine_application_has_service"
            && r.relationship_type != "google_app_engine_application_uses_storage_bucket"));
    assert_eq!(
        document
            .relationships
            .iter()
            .filter(|r| r.relationship_type == "google_app_engine_service_has_version")
            .count(),
        2
    );
}

#[tokio::test]
async fn server_error_aborts_with_step_id() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/storage/v1/b"))
        .respond_with(ResponseTemplate::new(500).set_body_string("backend unavailable"))
        .mount(&server)
        .await;
    let config = CollectorConfig::new(PROJECT);

    let err = collect_in_memory(config.clone(), clients_for(&server, &config))
        .await
        .unwrap_err();

    match err {
        CollectionError::StepFailed { step_id, .. } => assert_eq!(step_id, "fetch-storage-buckets"),
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn invalid_config_is_rejected_before_any_request() {
    let server = MockServer::start().await;
    let mut config = CollectorConfig::new(PROJECT);
    config.disabled_steps = vec!["fetch-everything".to_string()];

    let err = collect_in_memory(config.clone(), clients_for(&server, &config))
        .await
        .unwrap_err();

    assert!(matches!(err, CollectionError::Config(_)));
    assert!(server.received_requests().await.unwrap_or_default().is_empty());
}
