use async_trait::async_trait;
use serde::Deserialize;

use super::{with_page_token, ApiFamily, GoogleHttpClient};
use crate::contract::{AppEngineApi, Page};
use crate::error::ApiError;
use crate::records::{Application, Instance, Service, Version};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListServicesResponse {
    #[serde(default)]
    services: Vec<Service>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListVersionsResponse {
    #[serde(default)]
    versions: Vec<Version>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListInstancesResponse {
    #[serde(default)]
    instances: Vec<Instance>,
    next_page_token: Option<String>,
}

#[async_trait]
impl AppEngineApi for GoogleHttpClient {
    async fn get_application(&self, app_id: &str) -> Result<Option<Application>, ApiError> {
        self.get_optional_json(ApiFamily::AppEngine, &format!("/v1/apps/{app_id}"))
            .await
    }

    async fn list_services(
        &self,
        app_id: &str,
        page_token: Option<String>,
    ) -> Result<Page<Service>, ApiError> {
        let path = format!("/v1/apps/{app_id}/services");
        let query = with_page_token(Vec::new(), page_token.as_deref());
        let response: ListServicesResponse =
            self.get_json(ApiFamily::AppEngine, &path, &query).await?;
        Ok(Page {
            items: response.services,
            next_page_token: response.next_page_token,
        })
    }

    async fn list_versions(
        &self,
        app_id: &str,
        service_id: &str,
        page_token: Option<String>,
    ) -> Result<Page<Version>, ApiError> {
        let path = format!("/v1/apps/{app_id}/services/{service_id}/versions");
        let query = with_page_token(vec![("view", "FULL")], page_token.as_deref());
        let response: ListVersionsResponse =
            self.get_json(ApiFamily::AppEngine, &path, &query).await?;
        Ok(Page {
            items: response.versions,
            next_page_token: response.next_page_token,
        })
    }

    async fn list_instances(
        &self,
        app_id: &str,
        service_id: &str,
        version_id: &str,
        page_token: Option<String>,
    ) -> Result<Page<Instance>, ApiError> {
        let path =
            format!("/v1/apps/{app_id}/services/{service_id}/versions/{version_id}/instances");
        let query = with_page_token(Vec::new(), page_token.as_deref());
        let response: ListInstancesResponse =
            self.get_json(ApiFamily::AppEngine, &path, &query).await?;
        Ok(Page {
            items: response.instances,
            next_page_token: response.next_page_token,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::client_for;
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn gets_application() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/apps/my-project-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "apps/my-project-1",
                "id": "my-project-1",
                "defaultBucket": "b1",
                "codeBucket": "b2"
            })))
            .mount(&server)
            .await;

        let app = client_for(&server)
            .get_application("my-project-1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(app.default_bucket.as_deref(), Some("b1"));
        assert_eq!(app.code_bucket.as_deref(), Some("b2"));
    }

    #[tokio::test]
    async fn missing_application_is_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/apps/my-project-1"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "error": { "code": 404, "message": "App does not exist.", "status": "NOT_FOUND" }
            })))
            .mount(&server)
            .await;

        let app = client_for(&server).get_application("my-project-1").await.unwrap();
        assert!(app.is_none());
    }

    #[tokio::test]
    async fn lists_versions_with_full_view_across_pages() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/apps/app/services/default/versions"))
            .and(query_param("pageToken", "p2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "versions": [{ "name": "apps/app/services/default/versions/v2", "id": "v2" }]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/apps/app/services/default/versions"))
            .and(query_param("view", "FULL"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "versions": [{ "name": "apps/app/services/default/versions/v1", "id": "v1" }],
                "nextPageToken": "p2"
            })))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let first = client.list_versions("app", "default", None).await.unwrap();
        assert_eq!(first.items[0].id.as_deref(), Some("v1"));
        assert_eq!(first.next_page_token.as_deref(), Some("p2"));

        let second = client
            .list_versions("app", "default", first.next_page_token)
            .await
            .unwrap();
        assert_eq!(second.items[0].id.as_deref(), Some("v2"));
        assert!(second.next_page_token.is_none());
    }

    #[tokio::test]
    async fn lists_instances_under_version() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/apps/app/services/default/versions/v1/instances"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "instances": [
                    { "name": "apps/app/services/default/versions/v1/instances/i1", "id": "i1" },
                    { "name": "apps/app/services/default/versions/v1/instances/i2", "id": "i2" }
                ]
            })))
            .mount(&server)
            .await;

        let page = client_for(&server)
            .list_instances("app", "default", "v1", None)
            .await
            .unwrap();
        assert_eq!(page.items.len(), 2);
    }
}
