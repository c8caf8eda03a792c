use async_trait::async_trait;
use serde::Deserialize;

use super::{with_page_token, ApiFamily, GoogleHttpClient};
use crate::contract::{Page, StorageApi};
use crate::error::ApiError;
use crate::records::Bucket;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListBucketsResponse {
    #[serde(default)]
    items: Vec<Bucket>,
    next_page_token: Option<String>,
}

#[async_trait]
impl StorageApi for GoogleHttpClient {
    async fn list_buckets(
        &self,
        project_id: &str,
        page_token: Option<String>,
    ) -> Result<Page<Bucket>, ApiError> {
        let query = with_page_token(vec![("project", project_id)], page_token.as_deref());
        let response: ListBucketsResponse = self
            .get_json(ApiFamily::Storage, "/storage/v1/b", &query)
            .await?;
        Ok(Page {
            items: response.items,
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
    async fn lists_buckets_for_project_with_page_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/storage/v1/b"))
            .and(query_param("project", "my-project-1"))
            .and(query_param("pageToken", "next"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "kind": "storage#buckets",
                "items": [{ "id": "b1", "name": "b1", "location": "US" }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let page = client_for(&server)
            .list_buckets("my-project-1", Some("next".to_string()))
            .await
            .unwrap();

        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].name.as_deref(), Some("b1"));
        assert_eq!(page.next_page_token, None);
    }

    #[tokio::test]
    async fn empty_project_has_no_items_field() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/storage/v1/b"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "kind": "storage#buckets" })))
            .mount(&server)
            .await;

        let page = client_for(&server).list_buckets("my-project-1", None).await.unwrap();
        assert!(page.items.is_empty());
    }
}
