use async_trait::async_trait;
use serde::Deserialize;

use super::{with_page_token, ApiFamily, GoogleHttpClient};
use crate::contract::{CloudFunctionsApi, Page};
use crate::error::ApiError;
use crate::records::CloudFunction;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListFunctionsResponse {
    #[serde(default)]
    functions: Vec<CloudFunction>,
    next_page_token: Option<String>,
}

#[async_trait]
impl CloudFunctionsApi for GoogleHttpClient {
    /// Lists functions across every location (`locations/-`).
    async fn list_functions(
        &self,
        project_id: &str,
        page_token: Option<String>,
    ) -> Result<Page<CloudFunction>, ApiError> {
        let path = format!("/v1/projects/{project_id}/locations/-/functions");
        let query = with_page_token(Vec::new(), page_token.as_deref());
        let response: ListFunctionsResponse = self
            .get_json(ApiFamily::CloudFunctions, &path, &query)
            .await?;
        Ok(Page {
            items: response.functions,
            next_page_token: response.next_page_token,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::client_for;
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn lists_functions_in_all_locations() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/projects/my-project-1/locations/-/functions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "functions": [{
                    "name": "projects/my-project-1/locations/us-central1/functions/hello",
                    "runtime": "nodejs18",
                    "serviceAccountEmail": "sa@my-project-1.iam.gserviceaccount.com",
                    "availableMemoryMb": 256
                }]
            })))
            .mount(&server)
            .await;

        let page = client_for(&server)
            .list_functions("my-project-1", None)
            .await
            .unwrap();

        assert_eq!(page.items[0].available_memory_mb, Some(256));
        assert!(page.next_page_token.is_none());
    }
}
