use async_trait::async_trait;
use serde_json::json;

use super::{ApiFamily, GoogleHttpClient};
use crate::contract::ResourceManagerApi;
use crate::error::ApiError;
use crate::records::Policy;

/// Policy version that includes conditional bindings.
const REQUESTED_POLICY_VERSION: u8 = 3;

#[async_trait]
impl ResourceManagerApi for GoogleHttpClient {
    async fn get_project_iam_policy(&self, project_id: &str) -> Result<Policy, ApiError> {
        let path = format!("/v1/projects/{project_id}:getIamPolicy");
        let body = json!({ "options": { "requestedPolicyVersion": REQUESTED_POLICY_VERSION } });
        self.post_json(ApiFamily::ResourceManager, &path, &body).await
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::client_for;
    use super::*;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn posts_for_policy_with_requested_version() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/projects/my-project-1:getIamPolicy"))
            .and(body_json(json!({ "options": { "requestedPolicyVersion": 3 } })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "version": 3,
                "etag": "BwX=",
                "bindings": [{
                    "role": "roles/owner",
                    "members": ["user:alice@example.com", "serviceAccount:sa@x.iam.gserviceaccount.com"]
                }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let policy = client_for(&server)
            .get_project_iam_policy("my-project-1")
            .await
            .unwrap();

        assert_eq!(policy.bindings.len(), 1);
        assert_eq!(policy.bindings[0].members.len(), 2);
    }
}
