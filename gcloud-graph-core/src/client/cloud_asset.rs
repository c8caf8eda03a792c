use async_trait::async_trait;
use serde::Deserialize;

use super::{with_page_token, ApiFamily, GoogleHttpClient};
use crate::contract::{CloudAssetApi, Page};
use crate::error::ApiError;
use crate::records::IamPolicySearchResult;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchAllIamPoliciesResponse {
    #[serde(default)]
    results: Vec<IamPolicySearchResult>,
    next_page_token: Option<String>,
}

#[async_trait]
impl CloudAssetApi for GoogleHttpClient {
    async fn search_all_iam_policies(
        &self,
        project_id: &str,
        page_token: Option<String>,
    ) -> Result<Page<IamPolicySearchResult>, ApiError> {
        let path = format!("/v1/projects/{project_id}:searchAllIamPolicies");
        let query = with_page_token(Vec::new(), page_token.as_deref());
        let response: SearchAllIamPoliciesResponse = self
            .get_json(ApiFamily::CloudAsset, &path, &query)
            .await?;
        Ok(Page {
            items: response.results,
            next_page_token: response.next_page_token,
        })
    }
}
