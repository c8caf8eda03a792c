use async_trait::async_trait;
use serde::Deserialize;

use super::{with_page_token, ApiFamily, GoogleHttpClient};
use crate::contract::{IamApi, Page};
use crate::error::ApiError;
use crate::records::ServiceAccount;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListServiceAccountsResponse {
    #[serde(default)]
    accounts: Vec<ServiceAccount>,
    next_page_token: Option<String>,
}

#[async_trait]
impl IamApi for GoogleHttpClient {
    async fn list_service_accounts(
        &self,
        project_id: &str,
        page_token: Option<String>,
    ) -> Result<Page<ServiceAccount>, ApiError> {
        let path = format!("/v1/projects/{project_id}/serviceAccounts");
        let query = with_page_token(Vec::new(), page_token.as_deref());
        let response: ListServiceAccountsResponse =
            self.get_json(ApiFamily::Iam, &path, &query).await?;
        Ok(Page {
            items: response.accounts,
            next_page_token: response.next_page_token,
        })
    }
}
