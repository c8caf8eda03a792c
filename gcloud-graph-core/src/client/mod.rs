//! reqwest-backed implementations of the API traits in [`crate::contract`].
//!
//! [`GoogleHttpClient`] carries one `reqwest::Client`, the OAuth bearer token and
//! the base URLs. Each API family lives in its own submodule and implements its
//! trait directly on `GoogleHttpClient`, so a single `Arc<GoogleHttpClient>` can
//! back every field of [`crate::steps::ApiClients`].
//!
//! Status handling is shared: 403, or any error body whose `error.status` is
//! `PERMISSION_DENIED`, becomes [`ApiError::PermissionDenied`]; every other
//! non-success status becomes [`ApiError::Http`].

mod app_engine;
mod cloud_asset;
mod functions;
mod iam;
mod resource_manager;
mod storage;

use std::time::Duration;

use reqwest::{Client, RequestBuilder, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::config::CollectorConfig;
use crate::error::ApiError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiFamily {
    Storage,
    Iam,
    ResourceManager,
    AppEngine,
    CloudFunctions,
    CloudAsset,
}

impl ApiFamily {
    pub fn default_base_url(self) -> &'static str {
        match self {
            ApiFamily::Storage => "https://storage.googleapis.com",
            ApiFamily::Iam => "https://iam.googleapis.com",
            ApiFamily::ResourceManager => "https://cloudresourcemanager.googleapis.com",
            ApiFamily::AppEngine => "https://appengine.googleapis.com",
            ApiFamily::CloudFunctions => "https://cloudfunctions.googleapis.com",
            ApiFamily::CloudAsset => "https://cloudasset.googleapis.com",
        }
    }
}

#[derive(Debug, Clone)]
pub struct GoogleHttpClient {
    http: Client,
    access_token: String,
    endpoint_override: Option<String>,
}

/// Google's JSON error envelope: `{"error": {"code", "message", "status"}}`.
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: String,
}

impl GoogleHttpClient {
    pub fn new(config: &CollectorConfig, access_token: impl Into<String>) -> Result<Self, ApiError> {
        let endpoint_override = match config.endpoint_override.as_deref() {
            Some(raw) => {
                Url::parse(raw).map_err(|e| ApiError::InvalidEndpoint(format!("{raw}: {e}")))?;
                Some(raw.trim_end_matches('/').to_string())
            }
            None => None,
        };
        let http = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(ApiError::ClientBuild)?;

        debug!(
            timeout_secs = config.request_timeout_secs,
            endpoint_override = endpoint_override.as_deref().unwrap_or("-"),
            "Initialised Google API client"
        );
        Ok(Self {
            http,
            access_token: access_token.into(),
            endpoint_override,
        })
    }

    /// `{base}{path}` for the family, honouring the endpoint override.
    fn url(&self, family: ApiFamily, path: &str) -> String {
        let base = self
            .endpoint_override
            .as_deref()
            .unwrap_or_else(|| family.default_base_url());
        format!("{base}{path}")
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        family: ApiFamily,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, ApiError> {
        let url = self.url(family, path);
        let request = self.http.get(&url).query(query);
        let (status, body) = self.send(&url, request).await?;
        if !status.is_success() {
            return Err(status_error(&url, status, &body));
        }
        decode(&url, &body)
    }

    /// Like [`Self::get_json`], but a 404 is `Ok(None)`.
    async fn get_optional_json<T: DeserializeOwned>(
        &self,
        family: ApiFamily,
        path: &str,
    ) -> Result<Option<T>, ApiError> {
        let url = self.url(family, path);
        let request = self.http.get(&url);
        let (status, body) = self.send(&url, request).await?;
        if status == StatusCode::NOT_FOUND {
            debug!(url = %url, "Resource not found");
            return Ok(None);
        }
        if !status.is_success() {
            return Err(status_error(&url, status, &body));
        }
        decode(&url, &body).map(Some)
    }

    async fn post_json<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        family: ApiFamily,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let url = self.url(family, path);
        let request = self.http.post(&url).json(body);
        let (status, body) = self.send(&url, request).await?;
        if !status.is_success() {
            return Err(status_error(&url, status, &body));
        }
        decode(&url, &body)
    }

    async fn send(&self, url: &str, request: RequestBuilder) -> Result<(StatusCode, String), ApiError> {
        debug!(url = %url, "Sending Google API request");
        let response = request
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|source| ApiError::Transport {
                url: url.to_string(),
                source,
            })?;
        let status = response.status();
        let body = response.text().await.map_err(|source| ApiError::Transport {
            url: url.to_string(),
            source,
        })?;
        debug!(url = %url, status = status.as_u16(), bytes = body.len(), "Received response");
        Ok((status, body))
    }
}

/// Appends `pageToken` to `query` when continuing a listing.
fn with_page_token<'a>(
    mut query: Vec<(&'a str, &'a str)>,
    page_token: Option<&'a str>,
) -> Vec<(&'a str, &'a str)> {
    if let Some(token) = page_token {
        query.push(("pageToken", token));
    }
    query
}

fn decode<T: DeserializeOwned>(url: &str, body: &str) -> Result<T, ApiError> {
    serde_json::from_str(body).map_err(|source| {
        error!(url = %url, error = %source, "Failed to decode Google API response");
        ApiError::Decode {
            url: url.to_string(),
            source,
        }
    })
}

fn status_error(url: &str, status: StatusCode, body: &str) -> ApiError {
    let envelope = serde_json::from_str::<ErrorEnvelope>(body).ok();
    let message = envelope
        .as_ref()
        .map(|e| e.error.message.clone())
        .unwrap_or_else(|| body.to_string());
    let denied_in_body = envelope
        .as_ref()
        .is_some_and(|e| e.error.status == "PERMISSION_DENIED");

    if status == StatusCode::FORBIDDEN || denied_in_body {
        debug!(url = %url, status = status.as_u16(), "Permission denied");
        return ApiError::PermissionDenied {
            status: status.as_u16(),
            message,
        };
    }
    error!(url = %url, status = status.as_u16(), message = %message, "Google API request failed");
    ApiError::Http {
        status: status.as_u16(),
        url: url.to_string(),
        message,
    }
}
