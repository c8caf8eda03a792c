use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::ConfigError;

pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;

/// Optional legacy `domain:` prefix, then the 6 to 30 character project id.
const PROJECT_ID_PATTERN: &str = r"^(?:[a-z0-9][a-z0-9.-]*[a-z0-9]:)?[a-z][a-z0-9-]{4,28}[a-z0-9]$";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectorConfig {
    pub project_id: String,
    /// App Engine application id; the project id when absent.
    #[serde(default)]
    pub app_id: Option<String>,
    /// Single base URL used for every API family instead of the public Google hosts.
    #[serde(default)]
    pub endpoint_override: Option<String>,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub disabled_steps: Vec<String>,
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

impl CollectorConfig {
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            app_id: None,
            endpoint_override: None,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            disabled_steps: Vec::new(),
        }
    }

    pub fn app_id(&self) -> &str {
        self.app_id.as_deref().unwrap_or(&self.project_id)
    }

    pub fn is_disabled(&self, step_id: &str) -> bool {
        self.disabled_steps.iter().any(|s| s == step_id)
    }

    /// Checks the project id format, a non-zero request timeout, and that every
    /// disabled step exists in `known_steps`.
    pub fn validate(&self, known_steps: &[&str]) -> Result<(), ConfigError> {
        let pattern = Regex::new(PROJECT_ID_PATTERN)
            .map_err(|_| ConfigError::InvalidProjectId(self.project_id.clone()))?;
        if !pattern.is_match(&self.project_id) {
            return Err(ConfigError::InvalidProjectId(self.project_id.clone()));
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::ZeroRequestTimeout);
        }
        if let Some(unknown) = self
            .disabled_steps
            .iter()
            .find(|id| !known_steps.contains(&id.as_str()))
        {
            return Err(ConfigError::UnknownStep(unknown.clone()));
        }
        Ok(())
    }

    pub fn trace_loaded(&self) {
        info!(
            project_id = %self.project_id,
            app_id = %self.app_id(),
            endpoint_override = self.endpoint_override.as_deref().unwrap_or("-"),
            disabled_steps = self.disabled_steps.len(),
            "Loaded CollectorConfig"
        );
        debug!(?self, "CollectorConfig loaded (full debug)");
    }
}
