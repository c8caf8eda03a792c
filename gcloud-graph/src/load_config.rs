/// `load_config` module: reads the YAML collector config and injects the access token from the environment.
///
/// The YAML file holds only non-secret settings (project, app id, endpoint
/// override, timeout, disabled steps). The OAuth access token is read from
/// `GOOGLE_CLOUD_ACCESS_TOKEN` (a `.env` file is honoured by `main`), so the
/// config file can be committed.
///
/// # Errors
/// All errors use `anyhow::Error` with the file path or variable name attached,
/// and are surfaced at the CLI boundary.
///
/// Example:
///
/// ```yaml
/// project_id: my-project-1
/// app_id: my-project-1
/// request_timeout_secs: 30
/// disabled_steps:
///   - fetch-iam-bindings
/// ```
use anyhow::{anyhow, Context, Result};
use gcloud_graph_core::config::CollectorConfig;
use std::env;
use std::fs;
use std::path::Path;
use tracing::{error, info};

pub const ACCESS_TOKEN_ENV: &str = "GOOGLE_CLOUD_ACCESS_TOKEN";

#[derive(Debug)]
pub struct CliConfig {
    pub collector: CollectorConfig,
    pub access_token: String,
}

/// Parses the YAML file at `path` into a [`CollectorConfig`].
pub fn load_collector_config<P: AsRef<Path>>(path: P) -> Result<CollectorConfig> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let content = fs::read_to_string(path_ref).map_err(|e| {
        error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
        anyhow!("Failed to read config file {:?}: {}", path_ref, e)
    })?;

    let config: CollectorConfig = serde_yaml::from_str(&content).map_err(|e| {
        error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
        anyhow!("Failed to parse config YAML {:?}: {e}", path_ref)
    })?;

    config.trace_loaded();
    Ok(config)
}

/// Loads the YAML config and the access token. Fails when the token is unset or empty.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<CliConfig> {
    let collector = load_collector_config(path)?;
    let access_token = env::var(ACCESS_TOKEN_ENV)
        .ok()
        .filter(|token| !token.trim().is_empty())
        .with_context(|| format!("{ACCESS_TOKEN_ENV} must be set to an OAuth access token"))?;
    info!(token_set = true, "Access token loaded from environment");

    Ok(CliConfig {
        collector,
        access_token,
    })
}
