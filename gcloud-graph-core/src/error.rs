//! Error types shared by the clients, the job state and the step executor.

use thiserror::Error;

/// Failure talking to a Google Cloud management API.
#[derive(Error, Debug)]
pub enum ApiError {
    /// HTTP 403 or a `PERMISSION_DENIED` error body. Never retried.
    #[error("permission denied ({status}): {message}")]
    PermissionDenied { status: u16, message: String },

    #[error("API returned {status} for {url}: {message}")]
    Http {
        status: u16,
        url: String,
        message: String,
    },

    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("could not decode response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("could not build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),
}

impl ApiError {
    pub fn is_permission_denied(&self) -> bool {
        matches!(self, ApiError::PermissionDenied { .. })
    }
}

#[derive(Error, Debug, PartialEq)]
pub enum JobStateError {
    #[error("key already exists in job state: {0}")]
    DuplicateKey(String),

    #[error("relationship {relationship} references missing entity {missing}")]
    MissingEndpoint {
        relationship: String,
        missing: String,
    },

    #[error("slot {slot} could not be (de)serialized: {message}")]
    Slot { slot: String, message: String },
}

#[derive(Error, Debug, PartialEq)]
#[error("malformed resource name {name:?}: {reason}")]
pub struct ResourceNameError {
    pub name: String,
    pub reason: String,
}

/// Error returned by a step handler. Only `Api(PermissionDenied)` is recoverable.
#[derive(Error, Debug)]
pub enum StepError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    JobState(#[from] JobStateError),
}

impl StepError {
    pub fn is_permission_denied(&self) -> bool {
        matches!(self, StepError::Api(e) if e.is_permission_denied())
    }
}

/// Problems with the static step graph, detected before any step runs.
#[derive(Error, Debug, PartialEq)]
pub enum GraphError {
    #[error("duplicate step id: {0}")]
    DuplicateStep(String),

    #[error("step {step} depends on unknown step {dependency}")]
    UnknownDependency { step: String, dependency: String },

    #[error("dependency cycle involving steps: {0:?}")]
    Cycle(Vec<String>),
}

#[derive(Error, Debug)]
pub enum CollectionError {
    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("step {step_id} failed: {source}")]
    StepFailed {
        step_id: String,
        #[source]
        source: StepError,
    },
}

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("invalid project id {0:?}")]
    InvalidProjectId(String),

    #[error("unknown step in disabled_steps: {0}")]
    UnknownStep(String),

    #[error("request_timeout_secs must be greater than zero")]
    ZeroRequestTimeout,
}
