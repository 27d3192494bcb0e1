use thiserror::Error;

/// Failures the resolve/reconcile pipeline can surface. Parse, validation and
/// remote transport failures abort the current operation; link and drift
/// issues never show up here, they are logged as warnings instead.
#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to parse compose document: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("invalid compose document: {0}")]
    Document(String),

    #[error("service {service}: field {field} {reason}")]
    Validation {
        service: String,
        field: String,
        reason: String,
    },

    #[error("failed to convert service {service}: {reason}")]
    Convert { service: String, reason: String },

    #[error("can not use env_file in file {file}: no mechanism provided to load files")]
    MissingResourceLookup { file: String },

    #[error("failed to load {path} referenced by {file}: {reason}")]
    ResourceLookup {
        path: String,
        file: String,
        reason: String,
    },

    #[error("request to rancher failed: {0}")]
    Remote(#[from] reqwest::Error),

    #[error("failed to serialize payload: {0}")]
    Json(#[from] serde_json::Error),

    #[error("rancher api error: {0}")]
    Api(String),

    #[error("failed to find stack: {0}")]
    StackNotFound(String),

    #[error("timed out waiting for {name} to finish transitioning")]
    WaitTimeout { name: String },

    #[error("{name} failed to transition: {message}")]
    Transition { name: String, message: String },
}

pub type Result<T> = std::result::Result<T, Error>;
