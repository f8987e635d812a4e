//! Error taxonomy for the interception core.
//!
//! Each variant carries the HTTP status a caller should see (spec.md §7).
//! `do-not-intercept` is deliberately not a variant here: it is a control
//! signal that never reaches an HTTP client, modeled separately as
//! [`crate::service::ProcessOutcome::DoNotIntercept`].

use hyper::StatusCode;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("none of the registered services can handle this request: {0}")]
    NoServicesForRequest(String),

    #[error("{service} can't handle the request {request}")]
    RequestNotHandledInService { service: String, request: String },

    #[error("service {service} cannot handle this request: {request}")]
    NoMatchingRecording { service: String, request: String },

    #[error("scenario {scenario} not found in service {service}")]
    ScenarioNotInService { service: String, scenario: String },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("service type {0} is not a valid service type")]
    InvalidServiceType(String),

    #[error("service of type {service_type} cannot be instantiated with the given parameters: {reason}")]
    InvalidServiceParams {
        service_type: String,
        reason: String,
    },

    #[error("service {0} doesn't exist")]
    ServiceNotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl CoreError {
    /// The status code a caller should observe for this error, per spec.md §7.
    pub fn status(&self) -> StatusCode {
        match self {
            CoreError::NoServicesForRequest(_) => StatusCode::NOT_IMPLEMENTED,
            CoreError::RequestNotHandledInService { .. } => StatusCode::NOT_IMPLEMENTED,
            CoreError::NoMatchingRecording { .. } => StatusCode::NOT_IMPLEMENTED,
            CoreError::ScenarioNotInService { .. } => StatusCode::NOT_IMPLEMENTED,
            CoreError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            CoreError::InvalidServiceType(_) => StatusCode::BAD_REQUEST,
            CoreError::InvalidServiceParams { .. } => StatusCode::BAD_REQUEST,
            CoreError::ServiceNotFound(_) => StatusCode::NOT_FOUND,
            CoreError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            CoreError::Yaml(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
