use thiserror::Error;

/// Failures raised before a request reaches a venue.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    #[error("Missing required parameter: {0}")]
    MissingParam(String),

    #[error("Invalid parameter {name}: {reason}")]
    InvalidParam { name: String, reason: String },

    #[error("Missing required credentials: {0}")]
    MissingCredentials(String),

    #[error("Malformed request: {0}")]
    MalformedRequest(String),
}

impl BridgeError {
    pub fn invalid(name: &str, reason: impl Into<String>) -> Self {
        Self::InvalidParam {
            name: name.to_string(),
            reason: reason.into(),
        }
    }
}
