use thiserror::Error;

use crate::core::errors::ApiError;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error(transparent)]
    Service(#[from] ApiError),
    #[error("model returned unusable output: {0}")]
    InvalidOutput(String),
    #[error("model returned an empty response")]
    EmptyResponse,
    #[error("agent did not finish within {0} turns")]
    MaxTurnsExceeded(usize),
}

impl From<AgentError> for ApiError {
    fn from(err: AgentError) -> Self {
        match err {
            AgentError::Service(inner) => inner,
            other => ApiError::Internal(other.to_string()),
        }
    }
}
