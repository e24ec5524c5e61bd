use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FallbackError {
    #[error("language model service error: {0}")]
    Service(String),

    #[error("language model returned an empty response")]
    EmptyResponse,

    #[error("language model timed out after {} ms", .0.as_millis())]
    Timeout(Duration),

    #[error("fallback responder is disabled")]
    Disabled,
}

impl From<reqwest::Error> for FallbackError {
    fn from(e: reqwest::Error) -> Self {
        FallbackError::Service(e.to_string())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GateError {
    /// The call did not finish (or never got a permit) within its budget.
    #[error("{backend} did not finish within {} ms", .after.as_millis())]
    Timeout {
        backend: &'static str,
        after: Duration,
    },

    /// The backend task panicked or was cancelled by the runtime.
    #[error("{backend} call aborted: {reason}")]
    Aborted {
        backend: &'static str,
        reason: String,
    },

    #[error("{backend} gate is closed")]
    Closed { backend: &'static str },
}
