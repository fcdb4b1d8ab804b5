//! Crate-wide error taxonomy.
//!
//! Internal plumbing threads `anyhow::Result` the way the rest of this
//! codebase does; `CoreError` is the boundary type a request runner
//! converts internal failures into before they reach a transport.

use thiserror::Error;

/// The error kinds the core distinguishes when surfacing a run result.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Invalid {0}")]
    Validation(String),

    #[error("not permitted: {0}")]
    Permission(String),

    #[error("{0}")]
    Safety(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("{0}")]
    Resource(String),

    #[error("timed out: {0}")]
    Timeout(String),

    #[error("upstream failure: {0}")]
    Upstream(#[source] anyhow::Error),

    #[error("internal error: {0}")]
    Internal(#[source] anyhow::Error),
}

impl CoreError {
    /// Informative HTTP status this error would map to at the (out-of-scope)
    /// transport boundary, per the status-mapping table.
    pub fn status_hint(&self) -> u16 {
        match self {
            CoreError::Validation(_) => 400,
            CoreError::Permission(msg) => {
                if msg.contains("tenant") {
                    403
                } else {
                    401
                }
            }
            CoreError::Safety(_) => 400,
            CoreError::Conflict(_) => 409,
            CoreError::Resource(msg) if msg.contains("rate limit") => 429,
            CoreError::Resource(_) => 400,
            CoreError::Timeout(_) => 504,
            CoreError::Upstream(_) => 500,
            CoreError::Internal(_) => 500,
        }
    }

    /// The message as it would appear in a `RunResult::error` field.
    pub fn run_message(&self) -> String {
        self.to_string()
    }
}

impl From<anyhow::Error> for CoreError {
    fn from(err: anyhow::Error) -> Self {
        CoreError::Internal(err)
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
