//! Error taxonomy for the service boundary.

use std::time::Duration;

use kisekae_pipeline::FitError;

/// Errors that can occur while driving external services or the
/// orchestrated fitting flow.
///
/// `Timeout` and `Remote` are the recoverable variants: the
/// orchestrator falls back to the heuristic path on them unless the
/// caller disabled fallback. Everything else aborts the request.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// The external call did not complete within the configured budget.
    #[error("external service timed out after {0:?}")]
    Timeout(Duration),

    /// The external service answered with a failure status or an error
    /// payload.
    #[error("external service failed with status {status}: {message}")]
    Remote { status: u16, message: String },

    /// The HTTP transport itself failed.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The service answered 2xx but the payload was unusable.
    #[error("unusable service payload: {0}")]
    Payload(String),

    /// A pipeline stage failed while preparing or reconciling buffers.
    #[error(transparent)]
    Pipeline(#[from] FitError),
}

impl ServiceError {
    /// Whether the orchestrator may fall back to the heuristic path
    /// after this error.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::Remote { .. } | Self::Transport(_))
    }
}
