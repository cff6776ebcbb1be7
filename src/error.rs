use thiserror::Error;

/// Error kinds produced by the engine (spec §7).
///
/// REST handlers map these onto the provider's JSON error envelope; the
/// call state machine recovers from `WebhookError`/`Timeout` locally and
/// never lets them escape to a caller.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("precondition failed: {0}")]
    PreconditionFailed(String),

    #[error("webhook error: {0}")]
    WebhookError(String),

    #[error("timeout waiting for {0}")]
    Timeout(String),

    #[error("internal invariant violation: {0}")]
    Internal(String),
}

impl EngineError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn invalid(what: impl Into<String>) -> Self {
        Self::InvalidArgument(what.into())
    }

    pub fn precondition(what: impl Into<String>) -> Self {
        Self::PreconditionFailed(what.into())
    }

    /// The provider's error code for this kind, used in the JSON envelope.
    pub fn code(&self) -> i32 {
        match self {
            EngineError::NotFound(_) => 20404,
            EngineError::InvalidArgument(_) => 21400,
            EngineError::PreconditionFailed(_) => 21409,
            EngineError::WebhookError(_) => 11200,
            EngineError::Timeout(_) => 11205,
            EngineError::Internal(_) => 20500,
        }
    }

    /// HTTP status this error maps to at the REST boundary.
    pub fn http_status(&self) -> u16 {
        match self {
            EngineError::NotFound(_) => 404,
            EngineError::InvalidArgument(_) => 400,
            EngineError::PreconditionFailed(_) => 409,
            EngineError::WebhookError(_) | EngineError::Timeout(_) => 500,
            EngineError::Internal(_) => 500,
        }
    }
}

pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_not_found_to_404() {
        let e = EngineError::not_found("call CA123");
        assert_eq!(e.http_status(), 404);
        assert_eq!(e.code(), 20404);
    }
}
