use super::directory::RepositoryError;

/// Failure taxonomy surfaced verbatim to callers of the engine.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    #[error("{0} not found")]
    NotFound(String),
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("cannot {action} while {state}")]
    InvalidTransition {
        action: &'static str,
        state: &'static str,
    },
    #[error("milestone is not editable while {state}")]
    NotEditable { state: &'static str },
    #[error("invariant violation: {0}")]
    InvariantViolation(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("validation error: {0}")]
    Validation(String),
    #[error("persistence unavailable: {0}")]
    Unavailable(String),
}

impl EngineError {
    /// Machine-readable code returned alongside every failed request.
    pub const fn code(&self) -> &'static str {
        match self {
            EngineError::NotFound(_) => "NOT_FOUND",
            EngineError::Forbidden(_) => "FORBIDDEN",
            EngineError::InvalidTransition { .. } => "INVALID_TRANSITION",
            EngineError::NotEditable { .. } => "NOT_EDITABLE",
            EngineError::InvariantViolation(_) => "INVARIANT_VIOLATION",
            EngineError::Conflict(_) => "CONFLICT",
            EngineError::Validation(_) => "VALIDATION_ERROR",
            EngineError::Unavailable(_) => "UNAVAILABLE",
        }
    }

    pub(crate) fn not_found(entity: &str, id: &str) -> Self {
        EngineError::NotFound(format!("{entity} {id}"))
    }
}

impl From<RepositoryError> for EngineError {
    fn from(value: RepositoryError) -> Self {
        match value {
            RepositoryError::Conflict => {
                EngineError::Conflict("record changed since it was read".to_string())
            }
            RepositoryError::NotFound => EngineError::NotFound("record".to_string()),
            RepositoryError::Unavailable(reason) => EngineError::Unavailable(reason),
        }
    }
}

/// Reject a mutation when the caller's last-seen version no longer matches storage.
pub(crate) fn ensure_version(current: u64, expected: Option<u64>) -> Result<(), EngineError> {
    match expected {
        Some(seen) if seen != current => Err(EngineError::Conflict(format!(
            "expected version {seen}, found {current}"
        ))),
        _ => Ok(()),
    }
}
