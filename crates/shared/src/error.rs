//! Application-wide error types.
//!
//! Domain crates keep their own error enums and convert into `AppError`
//! at the edge, so callers outside the engine see a single flat vocabulary.

use thiserror::Error;

/// Result type alias using `AppError`.
pub type AppResult<T> = Result<T, AppError>;

/// Application error types.
#[derive(Debug, Error)]
pub enum AppError {
    /// The actor may not perform this action.
    #[error("Access denied: {0}")]
    Forbidden(String),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Input failed validation.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Workflow rule violation (wrong state, wrong turn).
    #[error("Business rule violation: {0}")]
    BusinessRule(String),

    /// Conflicting concurrent change.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Database error.
    #[error("Database error: {0}")]
    Database(String),

    /// External service error (currency provider).
    #[error("External service error: {0}")]
    ExternalService(String),

    /// Internal error, including broken invariants.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Returns the HTTP-style status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::Forbidden(_) => 403,
            Self::NotFound(_) => 404,
            Self::Validation(_) => 400,
            Self::BusinessRule(_) => 422,
            Self::Conflict(_) => 409,
            Self::ExternalService(_) => 502,
            Self::Database(_) | Self::Internal(_) => 500,
        }
    }

    /// Returns the stable machine-readable error code.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::Forbidden(_) => "FORBIDDEN",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::BusinessRule(_) => "BUSINESS_RULE_VIOLATION",
            Self::Conflict(_) => "CONFLICT",
            Self::Database(_) => "DATABASE_ERROR",
            Self::ExternalService(_) => "EXTERNAL_SERVICE_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}
