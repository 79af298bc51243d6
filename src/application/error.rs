use thiserror::Error;

/// Failures surfaced to the request layer. A not-found result deliberately
/// carries one message for "doesn't exist", "wrong owner", "wrong kind" and
/// "wrong status", so callers cannot probe which dimension failed.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(#[from] anyhow::Error),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        AppError::Validation(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        AppError::NotFound(message.into())
    }
}
