use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Entity not found: {0}")]
    NotFound(String),
    #[error("Validation failed: {0}")]
    Validation(String),
    #[error("Operation not allowed: {0}")]
    Forbidden(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Errors surfaced by a bot API connection.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BotApiError {
    #[error("Too Many Requests: {description}")]
    RateLimited {
        retry_after: Option<u64>,
        description: String,
    },
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("api error {code}: {description}")]
    Api { code: i32, description: String },
    #[error("transport error: {0}")]
    Transport(String),
}
