use thiserror::Error;

#[derive(Error, Debug)]
pub enum SkywatchError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}
