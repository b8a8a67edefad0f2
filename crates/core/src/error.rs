use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("Unknown worker: {0}")]
    UnknownWorker(String),

    #[error("Unknown execution mode: {0}")]
    UnknownMode(String),

    #[error("Unknown complexity: {0}")]
    UnknownComplexity(String),

    #[error("Validation error: {0}")]
    Validation(String),
}

pub type CoreResult<T> = std::result::Result<T, CoreError>;
