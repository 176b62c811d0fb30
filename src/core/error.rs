use thiserror::Error;

#[derive(Error, Debug)]
pub enum BulkError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("No compiled plan for entity type '{0}'")]
    MissingPlan(&'static str),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Bulk load cancelled")]
    Cancelled,

    #[error("Relation recursion exceeded the maximum depth of {0}")]
    RelationDepthExceeded(usize),

    #[error("Lock error: {0}")]
    LockError(String),
}

pub type Result<T> = std::result::Result<T, BulkError>;

impl<T> From<std::sync::PoisonError<T>> for BulkError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Self::LockError(err.to_string())
    }
}
