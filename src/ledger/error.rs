use thiserror::Error;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("fjall error: {0}")]
    Fjall(#[from] fjall::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("job not found: {0}")]
    JobNotFound(String),

    #[error("job {0} already admitted")]
    AlreadyExists(String),

    #[error("job {0} is not waiting (cannot start)")]
    NotWaiting(String),

    #[error("job {0} is not active (cannot update progress or complete)")]
    NotActive(String),

    #[error("job {0} is active; delete is rejected")]
    ActiveJobNotRemovable(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, LedgerError>;
