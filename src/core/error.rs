use thiserror::Error;

#[derive(Error, Debug)]
pub enum SimError {
    #[error("invalid parameters: {0}")]
    Validation(String),

    #[error("worker {worker} failed: {reason}")]
    WorkerFailed { worker: usize, reason: String },

    #[error("simulation cancelled")]
    Cancelled,

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type SimResult<T> = Result<T, SimError>;
