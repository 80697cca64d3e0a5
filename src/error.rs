use reqwest::StatusCode;
use thiserror::Error;

/// Failure talking to the webhook. Either kind releases the quota reservation.
#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("webhook returned HTTP {0}")]
    Status(StatusCode),
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("storage encoding error: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("daily query limit of {limit} reached")]
    QuotaExceeded { limit: u32 },
    #[error("a message is already being sent")]
    SendInProgress,
    #[error("message is {len}/{max} characters")]
    MessageTooLong { len: usize, max: usize },
    #[error(transparent)]
    Network(#[from] NetworkError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}
