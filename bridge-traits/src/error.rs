use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Bridge capability not available: {0}")]
    NotAvailable(String),

    #[error("Bridge operation failed: {0}")]
    OperationFailed(String),

    #[error("Media load failed for {url}: {reason}")]
    LoadFailed { url: String, reason: String },

    #[error("Observer already registered")]
    AlreadyObserved,

    #[error("Observer not registered")]
    NotObserved,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, BridgeError>;
