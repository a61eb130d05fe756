use thiserror::Error;

#[derive(Error, Debug)]
pub enum ElementError {
    #[error("Failed to decode event record: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Event record has no action")]
    MissingAction,
}

pub type Result<T> = std::result::Result<T, ElementError>;
