use thiserror::Error;

/// Errors raised while assembling the bridge configuration or logging.
#[derive(Error, Debug)]
pub enum Error {
    /// A setting is out of range or a filter directive does not parse.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A required host capability was not injected.
    #[error("Capability missing: {capability} - {message}")]
    CapabilityMissing { capability: String, message: String },
}

pub type Result<T> = std::result::Result<T, Error>;
