//! Error types for Apple Farm metering.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid API credential")]
    InvalidCredential,

    #[error("Invalid tier: {0}")]
    InvalidTier(String),

    #[error("Invalid email address: {0}")]
    InvalidEmail(String),

    #[error("Revenue ledger error: {0}")]
    Ledger(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}
