use headlessd_common::FromMessage;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid: {0}")]
    Invalid(String),

    #[error("not found")]
    NotFound,

    #[error("backend unavailable: {0}")]
    Backend(String),

    #[error("{0}")]
    Message(String),
}

impl Error {
    #[must_use]
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid(message.into())
    }

    #[must_use]
    pub fn backend(message: impl std::fmt::Display) -> Self {
        Self::Backend(message.to_string())
    }
}

impl From<redis::RedisError> for Error {
    fn from(err: redis::RedisError) -> Self {
        Self::Backend(err.to_string())
    }
}

impl FromMessage for Error {
    fn from_message(message: String) -> Self {
        Self::Message(message)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

headlessd_common::impl_context!();
