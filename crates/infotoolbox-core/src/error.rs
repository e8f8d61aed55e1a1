//! Error type shared by the estimators.

use thiserror::Error;

/// Errors raised by the estimators.
///
/// Every check runs before any accumulation starts, so a returned error never
/// comes with partial output.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InfoError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

pub type Result<T> = std::result::Result<T, InfoError>;

impl InfoError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }
}
