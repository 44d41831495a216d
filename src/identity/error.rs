use crate::identity::{password::HashError, store::StoreError};
use crate::oauth::ProviderError;
use thiserror::Error;

/// Failure taxonomy of the identity core. The boundary collapses most
/// of these into generic messages; the variants stay distinct here so
/// logs and tests can tell causes apart.
#[derive(Debug, Error)]
pub enum Error {
    /// No matching account. Also returned for a wrong password so the
    /// caller cannot probe which emails are registered.
    #[error("account not found")]
    NotFound,
    #[error("email already registered")]
    EmailTaken,
    #[error("email domain not allowed")]
    DomainNotAllowed,
    #[error("account not confirmed")]
    NotConfirmed,
    #[error("invalid token")]
    InvalidToken,
    #[error("token expired")]
    Expired,
    #[error("oauth state mismatch")]
    StateMismatch,
    #[error("hashing failed")]
    HashFailure,
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error("store error: {0}")]
    Store(StoreError),
}

impl From<StoreError> for Error {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => Self::NotFound,
            StoreError::EmailTaken => Self::EmailTaken,
            // a lost compare-and-set reads as a stale token to callers
            StoreError::Conflict => Self::InvalidToken,
            other => Self::Store(other),
        }
    }
}

impl From<HashError> for Error {
    fn from(_: HashError) -> Self {
        Self::HashFailure
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_errors_map_to_core_variants() {
        assert!(matches!(Error::from(StoreError::NotFound), Error::NotFound));
        assert!(matches!(
            Error::from(StoreError::EmailTaken),
            Error::EmailTaken
        ));
        assert!(matches!(
            Error::from(StoreError::Conflict),
            Error::InvalidToken
        ));
    }
}
