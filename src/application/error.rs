//! Application-level errors (wraps domain errors)

use thiserror::Error;

use crate::domain::{CategoryId, DomainError};
use crate::infrastructure::RemoteError;

/// Application errors wrap domain errors and add remote-protocol context.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApplicationError {
    #[error("{0}")]
    Domain(#[from] DomainError),

    #[error("failed to load {target}: {source}")]
    LoadFailed {
        target: String,
        #[source]
        source: RemoteError,
    },

    #[error("update of {id} rejected: {source}")]
    UpdateRejected {
        id: CategoryId,
        #[source]
        source: RemoteError,
    },

    #[error("rollback of {id} failed, remote order may be inconsistent: {compensation} (after: {original})")]
    CompensationFailed {
        id: CategoryId,
        original: RemoteError,
        #[source]
        compensation: RemoteError,
    },

    #[error("config error: {message}")]
    Config { message: String },
}

impl ApplicationError {
    pub fn load_failed(target: impl Into<String>, source: RemoteError) -> Self {
        Self::LoadFailed {
            target: target.into(),
            source,
        }
    }

    /// True when the forest changed under a computed address.
    pub fn is_address_not_found(&self) -> bool {
        matches!(self, Self::Domain(DomainError::AddressNotFound { .. }))
    }
}

/// Result type for application layer operations.
pub type ApplicationResult<T> = Result<T, ApplicationError>;
