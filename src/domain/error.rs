//! Domain-level errors (no external dependencies)

use thiserror::Error;

use crate::domain::CategoryId;

/// Domain errors represent structural lookups that failed against a forest snapshot.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("address not found in forest: {address}")]
    AddressNotFound { address: String },

    #[error("category not found: {0}")]
    NodeNotFound(CategoryId),

    #[error("invalid address: {0}")]
    InvalidAddress(String),
}

/// Result type for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;
