//! Error types for Veilstone.

use crate::ids::EntityId;
use thiserror::Error;

/// Top-level error type for Veilstone operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Entity not found or already removed
    #[error("entity not found: {0:?}")]
    EntityNotFound(EntityId),

    /// Configuration value rejected
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Serialization errors
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Result type for Veilstone operations.
pub type CoreResult<T> = Result<T, CoreError>;
