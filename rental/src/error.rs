//! Service error taxonomy.
//!
//! Only failures the caller can act on surface here. Lock-store, cache and
//! event-bus failures degrade a guarantee and are logged where they happen.

use rentflow_core::repository::RepositoryError;
use rentflow_runtime::HandlerError;
use thiserror::Error;

/// Errors returned by the rental services.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RentalError {
    /// Input rejected before any state change
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Referenced record does not exist
    #[error("{entity} {id} not found")]
    NotFound {
        /// Entity kind
        entity: &'static str,
        /// Raw id
        id: i64,
    },

    /// Lifecycle transition not permitted
    #[error("Cannot move from {from} to {to}")]
    InvalidTransition {
        /// Current status
        from: &'static str,
        /// Requested status
        to: &'static str,
    },

    /// Durable store failure
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Convenience alias for service results.
pub type Result<T> = std::result::Result<T, RentalError>;

impl From<RentalError> for HandlerError {
    fn from(error: RentalError) -> Self {
        Self::Failed(error.to_string())
    }
}
