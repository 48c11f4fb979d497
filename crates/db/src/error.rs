use thiserror::Error;

use crate::models::{RequestId, RequestStatus};

/// Failures reported by store implementations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{entity} '{key}' not found")]
    NotFound { entity: &'static str, key: String },

    #[error("{entity} '{key}' already exists")]
    Duplicate { entity: &'static str, key: String },

    /// Compare-and-set on a request status lost the race.
    #[error("request {id} is {current}, expected {expected}")]
    StatusMismatch {
        id: RequestId,
        current: RequestStatus,
        expected: RequestStatus,
    },

    #[error("asset storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage backend failure: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn not_found(entity: &'static str, key: impl ToString) -> Self {
        Self::NotFound {
            entity,
            key: key.to_string(),
        }
    }

    pub fn duplicate(entity: &'static str, key: impl ToString) -> Self {
        Self::Duplicate {
            entity,
            key: key.to_string(),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
