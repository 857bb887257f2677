//! Boundary Error Taxonomy
//!
//! Every coordinator operation returns exactly one of these kinds.
//! Layer-specific errors (`ChainError`, `StoreError`, `ProofError`) are
//! folded in through `From` so handlers can use `?` throughout.

use std::time::Duration;
use thiserror::Error;

use crate::chain::ChainError;
use crate::proof::ProofError;
use crate::store::StoreError;

/// Coordinator errors.
#[derive(Debug, Error)]
pub enum CoordError {
    /// Malformed or missing fields, invalid role value.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Signature does not match the claimed signer.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// Caller may not perform this action.
    #[error("not authorized: {0}")]
    Authorization(String),

    /// No secret stored, discussion not started.
    #[error("not found: {0}")]
    NotFound(String),

    /// Proof generation overran its deadline.
    #[error("proof generation timed out after {0:?}")]
    Timeout(Duration),

    /// RPC failure or exhausted log search.
    #[error("chain unavailable: {0}")]
    TransientChain(String),

    /// Key-value store failure.
    #[error("storage error: {0}")]
    Storage(String),

    /// Proof backend failed for a reason other than timeout.
    #[error("proof generation failed: {0}")]
    Proof(String),
}

impl CoordError {
    /// Shorthand for a validation error.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Shorthand for an authorization error.
    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Authorization(msg.into())
    }

    /// Shorthand for a not-found error.
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }
}

impl From<ChainError> for CoordError {
    fn from(err: ChainError) -> Self {
        match err {
            ChainError::RoomNotFound(room) => Self::NotFound(format!("room {} does not exist", room)),
            other => Self::TransientChain(other.to_string()),
        }
    }
}

impl From<StoreError> for CoordError {
    fn from(err: StoreError) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<ProofError> for CoordError {
    fn from(err: ProofError) -> Self {
        match err {
            ProofError::Timeout(after) => Self::Timeout(after),
            other => Self::Proof(other.to_string()),
        }
    }
}

/// Result alias for coordinator operations.
pub type CoordResult<T> = Result<T, CoordError>;
