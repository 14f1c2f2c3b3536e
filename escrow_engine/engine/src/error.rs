//! Centralized escrow engine error types.

use thiserror::Error;

/// Result alias used across the engine.
pub type EscrowResult<T> = Result<T, EscrowError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EscrowError {
    /// Input validation or integrity error (missing fields, malformed keys, bad parameters).
    #[error("Validation error: {0}")]
    Validation(String),
    /// The requester could not prove control of the signing key.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    /// Governance authorization failed (proposal not executed, not a member).
    #[error("Forbidden: {0}")]
    Forbidden(String),
    /// No share or document exists for the given escrow id.
    #[error("Not found: {0}")]
    NotFound(String),
    /// Too few shares were collected to reconstruct a secret.
    #[error("Insufficient shares: have {have}, need {need}")]
    InsufficientShares { have: usize, need: usize },
    /// Fewer than threshold key-holders accepted a share; the secret may be unrecoverable.
    #[error("Distribution failed for {escrow_id}: stored {stored}, required {required}")]
    DistributionFailed {
        escrow_id: String,
        stored: usize,
        required: usize,
    },
    /// A share store could not be read or written.
    #[error("Persistence failure: {0}")]
    Persistence(String),
    /// The ledger (blob store, account reads, instruction submission) failed.
    #[error("Ledger failure: {0}")]
    Ledger(String),
    /// Symmetric decryption failed (wrong key or corrupted blob).
    #[error("Decryption failed: {0}")]
    Decryption(String),
    /// A sealed payload could not be opened.
    #[error("Unseal failed: {0}")]
    Unseal(String),
    /// A remote service was unreachable or timed out.
    #[error("Service unavailable: {0}")]
    Unavailable(String),
}

impl EscrowError {
    /// Only transport-level failures are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, EscrowError::Unavailable(_))
    }

    /// Short category label used in logs and audit records.
    pub fn category(&self) -> &'static str {
        match self {
            EscrowError::Validation(_) => "validation",
            EscrowError::Unauthorized(_) => "unauthorized",
            EscrowError::Forbidden(_) => "forbidden",
            EscrowError::NotFound(_) => "not_found",
            EscrowError::InsufficientShares { .. } => "insufficient_shares",
            EscrowError::DistributionFailed { .. } => "distribution_failed",
            EscrowError::Persistence(_) => "persistence",
            EscrowError::Ledger(_) => "ledger",
            EscrowError::Decryption(_) => "decryption",
            EscrowError::Unseal(_) => "unseal",
            EscrowError::Unavailable(_) => "unavailable",
        }
    }
}

