//! Escrow Engine Core Library
//!
//! Documents are encrypted under a one-off key, the ciphertext goes to the
//! ledger and the key is split across independent key-holders. A share is
//! only released to a requester who signs for it and whose governance
//! proposal has executed.

pub mod audit;
pub mod config;
pub mod crypto;
pub mod distribution;
pub mod error;
pub mod gateway;
pub mod governance;
pub mod keyholder;
pub mod ledger;
pub mod logging;
pub mod monitor;
pub mod rotation;
pub mod types;
pub mod vault;

pub use error::{EscrowError, EscrowResult};
pub use types::{AccessProof, AccessRequest, EpochId, EscrowId, ProposalRef, Secret};

#[cfg(test)]
mod tests;
