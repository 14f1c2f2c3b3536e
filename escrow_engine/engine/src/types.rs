//! Shared data types for the escrow engine: escrow ids, epochs, secrets and access requests.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Datelike, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::crypto::signing::Identity;
use crate::error::{EscrowError, EscrowResult};

/// Length in bytes of every escrowed symmetric key.
pub const SECRET_LEN: usize = 32;

/// Upper bound on the textual length of a document escrow id.
pub const MAX_ESCROW_ID_LEN: usize = 128;

/// A 256-bit symmetric key. Wiped from memory on drop and never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(Zeroizing<[u8; SECRET_LEN]>);

impl Secret {
    /// Fresh key from the thread-local CSPRNG.
    pub fn generate() -> Self {
        let mut key = Zeroizing::new([0u8; SECRET_LEN]);
        rand::thread_rng().fill_bytes(&mut key[..]);
        Secret(key)
    }

    pub fn from_bytes(bytes: &[u8]) -> EscrowResult<Self> {
        if bytes.len() != SECRET_LEN {
            return Err(EscrowError::Validation(format!(
                "secret must be {SECRET_LEN} bytes, got {}",
                bytes.len()
            )));
        }
        let mut key = Zeroizing::new([0u8; SECRET_LEN]);
        key.copy_from_slice(bytes);
        Ok(Secret(key))
    }

    pub fn as_bytes(&self) -> &[u8; SECRET_LEN] {
        &self.0
    }
}

impl From<[u8; SECRET_LEN]> for Secret {
    fn from(bytes: [u8; SECRET_LEN]) -> Self {
        Secret(Zeroizing::new(bytes))
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(<redacted>)")
    }
}

/// A calendar month (UTC) during which one rotation secret is valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EpochId {
    year: i32,
    month: u32,
}

impl EpochId {
    pub fn new(year: i32, month: u32) -> EscrowResult<Self> {
        if !(1..=12).contains(&month) {
            return Err(EscrowError::Validation(format!("invalid epoch month {month}")));
        }
        if !(0..=9999).contains(&year) {
            return Err(EscrowError::Validation(format!("invalid epoch year {year}")));
        }
        Ok(EpochId { year, month })
    }

    /// Epoch containing the given instant.
    pub fn from_datetime(at: &DateTime<Utc>) -> Self {
        EpochId {
            year: at.year(),
            month: at.month(),
        }
    }

    /// Epoch for the current wall-clock month.
    pub fn current() -> Self {
        Self::from_datetime(&Utc::now())
    }

    /// The following calendar month.
    pub fn next(&self) -> Self {
        if self.month == 12 {
            EpochId {
                year: self.year + 1,
                month: 1,
            }
        } else {
            EpochId {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }
}

impl fmt::Display for EpochId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for EpochId {
    type Err = EscrowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = s.as_bytes();
        let well_formed = bytes.len() == 7
            && bytes[4] == b'-'
            && bytes[..4].iter().all(u8::is_ascii_digit)
            && bytes[5..].iter().all(u8::is_ascii_digit);
        if !well_formed {
            return Err(EscrowError::Validation(format!("not an epoch id: {s}")));
        }
        let year = s[..4]
            .parse::<i32>()
            .map_err(|e| EscrowError::Validation(format!("bad epoch year: {e}")))?;
        let month = s[5..]
            .parse::<u32>()
            .map_err(|e| EscrowError::Validation(format!("bad epoch month: {e}")))?;
        EpochId::new(year, month)
    }
}

impl TryFrom<String> for EpochId {
    type Error = EscrowError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<EpochId> for String {
    fn from(epoch: EpochId) -> Self {
        epoch.to_string()
    }
}

/// Identifier of one escrowed secret bundle.
///
/// Documents are keyed by the ledger content id of their ciphertext; rotation
/// secrets are keyed by their calendar epoch.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EscrowId {
    Document(String),
    Epoch(EpochId),
}

impl EscrowId {
    /// Wraps a ledger content id, rejecting values that would be ambiguous or unsafe.
    pub fn document(id: impl Into<String>) -> EscrowResult<Self> {
        let id = id.into();
        validate_document_id(&id)?;
        if id.parse::<EpochId>().is_ok() {
            return Err(EscrowError::Validation(format!(
                "document id {id} collides with the epoch namespace"
            )));
        }
        Ok(EscrowId::Document(id))
    }

    pub fn epoch(epoch: EpochId) -> Self {
        EscrowId::Epoch(epoch)
    }

    pub fn is_epoch(&self) -> bool {
        matches!(self, EscrowId::Epoch(_))
    }

    /// Bytes a requester signs to prove control of their key.
    pub fn message_bytes(&self) -> Vec<u8> {
        self.to_string().into_bytes()
    }
}

fn validate_document_id(id: &str) -> EscrowResult<()> {
    if id.is_empty() {
        return Err(EscrowError::Validation("escrow id is required".into()));
    }
    if id.len() > MAX_ESCROW_ID_LEN {
        return Err(EscrowError::Validation(format!(
            "escrow id longer than {MAX_ESCROW_ID_LEN} bytes"
        )));
    }
    if id.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(EscrowError::Validation("escrow id contains whitespace".into()));
    }
    Ok(())
}

impl fmt::Display for EscrowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EscrowId::Document(id) => f.write_str(id),
            EscrowId::Epoch(epoch) => epoch.fmt(f),
        }
    }
}

impl FromStr for EscrowId {
    type Err = EscrowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(epoch) = s.parse::<EpochId>() {
            return Ok(EscrowId::Epoch(epoch));
        }
        validate_document_id(s)?;
        Ok(EscrowId::Document(s.to_string()))
    }
}

/// Points at one proposal of one governance group.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProposalRef {
    pub governance_group: String,
    pub transaction_index: u64,
}

impl ProposalRef {
    pub fn new(governance_group: impl Into<String>, transaction_index: u64) -> Self {
        ProposalRef {
            governance_group: governance_group.into(),
            transaction_index,
        }
    }

    /// Address of the proposal account on the ledger.
    pub fn proposal_address(&self) -> String {
        crate::governance::proposal_address(&self.governance_group, self.transaction_index)
    }
}

/// What a requester presents to a key-holder to obtain a sealed share.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessRequest {
    /// Raw Ed25519 public key bytes.
    pub requester_public_key: Vec<u8>,
    /// Ed25519 signature over `escrow_id.message_bytes()`.
    pub signature: Vec<u8>,
    pub escrow_id: EscrowId,
    pub proposal: ProposalRef,
}

/// A requester identity plus the governance decision it relies on.
///
/// Held by whoever reconstructs secrets; it signs one access request per
/// escrow id and opens the sealed shares that come back.
#[derive(Clone)]
pub struct AccessProof {
    identity: Arc<Identity>,
    proposal: ProposalRef,
}

impl AccessProof {
    pub fn new(identity: Arc<Identity>, proposal: ProposalRef) -> Self {
        AccessProof { identity, proposal }
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn proposal(&self) -> &ProposalRef {
        &self.proposal
    }

    pub fn request_for(&self, escrow_id: &EscrowId) -> AccessRequest {
        self.identity.access_request(escrow_id, self.proposal.clone())
    }
}

impl fmt::Debug for AccessProof {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessProof")
            .field("requester", &self.identity.public_key_hex())
            .field("proposal", &self.proposal)
            .finish()
    }
}
