//! Read-only view of the external governance program, plus an operator that
//! submits votes to it.
//!
//! Account contents are JSON documents owned by the program; the engine only
//! decodes them. Proposal accounts live at an address derived from the group
//! and the transaction index, the group account lives at the group address.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use ed25519_dalek::VerifyingKey;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::crypto::signing::Identity;
use crate::error::{EscrowError, EscrowResult};
use crate::ledger::{Ledger, SignedInstruction};
use crate::types::{EscrowId, ProposalRef};

/// Program id instructions are addressed to.
pub const GOVERNANCE_PROGRAM: &str = "escrow-governance";

/// Prefix of the memo a requester attaches when opening an access proposal.
pub const ACCESS_MEMO_PREFIX: &str = "Requesting access to document: ";

/// Log line emitted by the governance program when a proposal is created.
pub const PROPOSAL_CREATE_LOG: &str = "Instruction: ProposalCreate";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposalStatus {
    Draft,
    Active,
    Approved,
    Rejected,
    Executing,
    Executed,
    Cancelled,
}

impl ProposalStatus {
    /// No further transitions happen after a terminal status.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ProposalStatus::Executed | ProposalStatus::Rejected | ProposalStatus::Cancelled
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProposalStatus::Draft => "draft",
            ProposalStatus::Active => "active",
            ProposalStatus::Approved => "approved",
            ProposalStatus::Rejected => "rejected",
            ProposalStatus::Executing => "executing",
            ProposalStatus::Executed => "executed",
            ProposalStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for ProposalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProposalStatus {
    type Err = EscrowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "draft" => Ok(ProposalStatus::Draft),
            "active" => Ok(ProposalStatus::Active),
            "approved" => Ok(ProposalStatus::Approved),
            "rejected" => Ok(ProposalStatus::Rejected),
            "executing" => Ok(ProposalStatus::Executing),
            "executed" => Ok(ProposalStatus::Executed),
            "cancelled" => Ok(ProposalStatus::Cancelled),
            other => Err(EscrowError::Validation(format!("unknown proposal status {other}"))),
        }
    }
}

/// On-ledger proposal account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalAccount {
    pub governance_group: String,
    pub transaction_index: u64,
    pub status: ProposalStatus,
    /// Hex public keys of members who approved.
    #[serde(default)]
    pub approved: Vec<String>,
    #[serde(default)]
    pub rejected: Vec<String>,
}

impl ProposalAccount {
    pub fn new(proposal: &ProposalRef, status: ProposalStatus) -> Self {
        ProposalAccount {
            governance_group: proposal.governance_group.clone(),
            transaction_index: proposal.transaction_index,
            status,
            approved: Vec::new(),
            rejected: Vec::new(),
        }
    }

    pub fn proposal_ref(&self) -> ProposalRef {
        ProposalRef::new(self.governance_group.clone(), self.transaction_index)
    }

    pub fn encode(&self) -> EscrowResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| EscrowError::Ledger(format!("encode proposal: {e}")))
    }

    pub fn decode(data: &[u8]) -> EscrowResult<Self> {
        serde_json::from_slice(data).map_err(|e| EscrowError::Ledger(format!("malformed proposal account: {e}")))
    }
}

/// On-ledger governance group (multisig) account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GovernanceGroup {
    /// Hex Ed25519 public keys.
    pub members: Vec<String>,
    pub threshold: u16,
    /// Index of the most recently created proposal.
    #[serde(default)]
    pub transaction_index: u64,
}

impl GovernanceGroup {
    pub fn new(members: &[VerifyingKey], threshold: u16) -> Self {
        GovernanceGroup {
            members: members.iter().map(|k| hex::encode(k.as_bytes())).collect(),
            threshold,
            transaction_index: 0,
        }
    }

    pub fn is_member(&self, key: &VerifyingKey) -> bool {
        let wanted = hex::encode(key.as_bytes());
        self.members.iter().any(|m| m.eq_ignore_ascii_case(&wanted))
    }

    pub fn encode(&self) -> EscrowResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| EscrowError::Ledger(format!("encode governance group: {e}")))
    }

    pub fn decode(data: &[u8]) -> EscrowResult<Self> {
        serde_json::from_slice(data)
            .map_err(|e| EscrowError::Ledger(format!("malformed governance group account: {e}")))
    }
}

/// Deterministic address of the proposal account for `(group, index)`.
pub fn proposal_address(governance_group: &str, transaction_index: u64) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(b"proposal");
    hasher.update(governance_group.as_bytes());
    hasher.update(&transaction_index.to_le_bytes());
    hasher.finalize().to_hex().to_string()
}

pub fn creation_memo(escrow_id: &EscrowId) -> String {
    format!("{ACCESS_MEMO_PREFIX}{escrow_id}")
}

/// Extract the escrow id from an access-request memo.
///
/// The memo may be wrapped by the ledger (quoted, prefixed with a length);
/// the id runs from the prefix to the first character outside `[A-Za-z0-9_-]`.
pub fn parse_creation_memo(memo: &str) -> Option<EscrowId> {
    let start = memo.find(ACCESS_MEMO_PREFIX)? + ACCESS_MEMO_PREFIX.len();
    let id: String = memo[start..]
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
        .collect();
    EscrowId::document(id).ok()
}

pub fn is_proposal_create(logs: &[String]) -> bool {
    logs.iter().any(|line| line.contains(PROPOSAL_CREATE_LOG))
}

/// Transaction index from the log line that mentions it (last token of that line).
pub fn parse_transaction_index(logs: &[String]) -> Option<u64> {
    logs.iter()
        .find(|line| line.contains("transaction_index"))
        .and_then(|line| line.split_whitespace().last())
        .and_then(|token| token.trim_matches(|c: char| !c.is_ascii_digit()).parse().ok())
}

/// Check that `proposal` is executed and that `requester` belongs to its group.
///
/// Reads the ledger on every call. A missing or foreign proposal is
/// `Forbidden`; a failed read surfaces as `Ledger`.
pub async fn authorize(ledger: &dyn Ledger, proposal: &ProposalRef, requester: &VerifyingKey) -> EscrowResult<()> {
    let address = proposal.proposal_address();
    let account = ledger
        .read_account_state(&address)
        .await?
        .ok_or_else(|| EscrowError::Forbidden("proposal not found".into()))?;
    let account = ProposalAccount::decode(&account)?;

    if account.governance_group != proposal.governance_group || account.transaction_index != proposal.transaction_index {
        return Err(EscrowError::Forbidden("proposal does not belong to this governance group".into()));
    }
    if account.status != ProposalStatus::Executed {
        return Err(EscrowError::Forbidden(format!("proposal is {}, not executed", account.status)));
    }

    let group = ledger
        .read_account_state(&proposal.governance_group)
        .await?
        .ok_or_else(|| EscrowError::Forbidden("unknown governance group".into()))?;
    let group = GovernanceGroup::decode(&group)?;
    if !group.is_member(requester) {
        return Err(EscrowError::Forbidden("requester is not a governance member".into()));
    }
    Ok(())
}

/// Votes understood by the governance program.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Instruction {
    ProposalApprove { governance_group: String, transaction_index: u64 },
    ProposalExecute { governance_group: String, transaction_index: u64 },
    ProposalReject { governance_group: String, transaction_index: u64 },
}

impl Instruction {
    pub fn encode(&self) -> EscrowResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| EscrowError::Validation(format!("encode instruction: {e}")))
    }

    pub fn decode(data: &[u8]) -> EscrowResult<Self> {
        serde_json::from_slice(data).map_err(|e| EscrowError::Validation(format!("malformed instruction: {e}")))
    }
}

/// Submits governance votes on behalf of an operator identity.
pub struct Operator {
    identity: Arc<Identity>,
    ledger: Arc<dyn Ledger>,
}

impl Operator {
    pub fn new(identity: Arc<Identity>, ledger: Arc<dyn Ledger>) -> Self {
        Operator { identity, ledger }
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub async fn approve(&self, proposal: &ProposalRef) -> EscrowResult<String> {
        self.submit(Instruction::ProposalApprove {
            governance_group: proposal.governance_group.clone(),
            transaction_index: proposal.transaction_index,
        })
        .await
    }

    pub async fn execute(&self, proposal: &ProposalRef) -> EscrowResult<String> {
        self.submit(Instruction::ProposalExecute {
            governance_group: proposal.governance_group.clone(),
            transaction_index: proposal.transaction_index,
        })
        .await
    }

    pub async fn reject(&self, proposal: &ProposalRef) -> EscrowResult<String> {
        self.submit(Instruction::ProposalReject {
            governance_group: proposal.governance_group.clone(),
            transaction_index: proposal.transaction_index,
        })
        .await
    }

    async fn submit(&self, instruction: Instruction) -> EscrowResult<String> {
        let signed = SignedInstruction::sign(&self.identity, GOVERNANCE_PROGRAM, instruction.encode()?);
        let signature = self.ledger.submit_instruction(signed).await?;
        info!(?instruction, %signature, operator = %self.identity.public_key_hex(), "governance instruction submitted");
        Ok(signature)
    }
}
