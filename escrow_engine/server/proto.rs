//! Wire messages and generated service stubs.
//!
//! Field tags are part of the wire contract; append, never renumber.

/// Reference to a governance proposal.
#[derive(Clone, PartialEq, prost::Message)]
pub struct Proposal {
    #[prost(string, tag = "1")]
    pub governance_group: String,
    #[prost(uint64, tag = "2")]
    pub transaction_index: u64,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct HealthRequest {}

#[derive(Clone, PartialEq, prost::Message)]
pub struct HealthResponse {
    #[prost(string, tag = "1")]
    pub status: String,
}

// key-holder

#[derive(Clone, PartialEq, prost::Message)]
pub struct StoreShareRequest {
    #[prost(string, tag = "1")]
    pub escrow_id: String,
    /// Share bytes sealed to the key-holder's public key.
    #[prost(bytes = "vec", tag = "2")]
    pub sealed_share: Vec<u8>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct StoreShareResponse {}

#[derive(Clone, PartialEq, prost::Message)]
pub struct GetShareRequest {
    #[prost(bytes = "vec", tag = "1")]
    pub requester_public_key: Vec<u8>,
    #[prost(bytes = "vec", tag = "2")]
    pub signature: Vec<u8>,
    #[prost(string, tag = "3")]
    pub escrow_id: String,
    #[prost(message, optional, tag = "4")]
    pub proposal: Option<Proposal>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct GetShareResponse {
    #[prost(bytes = "vec", tag = "1")]
    pub sealed_share: Vec<u8>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct DescribeRequest {}

#[derive(Clone, PartialEq, prost::Message)]
pub struct DescribeResponse {
    #[prost(string, tag = "1")]
    pub label: String,
    #[prost(bytes = "vec", tag = "2")]
    pub public_key: Vec<u8>,
    #[prost(uint64, tag = "3")]
    pub share_count: u64,
}

// storage gateway

#[derive(Clone, PartialEq, prost::Message)]
pub struct StoreRequest {
    #[prost(bytes = "vec", tag = "1")]
    pub data: Vec<u8>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct StoreResponse {
    #[prost(string, tag = "1")]
    pub escrow_id: String,
    #[prost(uint32, tag = "2")]
    pub stored: u32,
    #[prost(uint32, tag = "3")]
    pub failed: u32,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct RetrieveRequest {
    #[prost(string, tag = "1")]
    pub escrow_id: String,
    #[prost(message, optional, tag = "2")]
    pub proposal: Option<Proposal>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct RetrieveResponse {
    #[prost(bytes = "vec", tag = "1")]
    pub document: Vec<u8>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct RetrieveSealedRequest {
    #[prost(string, tag = "1")]
    pub escrow_id: String,
    #[prost(bytes = "vec", tag = "2")]
    pub requester_public_key: Vec<u8>,
    #[prost(message, optional, tag = "3")]
    pub proposal: Option<Proposal>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct RetrieveSealedResponse {
    #[prost(bytes = "vec", tag = "1")]
    pub ciphertext: Vec<u8>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct OperatorInfoRequest {}

#[derive(Clone, PartialEq, prost::Message)]
pub struct OperatorInfoResponse {
    /// Hex Ed25519 public key the gateway reconstructs with.
    #[prost(string, tag = "1")]
    pub public_key: String,
}

// development ledger

#[derive(Clone, PartialEq, prost::Message)]
pub struct Tag {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(string, tag = "2")]
    pub value: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct SubmitBlobRequest {
    #[prost(bytes = "vec", tag = "1")]
    pub data: Vec<u8>,
    #[prost(message, repeated, tag = "2")]
    pub tags: Vec<Tag>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct SubmitBlobResponse {
    #[prost(string, tag = "1")]
    pub id: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct FetchBlobRequest {
    #[prost(string, tag = "1")]
    pub id: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct FetchBlobResponse {
    #[prost(bool, tag = "1")]
    pub found: bool,
    #[prost(bytes = "vec", tag = "2")]
    pub data: Vec<u8>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct ReadAccountRequest {
    #[prost(string, tag = "1")]
    pub address: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct ReadAccountResponse {
    #[prost(bool, tag = "1")]
    pub found: bool,
    #[prost(bytes = "vec", tag = "2")]
    pub data: Vec<u8>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct SubmitInstructionRequest {
    #[prost(string, tag = "1")]
    pub program: String,
    #[prost(bytes = "vec", tag = "2")]
    pub data: Vec<u8>,
    #[prost(bytes = "vec", tag = "3")]
    pub signer: Vec<u8>,
    #[prost(bytes = "vec", tag = "4")]
    pub signature: Vec<u8>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct SubmitInstructionResponse {
    #[prost(string, tag = "1")]
    pub signature: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct LogEntry {
    #[prost(uint64, tag = "1")]
    pub sequence: u64,
    #[prost(string, tag = "2")]
    pub signature: String,
    #[prost(string, tag = "3")]
    pub address: String,
    #[prost(string, repeated, tag = "4")]
    pub logs: Vec<String>,
    #[prost(string, optional, tag = "5")]
    pub memo: Option<String>,
    #[prost(bool, tag = "6")]
    pub failed: bool,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct LogsSinceRequest {
    #[prost(string, tag = "1")]
    pub address: String,
    /// Return entries with a sequence strictly greater than this.
    #[prost(uint64, tag = "2")]
    pub after: u64,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct LogsSinceResponse {
    #[prost(message, repeated, tag = "1")]
    pub entries: Vec<LogEntry>,
    /// Highest sequence in the whole ledger at the time of the call.
    #[prost(uint64, tag = "2")]
    pub head: u64,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct PutAccountRequest {
    #[prost(string, tag = "1")]
    pub address: String,
    #[prost(bytes = "vec", tag = "2")]
    pub data: Vec<u8>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct PutAccountResponse {}

#[derive(Clone, PartialEq, prost::Message)]
pub struct AppendLogRequest {
    #[prost(string, tag = "1")]
    pub address: String,
    #[prost(string, repeated, tag = "2")]
    pub logs: Vec<String>,
    #[prost(string, optional, tag = "3")]
    pub memo: Option<String>,
    #[prost(bool, tag = "4")]
    pub failed: bool,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct AppendLogResponse {
    #[prost(message, optional, tag = "1")]
    pub entry: Option<LogEntry>,
}

impl From<escrow_engine::ledger::LogEvent> for LogEntry {
    fn from(event: escrow_engine::ledger::LogEvent) -> Self {
        LogEntry {
            sequence: event.sequence,
            signature: event.signature,
            address: event.address,
            logs: event.logs,
            memo: event.memo,
            failed: event.failed,
        }
    }
}

impl From<LogEntry> for escrow_engine::ledger::LogEvent {
    fn from(entry: LogEntry) -> Self {
        escrow_engine::ledger::LogEvent {
            sequence: entry.sequence,
            signature: entry.signature,
            address: entry.address,
            logs: entry.logs,
            memo: entry.memo,
            failed: entry.failed,
        }
    }
}

impl From<&escrow_engine::ProposalRef> for Proposal {
    fn from(proposal: &escrow_engine::ProposalRef) -> Self {
        Proposal {
            governance_group: proposal.governance_group.clone(),
            transaction_index: proposal.transaction_index,
        }
    }
}

impl From<Proposal> for escrow_engine::ProposalRef {
    fn from(proposal: Proposal) -> Self {
        escrow_engine::ProposalRef::new(proposal.governance_group, proposal.transaction_index)
    }
}

include!(concat!(env!("OUT_DIR"), "/escrow.keyholder.KeyHolder.rs"));
include!(concat!(env!("OUT_DIR"), "/escrow.gateway.StorageGateway.rs"));
include!(concat!(env!("OUT_DIR"), "/escrow.ledger.Ledger.rs"));
