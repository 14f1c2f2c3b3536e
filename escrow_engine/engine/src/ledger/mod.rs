//! Ledger seam: the blob store, account reads, instruction submission and the
//! two subscription feeds the engine consumes. Implemented in-process by
//! [`memory::MemoryLedger`] and over gRPC by the server crate's client.

pub mod memory;

pub use memory::{BlobIdScheme, MemoryLedger};

use async_trait::async_trait;
use ed25519_dalek::{Signature, Verifier};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::crypto::signing::{Identity, parse_public_key};
use crate::error::{EscrowError, EscrowResult};

/// Name/value metadata attached to a blob at upload time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobTag {
    pub name: String,
    pub value: String,
}

impl BlobTag {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        BlobTag {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// An instruction addressed to an on-ledger program, signed by its submitter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedInstruction {
    pub program: String,
    pub data: Vec<u8>,
    /// Raw Ed25519 public key of the signer.
    pub signer: Vec<u8>,
    /// Signature over `program || data`.
    pub signature: Vec<u8>,
}

impl SignedInstruction {
    pub fn sign(identity: &Identity, program: impl Into<String>, data: Vec<u8>) -> Self {
        let program = program.into();
        let signature = identity.sign(&Self::message(&program, &data));
        SignedInstruction {
            program,
            data,
            signer: identity.public_key().as_bytes().to_vec(),
            signature,
        }
    }

    fn message(program: &str, data: &[u8]) -> Vec<u8> {
        let mut message = Vec::with_capacity(program.len() + data.len());
        message.extend_from_slice(program.as_bytes());
        message.extend_from_slice(data);
        message
    }

    pub fn verify(&self) -> EscrowResult<()> {
        let key = parse_public_key(&self.signer)?;
        let signature = Signature::from_slice(&self.signature)
            .map_err(|e| EscrowError::Validation(format!("instruction signature: {e}")))?;
        key.verify(&Self::message(&self.program, &self.data), &signature)
            .map_err(|_| EscrowError::Unauthorized("instruction signature does not verify".into()))
    }
}

/// New contents of a watched account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountUpdate {
    pub address: String,
    pub data: Vec<u8>,
}

/// One transaction's log output, as seen by a log subscriber.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEvent {
    /// Position in the ledger's log history, strictly increasing.
    pub sequence: u64,
    /// Transaction signature / id.
    pub signature: String,
    /// Account the transaction touched (the subscription key).
    pub address: String,
    pub logs: Vec<String>,
    pub memo: Option<String>,
    /// The transaction failed; subscribers ignore failed events.
    pub failed: bool,
}

/// A cancellable stream of ledger notifications.
///
/// Dropping the subscription (or calling [`Subscription::unsubscribe`]) stops
/// delivery and aborts any background feed task.
pub struct Subscription<T> {
    rx: mpsc::UnboundedReceiver<T>,
    task: Option<JoinHandle<()>>,
}

impl<T> Subscription<T> {
    pub fn new(rx: mpsc::UnboundedReceiver<T>) -> Self {
        Subscription { rx, task: None }
    }

    /// A subscription whose items are produced by `task`.
    pub fn with_task(rx: mpsc::UnboundedReceiver<T>, task: JoinHandle<()>) -> Self {
        Subscription {
            rx,
            task: Some(task),
        }
    }

    /// Next notification, or `None` once the feed has ended.
    pub async fn next(&mut self) -> Option<T> {
        self.rx.recv().await
    }

    pub fn unsubscribe(self) {}
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        self.rx.close();
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

#[async_trait]
pub trait Ledger: Send + Sync {
    /// Upload an immutable blob; returns its content id.
    async fn submit_blob(&self, data: Vec<u8>, tags: Vec<BlobTag>) -> EscrowResult<String>;

    async fn fetch_blob(&self, id: &str) -> EscrowResult<Option<Vec<u8>>>;

    async fn read_account_state(&self, address: &str) -> EscrowResult<Option<Vec<u8>>>;

    /// Submit a signed instruction; returns the transaction signature.
    async fn submit_instruction(&self, instruction: SignedInstruction) -> EscrowResult<String>;

    async fn subscribe_account_changes(&self, address: &str) -> EscrowResult<Subscription<AccountUpdate>>;

    async fn subscribe_logs(&self, address: &str) -> EscrowResult<Subscription<LogEvent>>;
}
