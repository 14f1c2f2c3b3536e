//! In-process ledger used by tests and by the development ledger service.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use tokio::sync::mpsc;
use tracing::debug;

use super::{AccountUpdate, BlobTag, Ledger, LogEvent, SignedInstruction, Subscription};
use crate::error::{EscrowError, EscrowResult};

/// How blob ids are minted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlobIdScheme {
    /// base64url(blake3(data)), like a content-addressed store.
    ContentHash,
    /// `tx1`, `tx2`, ... in upload order.
    Sequential,
}

#[derive(Debug, Clone)]
struct StoredBlob {
    data: Vec<u8>,
    tags: Vec<BlobTag>,
}

#[derive(Default)]
struct LedgerState {
    unavailable: bool,
    blobs: HashMap<String, StoredBlob>,
    blob_counter: u64,
    accounts: HashMap<String, Vec<u8>>,
    logs: Vec<LogEvent>,
    instructions: Vec<SignedInstruction>,
    account_watchers: Vec<(String, mpsc::UnboundedSender<AccountUpdate>)>,
    log_watchers: Vec<(String, mpsc::UnboundedSender<LogEvent>)>,
}

pub struct MemoryLedger {
    state: RwLock<LedgerState>,
    id_scheme: BlobIdScheme,
}

impl Default for MemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryLedger {
    pub fn new() -> Self {
        MemoryLedger {
            state: RwLock::new(LedgerState::default()),
            id_scheme: BlobIdScheme::ContentHash,
        }
    }

    pub fn with_sequential_ids() -> Self {
        MemoryLedger {
            state: RwLock::new(LedgerState::default()),
            id_scheme: BlobIdScheme::Sequential,
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, LedgerState> {
        self.state.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, LedgerState> {
        self.state.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn ensure_available(state: &LedgerState) -> EscrowResult<()> {
        if state.unavailable {
            return Err(EscrowError::Ledger("ledger unavailable".into()));
        }
        Ok(())
    }

    /// Simulate an outage: while unavailable every trait call fails.
    pub fn set_available(&self, available: bool) {
        self.write().unavailable = !available;
    }

    /// Overwrite an account and notify its watchers.
    pub fn put_account(&self, address: &str, data: Vec<u8>) {
        let mut state = self.write();
        state.accounts.insert(address.to_string(), data.clone());
        let update = AccountUpdate {
            address: address.to_string(),
            data,
        };
        state
            .account_watchers
            .retain(|(watched, tx)| watched != address || tx.send(update.clone()).is_ok());
    }

    /// Append one transaction's logs under `address` and notify log watchers.
    pub fn append_log(&self, address: &str, logs: Vec<String>, memo: Option<String>, failed: bool) -> LogEvent {
        let mut state = self.write();
        let sequence = state.logs.len() as u64 + 1;
        let event = LogEvent {
            sequence,
            signature: format!("sig{sequence}"),
            address: address.to_string(),
            logs,
            memo,
            failed,
        };
        state.logs.push(event.clone());
        state
            .log_watchers
            .retain(|(watched, tx)| watched != address || tx.send(event.clone()).is_ok());
        event
    }

    /// Every log event for `address` with a sequence greater than `after`.
    pub fn logs_since(&self, address: &str, after: u64) -> Vec<LogEvent> {
        self.read()
            .logs
            .iter()
            .filter(|event| event.address == address && event.sequence > after)
            .cloned()
            .collect()
    }

    /// Highest log sequence assigned so far, across all addresses.
    pub fn head(&self) -> u64 {
        self.read().logs.len() as u64
    }

    /// Instructions accepted so far, in submission order.
    pub fn instructions(&self) -> Vec<SignedInstruction> {
        self.read().instructions.clone()
    }

    /// Registered account and log watchers, closed ones included until swept.
    pub fn watcher_count(&self) -> (usize, usize) {
        let state = self.read();
        (state.account_watchers.len(), state.log_watchers.len())
    }

    pub fn blob_count(&self) -> usize {
        self.read().blobs.len()
    }

    pub fn blob_tags(&self, id: &str) -> Option<Vec<BlobTag>> {
        self.read().blobs.get(id).map(|blob| blob.tags.clone())
    }

    fn mint_blob_id(&self, state: &mut LedgerState, data: &[u8]) -> String {
        match self.id_scheme {
            BlobIdScheme::ContentHash => URL_SAFE_NO_PAD.encode(blake3::hash(data).as_bytes()),
            BlobIdScheme::Sequential => {
                state.blob_counter += 1;
                format!("tx{}", state.blob_counter)
            }
        }
    }
}

#[async_trait]
impl Ledger for MemoryLedger {
    async fn submit_blob(&self, data: Vec<u8>, tags: Vec<BlobTag>) -> EscrowResult<String> {
        let mut state = self.write();
        Self::ensure_available(&state)?;
        let id = self.mint_blob_id(&mut state, &data);
        debug!(blob_id = %id, bytes = data.len(), "blob stored");
        state.blobs.insert(id.clone(), StoredBlob { data, tags });
        Ok(id)
    }

    async fn fetch_blob(&self, id: &str) -> EscrowResult<Option<Vec<u8>>> {
        let state = self.read();
        Self::ensure_available(&state)?;
        Ok(state.blobs.get(id).map(|blob| blob.data.clone()))
    }

    async fn read_account_state(&self, address: &str) -> EscrowResult<Option<Vec<u8>>> {
        let state = self.read();
        Self::ensure_available(&state)?;
        Ok(state.accounts.get(address).cloned())
    }

    async fn submit_instruction(&self, instruction: SignedInstruction) -> EscrowResult<String> {
        instruction.verify()?;
        let mut state = self.write();
        Self::ensure_available(&state)?;
        let id = hex::encode(&blake3::hash(&instruction.signature).as_bytes()[..16]);
        state.instructions.push(instruction);
        Ok(id)
    }

    async fn subscribe_account_changes(&self, address: &str) -> EscrowResult<Subscription<AccountUpdate>> {
        let mut state = self.write();
        Self::ensure_available(&state)?;
        state.account_watchers.retain(|(_, tx)| !tx.is_closed());
        let (tx, rx) = mpsc::unbounded_channel();
        state.account_watchers.push((address.to_string(), tx));
        Ok(Subscription::new(rx))
    }

    async fn subscribe_logs(&self, address: &str) -> EscrowResult<Subscription<LogEvent>> {
        let mut state = self.write();
        Self::ensure_available(&state)?;
        state.log_watchers.retain(|(_, tx)| !tx.is_closed());
        let (tx, rx) = mpsc::unbounded_channel();
        state.log_watchers.push((address.to_string(), tx));
        Ok(Subscription::new(rx))
    }
}
