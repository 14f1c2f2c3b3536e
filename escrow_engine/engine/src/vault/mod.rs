//! Durable per-key-holder share storage.
//!
//! A key-holder keeps every share it owns in one [`ShareRecords`] value and
//! hands the whole set to its [`ShareStore`] after each mutation.

pub mod backend;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::crypto::shamir::Share;
use crate::error::EscrowResult;
use crate::types::{EpochId, EscrowId};

pub use backend::{FileShareStore, MemoryShareStore, ShareStore};

/// Everything one key-holder persists. Shares are stored hex-encoded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareRecords {
    #[serde(default)]
    pub documents: BTreeMap<String, String>,
    /// Ordered oldest first, which is what pruning relies on.
    #[serde(default)]
    pub epochs: BTreeMap<EpochId, String>,
}

impl ShareRecords {
    /// Insert or replace the share for `escrow_id`. Returns true if an entry was replaced.
    pub fn insert(&mut self, escrow_id: &EscrowId, share: &Share) -> bool {
        let encoded = share.to_hex();
        match escrow_id {
            EscrowId::Document(id) => self.documents.insert(id.clone(), encoded).is_some(),
            EscrowId::Epoch(epoch) => self.epochs.insert(*epoch, encoded).is_some(),
        }
    }

    pub fn get(&self, escrow_id: &EscrowId) -> EscrowResult<Option<Share>> {
        let encoded = match escrow_id {
            EscrowId::Document(id) => self.documents.get(id),
            EscrowId::Epoch(epoch) => self.epochs.get(epoch),
        };
        encoded.map(|hex| Share::from_hex(hex)).transpose()
    }

    pub fn contains(&self, escrow_id: &EscrowId) -> bool {
        match escrow_id {
            EscrowId::Document(id) => self.documents.contains_key(id),
            EscrowId::Epoch(epoch) => self.epochs.contains_key(epoch),
        }
    }

    /// Drop the oldest epoch shares until at most `retention` remain.
    /// Returns the removed epochs, oldest first.
    pub fn prune_epochs(&mut self, retention: usize) -> Vec<EpochId> {
        let mut removed = Vec::new();
        while self.epochs.len() > retention {
            match self.epochs.pop_first() {
                Some((epoch, _)) => removed.push(epoch),
                None => break,
            }
        }
        removed
    }

    pub fn epoch_ids(&self) -> Vec<EpochId> {
        self.epochs.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.documents.len() + self.epochs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
