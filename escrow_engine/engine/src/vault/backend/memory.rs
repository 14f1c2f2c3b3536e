use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;

use crate::crypto::cipher;
use crate::error::{EscrowError, EscrowResult};
use crate::types::Secret;
use crate::vault::ShareRecords;
use crate::vault::backend::ShareStore;

/// Volatile store that keeps the record set sealed under a per-instance key.
///
/// The key never leaves the instance, so the plaintext set only exists while
/// a load or persist is in progress.
pub struct MemoryShareStore {
    sealed: RwLock<Option<Vec<u8>>>,
    key: Secret,
    failing: AtomicBool,
}

impl Default for MemoryShareStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryShareStore {
    pub fn new() -> Self {
        MemoryShareStore {
            sealed: RwLock::new(None),
            key: Secret::generate(),
            failing: AtomicBool::new(false),
        }
    }

    /// Make every subsequent `persist` fail (disk-full simulation).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl ShareStore for MemoryShareStore {
    async fn load(&self) -> EscrowResult<ShareRecords> {
        let sealed = self
            .sealed
            .read()
            .map_err(|_| EscrowError::Persistence("store lock poisoned".into()))?
            .clone();
        let Some(sealed) = sealed else {
            return Ok(ShareRecords::default());
        };
        let plaintext = cipher::decrypt(&self.key, &sealed)
            .map_err(|e| EscrowError::Persistence(format!("sealed store unreadable: {e}")))?;
        serde_json::from_slice(&plaintext).map_err(|e| EscrowError::Persistence(format!("decode records: {e}")))
    }

    async fn persist(&self, records: &ShareRecords) -> EscrowResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(EscrowError::Persistence("simulated write failure".into()));
        }
        let plaintext =
            serde_json::to_vec(records).map_err(|e| EscrowError::Persistence(format!("encode records: {e}")))?;
        let sealed = cipher::encrypt(&self.key, &plaintext)?;
        let mut slot = self
            .sealed
            .write()
            .map_err(|_| EscrowError::Persistence("store lock poisoned".into()))?;
        *slot = Some(sealed);
        Ok(())
    }
}
