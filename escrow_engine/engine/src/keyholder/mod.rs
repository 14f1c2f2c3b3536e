//! Key-holder: durable share custody with signature and governance gated release.

use std::sync::Arc;

use async_trait::async_trait;
use ed25519_dalek::VerifyingKey;
use tokio::sync::Mutex;
use tracing::{error, info, warn};
use zeroize::Zeroizing;

use crate::audit::{AuditEventType, AuditRecord, AuditTracker};
use crate::config::KeyHolderSettings;
use crate::crypto::seal;
use crate::crypto::shamir::Share;
use crate::crypto::signing::{Identity, verify_escrow_signature};
use crate::error::{EscrowError, EscrowResult};
use crate::governance;
use crate::ledger::Ledger;
use crate::types::{AccessRequest, EpochId, EscrowId};
use crate::vault::{ShareRecords, ShareStore};

/// One independent share custodian, local or remote.
#[async_trait]
pub trait KeyHolder: Send + Sync {
    /// Name used in logs and failure reports.
    fn label(&self) -> &str;

    /// Upsert this holder's share for `escrow_id`.
    async fn store_share(&self, escrow_id: &EscrowId, share: &Share) -> EscrowResult<()>;

    /// Release this holder's share, sealed to the requester's key.
    async fn get_share(&self, request: &AccessRequest) -> EscrowResult<Vec<u8>>;
}

pub struct KeyHolderService {
    settings: KeyHolderSettings,
    identity: Arc<Identity>,
    ledger: Arc<dyn Ledger>,
    store: Arc<dyn ShareStore>,
    // held across the persist call so flushes are serialized
    records: Mutex<ShareRecords>,
    audit: AuditTracker,
}

impl KeyHolderService {
    /// Load the holder's records from `store` and get ready to serve.
    pub async fn open(
        settings: KeyHolderSettings,
        identity: Arc<Identity>,
        ledger: Arc<dyn Ledger>,
        store: Arc<dyn ShareStore>,
    ) -> EscrowResult<Self> {
        settings.validate()?;
        let records = store.load().await?;
        info!(
            holder = %settings.label,
            public_key = %identity.public_key_hex(),
            documents = records.documents.len(),
            epochs = records.epochs.len(),
            "key-holder opened"
        );
        let audit = AuditTracker::new(settings.audit_capacity);
        Ok(KeyHolderService {
            settings,
            identity,
            ledger,
            store,
            records: Mutex::new(records),
            audit,
        })
    }

    pub fn public_key(&self) -> VerifyingKey {
        self.identity.public_key()
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn audit(&self) -> &AuditTracker {
        &self.audit
    }

    pub fn settings(&self) -> &KeyHolderSettings {
        &self.settings
    }

    pub async fn share_count(&self) -> usize {
        self.records.lock().await.len()
    }

    pub async fn epoch_ids(&self) -> Vec<EpochId> {
        self.records.lock().await.epoch_ids()
    }

    pub async fn contains(&self, escrow_id: &EscrowId) -> bool {
        self.records.lock().await.contains(escrow_id)
    }

    /// Store a share that arrived sealed to this holder's identity.
    pub async fn store_sealed_share(&self, escrow_id: &EscrowId, sealed_share: &[u8]) -> EscrowResult<()> {
        let plaintext = Zeroizing::new(
            seal::open(sealed_share, &self.identity.public_key(), self.identity.signing_key())
                .map_err(|_| EscrowError::Validation("sealed share is not addressed to this key-holder".into()))?,
        );
        let share = Share::from_bytes(&plaintext)?;
        self.put(escrow_id, &share).await
    }

    async fn put(&self, escrow_id: &EscrowId, share: &Share) -> EscrowResult<()> {
        let mut records = self.records.lock().await;

        // Step 1: stage the change on a copy
        let mut next = records.clone();
        let replaced = next.insert(escrow_id, share);
        let pruned = next.prune_epochs(self.settings.retention_months);

        // Step 2: persist; memory only changes once the write succeeded
        if let Err(e) = self.store.persist(&next).await {
            error!(holder = %self.settings.label, %escrow_id, error = %e, "share persistence failed");
            self.audit
                .log(AuditRecord::new(AuditEventType::Error, escrow_id.to_string(), format!("persist failed: {e}")));
            return Err(e);
        }
        *records = next;
        drop(records);

        self.audit.log(AuditRecord::new(
            AuditEventType::ShareStored,
            escrow_id.to_string(),
            if replaced { "share replaced" } else { "share stored" },
        ));
        for epoch in pruned {
            self.audit.log(AuditRecord::new(
                AuditEventType::EpochPruned,
                epoch.to_string(),
                format!("retention of {} months exceeded", self.settings.retention_months),
            ));
        }
        Ok(())
    }

    async fn release(&self, request: &AccessRequest) -> EscrowResult<Vec<u8>> {
        // Step 1: proof of key control
        let requester = verify_escrow_signature(&request.requester_public_key, &request.escrow_id, &request.signature)?;

        // Step 2: governance decision, read fresh every time
        governance::authorize(self.ledger.as_ref(), &request.proposal, &requester).await?;

        // Step 3: lookup
        let share = self
            .records
            .lock()
            .await
            .get(&request.escrow_id)?
            .ok_or_else(|| EscrowError::NotFound(format!("no share for {}", request.escrow_id)))?;

        // Step 4: seal to the requester
        let plaintext = Zeroizing::new(share.to_bytes());
        seal::seal(&plaintext, &requester)
    }
}

#[async_trait]
impl KeyHolder for KeyHolderService {
    fn label(&self) -> &str {
        &self.settings.label
    }

    async fn store_share(&self, escrow_id: &EscrowId, share: &Share) -> EscrowResult<()> {
        self.put(escrow_id, share).await
    }

    async fn get_share(&self, request: &AccessRequest) -> EscrowResult<Vec<u8>> {
        let requester = hex::encode(&request.requester_public_key);
        let outcome = self.release(request).await;

        let escrow_id = request.escrow_id.to_string();
        match &outcome {
            Ok(_) => self.audit.log(
                AuditRecord::new(AuditEventType::ShareReleased, escrow_id, "sealed share released")
                    .with_requester(requester),
            ),
            Err(e @ (EscrowError::Ledger(_) | EscrowError::Persistence(_))) => {
                error!(holder = %self.settings.label, error = %e, "share release failed");
                self.audit.log(
                    AuditRecord::new(AuditEventType::Error, escrow_id, e.to_string()).with_requester(requester),
                );
            }
            Err(e) => {
                warn!(holder = %self.settings.label, category = e.category(), "share release denied");
                self.audit.log(
                    AuditRecord::new(AuditEventType::AccessDenied, escrow_id, e.to_string())
                        .with_requester(requester),
                );
            }
        }
        outcome
    }
}
