//! Storage gateway: encrypt, upload, escrow the key; and the reverse.

use std::sync::Arc;

use ed25519_dalek::VerifyingKey;
use tracing::{error, info};

use crate::crypto::{cipher, seal};
use crate::distribution::{DistributionOrchestrator, DistributionReport};
use crate::error::{EscrowError, EscrowResult};
use crate::ledger::{BlobTag, Ledger};
use crate::types::{AccessProof, EscrowId, Secret};

/// Application tag attached to every uploaded ciphertext.
pub const APP_NAME: &str = "escrow-engine";

/// Result of a successful store.
#[derive(Debug, Clone)]
pub struct StoreReceipt {
    pub escrow_id: EscrowId,
    pub report: DistributionReport,
}

pub struct StorageGateway {
    ledger: Arc<dyn Ledger>,
    orchestrator: Arc<DistributionOrchestrator>,
}

impl StorageGateway {
    pub fn new(ledger: Arc<dyn Ledger>, orchestrator: Arc<DistributionOrchestrator>) -> Self {
        StorageGateway { ledger, orchestrator }
    }

    pub fn orchestrator(&self) -> &DistributionOrchestrator {
        &self.orchestrator
    }

    /// Encrypt `document` under a fresh key, upload the ciphertext and
    /// escrow the key with the key-holders.
    ///
    /// A ledger failure aborts before any share leaves the gateway. If the
    /// upload succeeded but fewer than threshold holders took a share, the
    /// document is unrecoverable and `DistributionFailed` is returned.
    pub async fn store(&self, document: &[u8]) -> EscrowResult<StoreReceipt> {
        let secret = Secret::generate();
        let ciphertext = cipher::encrypt(&secret, document)?;

        let blob_id = self
            .ledger
            .submit_blob(ciphertext, vec![BlobTag::new("App-Name", APP_NAME)])
            .await?;
        let escrow_id = EscrowId::document(blob_id)?;
        info!(%escrow_id, bytes = document.len(), "ciphertext uploaded");

        match self.orchestrator.distribute(&escrow_id, &secret).await {
            Ok(report) => Ok(StoreReceipt { escrow_id, report }),
            Err(e) => {
                error!(%escrow_id, error = %e, "document uploaded but key escrow failed, document is unrecoverable");
                Err(e)
            }
        }
    }

    /// Reconstruct the key with `proof`, fetch the ciphertext and decrypt it.
    pub async fn retrieve(&self, escrow_id: &EscrowId, proof: &AccessProof) -> EscrowResult<Vec<u8>> {
        let EscrowId::Document(blob_id) = escrow_id else {
            return Err(EscrowError::Validation(format!("{escrow_id} is an epoch, not a document")));
        };

        let secret = self.orchestrator.reconstruct(escrow_id, proof).await?;
        let ciphertext = self
            .ledger
            .fetch_blob(blob_id)
            .await?
            .ok_or_else(|| EscrowError::NotFound(format!("ledger has no blob {blob_id}")))?;

        let document = cipher::decrypt(&secret, &ciphertext)?;
        info!(%escrow_id, requester = %proof.identity().public_key_hex(), "document retrieved");
        Ok(document)
    }

    /// Like [`retrieve`](Self::retrieve) but the document leaves the gateway
    /// sealed to `requester`.
    pub async fn retrieve_sealed(
        &self,
        escrow_id: &EscrowId,
        proof: &AccessProof,
        requester: &VerifyingKey,
    ) -> EscrowResult<Vec<u8>> {
        let document = zeroize::Zeroizing::new(self.retrieve(escrow_id, proof).await?);
        seal::seal(&document, requester)
    }
}
