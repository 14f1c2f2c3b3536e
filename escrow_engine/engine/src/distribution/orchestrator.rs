use std::sync::Arc;

use futures::future::join_all;
use tracing::{info, warn};
use zeroize::Zeroizing;

use crate::config::DistributionSettings;
use crate::crypto::seal;
use crate::crypto::shamir::{self, Share};
use crate::distribution::CallPolicy;
use crate::error::{EscrowError, EscrowResult};
use crate::keyholder::KeyHolder;
use crate::types::{AccessProof, EscrowId, Secret};

/// One holder call that did not succeed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HolderFailure {
    pub holder: String,
    pub error: EscrowError,
}

/// Outcome of a successful (at least threshold) distribution.
#[derive(Debug, Clone)]
pub struct DistributionReport {
    pub escrow_id: EscrowId,
    pub threshold: usize,
    /// Labels of holders that acknowledged their share.
    pub stored: Vec<String>,
    pub failed: Vec<HolderFailure>,
}

impl DistributionReport {
    pub fn stored_count(&self) -> usize {
        self.stored.len()
    }

    /// Every holder has its share.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    /// Recoverable, but with less slack than configured.
    pub fn is_degraded(&self) -> bool {
        !self.failed.is_empty()
    }
}

/// Fans share operations out to a fixed set of key-holders.
pub struct DistributionOrchestrator {
    holders: Vec<Arc<dyn KeyHolder>>,
    threshold: usize,
    policy: CallPolicy,
}

impl DistributionOrchestrator {
    pub fn new(holders: Vec<Arc<dyn KeyHolder>>, threshold: usize, policy: CallPolicy) -> EscrowResult<Self> {
        if holders.len() > u8::MAX as usize {
            return Err(EscrowError::Validation(format!(
                "at most 255 key-holders supported, got {}",
                holders.len()
            )));
        }
        if threshold < 2 || threshold > holders.len() {
            return Err(EscrowError::Validation(format!(
                "threshold {threshold} must be between 2 and the number of key-holders ({})",
                holders.len()
            )));
        }
        Ok(DistributionOrchestrator {
            holders,
            threshold,
            policy,
        })
    }

    pub fn from_settings(holders: Vec<Arc<dyn KeyHolder>>, settings: &DistributionSettings) -> EscrowResult<Self> {
        settings.validate(holders.len())?;
        Self::new(holders, settings.threshold, settings.call_policy())
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    pub fn holder_count(&self) -> usize {
        self.holders.len()
    }

    /// Split `secret` and hand one share to every holder concurrently.
    ///
    /// Waits for every call to settle. Fewer than threshold acknowledgements
    /// is `DistributionFailed`; anything at or above threshold is success.
    pub async fn distribute(&self, escrow_id: &EscrowId, secret: &Secret) -> EscrowResult<DistributionReport> {
        let shares = shamir::split(secret, self.holders.len() as u8, self.threshold as u8)?;

        let calls = self.holders.iter().zip(shares.iter()).map(|(holder, share)| async move {
            let outcome = self
                .policy
                .run(holder.label(), || holder.store_share(escrow_id, share))
                .await;
            (holder.label().to_string(), outcome)
        });

        let mut stored = Vec::new();
        let mut failed = Vec::new();
        for (holder, outcome) in join_all(calls).await {
            match outcome {
                Ok(()) => stored.push(holder),
                Err(error) => {
                    warn!(%escrow_id, %holder, %error, "share store failed");
                    failed.push(HolderFailure { holder, error });
                }
            }
        }

        if stored.len() < self.threshold {
            return Err(EscrowError::DistributionFailed {
                escrow_id: escrow_id.to_string(),
                stored: stored.len(),
                required: self.threshold,
            });
        }

        if failed.is_empty() {
            info!(%escrow_id, holders = stored.len(), "shares distributed");
        } else {
            warn!(
                %escrow_id,
                stored = stored.len(),
                failed = failed.len(),
                threshold = self.threshold,
                "shares distributed in degraded mode"
            );
        }

        Ok(DistributionReport {
            escrow_id: escrow_id.clone(),
            threshold: self.threshold,
            stored,
            failed,
        })
    }

    /// Collect sealed shares from every holder, open them with the proof's
    /// identity and combine once all calls have settled.
    pub async fn reconstruct(&self, escrow_id: &EscrowId, proof: &AccessProof) -> EscrowResult<Secret> {
        let request = proof.request_for(escrow_id);
        let identity = proof.identity();
        let requester = identity.public_key();

        let calls = self.holders.iter().map(|holder| {
            let request = &request;
            async move {
                let outcome = self
                    .policy
                    .run(holder.label(), || holder.get_share(request))
                    .await
                    .and_then(|sealed| {
                        let plaintext = Zeroizing::new(seal::open(&sealed, &requester, identity.signing_key())?);
                        Share::from_bytes(&plaintext)
                    });
                (holder.label().to_string(), outcome)
            }
        });

        let mut shares = Vec::new();
        let mut failures = Vec::new();
        for (holder, outcome) in join_all(calls).await {
            match outcome {
                Ok(share) if share.threshold() as usize == self.threshold => shares.push(share),
                Ok(share) => {
                    warn!(%escrow_id, %holder, threshold = share.threshold(), "share from a different split discarded");
                    failures.push(HolderFailure {
                        holder,
                        error: EscrowError::Validation("share threshold mismatch".into()),
                    });
                }
                Err(error) => {
                    warn!(%escrow_id, %holder, category = error.category(), "share retrieval failed");
                    failures.push(HolderFailure { holder, error });
                }
            }
        }

        if shares.len() >= self.threshold {
            return shamir::combine(&shares);
        }

        let all_missing = shares.is_empty()
            && !failures.is_empty()
            && failures.iter().all(|f| matches!(f.error, EscrowError::NotFound(_)));
        if all_missing {
            return Err(EscrowError::NotFound(format!("no key-holder has a share for {escrow_id}")));
        }
        Err(EscrowError::InsufficientShares {
            have: shares.len(),
            need: self.threshold,
        })
    }
}
