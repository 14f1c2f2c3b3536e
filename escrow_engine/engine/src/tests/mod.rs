//! Shared fixtures: in-process key-holders, a memory ledger and a governance group.

mod audit_log_tests;
mod distribution_tests;
mod escrow_flow;
mod governance_tests;
mod keyholder_tests;
mod vault_test;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use crate::config::KeyHolderSettings;
use crate::crypto::shamir::Share;
use crate::crypto::signing::Identity;
use crate::distribution::{CallPolicy, DistributionOrchestrator, RetryPolicy};
use crate::error::{EscrowError, EscrowResult};
use crate::governance::{GovernanceGroup, ProposalAccount, ProposalStatus};
use crate::keyholder::{KeyHolder, KeyHolderService};
use crate::ledger::memory::MemoryLedger;
use crate::types::{AccessRequest, EscrowId, ProposalRef};
use crate::vault::MemoryShareStore;

pub(crate) const GROUP: &str = "governance-group-1";

/// A key-holder that is down.
pub(crate) struct OfflineHolder {
    pub label: String,
}

impl OfflineHolder {
    pub fn new(label: &str) -> Arc<Self> {
        Arc::new(OfflineHolder { label: label.into() })
    }
}

#[async_trait]
impl KeyHolder for OfflineHolder {
    fn label(&self) -> &str {
        &self.label
    }

    async fn store_share(&self, _escrow_id: &EscrowId, _share: &Share) -> EscrowResult<()> {
        Err(EscrowError::Unavailable(format!("{} is offline", self.label)))
    }

    async fn get_share(&self, _request: &AccessRequest) -> EscrowResult<Vec<u8>> {
        Err(EscrowError::Unavailable(format!("{} is offline", self.label)))
    }
}

/// Fails with `error` for the first `failures` calls, then delegates.
pub(crate) struct FlakyHolder {
    pub inner: Arc<dyn KeyHolder>,
    pub failures: usize,
    pub error: EscrowError,
    pub calls: AtomicUsize,
}

impl FlakyHolder {
    pub fn new(inner: Arc<dyn KeyHolder>, failures: usize, error: EscrowError) -> Arc<Self> {
        Arc::new(FlakyHolder {
            inner,
            failures,
            error,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn fail_now(&self) -> bool {
        self.calls.fetch_add(1, Ordering::SeqCst) < self.failures
    }
}

#[async_trait]
impl KeyHolder for FlakyHolder {
    fn label(&self) -> &str {
        self.inner.label()
    }

    async fn store_share(&self, escrow_id: &EscrowId, share: &Share) -> EscrowResult<()> {
        if self.fail_now() {
            return Err(self.error.clone());
        }
        self.inner.store_share(escrow_id, share).await
    }

    async fn get_share(&self, request: &AccessRequest) -> EscrowResult<Vec<u8>> {
        if self.fail_now() {
            return Err(self.error.clone());
        }
        self.inner.get_share(request).await
    }
}

/// Never answers; used to exercise the per-call timeout.
pub(crate) struct StalledHolder;

#[async_trait]
impl KeyHolder for StalledHolder {
    fn label(&self) -> &str {
        "stalled"
    }

    async fn store_share(&self, _escrow_id: &EscrowId, _share: &Share) -> EscrowResult<()> {
        std::future::pending().await
    }

    async fn get_share(&self, _request: &AccessRequest) -> EscrowResult<Vec<u8>> {
        std::future::pending().await
    }
}

/// Ledger, holders and identities for one test.
pub(crate) struct Cluster {
    pub ledger: Arc<MemoryLedger>,
    pub holders: Vec<Arc<KeyHolderService>>,
    pub member: Arc<Identity>,
    pub outsider: Arc<Identity>,
}

impl Cluster {
    /// `n` in-memory key-holders sharing one ledger, with `member` in the governance group.
    pub async fn new(n: usize) -> Self {
        Self::with_ledger(n, MemoryLedger::new()).await
    }

    pub async fn with_ledger(n: usize, ledger: MemoryLedger) -> Self {
        let ledger = Arc::new(ledger);
        let member = Arc::new(Identity::generate());
        let outsider = Arc::new(Identity::generate());
        let group = GovernanceGroup::new(&[member.public_key()], 1);
        ledger.put_account(GROUP, group.encode().unwrap());

        let mut holders = Vec::new();
        for i in 1..=n {
            holders.push(keyholder(ledger.clone(), KeyHolderSettings::new(format!("holder-{i}"))).await);
        }
        Cluster {
            ledger,
            holders,
            member,
            outsider,
        }
    }

    pub fn dyn_holders(&self) -> Vec<Arc<dyn KeyHolder>> {
        self.holders.iter().map(|h| h.clone() as Arc<dyn KeyHolder>).collect()
    }

    /// Holders with the listed (0-based) positions replaced by offline ones.
    pub fn with_offline(&self, down: &[usize]) -> Vec<Arc<dyn KeyHolder>> {
        self.holders
            .iter()
            .enumerate()
            .map(|(i, h)| {
                if down.contains(&i) {
                    OfflineHolder::new(&format!("holder-{}", i + 1)) as Arc<dyn KeyHolder>
                } else {
                    h.clone() as Arc<dyn KeyHolder>
                }
            })
            .collect()
    }

    pub fn orchestrator(&self, holders: Vec<Arc<dyn KeyHolder>>, threshold: usize) -> Arc<DistributionOrchestrator> {
        Arc::new(DistributionOrchestrator::new(holders, threshold, fast_policy()).unwrap())
    }

    pub fn set_proposal(&self, proposal: &ProposalRef, status: ProposalStatus) {
        set_proposal(&self.ledger, proposal, status);
    }
}

pub(crate) async fn keyholder(ledger: Arc<MemoryLedger>, settings: KeyHolderSettings) -> Arc<KeyHolderService> {
    Arc::new(
        KeyHolderService::open(
            settings,
            Arc::new(Identity::generate()),
            ledger,
            Arc::new(MemoryShareStore::new()),
        )
        .await
        .expect("open key-holder"),
    )
}

pub(crate) fn set_proposal(ledger: &MemoryLedger, proposal: &ProposalRef, status: ProposalStatus) {
    let account = ProposalAccount::new(proposal, status);
    ledger.put_account(&proposal.proposal_address(), account.encode().unwrap());
}

/// Short timeout, two attempts, negligible backoff.
pub(crate) fn fast_policy() -> CallPolicy {
    CallPolicy {
        timeout: Duration::from_millis(500),
        retry: RetryPolicy {
            max_attempts: 2,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(5),
            multiplier: 2.0,
        },
    }
}
