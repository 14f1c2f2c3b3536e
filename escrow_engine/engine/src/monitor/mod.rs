//! Chain monitor: watches a governance group for access proposals and
//! retrieves the referenced document once a proposal is executed.
//!
//! Flow per proposal:
//!   1. a successful log event with `Instruction: ProposalCreate` and an
//!      access memo starts tracking the proposal account
//!   2. a watcher task subscribes to the account, then reads it once
//!   3. status changes are fed through the [`ProposalRegistry`]
//!   4. on `Executed` the [`ExecutionHandler`] runs on its own task
//!
//! The event loop itself never awaits the ledger, so a slow account read
//! only delays its own proposal.

mod registry;

pub use registry::{FINISHED_CAPACITY, ProposalRegistry, TrackedProposal, Transition};

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, watch};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};

use crate::crypto::signing::Identity;
use crate::error::EscrowResult;
use crate::gateway::StorageGateway;
use crate::governance::{self, ProposalAccount};
use crate::ledger::{Ledger, LogEvent, Subscription};
use crate::types::{AccessProof, EscrowId, ProposalRef};

/// Invoked once per executed proposal.
#[async_trait]
pub trait ExecutionHandler: Send + Sync {
    async fn on_executed(&self, tracked: TrackedProposal) -> EscrowResult<()>;
}

/// A document fetched after its proposal executed.
#[derive(Debug, Clone)]
pub struct RetrievedDocument {
    pub escrow_id: EscrowId,
    pub proposal: ProposalRef,
    pub document: Vec<u8>,
}

/// Retrieves the document through the gateway using the operator identity.
pub struct GatewayRetrieval {
    gateway: Arc<StorageGateway>,
    identity: Arc<Identity>,
    sink: Option<mpsc::UnboundedSender<RetrievedDocument>>,
}

impl GatewayRetrieval {
    pub fn new(gateway: Arc<StorageGateway>, identity: Arc<Identity>) -> Self {
        GatewayRetrieval {
            gateway,
            identity,
            sink: None,
        }
    }

    /// Forward every retrieved document on `sink`.
    pub fn with_sink(mut self, sink: mpsc::UnboundedSender<RetrievedDocument>) -> Self {
        self.sink = Some(sink);
        self
    }
}

#[async_trait]
impl ExecutionHandler for GatewayRetrieval {
    async fn on_executed(&self, tracked: TrackedProposal) -> EscrowResult<()> {
        let proof = AccessProof::new(self.identity.clone(), tracked.proposal.clone());
        let document = self.gateway.retrieve(&tracked.escrow_id, &proof).await?;
        info!(escrow_id = %tracked.escrow_id, bytes = document.len(), "document retrieved after execution");

        if let Some(sink) = &self.sink {
            let delivered = RetrievedDocument {
                escrow_id: tracked.escrow_id,
                proposal: tracked.proposal,
                document,
            };
            if sink.send(delivered).is_err() {
                debug!("retrieval sink closed");
            }
        }
        Ok(())
    }
}

pub struct ChainMonitor {
    ledger: Arc<dyn Ledger>,
    governance_group: String,
    handler: Arc<dyn ExecutionHandler>,
}

/// Running monitor. Dropping the handle also stops it, but without waiting
/// for in-flight handlers; prefer [`shutdown`](Self::shutdown).
pub struct MonitorHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl MonitorHandle {
    /// Cancel every subscription, wait for in-flight handlers, then return.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            error!(error = %e, "monitor task ended abnormally");
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl ChainMonitor {
    pub fn new(ledger: Arc<dyn Ledger>, governance_group: impl Into<String>, handler: Arc<dyn ExecutionHandler>) -> Self {
        ChainMonitor {
            ledger,
            governance_group: governance_group.into(),
            handler,
        }
    }

    /// Subscribe to the group's log feed and start processing.
    ///
    /// The subscription is in place when this returns, so events emitted
    /// afterwards are not missed.
    pub async fn start(self) -> EscrowResult<MonitorHandle> {
        let logs = self.ledger.subscribe_logs(&self.governance_group).await?;
        let (shutdown, shutdown_rx) = watch::channel(false);
        info!(group = %self.governance_group, "chain monitor started");

        let task = tokio::spawn(self.run(logs, shutdown_rx));
        Ok(MonitorHandle { shutdown, task })
    }

    async fn run(self, mut logs: Subscription<LogEvent>, mut shutdown: watch::Receiver<bool>) {
        let mut state = MonitorState {
            registry: ProposalRegistry::new(),
            watchers: HashMap::new(),
            in_flight: JoinSet::new(),
        };
        let (updates_tx, mut updates_rx) = mpsc::unbounded_channel::<WatchEvent>();

        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                event = logs.next() => match event {
                    Some(event) => self.on_log(event, &mut state, &updates_tx),
                    None => {
                        warn!(group = %self.governance_group, "log feed ended");
                        break;
                    }
                },
                Some(event) = updates_rx.recv() => match event {
                    WatchEvent::State { address, data } => self.on_account(&address, &data, &mut state),
                    WatchEvent::Failed { address } => {
                        state.watchers.remove(&address);
                        state.registry.forget(&address);
                    }
                },
                Some(done) = state.in_flight.join_next(), if !state.in_flight.is_empty() => {
                    if let Err(e) = done {
                        error!(error = %e, "execution handler panicked");
                    }
                }
            }
        }

        logs.unsubscribe();
        for (_, watcher) in state.watchers.drain() {
            watcher.abort();
        }
        while let Some(done) = state.in_flight.join_next().await {
            if let Err(e) = done {
                error!(error = %e, "execution handler panicked");
            }
        }
        info!(group = %self.governance_group, "chain monitor stopped");
    }

    fn on_log(&self, event: LogEvent, state: &mut MonitorState, updates: &mpsc::UnboundedSender<WatchEvent>) {
        if event.failed || !governance::is_proposal_create(&event.logs) {
            debug!(signature = %event.signature, "log event ignored");
            return;
        }

        let escrow_id = event
            .memo
            .as_deref()
            .and_then(governance::parse_creation_memo)
            .or_else(|| event.logs.iter().find_map(|line| governance::parse_creation_memo(line)));
        let Some(escrow_id) = escrow_id else {
            debug!(signature = %event.signature, "proposal without an access memo");
            return;
        };
        let Some(index) = governance::parse_transaction_index(&event.logs) else {
            warn!(signature = %event.signature, %escrow_id, "proposal creation without a transaction index");
            return;
        };

        let proposal = ProposalRef::new(self.governance_group.clone(), index);
        let address = proposal.proposal_address();
        if !state.registry.track(&address, escrow_id.clone(), proposal) {
            return;
        }
        info!(%escrow_id, transaction_index = index, "tracking access proposal");

        let watcher = tokio::spawn(watch_proposal(self.ledger.clone(), address.clone(), updates.clone()));
        state.watchers.insert(address, watcher);
    }

    fn on_account(&self, address: &str, data: &[u8], state: &mut MonitorState) {
        let account = match ProposalAccount::decode(data) {
            Ok(account) => account,
            Err(e) => {
                warn!(%address, error = %e, "undecodable proposal account");
                return;
            }
        };

        match state.registry.observe(address, account.status) {
            Transition::Ignored => debug!(%address, status = %account.status, "status unchanged"),
            Transition::Updated(status) => info!(%address, %status, "proposal status changed"),
            Transition::Executed(tracked) => {
                state.stop_watching(address);
                info!(escrow_id = %tracked.escrow_id, "proposal executed, retrieving");
                let handler = self.handler.clone();
                state.in_flight.spawn(async move {
                    let escrow_id = tracked.escrow_id.clone();
                    if let Err(e) = handler.on_executed(tracked).await {
                        error!(%escrow_id, error = %e, "automated retrieval failed");
                    }
                });
            }
            Transition::Closed(tracked, status) => {
                state.stop_watching(address);
                info!(escrow_id = %tracked.escrow_id, %status, "proposal closed without execution");
            }
        }
    }
}

/// Sent by a proposal watcher to the event loop.
enum WatchEvent {
    State { address: String, data: Vec<u8> },
    /// The account could not be subscribed; stop tracking it.
    Failed { address: String },
}

/// Subscribe first, then read once, so no transition falls between the two;
/// afterwards forward every change until the loop aborts this task.
async fn watch_proposal(ledger: Arc<dyn Ledger>, address: String, updates: mpsc::UnboundedSender<WatchEvent>) {
    let mut subscription = match ledger.subscribe_account_changes(&address).await {
        Ok(subscription) => subscription,
        Err(e) => {
            error!(%address, error = %e, "cannot watch proposal account");
            let _ = updates.send(WatchEvent::Failed { address });
            return;
        }
    };

    match ledger.read_account_state(&address).await {
        Ok(Some(data)) => {
            let current = WatchEvent::State {
                address: address.clone(),
                data,
            };
            if updates.send(current).is_err() {
                return;
            }
        }
        Ok(None) => debug!(%address, "proposal account not created yet"),
        Err(e) => warn!(%address, error = %e, "initial proposal read failed, waiting for updates"),
    }

    while let Some(update) = subscription.next().await {
        let changed = WatchEvent::State {
            address: update.address,
            data: update.data,
        };
        if updates.send(changed).is_err() {
            break;
        }
    }
}

struct MonitorState {
    registry: ProposalRegistry,
    watchers: HashMap<String, JoinHandle<()>>,
    in_flight: JoinSet<()>,
}

impl MonitorState {
    fn stop_watching(&mut self, address: &str) {
        if let Some(watcher) = self.watchers.remove(address) {
            watcher.abort();
        }
    }
}
