use std::collections::{HashMap, HashSet, VecDeque};

use crate::governance::ProposalStatus;
use crate::types::{EscrowId, ProposalRef};

/// A proposal the monitor is watching on behalf of an escrow id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedProposal {
    pub escrow_id: EscrowId,
    pub proposal: ProposalRef,
    pub last_status: Option<ProposalStatus>,
}

/// What an observed status means for a tracked proposal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Unknown address, finished proposal or unchanged status.
    Ignored,
    Updated(ProposalStatus),
    /// Reached `Executed`; no longer tracked.
    Executed(TrackedProposal),
    /// Reached another terminal status; no longer tracked.
    Closed(TrackedProposal, ProposalStatus),
}

/// Finished addresses remembered by default.
pub const FINISHED_CAPACITY: usize = 4096;

/// Tracked proposals keyed by proposal account address.
///
/// The most recent addresses that reached a terminal status are remembered
/// so a replayed creation event cannot start tracking them again.
#[derive(Debug)]
pub struct ProposalRegistry {
    tracked: HashMap<String, TrackedProposal>,
    finished: HashSet<String>,
    finished_order: VecDeque<String>,
    finished_capacity: usize,
}

impl Default for ProposalRegistry {
    fn default() -> Self {
        Self::with_finished_capacity(FINISHED_CAPACITY)
    }
}

impl ProposalRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remember at most `capacity` finished addresses, oldest forgotten first.
    pub fn with_finished_capacity(capacity: usize) -> Self {
        ProposalRegistry {
            tracked: HashMap::new(),
            finished: HashSet::new(),
            finished_order: VecDeque::new(),
            finished_capacity: capacity.max(1),
        }
    }

    /// Start tracking. Returns false if the address is already tracked or finished.
    pub fn track(&mut self, address: &str, escrow_id: EscrowId, proposal: ProposalRef) -> bool {
        if self.tracked.contains_key(address) || self.finished.contains(address) {
            return false;
        }
        self.tracked.insert(
            address.to_string(),
            TrackedProposal {
                escrow_id,
                proposal,
                last_status: None,
            },
        );
        true
    }

    pub fn observe(&mut self, address: &str, status: ProposalStatus) -> Transition {
        let Some(entry) = self.tracked.get_mut(address) else {
            return Transition::Ignored;
        };
        if entry.last_status == Some(status) {
            return Transition::Ignored;
        }
        entry.last_status = Some(status);

        if !status.is_terminal() {
            return Transition::Updated(status);
        }
        let Some(tracked) = self.untrack(address) else {
            return Transition::Ignored;
        };
        if status == ProposalStatus::Executed {
            Transition::Executed(tracked)
        } else {
            Transition::Closed(tracked, status)
        }
    }

    /// Stop tracking without a terminal status (e.g. the subscription failed).
    pub fn forget(&mut self, address: &str) -> Option<TrackedProposal> {
        self.tracked.remove(address)
    }

    fn untrack(&mut self, address: &str) -> Option<TrackedProposal> {
        let tracked = self.tracked.remove(address)?;
        if self.finished.insert(address.to_string()) {
            self.finished_order.push_back(address.to_string());
        }
        while self.finished_order.len() > self.finished_capacity {
            if let Some(oldest) = self.finished_order.pop_front() {
                self.finished.remove(&oldest);
            }
        }
        Some(tracked)
    }

    pub fn finished_count(&self) -> usize {
        self.finished.len()
    }

    pub fn get(&self, address: &str) -> Option<&TrackedProposal> {
        self.tracked.get(address)
    }

    pub fn is_tracked(&self, address: &str) -> bool {
        self.tracked.contains_key(address)
    }

    pub fn len(&self) -> usize {
        self.tracked.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracked.is_empty()
    }
}
