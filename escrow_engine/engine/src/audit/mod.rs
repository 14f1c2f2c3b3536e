use std::collections::VecDeque;
use std::sync::Mutex;

use tracing::info;

/// Kind of escrow event being tracked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditEventType {
    ShareStored,
    ShareReleased,
    AccessDenied,
    EpochPruned,
    Error,
}

/// Record of one key-holder decision
#[derive(Debug, Clone)]
pub struct AuditRecord {
    pub event_type: AuditEventType,
    pub escrow_id: String,
    /// Hex public key of the requester, when the event concerns a request.
    pub requester: Option<String>,
    pub message: String,
    pub timestamp: String, // RFC3339
}

impl AuditRecord {
    pub fn new(event_type: AuditEventType, escrow_id: impl Into<String>, message: impl Into<String>) -> Self {
        AuditRecord {
            event_type,
            escrow_id: escrow_id.into(),
            requester: None,
            message: message.into(),
            timestamp: now_rfc3339(),
        }
    }

    pub fn with_requester(mut self, requester: impl Into<String>) -> Self {
        self.requester = Some(requester.into());
        self
    }

    pub fn event_type_label(&self) -> &'static str {
        match self.event_type {
            AuditEventType::ShareStored => "STORE",
            AuditEventType::ShareReleased => "RELEASE",
            AuditEventType::AccessDenied => "DENY",
            AuditEventType::EpochPruned => "PRUNE",
            AuditEventType::Error => "ERROR",
        }
    }
}

/// In-memory audit ring, one per key-holder
pub struct AuditTracker {
    records: Mutex<VecDeque<AuditRecord>>,
    max_entries: usize,
}

impl AuditTracker {
    pub fn new(max_entries: usize) -> Self {
        let max_entries = max_entries.max(1);
        Self {
            records: Mutex::new(VecDeque::with_capacity(max_entries)),
            max_entries,
        }
    }

    /// Record a new event, evicting the oldest once full
    pub fn log(&self, record: AuditRecord) {
        info!(
            audit = record.event_type_label(),
            escrow_id = %record.escrow_id,
            requester = record.requester.as_deref().unwrap_or("-"),
            "{}",
            record.message
        );
        let mut records = self.records.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if records.len() == self.max_entries {
            records.pop_front();
        }
        records.push_back(record);
    }

    /// Most recent `count` records, newest first
    pub fn recent(&self, count: usize) -> Vec<AuditRecord> {
        let records = self.records.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        records.iter().rev().take(count).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.records.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.max_entries
    }
}

/// Helper to get current timestamp as RFC3339 string
pub fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}
