//! Engine-side settings. Binaries fill these from clap arguments / environment.

use std::time::Duration;

use crate::distribution::{CallPolicy, RetryPolicy};
use crate::error::{EscrowError, EscrowResult};

pub const DEFAULT_THRESHOLD: usize = 3;
pub const DEFAULT_EPOCH_THRESHOLD: usize = 4;
pub const DEFAULT_RETENTION_MONTHS: usize = 12;
pub const DEFAULT_CALL_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
pub const DEFAULT_RETRY_BACKOFF_MS: u64 = 200;
pub const DEFAULT_AUDIT_CAPACITY: usize = 500;

/// Fan-out parameters for one key-holder set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistributionSettings {
    pub threshold: usize,
    pub call_timeout: Duration,
    pub retry_attempts: u32,
    pub retry_backoff: Duration,
}

impl Default for DistributionSettings {
    fn default() -> Self {
        DistributionSettings {
            threshold: DEFAULT_THRESHOLD,
            call_timeout: Duration::from_millis(DEFAULT_CALL_TIMEOUT_MS),
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
            retry_backoff: Duration::from_millis(DEFAULT_RETRY_BACKOFF_MS),
        }
    }
}

impl DistributionSettings {
    /// Settings for the epoch rotation set (threshold 4 by default).
    pub fn epoch_defaults() -> Self {
        DistributionSettings {
            threshold: DEFAULT_EPOCH_THRESHOLD,
            ..Self::default()
        }
    }

    /// Check the threshold against the number of configured holders.
    pub fn validate(&self, holders: usize) -> EscrowResult<()> {
        if holders > u8::MAX as usize {
            return Err(EscrowError::Validation(format!("at most 255 key-holders supported, got {holders}")));
        }
        if self.threshold < 2 || self.threshold > holders {
            return Err(EscrowError::Validation(format!(
                "threshold {} must be between 2 and the number of key-holders ({holders})",
                self.threshold
            )));
        }
        if self.call_timeout.is_zero() {
            return Err(EscrowError::Validation("call timeout must be positive".into()));
        }
        Ok(())
    }

    pub fn call_policy(&self) -> CallPolicy {
        CallPolicy {
            timeout: self.call_timeout,
            retry: RetryPolicy {
                max_attempts: self.retry_attempts.max(1),
                initial_backoff: self.retry_backoff,
                ..RetryPolicy::default()
            },
        }
    }
}

/// Per key-holder instance settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyHolderSettings {
    /// Name used in logs and audit records.
    pub label: String,
    pub retention_months: usize,
    pub audit_capacity: usize,
}

impl Default for KeyHolderSettings {
    fn default() -> Self {
        KeyHolderSettings {
            label: "keyholder".into(),
            retention_months: DEFAULT_RETENTION_MONTHS,
            audit_capacity: DEFAULT_AUDIT_CAPACITY,
        }
    }
}

impl KeyHolderSettings {
    pub fn new(label: impl Into<String>) -> Self {
        KeyHolderSettings {
            label: label.into(),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> EscrowResult<()> {
        if self.retention_months == 0 {
            return Err(EscrowError::Validation("retention must keep at least one epoch".into()));
        }
        Ok(())
    }
}
