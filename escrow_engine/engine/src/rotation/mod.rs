//! Monthly rotation secrets, escrowed with the epoch key-holder set.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{error, info};

use crate::distribution::{DistributionOrchestrator, DistributionReport};
use crate::error::EscrowResult;
use crate::types::{EpochId, EscrowId, Secret};

#[derive(Debug, Clone)]
pub struct RotationOutcome {
    pub epoch: EpochId,
    pub report: DistributionReport,
}

/// Externally triggered: run once per calendar month (cron, CLI).
pub struct EpochRotation {
    orchestrator: Arc<DistributionOrchestrator>,
}

impl EpochRotation {
    pub fn new(orchestrator: Arc<DistributionOrchestrator>) -> Self {
        EpochRotation { orchestrator }
    }

    /// Rotate for the current UTC month.
    pub async fn rotate(&self) -> EscrowResult<RotationOutcome> {
        self.rotate_at(Utc::now()).await
    }

    /// Mint and distribute the secret for the epoch containing `now`.
    /// Re-running within a month replaces that epoch's shares.
    pub async fn rotate_at(&self, now: DateTime<Utc>) -> EscrowResult<RotationOutcome> {
        let epoch = EpochId::from_datetime(&now);
        let secret = Secret::generate();

        match self.orchestrator.distribute(&EscrowId::epoch(epoch), &secret).await {
            Ok(report) => {
                info!(%epoch, stored = report.stored_count(), "epoch secret rotated");
                Ok(RotationOutcome { epoch, report })
            }
            Err(e) => {
                error!(%epoch, error = %e, "epoch rotation failed");
                Err(e)
            }
        }
    }
}
