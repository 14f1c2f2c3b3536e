//! Share fan-out across the key-holder set.

mod orchestrator;
mod policy;

pub use orchestrator::{DistributionOrchestrator, DistributionReport, HolderFailure};
pub use policy::{CallPolicy, RetryPolicy};
