//! Command-line and environment configuration shared by the binaries.

use std::sync::Arc;
use std::time::Duration;

use clap::Args;
use escrow_engine::EscrowResult;
use escrow_engine::config::{
    DEFAULT_CALL_TIMEOUT_MS, DEFAULT_EPOCH_THRESHOLD, DEFAULT_RETRY_ATTEMPTS, DEFAULT_RETRY_BACKOFF_MS,
    DEFAULT_THRESHOLD, DistributionSettings,
};
use escrow_engine::distribution::DistributionOrchestrator;
use escrow_engine::keyholder::KeyHolder;
use escrow_engine::logging::{WorkerGuard, init_logging};

use crate::client::{ClientConfig, RemoteKeyHolder, RemoteLedger};

#[derive(Args, Debug, Clone)]
pub struct LogArgs {
    /// Directory for the daily rolling log file
    #[arg(long, env = "LOG_DIR", default_value = "logs")]
    pub log_dir: String,

    /// Write the log file as JSON lines
    #[arg(long, env = "LOG_JSON")]
    pub log_json: bool,

    /// Filter directives, `RUST_LOG` syntax
    #[arg(long, env = "RUST_LOG", default_value = "")]
    pub log_filter: String,
}

impl LogArgs {
    /// Install the subscriber. Keep the guard alive until exit.
    pub fn init(&self, file_prefix: &str) -> WorkerGuard {
        init_logging(&self.log_dir, file_prefix, self.log_json, &self.log_filter)
    }
}

/// Per-call timeout and retry settings for key-holder calls.
#[derive(Args, Debug, Clone)]
pub struct CallArgs {
    #[arg(long, env = "CALL_TIMEOUT_MS", default_value_t = DEFAULT_CALL_TIMEOUT_MS)]
    pub call_timeout_ms: u64,

    #[arg(long, env = "RETRY_ATTEMPTS", default_value_t = DEFAULT_RETRY_ATTEMPTS)]
    pub retry_attempts: u32,

    #[arg(long, env = "RETRY_BACKOFF_MS", default_value_t = DEFAULT_RETRY_BACKOFF_MS)]
    pub retry_backoff_ms: u64,
}

impl CallArgs {
    fn settings(&self, threshold: usize) -> DistributionSettings {
        DistributionSettings {
            threshold,
            call_timeout: Duration::from_millis(self.call_timeout_ms),
            retry_attempts: self.retry_attempts,
            retry_backoff: Duration::from_millis(self.retry_backoff_ms),
        }
    }
}

/// The document key-holder set.
#[derive(Args, Debug, Clone)]
pub struct HolderSetArgs {
    /// Comma-separated key-holder endpoints, e.g. http://10.0.0.1:50061
    #[arg(long, env = "KEY_SERVER_URLS", value_delimiter = ',', required = true)]
    pub key_server_urls: Vec<String>,

    #[arg(long, env = "THRESHOLD", default_value_t = DEFAULT_THRESHOLD)]
    pub threshold: usize,
}

impl HolderSetArgs {
    pub fn orchestrator(&self, call: &CallArgs) -> EscrowResult<DistributionOrchestrator> {
        build_orchestrator(&self.key_server_urls, &call.settings(self.threshold))
    }
}

/// The epoch key-holder set used for monthly rotation secrets.
#[derive(Args, Debug, Clone)]
pub struct EpochHolderSetArgs {
    #[arg(long, env = "EPOCH_KEY_SERVER_URLS", value_delimiter = ',', required = true)]
    pub epoch_key_server_urls: Vec<String>,

    #[arg(long, env = "EPOCH_THRESHOLD", default_value_t = DEFAULT_EPOCH_THRESHOLD)]
    pub epoch_threshold: usize,
}

impl EpochHolderSetArgs {
    pub fn orchestrator(&self, call: &CallArgs) -> EscrowResult<DistributionOrchestrator> {
        build_orchestrator(&self.epoch_key_server_urls, &call.settings(self.epoch_threshold))
    }
}

fn build_orchestrator(urls: &[String], settings: &DistributionSettings) -> EscrowResult<DistributionOrchestrator> {
    settings.validate(urls.len())?;
    let holders = urls
        .iter()
        .enumerate()
        .map(|(i, url)| {
            let config = ClientConfig::new(url.trim()).with_request_timeout(settings.call_timeout);
            let holder = RemoteKeyHolder::new(format!("holder-{}", i + 1), &config)?;
            Ok(Arc::new(holder) as Arc<dyn KeyHolder>)
        })
        .collect::<EscrowResult<Vec<_>>>()?;
    DistributionOrchestrator::from_settings(holders, settings)
}

#[derive(Args, Debug, Clone)]
pub struct LedgerArgs {
    #[arg(long, env = "LEDGER_URL", default_value = "http://127.0.0.1:50070")]
    pub ledger_url: String,

    /// Subscription poll interval
    #[arg(long, env = "LEDGER_POLL_MS", default_value_t = 500)]
    pub ledger_poll_ms: u64,
}

impl LedgerArgs {
    pub fn connect(&self) -> EscrowResult<RemoteLedger> {
        let ledger = RemoteLedger::new(&ClientConfig::new(self.ledger_url.clone()))?
            .with_poll_interval(Duration::from_millis(self.ledger_poll_ms.max(1)));
        Ok(ledger)
    }
}
