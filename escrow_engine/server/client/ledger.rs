use std::time::Duration;

use async_trait::async_trait;
use escrow_engine::ledger::{AccountUpdate, BlobTag, Ledger, LogEvent, SignedInstruction, Subscription};
use escrow_engine::{EscrowError, EscrowResult};
use tokio::sync::mpsc;
use tonic::transport::Channel;
use tracing::{debug, warn};

use super::ClientConfig;
use crate::proto::ledger_client::LedgerClient;
use crate::proto::{
    AppendLogRequest, FetchBlobRequest, LogsSinceRequest, PutAccountRequest, ReadAccountRequest, SubmitBlobRequest,
    SubmitInstructionRequest, Tag,
};
use crate::status::ledger_error;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Ledger reached over gRPC. Subscriptions are served by polling.
#[derive(Clone)]
pub struct RemoteLedger {
    client: LedgerClient<Channel>,
    poll_interval: Duration,
}

impl RemoteLedger {
    pub fn new(config: &ClientConfig) -> EscrowResult<Self> {
        Ok(RemoteLedger {
            client: LedgerClient::new(config.channel()?),
            poll_interval: DEFAULT_POLL_INTERVAL,
        })
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Overwrite an account. Development ledgers only.
    pub async fn put_account(&self, address: &str, data: Vec<u8>) -> EscrowResult<()> {
        self.client
            .clone()
            .put_account(PutAccountRequest {
                address: address.to_string(),
                data,
            })
            .await
            .map_err(|s| ledger_error(&s))?;
        Ok(())
    }

    /// Record a transaction's logs under `address`. Development ledgers only.
    pub async fn append_log(
        &self,
        address: &str,
        logs: Vec<String>,
        memo: Option<String>,
        failed: bool,
    ) -> EscrowResult<LogEvent> {
        let response = self
            .client
            .clone()
            .append_log(AppendLogRequest {
                address: address.to_string(),
                logs,
                memo,
                failed,
            })
            .await
            .map_err(|s| ledger_error(&s))?;
        response
            .into_inner()
            .entry
            .map(LogEvent::from)
            .ok_or_else(|| EscrowError::Ledger("append returned no entry".into()))
    }

    /// Entries for `address` after `after`, plus the ledger head.
    async fn logs_since(&self, address: &str, after: u64) -> EscrowResult<(Vec<LogEvent>, u64)> {
        let response = self
            .client
            .clone()
            .logs_since(LogsSinceRequest {
                address: address.to_string(),
                after,
            })
            .await
            .map_err(|s| ledger_error(&s))?
            .into_inner();
        Ok((response.entries.into_iter().map(LogEvent::from).collect(), response.head))
    }
}

#[async_trait]
impl Ledger for RemoteLedger {
    async fn submit_blob(&self, data: Vec<u8>, tags: Vec<BlobTag>) -> EscrowResult<String> {
        let tags = tags
            .into_iter()
            .map(|tag| Tag {
                name: tag.name,
                value: tag.value,
            })
            .collect();
        let response = self
            .client
            .clone()
            .submit_blob(SubmitBlobRequest { data, tags })
            .await
            .map_err(|s| ledger_error(&s))?;
        Ok(response.into_inner().id)
    }

    async fn fetch_blob(&self, id: &str) -> EscrowResult<Option<Vec<u8>>> {
        let response = self
            .client
            .clone()
            .fetch_blob(FetchBlobRequest { id: id.to_string() })
            .await
            .map_err(|s| ledger_error(&s))?
            .into_inner();
        Ok(response.found.then_some(response.data))
    }

    async fn read_account_state(&self, address: &str) -> EscrowResult<Option<Vec<u8>>> {
        let response = self
            .client
            .clone()
            .read_account(ReadAccountRequest {
                address: address.to_string(),
            })
            .await
            .map_err(|s| ledger_error(&s))?
            .into_inner();
        Ok(response.found.then_some(response.data))
    }

    async fn submit_instruction(&self, instruction: SignedInstruction) -> EscrowResult<String> {
        let response = self
            .client
            .clone()
            .submit_instruction(SubmitInstructionRequest {
                program: instruction.program,
                data: instruction.data,
                signer: instruction.signer,
                signature: instruction.signature,
            })
            .await
            .map_err(|s| ledger_error(&s))?;
        Ok(response.into_inner().signature)
    }

    async fn subscribe_account_changes(&self, address: &str) -> EscrowResult<Subscription<AccountUpdate>> {
        // baseline first: only changes after this point are reported
        let mut last = self.read_account_state(address).await?;
        let (tx, rx) = mpsc::unbounded_channel();
        let ledger = self.clone();
        let address = address.to_string();

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(ledger.poll_interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let current = match ledger.read_account_state(&address).await {
                    Ok(current) => current,
                    Err(e) => {
                        warn!(%address, error = %e, "account poll failed");
                        continue;
                    }
                };
                if current == last {
                    continue;
                }
                if let Some(data) = current.clone() {
                    let update = AccountUpdate {
                        address: address.clone(),
                        data,
                    };
                    if tx.send(update).is_err() {
                        break;
                    }
                }
                last = current;
            }
            debug!(%address, "account poller stopped");
        });
        Ok(Subscription::with_task(rx, task))
    }

    async fn subscribe_logs(&self, address: &str) -> EscrowResult<Subscription<LogEvent>> {
        let (_, mut cursor) = self.logs_since(address, u64::MAX).await?;
        let (tx, rx) = mpsc::unbounded_channel();
        let ledger = self.clone();
        let address = address.to_string();

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(ledger.poll_interval);
            ticker.tick().await;
            'poll: loop {
                ticker.tick().await;
                let events = match ledger.logs_since(&address, cursor).await {
                    Ok((events, _)) => events,
                    Err(e) => {
                        warn!(%address, error = %e, "log poll failed");
                        continue;
                    }
                };
                for event in events {
                    cursor = cursor.max(event.sequence);
                    if tx.send(event).is_err() {
                        break 'poll;
                    }
                }
            }
            debug!(%address, "log poller stopped");
        });
        Ok(Subscription::with_task(rx, task))
    }
}
