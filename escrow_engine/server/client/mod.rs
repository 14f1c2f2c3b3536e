//! gRPC clients that plug remote services into the engine's trait seams.

mod gateway;
mod keyholder;
mod ledger;

pub use gateway::GatewayClient;
pub use keyholder::RemoteKeyHolder;
pub use ledger::RemoteLedger;

use std::time::Duration;

use escrow_engine::{EscrowError, EscrowResult};
use tonic::transport::{Channel, Endpoint};

/// Default connection timeout
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Default request timeout
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Connection settings shared by every client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Server endpoint URL, e.g. `http://127.0.0.1:50061`
    pub endpoint: String,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
}

impl ClientConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        ClientConfig {
            endpoint: endpoint.into(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Build a lazily connecting channel.
    ///
    /// Nothing is dialed until the first call, so a peer that is down at
    /// startup only fails the calls made to it.
    pub fn channel(&self) -> EscrowResult<Channel> {
        let endpoint = Endpoint::from_shared(self.endpoint.clone())
            .map_err(|e| EscrowError::Validation(format!("invalid endpoint {}: {e}", self.endpoint)))?
            .connect_timeout(self.connect_timeout)
            .timeout(self.request_timeout);
        Ok(endpoint.connect_lazy())
    }
}
