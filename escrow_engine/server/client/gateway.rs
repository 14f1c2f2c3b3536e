use ed25519_dalek::VerifyingKey;
use escrow_engine::{EscrowId, EscrowResult, ProposalRef};
use tonic::transport::Channel;

use super::ClientConfig;
use crate::proto::storage_gateway_client::StorageGatewayClient;
use crate::proto::{OperatorInfoRequest, RetrieveRequest, RetrieveSealedRequest, StoreRequest, StoreResponse};
use crate::status::from_status;

/// Thin client for the storage gateway.
#[derive(Clone)]
pub struct GatewayClient {
    client: StorageGatewayClient<Channel>,
}

impl GatewayClient {
    pub fn new(config: &ClientConfig) -> EscrowResult<Self> {
        Ok(GatewayClient {
            client: StorageGatewayClient::new(config.channel()?),
        })
    }

    pub async fn store(&self, data: Vec<u8>) -> EscrowResult<StoreResponse> {
        let response = self
            .client
            .clone()
            .store(StoreRequest { data })
            .await
            .map_err(|s| from_status(&s))?;
        Ok(response.into_inner())
    }

    pub async fn retrieve(&self, escrow_id: &EscrowId, proposal: &ProposalRef) -> EscrowResult<Vec<u8>> {
        let response = self
            .client
            .clone()
            .retrieve(RetrieveRequest {
                escrow_id: escrow_id.to_string(),
                proposal: Some(proposal.into()),
            })
            .await
            .map_err(|s| from_status(&s))?;
        Ok(response.into_inner().document)
    }

    /// The returned bytes are sealed to `requester`.
    pub async fn retrieve_sealed(
        &self,
        escrow_id: &EscrowId,
        proposal: &ProposalRef,
        requester: &VerifyingKey,
    ) -> EscrowResult<Vec<u8>> {
        let response = self
            .client
            .clone()
            .retrieve_sealed(RetrieveSealedRequest {
                escrow_id: escrow_id.to_string(),
                requester_public_key: requester.to_bytes().to_vec(),
                proposal: Some(proposal.into()),
            })
            .await
            .map_err(|s| from_status(&s))?;
        Ok(response.into_inner().ciphertext)
    }

    /// Hex public key the gateway reconstructs with.
    pub async fn operator_key(&self) -> EscrowResult<String> {
        let response = self
            .client
            .clone()
            .operator_info(OperatorInfoRequest {})
            .await
            .map_err(|s| from_status(&s))?;
        Ok(response.into_inner().public_key)
    }
}
