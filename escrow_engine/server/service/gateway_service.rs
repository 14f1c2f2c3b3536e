use std::sync::Arc;

use escrow_engine::crypto::signing::{Identity, parse_public_key};
use escrow_engine::gateway::StorageGateway;
use escrow_engine::{AccessProof, EscrowError, EscrowId, ProposalRef};
use tonic::{Request, Response, Status};
use tracing::info;

use crate::proto::storage_gateway_server::StorageGateway as StorageGatewayRpc;
use crate::proto::{
    HealthRequest, HealthResponse, OperatorInfoRequest, OperatorInfoResponse, Proposal, RetrieveRequest,
    RetrieveResponse, RetrieveSealedRequest, RetrieveSealedResponse, StoreRequest, StoreResponse,
};
use crate::status::to_status;

/// gRPC face of the storage gateway.
///
/// Retrievals reconstruct with the operator identity; the caller supplies
/// the governance proposal that authorizes the access.
#[derive(Clone)]
pub struct GatewayEndpoint {
    pub gateway: Arc<StorageGateway>,
    pub operator: Arc<Identity>,
}

impl GatewayEndpoint {
    pub fn new(gateway: Arc<StorageGateway>, operator: Arc<Identity>) -> Self {
        GatewayEndpoint { gateway, operator }
    }

    fn proof(&self, proposal: Option<Proposal>) -> Result<AccessProof, Status> {
        let proposal: ProposalRef = proposal
            .ok_or_else(|| to_status(&EscrowError::Validation("missing fields: proposal".into())))?
            .into();
        Ok(AccessProof::new(self.operator.clone(), proposal))
    }
}

fn parse_document_id(raw: &str) -> Result<EscrowId, Status> {
    EscrowId::document(raw).map_err(|e| to_status(&e))
}

#[tonic::async_trait]
impl StorageGatewayRpc for GatewayEndpoint {
    async fn store(&self, request: Request<StoreRequest>) -> Result<Response<StoreResponse>, Status> {
        let data = request.into_inner().data;
        let receipt = self.gateway.store(&data).await.map_err(|e| to_status(&e))?;

        Ok(Response::new(StoreResponse {
            escrow_id: receipt.escrow_id.to_string(),
            stored: receipt.report.stored_count() as u32,
            failed: receipt.report.failed.len() as u32,
        }))
    }

    async fn retrieve(&self, request: Request<RetrieveRequest>) -> Result<Response<RetrieveResponse>, Status> {
        let req = request.into_inner();
        let escrow_id = parse_document_id(&req.escrow_id)?;
        let proof = self.proof(req.proposal)?;

        let document = self.gateway.retrieve(&escrow_id, &proof).await.map_err(|e| to_status(&e))?;

        Ok(Response::new(RetrieveResponse { document }))
    }

    async fn retrieve_sealed(
        &self,
        request: Request<RetrieveSealedRequest>,
    ) -> Result<Response<RetrieveSealedResponse>, Status> {
        let req = request.into_inner();
        let escrow_id = parse_document_id(&req.escrow_id)?;
        let requester = parse_public_key(&req.requester_public_key).map_err(|e| to_status(&e))?;
        let proof = self.proof(req.proposal)?;

        let ciphertext = self
            .gateway
            .retrieve_sealed(&escrow_id, &proof, &requester)
            .await
            .map_err(|e| to_status(&e))?;
        info!(%escrow_id, requester = %hex::encode(requester.as_bytes()), "document sealed for requester");

        Ok(Response::new(RetrieveSealedResponse { ciphertext }))
    }

    async fn operator_info(
        &self,
        _request: Request<OperatorInfoRequest>,
    ) -> Result<Response<OperatorInfoResponse>, Status> {
        Ok(Response::new(OperatorInfoResponse {
            public_key: self.operator.public_key_hex(),
        }))
    }

    async fn health(&self, _request: Request<HealthRequest>) -> Result<Response<HealthResponse>, Status> {
        Ok(Response::new(HealthResponse {
            status: "SERVING".into(),
        }))
    }
}
