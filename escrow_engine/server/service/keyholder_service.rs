use std::sync::Arc;

use escrow_engine::keyholder::{KeyHolder, KeyHolderService};
use escrow_engine::{AccessRequest, EscrowError, EscrowId};
use tonic::{Request, Response, Status};

use crate::proto::key_holder_server::KeyHolder as KeyHolderRpc;
use crate::proto::{
    DescribeRequest, DescribeResponse, GetShareRequest, GetShareResponse, HealthRequest, HealthResponse,
    StoreShareRequest, StoreShareResponse,
};
use crate::status::to_status;

/// gRPC face of one key-holder.
#[derive(Clone)]
pub struct KeyHolderEndpoint {
    pub holder: Arc<KeyHolderService>,
}

impl KeyHolderEndpoint {
    pub fn new(holder: Arc<KeyHolderService>) -> Self {
        KeyHolderEndpoint { holder }
    }
}

fn parse_escrow_id(raw: &str) -> Result<EscrowId, Status> {
    raw.parse::<EscrowId>().map_err(|e| to_status(&e))
}

#[tonic::async_trait]
impl KeyHolderRpc for KeyHolderEndpoint {
    async fn store_share(&self, request: Request<StoreShareRequest>) -> Result<Response<StoreShareResponse>, Status> {
        let req = request.into_inner();
        if req.sealed_share.is_empty() {
            return Err(to_status(&EscrowError::Validation("missing fields: sealed_share".into())));
        }
        let escrow_id = parse_escrow_id(&req.escrow_id)?;

        self.holder
            .store_sealed_share(&escrow_id, &req.sealed_share)
            .await
            .map_err(|e| to_status(&e))?;

        Ok(Response::new(StoreShareResponse {}))
    }

    async fn get_share(&self, request: Request<GetShareRequest>) -> Result<Response<GetShareResponse>, Status> {
        let req = request.into_inner();
        let Some(proposal) = req.proposal else {
            return Err(to_status(&EscrowError::Validation("missing fields: proposal".into())));
        };
        let access = AccessRequest {
            requester_public_key: req.requester_public_key,
            signature: req.signature,
            escrow_id: parse_escrow_id(&req.escrow_id)?,
            proposal: proposal.into(),
        };

        let sealed_share = self.holder.get_share(&access).await.map_err(|e| to_status(&e))?;

        Ok(Response::new(GetShareResponse { sealed_share }))
    }

    async fn describe(&self, _request: Request<DescribeRequest>) -> Result<Response<DescribeResponse>, Status> {
        Ok(Response::new(DescribeResponse {
            label: self.holder.label().to_string(),
            public_key: self.holder.public_key().to_bytes().to_vec(),
            share_count: self.holder.share_count().await as u64,
        }))
    }

    async fn health(&self, _request: Request<HealthRequest>) -> Result<Response<HealthResponse>, Status> {
        Ok(Response::new(HealthResponse {
            status: "SERVING".into(),
        }))
    }
}
