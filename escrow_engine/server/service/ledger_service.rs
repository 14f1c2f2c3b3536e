use std::sync::Arc;

use escrow_engine::ledger::{BlobTag, Ledger, MemoryLedger, SignedInstruction};
use tonic::{Request, Response, Status};
use tracing::debug;

use crate::proto::ledger_server::Ledger as LedgerRpc;
use crate::proto::{
    AppendLogRequest, AppendLogResponse, FetchBlobRequest, FetchBlobResponse, LogsSinceRequest, LogsSinceResponse,
    PutAccountRequest, PutAccountResponse, ReadAccountRequest, ReadAccountResponse, SubmitBlobRequest,
    SubmitBlobResponse, SubmitInstructionRequest, SubmitInstructionResponse,
};
use crate::status::to_status;

/// Serves an in-memory ledger so separate processes can share one.
#[derive(Clone, Default)]
pub struct LedgerEndpoint {
    pub ledger: Arc<MemoryLedger>,
}

impl LedgerEndpoint {
    pub fn new(ledger: Arc<MemoryLedger>) -> Self {
        LedgerEndpoint { ledger }
    }
}

#[tonic::async_trait]
impl LedgerRpc for LedgerEndpoint {
    async fn submit_blob(&self, request: Request<SubmitBlobRequest>) -> Result<Response<SubmitBlobResponse>, Status> {
        let req = request.into_inner();
        let tags = req.tags.into_iter().map(|tag| BlobTag::new(tag.name, tag.value)).collect();
        let id = self.ledger.submit_blob(req.data, tags).await.map_err(|e| to_status(&e))?;
        Ok(Response::new(SubmitBlobResponse { id }))
    }

    async fn fetch_blob(&self, request: Request<FetchBlobRequest>) -> Result<Response<FetchBlobResponse>, Status> {
        let id = request.into_inner().id;
        let blob = self.ledger.fetch_blob(&id).await.map_err(|e| to_status(&e))?;
        Ok(Response::new(FetchBlobResponse {
            found: blob.is_some(),
            data: blob.unwrap_or_default(),
        }))
    }

    async fn read_account(&self, request: Request<ReadAccountRequest>) -> Result<Response<ReadAccountResponse>, Status> {
        let address = request.into_inner().address;
        let account = self.ledger.read_account_state(&address).await.map_err(|e| to_status(&e))?;
        Ok(Response::new(ReadAccountResponse {
            found: account.is_some(),
            data: account.unwrap_or_default(),
        }))
    }

    async fn submit_instruction(
        &self,
        request: Request<SubmitInstructionRequest>,
    ) -> Result<Response<SubmitInstructionResponse>, Status> {
        let req = request.into_inner();
        let instruction = SignedInstruction {
            program: req.program,
            data: req.data,
            signer: req.signer,
            signature: req.signature,
        };
        let signature = self.ledger.submit_instruction(instruction).await.map_err(|e| to_status(&e))?;
        Ok(Response::new(SubmitInstructionResponse { signature }))
    }

    async fn logs_since(&self, request: Request<LogsSinceRequest>) -> Result<Response<LogsSinceResponse>, Status> {
        let req = request.into_inner();
        let entries = self
            .ledger
            .logs_since(&req.address, req.after)
            .into_iter()
            .map(Into::into)
            .collect();
        Ok(Response::new(LogsSinceResponse {
            entries,
            head: self.ledger.head(),
        }))
    }

    async fn put_account(&self, request: Request<PutAccountRequest>) -> Result<Response<PutAccountResponse>, Status> {
        let req = request.into_inner();
        debug!(address = %req.address, bytes = req.data.len(), "account written");
        self.ledger.put_account(&req.address, req.data);
        Ok(Response::new(PutAccountResponse {}))
    }

    async fn append_log(&self, request: Request<AppendLogRequest>) -> Result<Response<AppendLogResponse>, Status> {
        let req = request.into_inner();
        let event = self.ledger.append_log(&req.address, req.logs, req.memo, req.failed);
        Ok(Response::new(AppendLogResponse {
            entry: Some(event.into()),
        }))
    }
}
