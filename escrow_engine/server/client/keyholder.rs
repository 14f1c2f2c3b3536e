use async_trait::async_trait;
use ed25519_dalek::VerifyingKey;
use escrow_engine::crypto::seal;
use escrow_engine::crypto::shamir::Share;
use escrow_engine::crypto::signing::parse_public_key;
use escrow_engine::keyholder::KeyHolder;
use escrow_engine::{AccessRequest, EscrowError, EscrowId, EscrowResult};
use tokio::sync::OnceCell;
use tonic::transport::Channel;
use tracing::debug;
use zeroize::Zeroizing;

use super::ClientConfig;
use crate::proto::key_holder_client::KeyHolderClient;
use crate::proto::{DescribeRequest, DescribeResponse, GetShareRequest, HealthRequest, StoreShareRequest};
use crate::status::from_status;

/// A key-holder reached over gRPC.
///
/// Shares are sealed to the holder's own key before they leave this
/// process. The key is learned from `Describe` on first use unless pinned.
pub struct RemoteKeyHolder {
    label: String,
    client: KeyHolderClient<Channel>,
    sealing_key: OnceCell<VerifyingKey>,
}

impl RemoteKeyHolder {
    pub fn new(label: impl Into<String>, config: &ClientConfig) -> EscrowResult<Self> {
        Ok(RemoteKeyHolder {
            label: label.into(),
            client: KeyHolderClient::new(config.channel()?),
            sealing_key: OnceCell::new(),
        })
    }

    /// Seal shares to `key` instead of trusting what the holder advertises.
    pub fn with_sealing_key(self, key: VerifyingKey) -> Self {
        RemoteKeyHolder {
            sealing_key: OnceCell::new_with(Some(key)),
            ..self
        }
    }

    pub async fn describe(&self) -> EscrowResult<DescribeResponse> {
        let response = self
            .client
            .clone()
            .describe(DescribeRequest {})
            .await
            .map_err(|s| from_status(&s))?;
        Ok(response.into_inner())
    }

    pub async fn health(&self) -> EscrowResult<String> {
        let response = self
            .client
            .clone()
            .health(HealthRequest {})
            .await
            .map_err(|s| from_status(&s))?;
        Ok(response.into_inner().status)
    }

    async fn sealing_key(&self) -> EscrowResult<&VerifyingKey> {
        self.sealing_key
            .get_or_try_init(|| async {
                let described = self.describe().await?;
                debug!(holder = %self.label, remote_label = %described.label, "learned key-holder public key");
                parse_public_key(&described.public_key)
            })
            .await
    }
}

#[async_trait]
impl KeyHolder for RemoteKeyHolder {
    fn label(&self) -> &str {
        &self.label
    }

    async fn store_share(&self, escrow_id: &EscrowId, share: &Share) -> EscrowResult<()> {
        let key = self.sealing_key().await?;
        let plaintext = Zeroizing::new(share.to_bytes());
        let sealed_share = seal::seal(&plaintext, key)?;

        self.client
            .clone()
            .store_share(StoreShareRequest {
                escrow_id: escrow_id.to_string(),
                sealed_share,
            })
            .await
            .map_err(|s| from_status(&s))?;
        Ok(())
    }

    async fn get_share(&self, request: &AccessRequest) -> EscrowResult<Vec<u8>> {
        let response = self
            .client
            .clone()
            .get_share(GetShareRequest {
                requester_public_key: request.requester_public_key.clone(),
                signature: request.signature.clone(),
                escrow_id: request.escrow_id.to_string(),
                proposal: Some((&request.proposal).into()),
            })
            .await
            .map_err(|s| from_status(&s))?;

        let sealed = response.into_inner().sealed_share;
        if sealed.is_empty() {
            return Err(EscrowError::Unseal(format!("{} returned an empty share", self.label)));
        }
        Ok(sealed)
    }
}
