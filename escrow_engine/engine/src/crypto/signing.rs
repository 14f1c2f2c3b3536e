//! Ed25519 identities: escrow-id signatures, verification and the canonical keypair file.

use std::fmt;
use std::path::Path;

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use tracing::info;
use zeroize::Zeroizing;

use crate::error::{EscrowError, EscrowResult};
use crate::types::{AccessRequest, EscrowId, ProposalRef};

/// On-disk keypair format. Both fields are lowercase hex.
#[derive(Serialize, Deserialize)]
struct KeypairFile {
    public_key: String,
    secret_key: String,
}

/// A signing identity (requester, operator or key-holder).
pub struct Identity {
    signing_key: SigningKey,
}

impl Identity {
    pub fn generate() -> Self {
        Identity {
            signing_key: SigningKey::generate(&mut OsRng),
        }
    }

    /// Builds an identity from a 32-byte Ed25519 seed.
    pub fn from_secret_bytes(bytes: &[u8]) -> EscrowResult<Self> {
        let seed: [u8; 32] = bytes
            .try_into()
            .map_err(|_| EscrowError::Validation("secret key must be 32 bytes".into()))?;
        let seed = Zeroizing::new(seed);
        Ok(Identity {
            signing_key: SigningKey::from_bytes(&seed),
        })
    }

    pub fn signing_key(&self) -> &SigningKey {
        &self.signing_key
    }

    pub fn public_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }

    pub fn public_key_hex(&self) -> String {
        hex::encode(self.public_key().as_bytes())
    }

    pub fn sign(&self, message: &[u8]) -> Vec<u8> {
        self.signing_key.sign(message).to_bytes().to_vec()
    }

    pub fn sign_escrow_id(&self, escrow_id: &EscrowId) -> Vec<u8> {
        self.sign(&escrow_id.message_bytes())
    }

    /// Signs `escrow_id` and packages it with the governance reference.
    pub fn access_request(&self, escrow_id: &EscrowId, proposal: ProposalRef) -> AccessRequest {
        AccessRequest {
            requester_public_key: self.public_key().as_bytes().to_vec(),
            signature: self.sign_escrow_id(escrow_id),
            escrow_id: escrow_id.clone(),
            proposal,
        }
    }

    /// Load a keypair file, rejecting files whose public half does not match the secret.
    pub fn load(path: impl AsRef<Path>) -> EscrowResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| EscrowError::Persistence(format!("read {}: {e}", path.display())))?;
        let file: KeypairFile = serde_json::from_str(&raw)
            .map_err(|e| EscrowError::Validation(format!("keypair file {}: {e}", path.display())))?;

        let secret = Zeroizing::new(
            hex::decode(file.secret_key.trim())
                .map_err(|e| EscrowError::Validation(format!("secret key hex: {e}")))?,
        );
        let identity = Identity::from_secret_bytes(&secret)?;
        if identity.public_key_hex() != file.public_key.trim().to_ascii_lowercase() {
            return Err(EscrowError::Validation(format!(
                "keypair file {} has a mismatched public key",
                path.display()
            )));
        }
        Ok(identity)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> EscrowResult<()> {
        let path = path.as_ref();
        let file = KeypairFile {
            public_key: self.public_key_hex(),
            secret_key: hex::encode(self.signing_key.to_bytes()),
        };
        let json = Zeroizing::new(
            serde_json::to_string_pretty(&file)
                .map_err(|e| EscrowError::Persistence(format!("encode keypair: {e}")))?,
        );
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| EscrowError::Persistence(format!("create {}: {e}", parent.display())))?;
        }
        std::fs::write(path, json.as_bytes())
            .map_err(|e| EscrowError::Persistence(format!("write {}: {e}", path.display())))
    }

    /// Load the keypair at `path`, or generate and save a new one if the file is absent.
    pub fn load_or_create(path: impl AsRef<Path>) -> EscrowResult<Self> {
        let path = path.as_ref();
        if path.exists() {
            return Identity::load(path);
        }
        let identity = Identity::generate();
        identity.save(path)?;
        info!(path = %path.display(), public_key = %identity.public_key_hex(), "generated new keypair");
        Ok(identity)
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("public_key", &self.public_key_hex())
            .finish_non_exhaustive()
    }
}

/// Parse raw Ed25519 public key bytes.
pub fn parse_public_key(bytes: &[u8]) -> EscrowResult<VerifyingKey> {
    let raw: [u8; 32] = bytes
        .try_into()
        .map_err(|_| EscrowError::Validation("public key must be 32 bytes".into()))?;
    VerifyingKey::from_bytes(&raw)
        .map_err(|e| EscrowError::Validation(format!("invalid public key: {e}")))
}

pub fn parse_public_key_hex(text: &str) -> EscrowResult<VerifyingKey> {
    let bytes = hex::decode(text.trim())
        .map_err(|e| EscrowError::Validation(format!("public key hex: {e}")))?;
    parse_public_key(&bytes)
}

/// Verify `signature` over the escrow id bytes.
///
/// Malformed inputs are validation errors; a well-formed signature that does
/// not verify is `Unauthorized`.
pub fn verify_escrow_signature(
    public_key: &[u8],
    escrow_id: &EscrowId,
    signature: &[u8],
) -> EscrowResult<VerifyingKey> {
    let key = parse_public_key(public_key)?;
    let signature = Signature::from_slice(signature)
        .map_err(|e| EscrowError::Validation(format!("invalid signature format: {e}")))?;

    key.verify(&escrow_id.message_bytes(), &signature)
        .map_err(|_| EscrowError::Unauthorized("invalid signature".into()))?;
    Ok(key)
}
