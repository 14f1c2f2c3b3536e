//! Anonymous sealed delivery to an Ed25519 identity.
//!
//! The recipient's signing key is mapped to its X25519 counterpart, an
//! ephemeral X25519 key agrees on a shared secret, and the payload is
//! encrypted with the document cipher under a key derived from that secret
//! and both public keys. Nothing in the output identifies the sender.

use ed25519_dalek::{SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};
use x25519_dalek::{EphemeralSecret, PublicKey, StaticSecret};
use zeroize::Zeroizing;

use crate::crypto::cipher;
use crate::error::{EscrowError, EscrowResult};
use crate::types::{SECRET_LEN, Secret};

/// Ephemeral X25519 public key prefix.
pub const EPHEMERAL_LEN: usize = 32;

const KDF_DOMAIN: &[u8] = b"escrow-engine/sealed-delivery/v1";

fn x25519_public(recipient: &VerifyingKey) -> PublicKey {
    PublicKey::from(recipient.to_montgomery().to_bytes())
}

fn x25519_secret(recipient: &SigningKey) -> StaticSecret {
    let scalar = Zeroizing::new(recipient.to_scalar_bytes());
    StaticSecret::from(*scalar)
}

fn derive_key(shared: &[u8; 32], ephemeral: &[u8; 32], recipient: &[u8; 32]) -> Secret {
    let mut hasher = Sha256::new();
    hasher.update(KDF_DOMAIN);
    hasher.update(shared);
    hasher.update(ephemeral);
    hasher.update(recipient);
    let digest: [u8; SECRET_LEN] = hasher.finalize().into();
    Secret::from(digest)
}

/// Seal `plaintext` so only the holder of `recipient`'s signing key can open it.
pub fn seal(plaintext: &[u8], recipient: &VerifyingKey) -> EscrowResult<Vec<u8>> {
    let recipient_x = x25519_public(recipient);
    let ephemeral = EphemeralSecret::random_from_rng(OsRng);
    let ephemeral_public = PublicKey::from(&ephemeral);

    let shared = ephemeral.diffie_hellman(&recipient_x);
    if !shared.was_contributory() {
        return Err(EscrowError::Validation("recipient key is a low-order point".into()));
    }

    let key = derive_key(shared.as_bytes(), ephemeral_public.as_bytes(), recipient_x.as_bytes());
    let body = cipher::encrypt(&key, plaintext)?;

    let mut sealed = Vec::with_capacity(EPHEMERAL_LEN + body.len());
    sealed.extend_from_slice(ephemeral_public.as_bytes());
    sealed.extend(body);
    Ok(sealed)
}

/// Open a payload produced by [`seal`].
pub fn open(
    sealed: &[u8],
    recipient: &VerifyingKey,
    recipient_secret: &SigningKey,
) -> EscrowResult<Vec<u8>> {
    if sealed.len() < EPHEMERAL_LEN + cipher::NONCE_LEN + cipher::TAG_LEN {
        return Err(EscrowError::Unseal("sealed payload too short".into()));
    }
    let (ephemeral_bytes, body) = sealed.split_at(EPHEMERAL_LEN);
    let ephemeral_raw: [u8; EPHEMERAL_LEN] = ephemeral_bytes
        .try_into()
        .map_err(|_| EscrowError::Unseal("bad ephemeral key".into()))?;
    let ephemeral_public = PublicKey::from(ephemeral_raw);

    let recipient_x = x25519_public(recipient);
    let shared = x25519_secret(recipient_secret).diffie_hellman(&ephemeral_public);
    if !shared.was_contributory() {
        return Err(EscrowError::Unseal("non-contributory key exchange".into()));
    }

    let key = derive_key(shared.as_bytes(), ephemeral_public.as_bytes(), recipient_x.as_bytes());
    cipher::decrypt(&key, body).map_err(|_| EscrowError::Unseal("cannot open sealed payload".into()))
}
