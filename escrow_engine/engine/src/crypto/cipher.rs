//! Document cipher: AES-256-GCM with a random nonce stored in front of the ciphertext.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use rand::RngCore;

use crate::error::{EscrowError, EscrowResult};
use crate::types::Secret;

/// 96-bit GCM nonce, always at offset 0 of a blob.
pub const NONCE_LEN: usize = 12;
/// GCM authentication tag appended by the AEAD.
pub const TAG_LEN: usize = 16;

fn cipher_for(secret: &Secret) -> Aes256Gcm {
    Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(secret.as_bytes()))
}

/// Encrypt `plaintext` under `secret`. Output layout: `nonce || ciphertext || tag`.
pub fn encrypt(secret: &Secret, plaintext: &[u8]) -> EscrowResult<Vec<u8>> {
    let mut nonce = [0u8; NONCE_LEN];
    rand::thread_rng().fill_bytes(&mut nonce);

    let ciphertext = cipher_for(secret)
        .encrypt(Nonce::from_slice(&nonce), plaintext)
        .map_err(|e| EscrowError::Validation(format!("encryption failed: {e:?}")))?;

    let mut blob = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    blob.extend_from_slice(&nonce);
    blob.extend(ciphertext);
    Ok(blob)
}

/// Decrypt a blob produced by [`encrypt`].
pub fn decrypt(secret: &Secret, blob: &[u8]) -> EscrowResult<Vec<u8>> {
    if blob.len() < NONCE_LEN + TAG_LEN {
        return Err(EscrowError::Decryption("ciphertext too short".into()));
    }
    let (nonce, ciphertext) = blob.split_at(NONCE_LEN);

    cipher_for(secret)
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| EscrowError::Decryption("authentication failed".into()))
}
