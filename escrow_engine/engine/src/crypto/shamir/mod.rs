//! Threshold secret sharing of 32-byte escrow keys.
//!
//! Each byte of the secret gets its own random polynomial of degree `t - 1`
//! over GF(2^8); share `i` holds the evaluations at `x = i`. Any `t` distinct
//! shares interpolate the secret back; fewer reveal nothing about it.
//!
//! Shares carry their own threshold so `combine` can refuse an undersized set
//! instead of interpolating a plausible-looking wrong key.

mod field;

use std::collections::BTreeMap;
use std::fmt;

use rand::RngCore;
use zeroize::Zeroizing;

use crate::error::{EscrowError, EscrowResult};
use crate::types::{SECRET_LEN, Secret};
use field::Gf256;

/// Wire header: threshold byte followed by the share id byte.
const HEADER_LEN: usize = 2;

/// One fragment of a split secret.
#[derive(Clone, PartialEq, Eq)]
pub struct Share {
    id: u8,
    threshold: u8,
    data: Zeroizing<Vec<u8>>,
}

impl Share {
    /// Share identifier (x-coordinate), never zero.
    pub fn id(&self) -> u8 {
        self.id
    }

    pub fn threshold(&self) -> u8 {
        self.threshold
    }

    /// Opaque wire form: `threshold || id || data`.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_LEN + self.data.len());
        out.push(self.threshold);
        out.push(self.id);
        out.extend_from_slice(&self.data);
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> EscrowResult<Self> {
        if bytes.len() != HEADER_LEN + SECRET_LEN {
            return Err(EscrowError::Validation(format!(
                "share must be {} bytes, got {}",
                HEADER_LEN + SECRET_LEN,
                bytes.len()
            )));
        }
        let (threshold, id) = (bytes[0], bytes[1]);
        if id == 0 {
            return Err(EscrowError::Validation("share id must be non-zero".into()));
        }
        if threshold < 2 {
            return Err(EscrowError::Validation(format!("share threshold {threshold} below 2")));
        }
        Ok(Share {
            id,
            threshold,
            data: Zeroizing::new(bytes[HEADER_LEN..].to_vec()),
        })
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    pub fn from_hex(text: &str) -> EscrowResult<Self> {
        let bytes = Zeroizing::new(
            hex::decode(text.trim())
                .map_err(|e| EscrowError::Validation(format!("share hex: {e}")))?,
        );
        Share::from_bytes(&bytes)
    }
}

impl fmt::Debug for Share {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Share")
            .field("id", &self.id)
            .field("threshold", &self.threshold)
            .finish_non_exhaustive()
    }
}

/// Split `secret` into `n` shares, any `t` of which reconstruct it.
pub fn split(secret: &Secret, n: u8, t: u8) -> EscrowResult<Vec<Share>> {
    if t < 2 {
        return Err(EscrowError::Validation(format!("threshold {t} must be at least 2")));
    }
    if t > n {
        return Err(EscrowError::Validation(format!(
            "threshold {t} exceeds share count {n}"
        )));
    }

    let mut rng = rand::thread_rng();
    let mut shares: Vec<Share> = (1..=n)
        .map(|id| Share {
            id,
            threshold: t,
            data: Zeroizing::new(vec![0u8; SECRET_LEN]),
        })
        .collect();

    let mut coefficients = Zeroizing::new(vec![0u8; t as usize]);
    for (index, byte) in secret.as_bytes().iter().enumerate() {
        coefficients[0] = *byte;
        rng.fill_bytes(&mut coefficients[1..]);
        let poly: Vec<Gf256> = coefficients.iter().map(|c| Gf256(*c)).collect();

        for share in shares.iter_mut() {
            share.data[index] = Gf256::evaluate(&poly, Gf256(share.id)).0;
        }
    }

    Ok(shares)
}

/// Reconstruct a secret from any `t` or more shares of the same split.
///
/// Duplicate ids collapse to one share. Fewer than `t` distinct shares fail
/// with `InsufficientShares`.
pub fn combine(shares: &[Share]) -> EscrowResult<Secret> {
    let first = shares
        .first()
        .ok_or(EscrowError::InsufficientShares { have: 0, need: 2 })?;
    let threshold = first.threshold;

    let mut distinct: BTreeMap<u8, &Share> = BTreeMap::new();
    for share in shares {
        if share.threshold != threshold || share.data.len() != SECRET_LEN {
            return Err(EscrowError::Validation("inconsistent shares".into()));
        }
        if let Some(existing) = distinct.get(&share.id) {
            if existing.data != share.data {
                return Err(EscrowError::Validation(format!(
                    "conflicting shares for id {}",
                    share.id
                )));
            }
            continue;
        }
        distinct.insert(share.id, share);
    }

    let need = threshold as usize;
    if distinct.len() < need {
        return Err(EscrowError::InsufficientShares {
            have: distinct.len(),
            need,
        });
    }

    let selected: Vec<&Share> = distinct.values().take(need).copied().collect();
    let mut secret = Zeroizing::new([0u8; SECRET_LEN]);
    for (index, out) in secret.iter_mut().enumerate() {
        let points: Vec<(Gf256, Gf256)> = selected
            .iter()
            .map(|s| (Gf256(s.id), Gf256(s.data[index])))
            .collect();
        *out = Gf256::interpolate_at_zero(&points).0;
    }

    Ok(Secret::from(*secret))
}
