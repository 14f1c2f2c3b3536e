//! Codecs: document cipher, threshold shares, sealed delivery and signing identities.

pub mod cipher;
pub mod seal;
pub mod shamir;
pub mod signing;
