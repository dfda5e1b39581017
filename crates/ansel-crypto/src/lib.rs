//! Cryptographic primitives for the Ansel server.
//!
//! Everything a key, hash, or signature touches goes through [`CryptoString`],
//! the `ALGO:DATA` tagged format used on the wire and in storage. Password
//! hashing, Ed25519 signing, and content hashing live here so the higher
//! layers never handle raw algorithm parameters directly.

use thiserror::Error;

pub mod base85;
mod cstring;
mod hash;
mod password;
mod sign;

pub use cstring::CryptoString;
pub use hash::{hash_bytes, verify_hash, SUPPORTED_HASH_ALGORITHMS};
pub use password::{hash_password, verify_password, PasswordStrength};
pub use sign::{generate_signing_pair, sign, verify, SIGNING_ALGORITHM};

/// Uniform error type for all crypto operations.
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("bad string format")]
    BadFormat,
    #[error("decoding error")]
    DecodeError,
    #[error("malformed password hash")]
    MalformedHash,
    #[error("unsupported password hash version")]
    UnsupportedVersion,
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),
    #[error("random generator failure")]
    Rng,
    #[error("bad key material")]
    BadKey,
    #[error("signing failed")]
    SigningFailed,
}
