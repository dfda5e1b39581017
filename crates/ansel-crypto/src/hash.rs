//! Content hashing for keycard entries.

use blake2::digest::consts::U32;
use blake2::{Blake2b, Digest};

use crate::{CryptoError, CryptoString};

type Blake2b256 = Blake2b<U32>;

/// Hash algorithms accepted for keycard fingerprints.
pub const SUPPORTED_HASH_ALGORITHMS: &[&str] =
    &["BLAKE3-256", "BLAKE2B-256", "SHA-256", "SHA3-256"];

/// Hash bytes under the named algorithm, returning an `ALGO:<b85>` string.
pub fn hash_bytes(algorithm: &str, data: &[u8]) -> Result<CryptoString, CryptoError> {
    let digest: Vec<u8> = match algorithm {
        "BLAKE3-256" => blake3::hash(data).as_bytes().to_vec(),
        "BLAKE2B-256" => {
            let mut hasher = Blake2b256::new();
            hasher.update(data);
            hasher.finalize().to_vec()
        }
        "SHA-256" => {
            let mut hasher = sha2::Sha256::new();
            hasher.update(data);
            hasher.finalize().to_vec()
        }
        "SHA3-256" => {
            let mut hasher = sha3::Sha3_256::new();
            hasher.update(data);
            hasher.finalize().to_vec()
        }
        other => return Err(CryptoError::UnsupportedAlgorithm(other.to_string())),
    };

    CryptoString::new(algorithm, &digest)
}

/// Recompute a fingerprint with the algorithm named in its prefix and
/// compare. A mismatch is `Ok(false)`.
pub fn verify_hash(fingerprint: &CryptoString, data: &[u8]) -> Result<bool, CryptoError> {
    let recomputed = hash_bytes(fingerprint.prefix(), data)?;
    Ok(recomputed == *fingerprint)
}
