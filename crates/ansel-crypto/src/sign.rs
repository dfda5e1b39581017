//! Ed25519 signing over tagged strings.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand_core::OsRng;
use zeroize::Zeroizing;

use crate::{CryptoError, CryptoString};

/// The only signing algorithm keycards accept.
pub const SIGNING_ALGORITHM: &str = "ED25519";

/// Generate a fresh signing pair as `(verify_key, signing_key)` tagged strings.
pub fn generate_signing_pair() -> Result<(CryptoString, CryptoString), CryptoError> {
    let signing = SigningKey::generate(&mut OsRng);
    let public = CryptoString::new(SIGNING_ALGORITHM, signing.verifying_key().as_bytes())?;
    let private = CryptoString::new(SIGNING_ALGORITHM, signing.as_bytes())?;
    Ok((public, private))
}

/// Sign bytes with an `ED25519:` private key, producing an `ED25519:` signature.
pub fn sign(signing_key: &CryptoString, data: &[u8]) -> Result<CryptoString, CryptoError> {
    if signing_key.prefix() != SIGNING_ALGORITHM {
        return Err(CryptoError::UnsupportedAlgorithm(
            signing_key.prefix().to_string(),
        ));
    }

    let raw = Zeroizing::new(signing_key.raw_data()?);
    let seed: &[u8; 32] = raw
        .as_slice()
        .try_into()
        .map_err(|_| CryptoError::BadKey)?;
    let key = SigningKey::from_bytes(seed);

    let signature = key.sign(data);
    CryptoString::new(SIGNING_ALGORITHM, &signature.to_bytes())
}

/// Verify an `ED25519:` signature over bytes. A well-formed but wrong
/// signature is `Ok(false)`.
pub fn verify(
    verify_key: &CryptoString,
    data: &[u8],
    signature: &CryptoString,
) -> Result<bool, CryptoError> {
    if verify_key.prefix() != SIGNING_ALGORITHM {
        return Err(CryptoError::UnsupportedAlgorithm(
            verify_key.prefix().to_string(),
        ));
    }
    if signature.prefix() != SIGNING_ALGORITHM {
        return Err(CryptoError::UnsupportedAlgorithm(
            signature.prefix().to_string(),
        ));
    }

    let key_raw = verify_key.raw_data()?;
    let key_bytes: &[u8; 32] = key_raw
        .as_slice()
        .try_into()
        .map_err(|_| CryptoError::BadKey)?;
    let key = VerifyingKey::from_bytes(key_bytes).map_err(|_| CryptoError::BadKey)?;

    let sig_raw = signature.raw_data()?;
    let sig = Signature::from_slice(&sig_raw).map_err(|_| CryptoError::DecodeError)?;

    Ok(key.verify(data, &sig).is_ok())
}
