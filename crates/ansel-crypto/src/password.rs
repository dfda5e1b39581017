//! Argon2id password hashing with self-describing hash strings.

use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use rand_core::{OsRng, RngCore};
use serde::Deserialize;

use crate::CryptoError;

/// Cost profile selected by `security.password_security`.
///
/// The parameter triple is embedded in every produced hash, so the profile
/// can be raised server-wide without migrating stored hashes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PasswordStrength {
    #[default]
    Normal,
    Enhanced,
}

struct CostProfile {
    memory_kib: u32,
    iterations: u32,
    parallelism: u32,
    salt_len: usize,
    tag_len: usize,
}

impl PasswordStrength {
    fn profile(self) -> CostProfile {
        match self {
            PasswordStrength::Normal => CostProfile {
                memory_kib: 64 * 1024,
                iterations: 3,
                parallelism: 4,
                salt_len: 16,
                tag_len: 32,
            },
            PasswordStrength::Enhanced => CostProfile {
                memory_kib: 1024 * 1024,
                iterations: 10,
                parallelism: 8,
                salt_len: 24,
                tag_len: 48,
            },
        }
    }
}

/// Hash a password into a `$argon2id$v=19$m=..,t=..,p=..$salt$tag` string.
///
/// The salt comes from the OS RNG; a generator failure is fatal to the
/// operation and surfaced as [`CryptoError::Rng`].
pub fn hash_password(password: &str, strength: PasswordStrength) -> Result<String, CryptoError> {
    let profile = strength.profile();

    let mut salt_bytes = vec![0u8; profile.salt_len];
    OsRng
        .try_fill_bytes(&mut salt_bytes)
        .map_err(|_| CryptoError::Rng)?;
    let salt = SaltString::encode_b64(&salt_bytes).map_err(|_| CryptoError::MalformedHash)?;

    let params = Params::new(
        profile.memory_kib,
        profile.iterations,
        profile.parallelism,
        Some(profile.tag_len),
    )
    .map_err(|_| CryptoError::MalformedHash)?;
    let hasher = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    let hash = hasher
        .hash_password(password.as_bytes(), &salt)
        .map_err(|_| CryptoError::MalformedHash)?;
    Ok(hash.to_string())
}

/// Verify a password against a stored hash string.
///
/// The memory, iteration, and parallelism parameters are read back out of
/// the hash itself, and the comparison is constant-time. A mismatch is
/// `Ok(false)`; only an unusable hash string is an error.
pub fn verify_password(password: &str, stored: &str) -> Result<bool, CryptoError> {
    let parsed = PasswordHash::new(stored).map_err(|_| CryptoError::MalformedHash)?;

    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(argon2::password_hash::Error::Version) => Err(CryptoError::UnsupportedVersion),
        Err(argon2::password_hash::Error::B64Encoding(_)) => Err(CryptoError::DecodeError),
        Err(_) => Err(CryptoError::MalformedHash),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_embeds_normal_parameters() {
        let hash = hash_password("clear-skies-ahead", PasswordStrength::Normal).unwrap();
        assert!(hash.starts_with("$argon2id$v=19$m=65536,t=3,p=4$"), "{}", hash);
        assert_eq!(hash.split('$').count(), 6);
    }

    #[test]
    fn hash_and_verify_round_trip() {
        let hash = hash_password("SandstoneAgendaTricycle", PasswordStrength::Normal).unwrap();
        assert!(verify_password("SandstoneAgendaTricycle", &hash).unwrap());
        assert!(!verify_password("SandstoneAgendaBicycle", &hash).unwrap());
    }

    #[test]
    fn verify_uses_parameters_from_the_stored_string() {
        // Hash produced with t=2,p=1 rather than the current profile.
        let stored = "$argon2id$v=19$m=65536,t=2,p=1$ew5lqHA5z38za+257DmnTA$\
                      0LWVrI2r7XCqdcCYkJLok65qussSyhN5TTZP+OTgzEI";
        assert!(verify_password("SandstoneAgendaTricycle", stored).unwrap());
        assert!(!verify_password("wrong", stored).unwrap());
    }

    #[test]
    fn malformed_hash_is_an_error() {
        assert!(matches!(
            verify_password("pw", "not-a-phc-string"),
            Err(CryptoError::MalformedHash)
        ));
    }

    #[test]
    fn salts_differ_between_calls() {
        let a = hash_password("same-input", PasswordStrength::Normal).unwrap();
        let b = hash_password("same-input", PasswordStrength::Normal).unwrap();
        assert_ne!(a, b);
    }
}
