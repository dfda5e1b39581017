//! Chain linkage rules for keycard append.

use ansel_crypto::CryptoString;

use crate::{Entry, EntryError, EntryType, SignatureSlot};

fn chain_key_field(etype: EntryType) -> &'static str {
    // The key a successor's custody signature must verify under.
    match etype {
        EntryType::Organization => "Primary-Signing-Key",
        EntryType::User => "Contact-Request-Verification-Key",
    }
}

/// Verify that `new` is a valid successor of `prev`.
///
/// The four append preconditions: the index increases by exactly one, the
/// new entry carries the previous fingerprint, the custody signature
/// verifies under the previous entry's signing key, and (for user entries)
/// the organization signature verifies under the current organization key.
pub fn verify_chain_link(
    prev: &Entry,
    new: &Entry,
    org_verify_key: Option<&CryptoString>,
) -> Result<(), EntryError> {
    if prev.entry_type() != new.entry_type() {
        return Err(EntryError::ChainBroken("entry type changed".to_string()));
    }

    new.validate_data()?;

    if new.index()? != prev.index()? + 1 {
        return Err(EntryError::ChainBroken(format!(
            "index {} does not follow {}",
            new.index()?,
            prev.index()?
        )));
    }

    let prev_fingerprint = prev
        .hash()
        .ok_or_else(|| EntryError::ChainBroken("previous entry has no hash".to_string()))?;
    match new.prev_hash() {
        Some(prev_hash) if prev_hash == prev_fingerprint => {}
        _ => {
            return Err(EntryError::ChainBroken(
                "Previous-Hash does not match the prior entry".to_string(),
            ))
        }
    }

    let key_field = chain_key_field(prev.entry_type());
    let chain_key: CryptoString = prev
        .field(key_field)
        .ok_or(EntryError::MissingField("Primary-Signing-Key"))?
        .parse()
        .map_err(|_| EntryError::InvalidValue("Primary-Signing-Key"))?;
    if new.signature(SignatureSlot::Custody).is_none() {
        return Err(EntryError::ChainBroken(
            "custody signature missing".to_string(),
        ));
    }
    if !new.verify_signature(&chain_key, SignatureSlot::Custody)? {
        return Err(EntryError::ChainBroken(
            "custody signature invalid".to_string(),
        ));
    }

    if new.entry_type() == EntryType::User {
        let org_key = org_verify_key.ok_or_else(|| {
            EntryError::ChainBroken("organization verification key unavailable".to_string())
        })?;
        if !new.verify_signature(org_key, SignatureSlot::Organization)? {
            return Err(EntryError::ChainBroken(
                "organization signature invalid".to_string(),
            ));
        }
    }

    if !new.verify_entry_hash()? {
        return Err(EntryError::ChainBroken("entry hash invalid".to_string()));
    }

    Ok(())
}

/// Verify everything self-contained about a completed entry: compliance,
/// field formats, the fingerprint, and each present signature under the
/// keys the entry itself names (plus the organization key for user
/// entries). Custody linkage needs the previous entry and is checked by
/// [`verify_chain_link`].
pub fn verify_full(entry: &Entry, org_verify_key: Option<&CryptoString>) -> Result<(), EntryError> {
    if !entry.is_compliant() {
        return Err(EntryError::ChainBroken("entry is not compliant".to_string()));
    }
    entry.validate_data()?;

    if !entry.verify_entry_hash()? {
        return Err(EntryError::ChainBroken("entry hash invalid".to_string()));
    }

    match entry.entry_type() {
        EntryType::Organization => {
            let key: CryptoString = entry
                .field("Primary-Signing-Key")
                .ok_or(EntryError::MissingField("Primary-Signing-Key"))?
                .parse()
                .map_err(|_| EntryError::InvalidValue("Primary-Signing-Key"))?;
            if !entry.verify_signature(&key, SignatureSlot::Organization)? {
                return Err(EntryError::VerifyFailed("Organization"));
            }
        }
        EntryType::User => {
            let org_key = org_verify_key.ok_or_else(|| {
                EntryError::ChainBroken("organization verification key unavailable".to_string())
            })?;
            if !entry.verify_signature(org_key, SignatureSlot::Organization)? {
                return Err(EntryError::VerifyFailed("Organization"));
            }

            let user_key: CryptoString = entry
                .field("Contact-Request-Verification-Key")
                .ok_or(EntryError::MissingField("Contact-Request-Verification-Key"))?
                .parse()
                .map_err(|_| EntryError::InvalidValue("Contact-Request-Verification-Key"))?;
            if !entry.verify_signature(&user_key, SignatureSlot::User)? {
                return Err(EntryError::VerifyFailed("User"));
            }
        }
    }

    Ok(())
}
