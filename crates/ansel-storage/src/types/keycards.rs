//! Persisted keycard chain entries.

use ansel_crypto::CryptoString;

/// The owner key used for organization entries; user entries use the
/// workspace ID string.
pub const ORG_OWNER: &str = "organization";

/// One stored chain entry: the verbatim canonical bytes plus the pieces the
/// chain queries need.
#[derive(Clone, Debug)]
pub struct KeycardEntry {
    pub owner: String,
    pub index: u32,
    pub creation_time: String,
    pub entry: String,
    pub fingerprint: CryptoString,
}
