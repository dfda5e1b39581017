//! Organization key history.

use std::str::FromStr;

use ansel_crypto::CryptoString;
use chrono::{DateTime, Utc};

use crate::StoreError;

/// What an organization keypair is for. History is kept per purpose; the
/// current pair is the newest row.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OrgKeyPurpose {
    Sign,
    Encrypt,
}

impl OrgKeyPurpose {
    pub fn as_str(self) -> &'static str {
        match self {
            OrgKeyPurpose::Sign => "sign",
            OrgKeyPurpose::Encrypt => "encrypt",
        }
    }
}

impl FromStr for OrgKeyPurpose {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sign" => Ok(OrgKeyPurpose::Sign),
            "encrypt" => Ok(OrgKeyPurpose::Encrypt),
            _ => Err(StoreError::Conflict),
        }
    }
}

/// One organization keypair row.
#[derive(Clone, Debug)]
pub struct OrgKeyPair {
    pub purpose: OrgKeyPurpose,
    pub public_key: CryptoString,
    pub private_key: CryptoString,
    pub created_at: DateTime<Utc>,
}
