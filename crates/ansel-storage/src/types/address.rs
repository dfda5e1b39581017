//! Ansel addresses: `local/domain` with a workspace ID or user ID on the left.

use std::fmt;
use std::str::FromStr;

use crate::types::ids::{Domain, Uid, Wid};
use crate::StoreError;

/// What kind of address a string is.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AddressKind {
    Invalid,
    Workspace,
    User,
}

/// A parsed address. The workspace form carries a UUID local part; the user
/// form a human-chosen ID.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Address {
    Workspace(Wid, Domain),
    User(Uid, Domain),
}

impl Address {
    pub fn domain(&self) -> &Domain {
        match self {
            Address::Workspace(_, domain) => domain,
            Address::User(_, domain) => domain,
        }
    }
}

impl FromStr for Address {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (local, domain) = s.split_once('/').ok_or(StoreError::InvalidAddress)?;
        if local.is_empty() || domain.contains('/') {
            return Err(StoreError::InvalidAddress);
        }
        let domain: Domain = domain.parse()?;

        if let Ok(wid) = local.parse::<Wid>() {
            return Ok(Address::Workspace(wid, domain));
        }
        let uid: Uid = local.parse()?;
        Ok(Address::User(uid, domain))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Address::Workspace(wid, domain) => write!(f, "{}/{}", wid, domain),
            Address::User(uid, domain) => write!(f, "{}/{}", uid, domain),
        }
    }
}

/// Classify a raw string without keeping the parse.
pub fn classify_address(s: &str) -> AddressKind {
    match s.parse::<Address>() {
        Ok(Address::Workspace(..)) => AddressKind::Workspace,
        Ok(Address::User(..)) => AddressKind::User,
        Err(_) => AddressKind::Invalid,
    }
}
