//! Strongly-typed identifiers (avoid mixing strings/UUIDs arbitrarily).

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use uuid::Uuid;

use crate::StoreError;

static DOMAIN_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Za-z0-9]+\.)+[A-Za-z0-9]+$").expect("static pattern"));

/// Workspace identifier: a UUID, unique across the server and never reused.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Wid(Uuid);

impl Wid {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl FromStr for Wid {
    type Err = StoreError;

    /// Accepts both the 32-character and the dashed 36-character forms.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 32 && s.len() != 36 {
            return Err(StoreError::InvalidAddress);
        }
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|_| StoreError::InvalidAddress)
    }
}

impl fmt::Display for Wid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

/// Human-chosen local identifier, unique within a domain.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Uid(String);

impl Uid {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Uid {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() || s.len() > 128 {
            return Err(StoreError::InvalidAddress);
        }
        // No whitespace and no quote character, ever.
        if s.chars().any(|c| c.is_whitespace() || c == '"') {
            return Err(StoreError::InvalidAddress);
        }
        Ok(Self(s.to_string()))
    }
}

impl fmt::Display for Uid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A DNS-style organization domain.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Domain(String);

impl Domain {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Domain {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if DOMAIN_PATTERN.is_match(s) {
            Ok(Self(s.to_string()))
        } else {
            Err(StoreError::InvalidDomain)
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Per-device opaque token, always 40 characters.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct DeviceId(String);

impl DeviceId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for DeviceId {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 40 || !s.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(StoreError::InvalidAddress);
        }
        Ok(Self(s.to_string()))
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
