//! Failure log types.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};

use crate::StoreError;

/// What kind of credential check failed. Anything outside these three is
/// rejected at the type boundary.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailureKind {
    Workspace,
    Password,
    Recipient,
}

impl FailureKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FailureKind::Workspace => "workspace",
            FailureKind::Password => "password",
            FailureKind::Recipient => "recipient",
        }
    }
}

impl FromStr for FailureKind {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "workspace" => Ok(FailureKind::Workspace),
            "password" => Ok(FailureKind::Password),
            "recipient" => Ok(FailureKind::Recipient),
            _ => Err(StoreError::InvalidKind),
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One `(kind, id, source)` failure counter. `lockout_until` is set only
/// once the count reaches the configured maximum.
#[derive(Clone, Debug)]
pub struct FailureRecord {
    pub kind: FailureKind,
    pub id: String,
    pub source: String,
    pub count: u32,
    pub last_failure: DateTime<Utc>,
    pub lockout_until: Option<DateTime<Utc>>,
}
