//! Workspace types.

use std::fmt;
use std::str::FromStr;

use crate::types::ids::{Domain, Uid, Wid};
use crate::StoreError;

/// Lifecycle status of a workspace.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorkspaceStatus {
    Active,
    Disabled,
    Approved,
    Awaiting,
    Deleted,
    Pending,
}

impl WorkspaceStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            WorkspaceStatus::Active => "active",
            WorkspaceStatus::Disabled => "disabled",
            WorkspaceStatus::Approved => "approved",
            WorkspaceStatus::Awaiting => "awaiting",
            WorkspaceStatus::Deleted => "deleted",
            WorkspaceStatus::Pending => "pending",
        }
    }
}

impl FromStr for WorkspaceStatus {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(WorkspaceStatus::Active),
            "disabled" => Ok(WorkspaceStatus::Disabled),
            "approved" => Ok(WorkspaceStatus::Approved),
            "awaiting" => Ok(WorkspaceStatus::Awaiting),
            "deleted" => Ok(WorkspaceStatus::Deleted),
            "pending" => Ok(WorkspaceStatus::Pending),
            _ => Err(StoreError::Conflict),
        }
    }
}

impl fmt::Display for WorkspaceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Individual account, or an alias pointing at one.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorkspaceType {
    Individual,
    Alias,
}

impl WorkspaceType {
    pub fn as_str(self) -> &'static str {
        match self {
            WorkspaceType::Individual => "individual",
            WorkspaceType::Alias => "alias",
        }
    }
}

impl FromStr for WorkspaceType {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "individual" => Ok(WorkspaceType::Individual),
            "alias" => Ok(WorkspaceType::Alias),
            _ => Err(StoreError::Conflict),
        }
    }
}

/// Workspace record. The password hash is deliberately not carried here;
/// it has its own accessor on the store.
#[derive(Clone, Debug)]
pub struct Workspace {
    pub wid: Wid,
    pub uid: Option<Uid>,
    pub domain: Domain,
    pub wtype: WorkspaceType,
    pub status: WorkspaceStatus,
}

/// Parameters for creating a workspace.
#[derive(Clone, Debug)]
pub struct WorkspaceParams {
    pub wid: Wid,
    pub uid: Option<Uid>,
    pub domain: Domain,
    pub password_hash: String,
    pub status: WorkspaceStatus,
    pub wtype: WorkspaceType,
}
