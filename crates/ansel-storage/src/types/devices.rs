//! Device types.

use std::str::FromStr;

use ansel_crypto::CryptoString;

use crate::types::ids::{DeviceId, Wid};
use crate::StoreError;

/// Enrollment state of a device key.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeviceStatus {
    Active,
    Pending,
}

impl DeviceStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            DeviceStatus::Active => "active",
            DeviceStatus::Pending => "pending",
        }
    }
}

impl FromStr for DeviceStatus {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(DeviceStatus::Active),
            "pending" => Ok(DeviceStatus::Pending),
            _ => Err(StoreError::Conflict),
        }
    }
}

/// One enrolled device key for a workspace.
#[derive(Clone, Debug)]
pub struct Device {
    pub wid: Wid,
    pub device_id: DeviceId,
    pub device_key: CryptoString,
    pub status: DeviceStatus,
}
