//! The Store trait that backends implement.

use ansel_crypto::CryptoString;
use chrono::{DateTime, Duration, Utc};

use crate::types::*;
use crate::StoreError;

/// The storage trait the server core depends on.
///
/// Every method is atomic at the row level; cross-row invariants (chain
/// append ordering in particular) are serialized above this trait.
#[cfg_attr(feature = "test-support", mockall::automock)]
#[async_trait::async_trait]
pub trait Store: Send + Sync {
    // ──────────────────────────────── Workspaces ────────────────────────────────

    /// Insert a workspace row. The WID and `(uid, domain)` pair must be
    /// unused, including by soft-deleted rows.
    async fn add_workspace(&self, params: &WorkspaceParams) -> Result<(), StoreError>;

    /// Fetch a workspace by WID.
    async fn get_workspace(&self, wid: &Wid) -> Result<Workspace, StoreError>;

    /// Soft delete: the row keeps its WID and UID forever so neither can be
    /// reused; the password hash becomes the `-` sentinel.
    async fn remove_workspace(&self, wid: &Wid) -> Result<(), StoreError>;

    /// Set the workspace status. `awaiting` and `deleted` are produced only
    /// by registration and removal and cannot be set directly.
    async fn set_workspace_status(
        &self,
        wid: &Wid,
        status: WorkspaceStatus,
    ) -> Result<(), StoreError>;

    /// Replace the stored password hash.
    async fn set_password(&self, wid: &Wid, password_hash: &str) -> Result<(), StoreError>;

    /// The stored password hash for a workspace.
    async fn get_password_hash(&self, wid: &Wid) -> Result<String, StoreError>;

    /// Status of a workspace if it exists, consulting pre-registrations as
    /// `approved`.
    async fn check_workspace(&self, wid: &Wid) -> Result<Option<WorkspaceStatus>, StoreError>;

    /// Same as `check_workspace`, keyed by user ID within a domain.
    async fn check_user_id(
        &self,
        uid: &Uid,
        domain: &Domain,
    ) -> Result<Option<WorkspaceStatus>, StoreError>;

    /// Resolve a `(uid, domain)` pair to its WID.
    async fn lookup_uid(&self, uid: &Uid, domain: &Domain) -> Result<Wid, StoreError>;

    // ───────────────────────────────── Aliases ──────────────────────────────────

    /// Point an alias WID at a target. Chains are rejected: the target must
    /// exist and must not itself be an alias.
    async fn add_alias(&self, alias: &Wid, target: &Wid) -> Result<(), StoreError>;

    /// One hop of alias resolution; never recurses.
    async fn get_alias_target(&self, alias: &Wid) -> Result<Wid, StoreError>;

    // ───────────────────────────────── Devices ──────────────────────────────────

    /// Enroll a device key for a workspace.
    async fn add_device(
        &self,
        wid: &Wid,
        device_id: &DeviceId,
        device_key: &CryptoString,
        status: DeviceStatus,
    ) -> Result<(), StoreError>;

    /// Remove a device immediately.
    async fn remove_device(&self, wid: &Wid, device_id: &DeviceId) -> Result<(), StoreError>;

    /// Fetch one device row, if enrolled.
    async fn get_device(
        &self,
        wid: &Wid,
        device_id: &DeviceId,
    ) -> Result<Option<Device>, StoreError>;

    /// Whether `(wid, device_id, device_key)` matches an enrolled device.
    async fn check_device(
        &self,
        wid: &Wid,
        device_id: &DeviceId,
        device_key: &CryptoString,
    ) -> Result<bool, StoreError>;

    /// Atomically replace a device key, predicated on the old key value.
    /// Returns false when the compare-and-swap misses.
    async fn update_device(
        &self,
        wid: &Wid,
        device_id: &DeviceId,
        old_key: &CryptoString,
        new_key: &CryptoString,
    ) -> Result<bool, StoreError>;

    // ────────────────────────────── Pre-registration ────────────────────────────

    /// Record a pending account. A duplicate `(uid, domain)` is
    /// `AlreadyExists`.
    async fn add_prereg(&self, prereg: &Prereg) -> Result<(), StoreError>;

    /// Authenticate a registration code against a WID or user ID within a
    /// domain. Returns the pending `(wid, uid)` on success; the caller
    /// materializes the workspace and deletes the row.
    async fn check_regcode(
        &self,
        id: &RegId,
        domain: &Domain,
        regcode: &str,
    ) -> Result<(Wid, Option<Uid>), StoreError>;

    /// Delete a pre-registration row after redemption.
    async fn delete_prereg(&self, wid: &Wid) -> Result<(), StoreError>;

    // ─────────────────────────────── Failure log ────────────────────────────────

    /// Record a failure for `(kind, id, source)`: increment an existing
    /// counter or insert a fresh one, and stamp `lockout_until` once the
    /// count reaches `max_failures`.
    async fn log_failure(
        &self,
        kind: FailureKind,
        id: &str,
        source: &str,
        max_failures: u32,
        lockout: Duration,
    ) -> Result<(), StoreError>;

    /// The lockout expiry for `(kind, id, source)`, if one is in force.
    /// Expired lockouts are deleted on the way out, resetting the counter.
    async fn check_lockout(
        &self,
        kind: FailureKind,
        id: &str,
        source: &str,
    ) -> Result<Option<DateTime<Utc>>, StoreError>;

    // ──────────────────────────────── Keycards ──────────────────────────────────

    /// Append a validated entry. `(owner, index)` uniqueness backstops the
    /// chain against concurrent appends.
    async fn add_entry(&self, entry: &KeycardEntry) -> Result<(), StoreError>;

    /// The highest-index entry for an owner.
    async fn get_last_entry(&self, owner: &str) -> Result<Option<KeycardEntry>, StoreError>;

    /// Organization entries: `start < 1` returns only the current entry;
    /// `end == 0` leaves the range open at the top.
    async fn get_org_entries(&self, start: u32, end: u32)
        -> Result<Vec<KeycardEntry>, StoreError>;

    /// User entries with the same range semantics as `get_org_entries`.
    async fn get_user_entries(
        &self,
        wid: &Wid,
        start: u32,
        end: u32,
    ) -> Result<Vec<KeycardEntry>, StoreError>;

    // ─────────────────────────────── Org key history ────────────────────────────

    /// Append a keypair to the organization key history.
    async fn add_org_key(
        &self,
        purpose: OrgKeyPurpose,
        public_key: &CryptoString,
        private_key: &CryptoString,
    ) -> Result<(), StoreError>;

    /// The newest signing private key.
    async fn get_primary_signing_key(&self) -> Result<CryptoString, StoreError>;

    /// The newest signing public key, for verifying organization signatures.
    async fn get_org_verifying_key(&self) -> Result<CryptoString, StoreError>;

    /// The newest encryption keypair.
    async fn get_encryption_pair(&self) -> Result<OrgKeyPair, StoreError>;
}
