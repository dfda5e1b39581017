//! StoreBackend abstracts over the SQLite and PostgreSQL implementations.

use std::sync::Arc;

use ansel_crypto::CryptoString;
use ansel_storage::*;
use ansel_store_postgres::PostgresStore;
use ansel_store_sqlite::SqliteStore;
use chrono::{DateTime, Duration, Utc};

#[derive(Clone)]
pub enum StoreBackend {
    Sqlite(Arc<SqliteStore>),
    Postgres(Arc<PostgresStore>),
}

macro_rules! delegate {
    ($self:ident, $store:ident => $call:expr) => {
        match $self {
            StoreBackend::Sqlite($store) => $call,
            StoreBackend::Postgres($store) => $call,
        }
    };
}

#[async_trait::async_trait]
impl Store for StoreBackend {
    async fn add_workspace(&self, params: &WorkspaceParams) -> Result<(), StoreError> {
        delegate!(self, s => s.add_workspace(params).await)
    }

    async fn get_workspace(&self, wid: &Wid) -> Result<Workspace, StoreError> {
        delegate!(self, s => s.get_workspace(wid).await)
    }

    async fn remove_workspace(&self, wid: &Wid) -> Result<(), StoreError> {
        delegate!(self, s => s.remove_workspace(wid).await)
    }

    async fn set_workspace_status(
        &self,
        wid: &Wid,
        status: WorkspaceStatus,
    ) -> Result<(), StoreError> {
        delegate!(self, s => s.set_workspace_status(wid, status).await)
    }

    async fn set_password(&self, wid: &Wid, password_hash: &str) -> Result<(), StoreError> {
        delegate!(self, s => s.set_password(wid, password_hash).await)
    }

    async fn get_password_hash(&self, wid: &Wid) -> Result<String, StoreError> {
        delegate!(self, s => s.get_password_hash(wid).await)
    }

    async fn check_workspace(&self, wid: &Wid) -> Result<Option<WorkspaceStatus>, StoreError> {
        delegate!(self, s => s.check_workspace(wid).await)
    }

    async fn check_user_id(
        &self,
        uid: &Uid,
        domain: &Domain,
    ) -> Result<Option<WorkspaceStatus>, StoreError> {
        delegate!(self, s => s.check_user_id(uid, domain).await)
    }

    async fn lookup_uid(&self, uid: &Uid, domain: &Domain) -> Result<Wid, StoreError> {
        delegate!(self, s => s.lookup_uid(uid, domain).await)
    }

    async fn add_alias(&self, alias: &Wid, target: &Wid) -> Result<(), StoreError> {
        delegate!(self, s => s.add_alias(alias, target).await)
    }

    async fn get_alias_target(&self, alias: &Wid) -> Result<Wid, StoreError> {
        delegate!(self, s => s.get_alias_target(alias).await)
    }

    async fn add_device(
        &self,
        wid: &Wid,
        device_id: &DeviceId,
        device_key: &CryptoString,
        status: DeviceStatus,
    ) -> Result<(), StoreError> {
        delegate!(self, s => s.add_device(wid, device_id, device_key, status).await)
    }

    async fn remove_device(&self, wid: &Wid, device_id: &DeviceId) -> Result<(), StoreError> {
        delegate!(self, s => s.remove_device(wid, device_id).await)
    }

    async fn get_device(
        &self,
        wid: &Wid,
        device_id: &DeviceId,
    ) -> Result<Option<Device>, StoreError> {
        delegate!(self, s => s.get_device(wid, device_id).await)
    }

    async fn check_device(
        &self,
        wid: &Wid,
        device_id: &DeviceId,
        device_key: &CryptoString,
    ) -> Result<bool, StoreError> {
        delegate!(self, s => s.check_device(wid, device_id, device_key).await)
    }

    async fn update_device(
        &self,
        wid: &Wid,
        device_id: &DeviceId,
        old_key: &CryptoString,
        new_key: &CryptoString,
    ) -> Result<bool, StoreError> {
        delegate!(self, s => s.update_device(wid, device_id, old_key, new_key).await)
    }

    async fn add_prereg(&self, prereg: &Prereg) -> Result<(), StoreError> {
        delegate!(self, s => s.add_prereg(prereg).await)
    }

    async fn check_regcode(
        &self,
        id: &RegId,
        domain: &Domain,
        regcode: &str,
    ) -> Result<(Wid, Option<Uid>), StoreError> {
        delegate!(self, s => s.check_regcode(id, domain, regcode).await)
    }

    async fn delete_prereg(&self, wid: &Wid) -> Result<(), StoreError> {
        delegate!(self, s => s.delete_prereg(wid).await)
    }

    async fn log_failure(
        &self,
        kind: FailureKind,
        id: &str,
        source: &str,
        max_failures: u32,
        lockout: Duration,
    ) -> Result<(), StoreError> {
        delegate!(self, s => s.log_failure(kind, id, source, max_failures, lockout).await)
    }

    async fn check_lockout(
        &self,
        kind: FailureKind,
        id: &str,
        source: &str,
    ) -> Result<Option<DateTime<Utc>>, StoreError> {
        delegate!(self, s => s.check_lockout(kind, id, source).await)
    }

    async fn add_entry(&self, entry: &KeycardEntry) -> Result<(), StoreError> {
        delegate!(self, s => s.add_entry(entry).await)
    }

    async fn get_last_entry(&self, owner: &str) -> Result<Option<KeycardEntry>, StoreError> {
        delegate!(self, s => s.get_last_entry(owner).await)
    }

    async fn get_org_entries(
        &self,
        start: u32,
        end: u32,
    ) -> Result<Vec<KeycardEntry>, StoreError> {
        delegate!(self, s => s.get_org_entries(start, end).await)
    }

    async fn get_user_entries(
        &self,
        wid: &Wid,
        start: u32,
        end: u32,
    ) -> Result<Vec<KeycardEntry>, StoreError> {
        delegate!(self, s => s.get_user_entries(wid, start, end).await)
    }

    async fn add_org_key(
        &self,
        purpose: OrgKeyPurpose,
        public_key: &CryptoString,
        private_key: &CryptoString,
    ) -> Result<(), StoreError> {
        delegate!(self, s => s.add_org_key(purpose, public_key, private_key).await)
    }

    async fn get_primary_signing_key(&self) -> Result<CryptoString, StoreError> {
        delegate!(self, s => s.get_primary_signing_key().await)
    }

    async fn get_org_verifying_key(&self) -> Result<CryptoString, StoreError> {
        delegate!(self, s => s.get_org_verifying_key().await)
    }

    async fn get_encryption_pair(&self) -> Result<OrgKeyPair, StoreError> {
        delegate!(self, s => s.get_encryption_pair().await)
    }
}
