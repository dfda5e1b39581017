//! PostgreSQL implementation of the Ansel storage trait.
//!
//! The production backend. The pool provides its own connection management;
//! every table write in the server goes through this API.

use ansel_crypto::CryptoString;
use ansel_storage::{
    Device, DeviceId, DeviceStatus, Domain, FailureKind, KeycardEntry, OrgKeyPair, OrgKeyPurpose,
    Prereg, RegId, Store, StoreError, Uid, Wid, Workspace, WorkspaceParams, WorkspaceStatus,
};
use chrono::{DateTime, Duration, Utc};
use sqlx::{postgres::PgPoolOptions, PgPool};

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Connect and run pending migrations. A connection failure here is a
    /// startup-fatal condition for the server.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(16)
            .connect(url)
            .await
            .map_err(backend_err)?;

        MIGRATOR.run(&pool).await.map_err(backend_err)?;

        Ok(Self { pool })
    }
}

fn backend_err(e: impl std::fmt::Display) -> StoreError {
    StoreError::Backend(e.to_string())
}

fn insert_err(e: sqlx::Error) -> StoreError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::AlreadyExists,
        _ => backend_err(e),
    }
}

fn parse_wid(s: &str) -> Result<Wid, StoreError> {
    s.parse()
        .map_err(|_| StoreError::Backend(format!("corrupt wid in database: {s}")))
}

fn parse_cstring(s: &str) -> Result<CryptoString, StoreError> {
    s.parse()
        .map_err(|_| StoreError::Backend(format!("corrupt tagged string in database: {s}")))
}

fn uid_column(uid: &Option<Uid>) -> String {
    uid.as_ref().map(|u| u.as_str().to_string()).unwrap_or_default()
}

#[async_trait::async_trait]
impl Store for PostgresStore {
    // ──────────────────────────────── Workspaces ────────────────────────────────

    async fn add_workspace(&self, params: &WorkspaceParams) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO workspaces(wid, uid, domain, wtype, status, password)
             VALUES($1, $2, $3, $4, $5, $6)",
        )
        .bind(params.wid.to_string())
        .bind(uid_column(&params.uid))
        .bind(params.domain.as_str())
        .bind(params.wtype.as_str())
        .bind(params.status.as_str())
        .bind(&params.password_hash)
        .execute(&self.pool)
        .await
        .map_err(insert_err)?;
        Ok(())
    }

    async fn get_workspace(&self, wid: &Wid) -> Result<Workspace, StoreError> {
        let row = sqlx::query_as::<_, (String, String, String, String)>(
            "SELECT uid, domain, wtype, status FROM workspaces WHERE wid=$1",
        )
        .bind(wid.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(backend_err)?;

        match row {
            None => Err(StoreError::NotFound),
            Some((uid, domain, wtype, status)) => Ok(Workspace {
                wid: wid.clone(),
                uid: if uid.is_empty() {
                    None
                } else {
                    Some(uid.parse().map_err(|_| backend_err("corrupt uid"))?)
                },
                domain: domain
                    .parse::<Domain>()
                    .map_err(|_| backend_err("corrupt domain"))?,
                wtype: wtype.parse().map_err(|_| backend_err("corrupt wtype"))?,
                status: status.parse().map_err(|_| backend_err("corrupt status"))?,
            }),
        }
    }

    async fn remove_workspace(&self, wid: &Wid) -> Result<(), StoreError> {
        let result =
            sqlx::query("UPDATE workspaces SET password='-', status='deleted' WHERE wid=$1")
                .bind(wid.to_string())
                .execute(&self.pool)
                .await
                .map_err(backend_err)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }

        sqlx::query("DELETE FROM iwkspc_devices WHERE wid=$1")
            .bind(wid.to_string())
            .execute(&self.pool)
            .await
            .map_err(backend_err)?;
        Ok(())
    }

    async fn set_workspace_status(
        &self,
        wid: &Wid,
        status: WorkspaceStatus,
    ) -> Result<(), StoreError> {
        // Awaiting is produced only by moderated registration, deleted only
        // by removal.
        if matches!(status, WorkspaceStatus::Awaiting | WorkspaceStatus::Deleted) {
            return Err(StoreError::Conflict);
        }

        let result = sqlx::query("UPDATE workspaces SET status=$1 WHERE wid=$2")
            .bind(status.as_str())
            .bind(wid.to_string())
            .execute(&self.pool)
            .await
            .map_err(backend_err)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn set_password(&self, wid: &Wid, password_hash: &str) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE workspaces SET password=$1 WHERE wid=$2")
            .bind(password_hash)
            .bind(wid.to_string())
            .execute(&self.pool)
            .await
            .map_err(backend_err)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn get_password_hash(&self, wid: &Wid) -> Result<String, StoreError> {
        let row = sqlx::query_as::<_, (String,)>("SELECT password FROM workspaces WHERE wid=$1")
            .bind(wid.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(backend_err)?;
        row.map(|(hash,)| hash).ok_or(StoreError::NotFound)
    }

    async fn check_workspace(&self, wid: &Wid) -> Result<Option<WorkspaceStatus>, StoreError> {
        let row = sqlx::query_as::<_, (String,)>("SELECT status FROM workspaces WHERE wid=$1")
            .bind(wid.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(backend_err)?;
        if let Some((status,)) = row {
            return Ok(Some(
                status.parse().map_err(|_| backend_err("corrupt status"))?,
            ));
        }

        let prereg = sqlx::query_as::<_, (String,)>("SELECT wid FROM prereg WHERE wid=$1")
            .bind(wid.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(backend_err)?;
        Ok(prereg.map(|_| WorkspaceStatus::Approved))
    }

    async fn check_user_id(
        &self,
        uid: &Uid,
        domain: &Domain,
    ) -> Result<Option<WorkspaceStatus>, StoreError> {
        let row = sqlx::query_as::<_, (String,)>(
            "SELECT status FROM workspaces WHERE uid=$1 AND domain=$2",
        )
        .bind(uid.as_str())
        .bind(domain.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(backend_err)?;
        if let Some((status,)) = row {
            return Ok(Some(
                status.parse().map_err(|_| backend_err("corrupt status"))?,
            ));
        }

        let prereg = sqlx::query_as::<_, (String,)>(
            "SELECT uid FROM prereg WHERE uid=$1 AND domain=$2",
        )
        .bind(uid.as_str())
        .bind(domain.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(backend_err)?;
        Ok(prereg.map(|_| WorkspaceStatus::Approved))
    }

    async fn lookup_uid(&self, uid: &Uid, domain: &Domain) -> Result<Wid, StoreError> {
        let row = sqlx::query_as::<_, (String,)>(
            "SELECT wid FROM workspaces WHERE uid=$1 AND domain=$2",
        )
        .bind(uid.as_str())
        .bind(domain.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(backend_err)?;
        match row {
            Some((wid,)) => parse_wid(&wid),
            None => Err(StoreError::NotFound),
        }
    }

    // ───────────────────────────────── Aliases ──────────────────────────────────

    async fn add_alias(&self, alias: &Wid, target: &Wid) -> Result<(), StoreError> {
        let row = sqlx::query_as::<_, (String,)>("SELECT wtype FROM workspaces WHERE wid=$1")
            .bind(target.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(backend_err)?;
        match row {
            None => return Err(StoreError::NotFound),
            // One hop only: an alias may not point at another alias.
            Some((wtype,)) if wtype == "alias" => return Err(StoreError::Conflict),
            Some(_) => {}
        }

        sqlx::query("INSERT INTO aliases(wid, target) VALUES($1, $2)")
            .bind(alias.to_string())
            .bind(target.to_string())
            .execute(&self.pool)
            .await
            .map_err(insert_err)?;
        Ok(())
    }

    async fn get_alias_target(&self, alias: &Wid) -> Result<Wid, StoreError> {
        let row = sqlx::query_as::<_, (String,)>("SELECT target FROM aliases WHERE wid=$1")
            .bind(alias.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(backend_err)?;
        match row {
            Some((target,)) => parse_wid(&target),
            None => Err(StoreError::NotFound),
        }
    }

    // ───────────────────────────────── Devices ──────────────────────────────────

    async fn add_device(
        &self,
        wid: &Wid,
        device_id: &DeviceId,
        device_key: &CryptoString,
        status: DeviceStatus,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO iwkspc_devices(wid, devid, devkey, status) VALUES($1, $2, $3, $4)",
        )
        .bind(wid.to_string())
        .bind(device_id.as_str())
        .bind(device_key.to_string())
        .bind(status.as_str())
        .execute(&self.pool)
        .await
        .map_err(insert_err)?;
        Ok(())
    }

    async fn remove_device(&self, wid: &Wid, device_id: &DeviceId) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM iwkspc_devices WHERE wid=$1 AND devid=$2")
            .bind(wid.to_string())
            .bind(device_id.as_str())
            .execute(&self.pool)
            .await
            .map_err(backend_err)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn get_device(
        &self,
        wid: &Wid,
        device_id: &DeviceId,
    ) -> Result<Option<Device>, StoreError> {
        let row = sqlx::query_as::<_, (String, String)>(
            "SELECT devkey, status FROM iwkspc_devices WHERE wid=$1 AND devid=$2",
        )
        .bind(wid.to_string())
        .bind(device_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(backend_err)?;

        match row {
            None => Ok(None),
            Some((devkey, status)) => Ok(Some(Device {
                wid: wid.clone(),
                device_id: device_id.clone(),
                device_key: parse_cstring(&devkey)?,
                status: status.parse().map_err(|_| backend_err("corrupt status"))?,
            })),
        }
    }

    async fn check_device(
        &self,
        wid: &Wid,
        device_id: &DeviceId,
        device_key: &CryptoString,
    ) -> Result<bool, StoreError> {
        let row = sqlx::query_as::<_, (String,)>(
            "SELECT status FROM iwkspc_devices WHERE wid=$1 AND devid=$2 AND devkey=$3",
        )
        .bind(wid.to_string())
        .bind(device_id.as_str())
        .bind(device_key.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(backend_err)?;
        Ok(row.is_some())
    }

    async fn update_device(
        &self,
        wid: &Wid,
        device_id: &DeviceId,
        old_key: &CryptoString,
        new_key: &CryptoString,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE iwkspc_devices SET devkey=$1 WHERE wid=$2 AND devid=$3 AND devkey=$4",
        )
        .bind(new_key.to_string())
        .bind(wid.to_string())
        .bind(device_id.as_str())
        .bind(old_key.to_string())
        .execute(&self.pool)
        .await
        .map_err(backend_err)?;
        Ok(result.rows_affected() > 0)
    }

    // ────────────────────────────── Pre-registration ────────────────────────────

    async fn add_prereg(&self, prereg: &Prereg) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO prereg(wid, uid, domain, regcode) VALUES($1, $2, $3, $4)")
            .bind(prereg.wid.to_string())
            .bind(uid_column(&prereg.uid))
            .bind(prereg.domain.as_str())
            .bind(&prereg.regcode)
            .execute(&self.pool)
            .await
            .map_err(insert_err)?;
        Ok(())
    }

    async fn check_regcode(
        &self,
        id: &RegId,
        domain: &Domain,
        regcode: &str,
    ) -> Result<(Wid, Option<Uid>), StoreError> {
        let row = match id {
            RegId::Wid(_) => sqlx::query_as::<_, (String, String)>(
                "SELECT wid, uid FROM prereg WHERE regcode=$1 AND domain=$2",
            )
            .bind(regcode)
            .bind(domain.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(backend_err)?,
            RegId::Uid(uid) => sqlx::query_as::<_, (String, String)>(
                "SELECT wid, uid FROM prereg WHERE regcode=$1 AND uid=$2 AND domain=$3",
            )
            .bind(regcode)
            .bind(uid.as_str())
            .bind(domain.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(backend_err)?,
        };

        let (wid, uid) = row.ok_or(StoreError::NotFound)?;
        let wid = parse_wid(&wid)?;

        if let RegId::Wid(expected) = id {
            if wid != *expected {
                return Err(StoreError::NotFound);
            }
        }

        let uid = if uid.is_empty() {
            None
        } else {
            Some(uid.parse().map_err(|_| backend_err("corrupt uid"))?)
        };
        Ok((wid, uid))
    }

    async fn delete_prereg(&self, wid: &Wid) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM prereg WHERE wid=$1")
            .bind(wid.to_string())
            .execute(&self.pool)
            .await
            .map_err(backend_err)?;
        Ok(())
    }

    // ─────────────────────────────── Failure log ────────────────────────────────

    async fn log_failure(
        &self,
        kind: FailureKind,
        id: &str,
        source: &str,
        max_failures: u32,
        lockout: Duration,
    ) -> Result<(), StoreError> {
        let now = Utc::now();

        let row = sqlx::query_as::<_, (i32,)>(
            "SELECT count FROM failure_log WHERE type=$1 AND id=$2 AND source=$3",
        )
        .bind(kind.as_str())
        .bind(id)
        .bind(source)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend_err)?;

        let new_count = row.as_ref().map(|r| r.0 + 1).unwrap_or(1);
        let lockout_until = if new_count >= max_failures as i32 {
            Some(now + lockout)
        } else {
            None
        };

        if row.is_some() {
            sqlx::query(
                "UPDATE failure_log SET count=$1, last_failure=$2, lockout_until=$3
                 WHERE type=$4 AND id=$5 AND source=$6",
            )
            .bind(new_count)
            .bind(now)
            .bind(lockout_until)
            .bind(kind.as_str())
            .bind(id)
            .bind(source)
            .execute(&self.pool)
            .await
            .map_err(backend_err)?;
        } else {
            sqlx::query(
                "INSERT INTO failure_log(type, id, source, count, last_failure, lockout_until)
                 VALUES($1, $2, $3, $4, $5, $6)",
            )
            .bind(kind.as_str())
            .bind(id)
            .bind(source)
            .bind(new_count)
            .bind(now)
            .bind(lockout_until)
            .execute(&self.pool)
            .await
            .map_err(backend_err)?;
        }
        Ok(())
    }

    async fn check_lockout(
        &self,
        kind: FailureKind,
        id: &str,
        source: &str,
    ) -> Result<Option<DateTime<Utc>>, StoreError> {
        let row = sqlx::query_as::<_, (Option<DateTime<Utc>>,)>(
            "SELECT lockout_until FROM failure_log WHERE type=$1 AND id=$2 AND source=$3",
        )
        .bind(kind.as_str())
        .bind(id)
        .bind(source)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend_err)?;

        let locktime = match row {
            None | Some((None,)) => return Ok(None),
            Some((Some(locktime),)) => locktime,
        };

        // Self-healing expiry: a stale lockout resets the record.
        if locktime < Utc::now() {
            sqlx::query("DELETE FROM failure_log WHERE type=$1 AND id=$2 AND source=$3")
                .bind(kind.as_str())
                .bind(id)
                .bind(source)
                .execute(&self.pool)
                .await
                .map_err(backend_err)?;
            return Ok(None);
        }

        Ok(Some(locktime))
    }

    // ──────────────────────────────── Keycards ──────────────────────────────────

    async fn add_entry(&self, entry: &KeycardEntry) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO keycards(owner, idx, creationtime, entry, fingerprint)
             VALUES($1, $2, $3, $4, $5)",
        )
        .bind(&entry.owner)
        .bind(entry.index as i32)
        .bind(&entry.creation_time)
        .bind(&entry.entry)
        .bind(entry.fingerprint.to_string())
        .execute(&self.pool)
        .await
        .map_err(insert_err)?;
        Ok(())
    }

    async fn get_last_entry(&self, owner: &str) -> Result<Option<KeycardEntry>, StoreError> {
        let row = sqlx::query_as::<_, (i32, String, String, String)>(
            "SELECT idx, creationtime, entry, fingerprint FROM keycards
             WHERE owner=$1 ORDER BY idx DESC LIMIT 1",
        )
        .bind(owner)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend_err)?;

        match row {
            None => Ok(None),
            Some((idx, creationtime, entry, fingerprint)) => Ok(Some(KeycardEntry {
                owner: owner.to_string(),
                index: idx as u32,
                creation_time: creationtime,
                entry,
                fingerprint: parse_cstring(&fingerprint)?,
            })),
        }
    }

    async fn get_org_entries(
        &self,
        start: u32,
        end: u32,
    ) -> Result<Vec<KeycardEntry>, StoreError> {
        self.entries_for(ansel_storage::ORG_OWNER, start, end).await
    }

    async fn get_user_entries(
        &self,
        wid: &Wid,
        start: u32,
        end: u32,
    ) -> Result<Vec<KeycardEntry>, StoreError> {
        self.entries_for(&wid.to_string(), start, end).await
    }

    // ─────────────────────────────── Org key history ────────────────────────────

    async fn add_org_key(
        &self,
        purpose: OrgKeyPurpose,
        public_key: &CryptoString,
        private_key: &CryptoString,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO orgkeys(purpose, pubkey, privkey, creationtime) VALUES($1, $2, $3, $4)",
        )
        .bind(purpose.as_str())
        .bind(public_key.to_string())
        .bind(private_key.to_string())
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(backend_err)?;
        Ok(())
    }

    async fn get_primary_signing_key(&self) -> Result<CryptoString, StoreError> {
        let row = sqlx::query_as::<_, (String,)>(
            "SELECT privkey FROM orgkeys WHERE purpose='sign' ORDER BY id DESC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(backend_err)?;
        match row {
            Some((privkey,)) => parse_cstring(&privkey),
            None => Err(StoreError::NotFound),
        }
    }

    async fn get_org_verifying_key(&self) -> Result<CryptoString, StoreError> {
        let row = sqlx::query_as::<_, (String,)>(
            "SELECT pubkey FROM orgkeys WHERE purpose='sign' ORDER BY id DESC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(backend_err)?;
        match row {
            Some((pubkey,)) => parse_cstring(&pubkey),
            None => Err(StoreError::NotFound),
        }
    }

    async fn get_encryption_pair(&self) -> Result<OrgKeyPair, StoreError> {
        let row = sqlx::query_as::<_, (String, String, DateTime<Utc>)>(
            "SELECT pubkey, privkey, creationtime FROM orgkeys
             WHERE purpose='encrypt' ORDER BY id DESC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(backend_err)?;

        match row {
            None => Err(StoreError::NotFound),
            Some((pubkey, privkey, creationtime)) => Ok(OrgKeyPair {
                purpose: OrgKeyPurpose::Encrypt,
                public_key: parse_cstring(&pubkey)?,
                private_key: parse_cstring(&privkey)?,
                created_at: creationtime,
            }),
        }
    }
}

impl PostgresStore {
    async fn entries_for(
        &self,
        owner: &str,
        start: u32,
        end: u32,
    ) -> Result<Vec<KeycardEntry>, StoreError> {
        // start == 0 means "just the current entry".
        if start < 1 {
            return Ok(self.get_last_entry(owner).await?.into_iter().collect());
        }
        if end >= 1 && end < start {
            return Ok(Vec::new());
        }

        let query = if end >= 1 {
            sqlx::query_as::<_, (i32, String, String, String)>(
                "SELECT idx, creationtime, entry, fingerprint FROM keycards
                 WHERE owner=$1 AND idx >= $2 AND idx <= $3 ORDER BY idx",
            )
            .bind(owner)
            .bind(start as i32)
            .bind(end as i32)
        } else {
            sqlx::query_as::<_, (i32, String, String, String)>(
                "SELECT idx, creationtime, entry, fingerprint FROM keycards
                 WHERE owner=$1 AND idx >= $2 ORDER BY idx",
            )
            .bind(owner)
            .bind(start as i32)
        };

        let rows = query.fetch_all(&self.pool).await.map_err(backend_err)?;
        rows.into_iter()
            .map(|(idx, creationtime, entry, fingerprint)| {
                Ok(KeycardEntry {
                    owner: owner.to_string(),
                    index: idx as u32,
                    creation_time: creationtime,
                    entry,
                    fingerprint: parse_cstring(&fingerprint)?,
                })
            })
            .collect()
    }
}
