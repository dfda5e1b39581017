//! Shared test plumbing: an in-memory server, seeded organization keys, and
//! a client that speaks the wire protocol over a duplex pipe.

use std::net::IpAddr;
use std::sync::Arc;

use ansel_config::ServerConfig;
use ansel_crypto::{generate_signing_pair, CryptoString};
use ansel_keycard::{Entry, EntryType, SignatureSlot};
use ansel_storage::{
    DeviceStatus, KeycardEntry, OrgKeyPurpose, Store, WorkspaceParams, WorkspaceStatus,
    WorkspaceType, Wid, ORG_OWNER,
};
use ansel_store_sqlite::SqliteStore;
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};
use tokio::task::JoinHandle;

use crate::backend::StoreBackend;
use crate::protocol::Response;
use crate::server::AnselServer;
use crate::session::Session;

/// A server over in-memory SQLite plus the organization's current keys.
pub struct TestHarness {
    pub server: Arc<AnselServer>,
    pub org_vkey: CryptoString,
    pub org_skey: CryptoString,
}

/// Security settings all tests want: no login delay, no registration
/// throttle unless a test opts in.
pub const DEFAULT_SECURITY: &str = "failure_delay_sec = 0\nregistration_delay_min = 0";

pub fn test_config(registration: &str, security: &str) -> Arc<ServerConfig> {
    let toml = format!(
        r#"
        [database]
        engine = "sqlite"
        name = ":memory:"

        [global]
        domain = "example.com"
        registration = "{registration}"

        [security]
        {security}
        "#
    );
    Arc::new(ServerConfig::from_toml(&toml).unwrap())
}

impl TestHarness {
    pub async fn new(registration: &str) -> Self {
        Self::with_security(registration, DEFAULT_SECURITY).await
    }

    pub async fn with_security(registration: &str, security: &str) -> Self {
        let store = Arc::new(SqliteStore::open_in_memory().await.unwrap());
        let config = test_config(registration, security);

        let (org_vkey, org_skey) = generate_signing_pair().unwrap();
        store
            .add_org_key(OrgKeyPurpose::Sign, &org_vkey, &org_skey)
            .await
            .unwrap();
        let (enc_pub, enc_priv) = generate_signing_pair().unwrap();
        let enc_pub = CryptoString::new("CURVE25519", &enc_pub.raw_data().unwrap()).unwrap();
        let enc_priv = CryptoString::new("CURVE25519", &enc_priv.raw_data().unwrap()).unwrap();
        store
            .add_org_key(OrgKeyPurpose::Encrypt, &enc_pub, &enc_priv)
            .await
            .unwrap();

        Self {
            server: Arc::new(AnselServer::new(StoreBackend::Sqlite(store), config)),
            org_vkey,
            org_skey,
        }
    }

    /// Store the organization's root keycard entry.
    pub async fn seed_org_card(&self) {
        let mut entry = Entry::new(EntryType::Organization);
        entry
            .set_fields(&[
                ("Name", "Example, Inc."),
                ("Contact-Admin", "admin/example.com"),
            ])
            .unwrap();
        entry
            .set_field("Primary-Signing-Key", &self.org_vkey.to_string())
            .unwrap();
        entry
            .set_field("Encryption-Key", &self.org_vkey.to_string())
            .unwrap();
        entry
            .sign_entry(&self.org_skey, SignatureSlot::Organization)
            .unwrap();
        entry.generate_hash("BLAKE3-256").unwrap();

        self.server
            .store
            .add_entry(&KeycardEntry {
                owner: ORG_OWNER.to_string(),
                index: 1,
                creation_time: entry.field("Timestamp").unwrap().to_string(),
                entry: entry.to_text(),
                fingerprint: entry.hash().cloned().unwrap(),
            })
            .await
            .unwrap();
    }

    /// Create an active workspace directly in the store. Returns the
    /// password string the client would present at login.
    pub async fn seed_workspace(&self, wid: &Wid, uid: Option<&str>) -> String {
        let client_hash = "$argon2id$v=19$m=65536,t=2,p=1$testsalt$testtagvalue".to_string();
        let stored = ansel_crypto::hash_password(
            &client_hash,
            self.server.config.security.password_security,
        )
        .unwrap();

        self.server
            .store
            .add_workspace(&WorkspaceParams {
                wid: wid.clone(),
                uid: uid.map(|u| u.parse().unwrap()),
                domain: "example.com".parse().unwrap(),
                password_hash: stored,
                status: WorkspaceStatus::Active,
                wtype: WorkspaceType::Individual,
            })
            .await
            .unwrap();
        client_hash
    }

    /// Enroll a device for a workspace directly in the store.
    pub async fn seed_device(&self, wid: &Wid, device_id: &str, key: &CryptoString) {
        self.server
            .store
            .add_device(
                wid,
                &device_id.parse().unwrap(),
                key,
                DeviceStatus::Active,
            )
            .await
            .unwrap();
    }
}

/// A protocol client talking to an in-process session task.
pub struct TestClient {
    stream: DuplexStream,
    pub task: JoinHandle<()>,
}

impl TestClient {
    /// Connect from 127.0.0.1 and consume the greeting.
    pub async fn connect(harness: &TestHarness) -> Self {
        Self::connect_from(harness, "127.0.0.1".parse().unwrap()).await
    }

    /// Connect from a specific source address and consume the greeting.
    pub async fn connect_from(harness: &TestHarness, peer: IpAddr) -> Self {
        let (client_end, server_end) = tokio::io::duplex(64 * 1024);
        let server = harness.server.clone();
        let task = tokio::spawn(Session::new(server_end, peer).run(server));

        let mut client = Self {
            stream: client_end,
            task,
        };
        let greeting = client.recv().await;
        assert_eq!(greeting.code, 200);
        assert_eq!(greeting.data.get("Name").map(String::as_str), Some("Ansel"));
        client
    }

    pub async fn send(&mut self, action: &str, data: &[(&str, &str)]) {
        let data: std::collections::HashMap<&str, &str> = data.iter().copied().collect();
        let frame = serde_json::json!({ "Action": action, "Data": data });
        self.stream
            .write_all(frame.to_string().as_bytes())
            .await
            .unwrap();
    }

    pub async fn send_raw(&mut self, bytes: &[u8]) {
        self.stream.write_all(bytes).await.unwrap();
    }

    pub async fn recv(&mut self) -> Response {
        let mut buffer = vec![0u8; 64 * 1024];
        let read = self.stream.read(&mut buffer).await.unwrap();
        assert!(read > 0, "connection closed while awaiting a response");
        serde_json::from_slice(&buffer[..read]).unwrap()
    }

    /// Send one command and read its response.
    pub async fn request(&mut self, action: &str, data: &[(&str, &str)]) -> Response {
        self.send(action, data).await;
        self.recv().await
    }

    /// True once the server side has hung up.
    pub async fn closed(&mut self) -> bool {
        let mut buffer = [0u8; 16];
        matches!(self.stream.read(&mut buffer).await, Ok(0))
    }

    /// Run the LOGIN → PASSWORD → DEVICE sequence to an authenticated
    /// session.
    pub async fn authenticate(
        &mut self,
        wid: &Wid,
        password: &str,
        device_id: &str,
        device_key: &CryptoString,
    ) {
        let resp = self
            .request("LOGIN", &[("Workspace-ID", &wid.to_string())])
            .await;
        assert_eq!(resp.code, 100, "LOGIN: {:?}", resp);
        let resp = self.request("PASSWORD", &[("Password-Hash", password)]).await;
        assert_eq!(resp.code, 100, "PASSWORD: {:?}", resp);
        let resp = self
            .request(
                "DEVICE",
                &[
                    ("Device-ID", device_id),
                    ("Device-Key", &device_key.to_string()),
                ],
            )
            .await;
        assert_eq!(resp.code, 200, "DEVICE: {:?}", resp);
    }
}

/// A 40-character device token.
pub fn devid(seed: char) -> String {
    std::iter::repeat(seed).take(40).collect()
}

pub fn device_key() -> CryptoString {
    let (vkey, _) = generate_signing_pair().unwrap();
    CryptoString::new("CURVE25519", &vkey.raw_data().unwrap()).unwrap()
}
