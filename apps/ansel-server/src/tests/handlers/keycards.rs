//! ORGCARD / USERCARD / ISCURRENT / ADDENTRY behavior.

use ansel_crypto::{generate_signing_pair, sign, CryptoString};
use ansel_keycard::{verify_full, Entry, EntryType};
use ansel_storage::{Store, Wid};

use crate::protocol::Response;
use crate::tests::common::{devid, device_key, TestClient, TestHarness};

fn wid() -> Wid {
    "11111111-1111-1111-1111-111111111111".parse().unwrap()
}

/// Keys a user keeps client-side for their keycard.
struct UserKeys {
    crv_public: CryptoString,
    crv_private: CryptoString,
}

fn user_keys() -> UserKeys {
    let (crv_public, crv_private) = generate_signing_pair().unwrap();
    UserKeys {
        crv_public,
        crv_private,
    }
}

/// The field-only text form of a user entry, as a client submits it.
fn base_entry_text(keys: &UserKeys, index: u32) -> String {
    let (cre, _) = generate_signing_pair().unwrap();
    let (pek, _) = generate_signing_pair().unwrap();

    let mut entry = Entry::new(EntryType::User);
    entry
        .set_fields(&[
            ("Workspace-ID", "11111111-1111-1111-1111-111111111111"),
            ("User-ID", "csimons"),
            ("Domain", "example.com"),
        ])
        .unwrap();
    entry.set_field("Index", &index.to_string()).unwrap();
    entry
        .set_field("Contact-Request-Verification-Key", &keys.crv_public.to_string())
        .unwrap();
    entry
        .set_field("Contact-Request-Encryption-Key", &cre.to_string())
        .unwrap();
    entry
        .set_field("Public-Encryption-Key", &pek.to_string())
        .unwrap();
    entry.to_text()
}

/// Drive the two-frame ADDENTRY dialogue the way a client does: submit the
/// base text, fold the server's additions into the canonical form, sign it,
/// and return the final response.
async fn submit_entry(
    client: &mut TestClient,
    base_text: &str,
    signing_key: &CryptoString,
) -> Response {
    client.send("ADDENTRY", &[("Base-Entry", base_text)]).await;
    let interim = client.recv().await;
    if interim.code != 100 {
        return interim;
    }

    let mut full_text = base_text.to_string();
    full_text.push_str(&format!(
        "\r\nOrganization-Signature:{}",
        interim.data["Organization-Signature"]
    ));
    if let Some(prev_hash) = interim.data.get("Previous-Hash") {
        full_text.push_str(&format!("\r\nPrevious-Hash:{}", prev_hash));
    }
    full_text.push_str(&format!("\r\nHash:{}", interim.data["Hash"]));

    let signature = sign(signing_key, full_text.as_bytes()).unwrap();
    client
        .request("ADDENTRY", &[("User-Signature", &signature.to_string())])
        .await
}

/// A custody-signed base for a successor entry, built from the current one.
fn rotation_base_text(current_full: &str, keys: &UserKeys) -> String {
    let mut next = Entry::from_bytes(EntryType::User, current_full.as_bytes()).unwrap();
    next.bump_index().unwrap();
    next.sign_entry(&keys.crv_private, ansel_keycard::SignatureSlot::Custody)
        .unwrap();
    next.to_text()
}

async fn authed_client(harness: &TestHarness) -> TestClient {
    let password = harness.seed_workspace(&wid(), Some("csimons")).await;
    let mut client = TestClient::connect(harness).await;
    client
        .authenticate(&wid(), &password, &devid('a'), &device_key())
        .await;
    client
}

#[tokio::test]
async fn orgcard_serves_the_chain() {
    let harness = TestHarness::new("private").await;
    harness.seed_org_card().await;
    let mut client = authed_client(&harness).await;

    let resp = client.request("ORGCARD", &[]).await;
    assert_eq!(resp.code, 200);
    assert_eq!(resp.data.get("Item-Count").map(String::as_str), Some("1"));
    assert!(resp.data["Entries"].contains("Type:Organization"));

    let resp = client.request("ORGCARD", &[("Start-Index", "1")]).await;
    assert_eq!(resp.code, 200);

    let resp = client.request("ORGCARD", &[("Start-Index", "7")]).await;
    assert_eq!(resp.code, 404);
}

#[tokio::test]
async fn iscurrent_reports_the_tip() {
    let harness = TestHarness::new("private").await;
    harness.seed_org_card().await;
    let mut client = authed_client(&harness).await;

    let resp = client.request("ISCURRENT", &[("Index", "1")]).await;
    assert_eq!(resp.code, 200);
    assert_eq!(resp.data.get("Is-Current").map(String::as_str), Some("YES"));

    let resp = client.request("ISCURRENT", &[("Index", "2")]).await;
    assert_eq!(resp.data.get("Is-Current").map(String::as_str), Some("NO"));
}

#[tokio::test]
async fn addentry_builds_a_verifiable_chain() {
    let harness = TestHarness::new("private").await;
    harness.seed_org_card().await;
    let keys = user_keys();
    let mut client = authed_client(&harness).await;

    // Root entry.
    let base = base_entry_text(&keys, 1);
    let resp = submit_entry(&mut client, &base, &keys.crv_private).await;
    assert_eq!(resp.code, 200, "{:?}", resp);

    let stored = harness
        .server
        .store
        .get_user_entries(&wid(), 0, 0)
        .await
        .unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].index, 1);

    // The stored bytes verify as a complete entry under the org key.
    let parsed = Entry::from_bytes(EntryType::User, stored[0].entry.as_bytes()).unwrap();
    verify_full(&parsed, Some(&harness.org_vkey)).unwrap();
    assert_eq!(parsed.hash(), Some(&stored[0].fingerprint));

    // Rotation: custody-signed successor linked by the server.
    let rotation = rotation_base_text(&stored[0].entry, &keys);
    let resp = submit_entry(&mut client, &rotation, &keys.crv_private).await;
    assert_eq!(resp.code, 200, "{:?}", resp);

    let chain = harness
        .server
        .store
        .get_user_entries(&wid(), 1, 0)
        .await
        .unwrap();
    assert_eq!(chain.len(), 2);
    let second = Entry::from_bytes(EntryType::User, chain[1].entry.as_bytes()).unwrap();
    assert_eq!(second.prev_hash(), Some(&chain[0].fingerprint));
    ansel_keycard::verify_chain_link(
        &Entry::from_bytes(EntryType::User, chain[0].entry.as_bytes()).unwrap(),
        &second,
        Some(&harness.org_vkey),
    )
    .unwrap();

    // USERCARD serves both entries.
    let resp = client.request("USERCARD", &[("Start-Index", "1")]).await;
    assert_eq!(resp.code, 200);
    assert_eq!(resp.data.get("Item-Count").map(String::as_str), Some("2"));
}

#[tokio::test]
async fn addentry_rejects_an_index_gap() {
    let harness = TestHarness::new("private").await;
    harness.seed_org_card().await;
    let keys = user_keys();
    let mut client = authed_client(&harness).await;

    let base = base_entry_text(&keys, 3);
    let resp = submit_entry(&mut client, &base, &keys.crv_private).await;
    assert_eq!(resp.code, 400);
}

#[tokio::test]
async fn addentry_rejects_someone_elses_workspace() {
    let harness = TestHarness::new("private").await;
    harness.seed_org_card().await;
    let keys = user_keys();
    let mut client = authed_client(&harness).await;

    let base = base_entry_text(&keys, 1)
        .replace("11111111-1111-1111-1111-111111111111", "22222222-2222-2222-2222-222222222222");
    client.send("ADDENTRY", &[("Base-Entry", &base)]).await;
    let resp = client.recv().await;
    assert_eq!(resp.code, 401);
}

#[tokio::test]
async fn addentry_rejects_a_bad_owner_signature() {
    let harness = TestHarness::new("private").await;
    harness.seed_org_card().await;
    let keys = user_keys();
    let mut client = authed_client(&harness).await;

    // Sign the completed entry with a key other than the one the entry
    // itself names.
    let (_, rogue) = generate_signing_pair().unwrap();
    let base = base_entry_text(&keys, 1);
    let resp = submit_entry(&mut client, &base, &rogue).await;
    assert_eq!(resp.code, 400);

    // Nothing was committed.
    let stored = harness
        .server
        .store
        .get_user_entries(&wid(), 0, 0)
        .await
        .unwrap();
    assert!(stored.is_empty());
}
