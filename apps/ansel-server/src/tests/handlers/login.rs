//! LOGIN / PASSWORD / DEVICE / DEVKEY behavior.

use chrono::{DateTime, Utc};

use ansel_storage::{Store, Wid, WorkspaceStatus};

use crate::tests::common::{devid, device_key, TestClient, TestHarness};

fn wid() -> Wid {
    "11111111-1111-1111-1111-111111111111".parse().unwrap()
}

#[tokio::test]
async fn full_authentication_flow() {
    let harness = TestHarness::new("private").await;
    let password = harness.seed_workspace(&wid(), Some("csimons")).await;

    let mut client = TestClient::connect(&harness).await;
    client
        .authenticate(&wid(), &password, &devid('a'), &device_key())
        .await;

    // Authenticated commands now pass the state gate.
    let resp = client.request("ISCURRENT", &[("Index", "1")]).await;
    assert_ne!(resp.code, 401);
}

#[tokio::test]
async fn login_by_user_address() {
    let harness = TestHarness::new("private").await;
    harness.seed_workspace(&wid(), Some("csimons")).await;

    let mut client = TestClient::connect(&harness).await;
    let resp = client
        .request("LOGIN", &[("Address", "csimons/example.com")])
        .await;
    assert_eq!(resp.code, 100);
}

#[tokio::test]
async fn login_unknown_workspace_is_404() {
    let harness = TestHarness::new("private").await;
    let mut client = TestClient::connect(&harness).await;

    let resp = client
        .request(
            "LOGIN",
            &[("Workspace-ID", "99999999-9999-9999-9999-999999999999")],
        )
        .await;
    assert_eq!(resp.code, 404);
}

#[tokio::test]
async fn disabled_workspace_is_refused_and_closed() {
    let harness = TestHarness::new("private").await;
    harness.seed_workspace(&wid(), None).await;
    harness
        .server
        .store
        .set_workspace_status(&wid(), WorkspaceStatus::Disabled)
        .await
        .unwrap();

    let mut client = TestClient::connect(&harness).await;
    let resp = client
        .request("LOGIN", &[("Workspace-ID", &wid().to_string())])
        .await;
    assert_eq!(resp.code, 407);
    assert!(client.closed().await);
}

#[tokio::test]
async fn wrong_password_is_402_and_counted() {
    let harness = TestHarness::new("private").await;
    let password = harness.seed_workspace(&wid(), None).await;

    let mut client = TestClient::connect(&harness).await;
    let resp = client
        .request("LOGIN", &[("Workspace-ID", &wid().to_string())])
        .await;
    assert_eq!(resp.code, 100);

    let resp = client
        .request("PASSWORD", &[("Password-Hash", "wrong-guess")])
        .await;
    assert_eq!(resp.code, 402);

    // The right password still works on the same connection.
    let resp = client
        .request("PASSWORD", &[("Password-Hash", &password)])
        .await;
    assert_eq!(resp.code, 100);
}

#[tokio::test]
async fn lockout_after_max_failures() {
    let harness = TestHarness::with_security(
        "private",
        "failure_delay_sec = 0\nregistration_delay_min = 0\nmax_failures = 3\nlockout_delay_min = 15",
    )
    .await;
    harness.seed_workspace(&wid(), None).await;

    let mut client = TestClient::connect(&harness).await;
    let resp = client
        .request("LOGIN", &[("Workspace-ID", &wid().to_string())])
        .await;
    assert_eq!(resp.code, 100);

    // Three wrong passwords: 402 each, and the third closes the connection.
    for _ in 0..3 {
        let resp = client
            .request("PASSWORD", &[("Password-Hash", "wrong-guess")])
            .await;
        assert_eq!(resp.code, 402);
    }
    assert!(client.closed().await);

    // A fresh connection is now locked out at LOGIN with the expiry time.
    let mut client = TestClient::connect(&harness).await;
    let resp = client
        .request("LOGIN", &[("Workspace-ID", &wid().to_string())])
        .await;
    assert_eq!(resp.code, 407);

    let until: DateTime<Utc> = resp.data["Lockout-Until"].parse().unwrap();
    let expected = Utc::now() + chrono::Duration::minutes(15);
    assert!((until - expected).num_seconds().abs() <= 5);
}

#[tokio::test]
async fn device_mismatch_is_402() {
    let harness = TestHarness::new("private").await;
    let password = harness.seed_workspace(&wid(), None).await;
    let enrolled = device_key();
    harness.seed_device(&wid(), &devid('a'), &enrolled).await;

    let mut client = TestClient::connect(&harness).await;
    let resp = client
        .request("LOGIN", &[("Workspace-ID", &wid().to_string())])
        .await;
    assert_eq!(resp.code, 100);
    let resp = client
        .request("PASSWORD", &[("Password-Hash", &password)])
        .await;
    assert_eq!(resp.code, 100);

    let resp = client
        .request(
            "DEVICE",
            &[
                ("Device-ID", &devid('a')),
                ("Device-Key", &device_key().to_string()),
            ],
        )
        .await;
    assert_eq!(resp.code, 402);
}

#[tokio::test]
async fn devkey_rotation_is_compare_and_swap() {
    let harness = TestHarness::new("private").await;
    let password = harness.seed_workspace(&wid(), None).await;
    let k1 = device_key();
    let k2 = device_key();

    let mut client = TestClient::connect(&harness).await;
    client.authenticate(&wid(), &password, &devid('a'), &k1).await;

    let resp = client
        .request(
            "DEVKEY",
            &[
                ("Device-ID", &devid('a')),
                ("Old-Key", &k1.to_string()),
                ("New-Key", &k2.to_string()),
            ],
        )
        .await;
    assert_eq!(resp.code, 200);

    // Replaying the rotation sees the new key and misses.
    let resp = client
        .request(
            "DEVKEY",
            &[
                ("Device-ID", &devid('a')),
                ("Old-Key", &k1.to_string()),
                ("New-Key", &k2.to_string()),
            ],
        )
        .await;
    assert_eq!(resp.code, 404);
}

#[tokio::test]
async fn alias_address_resolves_to_target_login() {
    let harness = TestHarness::new("private").await;
    let target: Wid = "bbbbbbbb-bbbb-bbbb-bbbb-bbbbbbbbbbbb".parse().unwrap();
    let alias: Wid = "aaaaaaaa-aaaa-aaaa-aaaa-aaaaaaaaaaaa".parse().unwrap();
    let password = harness.seed_workspace(&target, None).await;

    // An alias workspace row pointing at the target.
    let stored = ansel_crypto::hash_password("unused", Default::default()).unwrap();
    harness
        .server
        .store
        .add_workspace(&ansel_storage::WorkspaceParams {
            wid: alias.clone(),
            uid: None,
            domain: "example.com".parse().unwrap(),
            password_hash: stored,
            status: WorkspaceStatus::Active,
            wtype: ansel_storage::WorkspaceType::Alias,
        })
        .await
        .unwrap();
    harness.server.store.add_alias(&alias, &target).await.unwrap();

    // Logging in with the alias address reaches the target workspace: its
    // password is the one that verifies.
    let mut client = TestClient::connect(&harness).await;
    let resp = client
        .request(
            "LOGIN",
            &[("Address", &format!("{}/example.com", alias))],
        )
        .await;
    assert_eq!(resp.code, 100);
    let resp = client
        .request("PASSWORD", &[("Password-Hash", &password)])
        .await;
    assert_eq!(resp.code, 100);
}
