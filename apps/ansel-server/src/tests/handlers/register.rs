//! REGISTER / PREREG / REGCODE / UNREGISTER behavior.

use ansel_storage::{Store, Wid};

use crate::tests::common::{devid, device_key, TestClient, TestHarness};

fn wid() -> Wid {
    "11111111-1111-1111-1111-111111111111".parse().unwrap()
}

fn registration_fields<'a>(
    wid_str: &'a str,
    devid: &'a str,
    devkey: &'a str,
) -> Vec<(&'a str, &'a str)> {
    vec![
        ("Workspace-ID", wid_str),
        ("Password-Hash", "$argon2id$v=19$m=65536,t=2,p=1$clientsalt$clienttag"),
        ("Device-ID", devid),
        ("Device-Key", devkey),
    ]
}

#[tokio::test]
async fn private_mode_refuses_register() {
    let harness = TestHarness::new("private").await;
    let mut client = TestClient::connect(&harness).await;

    let key = device_key().to_string();
    let id = devid('a');
    let resp = client
        .request("REGISTER", &registration_fields(&wid().to_string(), &id, &key))
        .await;
    assert_eq!(resp.code, 304);
    assert_eq!(resp.status, "REGISTRATION CLOSED");
}

#[tokio::test]
async fn public_mode_registers_and_can_log_in() {
    let harness = TestHarness::new("public").await;
    let mut client = TestClient::connect(&harness).await;

    let key = device_key();
    let key_str = key.to_string();
    let id = devid('a');
    let resp = client
        .request("REGISTER", &registration_fields(&wid().to_string(), &id, &key_str))
        .await;
    assert_eq!(resp.code, 201, "{:?}", resp);
    assert_eq!(
        resp.data.get("Workspace-ID").map(String::as_str),
        Some("11111111-1111-1111-1111-111111111111")
    );
    assert_eq!(resp.data.get("Domain").map(String::as_str), Some("example.com"));

    // Duplicate WID is refused.
    let resp = client
        .request("REGISTER", &registration_fields(&wid().to_string(), &id, &key_str))
        .await;
    assert_eq!(resp.code, 408);

    // The fresh account authenticates with the same credentials.
    let mut client = TestClient::connect(&harness).await;
    client
        .authenticate(
            &wid(),
            "$argon2id$v=19$m=65536,t=2,p=1$clientsalt$clienttag",
            &id,
            &key,
        )
        .await;
}

#[tokio::test]
async fn moderated_mode_parks_the_account() {
    let harness = TestHarness::new("moderated").await;
    let mut client = TestClient::connect(&harness).await;

    let key = device_key().to_string();
    let id = devid('a');
    let resp = client
        .request("REGISTER", &registration_fields(&wid().to_string(), &id, &key))
        .await;
    assert_eq!(resp.code, 101);
    assert_eq!(resp.status, "PENDING");

    // The account exists but cannot log in until approved.
    let mut client = TestClient::connect(&harness).await;
    let resp = client
        .request("LOGIN", &[("Workspace-ID", &wid().to_string())])
        .await;
    assert_eq!(resp.code, 407);
}

#[tokio::test]
async fn network_mode_checks_the_source_subnet() {
    let harness = TestHarness::new("network").await;
    let key = device_key().to_string();
    let id = devid('a');

    // 127.0.0.1 is outside the default private-network subnets.
    let mut outside = TestClient::connect(&harness).await;
    let resp = outside
        .request("REGISTER", &registration_fields(&wid().to_string(), &id, &key))
        .await;
    assert_eq!(resp.code, 304);

    let mut inside = TestClient::connect_from(&harness, "192.168.1.20".parse().unwrap()).await;
    let resp = inside
        .request("REGISTER", &registration_fields(&wid().to_string(), &id, &key))
        .await;
    assert_eq!(resp.code, 201, "{:?}", resp);
}

#[tokio::test]
async fn registration_is_throttled_per_source() {
    let harness = TestHarness::with_security(
        "public",
        "failure_delay_sec = 0\nregistration_delay_min = 15",
    )
    .await;
    let mut client = TestClient::connect(&harness).await;

    let key = device_key().to_string();
    let id = devid('a');
    let resp = client
        .request("REGISTER", &registration_fields(&wid().to_string(), &id, &key))
        .await;
    assert_eq!(resp.code, 201);

    let resp = client
        .request(
            "REGISTER",
            &registration_fields("22222222-2222-2222-2222-222222222222", &id, &key),
        )
        .await;
    assert_eq!(resp.code, 407);
    assert!(resp.data.contains_key("Lockout-Until"));
}

#[tokio::test]
async fn prereg_and_regcode_redemption() {
    let harness = TestHarness::new("private").await;

    // Provisioning from the host itself needs no session.
    let mut admin = TestClient::connect(&harness).await;
    let resp = admin
        .request(
            "PREREG",
            &[
                ("Workspace-ID", &wid().to_string()),
                ("User-ID", "bob"),
                ("Domain", "example.com"),
            ],
        )
        .await;
    assert_eq!(resp.code, 200, "{:?}", resp);
    let code = resp.data["Reg-Code"].clone();
    assert_eq!(code.split('-').count(), 6);

    // Duplicate uid is refused.
    let resp = admin
        .request(
            "PREREG",
            &[
                ("Workspace-ID", "22222222-2222-2222-2222-222222222222"),
                ("User-ID", "bob"),
            ],
        )
        .await;
    assert_eq!(resp.code, 408);

    // The client redeems the code with its credentials.
    let key = device_key();
    let id = devid('b');
    let mut client = TestClient::connect(&harness).await;
    let resp = client
        .request(
            "REGCODE",
            &[
                ("User-ID", "bob"),
                ("Domain", "example.com"),
                ("Reg-Code", &code),
                ("Password-Hash", "client-password-hash-string"),
                ("Device-ID", &id),
                ("Device-Key", &key.to_string()),
            ],
        )
        .await;
    assert_eq!(resp.code, 201, "{:?}", resp);
    assert_eq!(
        resp.data.get("Workspace-ID").map(String::as_str),
        Some("11111111-1111-1111-1111-111111111111")
    );

    // The pre-registration row is consumed with the redemption.
    let mut again = TestClient::connect(&harness).await;
    let resp = again
        .request(
            "REGCODE",
            &[
                ("User-ID", "bob"),
                ("Domain", "example.com"),
                ("Reg-Code", &code),
                ("Password-Hash", "client-password-hash-string"),
                ("Device-ID", &id),
                ("Device-Key", &key.to_string()),
            ],
        )
        .await;
    assert_eq!(resp.code, 404);

    // And the workspace is live.
    let mut login = TestClient::connect(&harness).await;
    login
        .authenticate(&wid(), "client-password-hash-string", &id, &key)
        .await;
}

#[tokio::test]
async fn prereg_requires_trust() {
    let harness = TestHarness::new("private").await;
    let mut outsider = TestClient::connect_from(&harness, "203.0.113.9".parse().unwrap()).await;

    let resp = outsider
        .request("PREREG", &[("User-ID", "mallory")])
        .await;
    assert_eq!(resp.code, 401);
}

#[tokio::test]
async fn prereg_generates_a_wid_when_not_given() {
    let harness = TestHarness::new("private").await;
    let mut admin = TestClient::connect(&harness).await;

    let resp = admin.request("PREREG", &[("User-ID", "carol")]).await;
    assert_eq!(resp.code, 200);
    assert!(resp.data["Workspace-ID"].parse::<Wid>().is_ok());
    assert_eq!(resp.data.get("User-ID").map(String::as_str), Some("carol"));
}

#[tokio::test]
async fn regcode_failures_lock_out_the_source() {
    let harness = TestHarness::with_security(
        "private",
        "failure_delay_sec = 0\nmax_failures = 3\nregistration_delay_min = 15",
    )
    .await;

    let key = device_key().to_string();
    let id = devid('c');
    let mut client = TestClient::connect(&harness).await;
    for _ in 0..3 {
        let resp = client
            .request(
                "REGCODE",
                &[
                    ("User-ID", "bob"),
                    ("Reg-Code", "wrong-words-entirely-made-up-here"),
                    ("Password-Hash", "x"),
                    ("Device-ID", &id),
                    ("Device-Key", &key),
                ],
            )
            .await;
        assert_eq!(resp.code, 404);
    }

    let resp = client
        .request(
            "REGCODE",
            &[
                ("User-ID", "bob"),
                ("Reg-Code", "wrong-words-entirely-made-up-here"),
                ("Password-Hash", "x"),
                ("Device-ID", &id),
                ("Device-Key", &key),
            ],
        )
        .await;
    assert_eq!(resp.code, 407);
}

#[tokio::test]
async fn unregister_soft_deletes_and_blocks_reuse() {
    let harness = TestHarness::new("private").await;
    let password = harness.seed_workspace(&wid(), Some("dave")).await;

    let key = device_key();
    let id = devid('d');
    let mut client = TestClient::connect(&harness).await;
    client.authenticate(&wid(), &password, &id, &key).await;

    let resp = client.request("UNREGISTER", &[]).await;
    assert_eq!(resp.code, 202);
    assert!(client.closed().await);

    // The WID is tombstoned: no login, no re-registration.
    let mut again = TestClient::connect(&harness).await;
    let resp = again
        .request("LOGIN", &[("Workspace-ID", &wid().to_string())])
        .await;
    assert_eq!(resp.code, 404);

    let stored = harness.server.store.get_password_hash(&wid()).await.unwrap();
    assert_eq!(stored, "-");
}
