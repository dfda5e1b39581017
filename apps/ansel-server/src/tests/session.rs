//! Frame handling and state-machine basics.

use super::common::{devid, device_key, TestClient, TestHarness};
use crate::session::MAX_COMMAND_LENGTH;

#[tokio::test]
async fn greeting_noop_and_quit() {
    let harness = TestHarness::new("private").await;
    let mut client = TestClient::connect(&harness).await;

    let resp = client.request("NOOP", &[]).await;
    assert_eq!(resp.code, 200);

    client.send("QUIT", &[]).await;
    assert!(client.closed().await);
}

#[tokio::test]
async fn unrecognized_command_is_400() {
    let harness = TestHarness::new("private").await;
    let mut client = TestClient::connect(&harness).await;

    let resp = client.request("MAKETEA", &[]).await;
    assert_eq!(resp.code, 400);
    assert_eq!(resp.status, "BAD REQUEST");
}

#[tokio::test]
async fn malformed_frame_is_400() {
    let harness = TestHarness::new("private").await;
    let mut client = TestClient::connect(&harness).await;

    client.send_raw(b"this is not json").await;
    let resp = client.recv().await;
    assert_eq!(resp.code, 400);

    // The connection survives a bad frame.
    let resp = client.request("NOOP", &[]).await;
    assert_eq!(resp.code, 200);
}

#[tokio::test]
async fn oversized_command_is_rejected() {
    let harness = TestHarness::new("private").await;
    let mut client = TestClient::connect(&harness).await;

    let padding = "x".repeat(MAX_COMMAND_LENGTH);
    let resp = client.request("NOOP", &[("Padding", &padding)]).await;
    assert_eq!(resp.code, 400);
}

#[tokio::test]
async fn wrong_state_commands_are_401() {
    let harness = TestHarness::new("private").await;
    let mut client = TestClient::connect(&harness).await;

    for action in ["PASSWORD", "DEVICE", "ORGCARD", "USERCARD", "ISCURRENT", "EXISTS", "DEVKEY"] {
        let resp = client.request(action, &[]).await;
        assert_eq!(resp.code, 401, "{} in NoSession", action);
    }
}

#[tokio::test]
async fn cancel_resets_a_partial_login() {
    let harness = TestHarness::new("private").await;
    let wid = "11111111-1111-1111-1111-111111111111".parse().unwrap();
    let password = harness.seed_workspace(&wid, None).await;

    let mut client = TestClient::connect(&harness).await;
    let resp = client
        .request("LOGIN", &[("Workspace-ID", &wid.to_string())])
        .await;
    assert_eq!(resp.code, 100);

    let resp = client.request("CANCEL", &[]).await;
    assert_eq!(resp.code, 200);

    // Back to square one: PASSWORD is out of order again, LOGIN works.
    let resp = client
        .request("PASSWORD", &[("Password-Hash", &password)])
        .await;
    assert_eq!(resp.code, 401);
    let resp = client
        .request("LOGIN", &[("Workspace-ID", &wid.to_string())])
        .await;
    assert_eq!(resp.code, 100);
}

#[tokio::test]
async fn exists_probes_the_workspace_directory() {
    let harness = TestHarness::new("private").await;
    let wid = "11111111-1111-1111-1111-111111111111".parse().unwrap();
    let password = harness.seed_workspace(&wid, None).await;

    let mut client = TestClient::connect(&harness).await;
    client
        .authenticate(&wid, &password, &devid('e'), &device_key())
        .await;

    // Nothing exists for a brand-new workspace.
    let resp = client.request("EXISTS", &[("Path", "inbox")]).await;
    assert_eq!(resp.code, 404);

    // Escape attempts never reach the filesystem.
    let resp = client.request("EXISTS", &[("Path", "../other")]).await;
    assert_eq!(resp.code, 400);
    let resp = client.request("EXISTS", &[]).await;
    assert_eq!(resp.code, 400);
}

#[tokio::test]
async fn logout_closes_the_connection() {
    let harness = TestHarness::new("private").await;
    let wid = "11111111-1111-1111-1111-111111111111".parse().unwrap();
    let password = harness.seed_workspace(&wid, None).await;

    let mut client = TestClient::connect(&harness).await;
    client
        .authenticate(&wid, &password, &devid('a'), &device_key())
        .await;

    let resp = client.request("LOGOUT", &[]).await;
    assert_eq!(resp.code, 200);
    assert!(client.closed().await);
}
