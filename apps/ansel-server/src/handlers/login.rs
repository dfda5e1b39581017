//! Authentication handlers: LOGIN, PASSWORD, DEVICE, DEVKEY, LOGOUT, CANCEL.

use std::time::Duration as StdDuration;

use ansel_crypto::CryptoString;
use ansel_storage::{
    resolve_address, Address, DeviceId, DeviceStatus, FailureKind, Store, StoreError, Wid,
    WorkspaceStatus,
};
use chrono::Duration;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::error::ServerError;
use crate::protocol::{Request, Response};
use crate::server::AnselServer;
use crate::session::{LoginState, Session};

/// Start a login: resolve the target workspace, gate on lockout and status,
/// and move to the password phase.
pub async fn login<S: AsyncRead + AsyncWrite + Unpin + Send>(
    server: &AnselServer,
    session: &mut Session<S>,
    request: &Request,
) -> Result<Response, ServerError> {
    if let Some(response) = session.demand(LoginState::NoSession) {
        return Ok(response);
    }

    let wid = if let Some(raw) = request.field("Workspace-ID") {
        match raw.parse::<Wid>() {
            Ok(wid) => wid,
            Err(_) => return Ok(Response::bad_request("bad workspace id")),
        }
    } else if let Some(raw) = request.field("Address") {
        let address: Address = match raw.parse() {
            Ok(address) => address,
            Err(_) => return Ok(Response::bad_request("bad address")),
        };
        match resolve_address(&server.store, &address).await {
            Ok(wid) => wid,
            Err(StoreError::NotFound) => {
                log_auth_failure(server, session, FailureKind::Workspace, raw).await?;
                return Ok(Response::not_found());
            }
            Err(e) => return Err(e.into()),
        }
    } else {
        return Ok(Response::bad_request("Workspace-ID or Address required"));
    };

    // Credential failures are keyed on (wid, source); a locked-out caller is
    // refused before any password handling happens.
    if let Some(until) = server
        .store
        .check_lockout(FailureKind::Password, &wid.to_string(), &session.source())
        .await?
    {
        session.is_terminating = true;
        return Ok(Response::new(407).with_data("Lockout-Until", &until.to_rfc3339()));
    }

    match server.store.check_workspace(&wid).await? {
        None => {
            log_auth_failure(server, session, FailureKind::Workspace, &wid.to_string()).await?;
            Ok(Response::not_found())
        }
        Some(WorkspaceStatus::Disabled) => {
            session.is_terminating = true;
            Ok(Response::new(407).with_info("account disabled"))
        }
        Some(WorkspaceStatus::Deleted) => Ok(Response::not_found()),
        Some(WorkspaceStatus::Awaiting) | Some(WorkspaceStatus::Pending) => {
            Ok(Response::new(407).with_info("account pending approval"))
        }
        Some(WorkspaceStatus::Active) | Some(WorkspaceStatus::Approved) => {
            session.wid = Some(wid);
            session.state = LoginState::AwaitingPassword;
            Ok(Response::cont())
        }
    }
}

/// Check the password hash for the workspace named by LOGIN.
pub async fn password<S: AsyncRead + AsyncWrite + Unpin + Send>(
    server: &AnselServer,
    session: &mut Session<S>,
    request: &Request,
) -> Result<Response, ServerError> {
    if let Some(response) = session.demand(LoginState::AwaitingPassword) {
        return Ok(response);
    }
    let Some(wid) = session.wid.clone() else {
        return Ok(Response::unauthorized());
    };

    let Some(password) = request.field("Password-Hash") else {
        return Ok(Response::bad_request("Password-Hash required"));
    };
    if password.len() > 256 {
        return Ok(Response::bad_request("Password-Hash too long"));
    }

    let stored = server.store.get_password_hash(&wid).await?;
    if server
        .verify_password(password.to_string(), stored)
        .await?
    {
        session.state = LoginState::AwaitingDevice;
        return Ok(Response::cont());
    }

    failed_credential(server, session, &wid).await
}

/// Enroll or verify the device key, completing authentication.
pub async fn device<S: AsyncRead + AsyncWrite + Unpin + Send>(
    server: &AnselServer,
    session: &mut Session<S>,
    request: &Request,
) -> Result<Response, ServerError> {
    if let Some(response) = session.demand(LoginState::AwaitingDevice) {
        return Ok(response);
    }
    let Some(wid) = session.wid.clone() else {
        return Ok(Response::unauthorized());
    };

    let Some(device_id) = request.field("Device-ID").and_then(|v| v.parse::<DeviceId>().ok())
    else {
        return Ok(Response::bad_request("valid Device-ID required"));
    };
    let Some(device_key) = request
        .field("Device-Key")
        .and_then(|v| v.parse::<CryptoString>().ok())
    else {
        return Ok(Response::bad_request("valid Device-Key required"));
    };

    match server.store.get_device(&wid, &device_id).await? {
        None => {
            // First contact from this device: enroll the key.
            server
                .store
                .add_device(&wid, &device_id, &device_key, DeviceStatus::Active)
                .await?;
        }
        Some(device) => {
            if device.device_key != device_key {
                return failed_credential(server, session, &wid).await;
            }
        }
    }

    session.state = LoginState::ClientSession;
    Ok(Response::ok())
}

/// Rotate a device key, predicated on the old key value.
pub async fn devkey<S: AsyncRead + AsyncWrite + Unpin + Send>(
    server: &AnselServer,
    session: &mut Session<S>,
    request: &Request,
) -> Result<Response, ServerError> {
    if let Some(response) = session.demand(LoginState::ClientSession) {
        return Ok(response);
    }
    let Some(wid) = session.wid.clone() else {
        return Ok(Response::unauthorized());
    };

    let Some(device_id) = request.field("Device-ID").and_then(|v| v.parse::<DeviceId>().ok())
    else {
        return Ok(Response::bad_request("valid Device-ID required"));
    };
    let (Some(old_key), Some(new_key)) = (
        request
            .field("Old-Key")
            .and_then(|v| v.parse::<CryptoString>().ok()),
        request
            .field("New-Key")
            .and_then(|v| v.parse::<CryptoString>().ok()),
    ) else {
        return Ok(Response::bad_request("Old-Key and New-Key required"));
    };

    if server
        .store
        .update_device(&wid, &device_id, &old_key, &new_key)
        .await?
    {
        Ok(Response::ok())
    } else {
        Ok(Response::not_found().with_info("no such device and key combination"))
    }
}

pub async fn logout<S: AsyncRead + AsyncWrite + Unpin + Send>(
    session: &mut Session<S>,
) -> Result<Response, ServerError> {
    session.reset();
    session.is_terminating = true;
    Ok(Response::ok())
}

/// Abort a partial login. A no-op once fully authenticated.
pub async fn cancel<S: AsyncRead + AsyncWrite + Unpin + Send>(
    session: &mut Session<S>,
) -> Result<Response, ServerError> {
    if session.state != LoginState::ClientSession {
        session.reset();
    }
    Ok(Response::ok())
}

/// Shared failure path for password and device-key mismatches: log, delay,
/// count, and close the connection at the in-session cap.
async fn failed_credential<S: AsyncRead + AsyncWrite + Unpin + Send>(
    server: &AnselServer,
    session: &mut Session<S>,
    wid: &Wid,
) -> Result<Response, ServerError> {
    log_auth_failure(server, session, FailureKind::Password, &wid.to_string()).await?;
    session.password_failures += 1;

    // The delay is applied before the response goes out so one connection
    // cannot pipeline guesses.
    let delay = server.config.security.failure_delay_sec;
    if delay > 0 {
        tokio::time::sleep(StdDuration::from_secs(delay)).await;
    }

    if session.password_failures >= server.config.security.max_failures {
        session.is_terminating = true;
    }
    Ok(Response::new(402))
}

async fn log_auth_failure<S: AsyncRead + AsyncWrite + Unpin + Send>(
    server: &AnselServer,
    session: &Session<S>,
    kind: FailureKind,
    id: &str,
) -> Result<(), ServerError> {
    server
        .store
        .log_failure(
            kind,
            id,
            &session.source(),
            server.config.security.max_failures,
            Duration::minutes(server.config.security.lockout_delay_min),
        )
        .await?;
    Ok(())
}
