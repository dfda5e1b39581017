//! Registration handlers: REGISTER, PREREG, REGCODE, UNREGISTER.

use ansel_config::RegistrationMode;
use ansel_crypto::CryptoString;
use ansel_storage::{
    DeviceId, DeviceStatus, Domain, FailureKind, Prereg, RegId, Store, StoreError, Uid, Wid,
    WorkspaceParams, WorkspaceStatus, WorkspaceType,
};
use chrono::Duration;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::error::ServerError;
use crate::protocol::{Request, Response};
use crate::regcode::generate_regcode;
use crate::server::AnselServer;
use crate::session::{LoginState, Session};

/// Failure-log id used to throttle self-registration per source address.
const REGISTRATION_THROTTLE_ID: &str = "registration";

/// Self-registration, governed by the configured admission policy.
pub async fn register<S: AsyncRead + AsyncWrite + Unpin + Send>(
    server: &AnselServer,
    session: &mut Session<S>,
    request: &Request,
) -> Result<Response, ServerError> {
    if let Some(response) = session.demand(LoginState::NoSession) {
        return Ok(response);
    }

    match server.config.global.registration {
        RegistrationMode::Private => {
            return Ok(Response::new(304).with_info("registration is by invitation only"))
        }
        RegistrationMode::Network => {
            let peer = session.peer();
            let permitted = server
                .config
                .global
                .registration_subnets()
                .iter()
                .any(|net| net.contains(&peer));
            if !permitted {
                return Ok(Response::new(304).with_info("registration closed to this network"));
            }
        }
        RegistrationMode::Public | RegistrationMode::Moderated => {}
    }

    // One registration per source address per configured interval.
    if let Some(until) = server
        .store
        .check_lockout(
            FailureKind::Workspace,
            REGISTRATION_THROTTLE_ID,
            &session.source(),
        )
        .await?
    {
        return Ok(Response::new(407).with_data("Lockout-Until", &until.to_rfc3339()));
    }

    let Some(wid) = request.field("Workspace-ID").and_then(|v| v.parse::<Wid>().ok()) else {
        return Ok(Response::bad_request("valid Workspace-ID required"));
    };
    let uid = match request.field("User-ID") {
        None => None,
        Some(raw) => match raw.parse::<Uid>() {
            Ok(uid) => Some(uid),
            Err(_) => return Ok(Response::bad_request("bad User-ID")),
        },
    };
    let Some(password) = request.field("Password-Hash") else {
        return Ok(Response::bad_request("Password-Hash required"));
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

    let domain = server.config.global.org_domain();
    if server.store.check_workspace(&wid).await?.is_some() {
        return Ok(Response::new(408).with_info("workspace exists"));
    }
    if let Some(uid) = &uid {
        if server.store.check_user_id(uid, &domain).await?.is_some() {
            return Ok(Response::new(408).with_info("user id exists"));
        }
    }

    let moderated = server.config.global.registration == RegistrationMode::Moderated;
    let status = if moderated {
        WorkspaceStatus::Awaiting
    } else {
        WorkspaceStatus::Active
    };

    let password_hash = server.hash_password(password.to_string()).await?;
    match server
        .store
        .add_workspace(&WorkspaceParams {
            wid: wid.clone(),
            uid,
            domain: domain.clone(),
            password_hash,
            status,
            wtype: WorkspaceType::Individual,
        })
        .await
    {
        Ok(()) => {}
        Err(StoreError::AlreadyExists) => {
            return Ok(Response::new(408).with_info("workspace exists"))
        }
        Err(e) => return Err(e.into()),
    }
    server
        .store
        .add_device(&wid, &device_id, &device_key, DeviceStatus::Active)
        .await?;

    let throttle = server.config.security.registration_delay_min;
    if throttle > 0 {
        server
            .store
            .log_failure(
                FailureKind::Workspace,
                REGISTRATION_THROTTLE_ID,
                &session.source(),
                1,
                Duration::minutes(throttle),
            )
            .await?;
    }

    if moderated {
        Ok(Response::new(101)
            .with_info("awaiting moderator approval")
            .with_data("Workspace-ID", &wid.to_string()))
    } else {
        Ok(Response::new(201)
            .with_data("Workspace-ID", &wid.to_string())
            .with_data("Domain", domain.as_str()))
    }
}

/// Provision a pending account and hand back its registration code.
///
/// Allowed from an authenticated session, or unauthenticated from the host
/// itself (initial provisioning before any account exists).
pub async fn prereg<S: AsyncRead + AsyncWrite + Unpin + Send>(
    server: &AnselServer,
    session: &mut Session<S>,
    request: &Request,
) -> Result<Response, ServerError> {
    let trusted = session.state == LoginState::ClientSession || session.peer().is_loopback();
    if !trusted {
        return Ok(Response::unauthorized());
    }

    let domain = match request.field("Domain") {
        None => server.config.global.org_domain(),
        Some(raw) => match raw.parse::<Domain>() {
            Ok(domain) => domain,
            Err(_) => return Ok(Response::bad_request("bad Domain")),
        },
    };

    let wid = match request.field("Workspace-ID") {
        Some(raw) => {
            let Ok(wid) = raw.parse::<Wid>() else {
                return Ok(Response::bad_request("bad Workspace-ID"));
            };
            if server.store.check_workspace(&wid).await?.is_some() {
                return Ok(Response::new(408).with_info("workspace exists"));
            }
            wid
        }
        None => {
            let mut wid = Wid::generate();
            while server.store.check_workspace(&wid).await?.is_some() {
                wid = Wid::generate();
            }
            wid
        }
    };

    let uid = match request.field("User-ID") {
        None => None,
        Some(raw) => {
            let Ok(uid) = raw.parse::<Uid>() else {
                return Ok(Response::bad_request("bad User-ID"));
            };
            if server.store.check_user_id(&uid, &domain).await?.is_some() {
                return Ok(Response::new(408).with_info("user id exists"));
            }
            Some(uid)
        }
    };

    let regcode = generate_regcode(
        server.config.global.registration_wordlist,
        server.config.global.registration_wordcount,
    );

    match server
        .store
        .add_prereg(&Prereg {
            wid: wid.clone(),
            uid: uid.clone(),
            domain: domain.clone(),
            regcode: regcode.clone(),
        })
        .await
    {
        Ok(()) => {}
        Err(StoreError::AlreadyExists) => {
            return Ok(Response::new(408).with_info("already preregistered"))
        }
        Err(e) => return Err(e.into()),
    }

    let mut response = Response::ok()
        .with_data("Workspace-ID", &wid.to_string())
        .with_data("Domain", domain.as_str())
        .with_data("Reg-Code", &regcode);
    if let Some(uid) = uid {
        response = response.with_data("User-ID", uid.as_str());
    }
    Ok(response)
}

/// Redeem a registration code, materializing the workspace.
pub async fn regcode<S: AsyncRead + AsyncWrite + Unpin + Send>(
    server: &AnselServer,
    session: &mut Session<S>,
    request: &Request,
) -> Result<Response, ServerError> {
    if let Some(response) = session.demand(LoginState::NoSession) {
        return Ok(response);
    }

    let domain = match request.field("Domain") {
        None => server.config.global.org_domain(),
        Some(raw) => match raw.parse::<Domain>() {
            Ok(domain) => domain,
            Err(_) => return Ok(Response::bad_request("bad Domain")),
        },
    };

    let (reg_id, id_str) = if let Some(raw) = request.field("Workspace-ID") {
        let Ok(wid) = raw.parse::<Wid>() else {
            return Ok(Response::bad_request("bad Workspace-ID"));
        };
        (RegId::Wid(wid.clone()), wid.to_string())
    } else if let Some(raw) = request.field("User-ID") {
        let Ok(uid) = raw.parse::<Uid>() else {
            return Ok(Response::bad_request("bad User-ID"));
        };
        (RegId::Uid(uid.clone()), uid.to_string())
    } else {
        return Ok(Response::bad_request("Workspace-ID or User-ID required"));
    };

    // Brute-forcing codes from one address trips the registration lockout.
    if let Some(until) = server
        .store
        .check_lockout(FailureKind::Workspace, &id_str, &session.source())
        .await?
    {
        return Ok(Response::new(407).with_data("Lockout-Until", &until.to_rfc3339()));
    }

    let Some(code) = request.field("Reg-Code") else {
        return Ok(Response::bad_request("Reg-Code required"));
    };
    let Some(password) = request.field("Password-Hash") else {
        return Ok(Response::bad_request("Password-Hash required"));
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

    let (wid, uid) = match server.store.check_regcode(&reg_id, &domain, code).await {
        Ok(found) => found,
        Err(StoreError::NotFound) => {
            server
                .store
                .log_failure(
                    FailureKind::Workspace,
                    &id_str,
                    &session.source(),
                    server.config.security.max_failures,
                    Duration::minutes(server.config.security.registration_delay_min),
                )
                .await?;
            return Ok(Response::not_found().with_info("code not found"));
        }
        Err(e) => return Err(e.into()),
    };

    let password_hash = server.hash_password(password.to_string()).await?;
    server
        .store
        .add_workspace(&WorkspaceParams {
            wid: wid.clone(),
            uid: uid.clone(),
            domain: domain.clone(),
            password_hash,
            status: WorkspaceStatus::Active,
            wtype: WorkspaceType::Individual,
        })
        .await?;
    server
        .store
        .add_device(&wid, &device_id, &device_key, DeviceStatus::Active)
        .await?;
    server.store.delete_prereg(&wid).await?;

    let mut response = Response::new(201).with_data("Workspace-ID", &wid.to_string());
    if let Some(uid) = uid {
        response = response.with_data("User-ID", uid.as_str());
    }
    Ok(response)
}

/// Soft-delete the authenticated workspace.
pub async fn unregister<S: AsyncRead + AsyncWrite + Unpin + Send>(
    server: &AnselServer,
    session: &mut Session<S>,
) -> Result<Response, ServerError> {
    if let Some(response) = session.demand(LoginState::ClientSession) {
        return Ok(response);
    }
    let Some(wid) = session.wid.clone() else {
        return Ok(Response::unauthorized());
    };

    server.store.remove_workspace(&wid).await?;
    session.reset();
    session.is_terminating = true;
    Ok(Response::new(202))
}
