//! Keycard handlers: ORGCARD, USERCARD, ISCURRENT, ADDENTRY.

use ansel_crypto::CryptoString;
use ansel_keycard::{
    verify_chain_link, verify_full, Entry, EntryType, SignatureSlot, DEFAULT_FINGERPRINT_ALGORITHM,
};
use ansel_storage::{KeycardEntry, Store, StoreError, Wid, ORG_OWNER};
use tokio::io::{AsyncRead, AsyncWrite};

use crate::error::ServerError;
use crate::protocol::{Request, Response};
use crate::server::AnselServer;
use crate::session::{LoginState, ReadOutcome, Session};

const ENTRY_BEGIN: &str = "----- BEGIN ENTRY -----\r\n";
const ENTRY_END: &str = "\r\n----- END ENTRY -----\r\n";

fn entry_payload(entries: Vec<KeycardEntry>) -> Response {
    let mut joined = String::new();
    for entry in &entries {
        joined.push_str(ENTRY_BEGIN);
        joined.push_str(&entry.entry);
        joined.push_str(ENTRY_END);
    }
    Response::ok()
        .with_data("Item-Count", &entries.len().to_string())
        .with_data("Entries", &joined)
}

fn index_range(request: &Request) -> Result<(u32, u32), Response> {
    let start = match request.field("Start-Index") {
        None => 0,
        Some(raw) => raw
            .parse()
            .map_err(|_| Response::bad_request("bad Start-Index"))?,
    };
    let end = match request.field("End-Index") {
        None => 0,
        Some(raw) => raw
            .parse()
            .map_err(|_| Response::bad_request("bad End-Index"))?,
    };
    Ok((start, end))
}

/// Serve organization chain entries.
pub async fn orgcard<S: AsyncRead + AsyncWrite + Unpin + Send>(
    server: &AnselServer,
    session: &mut Session<S>,
    request: &Request,
) -> Result<Response, ServerError> {
    if let Some(response) = session.demand(LoginState::ClientSession) {
        return Ok(response);
    }
    let (start, end) = match index_range(request) {
        Ok(range) => range,
        Err(response) => return Ok(response),
    };

    let entries = server.store.get_org_entries(start, end).await?;
    if entries.is_empty() {
        return Ok(Response::not_found());
    }
    Ok(entry_payload(entries))
}

/// Serve a workspace's chain entries; defaults to the caller's own.
pub async fn usercard<S: AsyncRead + AsyncWrite + Unpin + Send>(
    server: &AnselServer,
    session: &mut Session<S>,
    request: &Request,
) -> Result<Response, ServerError> {
    if let Some(response) = session.demand(LoginState::ClientSession) {
        return Ok(response);
    }
    let wid = match request.field("Workspace-ID") {
        Some(raw) => match raw.parse::<Wid>() {
            Ok(wid) => wid,
            Err(_) => return Ok(Response::bad_request("bad Workspace-ID")),
        },
        None => match session.wid.clone() {
            Some(wid) => wid,
            None => return Ok(Response::unauthorized()),
        },
    };
    let (start, end) = match index_range(request) {
        Ok(range) => range,
        Err(response) => return Ok(response),
    };

    let entries = server.store.get_user_entries(&wid, start, end).await?;
    if entries.is_empty() {
        return Ok(Response::not_found());
    }
    Ok(entry_payload(entries))
}

/// Report whether an index is the current tip of a chain.
pub async fn iscurrent<S: AsyncRead + AsyncWrite + Unpin + Send>(
    server: &AnselServer,
    session: &mut Session<S>,
    request: &Request,
) -> Result<Response, ServerError> {
    if let Some(response) = session.demand(LoginState::ClientSession) {
        return Ok(response);
    }
    let Some(index) = request.field("Index").and_then(|v| v.parse::<u32>().ok()) else {
        return Ok(Response::bad_request("valid Index required"));
    };
    let owner = match request.field("Workspace-ID") {
        Some(raw) => match raw.parse::<Wid>() {
            Ok(wid) => wid.to_string(),
            Err(_) => return Ok(Response::bad_request("bad Workspace-ID")),
        },
        None => ORG_OWNER.to_string(),
    };

    let Some(last) = server.store.get_last_entry(&owner).await? else {
        return Ok(Response::not_found());
    };
    let answer = if last.index == index { "YES" } else { "NO" };
    Ok(Response::ok().with_data("Is-Current", answer))
}

/// Append an entry to the caller's keycard.
///
/// A two-frame dialogue: the client submits the base entry (fields plus any
/// custody signature); the server checks the chain preconditions, adds the
/// organization signature, links and hashes the entry, and answers 100
/// CONTINUE with what it added; the client returns the owner signature over
/// the completed entry, which is verified in full and committed under the
/// owner's append lock.
pub async fn addentry<S: AsyncRead + AsyncWrite + Unpin + Send>(
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

    let Some(raw) = request.field("Base-Entry") else {
        return Ok(Response::bad_request("Base-Entry required"));
    };
    let mut entry = match Entry::from_bytes(EntryType::User, raw.as_bytes()) {
        Ok(entry) => entry,
        Err(e) => return Ok(Response::bad_request(&format!("invalid entry: {e}"))),
    };

    // Only the authenticated workspace may extend its own card, and only
    // under this organization's domain.
    match entry
        .field("Workspace-ID")
        .and_then(|v| v.parse::<Wid>().ok())
    {
        Some(entry_wid) if entry_wid == wid => {}
        _ => return Ok(Response::unauthorized()),
    }
    if entry.field("Domain") != Some(server.config.global.org_domain().as_str()) {
        return Ok(Response::bad_request("entry domain mismatch"));
    }
    if let Err(e) = entry.validate_data() {
        return Ok(Response::bad_request(&format!("invalid entry: {e}")));
    }

    let owner = entry.owner()?;
    let _guard = server.card_locks.acquire(&owner).await;

    let prev_row = server.store.get_last_entry(&owner).await?;
    let prev_entry = match &prev_row {
        Some(row) => {
            if entry.index()? != row.index + 1 {
                return Ok(Response::bad_request("index must follow the current entry"));
            }
            let parsed = Entry::from_bytes(EntryType::User, row.entry.as_bytes())
                .map_err(|_| StoreError::Backend("corrupt keycard entry".to_string()))?;
            Some(parsed)
        }
        None => {
            if entry.index()? != 1 {
                return Ok(Response::bad_request("first entry must have index 1"));
            }
            None
        }
    };

    if let Some(row) = &prev_row {
        entry.set_prev_hash(row.fingerprint.clone());
    }

    let signing_key = server.store.get_primary_signing_key().await?;
    entry.sign_entry(&signing_key, SignatureSlot::Organization)?;
    entry.generate_hash(DEFAULT_FINGERPRINT_ALGORITHM)?;

    let Some(org_signature) = entry.signature(SignatureSlot::Organization) else {
        return Ok(Response::internal_error());
    };
    let Some(fingerprint) = entry.hash() else {
        return Ok(Response::internal_error());
    };
    let mut interim = Response::cont()
        .with_data("Organization-Signature", &org_signature.to_string())
        .with_data("Hash", &fingerprint.to_string());
    if let Some(prev_hash) = entry.prev_hash() {
        interim = interim.with_data("Previous-Hash", &prev_hash.to_string());
    }
    session.send(&interim).await?;

    // Second frame: the owner's signature over the completed entry.
    let followup = match session.read_request().await? {
        ReadOutcome::Frame(followup, _) if followup.action == "ADDENTRY" => followup,
        ReadOutcome::Closed => {
            session.is_terminating = true;
            return Ok(Response::bad_request("entry submission aborted"));
        }
        _ => return Ok(Response::bad_request("User-Signature frame expected")),
    };
    let Some(signature) = followup
        .field("User-Signature")
        .and_then(|v| v.parse::<CryptoString>().ok())
    else {
        return Ok(Response::bad_request("valid User-Signature required"));
    };
    entry.set_signature(SignatureSlot::User, signature)?;

    let org_verify_key = server.store.get_org_verifying_key().await?;
    if let Err(e) = verify_full(&entry, Some(&org_verify_key)) {
        return Ok(Response::bad_request(&format!("entry failed verification: {e}")));
    }
    if let Some(prev) = &prev_entry {
        if let Err(e) = verify_chain_link(prev, &entry, Some(&org_verify_key)) {
            return Ok(Response::bad_request(&format!("{e}")));
        }
    }

    let row = KeycardEntry {
        owner,
        index: entry.index()?,
        creation_time: entry.field("Timestamp").unwrap_or_default().to_string(),
        entry: entry.to_text(),
        fingerprint: fingerprint_of(&entry)?,
    };
    server.store.add_entry(&row).await?;

    Ok(Response::ok())
}

fn fingerprint_of(entry: &Entry) -> Result<CryptoString, ServerError> {
    entry
        .hash()
        .cloned()
        .ok_or_else(|| ServerError::Store(StoreError::Backend("entry hash missing".to_string())))
}
