//! Odds and ends: EXISTS.

use tokio::io::{AsyncRead, AsyncWrite};

use crate::error::ServerError;
use crate::protocol::{Request, Response};
use crate::server::AnselServer;
use crate::session::{LoginState, Session};

/// Probe a path inside the caller's workspace directory.
pub async fn exists<S: AsyncRead + AsyncWrite + Unpin + Send>(
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
    let Some(path) = request.field("Path") else {
        return Ok(Response::bad_request("Path required"));
    };

    let mut full = server.config.global.workspace_dir.join(wid.to_string());
    for part in path.split('/') {
        // Only plain relative components; nothing that can escape the
        // workspace directory.
        if part.is_empty() || part == "." || part == ".." || part.contains('\\') {
            return Ok(Response::bad_request("bad path"));
        }
        full.push(part);
    }

    match tokio::fs::metadata(&full).await {
        Ok(_) => Ok(Response::ok()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Response::not_found()),
        Err(_) => Ok(Response::internal_error()),
    }
}
