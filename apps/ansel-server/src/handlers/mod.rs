//! Command handlers, one module per command family.
//!
//! Each handler checks its required session state, validates the typed view
//! of its data fields, and returns the final response frame. The session
//! loop owns the actual socket write.

use tokio::io::{AsyncRead, AsyncWrite};

use crate::error::ServerError;
use crate::protocol::{Request, Response};
use crate::server::AnselServer;
use crate::session::Session;

mod keycards;
mod login;
mod misc;
mod register;

pub async fn dispatch<S: AsyncRead + AsyncWrite + Unpin + Send>(
    server: &AnselServer,
    session: &mut Session<S>,
    request: &Request,
) -> Result<Response, ServerError> {
    match request.action.as_str() {
        "LOGIN" => login::login(server, session, request).await,
        "PASSWORD" => login::password(server, session, request).await,
        "DEVICE" => login::device(server, session, request).await,
        "DEVKEY" => login::devkey(server, session, request).await,
        "LOGOUT" => login::logout(session).await,
        "CANCEL" => login::cancel(session).await,
        "REGISTER" => register::register(server, session, request).await,
        "PREREG" => register::prereg(server, session, request).await,
        "REGCODE" => register::regcode(server, session, request).await,
        "UNREGISTER" => register::unregister(server, session).await,
        "ORGCARD" => keycards::orgcard(server, session, request).await,
        "USERCARD" => keycards::usercard(server, session, request).await,
        "ISCURRENT" => keycards::iscurrent(server, session, request).await,
        "ADDENTRY" => keycards::addentry(server, session, request).await,
        "EXISTS" => misc::exists(server, session, request).await,
        "NOOP" => Ok(Response::ok()),
        _ => Ok(Response::bad_request("unrecognized command")),
    }
}
