//! Per-connection protocol state.
//!
//! One session per accepted connection, one cooperative task per session.
//! Commands are strictly ordered within a connection: read a frame, run the
//! handler, write the response. Nothing here is shared across connections.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::timeout;
use tracing::{debug, error};

use ansel_storage::Wid;

use crate::error::ServerError;
use crate::handlers;
use crate::protocol::{Request, Response};
use crate::server::AnselServer;

/// Maximum bytes for an ordinary command frame.
pub const MAX_COMMAND_LENGTH: usize = 1024;

/// Ceiling for the keycard-entry dialogue, the one bulk escape.
pub const MAX_BULK_LENGTH: usize = 8192;

const READ_DEADLINE: Duration = Duration::from_secs(30 * 60);
const WRITE_DEADLINE: Duration = Duration::from_secs(10 * 60);

/// Authentication progress of one connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoginState {
    /// Unauthenticated.
    NoSession,
    /// Client named a valid workspace. Awaiting the password hash.
    AwaitingPassword,
    /// Password accepted. Awaiting the device identity.
    AwaitingDevice,
    /// Fully authenticated.
    ClientSession,
}

/// What one read attempt produced.
pub enum ReadOutcome {
    /// A parsed frame and its size on the wire.
    Frame(Request, usize),
    /// Bytes arrived but were not a valid frame.
    Malformed,
    /// The peer went away (or the read deadline elapsed).
    Closed,
}

pub struct Session<S> {
    stream: S,
    peer: IpAddr,
    pub state: LoginState,
    pub wid: Option<Wid>,
    pub password_failures: u32,
    pub is_terminating: bool,
}

impl<S: AsyncRead + AsyncWrite + Unpin + Send> Session<S> {
    pub fn new(stream: S, peer: IpAddr) -> Self {
        Self {
            stream,
            peer,
            state: LoginState::NoSession,
            wid: None,
            password_failures: 0,
            is_terminating: false,
        }
    }

    pub fn peer(&self) -> IpAddr {
        self.peer
    }

    /// The failure-log source string for this connection.
    pub fn source(&self) -> String {
        self.peer.to_string()
    }

    /// A 401 when the session is not in the state a command requires.
    pub fn demand(&self, required: LoginState) -> Option<Response> {
        if self.state != required {
            Some(Response::unauthorized())
        } else {
            None
        }
    }

    /// Drop back to the unauthenticated state.
    pub fn reset(&mut self) {
        self.state = LoginState::NoSession;
        self.wid = None;
        self.password_failures = 0;
    }

    /// Read one frame. The read deadline marks the session terminating
    /// rather than erroring, so the current command can finish cleanly.
    pub async fn read_request(&mut self) -> Result<ReadOutcome, ServerError> {
        let mut buffer = vec![0u8; MAX_BULK_LENGTH];
        let read = match timeout(READ_DEADLINE, self.stream.read(&mut buffer)).await {
            Err(_) => {
                self.is_terminating = true;
                return Ok(ReadOutcome::Closed);
            }
            Ok(result) => result?,
        };
        if read == 0 {
            return Ok(ReadOutcome::Closed);
        }

        match serde_json::from_slice::<Request>(&buffer[..read]) {
            Ok(request) => Ok(ReadOutcome::Frame(request, read)),
            Err(e) => {
                debug!(error = %e, "unparseable frame");
                Ok(ReadOutcome::Malformed)
            }
        }
    }

    /// Write one response frame under the write deadline.
    pub async fn send(&mut self, response: &Response) -> Result<(), ServerError> {
        let bytes = serde_json::to_vec(response)?;
        match timeout(WRITE_DEADLINE, self.stream.write_all(&bytes)).await {
            Err(_) => {
                self.is_terminating = true;
                Ok(())
            }
            Ok(result) => Ok(result?),
        }
    }

    /// Drive the connection until it closes: greeting, then a strict
    /// request/response loop.
    pub async fn run(mut self, server: Arc<AnselServer>) {
        let greeting = Response::ok()
            .with_data("Name", "Ansel")
            .with_data("Version", "0.1");
        if self.send(&greeting).await.is_err() {
            return;
        }

        loop {
            let outcome = match self.read_request().await {
                Ok(outcome) => outcome,
                Err(_) => break,
            };

            let sent = match outcome {
                ReadOutcome::Closed => break,
                ReadOutcome::Malformed => {
                    self.send(&Response::bad_request("malformed frame")).await
                }
                ReadOutcome::Frame(request, size) => {
                    if request.action == "QUIT" {
                        break;
                    }
                    if size > MAX_COMMAND_LENGTH && request.action != "ADDENTRY" {
                        self.send(&Response::bad_request("command too long")).await
                    } else {
                        match handlers::dispatch(&server, &mut self, &request).await {
                            Ok(response) => self.send(&response).await,
                            Err(e) => {
                                error!(action = %request.action, error = %e, "command failed");
                                if e.is_fatal_to_connection() {
                                    break;
                                }
                                self.send(&e.to_response()).await
                            }
                        }
                    }
                }
            };

            if sent.is_err() || self.is_terminating {
                break;
            }
        }
    }
}
