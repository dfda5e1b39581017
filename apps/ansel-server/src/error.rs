//! Server-side error type and its mapping onto wire status codes.

use ansel_crypto::CryptoError;
use ansel_keycard::EntryError;
use ansel_storage::StoreError;
use thiserror::Error;

use crate::protocol::Response;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Entry(#[from] EntryError),
    #[error(transparent)]
    Crypto(#[from] CryptoError),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("bad frame: {0}")]
    Json(#[from] serde_json::Error),
    #[error("background task failed")]
    TaskJoin,
}

impl ServerError {
    /// Connection-scoped errors never kill the process; storage and crypto
    /// failures abort the command with a 300 and keep the connection.
    pub fn to_response(&self) -> Response {
        match self {
            ServerError::Store(StoreError::NotFound) => Response::not_found(),
            ServerError::Store(StoreError::AlreadyExists) => Response::new(408),
            ServerError::Store(
                StoreError::InvalidAddress | StoreError::InvalidDomain | StoreError::InvalidKind,
            ) => Response::bad_request("invalid identifier"),
            ServerError::Store(StoreError::Conflict) => Response::bad_request("conflict"),
            ServerError::Store(StoreError::Backend(_)) => Response::internal_error(),
            ServerError::Entry(EntryError::ChainBroken(reason)) => {
                Response::bad_request(&format!("keycard chain broken: {reason}"))
            }
            ServerError::Entry(EntryError::Crypto(_)) => Response::internal_error(),
            ServerError::Entry(_) => Response::bad_request("invalid keycard entry"),
            ServerError::Crypto(_) => Response::internal_error(),
            ServerError::Io(_) | ServerError::Json(_) | ServerError::TaskJoin => {
                Response::internal_error()
            }
        }
    }

    /// Whether the connection itself is unusable after this error.
    pub fn is_fatal_to_connection(&self) -> bool {
        matches!(self, ServerError::Io(_))
    }
}
