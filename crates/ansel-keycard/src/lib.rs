//! Keycard entries and the rules that chain them together.
//!
//! A keycard is an append-only log of key-rotation entries for one owner,
//! either the organization or a single workspace. Each entry is a fixed
//! schema of `Field:Value` lines followed by signatures and a content hash
//! in a fixed order; entries link by carrying the previous entry's hash and
//! a custody signature made with the previous entry's signing key.

use ansel_crypto::CryptoError;
use thiserror::Error;

mod chain;
mod entry;

pub use chain::{verify_chain_link, verify_full};
pub use entry::{Entry, EntryType, SignatureSlot, DEFAULT_FINGERPRINT_ALGORITHM};

/// Errors produced by entry handling and chain validation.
#[derive(Debug, Error)]
pub enum EntryError {
    #[error("bad entry data near line {0}")]
    BadLine(usize),
    #[error("unknown field {0}")]
    UnknownField(String),
    #[error("missing required field {0}")]
    MissingField(&'static str),
    #[error("entry type mismatch")]
    WrongType,
    #[error("{0} is not a valid signature type")]
    UnknownSignature(String),
    #[error("{0} signature missing")]
    SignatureMissing(&'static str),
    #[error("entry hash missing")]
    HashMissing,
    #[error("{0} signature verification failed")]
    VerifyFailed(&'static str),
    #[error("invalid field value for {0}")]
    InvalidValue(&'static str),
    #[error("keycard chain broken: {0}")]
    ChainBroken(String),
    #[error(transparent)]
    Crypto(#[from] CryptoError),
}
