//! Storage abstraction for the Ansel server.
//!
//! Backend crates (ansel-store-postgres, ansel-store-sqlite) implement the
//! [`Store`] trait so the server core does not depend on any specific
//! database engine or schema details.

use thiserror::Error;

pub mod resolver;
pub mod store;
pub mod types;

pub use resolver::resolve_address;
pub use store::Store;
pub use types::*;

/// Uniform error type for all storage backends.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("not found")]
    NotFound,
    #[error("already exists")]
    AlreadyExists,
    #[error("conflict")]
    Conflict,
    #[error("invalid address")]
    InvalidAddress,
    #[error("invalid domain")]
    InvalidDomain,
    #[error("invalid failure kind")]
    InvalidKind,
    #[error("backend error: {0}")]
    Backend(String),
}

#[cfg(feature = "test-support")]
pub use store::MockStore;
