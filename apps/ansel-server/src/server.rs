//! The server context shared by every connection.

use std::sync::Arc;

use ansel_config::ServerConfig;
use tokio::net::TcpListener;
use tracing::{info, info_span, Instrument};

use crate::backend::StoreBackend;
use crate::cardlock::CardLocks;
use crate::error::ServerError;
use crate::session::Session;

pub struct AnselServer {
    pub store: StoreBackend,
    pub config: Arc<ServerConfig>,
    pub card_locks: CardLocks,
}

impl AnselServer {
    pub fn new(store: StoreBackend, config: Arc<ServerConfig>) -> Self {
        Self {
            store,
            config,
            card_locks: CardLocks::default(),
        }
    }

    /// Hash a password off the scheduler; Argon2 blocks for long enough to
    /// starve other connections otherwise.
    pub async fn hash_password(&self, password: String) -> Result<String, ServerError> {
        let strength = self.config.security.password_security;
        tokio::task::spawn_blocking(move || ansel_crypto::hash_password(&password, strength))
            .await
            .map_err(|_| ServerError::TaskJoin)?
            .map_err(ServerError::from)
    }

    /// Verify a password off the scheduler.
    pub async fn verify_password(
        &self,
        password: String,
        stored: String,
    ) -> Result<bool, ServerError> {
        tokio::task::spawn_blocking(move || ansel_crypto::verify_password(&password, &stored))
            .await
            .map_err(|_| ServerError::TaskJoin)?
            .map_err(ServerError::from)
    }
}

/// Accept connections forever, one task per connection.
pub async fn serve(server: Arc<AnselServer>, listener: TcpListener) -> std::io::Result<()> {
    info!(addr = %listener.local_addr()?, "listening");
    loop {
        let (stream, peer) = listener.accept().await?;
        let server = server.clone();
        let span = info_span!("session", peer = %peer.ip());
        tokio::spawn(
            async move {
                Session::new(stream, peer.ip()).run(server).await;
            }
            .instrument(span),
        );
    }
}
