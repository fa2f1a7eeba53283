//! Network services.
//!
//! The HTTP service accepts allow-listed clients and spawns one session
//! task per connection; the control service lets the operator terminate
//! the process. Both observe a shared shutdown signal.

mod control;
mod net;
mod session;

pub use control::ControlService;
pub use net::{recv_data, send_data, MAX_RETRIES, READ_TIMEOUT, WRITE_TIMEOUT};
pub use session::run_session;

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::watch;

use crate::cover::Cover;
use crate::error::Result;

/// HTTP proxy service.
pub struct HttpService {
    cover: Arc<Cover>,
    allow: String,
    socks: Option<String>,
}

impl HttpService {
    /// Create the HTTP service for one cover instance.
    pub fn new(cover: Arc<Cover>, allow: impl Into<String>, socks: Option<String>) -> Self {
        Self {
            cover,
            allow: allow.into(),
            socks,
        }
    }

    /// Accept client connections until shutdown is signaled.
    pub async fn run(self, port: u16, shutdown: watch::Receiver<bool>) -> Result<()> {
        let listener = TcpListener::bind(("0.0.0.0", port)).await?;
        tracing::info!("HTTP service listening on port {}", port);

        let mut done = shutdown.clone();
        loop {
            tokio::select! {
                changed = done.changed() => {
                    if changed.is_err() || *done.borrow() {
                        tracing::info!("HTTP service shutting down");
                        return Ok(());
                    }
                }
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, peer)) => {
                            if !self.allow.contains(&peer.ip().to_string()) {
                                tracing::warn!("invalid remote address '{}'", peer);
                                continue;
                            }
                            tracing::info!("client connected from {}", peer);

                            let cover = Arc::clone(&self.cover);
                            let socks = self.socks.clone();
                            let shutdown = shutdown.clone();
                            tokio::spawn(async move {
                                match run_session(cover, stream, socks, shutdown).await {
                                    Ok(()) => tracing::info!("session from {} finished", peer),
                                    Err(e) => tracing::info!("session from {} ended: {}", peer, e),
                                }
                            });
                        }
                        Err(e) => tracing::warn!("accept error: {}", e),
                    }
                }
            }
        }
    }
}
