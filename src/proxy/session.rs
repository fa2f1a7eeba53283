//! Per-connection session loop.
//!
//! Each accepted client gets its own task owning the client socket, a
//! fresh outbound cover socket and the connection [`State`]. The loop
//! alternates directions: cover bytes through the response rewriter to the
//! client, client bytes through the request rewriter to the cover. The
//! client never sees data that was not derived from cover bytes already
//! received.

use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::sync::watch;

use super::net::{recv_data, send_data};
use crate::cover::{Cover, State};
use crate::error::Result;
use crate::SLAB_SIZE;

/// Pause between polls when both directions were idle.
const IDLE_PAUSE: Duration = Duration::from_millis(1);

/// Drive one client connection until either side closes or shutdown is
/// signaled. Both sockets are released on every exit path.
pub async fn run_session(
    cover: Arc<Cover>,
    mut client: TcpStream,
    socks: Option<String>,
    shutdown: watch::Receiver<bool>,
) -> Result<()> {
    let mut upstream = cover.connect(socks.as_deref()).await?;
    let mut state = State::new();
    let mut buf = vec![0u8; SLAB_SIZE];

    loop {
        if *shutdown.borrow() {
            tracing::info!("session closing on shutdown");
            return Ok(());
        }
        let mut idle = true;

        // cover -> client
        let n = recv_data(&mut upstream, &mut buf, "cover").await?;
        if n > 0 {
            idle = false;
            let resp = cover.rewrite_response(&mut state, &buf[..n]);
            if !resp.is_empty() {
                send_data(&mut client, &resp, "client").await?;
            }
        }

        // client -> cover
        let n = recv_data(&mut client, &mut buf, "client").await?;
        if n > 0 {
            idle = false;
            let req = cover.rewrite_request(&mut state, &buf[..n]);
            if !req.is_empty() {
                send_data(&mut upstream, &req, "cover").await?;
            }
        }

        if idle {
            tokio::time::sleep(IDLE_PAUSE).await;
        }
    }
}
