//! Operator control channel.
//!
//! A small menu-driven TCP service used to administrate a running proxy.
//! Termination requires an explicit confirmation; the shutdown signal is
//! observed by every session task and by the listeners.

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;

use crate::error::Result;

/// Control service state.
pub struct ControlService {
    shutdown: watch::Sender<bool>,
    allow: String,
}

impl ControlService {
    /// Create a control service signaling on the given channel.
    pub fn new(shutdown: watch::Sender<bool>, allow: impl Into<String>) -> Self {
        Self {
            shutdown,
            allow: allow.into(),
        }
    }

    /// Accept control sessions until shutdown is signaled.
    pub async fn run(self, port: u16) -> Result<()> {
        let listener = TcpListener::bind(("0.0.0.0", port)).await?;
        tracing::info!("control service listening on port {}", port);

        let mut done = self.shutdown.subscribe();
        loop {
            tokio::select! {
                _ = done.changed() => {
                    if *done.borrow() {
                        return Ok(());
                    }
                }
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, peer)) => {
                            if !self.allow.contains(&peer.ip().to_string()) {
                                tracing::warn!("control connection from {} refused", peer);
                                continue;
                            }
                            if let Err(e) = self.serve(stream).await {
                                tracing::warn!("control session error: {}", e);
                            }
                        }
                        Err(e) => tracing::warn!("control accept error: {}", e),
                    }
                }
            }
        }
    }

    /// Run the menu dialog on one control connection.
    async fn serve(&self, stream: TcpStream) -> Result<()> {
        let mut stream = BufReader::new(stream);
        loop {
            stream
                .write_all(
                    concat!(
                        "\n-----------------------------------\n",
                        "(T)erminate application\n",
                        "e(X)it\n",
                        "-----------------------------------\n",
                        "Enter command: ",
                    )
                    .as_bytes(),
                )
                .await?;

            let cmd = match read_command(&mut stream).await? {
                Some(cmd) => cmd,
                None => return Ok(()),
            };
            tracing::info!("control command '{}'", cmd);

            match cmd.as_str() {
                "T" => {
                    stream
                        .write_all(b"Are you sure? Enter YES to continue: ")
                        .await?;
                    match read_command(&mut stream).await? {
                        Some(answer) if answer == "YES" => {
                            tracing::info!("terminating application");
                            stream.write_all(b"Terminating application...\n").await?;
                            let _ = self.shutdown.send(true);
                            return Ok(());
                        }
                        Some(answer) => {
                            tracing::info!("response '{}', termination aborted", answer);
                            stream
                                .write_all(b"Wrong response -- termination aborted!\n")
                                .await?;
                        }
                        None => return Ok(()),
                    }
                }
                "X" => return Ok(()),
                other => {
                    stream
                        .write_all(format!("Unknown command '{}'\n", other).as_bytes())
                        .await?;
                }
            }
        }
    }
}

/// Read one trimmed input line; `None` on connection end.
async fn read_command(stream: &mut BufReader<TcpStream>) -> Result<Option<String>> {
    let mut line = String::new();
    let n = stream.read_line(&mut line).await?;
    if n == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    async fn start_service() -> (u16, watch::Receiver<bool>) {
        let (tx, rx) = watch::channel(false);
        let service = ControlService::new(tx, "127.0.0.1");
        // bind on an ephemeral port by probing
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        tokio::spawn(service.run(port));
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        (port, rx)
    }

    #[tokio::test]
    async fn test_terminate_requires_confirmation() {
        let (port, rx) = start_service().await;

        let mut conn = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
        conn.write_all(b"T\nno\nX\n").await.unwrap();

        let mut out = Vec::new();
        let _ = conn.read_to_end(&mut out).await;
        let text = String::from_utf8_lossy(&out);
        assert!(text.contains("Are you sure?"));
        assert!(text.contains("termination aborted"));
        assert!(!*rx.borrow());
    }

    #[tokio::test]
    async fn test_confirmed_terminate_signals_shutdown() {
        let (port, rx) = start_service().await;

        let mut conn = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
        conn.write_all(b"T\nYES\n").await.unwrap();

        let mut out = Vec::new();
        let _ = conn.read_to_end(&mut out).await;
        assert!(String::from_utf8_lossy(&out).contains("Terminating"));
        assert!(*rx.borrow());
    }
}
