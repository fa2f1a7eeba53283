//! Socket helpers with bounded-retry discipline.
//!
//! Both directions of a session are polled from a single task, so reads
//! use a very short timeout: a timeout means "no data right now" and the
//! loop moves on to the other direction. Writes retry partial progress
//! with the same bound. Anything else tears the session down.

use std::io::ErrorKind;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::error::{Error, Result};

/// Read poll timeout per direction.
pub const READ_TIMEOUT: Duration = Duration::from_micros(100);

/// Write progress timeout.
pub const WRITE_TIMEOUT: Duration = Duration::from_millis(1);

/// Retry bound for transient conditions.
pub const MAX_RETRIES: u32 = 1000;

/// Receive available data into `buf`.
///
/// Returns `Ok(0)` when no data is pending; a closed peer or a
/// non-transient error is fatal to the session.
pub async fn recv_data(conn: &mut TcpStream, buf: &mut [u8], side: &'static str) -> Result<usize> {
    let mut retries = 0;
    loop {
        match tokio::time::timeout(READ_TIMEOUT, conn.read(buf)).await {
            Err(_) => return Ok(0),
            Ok(Ok(0)) => return Err(Error::Closed(side)),
            Ok(Ok(n)) => {
                tracing::trace!("[{}] {} bytes received", side, n);
                return Ok(n);
            }
            Ok(Err(e)) if e.kind() == ErrorKind::Interrupted => {
                retries += 1;
                if retries >= MAX_RETRIES {
                    return Err(Error::Unresponsive { side, retries });
                }
            }
            Ok(Err(e)) => {
                tracing::error!("[{}] read failed: {}", side, e);
                return Err(Error::Network(e));
            }
        }
    }
}

/// Send all of `data`, retrying partial writes within the bound.
pub async fn send_data(conn: &mut TcpStream, data: &[u8], side: &'static str) -> Result<()> {
    let mut rest = data;
    let mut retries = 0;
    while !rest.is_empty() {
        match tokio::time::timeout(WRITE_TIMEOUT, conn.write(rest)).await {
            Err(_) => {
                retries += 1;
                if retries >= MAX_RETRIES {
                    tracing::error!("[{}] write failed after retries", side);
                    return Err(Error::Unresponsive { side, retries });
                }
            }
            Ok(Ok(0)) => return Err(Error::Closed(side)),
            Ok(Ok(n)) => {
                rest = &rest[n..];
                retries = 0;
            }
            Ok(Err(e)) if e.kind() == ErrorKind::Interrupted => {
                retries += 1;
                if retries >= MAX_RETRIES {
                    return Err(Error::Unresponsive { side, retries });
                }
            }
            Ok(Err(e)) => {
                tracing::error!("[{}] write failed: {}", side, e);
                return Err(Error::Network(e));
            }
        }
    }
    tracing::trace!("[{}] {} bytes sent", side, data.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_recv_no_data_is_zero() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let mut client = TcpStream::connect(addr).await.unwrap();
        let (_server, _) = listener.accept().await.unwrap();

        let mut buf = [0u8; 64];
        let n = recv_data(&mut client, &mut buf, "client").await.unwrap();
        assert_eq!(n, 0);
    }

    #[tokio::test]
    async fn test_send_then_recv() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let mut client = TcpStream::connect(addr).await.unwrap();
        let (mut server, _) = listener.accept().await.unwrap();

        send_data(&mut client, b"hello proxy", "client").await.unwrap();

        let mut buf = [0u8; 64];
        // the data may not be readable on the very first poll
        let mut n = 0;
        for _ in 0..100 {
            n = recv_data(&mut server, &mut buf, "cover").await.unwrap();
            if n > 0 {
                break;
            }
        }
        assert_eq!(&buf[..n], b"hello proxy");
    }

    #[tokio::test]
    async fn test_closed_peer_is_fatal() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let mut client = TcpStream::connect(addr).await.unwrap();
        let (server, _) = listener.accept().await.unwrap();
        drop(server);

        let mut buf = [0u8; 64];
        let mut result = Ok(0);
        for _ in 0..100 {
            result = recv_data(&mut client, &mut buf, "cover").await;
            match &result {
                Ok(0) => continue,
                _ => break,
            }
        }
        let err = result.unwrap_err();
        assert!(err.is_session_fatal());
    }
}
