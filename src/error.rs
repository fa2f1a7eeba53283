//! Error types for the SID proxy.

use thiserror::Error;

/// Result type alias for SID operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while running SID.
#[derive(Error, Debug)]
pub enum Error {
    /// Network I/O error
    #[error("network error: {0}")]
    Network(#[from] std::io::Error),

    /// Read/write gave up after the bounded retry budget
    #[error("{side} side unresponsive after {retries} retries")]
    Unresponsive { side: &'static str, retries: u32 },

    /// Peer closed the connection
    #[error("connection closed by {0}")]
    Closed(&'static str),

    /// Client address not on the allow list
    #[error("address {0} not allowed")]
    NotAllowed(String),

    /// SOCKS proxy handshake failed
    #[error("SOCKS handshake failed: {0}")]
    Socks(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Reviewer keyring could not be read or parsed
    #[error("keyring error: {0}")]
    Keyring(String),

    /// Document sealing failed before any artifact was written
    #[error("sealer error: {0}")]
    Sealer(String),
}

impl Error {
    /// Create a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Create a new keyring error
    pub fn keyring(msg: impl Into<String>) -> Self {
        Error::Keyring(msg.into())
    }

    /// Create a new sealer error
    pub fn sealer(msg: impl Into<String>) -> Self {
        Error::Sealer(msg.into())
    }

    /// Check if this error tears down a single session only.
    ///
    /// Session-fatal errors close both sockets of one connection; the
    /// process keeps serving other clients.
    pub fn is_session_fatal(&self) -> bool {
        matches!(
            self,
            Error::Network(_) | Error::Unresponsive { .. } | Error::Closed(_) | Error::Socks(_)
        )
    }

    /// Check if this error must abort process startup.
    pub fn is_startup_fatal(&self) -> bool {
        matches!(self, Error::Config(_) | Error::Keyring(_))
    }
}
