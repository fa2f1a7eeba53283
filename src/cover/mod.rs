//! Cover-server communication.
//!
//! A [`Cover`] describes the public site whose traffic this proxy imitates
//! and carries everything the two rewriters need:
//!
//! - the shared single-use store of pre-built cover POST bodies
//! - the replacement pages served instead of real cover HTML
//! - the three injected plugin operations
//! - the sink receiving completed client uploads
//!
//! The rewriters themselves live in [`request`](self) and
//! [`response`](self) and are exposed as methods on `Cover`.

mod form;
mod images;
mod plugin;
mod request;
mod response;
mod slab;
mod state;
mod store;

pub use form::upload_form;
pub use images::{ImageDef, ImageStore};
pub use plugin::{image_board, multipart_body, Plugin};
pub use state::{RequestMode, RequestPhase, ResponsePhase, State};
pub use store::PostStore;

use std::collections::HashMap;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::error::{Error, Result};

/// Sink for completed client uploads. Returns success.
pub type UploadHandler = Box<dyn Fn(&[u8]) -> bool + Send + Sync>;

/// Cover server instance, shared by all sessions.
pub struct Cover {
    name: String,
    port: u16,
    protocol: String,
    post_path: String,
    pages: HashMap<String, String>,
    /// Pending cover POST bodies, keyed by boundary id
    pub posts: PostStore,
    pub(crate) plugin: Plugin,
    pub(crate) upload_handler: UploadHandler,
}

impl Cover {
    /// Create a cover descriptor with the passive plugin and a discarding
    /// upload handler.
    pub fn new(
        name: impl Into<String>,
        port: u16,
        protocol: impl Into<String>,
        post_path: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            port,
            protocol: protocol.into(),
            post_path: post_path.into(),
            pages: HashMap::new(),
            posts: PostStore::new(),
            plugin: Plugin::passive(),
            upload_handler: Box::new(|data| {
                tracing::warn!("no upload handler installed, {} bytes dropped", data.len());
                false
            }),
        }
    }

    /// Install the cover plugin.
    pub fn with_plugin(mut self, plugin: Plugin) -> Self {
        self.plugin = plugin;
        self
    }

    /// Install the upload sink.
    pub fn with_upload_handler(
        mut self,
        handler: impl Fn(&[u8]) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.upload_handler = Box::new(handler);
        self
    }

    /// Register a replacement page for a request path.
    pub fn with_page(mut self, path: impl Into<String>, html: impl Into<String>) -> Self {
        self.pages.insert(path.into(), html.into());
        self
    }

    /// Hostname of the cover server.
    pub fn host(&self) -> &str {
        &self.name
    }

    /// Port of the cover server.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Protocol scheme used toward the cover server.
    pub fn protocol(&self) -> &str {
        &self.protocol
    }

    /// Path of the cover site's own upload POST endpoint.
    pub fn post_path(&self) -> &str {
        &self.post_path
    }

    /// Replacement page registered for a path.
    pub fn page(&self, path: &str) -> Option<String> {
        self.pages.get(path).cloned()
    }

    /// Open the outbound connection for one session, directly or through
    /// the configured SOCKS proxy.
    pub async fn connect(&self, socks: Option<&str>) -> Result<TcpStream> {
        match socks {
            None => {
                let stream = TcpStream::connect((self.name.as_str(), self.port)).await?;
                tracing::info!("connected to cover server {}:{}", self.name, self.port);
                Ok(stream)
            }
            Some(proxy) => self.connect_socks(proxy).await,
        }
    }

    /// SOCKS5 handshake: no authentication, CONNECT by hostname.
    async fn connect_socks(&self, proxy: &str) -> Result<TcpStream> {
        let mut stream = TcpStream::connect(proxy).await?;

        stream.write_all(&[0x05, 0x01, 0x00]).await?;
        let mut reply = [0u8; 2];
        stream.read_exact(&mut reply).await?;
        if reply != [0x05, 0x00] {
            return Err(Error::Socks("authentication method rejected".into()));
        }

        let host = self.name.as_bytes();
        if host.len() > 255 {
            return Err(Error::Socks("hostname too long".into()));
        }
        let mut request = Vec::with_capacity(7 + host.len());
        request.extend_from_slice(&[0x05, 0x01, 0x00, 0x03, host.len() as u8]);
        request.extend_from_slice(host);
        request.extend_from_slice(&self.port.to_be_bytes());
        stream.write_all(&request).await?;

        let mut head = [0u8; 4];
        stream.read_exact(&mut head).await?;
        if head[1] != 0x00 {
            return Err(Error::Socks(format!("connect refused, code {}", head[1])));
        }
        // drain the bound address field
        let remaining = match head[3] {
            0x01 => 6,
            0x04 => 18,
            0x03 => {
                let mut len = [0u8; 1];
                stream.read_exact(&mut len).await?;
                len[0] as usize + 2
            }
            other => return Err(Error::Socks(format!("bad address type {}", other))),
        };
        let mut scratch = vec![0u8; remaining];
        stream.read_exact(&mut scratch).await?;

        tracing::info!(
            "connected to cover server {}:{} via SOCKS {}",
            self.name,
            self.port,
            proxy
        );
        Ok(stream)
    }
}
