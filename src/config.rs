//! Proxy configuration.
//!
//! Loaded from a TOML file; every field has a default so a partial file
//! (or none at all) still yields a runnable configuration.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Port for control sessions
    pub control_port: u16,
    /// Addresses allowed to open control sessions
    pub control_allow: String,
    /// Port for HTTP sessions
    pub http_port: u16,
    /// Addresses allowed to open HTTP sessions
    pub http_allow: String,
    /// Optional SOCKS proxy for outbound connections
    pub socks_addr: Option<String>,
    /// Cover-site settings
    pub cover: CoverConfig,
    /// Upload and sealing settings
    pub upload: UploadConfig,
}

/// Cover-site settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoverConfig {
    /// Hostname of the cover server
    pub host: String,
    /// Port of the cover server
    pub port: u16,
    /// Protocol scheme toward the cover server
    pub protocol: String,
    /// Path of the cover site's upload endpoint
    pub post_path: String,
    /// Replacement pages by request path; `[UPLOAD]` marks the spot for
    /// the generated upload form
    pub pages: HashMap<String, String>,
}

/// Upload and sealing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    /// Directory for sealed documents and share files
    pub path: PathBuf,
    /// OpenPGP keyring with reviewer public keys
    pub keyring: PathBuf,
    /// Cover image definitions (TOML)
    pub images: PathBuf,
    /// Offset subtracted from `2^512 - 1` to obtain the share modulus
    pub share_prime_offset: u64,
    /// Reviewers required to reconstruct a document key
    pub share_threshold: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            control_port: 2342,
            control_allow: "127.0.0.1".to_string(),
            http_port: 80,
            http_allow: "127.0.0.1".to_string(),
            socks_addr: None,
            cover: CoverConfig::default(),
            upload: UploadConfig::default(),
        }
    }
}

impl Default for CoverConfig {
    fn default() -> Self {
        let mut pages = HashMap::new();
        pages.insert("/".to_string(), "[UPLOAD]".to_string());
        Self {
            host: "imgon.net".to_string(),
            port: 80,
            protocol: "http".to_string(),
            post_path: "/upload.php".to_string(),
            pages,
        }
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./uploads"),
            keyring: PathBuf::from("./uploads/pubring.gpg"),
            images: PathBuf::from("./uploads/images.toml"),
            share_prime_offset: 568,
            share_threshold: 2,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::config(format!("can't read config file {:?}: {}", path, e)))?;
        toml::from_str(&text)
            .map_err(|e| Error::config(format!("bad config file {:?}: {}", path, e)))
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.cover.host.is_empty() {
            return Err(Error::config("cover.host cannot be empty"));
        }
        if self.http_allow.is_empty() {
            return Err(Error::config("http_allow cannot be empty"));
        }
        if self.upload.share_threshold == 0 {
            return Err(Error::config("upload.share_threshold must be at least 1"));
        }
        Ok(())
    }

    /// Render a sample configuration file.
    pub fn sample() -> String {
        let body = toml::to_string_pretty(&Config::default())
            .expect("default config serializes");
        format!(
            "# SID configuration\n# Generated: {}\n\n{}",
            chrono::Utc::now(),
            body
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.control_port, 2342);
        assert_eq!(config.http_port, 80);
        assert_eq!(config.http_allow, "127.0.0.1");
        assert_eq!(config.upload.share_threshold, 2);
        assert_eq!(config.upload.share_prime_offset, 568);
        assert_eq!(config.cover.pages.get("/").unwrap(), "[UPLOAD]");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let text = concat!(
            "http_port = 8080\n",
            "\n",
            "[cover]\n",
            "host = \"www.picpost.com\"\n",
        );
        let config: Config = toml::from_str(text).unwrap();
        assert_eq!(config.http_port, 8080);
        assert_eq!(config.cover.host, "www.picpost.com");
        // untouched sections keep defaults
        assert_eq!(config.control_port, 2342);
        assert_eq!(config.upload.share_threshold, 2);
    }

    #[test]
    fn test_round_trip() {
        let config = Config::default();
        let text = toml::to_string_pretty(&config).unwrap();
        let back: Config = toml::from_str(&text).unwrap();
        assert_eq!(back.cover.host, config.cover.host);
        assert_eq!(back.upload.path, config.upload.path);
    }

    #[test]
    fn test_validation_failures() {
        let mut config = Config::default();
        config.cover.host.clear();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.upload.share_threshold = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_sample_parses() {
        let sample = Config::sample();
        let stripped: String = sample
            .lines()
            .filter(|l| !l.starts_with('#'))
            .collect::<Vec<_>>()
            .join("\n");
        let config: Config = toml::from_str(&stripped).unwrap();
        assert!(config.validate().is_ok());
    }
}
